use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::info;

use crate::error::ConvertError;
use crate::provider::{provider_for, ConversionConfig};
use crate::transport::Transport;

/// Runs one text-to-vCard conversion at a time.
///
/// The busy flag is shared so the UI can ask whether a request is in flight
/// while a worker thread owns the conversion.
pub struct Converter {
    transport: Box<dyn Transport>,
    busy: Arc<AtomicBool>,
}

/// Clears the busy flag when dropped, whatever the outcome of the conversion.
struct BusyGuard {
    flag: Arc<AtomicBool>,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

impl Converter {
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self {
            transport,
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    fn try_acquire(&self) -> Option<BusyGuard> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| BusyGuard {
                flag: Arc::clone(&self.busy),
            })
    }

    /// Convert `input` with the backend selected by `config`.
    ///
    /// Returns `ConvertError::Busy` without touching the network if another
    /// conversion holds the flag.
    pub fn convert(&self, config: &ConversionConfig, input: &str) -> Result<String, ConvertError> {
        let _guard = self.try_acquire().ok_or(ConvertError::Busy)?;

        let provider = provider_for(config);
        let request = provider.build_request(input)?;
        info!(
            provider = provider.name(),
            url = %request.url,
            model = %request.body.model,
            input_len = input.len(),
            "sending conversion request"
        );

        let body = self.transport.send(&request)?;
        let vcard = provider.parse_response(&body)?;

        info!(
            provider = provider.name(),
            vcard_len = vcard.len(),
            "conversion complete"
        );
        Ok(vcard)
    }
}
