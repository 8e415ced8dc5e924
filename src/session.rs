//! In-memory application state shared by the terminal UI and the CLI.

use crate::batch::{Batch, ContactRecord};
use crate::export;
use crate::provider::ConversionConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Single,
    Batch,
}

impl Mode {
    pub fn toggled(self) -> Self {
        match self {
            Mode::Single => Mode::Batch,
            Mode::Batch => Mode::Single,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Mode::Single => "SINGLE",
            Mode::Batch => "BATCH",
        }
    }
}

/// What a finished conversion did to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    /// Single mode: the result now holds the new vCard.
    Single,
    /// Batch mode: a record was appended; `total` is the new batch size.
    Added { name: String, total: usize },
}

/// Everything the user is working on. Nothing here outlives the process.
#[derive(Debug, Clone)]
pub struct Session {
    mode: Mode,
    pub input: String,
    single_result: String,
    batch: Batch,
    pub conversion: ConversionConfig,
}

impl Session {
    pub fn new(conversion: ConversionConfig) -> Self {
        Self {
            mode: Mode::Single,
            input: String::new(),
            single_result: String::new(),
            batch: Batch::new(),
            conversion,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Switch modes. Clears the transient input and the single result; the
    /// batch collection is kept.
    pub fn toggle_mode(&mut self) {
        self.mode = self.mode.toggled();
        self.single_result.clear();
        self.input.clear();
    }

    pub fn single_result(&self) -> &str {
        &self.single_result
    }

    pub fn batch(&self) -> &Batch {
        &self.batch
    }

    pub fn batch_mut(&mut self) -> &mut Batch {
        &mut self.batch
    }

    /// Text shown in the output pane, copied, and exported.
    pub fn output(&self) -> &str {
        match self.mode {
            Mode::Single => &self.single_result,
            Mode::Batch => self.batch.combined(),
        }
    }

    pub fn export_file_name(&self) -> String {
        export::file_name(self.mode, self.batch.len())
    }

    /// Record a successful conversion of `original` that was started in `mode`.
    pub fn apply_result(&mut self, mode: Mode, original: &str, vcard: String) -> Applied {
        match mode {
            Mode::Single => {
                self.single_result = vcard;
                Applied::Single
            }
            Mode::Batch => {
                let record = ContactRecord::new(original, vcard);
                let name = record.display_name.clone();
                self.batch.add(record);
                if self.mode == Mode::Batch && self.input == original {
                    self.input.clear();
                }
                Applied::Added {
                    name,
                    total: self.batch.len(),
                }
            }
        }
    }
}
