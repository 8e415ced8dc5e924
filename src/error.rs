use thiserror::Error;

/// Everything that can go wrong while turning text into a vCard.
///
/// Application plumbing (config, terminal, files) stays on `anyhow`; this enum
/// covers the conversion pipeline and the clipboard, whose messages are shown
/// to the user verbatim.
#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("input text is empty; type or paste some contact details first")]
    EmptyInput,

    #[error("custom endpoint base URL is not configured")]
    MissingEndpoint,

    #[error("unexpected response from model: {0}")]
    MalformedResponse(String),

    #[error("request failed: {0}")]
    Transport(String),

    #[error("clipboard unavailable: {0}")]
    ClipboardAccess(String),

    /// Another conversion is still in flight. Callers treat this as a no-op.
    #[error("a conversion is already in progress")]
    Busy,
}

impl From<reqwest::Error> for ConvertError {
    fn from(err: reqwest::Error) -> Self {
        ConvertError::Transport(err.to_string())
    }
}
