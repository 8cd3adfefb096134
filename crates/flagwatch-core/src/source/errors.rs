/// Transport-level failure of a single status request.
///
/// Every variant is retried by the poller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    #[error("invalid endpoint '{endpoint}': {message}")]
    InvalidEndpoint { endpoint: String, message: String },

    #[error("request failed: {0}")]
    Connection(String),

    #[error("request timed out")]
    Timeout,

    #[error("endpoint returned status {status}")]
    Status { status: u16 },

    #[error("invalid response body: {0}")]
    InvalidResponse(String),
}
