#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error: {source}")]
    IoError {
        #[from]
        source: std::io::Error,
    },

    #[error("Failed to serialize watermark: {source}")]
    SerializationError {
        #[from]
        source: serde_json::Error,
    },
}
