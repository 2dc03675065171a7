use tocarde_core::DomainError;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A validation rule rejected the operation before any write.
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("{0} not found")]
    NotFound(&'static str),

    /// A stored value (status, method) no longer parses into its enum.
    #[error("invalid stored value: {0}")]
    Decode(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}
