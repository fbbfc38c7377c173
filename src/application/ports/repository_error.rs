#[derive(Debug, Clone, thiserror::Error)]
pub enum RepositoryError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),
    #[error("query failed: {0}")]
    QueryFailed(String),
    #[error("not found: {0}")]
    NotFound(String),
    /// A temporal or referential invariant rejected the write (overlapping
    /// spans, word outside its parent segment).
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),
}
