/// Errors raised by the fluorescence engine.
///
/// No operation retries; every error reaches the caller unmodified and a
/// failed computation never returns a partial result.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum XrfError {
    /// Malformed input: negative density, mismatched lengths, unknown shell name...
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// A quantity outside the domain of a function or an undefined shell/transition.
    #[error("domain error: {0}")]
    Domain(String),
    /// Inconsistent state detected while computing.
    #[error("runtime error: {0}")]
    Runtime(String),
    #[error("snapshot error: {0}")]
    Snapshot(String),
}

pub type Result<T> = std::result::Result<T, XrfError>;

impl XrfError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub(crate) fn domain(msg: impl Into<String>) -> Self {
        Self::Domain(msg.into())
    }

    pub(crate) fn runtime(msg: impl Into<String>) -> Self {
        Self::Runtime(msg.into())
    }
}
