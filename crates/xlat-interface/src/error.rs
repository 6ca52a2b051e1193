use thiserror::Error;

/// The error type for translation table operation failures.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum XlatError {
    /// Misaligned address or size, unsupported granularity, or no such mapping.
    #[error("invalid argument")]
    InvalidArgument,
    /// The range wraps around or lies outside the address space limits.
    #[error("address out of range")]
    OutOfRange,
    /// The region registry or the table pool is exhausted.
    #[error("out of memory")]
    OutOfMemory,
    /// The request conflicts with an existing region or a security rule.
    #[error("permission denied")]
    PermissionDenied,
}

/// The specialized `Result` type for translation table operations.
pub type XlatResult<T = ()> = Result<T, XlatError>;
