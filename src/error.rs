//! Error types for HelixKV
//!
//! Provides a unified error type for all operations, plus the closed set of
//! status codes that callers can dispatch on.

use thiserror::Error;

/// Result type alias using HelixError
pub type Result<T> = std::result::Result<T, HelixError>;

/// Unified error type for HelixKV operations
///
/// Absence, duplication and infeasibility are ordinary outcomes of normal
/// use, not failures of the system; they travel through this type the same
/// way hard errors do so that callers handle exactly one channel.
#[derive(Debug, Error)]
pub enum HelixError {
    // -------------------------------------------------------------------------
    // Catch-alls
    // -------------------------------------------------------------------------
    #[error("unknown error: {0}")]
    Unknown(String),

    #[error("application error: {0}")]
    Application(String),

    // -------------------------------------------------------------------------
    // Environment Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("system error: {0}")]
    System(String),

    #[error("network error: {0}")]
    Network(String),

    // -------------------------------------------------------------------------
    // Resource-State Errors
    // -------------------------------------------------------------------------
    #[error("precondition not met: {0}")]
    Precondition(String),

    #[error("operation not permitted: {0}")]
    Permission(String),

    #[error("not implemented: {0}")]
    NotImplemented(String),

    #[error("operation canceled: {0}")]
    Canceled(String),

    // -------------------------------------------------------------------------
    // Input Errors
    // -------------------------------------------------------------------------
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    // -------------------------------------------------------------------------
    // Data Errors (expected outcomes of normal use)
    // -------------------------------------------------------------------------
    #[error("record not found")]
    NotFound,

    #[error("record already exists: {0}")]
    Duplication(String),

    #[error("operation infeasible: {0}")]
    Infeasible(String),

    // -------------------------------------------------------------------------
    // Integrity Errors
    // -------------------------------------------------------------------------
    #[error("broken data: {0}")]
    BrokenData(String),
}

/// Closed set of status categories
///
/// `Success` stands for the `Ok` branch of [`Result`]; every [`HelixError`]
/// variant maps onto exactly one of the remaining codes via
/// [`HelixError::code`]. The diagnostic message carried by the error is never
/// part of this contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCode {
    Success,
    Unknown,
    System,
    NotImplemented,
    Precondition,
    InvalidArgument,
    Canceled,
    NotFound,
    Permission,
    Infeasible,
    Duplication,
    BrokenData,
    Network,
    Application,
}

impl HelixError {
    /// Get the status category of this error
    pub fn code(&self) -> StatusCode {
        match self {
            HelixError::Unknown(_) => StatusCode::Unknown,
            HelixError::Application(_) => StatusCode::Application,
            HelixError::Io(_) => StatusCode::System,
            HelixError::System(_) => StatusCode::System,
            HelixError::Network(_) => StatusCode::Network,
            HelixError::Precondition(_) => StatusCode::Precondition,
            HelixError::Permission(_) => StatusCode::Permission,
            HelixError::NotImplemented(_) => StatusCode::NotImplemented,
            HelixError::Canceled(_) => StatusCode::Canceled,
            HelixError::InvalidArgument(_) => StatusCode::InvalidArgument,
            HelixError::NotFound => StatusCode::NotFound,
            HelixError::Duplication(_) => StatusCode::Duplication,
            HelixError::Infeasible(_) => StatusCode::Infeasible,
            HelixError::BrokenData(_) => StatusCode::BrokenData,
        }
    }

    /// True if this error is an expected data outcome (absence, duplication,
    /// infeasibility) rather than a failure of the store itself
    pub fn is_data_outcome(&self) -> bool {
        matches!(
            self.code(),
            StatusCode::NotFound | StatusCode::Duplication | StatusCode::Infeasible
        )
    }
}

/// Keep the first error while continuing to accumulate work
///
/// Batch operations apply every individually valid entry and report the first
/// error encountered; this is the single place that rule lives.
pub(crate) fn join_status(first: &mut Result<()>, next: Result<()>) {
    if let Err(e) = next {
        if first.is_ok() {
            *first = Err(e);
        }
    }
}
