//! Unified error handling for BufferForge
//!
//! A single crate-level error type covering the cache subsystem:
//! - Configuration errors (rejected at construction)
//! - Allocation failures (native device refused memory)
//! - Contract violations (programming errors, fail fast)
//! - Map failures (asynchronous read-back did not complete)

use std::fmt;

/// Unified error type for the buffer cache subsystem.
///
/// All failures surface immediately to the caller; nothing is retried or
/// swallowed internally. A higher engine layer may react (for example by
/// purging caches and retrying an allocation), but that policy lives
/// outside this crate.
#[derive(Debug, thiserror::Error)]
pub enum BufferForgeError {
    /// Unknown cache mode or malformed size-class table
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// Native buffer creation refused
    #[error("Device buffer allocation failed: {0}")]
    AllocationFailed(String),

    /// Programming error: same-handle copy, undersized destination
    #[error("Contract violation: {0}")]
    ContractViolation(String),

    /// Asynchronous map did not report success
    #[error("Buffer map failed: {0}")]
    MapFailed(String),

    /// Other native device/command layer failure
    #[error("Device error: {0}")]
    Device(String),

    /// Lock poisoned (indicates a bug or a panicking caller)
    #[error("Internal lock poisoned: {0}")]
    LockPoisoned(String),
}

impl BufferForgeError {
    /// Categorize the error for handling decisions.
    pub fn category(&self) -> ErrorCategory {
        match self {
            BufferForgeError::Configuration(_) => ErrorCategory::Configuration,
            BufferForgeError::ContractViolation(_) => ErrorCategory::Contract,
            BufferForgeError::AllocationFailed(_)
            | BufferForgeError::MapFailed(_)
            | BufferForgeError::Device(_) => ErrorCategory::Device,
            BufferForgeError::LockPoisoned(_) => ErrorCategory::Internal,
        }
    }

    /// Check if this error may clear up if the caller frees resources first.
    ///
    /// Allocation failures are the canonical case: the engine above may
    /// purge its caches and retry. Contract violations and configuration
    /// errors never are; they require a code or config fix.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, BufferForgeError::AllocationFailed(_))
    }

    /// Check if this error indicates a programming bug in the caller.
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, BufferForgeError::ContractViolation(_))
    }
}

/// Error category for handling decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Invalid configuration - fix the config
    Configuration,
    /// Contract violation - fix the calling code
    Contract,
    /// Device failure - allocation, copy or map refused by the native layer
    Device,
    /// Internal error - indicates a bug
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Configuration => write!(f, "Configuration"),
            ErrorCategory::Contract => write!(f, "Contract"),
            ErrorCategory::Device => write!(f, "Device"),
            ErrorCategory::Internal => write!(f, "Internal"),
        }
    }
}

impl<T> From<std::sync::PoisonError<T>> for BufferForgeError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        BufferForgeError::LockPoisoned(err.to_string())
    }
}

/// Result alias used throughout the crate
pub type BufferResult<T> = std::result::Result<T, BufferForgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_categories() {
        assert_eq!(
            BufferForgeError::Configuration("bad mode".to_string()).category(),
            ErrorCategory::Configuration
        );
        assert_eq!(
            BufferForgeError::ContractViolation("src == dst".to_string()).category(),
            ErrorCategory::Contract
        );
        assert_eq!(
            BufferForgeError::AllocationFailed("oom".to_string()).category(),
            ErrorCategory::Device
        );
        assert_eq!(
            BufferForgeError::MapFailed("lost device".to_string()).category(),
            ErrorCategory::Device
        );
        assert_eq!(
            BufferForgeError::LockPoisoned("poisoned".to_string()).category(),
            ErrorCategory::Internal
        );
    }

    #[test]
    fn test_is_recoverable() {
        assert!(BufferForgeError::AllocationFailed("oom".to_string()).is_recoverable());

        assert!(!BufferForgeError::Configuration("bad".to_string()).is_recoverable());
        assert!(!BufferForgeError::ContractViolation("bad".to_string()).is_recoverable());
        assert!(!BufferForgeError::MapFailed("bad".to_string()).is_recoverable());
    }

    #[test]
    fn test_is_contract_violation() {
        assert!(BufferForgeError::ContractViolation("src == dst".to_string())
            .is_contract_violation());
        assert!(!BufferForgeError::AllocationFailed("oom".to_string()).is_contract_violation());
    }

    #[test]
    fn test_error_display() {
        let err = BufferForgeError::ContractViolation("copy with src == dst".to_string());
        assert_eq!(err.to_string(), "Contract violation: copy with src == dst");

        let err = BufferForgeError::AllocationFailed("size=1024".to_string());
        assert_eq!(
            err.to_string(),
            "Device buffer allocation failed: size=1024"
        );
    }

    #[test]
    fn test_poison_error_conversion() {
        use std::sync::PoisonError;

        fn convert<T>(err: PoisonError<T>) -> BufferForgeError {
            BufferForgeError::from(err)
        }

        let _ = convert::<i32> as fn(PoisonError<i32>) -> BufferForgeError;
    }

    #[test]
    fn test_category_display() {
        assert_eq!(ErrorCategory::Configuration.to_string(), "Configuration");
        assert_eq!(ErrorCategory::Contract.to_string(), "Contract");
        assert_eq!(ErrorCategory::Device.to_string(), "Device");
        assert_eq!(ErrorCategory::Internal.to_string(), "Internal");
    }
}
