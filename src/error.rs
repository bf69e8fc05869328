//! Unified error handling for FourierForge
//!
//! Every fallible operation in the engine surfaces a `FourierForgeError`.
//! The raw binding surface in [`crate::api`] flattens these into the stable
//! status-code taxonomy via [`FourierForgeError::status_code`]; the typed
//! API propagates them as `Result`s. Categories:
//! - InvalidHandle (handle never issued, or foreign to this registry)
//! - InvalidArgument (dimensions, enum selectors, buffer capacity)
//! - ResourceExhausted (allocation budget, working-set overflow)
//! - UnsupportedConfiguration (precision/layout the device cannot serve)
//! - DeviceExecutionFailure (worker fault during a transform)
//! - LifecycleViolation (out-of-order operation, stale handle)

use std::fmt;

use thiserror::Error;

use crate::plan::Layout;

/// Stable status codes returned across the binding surface.
///
/// 0 is success; each error category owns one nonzero code. `INTERNAL_ERROR`
/// sits outside the declared taxonomy and is never expected in ordinary
/// operation.
pub mod status {
    pub const OK: i32 = 0;
    pub const INVALID_HANDLE: i32 = -1;
    pub const INVALID_ARGUMENT: i32 = -2;
    pub const RESOURCE_EXHAUSTED: i32 = -3;
    pub const UNSUPPORTED_CONFIGURATION: i32 = -4;
    pub const DEVICE_EXECUTION_FAILURE: i32 = -5;
    pub const LIFECYCLE_VIOLATION: i32 = -6;
    pub const INTERNAL_ERROR: i32 = -7;
}

/// Which registry a handle belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleKind {
    Context,
    Plan,
    Buffer,
}

impl fmt::Display for HandleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandleKind::Context => write!(f, "context"),
            HandleKind::Plan => write!(f, "plan"),
            HandleKind::Buffer => write!(f, "buffer"),
        }
    }
}

/// Unified error type for FourierForge
#[derive(Error, Debug, Clone)]
pub enum FourierForgeError {
    // ========== Handle errors ==========
    /// Handle was never issued by the target registry
    #[error("unknown {kind} handle {handle:#x}")]
    UnknownHandle { kind: HandleKind, handle: u64 },

    /// Handle refers to an object that has already been destroyed
    #[error("{kind} handle {handle:#x} refers to a destroyed object")]
    StaleHandle { kind: HandleKind, handle: u64 },

    // ========== Argument errors ==========
    /// Transform extents outside the supported domain
    #[error("invalid transform extents {nx}x{ny}x{nz}: all must be positive")]
    InvalidExtents { nx: i32, ny: i32, nz: i32 },

    /// Batch count outside the supported domain
    #[error("invalid batch count {0}: must be positive")]
    InvalidBatch(i32),

    /// Precision selector not in the supported enumeration
    #[error("unknown precision selector {0}")]
    UnknownPrecision(i32),

    /// Layout selector not in the supported enumeration
    #[error("unknown layout selector {0}")]
    UnknownLayout(i32),

    /// Direction flag not in the supported enumeration
    #[error("unknown transform direction {0}")]
    UnknownDirection(i32),

    /// Buffer capacity below what the plan requires
    #[error("buffer too small: {required} bytes required, buffer holds {actual}")]
    BufferTooSmall { required: usize, actual: usize },

    /// Zero-byte buffer allocation requested
    #[error("zero-size buffer allocation requested")]
    EmptyAllocation,

    // ========== Resource errors ==========
    /// Allocation accounting budget exceeded
    #[error("allocation of {requested} bytes exceeds device budget ({available} bytes free)")]
    OutOfDeviceMemory { requested: usize, available: usize },

    /// Transform working set does not fit in addressable memory
    #[error("transform working set overflows addressable size")]
    WorkingSetOverflow,

    // ========== Configuration errors ==========
    /// Double precision requested on a device without fp64 support
    #[error("device has no double-precision support")]
    DoublePrecisionUnavailable,

    /// Layout pair the engine cannot serve
    #[error("unsupported layout combination: {input:?} -> {output:?}")]
    UnsupportedLayoutCombination { input: Layout, output: Layout },

    /// Real input data carries no phase to invert
    #[error("real input layout only supports forward transforms")]
    RealInputInverse,

    // ========== Execution errors ==========
    /// The command queue worker faulted while running a transform
    #[error("transform execution failed: {0}")]
    ExecutionFailed(String),

    /// Worker pool construction failed during context setup
    #[error("command queue initialization failed: {0}")]
    QueueInitFailed(String),

    // ========== Lifecycle errors ==========
    /// Plans are immutable once they have executed
    #[error("plan has already executed; reconfiguration is not allowed")]
    PlanAlreadyExecuted,

    /// Teardown found plans the caller never destroyed
    #[error("context still had {0} live plan(s) at teardown")]
    LivePlansAtTeardown(usize),

    /// Second setup without an intervening teardown
    #[error("a context is already live")]
    ContextAlreadyLive,

    /// Operation requires a live context
    #[error("no live context")]
    NoLiveContext,

    // ========== Internal errors ==========
    /// Lock poisoned (indicates a bug)
    #[error("internal lock poisoned: {0}")]
    LockPoisoned(String),
}

impl FourierForgeError {
    /// Categorize the error for status-code mapping and handling decisions
    pub fn category(&self) -> ErrorCategory {
        use FourierForgeError::*;
        match self {
            UnknownHandle { .. } => ErrorCategory::InvalidHandle,

            InvalidExtents { .. }
            | InvalidBatch(_)
            | UnknownPrecision(_)
            | UnknownLayout(_)
            | UnknownDirection(_)
            | BufferTooSmall { .. }
            | EmptyAllocation => ErrorCategory::InvalidArgument,

            OutOfDeviceMemory { .. } | WorkingSetOverflow => ErrorCategory::ResourceExhausted,

            DoublePrecisionUnavailable
            | UnsupportedLayoutCombination { .. }
            | RealInputInverse => ErrorCategory::UnsupportedConfiguration,

            ExecutionFailed(_) | QueueInitFailed(_) => ErrorCategory::DeviceExecutionFailure,

            StaleHandle { .. }
            | PlanAlreadyExecuted
            | LivePlansAtTeardown(_)
            | ContextAlreadyLive
            | NoLiveContext => ErrorCategory::LifecycleViolation,

            LockPoisoned(_) => ErrorCategory::Internal,
        }
    }

    /// Status code reported across the binding surface for this error
    pub fn status_code(&self) -> i32 {
        self.category().status_code()
    }
}

/// Error category mirroring the binding surface taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Handle never issued or foreign to this registry
    InvalidHandle,
    /// Argument outside the supported domain
    InvalidArgument,
    /// Allocation budget or addressable size exceeded
    ResourceExhausted,
    /// Precision/layout combination the device cannot serve
    UnsupportedConfiguration,
    /// Worker fault during transform execution
    DeviceExecutionFailure,
    /// Operation invoked out of order
    LifecycleViolation,
    /// Engine bug (lock poisoning); outside the declared taxonomy
    Internal,
}

impl ErrorCategory {
    /// The stable status code owned by this category
    pub fn status_code(&self) -> i32 {
        match self {
            ErrorCategory::InvalidHandle => status::INVALID_HANDLE,
            ErrorCategory::InvalidArgument => status::INVALID_ARGUMENT,
            ErrorCategory::ResourceExhausted => status::RESOURCE_EXHAUSTED,
            ErrorCategory::UnsupportedConfiguration => status::UNSUPPORTED_CONFIGURATION,
            ErrorCategory::DeviceExecutionFailure => status::DEVICE_EXECUTION_FAILURE,
            ErrorCategory::LifecycleViolation => status::LIFECYCLE_VIOLATION,
            ErrorCategory::Internal => status::INTERNAL_ERROR,
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::InvalidHandle => write!(f, "InvalidHandle"),
            ErrorCategory::InvalidArgument => write!(f, "InvalidArgument"),
            ErrorCategory::ResourceExhausted => write!(f, "ResourceExhausted"),
            ErrorCategory::UnsupportedConfiguration => write!(f, "UnsupportedConfiguration"),
            ErrorCategory::DeviceExecutionFailure => write!(f, "DeviceExecutionFailure"),
            ErrorCategory::LifecycleViolation => write!(f, "LifecycleViolation"),
            ErrorCategory::Internal => write!(f, "Internal"),
        }
    }
}

impl<T> From<std::sync::PoisonError<T>> for FourierForgeError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        FourierForgeError::LockPoisoned(err.to_string())
    }
}

/// Helper type alias for Results using FourierForgeError
pub type ForgeResult<T> = std::result::Result<T, FourierForgeError>;
