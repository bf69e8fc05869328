//! FourierForge - plan-based 3D FFT execution engine
//!
//! A reference implementation of the execution-context lifecycle behind a
//! 3D FFT accelerator binding: a context wraps an initialized device and
//! command queue, plans describe configured transforms (extents, batch,
//! precision, memory layout), and the executor runs forward/inverse
//! transforms against caller-owned buffers.
//!
//! Two surfaces are exposed:
//! - [`context::FftContext`]: the typed, multi-context Rust API.
//! - [`api`]: the flat u64-handle/status-code surface shaped for a
//!   managed-language wrapper, with a process-global context slot.
//!
//! Transforms are unnormalized in both directions; callers apply any
//! 1/(nx*ny*nz) scaling themselves.

pub mod api;
pub mod backend;
pub mod context;
pub mod error;
pub mod logging;
pub mod plan;
pub mod registry;
pub mod transform;

pub use backend::{CommandQueue, ComputeDevice, DeviceBuffer};
pub use context::{EngineConfig, FftContext};
pub use error::{ErrorCategory, ForgeResult, FourierForgeError};
pub use plan::{Direction, Extents, Layout, Plan, Precision};
