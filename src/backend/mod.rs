//! Compute backend: device probe, command queue, device buffers

pub mod buffer;
pub mod device;
pub mod queue;

pub use buffer::{DeviceBuffer, MemoryLedger};
pub use device::ComputeDevice;
pub use queue::CommandQueue;
