//! Device probe and capability reporting
//!
//! The reference backend executes on the host CPU, but the engine treats it
//! through the same shape a GPU runtime would expose: a probed device with
//! a name, a memory capacity, a compute-unit count, and capability flags
//! that configuration can restrict (e.g. denying fp64 to mirror devices
//! without double-precision units).

/// Description of the device a context executes on.
#[derive(Debug, Clone)]
pub struct ComputeDevice {
    pub name: String,
    /// Allocation budget in bytes enforced by the context's ledger.
    pub total_memory: usize,
    pub compute_units: usize,
    pub supports_double: bool,
}

impl ComputeDevice {
    /// Probe the host and apply configured capability restrictions.
    pub fn probe(memory_budget: usize, allow_double_precision: bool) -> Self {
        let compute_units = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);

        let device = ComputeDevice {
            name: "cpu-reference".to_string(),
            total_memory: memory_budget,
            compute_units,
            supports_double: allow_double_precision,
        };
        tracing::debug!(
            device = %device.name,
            compute_units = device.compute_units,
            total_memory = device.total_memory,
            supports_double = device.supports_double,
            "probed compute device"
        );
        device
    }
}
