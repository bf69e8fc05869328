//! Execution context: device, queue, and handle registries
//!
//! `FftContext` is the explicit, passed-by-reference form of what the raw
//! binding surface treats as implicit global state. Any number of contexts
//! may coexist through this API; the one-live-context restriction applies
//! only to [`crate::api`], whose argument-free teardown forces a global
//! slot.

use std::sync::Mutex;

use crate::backend::{CommandQueue, ComputeDevice, DeviceBuffer, MemoryLedger};
use crate::error::{ForgeResult, FourierForgeError, HandleKind};
use crate::plan::{scratch_bytes, Direction, Extents, Layout, Plan, Precision};
use crate::registry::HandleRegistry;
use crate::transform::{self, ExecutionArgs};

/// Default allocation budget: 2 GiB, matching a modest discrete device.
pub const DEFAULT_MEMORY_BUDGET: usize = 2 * 1024 * 1024 * 1024;

/// Knobs for context construction.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Worker threads for the command queue; 0 sizes to the device.
    pub worker_threads: usize,
    /// Allocation budget enforced for buffers and plan scratch.
    pub memory_budget: usize,
    /// Whether the device advertises double-precision support.
    pub allow_double_precision: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            worker_threads: 0,
            memory_budget: DEFAULT_MEMORY_BUDGET,
            allow_double_precision: true,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the command queue worker count (0 = auto).
    pub fn with_worker_threads(mut self, worker_threads: usize) -> Self {
        self.worker_threads = worker_threads;
        self
    }

    /// Set the allocation budget in bytes.
    pub fn with_memory_budget(mut self, memory_budget: usize) -> Self {
        self.memory_budget = memory_budget;
        self
    }

    /// Advertise or deny double-precision capability.
    pub fn with_double_precision(mut self, allow: bool) -> Self {
        self.allow_double_precision = allow;
        self
    }
}

/// An initialized backend: device, queue, and the registries every opaque
/// handle resolves through.
#[derive(Debug)]
pub struct FftContext {
    device: ComputeDevice,
    queue: CommandQueue,
    plans: Mutex<HandleRegistry<Plan>>,
    buffers: Mutex<HandleRegistry<DeviceBuffer>>,
    ledger: Mutex<MemoryLedger>,
}

impl FftContext {
    /// Initialize the backend per `config`.
    pub fn new(config: EngineConfig) -> ForgeResult<Self> {
        let device = ComputeDevice::probe(config.memory_budget, config.allow_double_precision);
        let queue = CommandQueue::new(config.worker_threads)?;

        tracing::info!(
            device = %device.name,
            workers = queue.worker_count(),
            budget = config.memory_budget,
            "context initialized"
        );

        Ok(FftContext {
            ledger: Mutex::new(MemoryLedger::new(device.total_memory)),
            device,
            queue,
            plans: Mutex::new(HandleRegistry::new(HandleKind::Plan)),
            buffers: Mutex::new(HandleRegistry::new(HandleKind::Buffer)),
        })
    }

    pub fn device(&self) -> &ComputeDevice {
        &self.device
    }

    /// Create a plan for a dense 3D transform with backend defaults
    /// (single precision, interleaved input and output).
    pub fn create_default_plan(&self, nx: i32, ny: i32, nz: i32, batch: i32) -> ForgeResult<u64> {
        let extents = Extents::from_raw(nx, ny, nz, batch)?;
        let scratch = self.provision(scratch_bytes(&extents, Precision::Single)?)?;

        let handle = self.plans.lock()?.insert(Plan::with_defaults(extents, scratch));
        tracing::debug!(handle, nx, ny, nz, batch, "plan created");
        Ok(handle)
    }

    /// Reconfigure a plan's numeric precision. Scratch is re-provisioned
    /// for the new element width.
    pub fn set_plan_precision(&self, plan: u64, precision: Precision) -> ForgeResult<()> {
        let mut plans = self.plans.lock()?;
        let entry = plans.get_mut(plan)?;
        if entry.executed() {
            return Err(FourierForgeError::PlanAlreadyExecuted);
        }
        if precision == Precision::Double && !self.device.supports_double {
            return Err(FourierForgeError::DoublePrecisionUnavailable);
        }
        if entry.precision() == precision {
            return Ok(());
        }

        let extents = *entry.extents();
        let scratch = self.provision(scratch_bytes(&extents, precision)?)?;
        let old = entry.set_precision(precision, self.device.supports_double, scratch)?;
        self.ledger.lock()?.release(old.size());
        tracing::debug!(handle = plan, ?precision, "plan precision set");
        Ok(())
    }

    /// Reconfigure a plan's input and output layouts independently.
    pub fn set_layout(&self, plan: u64, input: Layout, output: Layout) -> ForgeResult<()> {
        let mut plans = self.plans.lock()?;
        plans.get_mut(plan)?.set_layouts(input, output)?;
        tracing::debug!(handle = plan, ?input, ?output, "plan layout set");
        Ok(())
    }

    /// Execute a plan's transform, blocking until it completes.
    ///
    /// `aux`, when given, replaces the plan's internal scratch and must
    /// meet the same capacity; afterwards it holds scribbled intermediate
    /// data. Buffers are only borrowed for the duration of the call.
    pub fn execute_transform(
        &self,
        plan: u64,
        direction: Direction,
        input: u64,
        output: u64,
        aux: Option<u64>,
    ) -> ForgeResult<()> {
        // Snapshot the plan so no registry lock is held during execution.
        let (extents, precision, input_layout, output_layout, own_scratch) = {
            let plans = self.plans.lock()?;
            let entry = plans.get(plan)?;
            (
                *entry.extents(),
                entry.precision(),
                entry.input_layout(),
                entry.output_layout(),
                entry.scratch().clone(),
            )
        };

        let (input_buf, output_buf, scratch_buf) = {
            let buffers = self.buffers.lock()?;
            let scratch = match aux {
                Some(handle) => buffers.get(handle)?.clone(),
                None => own_scratch,
            };
            (buffers.get(input)?.clone(), buffers.get(output)?.clone(), scratch)
        };

        transform::execute(
            &self.queue,
            ExecutionArgs {
                extents,
                precision,
                input_layout,
                output_layout,
                direction,
                input: input_buf,
                output: output_buf,
                scratch: scratch_buf,
            },
        )?;

        // Freeze configuration. The plan may have been destroyed by another
        // thread mid-flight; that does not retract a completed transform.
        if let Ok(entry) = self.plans.lock()?.get_mut(plan) {
            entry.mark_executed();
        }
        Ok(())
    }

    /// Release a plan's device-side resources.
    pub fn destroy_plan(&self, plan: u64) -> ForgeResult<()> {
        let released = self.plans.lock()?.remove(plan)?;
        self.ledger.lock()?.release(released.scratch().size());
        tracing::debug!(handle = plan, "plan destroyed");
        Ok(())
    }

    /// Allocate a device buffer and issue its handle. Callers own the
    /// buffer's lifetime; the engine never retains it past a call.
    pub fn create_buffer(&self, bytes: usize) -> ForgeResult<u64> {
        let buffer = self.provision(bytes)?;
        Ok(self.buffers.lock()?.insert(buffer))
    }

    /// Release a buffer's allocation.
    pub fn destroy_buffer(&self, buffer: u64) -> ForgeResult<()> {
        let released = self.buffers.lock()?.remove(buffer)?;
        self.ledger.lock()?.release(released.size());
        Ok(())
    }

    /// Stage host f32 data into a buffer.
    pub fn write_buffer_f32(&self, buffer: u64, data: &[f32]) -> ForgeResult<()> {
        self.resolve_buffer(buffer)?.write_f32(data)
    }

    /// Copy a buffer's contents out as f32 data.
    pub fn read_buffer_f32(&self, buffer: u64, out: &mut [f32]) -> ForgeResult<()> {
        self.resolve_buffer(buffer)?.read_f32(out)
    }

    /// Stage host f64 data into a buffer.
    pub fn write_buffer_f64(&self, buffer: u64, data: &[f64]) -> ForgeResult<()> {
        self.resolve_buffer(buffer)?.write_f64(data)
    }

    /// Copy a buffer's contents out as f64 data.
    pub fn read_buffer_f64(&self, buffer: u64, out: &mut [f64]) -> ForgeResult<()> {
        self.resolve_buffer(buffer)?.read_f64(out)
    }

    /// Stage raw host bytes into a buffer.
    pub fn write_buffer_bytes(&self, buffer: u64, data: &[u8]) -> ForgeResult<()> {
        self.resolve_buffer(buffer)?.write_bytes(data)
    }

    /// Copy a buffer's contents out as raw bytes.
    pub fn read_buffer_bytes(&self, buffer: u64, out: &mut [u8]) -> ForgeResult<()> {
        self.resolve_buffer(buffer)?.read_bytes(out)
    }

    pub fn live_plan_count(&self) -> ForgeResult<usize> {
        Ok(self.plans.lock()?.live())
    }

    pub fn memory_in_use(&self) -> ForgeResult<usize> {
        Ok(self.ledger.lock()?.used())
    }

    /// Release all backend state. Plans the caller never destroyed are
    /// reaped, and their presence is reported as a lifecycle violation;
    /// the context is fully released either way.
    pub fn shutdown(self) -> ForgeResult<()> {
        let live_plans = {
            let mut plans = self.plans.lock()?;
            plans.drain()
        };
        let live_buffers = {
            let mut buffers = self.buffers.lock()?;
            buffers.drain()
        };

        if live_buffers > 0 {
            tracing::debug!(live_buffers, "reaped buffers at teardown");
        }
        if live_plans > 0 {
            tracing::warn!(live_plans, "plans were still live at teardown");
            return Err(FourierForgeError::LivePlansAtTeardown(live_plans));
        }
        tracing::info!("context shut down");
        Ok(())
    }

    fn resolve_buffer(&self, handle: u64) -> ForgeResult<DeviceBuffer> {
        Ok(self.buffers.lock()?.get(handle)?.clone())
    }

    /// Reserve against the ledger and allocate; the reservation is rolled
    /// back if the allocation itself fails.
    fn provision(&self, bytes: usize) -> ForgeResult<DeviceBuffer> {
        self.ledger.lock()?.reserve(bytes)?;
        match DeviceBuffer::new(bytes) {
            Ok(buffer) => Ok(buffer),
            Err(err) => {
                self.ledger.lock()?.release(bytes);
                Err(err)
            }
        }
    }
}
