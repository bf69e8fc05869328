//! Raw binding surface: the flat handle/status operation set
//!
//! This module carries the contract a managed-language wrapper calls
//! through: handles are plain u64 values, every fallible operation returns
//! a status code synchronously, and nothing here panics on misuse. Setup
//! and plan creation signal failure with the 0-handle sentinel; everything
//! else returns a code from [`crate::error::status`].
//!
//! The argument-free `teardown` forces a process-global context slot, so
//! at most one context is live through this surface at a time. The typed
//! [`crate::context::FftContext`] API has no such restriction.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use once_cell::sync::OnceCell;

use crate::context::{EngineConfig, FftContext};
use crate::error::{status, ForgeResult, FourierForgeError};
use crate::logging;
use crate::plan::{Direction, Layout, Precision};

struct EngineSlot {
    handle: u64,
    context: FftContext,
}

static LIVE_ENGINE: OnceCell<Mutex<Option<EngineSlot>>> = OnceCell::new();
static NEXT_CONTEXT_HANDLE: AtomicU64 = AtomicU64::new(1);

fn engine_slot() -> &'static Mutex<Option<EngineSlot>> {
    LIVE_ENGINE.get_or_init(|| Mutex::new(None))
}

/// Initialize the backend and return its context handle.
///
/// Returns the 0 sentinel if initialization fails or a context is already
/// live (calling setup twice without an intervening teardown is a
/// precondition violation, surfaced rather than silently handled).
pub fn setup() -> u64 {
    logging::init_logging_default();

    let mut slot = match engine_slot().lock() {
        Ok(slot) => slot,
        Err(_) => return 0,
    };
    if slot.is_some() {
        tracing::warn!(error = %FourierForgeError::ContextAlreadyLive, "setup rejected");
        return 0;
    }

    match FftContext::new(EngineConfig::default()) {
        Ok(context) => {
            let handle = NEXT_CONTEXT_HANDLE.fetch_add(1, Ordering::Relaxed);
            *slot = Some(EngineSlot { handle, context });
            handle
        }
        Err(e) => {
            tracing::error!(error = %e, "context setup failed");
            0
        }
    }
}

/// Release all backend state.
///
/// Plans the caller never destroyed are reaped and reported via a
/// `LifecycleViolation` status; the slot is emptied either way, so a
/// subsequent `setup` succeeds.
pub fn teardown() -> i32 {
    let taken = match engine_slot().lock() {
        Ok(mut slot) => slot.take(),
        Err(_) => return status::INTERNAL_ERROR,
    };
    match taken {
        Some(engine) => status_of(engine.context.shutdown()),
        None => FourierForgeError::NoLiveContext.status_code(),
    }
}

/// Create a plan with backend defaults for the given extents and batch.
///
/// Returns the 0 sentinel on failure: invalid context handle, non-positive
/// dimensions, or scratch provisioning failure.
pub fn create_default_plan(context: u64, nx: i32, ny: i32, nz: i32, batch: i32) -> u64 {
    let slot = match engine_slot().lock() {
        Ok(slot) => slot,
        Err(_) => return 0,
    };
    let engine = match slot.as_ref() {
        Some(engine) if engine.handle == context => engine,
        _ => {
            tracing::debug!(context, "create_default_plan: no such context");
            return 0;
        }
    };
    match engine.context.create_default_plan(nx, ny, nz, batch) {
        Ok(handle) => handle,
        Err(e) => {
            tracing::debug!(error = %e, "create_default_plan failed");
            0
        }
    }
}

/// Reconfigure a plan's numeric precision (1 = single, 2 = double).
pub fn set_plan_precision(plan: u64, precision: i32) -> i32 {
    with_context(|ctx| {
        let precision = Precision::from_raw(precision)?;
        ctx.set_plan_precision(plan, precision)
    })
}

/// Reconfigure a plan's input and output layouts (1 = interleaved,
/// 2 = split, 3 = real).
pub fn set_layout(plan: u64, input_layout: i32, output_layout: i32) -> i32 {
    with_context(|ctx| {
        let input = Layout::from_raw(input_layout)?;
        let output = Layout::from_raw(output_layout)?;
        ctx.set_layout(plan, input, output)
    })
}

/// Execute a plan's transform (direction: -1 = forward, 1 = inverse),
/// blocking until it completes. `aux` may be 0 when the caller supplies no
/// scratch buffer.
pub fn execute_transform(plan: u64, direction: i32, input: u64, output: u64, aux: u64) -> i32 {
    with_context(|ctx| {
        let direction = Direction::from_raw(direction)?;
        let aux = if aux == 0 { None } else { Some(aux) };
        ctx.execute_transform(plan, direction, input, output, aux)
    })
}

/// Release a plan's device-side resources.
pub fn destroy_plan(plan: u64) -> i32 {
    with_context(|ctx| ctx.destroy_plan(plan))
}

/// Allocate a device buffer of `bytes` and return its handle (0 sentinel
/// on failure). Device-memory surface for the wrapper layer; the engine
/// never retains a buffer past an execute call.
pub fn create_buffer(context: u64, bytes: u64) -> u64 {
    let slot = match engine_slot().lock() {
        Ok(slot) => slot,
        Err(_) => return 0,
    };
    let engine = match slot.as_ref() {
        Some(engine) if engine.handle == context => engine,
        _ => return 0,
    };
    match engine.context.create_buffer(bytes as usize) {
        Ok(handle) => handle,
        Err(e) => {
            tracing::debug!(error = %e, "create_buffer failed");
            0
        }
    }
}

/// Release a device buffer.
pub fn destroy_buffer(buffer: u64) -> i32 {
    with_context(|ctx| ctx.destroy_buffer(buffer))
}

/// Stage host bytes into a device buffer.
pub fn write_buffer(buffer: u64, data: &[u8]) -> i32 {
    with_context(|ctx| ctx.write_buffer_bytes(buffer, data))
}

/// Copy a device buffer's contents out to host bytes.
pub fn read_buffer(buffer: u64, out: &mut [u8]) -> i32 {
    with_context(|ctx| ctx.read_buffer_bytes(buffer, out))
}

fn with_context(f: impl FnOnce(&FftContext) -> ForgeResult<()>) -> i32 {
    let slot = match engine_slot().lock() {
        Ok(slot) => slot,
        Err(_) => return status::INTERNAL_ERROR,
    };
    match slot.as_ref() {
        // With no live context, no plan or buffer handle can be live either.
        None => status::INVALID_HANDLE,
        Some(engine) => status_of(f(&engine.context)),
    }
}

fn status_of(result: ForgeResult<()>) -> i32 {
    match result {
        Ok(()) => status::OK,
        Err(e) => {
            tracing::debug!(error = %e, code = e.status_code(), "operation failed");
            e.status_code()
        }
    }
}
