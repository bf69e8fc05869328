//! Transform plans: extents, precision, layouts, and scratch provisioning
//!
//! A plan is the reusable descriptor binding a 3D transform's shape to a
//! context. Creation picks backend defaults (single precision, interleaved
//! in and out); precision and layouts may be reconfigured until the plan
//! first executes, after which it is immutable. Each plan provisions its
//! own scratch working set at creation so execution never allocates.

use crate::backend::DeviceBuffer;
use crate::error::{ForgeResult, FourierForgeError};

/// Numeric representation used for transform computation.
///
/// Raw selector values are part of the binding contract: 1 = single,
/// 2 = double.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precision {
    Single,
    Double,
}

impl Precision {
    pub fn from_raw(raw: i32) -> ForgeResult<Self> {
        match raw {
            1 => Ok(Precision::Single),
            2 => Ok(Precision::Double),
            other => Err(FourierForgeError::UnknownPrecision(other)),
        }
    }

    pub fn as_raw(self) -> i32 {
        match self {
            Precision::Single => 1,
            Precision::Double => 2,
        }
    }

    /// Size in bytes of one scalar element.
    pub fn element_size(self) -> usize {
        match self {
            Precision::Single => std::mem::size_of::<f32>(),
            Precision::Double => std::mem::size_of::<f64>(),
        }
    }
}

/// Memory arrangement of a buffer's elements.
///
/// Raw selector values are part of the binding contract: 1 = interleaved
/// re/im pairs, 2 = split (all re then all im, per batch item), 3 = real
/// scalars only. `Real` is accepted for plan input only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    Interleaved,
    Split,
    Real,
}

impl Layout {
    pub fn from_raw(raw: i32) -> ForgeResult<Self> {
        match raw {
            1 => Ok(Layout::Interleaved),
            2 => Ok(Layout::Split),
            3 => Ok(Layout::Real),
            other => Err(FourierForgeError::UnknownLayout(other)),
        }
    }

    pub fn as_raw(self) -> i32 {
        match self {
            Layout::Interleaved => 1,
            Layout::Split => 2,
            Layout::Real => 3,
        }
    }

    /// Scalars stored per logical element under this layout.
    fn scalars_per_element(self) -> usize {
        match self {
            Layout::Interleaved | Layout::Split => 2,
            Layout::Real => 1,
        }
    }

    /// Bytes one batch item occupies under this layout.
    pub fn bytes_per_item(self, volume: usize, precision: Precision) -> ForgeResult<usize> {
        volume
            .checked_mul(self.scalars_per_element())
            .and_then(|scalars| scalars.checked_mul(precision.element_size()))
            .ok_or(FourierForgeError::WorkingSetOverflow)
    }
}

/// Transform direction flag.
///
/// Raw values follow the FFT-library convention of the native backend this
/// engine stands in for: -1 = forward, 1 = inverse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Inverse,
}

impl Direction {
    pub fn from_raw(raw: i32) -> ForgeResult<Self> {
        match raw {
            -1 => Ok(Direction::Forward),
            1 => Ok(Direction::Inverse),
            other => Err(FourierForgeError::UnknownDirection(other)),
        }
    }

    pub fn as_raw(self) -> i32 {
        match self {
            Direction::Forward => -1,
            Direction::Inverse => 1,
        }
    }

    pub fn is_inverse(self) -> bool {
        matches!(self, Direction::Inverse)
    }
}

/// Validated 3D extents and batch count of a plan.
///
/// Element order is row-major with x fastest:
/// `index = x + nx * (y + ny * z)`; batch items are contiguous.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extents {
    pub nx: usize,
    pub ny: usize,
    pub nz: usize,
    pub batch: usize,
}

impl Extents {
    /// Validate raw binding-surface arguments.
    pub fn from_raw(nx: i32, ny: i32, nz: i32, batch: i32) -> ForgeResult<Self> {
        if nx <= 0 || ny <= 0 || nz <= 0 {
            return Err(FourierForgeError::InvalidExtents { nx, ny, nz });
        }
        if batch <= 0 {
            return Err(FourierForgeError::InvalidBatch(batch));
        }
        Ok(Extents {
            nx: nx as usize,
            ny: ny as usize,
            nz: nz as usize,
            batch: batch as usize,
        })
    }

    /// Elements in one batch item.
    pub fn volume(&self) -> ForgeResult<usize> {
        self.nx
            .checked_mul(self.ny)
            .and_then(|xy| xy.checked_mul(self.nz))
            .ok_or(FourierForgeError::WorkingSetOverflow)
    }

    /// Elements across the whole batch.
    pub fn total_elements(&self) -> ForgeResult<usize> {
        self.volume()?
            .checked_mul(self.batch)
            .ok_or(FourierForgeError::WorkingSetOverflow)
    }
}

/// Scratch capacity a plan provisions: one batch item's interleaved complex
/// working set.
pub fn scratch_bytes(extents: &Extents, precision: Precision) -> ForgeResult<usize> {
    Layout::Interleaved.bytes_per_item(extents.volume()?, precision)
}

/// A configured 3D transform bound to one context.
#[derive(Debug)]
pub struct Plan {
    extents: Extents,
    precision: Precision,
    input_layout: Layout,
    output_layout: Layout,
    scratch: DeviceBuffer,
    executed: bool,
}

impl Plan {
    /// Build a plan with backend defaults: single precision, interleaved
    /// input and output. `scratch` must already satisfy [`scratch_bytes`]
    /// for single precision.
    pub fn with_defaults(extents: Extents, scratch: DeviceBuffer) -> Self {
        Plan {
            extents,
            precision: Precision::Single,
            input_layout: Layout::Interleaved,
            output_layout: Layout::Interleaved,
            scratch,
            executed: false,
        }
    }

    pub fn extents(&self) -> &Extents {
        &self.extents
    }

    pub fn precision(&self) -> Precision {
        self.precision
    }

    pub fn input_layout(&self) -> Layout {
        self.input_layout
    }

    pub fn output_layout(&self) -> Layout {
        self.output_layout
    }

    pub fn scratch(&self) -> &DeviceBuffer {
        &self.scratch
    }

    pub fn executed(&self) -> bool {
        self.executed
    }

    /// Reconfigure numeric precision. The caller supplies the re-provisioned
    /// scratch buffer sized for the new element width.
    pub fn set_precision(
        &mut self,
        precision: Precision,
        supports_double: bool,
        scratch: DeviceBuffer,
    ) -> ForgeResult<DeviceBuffer> {
        self.ensure_configurable()?;
        if precision == Precision::Double && !supports_double {
            return Err(FourierForgeError::DoublePrecisionUnavailable);
        }
        self.precision = precision;
        let old = std::mem::replace(&mut self.scratch, scratch);
        Ok(old)
    }

    /// Reconfigure input and output layouts independently.
    pub fn set_layouts(&mut self, input: Layout, output: Layout) -> ForgeResult<()> {
        self.ensure_configurable()?;
        // Real data carries no imaginary plane to write a spectrum into.
        if output == Layout::Real {
            return Err(FourierForgeError::UnsupportedLayoutCombination { input, output });
        }
        self.input_layout = input;
        self.output_layout = output;
        Ok(())
    }

    /// Bytes the input buffer must hold for this plan.
    pub fn required_input_bytes(&self) -> ForgeResult<usize> {
        self.required_bytes(self.input_layout)
    }

    /// Bytes the output buffer must hold for this plan.
    pub fn required_output_bytes(&self) -> ForgeResult<usize> {
        self.required_bytes(self.output_layout)
    }

    /// Bytes the scratch (or caller-supplied aux) buffer must hold.
    pub fn required_scratch_bytes(&self) -> ForgeResult<usize> {
        scratch_bytes(&self.extents, self.precision)
    }

    /// Flag the plan as executed; configuration is frozen from here on.
    pub fn mark_executed(&mut self) {
        self.executed = true;
    }

    fn required_bytes(&self, layout: Layout) -> ForgeResult<usize> {
        layout
            .bytes_per_item(self.extents.volume()?, self.precision)?
            .checked_mul(self.extents.batch)
            .ok_or(FourierForgeError::WorkingSetOverflow)
    }

    fn ensure_configurable(&self) -> ForgeResult<()> {
        if self.executed {
            return Err(FourierForgeError::PlanAlreadyExecuted);
        }
        Ok(())
    }
}
