//! Transform executor: validation, staging, and kernel dispatch
//!
//! Execution is stateless with respect to the buffers involved: the engine
//! reads the input, transforms a working copy, and writes the output, all
//! within the one blocking call. The scratch buffer (the plan's own, or a
//! caller-supplied aux buffer of at least the same capacity) carries each
//! batch item's unpacked working set on its way in; whatever it holds
//! afterwards is scribble, never meaningful caller data.

pub mod kernels;

use rayon::prelude::*;

use crate::backend::{CommandQueue, DeviceBuffer};
use crate::error::{ForgeResult, FourierForgeError};
use crate::plan::{Direction, Extents, Layout, Precision};

use kernels::{c_zero, Complex, FftScalar};

/// Everything the executor needs for one transform, snapshotted from the
/// plan so no registry lock is held while kernels run.
#[derive(Debug)]
pub struct ExecutionArgs {
    pub extents: Extents,
    pub precision: Precision,
    pub input_layout: Layout,
    pub output_layout: Layout,
    pub direction: Direction,
    pub input: DeviceBuffer,
    pub output: DeviceBuffer,
    pub scratch: DeviceBuffer,
}

/// Run a fully configured 3D transform, blocking until it completes.
pub fn execute(queue: &CommandQueue, args: ExecutionArgs) -> ForgeResult<()> {
    if args.input_layout == Layout::Real && args.direction.is_inverse() {
        return Err(FourierForgeError::RealInputInverse);
    }

    match args.precision {
        Precision::Single => run::<f32>(queue, &args),
        Precision::Double => run::<f64>(queue, &args),
    }
}

fn run<T: FftScalar>(queue: &CommandQueue, args: &ExecutionArgs) -> ForgeResult<()> {
    let volume = args.extents.volume()?;
    let batch = args.extents.batch;

    check_capacity(
        &args.input,
        required_bytes::<T>(args.input_layout, volume, batch)?,
    )?;
    check_capacity(
        &args.output,
        required_bytes::<T>(args.output_layout, volume, batch)?,
    )?;
    // Scratch holds one batch item's interleaved working set.
    check_capacity(&args.scratch, volume * 2 * T::ELEMENT_SIZE)?;

    tracing::debug!(
        nx = args.extents.nx,
        ny = args.extents.ny,
        nz = args.extents.nz,
        batch,
        direction = ?args.direction,
        precision = ?args.precision,
        "executing transform"
    );

    // Stage every batch item through scratch into the working set.
    let mut working: Vec<Complex<T>> = vec![c_zero::<T>(); volume * batch];
    for item in 0..batch {
        let chunk = &mut working[item * volume..(item + 1) * volume];
        unpack_item::<T>(&args.input, args.input_layout, item, volume, chunk)?;
        stage_item::<T>(&args.scratch, chunk)?;
    }

    let extents = args.extents;
    let inverse = args.direction.is_inverse();
    queue.submit(move || {
        working
            .par_chunks_mut(volume)
            .for_each(|item| kernels::transform_volume(item, &extents, inverse));
        working
    })
    .and_then(|transformed| {
        for item in 0..batch {
            let chunk = &transformed[item * volume..(item + 1) * volume];
            pack_item::<T>(&args.output, args.output_layout, item, volume, chunk)?;
        }
        Ok(())
    })
}

fn required_bytes<T: FftScalar>(
    layout: Layout,
    volume: usize,
    batch: usize,
) -> ForgeResult<usize> {
    let scalars = match layout {
        Layout::Interleaved | Layout::Split => 2,
        Layout::Real => 1,
    };
    volume
        .checked_mul(scalars)
        .and_then(|per_item| per_item.checked_mul(T::ELEMENT_SIZE))
        .and_then(|bytes| bytes.checked_mul(batch))
        .ok_or(FourierForgeError::WorkingSetOverflow)
}

fn check_capacity(buffer: &DeviceBuffer, required: usize) -> ForgeResult<()> {
    if buffer.size() < required {
        return Err(FourierForgeError::BufferTooSmall {
            required,
            actual: buffer.size(),
        });
    }
    Ok(())
}

/// Read one batch item out of `buffer` into the working set.
fn unpack_item<T: FftScalar>(
    buffer: &DeviceBuffer,
    layout: Layout,
    item: usize,
    volume: usize,
    dst: &mut [Complex<T>],
) -> ForgeResult<()> {
    buffer.with_bytes(|bytes| match layout {
        Layout::Interleaved => {
            let base = item * volume * 2;
            for (i, slot) in dst.iter_mut().enumerate() {
                *slot = (
                    T::read_from(bytes, base + 2 * i),
                    T::read_from(bytes, base + 2 * i + 1),
                );
            }
        }
        Layout::Split => {
            let base = item * volume * 2;
            for (i, slot) in dst.iter_mut().enumerate() {
                *slot = (
                    T::read_from(bytes, base + i),
                    T::read_from(bytes, base + volume + i),
                );
            }
        }
        Layout::Real => {
            let base = item * volume;
            for (i, slot) in dst.iter_mut().enumerate() {
                *slot = (T::read_from(bytes, base + i), T::zero());
            }
        }
    })
}

/// Write one batch item of the working set into `buffer`.
fn pack_item<T: FftScalar>(
    buffer: &DeviceBuffer,
    layout: Layout,
    item: usize,
    volume: usize,
    src: &[Complex<T>],
) -> ForgeResult<()> {
    buffer.with_bytes_mut(|bytes| match layout {
        Layout::Interleaved => {
            let base = item * volume * 2;
            for (i, value) in src.iter().enumerate() {
                value.0.write_to(bytes, base + 2 * i);
                value.1.write_to(bytes, base + 2 * i + 1);
            }
        }
        Layout::Split => {
            let base = item * volume * 2;
            for (i, value) in src.iter().enumerate() {
                value.0.write_to(bytes, base + i);
                value.1.write_to(bytes, base + volume + i);
            }
        }
        // Real output layouts are rejected at plan configuration.
        Layout::Real => {
            let base = item * volume;
            for (i, value) in src.iter().enumerate() {
                value.0.write_to(bytes, base + i);
            }
        }
    })
}

/// Stage a batch item's working set through scratch, interleaved.
fn stage_item<T: FftScalar>(scratch: &DeviceBuffer, chunk: &[Complex<T>]) -> ForgeResult<()> {
    scratch.with_bytes_mut(|bytes| {
        for (i, value) in chunk.iter().enumerate() {
            value.0.write_to(bytes, 2 * i);
            value.1.write_to(bytes, 2 * i + 1);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;

    fn extents(nx: usize, ny: usize, nz: usize, batch: usize) -> Extents {
        Extents { nx, ny, nz, batch }
    }

    fn args_for(
        ext: Extents,
        input_layout: Layout,
        output_layout: Layout,
        direction: Direction,
    ) -> ExecutionArgs {
        let volume = ext.volume().unwrap();
        let in_scalars = if input_layout == Layout::Real { 1 } else { 2 };
        ExecutionArgs {
            extents: ext,
            precision: Precision::Double,
            input_layout,
            output_layout,
            direction,
            input: DeviceBuffer::new(volume * ext.batch * in_scalars * 8).unwrap(),
            output: DeviceBuffer::new(volume * ext.batch * 2 * 8).unwrap(),
            scratch: DeviceBuffer::new(volume * 2 * 8).unwrap(),
        }
    }

    #[test]
    fn split_and_interleaved_inputs_produce_identical_spectra() {
        let queue = CommandQueue::new(1).unwrap();
        let ext = extents(4, 2, 2, 1);
        let volume = 16usize;

        let signal: Vec<f64> = (0..volume).map(|i| (i as f64 * 0.37).sin()).collect();

        let interleaved = args_for(ext, Layout::Interleaved, Layout::Interleaved, Direction::Forward);
        let mut packed = vec![0.0f64; volume * 2];
        for (i, &value) in signal.iter().enumerate() {
            packed[2 * i] = value;
        }
        interleaved.input.write_f64(&packed).unwrap();

        let split = args_for(ext, Layout::Split, Layout::Interleaved, Direction::Forward);
        let mut planar = vec![0.0f64; volume * 2];
        planar[..volume].copy_from_slice(&signal);
        split.input.write_f64(&planar).unwrap();

        let out_a = interleaved.output.clone();
        let out_b = split.output.clone();
        execute(&queue, interleaved).unwrap();
        execute(&queue, split).unwrap();

        let mut spectrum_a = vec![0.0f64; volume * 2];
        let mut spectrum_b = vec![0.0f64; volume * 2];
        out_a.read_f64(&mut spectrum_a).unwrap();
        out_b.read_f64(&mut spectrum_b).unwrap();
        for (a, b) in spectrum_a.iter().zip(&spectrum_b) {
            assert!((a - b).abs() <= 1e-12);
        }
    }

    #[test]
    fn real_input_matches_complex_input_with_zero_imaginary() {
        let queue = CommandQueue::new(1).unwrap();
        let ext = extents(4, 4, 1, 1);
        let volume = 16usize;

        let signal: Vec<f64> = (0..volume).map(|i| 1.0 + (i as f64 * 0.81).cos()).collect();

        let real = args_for(ext, Layout::Real, Layout::Interleaved, Direction::Forward);
        real.input.write_f64(&signal).unwrap();

        let complex = args_for(ext, Layout::Interleaved, Layout::Interleaved, Direction::Forward);
        let mut packed = vec![0.0f64; volume * 2];
        for (i, &value) in signal.iter().enumerate() {
            packed[2 * i] = value;
        }
        complex.input.write_f64(&packed).unwrap();

        let out_real = real.output.clone();
        let out_complex = complex.output.clone();
        execute(&queue, real).unwrap();
        execute(&queue, complex).unwrap();

        let mut a = vec![0.0f64; volume * 2];
        let mut b = vec![0.0f64; volume * 2];
        out_real.read_f64(&mut a).unwrap();
        out_complex.read_f64(&mut b).unwrap();
        for (x, y) in a.iter().zip(&b) {
            assert!((x - y).abs() <= 1e-12);
        }
    }

    #[test]
    fn inverse_with_real_input_layout_is_unsupported() {
        let queue = CommandQueue::new(1).unwrap();
        let args = args_for(
            extents(4, 4, 4, 1),
            Layout::Real,
            Layout::Interleaved,
            Direction::Inverse,
        );
        let err = execute(&queue, args).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::UnsupportedConfiguration);
    }

    #[test]
    fn undersized_input_buffer_is_rejected() {
        let queue = CommandQueue::new(1).unwrap();
        let ext = extents(8, 8, 8, 1);
        let mut args = args_for(ext, Layout::Interleaved, Layout::Interleaved, Direction::Forward);
        args.input = DeviceBuffer::new(64).unwrap();

        let err = execute(&queue, args).unwrap_err();
        assert!(matches!(err, FourierForgeError::BufferTooSmall { .. }));
    }

    #[test]
    fn batched_items_transform_independently() {
        let queue = CommandQueue::new(2).unwrap();
        let ext = extents(4, 1, 1, 2);
        let args = args_for(ext, Layout::Interleaved, Layout::Interleaved, Direction::Forward);

        // Item 0: impulse; item 1: constant ones.
        let mut packed = vec![0.0f64; 4 * 2 * 2];
        packed[0] = 1.0;
        for i in 0..4 {
            packed[8 + 2 * i] = 1.0;
        }
        args.input.write_f64(&packed).unwrap();

        let out = args.output.clone();
        execute(&queue, args).unwrap();

        let mut spectrum = vec![0.0f64; 16];
        out.read_f64(&mut spectrum).unwrap();

        // Impulse: flat spectrum of ones.
        for k in 0..4 {
            assert!((spectrum[2 * k] - 1.0).abs() <= 1e-12);
            assert!(spectrum[2 * k + 1].abs() <= 1e-12);
        }
        // Constant: DC bin of n, zero elsewhere.
        assert!((spectrum[8] - 4.0).abs() <= 1e-12);
        for k in 1..4 {
            assert!(spectrum[8 + 2 * k].abs() <= 1e-12);
            assert!(spectrum[8 + 2 * k + 1].abs() <= 1e-12);
        }
    }

    #[test]
    fn scratch_receives_staged_working_set() {
        let queue = CommandQueue::new(1).unwrap();
        let ext = extents(2, 1, 1, 1);
        let args = args_for(ext, Layout::Interleaved, Layout::Interleaved, Direction::Forward);
        args.input.write_f64(&[3.0, 0.0, 5.0, 0.0]).unwrap();

        let scratch = args.scratch.clone();
        execute(&queue, args).unwrap();

        // The staged (pre-transform) working set of the last item.
        let mut staged = vec![0.0f64; 4];
        scratch.read_f64(&mut staged).unwrap();
        assert_eq!(staged, vec![3.0, 0.0, 5.0, 0.0]);
    }
}
