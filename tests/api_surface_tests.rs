//! End-to-end tests of the raw handle/status binding surface
//!
//! These tests share the process-global context slot, so each runs
//! serialized and tears down whatever it set up.

use serial_test::serial;

use fourierforge::api;
use fourierforge::error::status;

fn f32s_to_bytes(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_ne_bytes()).collect()
}

fn bytes_to_f32s(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Make sure a prior test's leaked state never bleeds into this one.
fn reset() {
    let _ = api::teardown();
}

#[test]
#[serial]
fn impulse_scenario_end_to_end_with_all_zero_statuses() {
    reset();

    let ctx = api::setup();
    assert_ne!(ctx, 0, "setup must yield a live context handle");

    let plan = api::create_default_plan(ctx, 8, 8, 8, 1);
    assert_ne!(plan, 0, "plan creation must yield a live plan handle");

    let volume = 8 * 8 * 8usize;
    let bytes = (volume * 2 * 4) as u64;
    let input = api::create_buffer(ctx, bytes);
    let output = api::create_buffer(ctx, bytes);
    assert_ne!(input, 0);
    assert_ne!(output, 0);

    let mut impulse = vec![0.0f32; volume * 2];
    impulse[0] = 1.0;
    assert_eq!(api::write_buffer(input, &f32s_to_bytes(&impulse)), status::OK);

    // Forward direction flag is -1.
    assert_eq!(
        api::execute_transform(plan, -1, input, output, 0),
        status::OK
    );

    let mut raw = vec![0u8; volume * 2 * 4];
    assert_eq!(api::read_buffer(output, &mut raw), status::OK);
    let spectrum = bytes_to_f32s(&raw);
    for bin in 0..volume {
        let (re, im) = (spectrum[2 * bin], spectrum[2 * bin + 1]);
        let magnitude = (re * re + im * im).sqrt();
        assert!(
            (magnitude - 1.0).abs() <= 1e-4,
            "bin {bin}: magnitude {magnitude} != 1"
        );
    }

    assert_eq!(api::destroy_buffer(input), status::OK);
    assert_eq!(api::destroy_buffer(output), status::OK);
    assert_eq!(api::destroy_plan(plan), status::OK);
    assert_eq!(api::teardown(), status::OK);
}

#[test]
#[serial]
fn double_setup_returns_the_zero_sentinel() {
    reset();

    let first = api::setup();
    assert_ne!(first, 0);

    let second = api::setup();
    assert_eq!(second, 0, "second setup without teardown must fail");

    // The first context is still usable afterwards.
    let plan = api::create_default_plan(first, 4, 4, 4, 1);
    assert_ne!(plan, 0);
    assert_eq!(api::destroy_plan(plan), status::OK);
    assert_eq!(api::teardown(), status::OK);
}

#[test]
#[serial]
fn invalid_dimensions_return_the_zero_sentinel() {
    reset();

    let ctx = api::setup();
    assert_eq!(api::create_default_plan(ctx, 0, 8, 8, 1), 0);
    assert_eq!(api::create_default_plan(ctx, 8, -2, 8, 1), 0);
    assert_eq!(api::create_default_plan(ctx, 8, 8, 8, 0), 0);
    assert_eq!(api::teardown(), status::OK);
}

#[test]
#[serial]
fn foreign_context_handle_cannot_create_plans() {
    reset();

    let ctx = api::setup();
    assert_eq!(api::create_default_plan(ctx + 999, 8, 8, 8, 1), 0);
    assert_eq!(api::teardown(), status::OK);
}

#[test]
#[serial]
fn plan_configuration_status_codes() {
    reset();

    let ctx = api::setup();
    let plan = api::create_default_plan(ctx, 8, 8, 8, 1);

    // Valid selectors.
    assert_eq!(api::set_plan_precision(plan, 2), status::OK);
    assert_eq!(api::set_layout(plan, 2, 2), status::OK);

    // Out-of-domain selectors.
    assert_eq!(api::set_plan_precision(plan, 7), status::INVALID_ARGUMENT);
    assert_eq!(api::set_layout(plan, 1, 9), status::INVALID_ARGUMENT);

    // Real output layout is an unsupported combination.
    assert_eq!(api::set_layout(plan, 1, 3), status::UNSUPPORTED_CONFIGURATION);

    assert_eq!(api::destroy_plan(plan), status::OK);
    assert_eq!(api::teardown(), status::OK);
}

#[test]
#[serial]
fn destroyed_plan_reports_lifecycle_violation_and_context_survives() {
    reset();

    let ctx = api::setup();
    let plan = api::create_default_plan(ctx, 4, 4, 4, 1);
    assert_eq!(api::destroy_plan(plan), status::OK);

    assert_eq!(api::destroy_plan(plan), status::LIFECYCLE_VIOLATION);
    assert_eq!(api::set_plan_precision(plan, 1), status::LIFECYCLE_VIOLATION);

    // A fresh plan is still obtainable after the violation.
    let fresh = api::create_default_plan(ctx, 4, 4, 4, 1);
    assert_ne!(fresh, 0);
    assert_eq!(api::destroy_plan(fresh), status::OK);
    assert_eq!(api::teardown(), status::OK);
}

#[test]
#[serial]
fn never_issued_plan_handle_is_invalid() {
    reset();

    let _ctx = api::setup();
    assert_eq!(api::destroy_plan(0xbad), status::INVALID_HANDLE);
    assert_eq!(
        api::execute_transform(0xbad, -1, 0, 0, 0),
        status::INVALID_HANDLE
    );
    assert_eq!(api::teardown(), status::OK);
}

#[test]
#[serial]
fn unknown_direction_flag_is_an_invalid_argument() {
    reset();

    let ctx = api::setup();
    let plan = api::create_default_plan(ctx, 4, 4, 4, 1);
    let bytes = (4 * 4 * 4 * 2 * 4) as u64;
    let input = api::create_buffer(ctx, bytes);
    let output = api::create_buffer(ctx, bytes);

    assert_eq!(
        api::execute_transform(plan, 0, input, output, 0),
        status::INVALID_ARGUMENT
    );
    assert_eq!(
        api::execute_transform(plan, 2, input, output, 0),
        status::INVALID_ARGUMENT
    );

    assert_eq!(api::destroy_plan(plan), status::OK);
    assert_eq!(api::teardown(), status::OK);
}

#[test]
#[serial]
fn teardown_with_live_plans_reports_violation_but_frees_the_slot() {
    reset();

    let ctx = api::setup();
    let _leaked = api::create_default_plan(ctx, 4, 4, 4, 1);

    assert_eq!(api::teardown(), status::LIFECYCLE_VIOLATION);

    // The slot was emptied regardless, so a new context can come up.
    let fresh = api::setup();
    assert_ne!(fresh, 0);
    assert_eq!(api::teardown(), status::OK);
}

#[test]
#[serial]
fn operations_without_a_live_context_fail_cleanly() {
    reset();

    assert_eq!(api::destroy_plan(1), status::INVALID_HANDLE);
    assert_eq!(api::set_plan_precision(1, 1), status::INVALID_HANDLE);
    assert_eq!(api::create_default_plan(1, 8, 8, 8, 1), 0);
    assert_eq!(api::teardown(), status::LIFECYCLE_VIOLATION);
}

#[test]
#[serial]
fn roundtrip_through_the_raw_surface_recovers_input() {
    reset();

    let ctx = api::setup();
    let plan = api::create_default_plan(ctx, 4, 4, 2, 1);
    let volume = 4 * 4 * 2usize;
    let bytes = (volume * 2 * 4) as u64;

    let input = api::create_buffer(ctx, bytes);
    let spectrum = api::create_buffer(ctx, bytes);
    let recovered = api::create_buffer(ctx, bytes);

    let original: Vec<f32> = (0..volume * 2).map(|i| (i as f32 * 0.11).sin()).collect();
    assert_eq!(
        api::write_buffer(input, &f32s_to_bytes(&original)),
        status::OK
    );

    assert_eq!(
        api::execute_transform(plan, -1, input, spectrum, 0),
        status::OK
    );
    assert_eq!(
        api::execute_transform(plan, 1, spectrum, recovered, 0),
        status::OK
    );

    let mut raw = vec![0u8; volume * 2 * 4];
    assert_eq!(api::read_buffer(recovered, &mut raw), status::OK);
    let result = bytes_to_f32s(&raw);

    let scale = 1.0 / volume as f32;
    for (i, (&got, &expected)) in result.iter().zip(&original).enumerate() {
        assert!(
            (got * scale - expected).abs() <= 1e-4,
            "scalar {i} diverged through the raw surface"
        );
    }

    assert_eq!(api::destroy_plan(plan), status::OK);
    assert_eq!(api::teardown(), status::OK);
}
