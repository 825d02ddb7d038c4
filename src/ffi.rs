use std::panic;

use log::warn;

use crate::config::{FlowConfig, SliceMethod};
use crate::engine::{FlowEngine, FlowRecord, MotionEstimator};
use crate::event::Event;
use crate::reichardt::ReichardtFlow;

// --- FlowEngine FFI ---

/// Creates a patch-match flow engine, already reset for a `width` x `height` sensor.
///
/// `slice_method` is 0 for constant duration, 1 for constant event count.
/// Returns a null pointer if any parameter is invalid or the subsampled grid
/// is too small for `search_distance`.
#[no_mangle]
#[allow(clippy::too_many_arguments)]
pub extern "C" fn edvs_flow_engine_create(
    width: u32,
    height: u32,
    search_distance: u32,
    subsample_shift: u32,
    slice_method: i32,
    slice_duration_us: i64,
    slice_event_count: u32,
    scale_factor: f32,
) -> *mut FlowEngine {
    let Some(slice_method) = SliceMethod::from_i32(slice_method) else {
        return std::ptr::null_mut();
    };
    let config = FlowConfig {
        search_distance,
        subsample_shift,
        slice_method,
        slice_duration_us,
        slice_event_count,
        scale_factor,
        ..FlowConfig::default()
    };
    let result = panic::catch_unwind(|| FlowEngine::with_sensor(config, width, height));
    match result {
        Ok(Ok(engine)) => Box::into_raw(Box::new(engine)),
        Ok(Err(e)) => {
            warn!("edvs_flow_engine_create: {}", e);
            std::ptr::null_mut()
        }
        Err(_) => std::ptr::null_mut(),
    }
}

/// Re-derives the working grid for a new sensor size and zeroes all slices.
/// Returns false if the size is invalid; the engine then rejects every event
/// until a later reset succeeds.
///
/// # Safety
///
/// - `engine` must be a valid pointer returned by `edvs_flow_engine_create`, or null.
/// - Must not be called concurrently with any other call on the same `engine`.
#[no_mangle]
pub unsafe extern "C" fn edvs_flow_engine_reset(
    engine: *mut FlowEngine,
    width: u32,
    height: u32,
) -> bool {
    if engine.is_null() {
        return false;
    }
    let engine_ref = &mut *engine;
    panic::catch_unwind(panic::AssertUnwindSafe(|| {
        engine_ref.reset(width, height).is_ok()
    }))
    .unwrap_or(false)
}

/// Processes one event. Returns true and writes `out` if a flow record was produced.
///
/// # Safety
///
/// - `engine` must be a valid, non-null pointer returned by `edvs_flow_engine_create`.
/// - `event` must be a valid, non-null pointer to an initialized `Event`.
/// - `out` must be a valid, non-null pointer to writable `FlowRecord` storage.
/// - `engine` must not be used concurrently from multiple threads.
#[no_mangle]
pub unsafe extern "C" fn edvs_flow_engine_process(
    engine: *mut FlowEngine,
    event: *const Event,
    out: *mut FlowRecord,
) -> bool {
    if engine.is_null() || event.is_null() || out.is_null() {
        return false;
    }
    let engine_ref = &mut *engine;
    let event_ref = &*event;
    let result = panic::catch_unwind(panic::AssertUnwindSafe(|| engine_ref.process(event_ref)));
    match result {
        Ok(Some(record)) => {
            *out = record;
            true
        }
        Ok(None) => false,
        Err(_) => {
            warn!("edvs_flow_engine_process: panic while processing event");
            false
        }
    }
}

/// Processes `len` events, writing one record per accepted event to `out`.
/// Returns the number of records written.
///
/// # Safety
///
/// - `engine` must be a valid, non-null pointer returned by `edvs_flow_engine_create`.
/// - `events` must point to `len` initialized `Event`s.
/// - `out` must point to writable storage for at least `len` `FlowRecord`s.
/// - `engine` must not be used concurrently from multiple threads.
#[no_mangle]
pub unsafe extern "C" fn edvs_flow_engine_process_packet(
    engine: *mut FlowEngine,
    events: *const Event,
    len: usize,
    out: *mut FlowRecord,
) -> usize {
    if engine.is_null() || events.is_null() || out.is_null() || len == 0 {
        return 0;
    }
    let engine_ref = &mut *engine;
    let events = std::slice::from_raw_parts(events, len);
    let out = std::slice::from_raw_parts_mut(out, len);
    panic::catch_unwind(panic::AssertUnwindSafe(|| {
        let mut written = 0;
        for event in events {
            if let Some(record) = engine_ref.process(event) {
                out[written] = record;
                written += 1;
            }
        }
        written
    }))
    .unwrap_or(0)
}

/// # Safety
///
/// - `engine` must be a valid pointer returned by `edvs_flow_engine_create`, or null.
#[no_mangle]
pub unsafe extern "C" fn edvs_flow_engine_rotations(engine: *const FlowEngine) -> u64 {
    if engine.is_null() {
        return 0;
    }
    (*engine).rotations()
}

/// # Safety
///
/// - `engine` must be a valid pointer returned by `edvs_flow_engine_create`,
///   or null (in which case this is a no-op).
/// - After this call, `engine` is invalid and must not be used again.
#[no_mangle]
pub unsafe extern "C" fn edvs_flow_engine_destroy(engine: *mut FlowEngine) {
    if !engine.is_null() {
        drop(Box::from_raw(engine));
    }
}

// --- ReichardtFlow FFI ---

/// Creates a correlation-based direction detector.
///
/// Returns a null pointer if any parameter is invalid.
#[no_mangle]
pub extern "C" fn edvs_reichardt_create(
    width: u32,
    height: u32,
    search_distance: u32,
    max_dt_us: i64,
    scale_factor: f32,
) -> *mut ReichardtFlow {
    let config = FlowConfig {
        search_distance,
        max_dt_us,
        scale_factor,
        ..FlowConfig::default()
    };
    if config.validate().is_err() {
        return std::ptr::null_mut();
    }
    let result = panic::catch_unwind(|| {
        Box::new(ReichardtFlow::from_config(width, height, &config))
    });
    match result {
        Ok(flow) => Box::into_raw(flow),
        Err(_) => std::ptr::null_mut(),
    }
}

/// # Safety
///
/// - `flow` must be a valid, non-null pointer returned by `edvs_reichardt_create`.
/// - `event` must be a valid, non-null pointer to an initialized `Event`.
/// - `out` must be a valid, non-null pointer to writable `FlowRecord` storage.
/// - `flow` must not be used concurrently from multiple threads.
#[no_mangle]
pub unsafe extern "C" fn edvs_reichardt_process(
    flow: *mut ReichardtFlow,
    event: *const Event,
    out: *mut FlowRecord,
) -> bool {
    if flow.is_null() || event.is_null() || out.is_null() {
        return false;
    }
    let flow_ref = &mut *flow;
    let event_ref = &*event;
    match panic::catch_unwind(panic::AssertUnwindSafe(|| flow_ref.flow(event_ref))) {
        Ok(Some(record)) => {
            *out = record;
            true
        }
        _ => false,
    }
}

/// # Safety
///
/// - `flow` must be a valid pointer returned by `edvs_reichardt_create`, or null.
#[no_mangle]
pub unsafe extern "C" fn edvs_reichardt_reset(flow: *mut ReichardtFlow) {
    if !flow.is_null() {
        (*flow).reset();
    }
}

/// # Safety
///
/// - `flow` must be a valid pointer returned by `edvs_reichardt_create`,
///   or null (in which case this is a no-op).
/// - After this call, `flow` is invalid and must not be used again.
#[no_mangle]
pub unsafe extern "C" fn edvs_reichardt_destroy(flow: *mut ReichardtFlow) {
    if !flow.is_null() {
        drop(Box::from_raw(flow));
    }
}
