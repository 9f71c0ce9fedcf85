//! FFI bindings for Capture Gate
//!
//! This module provides C-compatible functions for driving the decision engine
//! from a host capture layer. Structured values cross the boundary as JSON C
//! strings; strings returned to the caller are allocated here and must be
//! freed with `gate_free_string`.
//!
//! Integer-returning functions return 0 on success and -1 on error; call
//! `gate_last_error` for the message.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use crate::config::GateConfig;
use crate::heuristics::CaptureHeuristics;
use crate::scanner::{ScanResult, ViewHierarchyScanner};
use crate::schema::SnapshotTree;
use crate::tree::ViewTree;
use crate::types::{Decision, Importance, Timestamp};

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

/// Set the last error message
fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

/// Clear the last error message
fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Helper to convert C string to Rust string
unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Helper to convert Rust string to C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

fn decision_to_cstr(decision: &Decision) -> *mut c_char {
    match serde_json::to_string(decision) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Engine Lifecycle
// ============================================================================

/// Opaque handle to a decision engine and its scanner
pub struct GateHandle {
    heuristics: CaptureHeuristics,
    scanner: ViewHierarchyScanner,
}

/// Resolve a handle pointer, recording an error for NULL
unsafe fn handle_mut<'a>(handle: *mut GateHandle) -> Option<&'a mut GateHandle> {
    if handle.is_null() {
        set_last_error("Null gate handle");
        return None;
    }
    Some(&mut *handle)
}

/// Create a new engine.
///
/// # Safety
/// - `config_json` must be NULL (defaults) or a valid null-terminated C string
///   holding a `GateConfig` JSON object.
/// - Returns a pointer that must be freed with `gate_free`.
/// - Returns NULL on error; call `gate_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn gate_new(config_json: *const c_char) -> *mut GateHandle {
    clear_last_error();

    let config = if config_json.is_null() {
        GateConfig::default()
    } else {
        let json = match cstr_to_string(config_json) {
            Some(s) => s,
            None => {
                set_last_error("Invalid config string");
                return ptr::null_mut();
            }
        };
        match GateConfig::from_json(&json) {
            Ok(config) => config,
            Err(e) => {
                set_last_error(&e.to_string());
                return ptr::null_mut();
            }
        }
    };

    let mut scanner = ViewHierarchyScanner::with_config(config.scanner);
    scanner.prewarm();
    let handle = Box::new(GateHandle {
        heuristics: CaptureHeuristics::new(config.heuristics),
        scanner,
    });
    Box::into_raw(handle)
}

/// Free an engine.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `gate_new`, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn gate_free(handle: *mut GateHandle) {
    if !handle.is_null() {
        drop(Box::from_raw(handle));
    }
}

/// Clear all signals, motion state and pending deferrals.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `gate_new`.
#[no_mangle]
pub unsafe extern "C" fn gate_reset(handle: *mut GateHandle) -> i32 {
    clear_last_error();
    match handle_mut(handle) {
        Some(handle) => {
            handle.heuristics.reset();
            0
        }
        None => -1,
    }
}

// ============================================================================
// Signal Recording
// ============================================================================

/// Record a touch at time `t` (seconds, caller's monotonic clock).
///
/// # Safety
/// - `handle` must be a valid pointer returned by `gate_new`.
#[no_mangle]
pub unsafe extern "C" fn gate_record_touch(handle: *mut GateHandle, t: f64) -> i32 {
    clear_last_error();
    match handle_mut(handle) {
        Some(handle) => {
            handle.heuristics.record_touch(t);
            0
        }
        None => -1,
    }
}

/// Record a scroll or other continuous interaction at time `t`.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `gate_new`.
#[no_mangle]
pub unsafe extern "C" fn gate_record_interaction(handle: *mut GateHandle, t: f64) -> i32 {
    clear_last_error();
    match handle_mut(handle) {
        Some(handle) => {
            handle.heuristics.record_interaction(t);
            0
        }
        None => -1,
    }
}

/// Record a map gesture at time `t`.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `gate_new`.
#[no_mangle]
pub unsafe extern "C" fn gate_record_map_interaction(handle: *mut GateHandle, t: f64) -> i32 {
    clear_last_error();
    match handle_mut(handle) {
        Some(handle) => {
            handle.heuristics.record_map_interaction(t);
            0
        }
        None => -1,
    }
}

/// Record the start of a navigation transition at time `t`.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `gate_new`.
#[no_mangle]
pub unsafe extern "C" fn gate_record_navigation(handle: *mut GateHandle, t: f64) -> i32 {
    clear_last_error();
    match handle_mut(handle) {
        Some(handle) => {
            handle.heuristics.record_navigation(t);
            0
        }
        None => -1,
    }
}

/// Set whether the keyboard is currently animating.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `gate_new`.
#[no_mangle]
pub unsafe extern "C" fn gate_set_keyboard_animating(handle: *mut GateHandle, animating: bool) -> i32 {
    clear_last_error();
    match handle_mut(handle) {
        Some(handle) => {
            handle.heuristics.set_keyboard_animating(animating);
            0
        }
        None => -1,
    }
}

/// Record that a frame was rendered for `signature` at time `t`.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `gate_new`.
/// - `signature` must be NULL or a valid null-terminated C string.
#[no_mangle]
pub unsafe extern "C" fn gate_record_rendered_signature(
    handle: *mut GateHandle,
    signature: *const c_char,
    t: f64,
) -> i32 {
    clear_last_error();
    let Some(handle) = handle_mut(handle) else {
        return -1;
    };
    if !signature.is_null() && cstr_to_string(signature).is_none() {
        set_last_error("Invalid signature string");
        return -1;
    }
    handle
        .heuristics
        .record_rendered_signature(cstr_to_string(signature), t);
    0
}

/// Force the next decision to render.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `gate_new`.
#[no_mangle]
pub unsafe extern "C" fn gate_invalidate_signature(handle: *mut GateHandle) -> i32 {
    clear_last_error();
    match handle_mut(handle) {
        Some(handle) => {
            handle.heuristics.invalidate_signature();
            0
        }
        None => -1,
    }
}

/// Report that the last capture failed.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `gate_new`.
#[no_mangle]
pub unsafe extern "C" fn gate_report_render_failure(handle: *mut GateHandle) -> i32 {
    clear_last_error();
    match handle_mut(handle) {
        Some(handle) => {
            handle.heuristics.report_render_failure();
            0
        }
        None => -1,
    }
}

// ============================================================================
// Scans and Decisions
// ============================================================================

/// Feed a host-produced scan result (ScanResult JSON).
///
/// # Safety
/// - `handle` must be a valid pointer returned by `gate_new`.
/// - `scan_json` must be a valid null-terminated C string.
#[no_mangle]
pub unsafe extern "C" fn gate_update_with_scan_result(
    handle: *mut GateHandle,
    scan_json: *const c_char,
) -> i32 {
    clear_last_error();
    let Some(handle) = handle_mut(handle) else {
        return -1;
    };
    let json = match cstr_to_string(scan_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid scan JSON string pointer");
            return -1;
        }
    };
    match ScanResult::from_json(&json) {
        Ok(scan) => {
            handle.heuristics.update_with_scan_result(&scan);
            0
        }
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

/// Decide and return the Decision as JSON.
///
/// `importance` is 0 (low) .. 3 (critical).
///
/// # Safety
/// - `handle` must be a valid pointer returned by `gate_new`.
/// - `signature` must be NULL or a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `gate_free_string`.
/// - Returns NULL on error; call `gate_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn gate_decide(
    handle: *mut GateHandle,
    signature: *const c_char,
    now: f64,
    has_last_frame: bool,
    importance: i32,
) -> *mut c_char {
    clear_last_error();
    let Some(handle) = handle_mut(handle) else {
        return ptr::null_mut();
    };
    let Some(importance) = Importance::from_code(importance) else {
        set_last_error(&format!("Invalid importance code {}", importance));
        return ptr::null_mut();
    };
    if !signature.is_null() && cstr_to_string(signature).is_none() {
        set_last_error("Invalid signature string");
        return ptr::null_mut();
    }
    let signature = cstr_to_string(signature);
    let decision = handle
        .heuristics
        .decide(signature.as_deref(), now, has_last_frame, importance);
    decision_to_cstr(&decision)
}

/// Feed a scan result and decide on its signature in one call.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `gate_new`.
/// - `scan_json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `gate_free_string`.
/// - Returns NULL on error; call `gate_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn gate_decide_with_scan(
    handle: *mut GateHandle,
    scan_json: *const c_char,
    now: f64,
    has_last_frame: bool,
    importance: i32,
) -> *mut c_char {
    clear_last_error();
    let Some(handle) = handle_mut(handle) else {
        return ptr::null_mut();
    };
    let Some(importance) = Importance::from_code(importance) else {
        set_last_error(&format!("Invalid importance code {}", importance));
        return ptr::null_mut();
    };
    let json = match cstr_to_string(scan_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid scan JSON string pointer");
            return ptr::null_mut();
        }
    };
    match ScanResult::from_json(&json) {
        Ok(scan) => {
            let decision =
                handle
                    .heuristics
                    .decide_with_scan(Some(&scan), now, has_last_frame, importance);
            decision_to_cstr(&decision)
        }
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Re-check the last scan's scroll, animated and map nodes against a fresh
/// `view_tree.snapshot.v1` document and return ProbeOutcome JSON.
///
/// Nodes missing from the snapshot are counted in `stale_handles`.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `gate_new`.
/// - `snapshot_json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `gate_free_string`.
/// - Returns NULL on error; call `gate_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn gate_update_with_stability_probe(
    handle: *mut GateHandle,
    snapshot_json: *const c_char,
    now: f64,
) -> *mut c_char {
    clear_last_error();
    let Some(handle) = handle_mut(handle) else {
        return ptr::null_mut();
    };
    let json = match cstr_to_string(snapshot_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid snapshot JSON string pointer");
            return ptr::null_mut();
        }
    };
    let tree = match SnapshotTree::from_json(&json) {
        Ok(tree) => tree,
        Err(e) => {
            set_last_error(&e.to_string());
            return ptr::null_mut();
        }
    };

    let outcome = handle.heuristics.update_with_stability_probe(&tree, now);
    match serde_json::to_string(&outcome) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Scan a `view_tree.snapshot.v1` JSON document and return ScanResult JSON.
///
/// All containers are scanned relative to the first one. Returns the JSON
/// literal `null` when the snapshot has nothing visible to scan.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `gate_new`.
/// - `snapshot_json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `gate_free_string`.
/// - Returns NULL on error; call `gate_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn gate_scan_snapshot(
    handle: *mut GateHandle,
    snapshot_json: *const c_char,
    now: f64,
) -> *mut c_char {
    clear_last_error();
    let Some(handle) = handle_mut(handle) else {
        return ptr::null_mut();
    };
    let json = match cstr_to_string(snapshot_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid snapshot JSON string pointer");
            return ptr::null_mut();
        }
    };
    let tree = match SnapshotTree::from_json(&json) {
        Ok(tree) => tree,
        Err(e) => {
            set_last_error(&e.to_string());
            return ptr::null_mut();
        }
    };

    let scan = scan_first_container(&mut handle.scanner, &tree, now);
    match serde_json::to_string(&scan) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

fn scan_first_container(
    scanner: &mut ViewHierarchyScanner,
    tree: &SnapshotTree,
    now: Timestamp,
) -> Option<ScanResult> {
    let primary = tree.containers().first().copied()?;
    scanner.scan_all_containers(tree, primary, now)
}

/// Suggested delay in seconds before re-evaluating a deferred capture.
/// Returns a negative value for a NULL handle.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `gate_new`, or NULL.
#[no_mangle]
pub unsafe extern "C" fn gate_poll_interval(handle: *const GateHandle) -> f64 {
    if handle.is_null() {
        return -1.0;
    }
    (*handle).heuristics.poll_interval()
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by gate functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a gate function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn gate_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Get the last error message.
///
/// # Safety
/// - Returns a pointer to a thread-local error string.
/// - The returned pointer is valid until the next gate function call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn gate_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn gate_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}
