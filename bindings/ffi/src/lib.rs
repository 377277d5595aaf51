//! C-FFI layer for the covenant engine, for cgo and other FFI consumers.
//!
//! ZERO logic here. All calls delegate to `covenant-core`.
//!
//! # Memory Contract
//!
//! All functions that return `*mut c_char` allocate via `CString`.
//! The caller MUST free the returned string by calling `covenant_free_string()`.

use std::ffi::{CStr, CString};
use std::os::raw::c_char;

/// Result from a covenant FFI call.
/// If `error` is null, the call succeeded and `result` contains the output.
/// If `error` is non-null, the call failed and `error` contains the error message.
/// The caller MUST free both `result` and `error` with `covenant_free_string()`.
#[repr(C)]
pub struct CovenantResult {
    pub result: *mut c_char,
    pub error: *mut c_char,
}

/// Interior NULs cannot cross the boundary; they are dropped
fn to_cstring(s: String) -> CString {
    CString::new(s).unwrap_or_else(|e| {
        let mut bytes = e.into_vec();
        bytes.retain(|b| *b != 0);
        CString::new(bytes).unwrap_or_default()
    })
}

impl CovenantResult {
    fn ok(value: String) -> Self {
        CovenantResult {
            result: to_cstring(value).into_raw(),
            error: std::ptr::null_mut(),
        }
    }

    fn err(msg: String) -> Self {
        CovenantResult {
            result: std::ptr::null_mut(),
            error: to_cstring(msg).into_raw(),
        }
    }
}

/// Helper: convert a C string pointer to a Rust &str.
/// Returns None if the pointer is null or not valid UTF-8.
unsafe fn cstr_to_str<'a>(ptr: *const c_char) -> Option<&'a str> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok()
}

/// Evaluate a JSON spend request.
/// Returns JSON: { "accepted": bool, "verdict"?: {...}, "reason"?: "...", "kind"?: "..." }
///
/// A rejected spend is a successful call; `error` is set only when the
/// request cannot be read.
///
/// # Safety
/// `request` must be a valid null-terminated UTF-8 C string.
/// The caller must free the returned strings with `covenant_free_string()`.
#[no_mangle]
pub unsafe extern "C" fn covenant_evaluate(request: *const c_char) -> CovenantResult {
    let request = match cstr_to_str(request) {
        Some(s) => s,
        None => return CovenantResult::err("null or invalid UTF-8 input".into()),
    };

    match covenant_core::evaluate_json(request) {
        Ok(json) => CovenantResult::ok(json),
        Err(e) => CovenantResult::err(e.to_string()),
    }
}

/// Compute the outputs a spend request must commit to.
/// Returns JSON: { "outputs": [...], "hash_outputs": "...", "serialized": "..." }
///
/// # Safety
/// `request` must be a valid null-terminated UTF-8 C string.
/// The caller must free the returned strings with `covenant_free_string()`.
#[no_mangle]
pub unsafe extern "C" fn covenant_expected_outputs(request: *const c_char) -> CovenantResult {
    let request = match cstr_to_str(request) {
        Some(s) => s,
        None => return CovenantResult::err("null or invalid UTF-8 input".into()),
    };

    match covenant_core::covenant::expected_outputs_json(request) {
        Ok(json) => CovenantResult::ok(json),
        Err(e) => CovenantResult::err(e.to_string()),
    }
}

/// Free a string previously returned by a covenant FFI function.
///
/// # Safety
/// `ptr` must be a pointer previously returned by a covenant FFI function,
/// or null (in which case this is a no-op).
#[no_mangle]
pub unsafe extern "C" fn covenant_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}
