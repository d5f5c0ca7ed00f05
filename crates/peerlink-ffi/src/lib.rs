//! C ABI over the process-wide peerlink bridge
//!
//! Generated glue links against these symbols to manage peer handles
//! from code that cannot call Rust directly. The API follows these
//! principles:
//! - ABI-stable (handles and options travel as plain integers)
//! - Thread-safe (every call goes through the installed [`Bridge`])
//! - Error handling via out-parameters
//! - Manual memory management for error objects
//!
//! Every entry point fails with a "not installed" error until the host
//! calls [`Bridge::install`].

use std::ffi::CString;
use std::ptr;

use libc::{c_char, c_int};
use peerlink::{Bridge, BridgeError, BridgeResult, MarshalOptions, PeerHandle};

// ============================================================================
// Errors
// ============================================================================

/// Error information
#[repr(C)]
pub struct PeerlinkError {
    message: *mut c_char,
}

/// Convert Rust string to C string (caller must free)
fn rust_to_c_string(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(c_str) => c_str.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

/// Set error out-parameter
unsafe fn set_error(error_out: *mut *mut PeerlinkError, error: BridgeError) {
    tracing::debug!(%error, "ffi call failed");
    if !error_out.is_null() {
        let message = rust_to_c_string(&error.to_string());
        *error_out = Box::into_raw(Box::new(PeerlinkError { message }));
    }
}

/// Run `f` against the installed bridge, reporting failure through `error`
unsafe fn with_bridge<T>(
    error: *mut *mut PeerlinkError,
    failed: T,
    f: impl FnOnce(&Bridge) -> BridgeResult<T>,
) -> T {
    match Bridge::global().and_then(|bridge| f(bridge)) {
        Ok(value) => value,
        Err(e) => {
            set_error(error, e);
            failed
        }
    }
}

/// Get the error message
///
/// # Returns
/// * Null-terminated error message string
/// * NULL if error is NULL
///
/// # Safety
/// - Error pointer must be valid or NULL
/// - Returned string is valid until `peerlink_error_free()` is called
#[no_mangle]
pub unsafe extern "C" fn peerlink_error_message(error: *const PeerlinkError) -> *const c_char {
    if error.is_null() {
        return ptr::null();
    }
    (*error).message
}

/// Free an error
///
/// # Safety
/// - Error pointer must have been produced by this library, or be NULL
/// - Error must not be used after this call
#[no_mangle]
pub unsafe extern "C" fn peerlink_error_free(error: *mut PeerlinkError) {
    if error.is_null() {
        return;
    }
    if !(*error).message.is_null() {
        let _ = CString::from_raw((*error).message);
    }
    let _ = Box::from_raw(error);
}

// ============================================================================
// Handles
// ============================================================================

/// Increment the retain count of `handle`
///
/// # Returns
/// * 0 on success
/// * -1 on failure (check error parameter)
///
/// # Safety
/// `error` must be NULL or point to writable storage for one pointer
///
/// # Example (C)
/// ```c
/// PeerlinkError* error = NULL;
/// if (peerlink_handle_retain(handle, &error) != 0) {
///     fprintf(stderr, "retain failed: %s\n", peerlink_error_message(error));
///     peerlink_error_free(error);
/// }
/// ```
#[no_mangle]
pub unsafe extern "C" fn peerlink_handle_retain(handle: i64, error: *mut *mut PeerlinkError) -> c_int {
    with_bridge(error, -1, |bridge| {
        bridge.handles().retain(PeerHandle::from_long(handle))?;
        Ok(0)
    })
}

/// Decrement the retain count of `handle`, dropping the bridge's strong
/// reference when it reaches zero. Called from managed finalizers.
///
/// # Returns
/// * 0 on success
/// * -1 on failure (check error parameter)
///
/// # Safety
/// `error` must be NULL or point to writable storage for one pointer
#[no_mangle]
pub unsafe extern "C" fn peerlink_handle_release(handle: i64, error: *mut *mut PeerlinkError) -> c_int {
    with_bridge(error, -1, |bridge| {
        bridge.handles().release(PeerHandle::from_long(handle))?;
        Ok(0)
    })
}

/// Whether `handle` currently resolves to a native object.
/// 0 when no bridge is installed.
#[no_mangle]
pub extern "C" fn peerlink_handle_is_live(handle: i64) -> c_int {
    Bridge::try_global().map_or(0, |bridge| bridge.handles().is_live(PeerHandle::from_long(handle)) as c_int)
}

/// Current retain count of `handle`, or -1 on failure
///
/// # Safety
/// `error` must be NULL or point to writable storage for one pointer
#[no_mangle]
pub unsafe extern "C" fn peerlink_handle_retain_count(handle: i64, error: *mut *mut PeerlinkError) -> i64 {
    with_bridge(error, -1, |bridge| {
        let count = bridge.handles().retain_count(PeerHandle::from_long(handle))?;
        Ok(i64::try_from(count).unwrap_or(i64::MAX))
    })
}

/// Number of occupied handle slots, or -1 when no bridge is installed
#[no_mangle]
pub extern "C" fn peerlink_handle_live_count() -> i64 {
    Bridge::try_global().map_or(-1, |bridge| bridge.handles().live_count() as i64)
}

/// Reclaim slots whose object died with no retain outstanding.
/// Returns the number reclaimed, or -1 when no bridge is installed.
#[no_mangle]
pub extern "C" fn peerlink_handle_sweep() -> i64 {
    Bridge::try_global().map_or(-1, |bridge| bridge.handles().sweep() as i64)
}

// ============================================================================
// Marshaling options
// ============================================================================

/// Options the installed bridge uses when none are given, as the `int`
/// passed to generated methods. 0 when no bridge is installed.
#[no_mangle]
pub extern "C" fn peerlink_options_default() -> i32 {
    Bridge::try_global().map_or(0, |bridge| bridge.default_options().to_managed_int())
}

/// Bit selecting eager conversion to the runtime's own containers
#[no_mangle]
pub extern "C" fn peerlink_options_compat() -> i32 {
    MarshalOptions::KOTLINCOMPAT.to_managed_int()
}

/// Whether `options` selects eager conversion
#[no_mangle]
pub extern "C" fn peerlink_options_is_compat(options: i32) -> c_int {
    MarshalOptions::from_managed_int(options).is_compat() as c_int
}

/// `options` with eager conversion switched on or off. Unknown bits are dropped.
#[no_mangle]
pub extern "C" fn peerlink_options_with_compat(options: i32, compat: c_int) -> i32 {
    MarshalOptions::from_managed_int(options)
        .with_compat(compat != 0)
        .to_managed_int()
}

// ============================================================================
// Version Information
// ============================================================================

/// Whether a process-wide bridge is installed
#[no_mangle]
pub extern "C" fn peerlink_is_installed() -> c_int {
    Bridge::try_global().is_some() as c_int
}

/// Get the peerlink version string
///
/// # Safety
/// - The returned string is static and must not be freed
#[no_mangle]
pub extern "C" fn peerlink_version() -> *const c_char {
    static VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "\0");
    VERSION.as_ptr() as *const c_char
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::any::Any;
    use std::ffi::CStr;
    use std::sync::Arc;

    use once_cell::sync::Lazy;
    use peerlink::{BridgeConfig, NativeObject};
    use peerlink_vm::{Vm, VmOptions};

    static BRIDGE: Lazy<&'static Arc<Bridge>> = Lazy::new(|| {
        let vm = Vm::new(VmOptions::default()).unwrap();
        let bridge = Bridge::new(vm, BridgeConfig::default()).unwrap();
        Bridge::install(bridge).unwrap();
        Bridge::global().unwrap()
    });

    fn retained(value: impl Any + Send + Sync) -> (NativeObject, i64) {
        let obj: NativeObject = Arc::new(value);
        let handle = BRIDGE.handles().handle_for(Some(&obj), true);
        (obj, handle.as_long())
    }

    unsafe fn message(error: *mut PeerlinkError) -> String {
        let text = CStr::from_ptr(peerlink_error_message(error)).to_str().unwrap().to_string();
        peerlink_error_free(error);
        text
    }

    #[test]
    fn test_retain_release_cycle() {
        let (obj, handle) = retained(String::from("peer"));
        unsafe {
            let mut error: *mut PeerlinkError = ptr::null_mut();
            assert_eq!(peerlink_handle_retain_count(handle, &mut error), 1);
            assert_eq!(peerlink_handle_retain(handle, &mut error), 0);
            assert_eq!(peerlink_handle_retain_count(handle, &mut error), 2);
            assert_eq!(peerlink_handle_release(handle, &mut error), 0);
            assert_eq!(peerlink_handle_release(handle, &mut error), 0);
            assert!(error.is_null());
        }
        assert_eq!(peerlink_handle_is_live(handle), 1);
        drop(obj);
        assert_eq!(peerlink_handle_is_live(handle), 0);
    }

    #[test]
    fn test_over_release_reports_error() {
        let (_obj, handle) = retained(7u32);
        unsafe {
            let mut error: *mut PeerlinkError = ptr::null_mut();
            assert_eq!(peerlink_handle_release(handle, &mut error), 0);
            assert_eq!(peerlink_handle_release(handle, &mut error), -1);
            assert!(!error.is_null());
            assert!(!message(error).is_empty());
        }
    }

    #[test]
    fn test_null_handle_rejected() {
        Lazy::force(&BRIDGE);
        unsafe {
            let mut error: *mut PeerlinkError = ptr::null_mut();
            assert_eq!(peerlink_handle_retain(0, &mut error), -1);
            assert!(!error.is_null());
            peerlink_error_free(error);
            // A NULL out-parameter is allowed
            assert_eq!(peerlink_handle_retain_count(0, ptr::null_mut()), -1);
        }
        assert_eq!(peerlink_handle_is_live(0), 0);
    }

    #[test]
    fn test_live_count_and_install() {
        let (_obj, _handle) = retained(1u8);
        assert_eq!(peerlink_is_installed(), 1);
        assert!(peerlink_handle_live_count() >= 1);
        assert!(peerlink_handle_sweep() >= 0);
    }

    #[test]
    fn test_options() {
        Lazy::force(&BRIDGE);
        let compat = peerlink_options_compat();
        assert_eq!(peerlink_options_is_compat(compat), 1);
        assert_eq!(peerlink_options_is_compat(0), 0);
        assert_eq!(peerlink_options_with_compat(0, 1), compat);
        assert_eq!(peerlink_options_with_compat(compat, 0), 0);
        assert_eq!(peerlink_options_default(), 0);
    }

    #[test]
    fn test_error_free_null() {
        unsafe {
            peerlink_error_free(ptr::null_mut());
            assert!(peerlink_error_message(ptr::null()).is_null());
        }
    }

    #[test]
    fn test_version() {
        let version = unsafe { CStr::from_ptr(peerlink_version()) }.to_str().unwrap();
        assert_eq!(version, peerlink::VERSION);
    }
}
