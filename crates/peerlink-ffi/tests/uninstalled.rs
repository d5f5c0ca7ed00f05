//! Entry points called before any bridge is installed

use std::ffi::CStr;
use std::ptr;

use peerlink_ffi::*;

#[test]
fn test_calls_fail_without_bridge() {
    assert_eq!(peerlink_is_installed(), 0);
    assert_eq!(peerlink_handle_is_live(1), 0);
    assert_eq!(peerlink_handle_live_count(), -1);
    assert_eq!(peerlink_handle_sweep(), -1);
    assert_eq!(peerlink_options_default(), 0);

    unsafe {
        let mut error: *mut PeerlinkError = ptr::null_mut();
        assert_eq!(peerlink_handle_retain(1, &mut error), -1);
        assert!(!error.is_null());
        let message = CStr::from_ptr(peerlink_error_message(error)).to_str().unwrap();
        assert!(message.contains("installed"), "{}", message);
        peerlink_error_free(error);
    }
}
