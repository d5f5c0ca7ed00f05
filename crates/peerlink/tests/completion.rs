//! Asynchronous calls resumed by managed code on another thread

mod common;

use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;

use common::*;
use peerlink::{BridgeError, MarshalOptions};

#[test]
fn test_async_success_and_failure_resolve_once() {
    let h = harness();

    let completion = h
        .bridge
        .call_static_async::<i32>(WORKER, "compute", COMPUTE_SIG, &[&21i32], MarshalOptions::empty())
        .unwrap();
    assert_eq!(completion.wait().unwrap(), 42);

    let completion = h
        .bridge
        .call_static_async::<i32>(WORKER, "compute", COMPUTE_SIG, &[&-1i32], MarshalOptions::empty())
        .unwrap();
    match completion.wait_timeout(Duration::from_secs(10)) {
        Some(Err(BridgeError::Thrown(thrown))) => {
            assert_eq!(thrown.message(), Some("boom"));
            assert!(thrown.to_string().contains("boom"));
        }
        other => panic!("expected failure, got {:?}", other.map(|r| r.map_err(|e| e.to_string()))),
    }

    // Each worker's second resume is rejected inside the managed runtime
    for _ in 0..500 {
        if REJECTED_RESUMES.load(Ordering::SeqCst) >= 2 {
            break;
        }
        thread::sleep(Duration::from_millis(10));
    }
    assert_eq!(REJECTED_RESUMES.load(Ordering::SeqCst), 2);
}

#[test]
fn test_collected_callback_releases_entry() {
    let h = harness();
    let live = h.bridge.handles().live_count();
    {
        let (completion, callback) = h.bridge.completion_callback::<String>(MarshalOptions::empty()).unwrap();
        assert_eq!(h.bridge.handles().live_count(), live + 1);
        drop(callback);
        h.vm.collect();
        assert!(matches!(completion.wait(), Err(BridgeError::CompletionDropped)));
    }
    h.bridge.handles().sweep();
    assert_eq!(h.bridge.handles().live_count(), live);
}
