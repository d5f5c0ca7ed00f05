//! Handle lifecycle across the bridge and the managed collector

mod common;

use std::any::Any;
use std::sync::Arc;
use std::thread;

use common::*;
use peerlink::classes as names;
use peerlink::{BridgeError, ManagedValue, NativeObject, PeerHandle};

fn native(value: impl Any + Send + Sync) -> NativeObject {
    Arc::new(value)
}

#[test]
fn test_resolve_until_release() {
    let h = harness();
    let handles = h.bridge.handles();
    let obj = native(String::from("payload"));
    let handle = handles.handle_for(Some(&obj), true);
    let weak = Arc::downgrade(&obj);
    drop(obj);

    // The table's retain keeps the object alive
    let resolved = handles.resolve_as::<String>(handle).unwrap();
    assert_eq!(resolved.as_str(), "payload");
    drop(resolved);
    assert!(weak.upgrade().is_some());

    handles.release(handle).unwrap();
    assert!(weak.upgrade().is_none());
    assert!(matches!(handles.resolve(handle), Err(BridgeError::StaleHandle(_))));
    assert!(handles.release(handle).is_err());
}

#[test]
fn test_same_object_same_handle() {
    let h = harness();
    let handles = h.bridge.handles();
    let obj = native(5u64);
    let a = handles.handle_for(Some(&obj), false);
    let b = handles.handle_for(Some(&obj), true);
    assert_eq!(a, b);
    assert_eq!(handles.retain_count(a).unwrap(), 1);
    assert!(handles.handle_for(None, true).is_none());
    handles.release(b).unwrap();
}

#[test]
fn test_concurrent_retain_release() {
    let h = harness();
    let obj = native(vec![1u8, 2, 3]);
    let handle = h.bridge.handles().handle_for(Some(&obj), true);
    let weak = Arc::downgrade(&obj);
    drop(obj);

    let threads: Vec<_> = (0..16)
        .map(|_| {
            let bridge = h.bridge.clone();
            thread::spawn(move || {
                for _ in 0..100 {
                    bridge.handles().retain(handle).unwrap();
                    assert!(bridge.handles().resolve(handle).is_ok());
                    bridge.handles().release(handle).unwrap();
                }
            })
        })
        .collect();
    for t in threads {
        t.join().unwrap();
    }

    assert_eq!(h.bridge.handles().retain_count(handle).unwrap(), 1);
    assert!(weak.upgrade().is_some());
    h.bridge.handles().release(handle).unwrap();
    assert!(weak.upgrade().is_none());
}

#[test]
fn test_lenient_release_is_logged_only() {
    let config = peerlink::BridgeConfig {
        strict_release: false,
        ..Default::default()
    };
    let h = harness_with(peerlink_vm::VmOptions::default(), config);
    let obj = native(1i32);
    let handle = h.bridge.handles().handle_for(Some(&obj), false);
    assert!(h.bridge.handles().release(handle).is_ok());
    assert!(h.bridge.handles().is_live(handle));
}

#[test]
fn test_collected_wrapper_releases_peer() {
    let h = harness();
    h.bridge.register_peer_class(shape_chain()).unwrap();

    let circle = Arc::new(Circle { radius: 2.0 });
    let weak = Arc::downgrade(&circle);
    let handle = {
        let obj: NativeObject = circle;
        let wrapper = h.bridge.wrap_peer(&obj).unwrap();
        let (name, sig) = names::PEER_OF;
        let value = h
            .bridge
            .call_static_raw(names::BRIDGE_SUPPORT, name, sig, &[ManagedValue::object(Some(wrapper.obj()))])
            .unwrap();
        PeerHandle::from_long(value.as_long().unwrap())
    };

    // Only the handle table holds the native object now
    assert!(weak.upgrade().is_some());
    assert_eq!(h.bridge.handles().retain_count(handle).unwrap(), 1);

    h.vm.collect();
    assert!(weak.upgrade().is_none());
    assert!(!h.bridge.handles().is_live(handle));
}

#[test]
fn test_wrapper_alive_while_referenced() {
    let h = harness();
    h.bridge.register_peer_class(shape_chain()).unwrap();
    let obj: NativeObject = Arc::new(Shape { name: "kept".into() });
    let wrapper = h.bridge.wrap_peer(&obj).unwrap();
    let global = h.bridge.global_ref(wrapper.obj()).unwrap();
    drop(wrapper);

    h.vm.collect();
    let peer = h.bridge.peer_as::<Shape>(global.obj()).unwrap();
    assert_eq!(peer.name, "kept");
    let peer: NativeObject = peer;
    assert!(Arc::ptr_eq(&peer, &obj));
}

#[test]
fn test_handle_long_round_trip() {
    let h = harness();
    let obj = native('x');
    let handle = h.bridge.handles().handle_for(Some(&obj), true);
    let back = PeerHandle::from_long(handle.as_long());
    assert_eq!(back, handle);
    assert_eq!(*h.bridge.handles().resolve_as::<char>(back).unwrap(), 'x');
    assert!(matches!(
        h.bridge.handles().resolve_as::<String>(back),
        Err(BridgeError::HandleTypeMismatch { .. })
    ));
    h.bridge.handles().release(handle).unwrap();
}
