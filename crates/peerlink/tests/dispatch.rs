//! Calls in both directions and failure translation

mod common;

use std::error::Error;
use std::sync::Arc;

use common::*;
use peerlink::classes as names;
use peerlink::error::FATAL_ERROR;
use peerlink::{BridgeError, ErrorKind, MarshalOptions, NativeArgs, ThrownError};
use peerlink_vm::builtin::{ILLEGAL_STATE_EXCEPTION, RUNTIME_EXCEPTION};

type AppResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

fn export_calculator(h: &Harness) {
    let options = MarshalOptions::empty();
    h.bridge
        .export_static(CALCULATOR, "parse", "(Lvm/lang/String;)I", options, |args: &NativeArgs<'_>| -> AppResult<i32> {
            let text: String = args.get(0)?;
            Ok(text.trim().parse::<i32>()?)
        })
        .unwrap();
    h.bridge
        .export_static(CALCULATOR, "validate", "(I)I", options, |args: &NativeArgs<'_>| -> AppResult<i32> {
            let n: i32 = args.get(0)?;
            if n < 0 {
                return Err(ThrownError::with_class(ILLEGAL_STATE_EXCEPTION, format!("{} is negative", n)).into());
            }
            Ok(n)
        })
        .unwrap();
    h.bridge
        .export_static(CALCULATOR, "explode", "()V", options, |_args: &NativeArgs<'_>| -> AppResult<()> {
            panic!("boom")
        })
        .unwrap();
}

fn thrown(result: Result<impl std::fmt::Debug, BridgeError>) -> ThrownError {
    match result {
        Err(BridgeError::Thrown(thrown)) => thrown,
        other => panic!("expected a managed throw, got {:?}", other),
    }
}

#[test]
fn test_static_call_converts_arguments() {
    let h = harness();
    export_calculator(&h);
    let n: i32 = h
        .bridge
        .call_static(CALCULATOR, "parse", "(Lvm/lang/String;)I", &[&" 42 ".to_string()], MarshalOptions::empty())
        .unwrap();
    assert_eq!(n, 42);
}

#[test]
fn test_native_error_becomes_runtime_exception() {
    let h = harness();
    export_calculator(&h);
    let result: Result<i32, _> =
        h.bridge
            .call_static(CALCULATOR, "parse", "(Lvm/lang/String;)I", &[&"x".to_string()], MarshalOptions::empty());
    let err = thrown(result);
    assert_eq!(err.class_name(), RUNTIME_EXCEPTION);
    assert!(err.message().unwrap().contains("invalid digit"));
    assert!(err.throwable().is_some());
}

#[test]
fn test_thrown_error_keeps_its_class() {
    let h = harness();
    export_calculator(&h);
    let ok: i32 = h
        .bridge
        .call_static(CALCULATOR, "validate", "(I)I", &[&5i32], MarshalOptions::empty())
        .unwrap();
    assert_eq!(ok, 5);

    let result: Result<i32, _> = h
        .bridge
        .call_static(CALCULATOR, "validate", "(I)I", &[&-1i32], MarshalOptions::empty());
    let err = thrown(result);
    assert_eq!(err.class_name(), ILLEGAL_STATE_EXCEPTION);
    assert_eq!(err.message(), Some("-1 is negative"));
    assert_eq!(BridgeError::Thrown(err).kind(), ErrorKind::Recoverable);
}

#[test]
fn test_panic_becomes_fatal_error() {
    let h = harness();
    export_calculator(&h);
    let result: Result<(), _> = h.bridge.call_static(CALCULATOR, "explode", "()V", &[], MarshalOptions::empty());
    let err = thrown(result);
    assert_eq!(err.class_name(), FATAL_ERROR);
    assert_eq!(err.message(), Some("panic: boom"));

    // The bridge stays usable
    let n: i32 = h
        .bridge
        .call_static(CALCULATOR, "parse", "(Lvm/lang/String;)I", &[&"7".to_string()], MarshalOptions::empty())
        .unwrap();
    assert_eq!(n, 7);
}

#[test]
fn test_bridge_failure_in_native_thrown_as_fatal_error() {
    let h = harness();
    h.bridge.register_peer_class(shape_chain()).unwrap();
    h.bridge
        .export_instance(SHAPE, "describe", "()Lvm/lang/String;", MarshalOptions::empty(), |circle: &Arc<Circle>, _args| {
            Ok::<_, BridgeError>(format!("radius {}", circle.radius))
        })
        .unwrap();

    let obj: peerlink::NativeObject = Arc::new(Shape { name: "plain".into() });
    let wrapper = h.bridge.wrap_peer(&obj).unwrap();
    let result: Result<String, _> =
        h.bridge
            .call_method(wrapper.obj(), SHAPE, "describe", "()Lvm/lang/String;", &[], MarshalOptions::empty());
    let err = thrown(result);
    assert_eq!(err.class_name(), FATAL_ERROR);
    assert!(err.message().unwrap().contains("does not hold"));
}

#[test]
fn test_unbound_native_is_fatal() {
    let h = harness();
    let result: Result<i32, _> = h
        .bridge
        .call_static(CALCULATOR, "validate", "(I)I", &[&1i32], MarshalOptions::empty());
    let err = result.unwrap_err();
    assert!(err.is_fatal());
}

#[test]
fn test_managed_throw_rethrown_unchanged() {
    let h = harness();
    let result: Result<(), _> =
        h.bridge
            .call_static(ECHO, "fail", FAIL_SIG, &[&"bad state".to_string()], MarshalOptions::empty());
    let err = thrown(result);
    assert_eq!(err.class_name(), ILLEGAL_STATE_EXCEPTION);
    assert_eq!(err.message(), Some("bad state"));

    let original = err.throwable().unwrap().obj();
    let rethrown = h.bridge.throwable_for(&err).unwrap();
    assert!(h.bridge.env().is_same_object(Some(rethrown.obj()), Some(original)));
}

#[test]
fn test_unresolved_members_are_fatal() {
    let h = harness();
    match h.bridge.describe("demo/Missing") {
        Err(err @ BridgeError::Unresolved { .. }) => {
            assert!(err.is_fatal());
            assert!(err.to_string().contains("demo/Missing"));
        }
        other => panic!("unexpected {:?}", other),
    }
    let missing = h.bridge.call_static_raw(ECHO, "nope", "()V", &[]);
    assert!(matches!(missing, Err(BridgeError::Unresolved { .. })));
}

#[test]
fn test_signatures_memoized() {
    let h = harness();
    let first = h.bridge.describe(ECHO).unwrap();
    let second = h.bridge.describe(ECHO).unwrap();
    assert!(Arc::ptr_eq(&first, &second));

    let before = h.bridge.registry().len();
    for _ in 0..3 {
        let _: String = h
            .bridge
            .call_static(ECHO, "echo", ECHO_SIG, &[&"x".to_string()], MarshalOptions::empty())
            .unwrap();
    }
    assert_eq!(h.bridge.registry().len(), before);
    assert_eq!(first.member_count(), 1);
}

#[test]
fn test_field_access() {
    let h = harness();
    let (class, ctor, _, _) = names::INTEGER;
    let boxed = h
        .bridge
        .new_object(class, ctor, &[&5i32], MarshalOptions::empty())
        .unwrap();
    let value: i32 = h
        .bridge
        .get_field(boxed.obj(), class, "value", "I", MarshalOptions::empty())
        .unwrap();
    assert_eq!(value, 5);
    h.bridge
        .set_field(boxed.obj(), class, "value", "I", &9i32, MarshalOptions::empty())
        .unwrap();
    let (_, _, getter, getter_sig) = names::INTEGER;
    let read: i32 = h
        .bridge
        .call_method(boxed.obj(), class, getter, getter_sig, &[], MarshalOptions::empty())
        .unwrap();
    assert_eq!(read, 9);
}

#[test]
fn test_calls_from_many_threads() {
    let h = harness_with(
        peerlink_vm::VmOptions {
            gc_threshold: 256,
            ..Default::default()
        },
        Default::default(),
    );
    export_calculator(&h);
    let threads: Vec<_> = (0..8)
        .map(|t| {
            let bridge = h.bridge.clone();
            std::thread::spawn(move || {
                for i in 0..100 {
                    let text = format!("{}", t * 1000 + i);
                    let n: i32 = bridge
                        .call_static(CALCULATOR, "parse", "(Lvm/lang/String;)I", &[&text], MarshalOptions::empty())
                        .unwrap();
                    assert_eq!(n, t * 1000 + i);
                }
            })
        })
        .collect();
    for t in threads {
        t.join().unwrap();
    }
    assert_eq!(h.vm.local_ref_count(), 0);
}
