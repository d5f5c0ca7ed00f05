//! Shared fixtures: a reference VM with demo classes and a bridge over it

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use peerlink::classes as names;
use peerlink::refs::object_value;
use peerlink::{Bridge, BridgeConfig, BridgeResult, Bridgeable, ClassChain, LocalRef, ManagedEnv, ManagedValue, MarshalOptions, ObjRef};
use peerlink_vm::builtin::{ILLEGAL_STATE_EXCEPTION, RUNTIME_EXCEPTION};
use peerlink_vm::{ClassDef, Value, Vm, VmOptions};

pub const ECHO: &str = "demo/Echo";
pub const ECHO_SIG: &str = "(Lvm/lang/Object;)Lvm/lang/Object;";
pub const FAIL_SIG: &str = "(Lvm/lang/String;)V";
pub const WORKER: &str = "demo/Worker";
pub const COMPUTE_SIG: &str = "(ILbridge/kt/Completion;)V";
pub const CALCULATOR: &str = "demo/Calculator";

pub const SHAPE: &str = "demo/Shape";
pub const CIRCLE: &str = "demo/Circle";
pub const RING: &str = "demo/Ring";
pub const DONUT: &str = "demo/Donut";

/// Second `resume` calls the worker saw rejected
pub static REJECTED_RESUMES: AtomicUsize = AtomicUsize::new(0);

pub struct Harness {
    pub vm: Arc<Vm>,
    pub bridge: Arc<Bridge>,
}

pub fn harness() -> Harness {
    harness_with(VmOptions::default(), BridgeConfig::default())
}

pub fn harness_with(options: VmOptions, config: BridgeConfig) -> Harness {
    let vm = Vm::new(options).unwrap();
    define_demo_classes(&vm);
    let bridge = Bridge::new(vm.clone(), config).unwrap();
    Harness { vm, bridge }
}

pub fn bridged() -> MarshalOptions {
    MarshalOptions::empty()
}

pub fn compat() -> MarshalOptions {
    MarshalOptions::KOTLINCOMPAT
}

// ============================================================================
// Native peer types
// ============================================================================

#[derive(Debug)]
pub struct Shape {
    pub name: String,
}

#[derive(Debug)]
pub struct Circle {
    pub radius: f64,
}

#[derive(Debug)]
pub struct Ring;

#[derive(Debug)]
pub struct Donut;

pub fn shape_chain() -> ClassChain {
    ClassChain::builder(SHAPE)
        .member::<Shape>()
        .subclass::<Circle>(1, CIRCLE)
        .subclass::<Ring>(2, RING)
        .subclass::<Donut>(3, DONUT)
        .build()
}

// ============================================================================
// Managed demo classes
// ============================================================================

fn define_demo_classes(vm: &Vm) {
    vm.define_class(
        ClassDef::new(ECHO)
            .static_method("echo", ECHO_SIG, |_, inv| Ok(inv.arg(0)))
            .static_method("fail", FAIL_SIG, |vm, inv| {
                let message = vm.opt_string(inv.arg(0))?;
                Err(vm.throw_new(ILLEGAL_STATE_EXCEPTION, message.as_deref()))
            }),
    )
    .unwrap();

    vm.define_class(ClassDef::peer(SHAPE, None).native_method("describe", "()Lvm/lang/String;"))
        .unwrap();
    vm.define_class(ClassDef::peer(CIRCLE, Some(SHAPE))).unwrap();
    vm.define_class(ClassDef::peer(RING, Some(CIRCLE))).unwrap();
    vm.define_class(ClassDef::peer(DONUT, Some(RING))).unwrap();

    vm.define_class(
        ClassDef::new(CALCULATOR)
            .static_native("parse", "(Lvm/lang/String;)I")
            .static_native("validate", "(I)I")
            .static_native("explode", "()V"),
    )
    .unwrap();

    vm.define_class(ClassDef::new(WORKER).static_method("compute", COMPUTE_SIG, |vm, inv| {
        let n = inv.int(0)?;
        let completion = vm.pin(vm.non_null(inv.object(1)?)?)?;
        let vm = vm.arc()?;
        thread::spawn(move || {
            resume_twice(&vm, completion, n);
            vm.unpin(completion);
        });
        Ok(Value::Void)
    }))
    .unwrap();
}

/// Resume `completion` from a worker thread: `n * 2` for non-negative `n`,
/// a `RuntimeException("boom")` otherwise. Then resume again and record
/// whether the second attempt was rejected.
fn resume_twice(vm: &Vm, completion: ObjRef, n: i32) {
    let class = vm.find_class(names::COMPLETION).unwrap();
    let resume = vm
        .method_id(class, "resume", "(Lvm/lang/Object;Lvm/lang/Throwable;)V")
        .unwrap();

    let args = if n < 0 {
        let exception = vm.find_class(RUNTIME_EXCEPTION).unwrap();
        let ctor = vm.method_id(exception, "<init>", names::MESSAGE_CTOR).unwrap();
        let message = vm.new_string("boom").unwrap();
        let throwable = vm
            .new_object(exception, ctor, &[ManagedValue::object(Some(message))])
            .unwrap();
        [ManagedValue::null(), ManagedValue::object(throwable)]
    } else {
        let (boxed, ctor_sig, _, _) = names::INTEGER;
        let integer = vm.find_class(boxed).unwrap();
        let ctor = vm.method_id(integer, "<init>", ctor_sig).unwrap();
        let value = vm.new_object(integer, ctor, &[ManagedValue::int(n * 2)]).unwrap();
        [ManagedValue::object(value), ManagedValue::null()]
    };

    vm.call_method(completion, resume, &args).unwrap();
    assert!(!vm.exception_pending());
    vm.call_method(completion, resume, &args).unwrap();
    if let Some(thrown) = vm.take_exception() {
        REJECTED_RESUMES.fetch_add(1, Ordering::SeqCst);
        vm.delete_local_ref(thrown);
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Convert `value` to the managed side, pass it through `demo/Echo.echo`
/// and convert the result back
pub fn round_trip<T: Bridgeable>(bridge: &Bridge, value: &T, options: MarshalOptions) -> BridgeResult<T> {
    let local = value.to_managed(bridge, options)?;
    let echoed = bridge.call_static_raw(ECHO, "echo", ECHO_SIG, &[object_value(local.as_ref())])?;
    let echoed = bridge.adopt(echoed);
    T::from_managed(bridge, echoed.as_ref().map(LocalRef::obj), options)
}

/// Managed class name of the converted form of `value`
pub fn managed_class_of<T: Bridgeable>(bridge: &Bridge, value: &T, options: MarshalOptions) -> String {
    let local = value.to_managed(bridge, options).unwrap().unwrap();
    bridge.class_name_of(local.obj()).unwrap()
}
