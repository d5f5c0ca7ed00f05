//! Value conversion through the reference runtime

mod common;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use common::*;
use peerlink::classes as names;
use peerlink::{
    keep_managed, AnyValue, BridgeError, Bridgeable, Data, LocalRef, ManagedValue, MarshalOptions, NativeObject,
    ThrownError, Timestamp,
};

fn both_modes() -> [MarshalOptions; 2] {
    [bridged(), compat()]
}

#[test]
fn test_scalars_at_extremes() {
    let h = harness();
    let b = &*h.bridge;
    for options in both_modes() {
        assert_eq!(round_trip(b, &i32::MIN, options).unwrap(), i32::MIN);
        assert_eq!(round_trip(b, &i32::MAX, options).unwrap(), i32::MAX);
        assert_eq!(round_trip(b, &i64::MIN, options).unwrap(), i64::MIN);
        assert_eq!(round_trip(b, &i8::MAX, options).unwrap(), i8::MAX);
        assert_eq!(round_trip(b, &i16::MIN, options).unwrap(), i16::MIN);
        assert_eq!(round_trip(b, &f64::MAX, options).unwrap(), f64::MAX);
        assert_eq!(round_trip(b, &f32::MIN_POSITIVE, options).unwrap(), f32::MIN_POSITIVE);
        assert!(round_trip(b, &true, options).unwrap());
        assert_eq!(round_trip(b, &'é', options).unwrap(), 'é');
    }
}

#[test]
fn test_char_outside_bmp_rejected() {
    let h = harness();
    assert!(matches!(
        round_trip(&h.bridge, &'😀', bridged()),
        Err(BridgeError::InvalidValue(_))
    ));
}

#[test]
fn test_strings_and_optionals() {
    let h = harness();
    let b = &*h.bridge;
    for options in both_modes() {
        assert_eq!(round_trip(b, &String::new(), options).unwrap(), "");
        assert_eq!(round_trip(b, &"héllo wörld".to_string(), options).unwrap(), "héllo wörld");
        assert_eq!(round_trip(b, &None::<String>, options).unwrap(), None);
        assert_eq!(round_trip(b, &Some(7i32), options).unwrap(), Some(7));
    }
}

#[test]
fn test_collections_empty_and_populated() {
    let h = harness();
    let b = &*h.bridge;
    for options in both_modes() {
        let empty: Vec<String> = Vec::new();
        assert_eq!(round_trip(b, &empty, options).unwrap(), empty);
        let nested = vec![vec![1i32, 2], vec![], vec![3]];
        assert_eq!(round_trip(b, &nested, options).unwrap(), nested);

        let map: HashMap<String, i64> = [("one".to_string(), 1), ("two".to_string(), 2)].into_iter().collect();
        assert_eq!(round_trip(b, &map, options).unwrap(), map);
        assert_eq!(round_trip(b, &HashMap::<String, i64>::new(), options).unwrap(), HashMap::new());

        let set: HashSet<String> = ["x", "y", "z"].iter().map(|s| s.to_string()).collect();
        assert_eq!(round_trip(b, &set, options).unwrap(), set);
    }
}

#[test]
fn test_buffers_dates_identifiers() {
    let h = harness();
    let b = &*h.bridge;
    let id = uuid::Uuid::parse_str("67e55044-10b1-426f-9247-bb680e5fe0c8").unwrap();
    let url = url::Url::parse("https://example.com/path?q=1#frag").unwrap();
    for options in both_modes() {
        assert_eq!(round_trip(b, &Data::default(), options).unwrap(), Data::default());
        let bytes = Data::new((0..=255u8).collect::<Vec<_>>());
        assert_eq!(round_trip(b, &bytes, options).unwrap(), bytes);

        assert_eq!(round_trip(b, &Timestamp::EPOCH, options).unwrap(), Timestamp::EPOCH);
        let far = Timestamp::from_millis(253_402_300_799_000);
        assert_eq!(round_trip(b, &far, options).unwrap(), far);
        let before = Timestamp::from_millis(-86_400_000);
        assert_eq!(round_trip(b, &before, options).unwrap().as_millis(), -86_400_000);

        assert_eq!(round_trip(b, &id, options).unwrap(), id);
        assert_eq!(round_trip(b, &url, options).unwrap(), url);
    }
}

#[test]
fn test_mode_selects_managed_class() {
    let h = harness();
    let b = &*h.bridge;
    let list = vec![1i32];
    assert_eq!(managed_class_of(b, &list, bridged()), names::BRIDGED_ARRAY);
    assert_eq!(managed_class_of(b, &list, compat()), names::ARRAY_LIST);
    let map: HashMap<String, i32> = HashMap::new();
    assert_eq!(managed_class_of(b, &map, bridged()), names::BRIDGED_DICTIONARY);
    assert_eq!(managed_class_of(b, &map, compat()), names::LINKED_HASH_MAP);
    assert_eq!(managed_class_of(b, &Timestamp::EPOCH, bridged()), names::BRIDGED_DATE);
    assert_eq!(managed_class_of(b, &Timestamp::EPOCH, compat()), names::DATE);
    assert_eq!(managed_class_of(b, &Data::default(), compat()), names::BYTE_ARRAY);
}

#[test]
fn test_eager_copy_is_independent() {
    let h = harness();
    let b = &*h.bridge;
    let mut source = vec!["a".to_string(), "B".to_string(), "c".to_string()];
    let managed = source.to_managed(b, compat()).unwrap().unwrap();
    source.push("d".to_string());

    let back = Vec::<String>::from_managed(b, Some(managed.obj()), compat()).unwrap();
    assert_eq!(back, ["a", "B", "c"]);

    let extra = b.new_string("e").unwrap();
    b.call_method_raw(managed.obj(), names::LIST, "add", "(Lvm/lang/Object;)Z", &[extra.value()])
        .unwrap();
    let size = b.call_method_raw(managed.obj(), names::LIST, "size", "()I", &[]).unwrap();
    assert_eq!(size.as_int(), Some(4));
    assert_eq!(source, ["a", "B", "c", "d"]);

    let managed_now = Vec::<String>::from_managed(b, Some(managed.obj()), compat()).unwrap();
    assert_eq!(managed_now, ["a", "B", "c", "e"]);
}

#[test]
fn test_shared_wrapper_stays_linked() {
    let h = harness();
    let b = &*h.bridge;
    let source = vec!["a".to_string(), "B".to_string(), "c".to_string()];
    let wrapper = source.to_managed(b, bridged()).unwrap().unwrap();
    assert_eq!(b.class_name_of(wrapper.obj()).unwrap(), names::BRIDGED_ARRAY);

    let backing = b
        .call_method_raw(wrapper.obj(), names::BRIDGED_ARRAY, "kotlin", "(Z)Lvm/util/List;", &[ManagedValue::bool(true)])
        .unwrap();
    let backing = b.adopt(backing).unwrap();
    let extra = b.new_string("d").unwrap();
    b.call_method_raw(backing.obj(), names::LIST, "add", "(Lvm/lang/Object;)Z", &[extra.value()])
        .unwrap();

    let seen = Vec::<String>::from_managed(b, Some(wrapper.obj()), bridged()).unwrap();
    assert_eq!(seen, ["a", "B", "c", "d"]);
}

#[test]
fn test_outcome_success_and_failure() {
    let h = harness();
    let b = &*h.bridge;
    for options in both_modes() {
        let ok: Result<i32, ThrownError> = Ok(42);
        assert_eq!(round_trip(b, &ok, options).unwrap(), Ok(42));

        let failed: Result<i32, ThrownError> = Err(ThrownError::new("boom"));
        let back = round_trip(b, &failed, options).unwrap();
        let err = back.unwrap_err();
        assert!(err.to_string().contains("boom"));
        assert_eq!(err.message(), Some("boom"));
    }
}

#[test]
fn test_large_list_leaves_no_locals() {
    let h = harness();
    let b = &*h.bridge;
    let big: Vec<String> = (0..5_000).map(|i| format!("item-{}", i)).collect();
    let before = h.vm.local_ref_count();
    for options in both_modes() {
        let back = round_trip(b, &big, options).unwrap();
        assert_eq!(back.len(), big.len());
        assert_eq!(back[4_999], "item-4999");
    }
    assert_eq!(h.vm.local_ref_count(), before);
}

#[test]
fn test_any_value_mixed_list() {
    let h = harness();
    let b = &*h.bridge;
    let value = AnyValue::List(vec![
        AnyValue::from("a"),
        AnyValue::Int(1),
        AnyValue::Bool(true),
        AnyValue::Null,
        AnyValue::List(vec![AnyValue::Double(2.5)]),
    ]);
    for options in both_modes() {
        assert_eq!(round_trip(b, &value, options).unwrap(), value);
    }
}

#[test]
fn test_any_value_map_and_outcome() {
    let h = harness();
    let b = &*h.bridge;
    let mut entries = HashMap::new();
    entries.insert(AnyValue::from("k"), AnyValue::Long(9));
    let map = AnyValue::Map(entries);
    let outcome = AnyValue::Outcome(Ok(Box::new(AnyValue::from("done"))));
    for options in both_modes() {
        assert_eq!(round_trip(b, &map, options).unwrap(), map);
        assert_eq!(round_trip(b, &outcome, options).unwrap(), outcome);
    }
}

#[test]
fn test_any_value_peer() {
    let h = harness();
    h.bridge.register_peer_class(shape_chain()).unwrap();
    let shape: NativeObject = Arc::new(Shape { name: "sq".into() });
    let back = round_trip(&h.bridge, &AnyValue::Peer(shape.clone()), bridged()).unwrap();
    match back {
        AnyValue::Peer(peer) => assert!(Arc::ptr_eq(&peer, &shape)),
        other => panic!("expected peer, got {:?}", other),
    }
}

#[test]
fn test_unclassifiable_fails_closed() {
    let h = harness();
    let b = &*h.bridge;
    let plain = b.new_object_raw(names::OBJECT, "()V", &[]).unwrap();
    match AnyValue::from_managed(b, Some(plain.obj()), bridged()) {
        Err(BridgeError::Unclassifiable { class_name }) => assert_eq!(class_name, names::OBJECT),
        other => panic!("expected unclassifiable, got {:?}", other),
    }
    let kept = AnyValue::from_managed_with(b, Some(plain.obj()), bridged(), Some(&keep_managed)).unwrap();
    match kept {
        AnyValue::Managed(global) => assert!(h.bridge.env().is_same_object(Some(global.obj()), Some(plain.obj()))),
        other => panic!("expected managed, got {:?}", other),
    }
}

#[test]
fn test_hashable_box_as_map_key() {
    let h = harness();
    let b = &*h.bridge;
    let map = b.new_object_raw(names::LINKED_HASH_MAP, "()V", &[]).unwrap();
    let put = "(Lvm/lang/Object;Lvm/lang/Object;)Lvm/lang/Object;";
    for value in ["v1", "v2"] {
        let key = b.wrap_hashable(("point", 3, 4)).unwrap();
        let value = b.new_string(value).unwrap();
        let previous = b
            .call_method_raw(map.obj(), names::MAP, "put", put, &[key.value(), value.value()])
            .unwrap();
        drop(b.adopt(previous));
    }
    let size = b.call_method_raw(map.obj(), names::MAP, "size", "()I", &[]).unwrap();
    assert_eq!(size.as_int(), Some(1));
}

#[test]
fn test_native_closure_invoked_from_managed() {
    let h = harness();
    let b = &*h.bridge;
    let closure = b.new_closure(|| Ok(AnyValue::from("from native"))).unwrap();
    let result = b
        .call_method_raw(closure.obj(), names::NATIVE_CLOSURE, "invoke", "()Lvm/lang/Object;", &[])
        .unwrap();
    let result: Option<LocalRef<'_>> = b.adopt(result);
    assert_eq!(b.read_string(result.unwrap().obj()).unwrap(), "from native");
    assert!(b.closure_of(closure.obj()).unwrap().call().is_ok());
}
