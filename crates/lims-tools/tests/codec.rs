//! Argument payloads of deferred calls

use lims_tools::prelude::*;
use lims_tools::{decode, encode, DeferredCall};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::collections::BTreeMap;

fn store() -> MemoryStore {
    let store = MemoryStore::new();
    store.insert(MemoryRecord::new("foo", 5));
    for id in 1..=3 {
        store.insert(MemoryRecord::new("lims.sample", id));
    }
    store
}

/// `[1, {"a": foo,5}, (2, 3)]` survives encoding with the reference rehydrated
#[test]
fn test_nested_reference_round_trip() {
    let store = store();
    let mut map = BTreeMap::new();
    map.insert("a".to_string(), Value::record("foo", 5));
    let args = vec![
        Value::Integer(1),
        Value::Map(map),
        Value::List(vec![Value::Integer(2), Value::Integer(3)]),
    ];

    let decoded = decode(&encode(&args).unwrap(), &store);
    assert_eq!(decoded, args);

    let reference = match &decoded[1] {
        Value::Map(entries) => entries.get("a").and_then(Value::as_record).cloned(),
        _ => None,
    };
    let record = reference.and_then(|r| store.browse(&r)).unwrap();
    assert_eq!(record.reference(), RecordRef::new("foo", 5));
}

#[test]
fn test_payload_is_data_not_code() {
    let store = store();
    let payload = r#"[{"kind":"text","value":"__import__('os').system('rm -rf /')"}]"#;
    assert_eq!(
        decode(payload, &store),
        vec![Value::text("__import__('os').system('rm -rf /')")]
    );
}

#[test]
fn test_deleted_target_decodes_to_null() {
    let store = store();
    let call = DeferredCall::new(&Value::record("lims.sample", 99), "activate", &[]).unwrap();
    let decoded = call.decode(&store).unwrap();
    assert_eq!(decoded.target, Value::Null);
    assert_eq!(decoded.method, "activate");
}

fn arb_arg() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Boolean),
        any::<i64>().prop_map(Value::Integer),
        (-1e9f64..1e9f64).prop_map(Value::Float),
        "[ -~]{0,16}".prop_map(Value::Text),
        (1i64..=3).prop_map(|id| Value::record("lims.sample", id)),
        Just(Value::record("foo", 5)),
    ];
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::List),
            prop::collection::btree_map("[a-z_]{1,8}", inner, 0..4).prop_map(Value::Map),
        ]
    })
}

proptest! {
    #[test]
    fn prop_deferred_call_round_trip(
        id in 1i64..=3,
        method in "[a-z_]{1,12}",
        args in prop::collection::vec(arb_arg(), 0..5),
    ) {
        let store = store();
        let target = Value::record("lims.sample", id);
        let call = DeferredCall::new(&target, &method, &args).unwrap();
        let decoded = call.decode(&store).unwrap();
        prop_assert_eq!(decoded.target, target);
        prop_assert_eq!(decoded.method, method);
        prop_assert_eq!(decoded.args, args);
    }
}
