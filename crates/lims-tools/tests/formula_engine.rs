//! Solving keyed formulas against live records

use lims_tools::prelude::*;
use lims_tools::{FormulaError, StatusIcon, TemplateStatus};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

struct Lab {
    store: Rc<MemoryStore>,
    catalog: Rc<RefCell<FormulaCatalog>>,
    engine: FormulaEngine,
}

fn lab(templates: &[(&str, &str)]) -> Lab {
    let store = Rc::new(MemoryStore::new());
    let catalog = Rc::new(RefCell::new(FormulaCatalog::new()));
    for (key, expression) in templates {
        catalog
            .borrow_mut()
            .create(FormulaTemplate::new(*key, *key, *expression))
            .unwrap();
    }
    let engine = FormulaEngine::new(store.clone(), catalog.clone());
    Lab {
        store,
        catalog,
        engine,
    }
}

fn values(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

/// `=A1*0.21` with A1 = 100 solves to 21
#[test]
fn test_tax_rate_from_values() {
    let lab = lab(&[("tax_rate", "=A1*0.21")]);
    let solution = lab
        .engine
        .solve_formula(None, "tax_rate", &values(&[("A1", Value::Integer(100))]))
        .unwrap();
    assert_eq!(solution, Solution::Value(FormulaValue::Number(21.0)));
}

/// IS_NUMBER probes numeric text without failing
#[test]
fn test_is_number_probe() {
    let lab = lab(&[("probe", "=IS_NUMBER(A1)")]);
    let solve = |raw: &str| {
        lab.engine
            .solve_formula(None, "probe", &values(&[("A1", Value::text(raw))]))
            .unwrap()
            .into_value()
    };
    assert_eq!(solve("abc"), Some(FormulaValue::Boolean(false)));
    assert_eq!(solve("3.5"), Some(FormulaValue::Boolean(true)));
}

/// RUN_LATER invokes the target method exactly once, after evaluation
#[test]
fn test_run_later_activates_target() {
    let lab = lab(&[("activate", "=RUN_LATER(TARGET,\"activate\")")]);
    let target = lab.store.insert(
        MemoryRecord::new("lims.sample", 12)
            .with_field("active", false)
            .with_method("activate", |rec, _| {
                rec.set("active", true);
                Ok(Value::Boolean(true))
            }),
    );

    let solution = lab
        .engine
        .solve_formula(
            None,
            "activate",
            &values(&[("TARGET", Value::record("lims.sample", 12))]),
        )
        .unwrap();

    assert_eq!(solution, Solution::Value(FormulaValue::Boolean(true)));
    assert_eq!(target.call_count("activate"), 1);
    assert_eq!(target.get("active"), Some(Value::Boolean(true)));
}

/// RUN_LATER arguments travel through the payload with references intact
#[test]
fn test_run_later_passes_arguments() {
    let lab = lab(&[(
        "assign",
        "=RUN_LATER(sample, \"assign\", analyst, qty * 2, \"urgent\")",
    )]);
    lab.store.insert(MemoryRecord::new("res.users", 4));
    let sample = lab.store.insert(
        MemoryRecord::new("lims.sample", 1)
            .with_field("analyst", Value::record("res.users", 4))
            .with_field("qty", 3)
            .with_method("assign", |_, _| Ok(Value::Null)),
    );

    let caller = MemoryRecord::new("lims.batch", 1).with_field("sample", Value::record("lims.sample", 1));
    let bag = values(&[
        ("analyst", Value::record("res.users", 4)),
        ("qty", Value::Integer(3)),
    ]);
    lab.engine.solve_formula(Some(&caller), "assign", &bag).unwrap();

    assert_eq!(
        sample.calls(),
        vec![(
            "assign".to_string(),
            vec![
                Value::record("res.users", 4),
                Value::Float(6.0),
                Value::text("urgent"),
            ]
        )]
    );
}

/// RUN calls immediately and its result feeds the formula
#[test]
fn test_run_result_feeds_formula() {
    let lab = lab(&[("total", "=RUN(sample, \"weight\", 2) + 1")]);
    lab.store.insert(
        MemoryRecord::new("lims.sample", 1).with_method("weight", |_, args| {
            Ok(Value::Float(args.first().and_then(Value::as_f64).unwrap_or(0.0) * 10.0))
        }),
    );
    let solution = lab
        .engine
        .solve_formula(None, "total", &values(&[("sample", Value::record("lims.sample", 1))]))
        .unwrap();
    assert_eq!(solution.value(), Some(&FormulaValue::Number(21.0)));
}

#[test]
fn test_run_unknown_method_is_formula_failed() {
    let lab = lab(&[("k", "=RUN(sample, \"explode\")")]);
    lab.store.insert(MemoryRecord::new("lims.sample", 1));
    let err = lab
        .engine
        .solve_formula(None, "k", &values(&[("sample", Value::record("lims.sample", 1))]))
        .unwrap_err();
    assert!(matches!(err, FormulaError::FormulaFailed(_)));
    assert!(err.to_string().starts_with("Formula Failed"));
}

/// A missing key names the key
#[test]
fn test_missing_formula_names_key() {
    let lab = lab(&[]);
    let err = lab.engine.get_formula("nonexistent_key").unwrap_err();
    assert!(matches!(err, FormulaError::MissingFormula(_)));
    assert!(err.to_string().contains("nonexistent_key"));
}

#[test]
fn test_duplicate_keys_are_rejected() {
    let lab = lab(&[("k", "=1")]);
    assert!(matches!(
        lab.catalog
            .borrow_mut()
            .create(FormulaTemplate::new("Other", "k", "=2")),
        Err(FormulaError::DuplicateKey(_))
    ));
    assert!(lab.engine.get_formula("k").is_ok());
}

#[test]
fn test_entity_solves_from_own_fields() {
    let lab = lab(&[("concentration", "=mass / sample_id.volume")]);
    lab.store.insert(MemoryRecord::new("lims.sample", 3).with_field("volume", 4));
    let result = MemoryRecord::new("lims.result", 1)
        .with_field("mass", 10)
        .with_field("sample_id", Value::record("lims.sample", 3));

    let entity = FormulaEntity::new(&lab.engine, &result);
    assert_eq!(
        entity.solve("concentration").unwrap().value(),
        Some(&FormulaValue::Number(2.5))
    );
    assert_eq!(entity.input("sample_id.volume").unwrap(), Value::Integer(4));
}

#[test]
fn test_entity_edit_buffer_fills_gaps() {
    let lab = lab(&[("k", "=mass * factor")]);
    let result = MemoryRecord::new("lims.result", 1).with_field("mass", 10);
    let entity = FormulaEntity::new(&lab.engine, &result);

    let edits = values(&[("factor", Value::Float(0.5)), ("mass", Value::Integer(1000))]);
    assert_eq!(
        entity.solve_with("k", &edits).unwrap().value(),
        Some(&FormulaValue::Number(5.0))
    );
}

#[test]
fn test_broadcast_feeds_aggregates() {
    let lab = lab(&[("total", "=SUM(sample.analyses.price)")]);
    for (id, price) in [(1, 10.0), (2, 12.5)] {
        lab.store.insert(MemoryRecord::new("lims.analysis", id).with_field("price", price));
    }
    lab.store.insert(MemoryRecord::new("lims.sample", 1).with_field(
        "analyses",
        Value::List(vec![
            Value::record("lims.analysis", 1),
            Value::record("lims.analysis", 2),
        ]),
    ));
    let solution = lab
        .engine
        .solve_formula(None, "total", &values(&[("sample", Value::record("lims.sample", 1))]))
        .unwrap();
    assert_eq!(solution.value(), Some(&FormulaValue::Number(22.5)));
}

#[test]
fn test_template_status_traffic_light() {
    let lab = lab(&[]);
    let sample = MemoryRecord::new("lims.sample", 1).with_field("qty", 2);
    let entity = FormulaEntity::new(&lab.engine, &sample);

    let green = entity.status(&FormulaTemplate::new("A", "a", "=qty * 2"));
    let yellow = entity.status(&FormulaTemplate::new("B", "b", "=qty * rate"));
    let red = entity.status(&FormulaTemplate::new("C", "c", "=qty *"));
    let unknown = entity.status(&FormulaTemplate::new("D", "d", "=FOO(qty)"));

    assert_eq!(green.icon(), StatusIcon::Green);
    assert_eq!(yellow, TemplateStatus::Unresolved(vec!["rate".to_string()]));
    assert_eq!(yellow.icon(), StatusIcon::Yellow);
    assert_eq!(red.icon(), StatusIcon::Red);
    assert_eq!(
        unknown,
        TemplateStatus::Invalid("Invalid Formula: unknown method(s): FOO".to_string())
    );
}

#[test]
fn test_invalid_template_is_reported_not_raised() {
    let lab = lab(&[("broken", "=SUM(1,")]);
    match lab.engine.solve_formula(None, "broken", &()).unwrap() {
        Solution::Invalid(message) => assert!(message.starts_with("Invalid Formula: ")),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_extension_inputs() {
    let mut lab = lab(&[("limit", "=IF(result > max_allowed, \"FAIL\", \"PASS\")")]);
    lab.engine
        .register_extension("lims.result", |_: &dyn Record, name: &str| {
            (name == "max_allowed").then(|| Value::Float(5.0))
        });
    let over = MemoryRecord::new("lims.result", 1).with_field("result", 7.2);
    let under = MemoryRecord::new("lims.result", 2).with_field("result", 1.1);

    let verdict = |record: &MemoryRecord| {
        FormulaEntity::new(&lab.engine, record)
            .solve("limit")
            .unwrap()
            .into_value()
    };
    assert_eq!(verdict(&over), Some(FormulaValue::String("FAIL".into())));
    assert_eq!(verdict(&under), Some(FormulaValue::String("PASS".into())));
}

proptest! {
    /// Optional inputs that resolve nowhere never fail a solve
    #[test]
    fn prop_unresolvable_inputs_are_null(name in "[a-z][a-z0-9_]{0,12}") {
        prop_assume!(name != "true" && name != "false");
        let expression = format!("=IF(ISBLANK({0}), 0, {0})", name);
        let lab = lab(&[("optional", expression.as_str())]);
        let caller = MemoryRecord::new("lims.sample", 1);
        let solution = lab.engine.solve_formula(Some(&caller), "optional", &()).unwrap();
        prop_assert_eq!(solution.into_value(), Some(FormulaValue::Number(0.0)));
    }

    /// At most one template per key is resolvable
    #[test]
    fn prop_one_template_per_key(keys in prop::collection::vec("[a-c]{1,2}", 1..12)) {
        let lab = lab(&[]);
        for key in &keys {
            let _ = lab.catalog.borrow_mut().create(FormulaTemplate::new(key.clone(), key.clone(), "=1"));
        }
        for key in &keys {
            prop_assert!(lab.engine.get_formula(key).is_ok());
        }
    }
}
