//! Audited writes
//!
//! [`AuditTrail::write`] wraps [`Record::write`]: for every tracked field in
//! the payload it captures the formatted old and new values, performs the
//! write, and only then appends one [`RecordLog`] per (record, field).

use crate::error::AuditResult;
use crate::formatter::ValueFormatter;
use crate::record_log::{summary, LogStore, LogValues, LoggedField, Origin, OriginRegistry, RecordLog};
use lims_core::{read_attribute, Environment, Error, Record, Values};
use log::{debug, trace};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

/// Which fields of a model are audited
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingPolicy {
    pub model: String,
    pub track_fields: BTreeSet<String>,
    /// Workflow state field; its changes are flagged as transitions
    pub transition_field: Option<String>,
}

impl TrackingPolicy {
    /// Create a policy tracking nothing
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Self::default()
        }
    }

    /// Track `field` (builder style)
    pub fn track(mut self, field: impl Into<String>) -> Self {
        self.track_fields.insert(field.into());
        self
    }

    /// Mark `field` as the transition field (builder style); it is tracked as well
    pub fn transition(mut self, field: impl Into<String>) -> Self {
        let field = field.into();
        self.track_fields.insert(field.clone());
        self.transition_field = Some(field);
        self
    }

    /// Tracked fields present in `values`
    pub fn tracked_in<'v>(&self, values: &'v Values) -> Vec<&'v str> {
        values
            .keys()
            .filter(|name| self.track_fields.contains(name.as_str()))
            .map(String::as_str)
            .collect()
    }

    fn is_transition(&self, field: &str) -> bool {
        self.transition_field.as_deref() == Some(field)
    }
}

/// Records field changes of audited models
pub struct AuditTrail {
    env: Environment,
    origins: OriginRegistry,
    policies: BTreeMap<String, TrackingPolicy>,
    logs: Rc<dyn LogStore>,
}

impl AuditTrail {
    /// Create a trail writing rows to `logs`
    pub fn new(env: Environment, origins: OriginRegistry, logs: Rc<dyn LogStore>) -> Self {
        Self {
            env,
            origins,
            policies: BTreeMap::new(),
            logs,
        }
    }

    /// Audit a model (builder style)
    pub fn with_policy(mut self, policy: TrackingPolicy) -> Self {
        self.add_policy(policy);
        self
    }

    /// Audit a model, replacing any previous policy for it
    pub fn add_policy(&mut self, policy: TrackingPolicy) {
        self.policies.insert(policy.model.clone(), policy);
    }

    /// Policy of `model`, if audited
    pub fn policy(&self, model: &str) -> Option<&TrackingPolicy> {
        self.policies.get(model)
    }

    /// Active environment
    pub fn env(&self) -> &Environment {
        &self.env
    }

    /// Write `values` to every record, logging changes of tracked fields
    ///
    /// Returns the created rows. When the write fails no row is created.
    pub fn write(&self, records: &[Rc<dyn Record>], values: &Values) -> AuditResult<Vec<RecordLog>> {
        let pending = self.snapshot(records, values)?;

        for record in records {
            record.write(values)?;
        }

        if pending.is_empty() {
            trace!("write of {} record(s) touches no tracked field", records.len());
            return Ok(Vec::new());
        }

        debug!("logging {} change(s)", pending.len());
        pending
            .into_iter()
            .map(|log| self.register_log(log))
            .collect()
    }

    /// Formatted old and new values of every tracked field being written
    fn snapshot(&self, records: &[Rc<dyn Record>], values: &Values) -> AuditResult<Vec<LogValues>> {
        let mut pending = Vec::new();
        let formatter = ValueFormatter::new(&self.env);

        for record in records {
            let reference = record.reference();
            let policy = match self.policies.get(&reference.model) {
                Some(policy) => policy,
                None => continue,
            };
            let fields = policy.tracked_in(values);
            if fields.is_empty() {
                continue;
            }

            let origin = Origin::from(reference);
            self.origins.check(&origin)?;

            for field in fields {
                let def = self
                    .env
                    .schema
                    .field(&origin.model, field)
                    .ok_or_else(|| Error::UnknownField {
                        model: origin.model.clone(),
                        field: field.to_string(),
                    })?;
                let old = read_attribute(record.as_ref(), field)?.unwrap_or_default();
                let new = values.get(field).cloned().unwrap_or_default();

                pending.push(
                    LogValues::new(
                        origin.clone(),
                        LoggedField::from(&def),
                        formatter.format_field(&def, &old),
                        formatter.format_field(&def, &new),
                    )
                    .transition(policy.is_transition(field)),
                );
            }
        }
        Ok(pending)
    }

    /// Append one row, defaulting user, date and summary from the environment
    pub fn register_log(&self, values: LogValues) -> AuditResult<RecordLog> {
        self.origins.check(&values.origin)?;
        let log = RecordLog {
            id: 0,
            name: values
                .name
                .unwrap_or_else(|| summary(&values.old_value, &values.new_value)),
            user: values.user.unwrap_or_else(|| self.env.user.clone()),
            date: values.date.unwrap_or_else(|| self.env.now()),
            origin: values.origin,
            field: values.field,
            old_value: values.old_value,
            new_value: values.new_value,
            is_transition: values.is_transition,
        };
        Ok(self.logs.create(log))
    }

    /// Rows of `origin`, oldest first
    pub fn logs_for(&self, origin: &Origin) -> Vec<RecordLog> {
        self.logs.logs_for(origin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AuditError;
    use crate::record_log::MemoryLogStore;
    use chrono::NaiveDate;
    use lims_core::{
        FieldDef, FieldType, FixedClock, MemoryRecord, MemorySchema, MemoryStore, RecordRef,
        SelectionOption, Value,
    };
    use pretty_assertions::assert_eq;

    const MODEL: &str = "lims.sample";

    struct Fixture {
        store: Rc<MemoryStore>,
        logs: Rc<MemoryLogStore>,
        trail: AuditTrail,
    }

    fn fixture() -> Fixture {
        let schema = MemorySchema::new()
            .with_field(
                FieldDef::new(
                    MODEL,
                    "state",
                    FieldType::Selection(vec![
                        SelectionOption::new("pending", "Pending"),
                        SelectionOption::new("done", "Done"),
                    ]),
                )
                .with_label("Status"),
            )
            .with_field(FieldDef::new(MODEL, "qty", FieldType::Integer))
            .with_field(FieldDef::new(MODEL, "notes", FieldType::Text));
        let store = Rc::new(MemoryStore::new());
        let now = NaiveDate::from_ymd_opt(2024, 5, 2)
            .and_then(|d| d.and_hms_opt(8, 0, 0))
            .unwrap();
        let env = Environment::new(store.clone(), Rc::new(schema), RecordRef::new("res.users", 2))
            .with_clock(Rc::new(FixedClock(now)));
        let logs = Rc::new(MemoryLogStore::new());
        let trail = AuditTrail::new(env, OriginRegistry::new().with_model(MODEL), logs.clone())
            .with_policy(TrackingPolicy::new(MODEL).track("qty").transition("state"));
        Fixture { store, logs, trail }
    }

    fn sample(f: &Fixture, id: i64) -> Rc<dyn Record> {
        f.store.insert(
            MemoryRecord::new(MODEL, id)
                .with_field("state", "pending")
                .with_field("qty", 1)
                .with_field("notes", ""),
        )
    }

    fn values(pairs: &[(&str, Value)]) -> Values {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_transition_logged_with_labels() {
        let f = fixture();
        let record = sample(&f, 1);
        let rows = f
            .trail
            .write(&[record.clone()], &values(&[("state", Value::text("done"))]))
            .unwrap();

        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.old_value, "Pending");
        assert_eq!(row.new_value, "Done");
        assert_eq!(row.name, "Pending → Done");
        assert!(row.is_transition);
        assert_eq!(row.field.label, "Status");
        assert_eq!(row.user, RecordRef::new("res.users", 2));
        assert_eq!(row.origin, Origin::new(MODEL, 1));
        assert_eq!(
            read_attribute(record.as_ref(), "state").unwrap(),
            Some(Value::text("done"))
        );
    }

    #[test]
    fn test_one_row_per_record_and_field() {
        let f = fixture();
        let records = [sample(&f, 1), sample(&f, 2)];
        let rows = f
            .trail
            .write(
                &records,
                &values(&[("state", Value::text("done")), ("qty", Value::Integer(5))]),
            )
            .unwrap();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows.iter().filter(|r| r.is_transition).count(), 2);
        assert_eq!(f.trail.logs_for(&Origin::new(MODEL, 2)).len(), 2);
    }

    #[test]
    fn test_untracked_write_logs_nothing() {
        let f = fixture();
        let record = sample(&f, 1);
        let rows = f
            .trail
            .write(&[record.clone()], &values(&[("notes", Value::text("checked"))]))
            .unwrap();
        assert!(rows.is_empty());
        assert!(f.logs.is_empty());
        assert_eq!(
            read_attribute(record.as_ref(), "notes").unwrap(),
            Some(Value::text("checked"))
        );
    }

    #[test]
    fn test_same_value_still_logged() {
        let f = fixture();
        let record = sample(&f, 1);
        let rows = f
            .trail
            .write(&[record], &values(&[("qty", Value::Integer(1))]))
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].old_value, rows[0].new_value);
        assert!(!rows[0].is_transition);
    }

    #[test]
    fn test_failed_write_logs_nothing() {
        let f = fixture();
        sample(&f, 1);
        let concrete = f.store.get(&RecordRef::new(MODEL, 1)).unwrap();
        concrete.reject_writes(true);
        let record: Rc<dyn Record> = concrete;

        let result = f
            .trail
            .write(&[record], &values(&[("state", Value::text("done"))]));
        assert!(matches!(result, Err(AuditError::Core(Error::WriteFailed { .. }))));
        assert!(f.logs.is_empty());
    }

    #[test]
    fn test_unregistered_origin_rejected_before_write() {
        let mut f = fixture();
        f.trail.add_policy(TrackingPolicy::new("lims.lot").track("qty"));
        let lot: Rc<dyn Record> = f.store.insert(MemoryRecord::new("lims.lot", 1).with_field("qty", 1));

        let result = f.trail.write(&[lot.clone()], &values(&[("qty", Value::Integer(2))]));
        assert!(matches!(result, Err(AuditError::UnknownOrigin(_))));
        assert_eq!(read_attribute(lot.as_ref(), "qty").unwrap(), Some(Value::Integer(1)));
    }

    #[test]
    fn test_register_log_defaults() {
        let f = fixture();
        let field = LoggedField {
            model: MODEL.into(),
            name: "qty".into(),
            label: "qty".into(),
        };
        let row = f
            .trail
            .register_log(LogValues::new(Origin::new(MODEL, 9), field.clone(), "1", "2"))
            .unwrap();
        assert_eq!(row.name, "1 → 2");
        assert_eq!(row.user, RecordRef::new("res.users", 2));
        assert_eq!(row.date, f.trail.env().now());
        assert!(!row.is_transition);

        let row = f
            .trail
            .register_log(
                LogValues::new(Origin::new(MODEL, 9), field.clone(), "1", "2")
                    .by(RecordRef::new("res.users", 7))
                    .named("manual"),
            )
            .unwrap();
        assert_eq!(row.user, RecordRef::new("res.users", 7));
        assert_eq!(row.name, "manual");

        assert!(f
            .trail
            .register_log(LogValues::new(Origin::new("sale.order", 1), field, "", ""))
            .is_err());
    }
}
