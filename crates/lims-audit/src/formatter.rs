//! Type-aware rendering of field values for audit rows

use chrono::{NaiveDate, NaiveDateTime};
use lims_core::{Environment, Error, FieldDef, FieldType, RecordRef, Result, Value};
use log::warn;
use rust_decimal::{Decimal, RoundingStrategy};
use std::fmt::{Display, Write};

/// Renders raw field values the way a user reads them
pub struct ValueFormatter<'a> {
    env: &'a Environment,
}

impl<'a> ValueFormatter<'a> {
    /// Create a formatter for the active environment
    pub fn new(env: &'a Environment) -> Self {
        Self { env }
    }

    /// Render `raw` as a value of `model.field`
    ///
    /// Fails only when the schema does not declare the field.
    pub fn format_value(&self, model: &str, field: &str, raw: &Value) -> Result<String> {
        let def = self
            .env
            .schema
            .field(model, field)
            .ok_or_else(|| Error::UnknownField {
                model: model.to_string(),
                field: field.to_string(),
            })?;
        Ok(self.format_field(&def, raw))
    }

    /// Render `raw` for an already resolved field definition
    pub fn format_field(&self, def: &FieldDef, raw: &Value) -> String {
        if raw.is_null() {
            return String::new();
        }
        match &def.field_type {
            FieldType::DateTime => self.format_datetime(raw),
            FieldType::Date => self.format_date(raw),
            FieldType::Selection(_) => self.format_selection(def, raw),
            FieldType::Many2One { comodel } => self.format_many2one(comodel, raw),
            FieldType::Float { digits: Some(digits) } => format_float(raw, *digits),
            _ => raw.to_string(),
        }
    }

    fn format_datetime(&self, raw: &Value) -> String {
        let (company, utc) = match (&self.env.company, as_datetime(raw)) {
            (Some(company), Some(utc)) => (company, utc),
            _ => return raw.to_string(),
        };
        let local = match company.to_local(&utc) {
            Some(local) => local,
            None => {
                warn!(
                    "company {} has an invalid timezone ({})",
                    company.name,
                    company.zone_label()
                );
                return raw.to_string();
            }
        };
        let pattern = format!("{} {}", self.env.lang.date_format, self.env.lang.time_format);
        render(local.format(&pattern)).unwrap_or_else(|| raw.to_string())
    }

    fn format_date(&self, raw: &Value) -> String {
        if self.env.company.is_none() {
            return raw.to_string();
        }
        match as_date(raw) {
            Some(date) => {
                render(date.format(&self.env.lang.date_format)).unwrap_or_else(|| raw.to_string())
            }
            None => raw.to_string(),
        }
    }

    fn format_selection(&self, def: &FieldDef, raw: &Value) -> String {
        let code = raw.to_string();
        match def.selection_label(&code) {
            Some(label) => self
                .env
                .schema
                .translate(&self.env.lang.code, label)
                .unwrap_or_else(|| label.to_string()),
            None => code,
        }
    }

    fn format_many2one(&self, comodel: &str, raw: &Value) -> String {
        let reference = match raw {
            Value::Record(reference) => reference.clone(),
            Value::Integer(id) => RecordRef::new(comodel, *id),
            _ => return String::new(),
        };
        self.env
            .browse(&reference)
            .and_then(|record| record.display_name())
            .unwrap_or_default()
    }
}

/// Round half away from zero to `digits` decimals and pad to exactly that many
fn format_float(raw: &Value, digits: u32) -> String {
    let decimal = raw.as_f64().and_then(|f| Decimal::try_from(f).ok());
    match decimal {
        Some(d) => {
            let mut rounded = d.round_dp_with_strategy(digits, RoundingStrategy::MidpointAwayFromZero);
            rounded.rescale(digits);
            rounded.to_string()
        }
        None => raw.to_string(),
    }
}

fn as_datetime(raw: &Value) -> Option<NaiveDateTime> {
    match raw {
        Value::DateTime(dt) => Some(*dt),
        Value::Date(d) => d.and_hms_opt(0, 0, 0),
        Value::Text(s) => NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
            .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S"))
            .ok(),
        _ => None,
    }
}

fn as_date(raw: &Value) -> Option<NaiveDate> {
    match raw {
        Value::Date(d) => Some(*d),
        Value::DateTime(dt) => Some(dt.date()),
        Value::Text(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d").ok(),
        _ => None,
    }
}

/// Render a chrono format; `None` when the pattern is not valid strftime
fn render(formatted: impl Display) -> Option<String> {
    let mut out = String::new();
    write!(out, "{}", formatted).ok()?;
    Some(out)
}
