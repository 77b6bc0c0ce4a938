//! Field-schema reflection

/// Option of a selection field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionOption {
    /// Stored code
    pub value: String,
    /// Display label (source language)
    pub label: String,
}

impl SelectionOption {
    /// Create a new selection option
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }
}

/// Semantic type of a field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    Char,
    Text,
    Integer,
    /// Float with optional display precision
    Float {
        digits: Option<u32>,
    },
    Boolean,
    Date,
    DateTime,
    /// Enum-like field with declared options
    Selection(Vec<SelectionOption>),
    /// Reference to a single record of `comodel`
    Many2One {
        comodel: String,
    },
}

/// Field definition
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    /// Owning model
    pub model: String,
    /// Technical name
    pub name: String,
    /// Human label
    pub label: String,
    /// Semantic type
    pub field_type: FieldType,
}

impl FieldDef {
    /// Create a field definition labelled with its technical name
    pub fn new(model: impl Into<String>, name: impl Into<String>, field_type: FieldType) -> Self {
        let name = name.into();
        Self {
            model: model.into(),
            label: name.clone(),
            name,
            field_type,
        }
    }

    /// Set the human label
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Label of the selection option stored as `code`
    pub fn selection_label(&self, code: &str) -> Option<&str> {
        match &self.field_type {
            FieldType::Selection(options) => options
                .iter()
                .find(|o| o.value == code)
                .map(|o| o.label.as_str()),
            _ => None,
        }
    }
}

/// Field reflection and translation supplied by the host
pub trait Schema {
    /// Definition of `model.name`, or `None` if the field does not exist
    fn field(&self, model: &str, name: &str) -> Option<FieldDef>;

    /// Translation of `source` into `lang`, if one exists
    fn translate(&self, lang: &str, source: &str) -> Option<String> {
        let _ = (lang, source);
        None
    }
}
