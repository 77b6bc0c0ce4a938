//! Formula templates and categories

use crate::error::{FormulaError, FormulaResult};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::BTreeMap;

/// Identifier of a [`FormulaTemplate`]
pub type TemplateId = u64;

/// Identifier of a [`FormulaCategory`]
pub type CategoryId = u64;

/// Grouping of formula templates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormulaCategory {
    pub id: CategoryId,
    pub name: String,
    pub code: String,
}

/// A persisted, keyed formula
///
/// `expression` starting with `=` is a live formula; anything else is a
/// static constant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormulaTemplate {
    pub id: TemplateId,
    pub name: String,
    pub key: String,
    pub expression: String,
    #[serde(default)]
    pub category: Option<CategoryId>,
}

impl FormulaTemplate {
    /// Create a template without an identity (the catalog assigns one)
    pub fn new(name: impl Into<String>, key: impl Into<String>, expression: impl Into<String>) -> Self {
        Self {
            id: 0,
            name: name.into(),
            key: key.into(),
            expression: expression.into(),
            category: None,
        }
    }

    /// Put the template in a category (builder style)
    pub fn in_category(mut self, category: CategoryId) -> Self {
        self.category = Some(category);
        self
    }

    /// Whether the expression is a live formula
    pub fn is_formula(&self) -> bool {
        self.expression.trim_start().starts_with('=')
    }
}

/// Read access to templates by key
pub trait TemplateSource {
    /// Every template registered under `key`
    fn find_by_key(&self, key: &str) -> Vec<FormulaTemplate>;
}

impl TemplateSource for Vec<FormulaTemplate> {
    fn find_by_key(&self, key: &str) -> Vec<FormulaTemplate> {
        self.iter().filter(|t| t.key == key).cloned().collect()
    }
}

/// In-memory template and category store with key uniqueness
#[derive(Debug, Default, Clone)]
pub struct FormulaCatalog {
    templates: BTreeMap<TemplateId, FormulaTemplate>,
    categories: BTreeMap<CategoryId, FormulaCategory>,
    next_id: u64,
}

impl FormulaCatalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn check_key(&self, key: &str, except: Option<TemplateId>) -> FormulaResult<()> {
        let taken = self
            .templates
            .values()
            .any(|t| t.key == key && Some(t.id) != except);
        if taken {
            return Err(FormulaError::DuplicateKey(key.to_string()));
        }
        Ok(())
    }

    fn check_category(&self, category: Option<CategoryId>) -> FormulaResult<()> {
        match category {
            Some(id) if !self.categories.contains_key(&id) => {
                Err(FormulaError::Argument(format!("unknown category {}", id)))
            }
            _ => Ok(()),
        }
    }

    /// Add a category, returning its id
    pub fn create_category(&mut self, name: impl Into<String>, code: impl Into<String>) -> CategoryId {
        let id = self.allocate_id();
        self.categories.insert(
            id,
            FormulaCategory {
                id,
                name: name.into(),
                code: code.into(),
            },
        );
        id
    }

    /// Look up a category
    pub fn category(&self, id: CategoryId) -> Option<&FormulaCategory> {
        self.categories.get(&id)
    }

    /// Add a template; fails if its key is already taken
    pub fn create(&mut self, mut template: FormulaTemplate) -> FormulaResult<TemplateId> {
        self.check_key(&template.key, None)?;
        self.check_category(template.category)?;
        template.id = self.allocate_id();
        let id = template.id;
        self.templates.insert(id, template);
        Ok(id)
    }

    /// Replace a template; fails if it does not exist, the new key is taken
    /// or its category is unknown
    pub fn update(&mut self, template: FormulaTemplate) -> FormulaResult<()> {
        if !self.templates.contains_key(&template.id) {
            return Err(FormulaError::Argument(format!("unknown template {}", template.id)));
        }
        self.check_key(&template.key, Some(template.id))?;
        self.check_category(template.category)?;
        self.templates.insert(template.id, template);
        Ok(())
    }

    /// Remove a template
    pub fn delete(&mut self, id: TemplateId) -> Option<FormulaTemplate> {
        self.templates.remove(&id)
    }

    /// Look up a template
    pub fn get(&self, id: TemplateId) -> Option<&FormulaTemplate> {
        self.templates.get(&id)
    }

    /// Templates in `category`
    pub fn in_category(&self, category: CategoryId) -> Vec<&FormulaTemplate> {
        self.templates
            .values()
            .filter(|t| t.category == Some(category))
            .collect()
    }

    /// Every template, in creation order
    pub fn templates(&self) -> impl Iterator<Item = &FormulaTemplate> {
        self.templates.values()
    }

    /// Number of templates
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Check if the catalog has no templates
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

impl TemplateSource for FormulaCatalog {
    fn find_by_key(&self, key: &str) -> Vec<FormulaTemplate> {
        self.templates.values().filter(|t| t.key == key).cloned().collect()
    }
}

/// A catalog shared with an engine while still being edited
impl TemplateSource for RefCell<FormulaCatalog> {
    fn find_by_key(&self, key: &str) -> Vec<FormulaTemplate> {
        self.borrow().find_by_key(key)
    }
}
