//! Formula evaluation engine
//!
//! [`FormulaEngine`] ties templates, the function registry and record access
//! together. A caller (the record a formula is solved for) and a bag of
//! override values supply the formula's inputs:
//!
//! 1. dotted names resolve their head, then walk the rest of the path;
//! 2. an attribute of the caller with the exact name;
//! 3. the values bag (exact key, then ignoring case);
//! 4. the extension registered for the caller's model;
//! 5. otherwise null.
//!
//! Zero-argument methods met along the way are invoked.

use crate::codec::DeferredCall;
use crate::compile::{self, Compiled, TemplateStatus};
use crate::error::{FormulaError, FormulaResult};
use crate::evaluator::FormulaValue;
use crate::functions::{lims::dispatch, FunctionRegistry};
use crate::resolver::{access, parse_segment, split_path, AttributePathResolver, RecordPathResolver};
use crate::template::{FormulaTemplate, TemplateSource};
use ahash::AHashMap;
use lims_core::{read_attribute, Attribute, ObjectStore, Record, Value};
use log::{debug, trace, warn};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::hash::BuildHasher;
use std::rc::Rc;

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOptions {
    /// Keep compiled formulas per template key (recompiled when the expression changes)
    pub cache_compiled: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            cache_compiled: true,
        }
    }
}

/// Result of solving a formula
#[derive(Debug, Clone, PartialEq)]
pub enum Solution {
    /// No template is registered under the key
    Empty,
    /// The template does not compile
    Invalid(String),
    /// The computed value
    Value(FormulaValue),
}

impl Solution {
    /// The computed value, if any
    pub fn value(&self) -> Option<&FormulaValue> {
        match self {
            Solution::Value(v) => Some(v),
            _ => None,
        }
    }

    /// Take the computed value, if any
    pub fn into_value(self) -> Option<FormulaValue> {
        match self {
            Solution::Value(v) => Some(v),
            _ => None,
        }
    }

    /// Check if there was nothing to compute
    pub fn is_empty(&self) -> bool {
        matches!(self, Solution::Empty)
    }
}

/// Override inputs supplied to [`FormulaEngine::solve_formula`]
pub trait ValueBag {
    /// Value stored under `name`
    fn lookup(&self, name: &str) -> FormulaResult<Option<Value>>;
}

impl ValueBag for () {
    fn lookup(&self, _name: &str) -> FormulaResult<Option<Value>> {
        Ok(None)
    }
}

fn lookup_in<'a>(
    mut entries: impl Iterator<Item = (&'a String, &'a Value)> + Clone,
    name: &str,
) -> Option<Value> {
    if let Some((_, v)) = entries.clone().find(|(k, _)| k.as_str() == name) {
        return Some(v.clone());
    }
    let lowered = name.to_lowercase();
    entries
        .find(|(k, _)| k.to_lowercase() == lowered)
        .map(|(_, v)| v.clone())
}

impl<S: BuildHasher> ValueBag for HashMap<String, Value, S> {
    fn lookup(&self, name: &str) -> FormulaResult<Option<Value>> {
        if let Some(v) = self.get(name) {
            return Ok(Some(v.clone()));
        }
        Ok(lookup_in(self.iter(), name))
    }
}

impl ValueBag for BTreeMap<String, Value> {
    fn lookup(&self, name: &str) -> FormulaResult<Option<Value>> {
        Ok(lookup_in(self.iter(), name))
    }
}

/// Exposes a record's fields and zero-argument methods as a values bag
pub struct RecordValues<'a>(pub &'a dyn Record);

impl ValueBag for RecordValues<'_> {
    fn lookup(&self, name: &str) -> FormulaResult<Option<Value>> {
        Ok(read_attribute(self.0, name)?)
    }
}

/// Computed inputs supplied for records of one model
pub trait InputExtension {
    /// Value of `name` for `caller`, if this extension provides it
    fn input(&self, caller: &dyn Record, name: &str) -> FormulaResult<Option<Value>>;
}

impl<F> InputExtension for F
where
    F: Fn(&dyn Record, &str) -> Option<Value>,
{
    fn input(&self, caller: &dyn Record, name: &str) -> FormulaResult<Option<Value>> {
        Ok(self(caller, name))
    }
}

/// Solves keyed formula templates against live records
pub struct FormulaEngine {
    store: Rc<dyn ObjectStore>,
    templates: Rc<dyn TemplateSource>,
    registry: FunctionRegistry,
    resolver: Box<dyn AttributePathResolver>,
    extensions: AHashMap<String, Box<dyn InputExtension>>,
    options: EngineOptions,
    cache: RefCell<AHashMap<String, (String, Rc<Compiled>)>>,
}

impl FormulaEngine {
    /// Create an engine with the laboratory function registry and the default path resolver
    pub fn new(store: Rc<dyn ObjectStore>, templates: Rc<dyn TemplateSource>) -> Self {
        Self {
            resolver: Box::new(RecordPathResolver::new(Rc::clone(&store))),
            store,
            templates,
            registry: FunctionRegistry::with_lims_functions(),
            extensions: AHashMap::new(),
            options: EngineOptions::default(),
            cache: RefCell::new(AHashMap::new()),
        }
    }

    /// Replace the function registry
    pub fn with_registry(mut self, registry: FunctionRegistry) -> Self {
        self.registry = registry;
        self.clear_cache();
        self
    }

    /// Replace the path resolver
    pub fn with_resolver(mut self, resolver: Box<dyn AttributePathResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Replace the options
    pub fn with_options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self.clear_cache();
        self
    }

    /// Supply computed inputs for records of `model`
    pub fn register_extension(&mut self, model: impl Into<String>, extension: impl InputExtension + 'static) {
        self.extensions.insert(model.into(), Box::new(extension));
    }

    /// Functions available to formulas
    pub fn registry(&self) -> &FunctionRegistry {
        &self.registry
    }

    /// Look up the single template registered under `key`
    pub fn get_formula(&self, key: &str) -> FormulaResult<FormulaTemplate> {
        let mut found = self.templates.find_by_key(key);
        match found.len() {
            0 => Err(FormulaError::MissingFormula(key.to_string())),
            1 => Ok(found.remove(0)),
            count => Err(FormulaError::AmbiguousFormula {
                key: key.to_string(),
                count,
            }),
        }
    }

    /// Compile a template, reusing the cached result while its expression is unchanged
    pub fn compile(&self, template: &FormulaTemplate) -> Rc<Compiled> {
        if self.options.cache_compiled {
            if let Some((expression, compiled)) = self.cache.borrow().get(&template.key) {
                if *expression == template.expression {
                    return Rc::clone(compiled);
                }
            }
        }

        debug!("compiling formula {}", template.key);
        let compiled = Rc::new(compile::compile(&template.expression, &self.registry));
        if self.options.cache_compiled {
            self.cache.borrow_mut().insert(
                template.key.clone(),
                (template.expression.clone(), Rc::clone(&compiled)),
            );
        }
        compiled
    }

    /// Drop every cached compilation
    pub fn clear_cache(&self) {
        self.cache.borrow_mut().clear();
    }

    /// Edit-time status of a template; inputs the caller exposes count as known
    pub fn check_template(&self, template: &FormulaTemplate, caller: Option<&dyn Record>) -> TemplateStatus {
        let compiled = self.compile(template);
        compile::check_template(&compiled, |head| {
            caller.map_or(false, |c| own_attribute(c, head).is_some())
        })
    }

    /// Solve the template registered under `key`
    ///
    /// A missing template yields [`Solution::Empty`] and a broken one
    /// [`Solution::Invalid`]; an ambiguous key is an error. When the formula
    /// schedules a call with `RUN_LATER`, the call runs once after
    /// evaluation and the solution is whether it ran.
    ///
    /// Input names match the caller's attributes and the values bag
    /// exactly first, then in lowercase. Extensions receive the name as
    /// written in the formula.
    pub fn solve_formula(
        &self,
        caller: Option<&dyn Record>,
        key: &str,
        values: &dyn ValueBag,
    ) -> FormulaResult<Solution> {
        let template = match self.get_formula(key) {
            Ok(template) => template,
            Err(FormulaError::MissingFormula(_)) => {
                debug!("no formula under key {}", key);
                return Ok(Solution::Empty);
            }
            Err(e) => return Err(e),
        };

        let compiled = self.compile(&template);
        let formula = match compiled.as_ref() {
            Compiled::Formula(formula) => formula,
            Compiled::Static(value) => return Ok(Solution::Value(value.clone())),
            Compiled::Invalid(message) => return Ok(Solution::Invalid(message.clone())),
        };

        let args = formula
            .inputs()
            .iter()
            .map(|name| self.get_input_value(caller, name, values).map(FormulaValue::from))
            .collect::<FormulaResult<Vec<_>>>()?;

        let result = formula.call(&self.registry, Some(self.store.as_ref()), &args)?;

        match result.as_deferred() {
            Some(call) => {
                let ran = self.replay(call)?;
                Ok(Solution::Value(FormulaValue::Boolean(ran)))
            }
            None => Ok(Solution::Value(result)),
        }
    }

    /// Run a deferred call; false when its target no longer resolves
    fn replay(&self, call: &DeferredCall) -> FormulaResult<bool> {
        let decoded = match call.decode(self.store.as_ref()) {
            Some(decoded) => decoded,
            None => return Ok(false),
        };

        match &decoded.target {
            Value::Record(target) => {
                debug!("running deferred {} on {}", decoded.method, target);
                dispatch(self.store.as_ref(), target, &decoded.method, &decoded.args)?;
                Ok(true)
            }
            other if !other.is_truthy() => {
                warn!("deferred {} has no target; skipping", decoded.method);
                Ok(false)
            }
            other => Err(FormulaError::FormulaFailed(format!(
                "cannot run {} on {}",
                decoded.method, other
            ))),
        }
    }

    /// Resolve one formula input; names that resolve to nothing are null
    pub fn get_input_value(
        &self,
        caller: Option<&dyn Record>,
        name: &str,
        values: &dyn ValueBag,
    ) -> FormulaResult<Value> {
        trace!("resolving input {}", name);

        let segments = split_path(name);
        if segments.len() > 1 {
            let head = segments[0];
            let root = self.get_input_value(caller, head, values)?;
            return self.get_object_value(&root, &name[head.len() + 1..]);
        }

        if let (Some(caller), Some(mut segment)) = (caller, parse_segment(name)) {
            if let Some(attribute) = own_attribute(caller, &segment.name) {
                segment.name = attribute;
                return access(caller, &segment);
            }
        }

        if let Some(value) = values.lookup(name)? {
            return Ok(value);
        }

        if let Some(caller) = caller {
            if let Some(extension) = self.extensions.get(&caller.reference().model) {
                if let Some(value) = extension.input(caller, name)? {
                    return Ok(value);
                }
            }
        }

        trace!("input {} resolved to nothing", name);
        Ok(Value::Null)
    }

    /// Walk a dotted path from `obj`
    pub fn get_object_value(&self, obj: &Value, path: &str) -> FormulaResult<Value> {
        self.resolver.resolve(obj, path)
    }
}

/// Name under which `caller` exposes `name`: exact first, then lowercased
fn own_attribute(caller: &dyn Record, name: &str) -> Option<String> {
    if caller.attribute(name) != Attribute::Missing {
        return Some(name.to_string());
    }
    let lowered = name.to_lowercase();
    (lowered != name && caller.attribute(&lowered) != Attribute::Missing).then(|| lowered)
}
