//! Explicit registry of named audit functions.
//!
//! Entries are grouped by category and kept in registration order. A
//! [`RegistryBuilder`] collects them once at startup; the resulting
//! [`Registry`] is read-only. Two entries may share a name: both are kept and
//! both are returned by lookups.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::rules::RuleError;
use crate::scoring::PenaltyConfig;
use crate::table::{Table, TableSource};

#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("table {0} is not loaded")]
    MissingTable(String),
    #[error("parameter `{name}` expects {expected}, got {found}")]
    InvalidParameter {
        name: String,
        expected: &'static str,
        found: String,
    },
    #[error("unknown parameter `{0}`")]
    UnknownParameter(String),
    #[error(transparent)]
    Rule(#[from] RuleError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterKind {
    Boolean,
    Integer,
    Number,
    Text,
}

impl ParameterKind {
    fn label(self) -> &'static str {
        match self {
            ParameterKind::Boolean => "a boolean",
            ParameterKind::Integer => "an integer",
            ParameterKind::Number => "a number",
            ParameterKind::Text => "a string",
        }
    }

    fn accepts(self, value: &serde_json::Value) -> bool {
        match self {
            ParameterKind::Boolean => value.is_boolean(),
            ParameterKind::Integer => value.is_i64() || value.is_u64(),
            ParameterKind::Number => value.is_number(),
            ParameterKind::Text => value.is_string(),
        }
    }
}

/// Declared parameter of a registered function.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterSpec {
    pub name: String,
    pub kind: ParameterKind,
    pub default: serde_json::Value,
    pub description: String,
}

impl ParameterSpec {
    pub fn new(
        name: impl Into<String>,
        kind: ParameterKind,
        default: impl Into<serde_json::Value>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            default: default.into(),
            description: description.into(),
        }
    }
}

/// Resolved parameter values handed to a registered function.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Parameters(BTreeMap<String, serde_json::Value>);

impl Parameters {
    /// Declared defaults overridden by `overrides`.
    ///
    /// Overrides must name a declared parameter and carry a value of its kind.
    pub fn resolve(
        specs: &[ParameterSpec],
        overrides: Option<&BTreeMap<String, serde_json::Value>>,
    ) -> Result<Self, AuditError> {
        let mut values: BTreeMap<String, serde_json::Value> = specs
            .iter()
            .map(|s| (s.name.clone(), s.default.clone()))
            .collect();

        for (name, value) in overrides.into_iter().flatten() {
            let spec = specs
                .iter()
                .find(|s| &s.name == name)
                .ok_or_else(|| AuditError::UnknownParameter(name.clone()))?;
            if !spec.kind.accepts(value) {
                return Err(AuditError::InvalidParameter {
                    name: name.clone(),
                    expected: spec.kind.label(),
                    found: value.to_string(),
                });
            }
            values.insert(name.clone(), value.clone());
        }
        Ok(Self(values))
    }

    fn typed<T>(
        &self,
        name: &str,
        kind: ParameterKind,
        get: impl Fn(&serde_json::Value) -> Option<T>,
    ) -> Result<T, AuditError> {
        let value = self
            .0
            .get(name)
            .ok_or_else(|| AuditError::UnknownParameter(name.to_string()))?;
        get(value).ok_or_else(|| AuditError::InvalidParameter {
            name: name.to_string(),
            expected: kind.label(),
            found: value.to_string(),
        })
    }

    pub fn bool(&self, name: &str) -> Result<bool, AuditError> {
        self.typed(name, ParameterKind::Boolean, serde_json::Value::as_bool)
    }

    pub fn f64(&self, name: &str) -> Result<f64, AuditError> {
        self.typed(name, ParameterKind::Number, serde_json::Value::as_f64)
    }

    pub fn i64(&self, name: &str) -> Result<i64, AuditError> {
        self.typed(name, ParameterKind::Integer, serde_json::Value::as_i64)
    }
}

/// What a registered function sees of the current run.
#[derive(Clone, Copy)]
pub struct AuditContext<'a> {
    pub tables: &'a dyn TableSource,
    pub file: &'a str,
    pub params: &'a Parameters,
    pub scoring: &'a PenaltyConfig,
}

impl<'a> AuditContext<'a> {
    /// The table being audited.
    pub fn table(&self) -> Result<&'a Table, AuditError> {
        self.tables
            .table(self.file)
            .ok_or_else(|| AuditError::MissingTable(self.file.to_string()))
    }
}

pub type AuditFn<T> = Arc<dyn Fn(&AuditContext<'_>) -> Result<T, AuditError> + Send + Sync>;

pub struct RegistryEntry<T> {
    pub category: String,
    pub name: String,
    pub description: String,
    pub parameters: Vec<ParameterSpec>,
    pub function: AuditFn<T>,
}

impl<T> RegistryEntry<T> {
    pub fn call(&self, ctx: &AuditContext<'_>) -> Result<T, AuditError> {
        (self.function)(ctx)
    }

    pub fn info(&self) -> EntryInfo<'_> {
        EntryInfo {
            category: &self.category,
            name: &self.name,
            description: &self.description,
            parameters: &self.parameters,
        }
    }
}

impl<T> fmt::Debug for RegistryEntry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryEntry")
            .field("category", &self.category)
            .field("name", &self.name)
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}

/// Serializable view of an entry, without its function.
#[derive(Debug, Serialize)]
pub struct EntryInfo<'a> {
    pub category: &'a str,
    pub name: &'a str,
    pub description: &'a str,
    pub parameters: &'a [ParameterSpec],
}

pub struct Registry<T> {
    categories: Vec<(String, Vec<RegistryEntry<T>>)>,
}

impl<T> Registry<T> {
    pub fn builder() -> RegistryBuilder<T> {
        RegistryBuilder {
            registry: Registry {
                categories: Vec::new(),
            },
        }
    }

    /// Entries of `category` in registration order; empty if unknown.
    pub fn get(&self, category: &str) -> &[RegistryEntry<T>] {
        self.categories
            .iter()
            .find(|(c, _)| c == category)
            .map(|(_, entries)| entries.as_slice())
            .unwrap_or(&[])
    }

    /// Category names in the order they were first registered.
    pub fn categories(&self) -> Vec<&str> {
        self.categories.iter().map(|(c, _)| c.as_str()).collect()
    }

    /// Every entry of `category` named `name`.
    pub fn find(&self, category: &str, name: &str) -> Vec<&RegistryEntry<T>> {
        self.get(category).iter().filter(|e| e.name == name).collect()
    }

    pub fn entries(&self) -> impl Iterator<Item = &RegistryEntry<T>> {
        self.categories.iter().flat_map(|(_, entries)| entries)
    }

    pub fn len(&self) -> usize {
        self.categories.iter().map(|(_, e)| e.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> fmt::Debug for Registry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.entries()).finish()
    }
}

/// Collects entries before the registry is frozen.
pub struct RegistryBuilder<T> {
    registry: Registry<T>,
}

impl<T> RegistryBuilder<T> {
    pub fn register<F>(
        &mut self,
        category: &str,
        name: &str,
        description: &str,
        parameters: Vec<ParameterSpec>,
        function: F,
    ) -> &mut Self
    where
        F: Fn(&AuditContext<'_>) -> Result<T, AuditError> + Send + Sync + 'static,
    {
        let entry = RegistryEntry {
            category: category.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            parameters,
            function: Arc::new(function),
        };
        match self
            .registry
            .categories
            .iter_mut()
            .find(|(c, _)| c == category)
        {
            Some((_, entries)) => entries.push(entry),
            None => self
                .registry
                .categories
                .push((category.to_string(), vec![entry])),
        }
        self
    }

    pub fn build(self) -> Registry<T> {
        self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::TableStore;
    use serde_json::json;

    fn sample() -> Registry<String> {
        let mut builder = Registry::builder();
        builder
            .register("stops.txt", "required_fields", "first", vec![], |_| {
                Ok("a".to_string())
            })
            .register("agency.txt", "data_format", "formats", vec![], |_| {
                Ok("b".to_string())
            })
            .register("stops.txt", "required_fields", "second", vec![], |_| {
                Ok("c".to_string())
            });
        builder.build()
    }

    #[test]
    fn test_categories_keep_insertion_order() {
        let registry = sample();
        assert_eq!(registry.categories(), vec!["stops.txt", "agency.txt"]);
        assert_eq!(registry.len(), 3);
        assert!(registry.get("routes.txt").is_empty());
    }

    #[test]
    fn test_duplicate_names_are_all_kept() {
        let registry = sample();
        let found = registry.find("stops.txt", "required_fields");
        let descriptions: Vec<&str> = found.iter().map(|e| e.description.as_str()).collect();
        assert_eq!(descriptions, vec!["first", "second"]);
    }

    #[test]
    fn test_entries_are_callable() {
        let registry = sample();
        let store = TableStore::new();
        let params = Parameters::default();
        let scoring = PenaltyConfig::default();
        let ctx = AuditContext {
            tables: &store,
            file: "stops.txt",
            params: &params,
            scoring: &scoring,
        };
        let out: Vec<String> = registry
            .get("stops.txt")
            .iter()
            .map(|e| e.call(&ctx).unwrap())
            .collect();
        assert_eq!(out, vec!["a", "c"]);
        assert!(matches!(ctx.table(), Err(AuditError::MissingTable(_))));
    }

    #[test]
    fn test_parameters_resolve_defaults_and_overrides() {
        let specs = vec![
            ParameterSpec::new("require_stations", ParameterKind::Boolean, true, ""),
            ParameterSpec::new("max_dwell_minutes", ParameterKind::Number, 60, ""),
        ];
        let params = Parameters::resolve(&specs, None).unwrap();
        assert!(params.bool("require_stations").unwrap());
        assert_eq!(params.f64("max_dwell_minutes").unwrap(), 60.0);

        let overrides = BTreeMap::from([("require_stations".to_string(), json!(false))]);
        let params = Parameters::resolve(&specs, Some(&overrides)).unwrap();
        assert!(!params.bool("require_stations").unwrap());
    }

    #[test]
    fn test_parameters_reject_bad_overrides() {
        let specs = vec![ParameterSpec::new("require_stations", ParameterKind::Boolean, true, "")];

        let wrong_type = BTreeMap::from([("require_stations".to_string(), json!("yes"))]);
        let err = Parameters::resolve(&specs, Some(&wrong_type)).unwrap_err();
        assert!(matches!(err, AuditError::InvalidParameter { .. }));

        let unknown = BTreeMap::from([("nope".to_string(), json!(1))]);
        let err = Parameters::resolve(&specs, Some(&unknown)).unwrap_err();
        assert!(matches!(err, AuditError::UnknownParameter(_)));
    }

    #[test]
    fn test_entry_info_serializes() {
        let registry = sample();
        let json = serde_json::to_value(registry.get("agency.txt")[0].info()).unwrap();
        assert_eq!(json["name"], "data_format");
        assert_eq!(json["parameters"], json!([]));
    }
}
