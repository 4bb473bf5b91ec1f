//! Resolved clip params as seen by clip factories.

use std::any::Any;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use cuelist_common::error::{CuelistError, CuelistResult};

use crate::model::VariableDef;
use crate::registry::Resource;

/// Params handed to a clip factory.
///
/// Values are plain JSON after variable substitution and set evaluation.
/// String values that named a registered resource are also available as
/// that resource through [`ClipParams::resource`].
#[derive(Debug, Clone, Default)]
pub struct ClipParams {
    values: Map<String, Value>,
    resources: BTreeMap<String, Resource>,
}

impl From<Map<String, Value>> for ClipParams {
    fn from(values: Map<String, Value>) -> Self {
        Self {
            values,
            resources: BTreeMap::new(),
        }
    }
}

impl ClipParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn insert_resource(&mut self, key: impl Into<String>, resource: Resource) -> &mut Self {
        self.resources.insert(key.into(), resource);
        self
    }

    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    fn required(&self, key: &str) -> CuelistResult<&Value> {
        self.get(key)
            .ok_or_else(|| CuelistError::invalid_params(format!("missing param {key:?}")))
    }

    fn wrong_type(key: &str, expected: &str, value: &Value) -> CuelistError {
        CuelistError::invalid_params(format!("param {key:?} must be {expected}, got {value}"))
    }

    pub fn f64(&self, key: &str) -> CuelistResult<f64> {
        let value = self.required(key)?;
        value.as_f64().ok_or_else(|| Self::wrong_type(key, "a number", value))
    }

    /// Like [`f64`](Self::f64), with a default for a missing or null value.
    pub fn f64_or(&self, key: &str, default: f64) -> CuelistResult<f64> {
        match self.get(key) {
            None | Some(Value::Null) => Ok(default),
            Some(value) => value.as_f64().ok_or_else(|| Self::wrong_type(key, "a number", value)),
        }
    }

    pub fn str(&self, key: &str) -> CuelistResult<&str> {
        let value = self.required(key)?;
        value.as_str().ok_or_else(|| Self::wrong_type(key, "a string", value))
    }

    pub fn bool_or(&self, key: &str, default: bool) -> CuelistResult<bool> {
        match self.get(key) {
            None | Some(Value::Null) => Ok(default),
            Some(value) => value.as_bool().ok_or_else(|| Self::wrong_type(key, "a boolean", value)),
        }
    }

    /// Clip duration: missing or null means unbounded.
    pub fn duration(&self, key: &str) -> CuelistResult<Option<f64>> {
        match self.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => value
                .as_f64()
                .map(Some)
                .ok_or_else(|| Self::wrong_type(key, "a number or null", value)),
        }
    }

    /// Decode a param into any serde type.
    pub fn deserialize<T: DeserializeOwned>(&self, key: &str) -> CuelistResult<T> {
        let value = self.required(key)?;
        serde_json::from_value(value.clone())
            .map_err(|e| CuelistError::invalid_params(format!("param {key:?}: {e}")))
    }

    /// The registered resource this param named.
    pub fn resource<T>(&self, key: &str) -> CuelistResult<Arc<T>>
    where
        T: Any + Send + Sync,
    {
        let resource = self.resources.get(key).ok_or_else(|| match self.get(key) {
            Some(Value::String(name)) => CuelistError::missing_resource(name.as_str()),
            _ => CuelistError::invalid_params(format!("param {key:?} does not name a resource")),
        })?;
        resource.clone().downcast::<T>().map_err(|_| {
            CuelistError::invalid_params(format!("param {key:?} names a resource of another type"))
        })
    }

    /// An evaluated set param. Null (an empty operation list) is the empty set.
    pub fn set(&self, key: &str) -> CuelistResult<BTreeSet<String>> {
        match self.get(key) {
            None => Err(CuelistError::invalid_params(format!("missing param {key:?}"))),
            Some(Value::Null) => Ok(BTreeSet::new()),
            Some(value) => self.deserialize(key).map_err(|_| {
                Self::wrong_type(key, "a set of names", value)
            }),
        }
    }
}

/// Substitute `{"$var": name}` references at the top level and inside
/// arrays. Unknown names are left in place with a warning.
pub fn resolve_variables(
    params: Map<String, Value>,
    variables: &BTreeMap<String, VariableDef>,
) -> Map<String, Value> {
    if variables.is_empty() {
        return params;
    }
    params
        .into_iter()
        .map(|(key, value)| (key, resolve_value(value, variables)))
        .collect()
}

fn resolve_value(value: Value, variables: &BTreeMap<String, VariableDef>) -> Value {
    match value {
        Value::Object(ref object) => {
            let Some(name) = object.get("$var") else {
                return value;
            };
            let found = name.as_str().and_then(|n| variables.get(n));
            match found {
                Some(def) => def.value.clone(),
                None => {
                    tracing::warn!(variable = %name, "Unknown variable reference, passing through");
                    value
                }
            }
        }
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| resolve_value(item, variables))
                .collect(),
        ),
        other => other,
    }
}
