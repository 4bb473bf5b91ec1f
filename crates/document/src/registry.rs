//! Named clip factories and the lookups documents refer to by name.

use std::any::Any;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde_json::Value;

use cuelist_common::error::{CuelistError, CuelistResult};
use cuelist_core::{ComposeFn, ScaleFn, SharedClip};

use crate::params::ClipParams;

/// Builds a clip from resolved params.
pub type ClipFactory<C, K, D> =
    Arc<dyn Fn(&ClipParams) -> CuelistResult<SharedClip<C, K, D>> + Send + Sync>;

/// A non-serializable object (scene, fixture group, ...) referenced by name.
pub type Resource = Arc<dyn Any + Send + Sync>;

/// Named member sets for one `items_key`.
pub type NamedSets = BTreeMap<String, BTreeSet<String>>;

struct Registered<C, K, D> {
    factory: ClipFactory<C, K, D>,
    schema: Option<Value>,
}

/// Everything a document can name: clip types, resources, compose
/// functions and member sets, plus the delta scaling used for fades.
pub struct ClipRegistry<C, K, D> {
    factories: BTreeMap<String, Registered<C, K, D>>,
    resources: BTreeMap<String, Resource>,
    compose_fns: BTreeMap<String, ComposeFn<D>>,
    sets: BTreeMap<String, NamedSets>,
    scale_fn: Option<ScaleFn<K, D>>,
}

impl<C, K, D> Default for ClipRegistry<C, K, D> {
    fn default() -> Self {
        Self {
            factories: BTreeMap::new(),
            resources: BTreeMap::new(),
            compose_fns: BTreeMap::new(),
            sets: BTreeMap::new(),
            scale_fn: None,
        }
    }
}

impl<C, K, D> ClipRegistry<C, K, D> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a clip factory. `schema` describes its params for editors;
    /// a `"params"` entry with `{"type": "set", "items_key": ...}` marks
    /// set-valued params.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F, schema: Option<Value>) -> &mut Self
    where
        F: Fn(&ClipParams) -> CuelistResult<SharedClip<C, K, D>> + Send + Sync + 'static,
    {
        let name = name.into();
        if self.factories.contains_key(&name) {
            tracing::debug!(name = %name, "Replacing clip factory");
        }
        self.factories.insert(
            name,
            Registered {
                factory: Arc::new(factory),
                schema,
            },
        );
        self
    }

    /// Instantiate a registered clip type.
    pub fn create(&self, name: &str, params: &ClipParams) -> CuelistResult<SharedClip<C, K, D>> {
        let registered = self
            .factories
            .get(name)
            .ok_or_else(|| CuelistError::unknown_clip_type(name))?;
        (registered.factory)(params)
    }

    pub fn get_schema(&self, name: &str) -> Option<&Value> {
        self.factories.get(name).and_then(|r| r.schema.as_ref())
    }

    /// Registered clip types with their schemas, sorted by name.
    pub fn list_factories(&self) -> Vec<(&str, Option<&Value>)> {
        self.factories
            .iter()
            .map(|(name, r)| (name.as_str(), r.schema.as_ref()))
            .collect()
    }

    pub fn register_resource<T>(&mut self, name: impl Into<String>, resource: Arc<T>) -> &mut Self
    where
        T: Any + Send + Sync,
    {
        self.resources.insert(name.into(), resource);
        self
    }

    pub fn get_resource(&self, name: &str) -> CuelistResult<&Resource> {
        self.resources
            .get(name)
            .ok_or_else(|| CuelistError::missing_resource(name))
    }

    /// Typed resource lookup.
    pub fn resource<T>(&self, name: &str) -> CuelistResult<Arc<T>>
    where
        T: Any + Send + Sync,
    {
        self.get_resource(name)?.clone().downcast::<T>().map_err(|_| {
            CuelistError::invalid_params(format!("resource {name:?} has a different type"))
        })
    }

    /// Reverse lookup by identity.
    pub fn find_resource_name(&self, resource: &Resource) -> Option<&str> {
        self.resources
            .iter()
            .find(|(_, r)| Arc::ptr_eq(r, resource))
            .map(|(name, _)| name.as_str())
    }

    pub fn list_resources(&self) -> Vec<&str> {
        self.resources.keys().map(String::as_str).collect()
    }

    pub fn register_compose(&mut self, name: impl Into<String>, compose_fn: ComposeFn<D>) -> &mut Self {
        self.compose_fns.insert(name.into(), compose_fn);
        self
    }

    pub fn get_compose(&self, name: &str) -> CuelistResult<ComposeFn<D>> {
        self.compose_fns
            .get(name)
            .cloned()
            .ok_or_else(|| CuelistError::missing_compose(name))
    }

    /// Reverse lookup by identity, used when writing a timeline back out.
    pub fn find_compose_name(&self, compose_fn: &ComposeFn<D>) -> Option<&str> {
        self.compose_fns
            .iter()
            .find(|(_, f)| Arc::ptr_eq(f, compose_fn))
            .map(|(name, _)| name.as_str())
    }

    /// Register the named member sets that set params with this
    /// `items_key` are evaluated against.
    pub fn register_set(&mut self, items_key: impl Into<String>, sets: NamedSets) -> &mut Self {
        self.sets.insert(items_key.into(), sets);
        self
    }

    pub fn get_set(&self, items_key: &str) -> CuelistResult<&NamedSets> {
        self.sets.get(items_key).ok_or_else(|| {
            CuelistError::invalid_params(format!("no sets registered for {items_key:?}"))
        })
    }

    /// Delta scaling applied by fades and amounts on nested timelines.
    pub fn register_scale(&mut self, scale_fn: ScaleFn<K, D>) -> &mut Self {
        self.scale_fn = Some(scale_fn);
        self
    }

    pub fn scale_fn(&self) -> Option<ScaleFn<K, D>> {
        self.scale_fn.clone()
    }
}
