//! Precedence table for strategy resolution.
//!
//! Resolvers look up an implementation for a consuming type in three tiers:
//! a binding registered for that exact type, then a process-wide default,
//! then whatever the configuration implies. This module owns the first two
//! tiers; the third is supplied by [`Strategy::from_properties`].

use crate::properties::Properties;
use std::any::TypeId;
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::RwLock;

/// A selectable implementation, typically a fieldless enum.
pub trait Strategy: Copy + Eq + Hash + Debug + Send + Sync + 'static {
    /// The implementation implied by configuration alone.
    fn from_properties(properties: &Properties) -> Self;
}

#[derive(Debug)]
struct Bindings<S> {
    specific: HashMap<TypeId, S>,
    default: Option<S>,
}

/// Specific and default strategy bindings, safe to share between threads.
#[derive(Debug)]
pub struct StrategyBindings<S> {
    inner: RwLock<Bindings<S>>,
}

impl<S> Default for StrategyBindings<S> {
    fn default() -> Self {
        Self {
            inner: RwLock::new(Bindings {
                specific: HashMap::new(),
                default: None,
            }),
        }
    }
}

impl<S: Strategy> StrategyBindings<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `strategy` to the consuming type `T`.
    pub fn set_strategy<T: 'static>(&self, strategy: S) {
        self.set_strategy_for(TypeId::of::<T>(), strategy);
    }

    /// Binds `strategy` to the given type id.
    pub fn set_strategy_for(&self, type_id: TypeId, strategy: S) {
        self.inner.write().unwrap().specific.insert(type_id, strategy);
    }

    /// Sets or clears the process-wide default.
    pub fn set_default_strategy(&self, strategy: Option<S>) {
        self.inner.write().unwrap().default = strategy;
    }

    /// Drops all specific bindings and the default.
    pub fn default_settings(&self) {
        let mut inner = self.inner.write().unwrap();
        inner.specific.clear();
        inner.default = None;
    }

    /// The explicitly bound strategy for `type_id`, if any tier applies.
    pub fn lookup(&self, type_id: TypeId) -> Option<S> {
        let inner = self.inner.read().unwrap();
        inner.specific.get(&type_id).copied().or(inner.default)
    }

    /// Full resolution including the configuration-derived tier.
    pub fn resolve(&self, type_id: TypeId, properties: &Properties) -> S {
        self.lookup(type_id)
            .unwrap_or_else(|| S::from_properties(properties))
    }
}
