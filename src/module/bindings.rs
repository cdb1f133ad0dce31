//! Indirect binding map: exported or imported name to a live storage
//! location in some module environment.
//!
//! Entries point at `(environment, slot)` pairs rather than values, so a
//! later assignment in the exporting module is visible through the map.
//! Environment slots never move, which keeps every entry valid for as long
//! as the environment is alive, and the map keeps it alive.

use crate::error::JsError;
use crate::gc::GcPtr;
use crate::prelude::*;
use crate::value::{CheapClone, JsObject, JsObjectRef, JsString, JsValue};

/// A storage location in a module environment
#[derive(Debug, Clone)]
pub struct IndirectBinding {
    pub environment: JsObjectRef,
    pub slot: usize,
}

impl IndirectBinding {
    /// Resolve `name` in `environment` to its slot
    pub fn resolve(environment: &JsObjectRef, name: &str) -> Result<Self, JsError> {
        let slot = {
            let data = environment.borrow();
            let env = data
                .as_environment()
                .ok_or_else(|| JsError::internal_error("binding target is not an environment"))?;
            env.lookup(name).map(|info| info.slot)
        };
        let slot = slot.ok_or_else(|| JsError::reference_error(name))?;
        Ok(Self {
            environment: environment.cheap_clone(),
            slot,
        })
    }

    /// Current value of the location, which may be the uninitialized
    /// lexical sentinel
    pub fn value(&self) -> Result<JsValue, JsError> {
        let data = self.environment.borrow();
        data.as_environment()
            .and_then(|env| env.slot(self.slot))
            .cloned()
            .ok_or_else(|| JsError::internal_error("stale module binding"))
    }
}

/// Name-keyed table of [`IndirectBinding`]s.
///
/// Owned by a module record; populated while the module is instantiated
/// and read-only afterwards.
#[derive(Debug, Default)]
pub struct IndirectBindingMap {
    map: FxHashMap<JsString, IndirectBinding>,
}

impl IndirectBindingMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name` to `local_name` in `environment`. Each name is bound
    /// once.
    pub fn put_new(
        &mut self,
        name: JsString,
        environment: &JsObjectRef,
        local_name: &str,
    ) -> Result<(), JsError> {
        let binding = IndirectBinding::resolve(environment, local_name)?;
        self.insert_new(name, binding)
    }

    /// Add a binding that was already resolved, e.g. one copied from
    /// another module's import table
    pub fn insert_new(&mut self, name: JsString, binding: IndirectBinding) -> Result<(), JsError> {
        if self.map.contains_key(&name) {
            return Err(JsError::internal_error(format!(
                "duplicate module binding '{}'",
                name
            )));
        }
        // The owning record may already be marked.
        binding.environment.write_barrier();
        self.map.insert(name, binding);
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<&IndirectBinding> {
        self.map.get(name)
    }

    pub fn has(&self, name: &str) -> bool {
        self.map.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &JsString> {
        self.map.keys()
    }

    pub fn trace(&self, visitor: &mut dyn FnMut(GcPtr<JsObject>)) {
        for binding in self.map.values() {
            visitor(binding.environment.copy_ref());
        }
    }
}
