//! Module namespace objects.
//!
//! A namespace is a proxy whose private slot holds its module. Its export
//! names and the binding of each live in the module record, so every read
//! goes through to the exporting environment. The object has no prototype,
//! is never extensible, and all of its bindings are read-only from outside.

use tracing::debug;

use crate::context::Context;
use crate::error::{FailureCode, JsError, ObjectOpResult};
use crate::prelude::*;
use crate::value::{
    CheapClone, JsObjectRef, JsString, JsValue, MagicValue, Property, PropertyDescriptor,
    PropertyKey,
};
use crate::proxy::{
    Family, PrototypeIfOrdinary, ProxyClass, ProxyHandler, ProxyOptions, handler_of,
    new_proxy_object,
};

use super::bindings::IndirectBinding;
use super::record::ModuleObject;

static NAMESPACE_CLASS: ProxyClass = ProxyClass::new::<1>("ModuleNamespace");

static NAMESPACE_FAMILY_TAG: u8 = 0;

/// Family of module namespace proxies
pub const NAMESPACE_FAMILY: Family = Family::new(&NAMESPACE_FAMILY_TAG);

/// Handler of every module namespace object
pub struct ModuleNamespace;

pub static MODULE_NAMESPACE_HANDLER: ModuleNamespace = ModuleNamespace;

/// Create the namespace of `module` over `exports`, sorted and deduplicated
pub(super) fn create(
    cx: &mut Context,
    module: &ModuleObject,
    mut exports: Vec<JsString>,
) -> Result<JsObjectRef, JsError> {
    if module.namespace()?.is_some() {
        return Err(JsError::internal_error("module namespace already created"));
    }
    exports.sort();
    exports.dedup();

    let options = ProxyOptions::new()
        .with_class(&NAMESPACE_CLASS)
        .with_lazy_proto(true)
        .with_singleton(true);
    let ns = new_proxy_object(
        cx,
        &MODULE_NAMESPACE_HANDLER,
        JsValue::Object(module.as_object().cheap_clone()),
        None,
        &options,
    )?;

    let count = exports.len();
    {
        let mut data = module.as_object().borrow_mut();
        let record = data
            .as_module_mut()
            .ok_or_else(|| JsError::internal_error("object is no longer a module"))?;
        record.namespace.set(JsValue::Object(ns.cheap_clone()));
        record.namespace_exports = Rc::from(exports);
    }
    debug!(module = module.as_object().id(), exports = count, "module namespace created");
    Ok(ns)
}

impl ModuleNamespace {
    pub fn is_namespace(obj: &JsObjectRef) -> bool {
        handler_of(obj).is_some_and(|handler| handler.family() == Some(NAMESPACE_FAMILY))
    }

    /// The module a namespace belongs to
    pub fn module(ns: &JsObjectRef) -> Option<ModuleObject> {
        if !Self::is_namespace(ns) {
            return None;
        }
        let private = ns.borrow().as_proxy().and_then(|data| data.target().cloned())?;
        ModuleObject::from_object(&private)
    }

    /// Export names in sorted order
    pub fn exports(ns: &JsObjectRef) -> Vec<JsString> {
        Self::module(ns)
            .and_then(|module| {
                let data = module.as_object().borrow();
                data.as_module()
                    .map(|record| record.namespace_exports.to_vec())
            })
            .unwrap_or_default()
    }

    /// Bind `exported_name` to `local_name` in the initial environment of
    /// `target`, which may be another module that re-exports through this
    /// namespace. `exported_name` must be one of the namespace's exports.
    pub fn add_binding(
        ns: &JsObjectRef,
        exported_name: JsString,
        target: &ModuleObject,
        local_name: &str,
    ) -> Result<(), JsError> {
        let module = Self::module(ns)
            .ok_or_else(|| JsError::type_error("not a module namespace object"))?;
        let env = target.initial_environment()?.ok_or_else(|| {
            JsError::internal_error("target module has no initial environment")
        })?;
        let binding = IndirectBinding::resolve(&env, local_name)?;

        let mut data = module.as_object().borrow_mut();
        let record = data
            .as_module_mut()
            .ok_or_else(|| JsError::internal_error("object is no longer a module"))?;
        if !record
            .namespace_exports
            .iter()
            .any(|name| name.as_str() == exported_name.as_str())
        {
            return Err(JsError::internal_error(format!(
                "'{}' is not an export of this namespace",
                exported_name
            )));
        }
        record.namespace_bindings.insert_new(exported_name, binding)
    }
}

fn namespace_module(ns: &JsObjectRef) -> Result<ModuleObject, JsError> {
    ModuleNamespace::module(ns).ok_or_else(|| JsError::internal_error("namespace lost its module"))
}

fn lookup_binding(ns: &JsObjectRef, name: &str) -> Result<Option<IndirectBinding>, JsError> {
    let module = namespace_module(ns)?;
    let data = module.as_object().borrow();
    Ok(data
        .as_module()
        .and_then(|record| record.namespace_bindings.lookup(name).cloned()))
}

/// Value of an export, or `None` if there is no such export
fn binding_value(ns: &JsObjectRef, key: &PropertyKey) -> Result<Option<JsValue>, JsError> {
    let Some(name) = key.to_js_string() else {
        return Ok(None);
    };
    let Some(binding) = lookup_binding(ns, name.as_str())? else {
        return Ok(None);
    };
    let value = binding.value()?;
    if value.is_magic(MagicValue::UninitializedLexical) {
        return Err(JsError::uninitialized_lexical(name.as_str()));
    }
    Ok(Some(value))
}

fn is_tag(cx: &Context, key: &PropertyKey) -> bool {
    matches!(key, PropertyKey::Symbol(sym) if *sym == cx.symbols.to_string_tag)
}

/// ValidatePropertyDescriptor against the fixed attributes of an existing
/// namespace property
fn validate_descriptor(
    desc: &PropertyDescriptor,
    writable: bool,
    enumerable: bool,
    configurable: bool,
    value: &JsValue,
) -> ObjectOpResult {
    if desc.is_accessor_descriptor()
        || desc.writable.is_some_and(|w| w != writable)
        || desc.enumerable.is_some_and(|e| e != enumerable)
        || desc.configurable.is_some_and(|c| c != configurable)
        || desc.value.as_ref().is_some_and(|v| !v.same_value(value))
    {
        return ObjectOpResult::fail(FailureCode::CantRedefineProp);
    }
    ObjectOpResult::succeed()
}

impl ProxyHandler for ModuleNamespace {
    fn family(&self) -> Option<Family> {
        Some(NAMESPACE_FAMILY)
    }

    fn get_own_property_descriptor(
        &self,
        cx: &mut Context,
        proxy: &JsObjectRef,
        key: &PropertyKey,
    ) -> Result<Option<Property>, JsError> {
        if is_tag(cx, key) {
            let tag = JsValue::String(cx.atoms.module_tag.cheap_clone());
            return Ok(Some(Property::with_attributes(tag, false, false, false)));
        }
        if key.is_symbol() {
            return Ok(None);
        }
        Ok(binding_value(proxy, key)?
            .map(|value| Property::with_attributes(value, true, true, false)))
    }

    fn define_property(
        &self,
        cx: &mut Context,
        proxy: &JsObjectRef,
        key: &PropertyKey,
        desc: &PropertyDescriptor,
    ) -> Result<ObjectOpResult, JsError> {
        if is_tag(cx, key) {
            let tag = JsValue::String(cx.atoms.module_tag.cheap_clone());
            return Ok(validate_descriptor(desc, false, false, false, &tag));
        }
        if !key.is_symbol()
            && let Some(value) = binding_value(proxy, key)?
        {
            return Ok(validate_descriptor(desc, true, true, false, &value));
        }
        Ok(ObjectOpResult::fail(
            FailureCode::CantDefinePropObjectNotExtensible,
        ))
    }

    fn own_property_keys(
        &self,
        cx: &mut Context,
        proxy: &JsObjectRef,
    ) -> Result<Vec<PropertyKey>, JsError> {
        let exports = ModuleNamespace::exports(proxy);
        let mut keys: Vec<PropertyKey> = exports.into_iter().map(PropertyKey::from).collect();
        keys.push(cx.to_string_tag_key());
        Ok(keys)
    }

    fn delete(
        &self,
        cx: &mut Context,
        proxy: &JsObjectRef,
        key: &PropertyKey,
    ) -> Result<ObjectOpResult, JsError> {
        if is_tag(cx, key) {
            return Ok(ObjectOpResult::fail(FailureCode::CantDelete));
        }
        let exists = match key.to_js_string() {
            Some(name) if !key.is_symbol() => lookup_binding(proxy, name.as_str())?.is_some(),
            _ => false,
        };
        if exists {
            return Ok(ObjectOpResult::fail(FailureCode::CantDelete));
        }
        Ok(ObjectOpResult::succeed())
    }

    fn prevent_extensions(
        &self,
        _cx: &mut Context,
        _proxy: &JsObjectRef,
    ) -> Result<ObjectOpResult, JsError> {
        Ok(ObjectOpResult::succeed())
    }

    fn is_extensible(&self, _cx: &mut Context, _proxy: &JsObjectRef) -> Result<bool, JsError> {
        Ok(false)
    }

    fn get_prototype_if_ordinary(
        &self,
        _cx: &mut Context,
        _proxy: &JsObjectRef,
    ) -> Result<PrototypeIfOrdinary, JsError> {
        Ok(PrototypeIfOrdinary::NotOrdinary)
    }

    fn get_prototype(
        &self,
        _cx: &mut Context,
        _proxy: &JsObjectRef,
    ) -> Result<Option<JsObjectRef>, JsError> {
        Ok(None)
    }

    fn set_prototype(
        &self,
        _cx: &mut Context,
        _proxy: &JsObjectRef,
        proto: Option<JsObjectRef>,
    ) -> Result<ObjectOpResult, JsError> {
        match proto {
            None => Ok(ObjectOpResult::succeed()),
            Some(_) => Ok(ObjectOpResult::fail(FailureCode::CantSetProto)),
        }
    }

    fn set_immutable_prototype(
        &self,
        _cx: &mut Context,
        _proxy: &JsObjectRef,
    ) -> Result<bool, JsError> {
        Ok(true)
    }

    fn has(&self, cx: &mut Context, proxy: &JsObjectRef, key: &PropertyKey) -> Result<bool, JsError> {
        if is_tag(cx, key) {
            return Ok(true);
        }
        match key.to_js_string() {
            Some(name) if !key.is_symbol() => Ok(lookup_binding(proxy, name.as_str())?.is_some()),
            _ => Ok(false),
        }
    }

    fn get(
        &self,
        cx: &mut Context,
        proxy: &JsObjectRef,
        _receiver: &JsValue,
        key: &PropertyKey,
    ) -> Result<JsValue, JsError> {
        if is_tag(cx, key) {
            return Ok(JsValue::String(cx.atoms.module_tag.cheap_clone()));
        }
        if key.is_symbol() {
            return Ok(JsValue::Undefined);
        }
        Ok(binding_value(proxy, key)?.unwrap_or_default())
    }

    fn set(
        &self,
        _cx: &mut Context,
        _proxy: &JsObjectRef,
        _key: &PropertyKey,
        _value: JsValue,
        _receiver: &JsValue,
    ) -> Result<ObjectOpResult, JsError> {
        Ok(ObjectOpResult::fail(FailureCode::ReadOnly))
    }

    fn class_name(&self, _cx: &mut Context, _proxy: &JsObjectRef) -> Result<&'static str, JsError> {
        Ok("Module")
    }
}
