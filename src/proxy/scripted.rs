//! Script-visible `Proxy` objects.
//!
//! The target lives in the private slot and the handler object in reserved
//! slot 0. Each operation looks up the matching trap on the handler object;
//! a missing trap forwards to the target. Trap results are checked against
//! the target so a proxy cannot misreport non-configurable properties or
//! the extensibility of its target. Revoking clears both references.

use tracing::debug;

use crate::context::Context;
use crate::error::{FailureCode, JsError, ObjectOpResult};
use crate::gc::Gc;
use crate::object_ops::{self, is_compatible_property_descriptor};
use crate::prelude::*;
use crate::value::{
    BindingKind, CallArgs, CheapClone, JsObjectRef, JsString, JsValue, Property,
    PropertyDescriptor, PropertyKey,
};

use super::dispatch::Proxy;
use super::handler::{IsArrayAnswer, PrototypeIfOrdinary, ProxyHandler};
use super::object::{
    ProxyData, ProxyOptions, handler_of, is_proxy, new_proxy_object, set_proxy_private,
    set_proxy_reserved_slot,
};
use super::policy::{Action, assert_entered_policy};

const HANDLER_SLOT: usize = 0;
const CALLABILITY_SLOT: usize = 1;

const CALLABLE: u32 = 1;
const CONSTRUCTOR: u32 = 2;

/// Handler shared by every scripted proxy
pub struct ScriptedProxyHandler;

pub static SCRIPTED_PROXY_HANDLER: ScriptedProxyHandler = ScriptedProxyHandler;

/// `new Proxy(target, handler)`
pub fn new_scripted_proxy(
    cx: &mut Context,
    target: &JsObjectRef,
    handler: &JsObjectRef,
) -> Result<JsObjectRef, JsError> {
    let mut callability = 0;
    if object_ops::is_callable(target) {
        callability |= CALLABLE;
        if object_ops::is_constructor(target) {
            callability |= CONSTRUCTOR;
        }
    }

    let options = ProxyOptions::new().with_lazy_proto(true);
    let proxy = new_proxy_object(
        cx,
        &SCRIPTED_PROXY_HANDLER,
        JsValue::Object(target.clone()),
        None,
        &options,
    )?;
    set_proxy_reserved_slot(&proxy, HANDLER_SLOT, JsValue::Object(handler.clone()))?;
    set_proxy_reserved_slot(&proxy, CALLABILITY_SLOT, JsValue::Number(f64::from(callability)))?;
    Ok(proxy)
}

/// Sever a scripted proxy from its target and handler. Callability is kept,
/// so a revoked function proxy still reports `typeof` "function".
pub fn revoke(proxy: &JsObjectRef) -> Result<(), JsError> {
    if !is_scripted(proxy) {
        return Err(JsError::type_error("revoke called on a non-proxy object"));
    }
    set_proxy_private(proxy, JsValue::Null)?;
    set_proxy_reserved_slot(proxy, HANDLER_SLOT, JsValue::Null)?;
    debug!(proxy = proxy.id(), "proxy revoked");
    Ok(())
}

pub fn is_revoked(proxy: &JsObjectRef) -> bool {
    is_scripted(proxy) && scripted_target(proxy).is_none()
}

/// The target of a live scripted proxy
pub fn scripted_target(proxy: &JsObjectRef) -> Option<JsObjectRef> {
    let data = proxy.borrow();
    data.as_proxy()?.target().cloned()
}

/// The handler object of a live scripted proxy
pub fn scripted_handler(proxy: &JsObjectRef) -> Option<JsObjectRef> {
    let data = proxy.borrow();
    data.as_proxy()?.reserved_slot(HANDLER_SLOT)?.as_object().cloned()
}

fn is_scripted(obj: &JsObjectRef) -> bool {
    handler_of(obj).is_some_and(|h| h.is_scripted())
}

fn revoker(_cx: &mut Context, args: &CallArgs) -> Result<JsValue, JsError> {
    let env = args
        .callee
        .borrow()
        .as_function()
        .and_then(|f| f.environment.clone());
    let Some(env) = env else {
        return Ok(JsValue::Undefined);
    };
    let proxy = env
        .borrow()
        .as_environment()
        .and_then(|e| e.slot(0).cloned());
    if let Some(JsValue::Object(proxy)) = proxy {
        revoke(&proxy)?;
        if let Some(e) = env.borrow_mut().as_environment_mut() {
            e.set_slot(0, JsValue::Null);
        }
    }
    Ok(JsValue::Undefined)
}

/// `Proxy.revocable(target, handler)`: the proxy and its revoke function.
/// Calling the function more than once has no further effect.
pub fn proxy_revocable(
    cx: &mut Context,
    target: &JsObjectRef,
    handler: &JsObjectRef,
) -> Result<(JsObjectRef, JsObjectRef), JsError> {
    let proxy = new_scripted_proxy(cx, target, handler)?;
    let env = cx.create_environment(None);
    {
        let name = cx.intern("proxy");
        let mut data = env.borrow_mut();
        if let Some(e) = data.as_environment_mut() {
            let slot = e.declare(name, BindingKind::Var);
            e.set_slot(slot, JsValue::Object(proxy.clone()));
        }
    }
    let revoke_fn = cx.create_closure("", revoker, 0, &env);
    Ok((proxy, revoke_fn))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Helpers
// ═══════════════════════════════════════════════════════════════════════════════

fn parts(proxy: &JsObjectRef) -> Result<(JsObjectRef, JsObjectRef), JsError> {
    let data = proxy.borrow();
    let revoked = || JsError::type_error("illegal operation attempted on a revoked proxy");
    let proxy_data = data.as_proxy().ok_or_else(revoked)?;
    let target = proxy_data.target().map(Gc::maybe_forwarded).ok_or_else(revoked)?;
    let handler = proxy_data
        .reserved_slot(HANDLER_SLOT)
        .and_then(JsValue::as_object)
        .cloned()
        .ok_or_else(revoked)?;
    Ok((target, handler))
}

/// GetMethod(handler, name)
fn trap(cx: &mut Context, handler: &JsObjectRef, name: &JsString) -> Result<Option<JsObjectRef>, JsError> {
    let key = PropertyKey::String(name.cheap_clone());
    match object_ops::get(cx, handler, &key)? {
        JsValue::Undefined | JsValue::Null => Ok(None),
        JsValue::Object(f) if object_ops::is_callable(&f) => Ok(Some(f)),
        _ => Err(JsError::type_error(format!("proxy trap '{}' is not a function", name))),
    }
}

fn call_trap(
    cx: &mut Context,
    trap: &JsObjectRef,
    handler: &JsObjectRef,
    args: Vec<JsValue>,
) -> Result<JsValue, JsError> {
    object_ops::call_object(cx, trap, JsValue::Object(handler.clone()), args)
}

/// FromPropertyDescriptor
fn descriptor_to_object(cx: &mut Context, desc: &PropertyDescriptor) -> Result<JsObjectRef, JsError> {
    let obj = cx.create_object();
    let mut fields: Vec<(JsString, JsValue)> = Vec::new();
    if let Some(value) = &desc.value {
        fields.push((cx.atoms.value.cheap_clone(), value.clone()));
    }
    if let Some(writable) = desc.writable {
        fields.push((cx.atoms.writable.cheap_clone(), JsValue::Boolean(writable)));
    }
    if let Some(get) = &desc.get {
        fields.push((cx.atoms.get.cheap_clone(), JsValue::from(get.clone())));
    }
    if let Some(set) = &desc.set {
        fields.push((cx.atoms.set.cheap_clone(), JsValue::from(set.clone())));
    }
    if let Some(enumerable) = desc.enumerable {
        fields.push((cx.atoms.enumerable.cheap_clone(), JsValue::Boolean(enumerable)));
    }
    if let Some(configurable) = desc.configurable {
        fields.push((cx.atoms.configurable.cheap_clone(), JsValue::Boolean(configurable)));
    }
    for (name, value) in fields {
        object_ops::create_data_property(cx, &obj, &PropertyKey::String(name), value)?
            .check_strict(None)?;
    }
    Ok(obj)
}

/// ToPropertyDescriptor
fn object_to_descriptor(cx: &mut Context, value: &JsValue) -> Result<PropertyDescriptor, JsError> {
    let JsValue::Object(obj) = value else {
        return Err(JsError::type_error("property descriptor must be an object"));
    };

    let read = |cx: &mut Context, name: JsString| -> Result<Option<JsValue>, JsError> {
        let key = PropertyKey::String(name);
        if object_ops::has_property(cx, obj, &key)? {
            Ok(Some(object_ops::get(cx, obj, &key)?))
        } else {
            Ok(None)
        }
    };
    let accessor = |v: JsValue, what: &str| -> Result<Option<JsObjectRef>, JsError> {
        match v {
            JsValue::Undefined => Ok(None),
            JsValue::Object(f) if object_ops::is_callable(&f) => Ok(Some(f)),
            _ => Err(JsError::type_error(format!("property descriptor {} must be a function", what))),
        }
    };

    let atoms = &cx.atoms;
    let names = [
        atoms.enumerable.cheap_clone(),
        atoms.configurable.cheap_clone(),
        atoms.value.cheap_clone(),
        atoms.writable.cheap_clone(),
        atoms.get.cheap_clone(),
        atoms.set.cheap_clone(),
    ];
    let [enumerable, configurable, value, writable, get, set] = names;

    let mut desc = PropertyDescriptor {
        enumerable: read(cx, enumerable)?.map(|v| v.to_boolean()),
        configurable: read(cx, configurable)?.map(|v| v.to_boolean()),
        value: read(cx, value)?,
        writable: read(cx, writable)?.map(|v| v.to_boolean()),
        ..Default::default()
    };
    if let Some(get) = read(cx, get)? {
        desc.get = Some(accessor(get, "getter")?);
    }
    if let Some(set) = read(cx, set)? {
        desc.set = Some(accessor(set, "setter")?);
    }

    if desc.is_accessor_descriptor() && desc.is_data_descriptor() {
        return Err(JsError::type_error(
            "property descriptors must not specify a value or be writable when a getter or setter has been specified",
        ));
    }
    Ok(desc)
}

/// CreateListFromArrayLike restricted to property keys
fn keys_from_array_like(cx: &mut Context, value: &JsValue) -> Result<Vec<PropertyKey>, JsError> {
    let JsValue::Object(list) = value else {
        return Err(JsError::type_error("ownKeys trap result must be an object"));
    };
    let length_key = PropertyKey::String(cx.atoms.length.cheap_clone());
    let length = object_ops::get(cx, list, &length_key)?.to_number();
    let length = if length.is_finite() && length > 0.0 { length as u32 } else { 0 };

    let mut keys = Vec::with_capacity(length as usize);
    let mut seen = FxHashSet::default();
    for i in 0..length {
        let key = match object_ops::get(cx, list, &PropertyKey::Index(i))? {
            JsValue::String(s) => PropertyKey::from(s),
            JsValue::Symbol(sym) => PropertyKey::Symbol(sym),
            _ => {
                return Err(JsError::type_error(
                    "ownKeys trap result must contain only strings and symbols",
                ));
            }
        };
        if !seen.insert(key.clone()) {
            return Err(JsError::type_error(format!(
                "ownKeys trap result contains duplicate key {}",
                key
            )));
        }
        keys.push(key);
    }
    Ok(keys)
}

fn same_proto(a: &Option<JsObjectRef>, b: &Option<JsObjectRef>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => Gc::ptr_eq(a, b),
        _ => false,
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Traps
// ═══════════════════════════════════════════════════════════════════════════════

impl ProxyHandler for ScriptedProxyHandler {
    fn get_own_property_descriptor(
        &self,
        cx: &mut Context,
        proxy: &JsObjectRef,
        key: &PropertyKey,
    ) -> Result<Option<Property>, JsError> {
        let (target, handler) = parts(proxy)?;
        let name = cx.atoms.get_own_property_descriptor.cheap_clone();
        let Some(trap) = trap(cx, &handler, &name)? else {
            return object_ops::get_own_property_descriptor(cx, &target, key);
        };

        let result = call_trap(
            cx,
            &trap,
            &handler,
            vec![JsValue::Object(target.clone()), key.to_value()],
        )?;
        if !result.is_object() && !result.is_undefined() {
            return Err(JsError::type_error(
                "getOwnPropertyDescriptor trap must return an object or undefined",
            ));
        }

        let target_desc = object_ops::get_own_property_descriptor(cx, &target, key)?;
        if result.is_undefined() {
            let Some(target_desc) = target_desc else {
                return Ok(None);
            };
            if !target_desc.configurable {
                return Err(JsError::type_error(format!(
                    "proxy can't report a non-configurable own property '{}' as non-existent",
                    key
                )));
            }
            if !object_ops::is_extensible(cx, &target)? {
                return Err(JsError::type_error(format!(
                    "proxy can't report an existing own property '{}' as non-existent on a non-extensible object",
                    key
                )));
            }
            return Ok(None);
        }

        let extensible = object_ops::is_extensible(cx, &target)?;
        let desc = object_to_descriptor(cx, &result)?;
        let reported = desc.to_property();
        let complete = PropertyDescriptor::from(&reported);
        if !is_compatible_property_descriptor(extensible, &complete, target_desc.as_ref()) {
            return Err(JsError::type_error(format!(
                "proxy can't report an incompatible property descriptor for '{}'",
                key
            )));
        }
        if !reported.configurable {
            match &target_desc {
                Some(t) if !t.configurable => {
                    if desc.writable == Some(false) && t.writable && !t.is_accessor() {
                        return Err(JsError::type_error(format!(
                            "proxy can't report non-configurable, writable property '{}' as non-writable",
                            key
                        )));
                    }
                }
                _ => {
                    return Err(JsError::type_error(format!(
                        "proxy can't report a missing or configurable property '{}' as non-configurable",
                        key
                    )));
                }
            }
        }
        Ok(Some(reported))
    }

    fn define_property(
        &self,
        cx: &mut Context,
        proxy: &JsObjectRef,
        key: &PropertyKey,
        desc: &PropertyDescriptor,
    ) -> Result<ObjectOpResult, JsError> {
        assert_entered_policy(cx, proxy, Some(key), Action::SET);
        let (target, handler) = parts(proxy)?;
        let name = cx.atoms.define_property.cheap_clone();
        let Some(trap) = trap(cx, &handler, &name)? else {
            return object_ops::define_property(cx, &target, key, desc);
        };

        let desc_obj = descriptor_to_object(cx, desc)?;
        let result = call_trap(
            cx,
            &trap,
            &handler,
            vec![
                JsValue::Object(target.clone()),
                key.to_value(),
                JsValue::Object(desc_obj),
            ],
        )?;
        if !result.to_boolean() {
            return Ok(ObjectOpResult::fail(FailureCode::TrapReturnedFalsish));
        }

        let target_desc = object_ops::get_own_property_descriptor(cx, &target, key)?;
        let extensible = object_ops::is_extensible(cx, &target)?;
        let setting_non_configurable = desc.configurable == Some(false);
        match target_desc {
            None => {
                if !extensible {
                    return Err(JsError::type_error(format!(
                        "proxy can't define a new property '{}' on a non-extensible object",
                        key
                    )));
                }
                if setting_non_configurable {
                    return Err(JsError::type_error(format!(
                        "proxy can't define a non-existent property '{}' as non-configurable",
                        key
                    )));
                }
            }
            Some(t) => {
                if !is_compatible_property_descriptor(extensible, desc, Some(&t)) {
                    return Err(JsError::type_error(format!(
                        "proxy can't define an incompatible property descriptor for '{}'",
                        key
                    )));
                }
                if setting_non_configurable && t.configurable {
                    return Err(JsError::type_error(format!(
                        "proxy can't define configurable property '{}' as non-configurable",
                        key
                    )));
                }
                if !t.is_accessor() && !t.configurable && t.writable && desc.writable == Some(false) {
                    return Err(JsError::type_error(format!(
                        "proxy can't define non-configurable, writable property '{}' as non-writable",
                        key
                    )));
                }
            }
        }
        Ok(ObjectOpResult::succeed())
    }

    fn own_property_keys(
        &self,
        cx: &mut Context,
        proxy: &JsObjectRef,
    ) -> Result<Vec<PropertyKey>, JsError> {
        assert_entered_policy(cx, proxy, None, Action::ENUMERATE);
        let (target, handler) = parts(proxy)?;
        let name = cx.atoms.own_keys.cheap_clone();
        let Some(trap) = trap(cx, &handler, &name)? else {
            return object_ops::own_property_keys(cx, &target);
        };

        let result = call_trap(cx, &trap, &handler, vec![JsValue::Object(target.clone())])?;
        let keys = keys_from_array_like(cx, &result)?;

        let extensible = object_ops::is_extensible(cx, &target)?;
        let mut configurable = Vec::new();
        let mut non_configurable = Vec::new();
        for key in object_ops::own_property_keys(cx, &target)? {
            match object_ops::get_own_property_descriptor(cx, &target, &key)? {
                Some(prop) if !prop.configurable => non_configurable.push(key),
                _ => configurable.push(key),
            }
        }
        if extensible && non_configurable.is_empty() {
            return Ok(keys);
        }

        let mut unchecked: FxHashSet<PropertyKey> = keys.iter().cloned().collect();
        for key in &non_configurable {
            if !unchecked.remove(key) {
                return Err(JsError::type_error(format!(
                    "proxy can't skip a non-configurable property '{}'",
                    key
                )));
            }
        }
        if extensible {
            return Ok(keys);
        }
        for key in &configurable {
            if !unchecked.remove(key) {
                return Err(JsError::type_error(format!(
                    "proxy can't skip an existing property '{}' of a non-extensible object",
                    key
                )));
            }
        }
        if !unchecked.is_empty() {
            return Err(JsError::type_error(
                "proxy can't report new properties on a non-extensible object",
            ));
        }
        Ok(keys)
    }

    fn delete(
        &self,
        cx: &mut Context,
        proxy: &JsObjectRef,
        key: &PropertyKey,
    ) -> Result<ObjectOpResult, JsError> {
        assert_entered_policy(cx, proxy, Some(key), Action::SET);
        let (target, handler) = parts(proxy)?;
        let name = cx.atoms.delete_property.cheap_clone();
        let Some(trap) = trap(cx, &handler, &name)? else {
            return object_ops::delete_property(cx, &target, key);
        };

        let result = call_trap(
            cx,
            &trap,
            &handler,
            vec![JsValue::Object(target.clone()), key.to_value()],
        )?;
        if !result.to_boolean() {
            return Ok(ObjectOpResult::fail(FailureCode::TrapReturnedFalsish));
        }

        let Some(target_desc) = object_ops::get_own_property_descriptor(cx, &target, key)? else {
            return Ok(ObjectOpResult::succeed());
        };
        if !target_desc.configurable {
            return Err(JsError::type_error(format!(
                "property '{}' is non-configurable and can't be deleted",
                key
            )));
        }
        if !object_ops::is_extensible(cx, &target)? {
            return Err(JsError::type_error(format!(
                "proxy can't delete property '{}' of a non-extensible object",
                key
            )));
        }
        Ok(ObjectOpResult::succeed())
    }

    fn prevent_extensions(
        &self,
        cx: &mut Context,
        proxy: &JsObjectRef,
    ) -> Result<ObjectOpResult, JsError> {
        let (target, handler) = parts(proxy)?;
        let name = cx.atoms.prevent_extensions.cheap_clone();
        let Some(trap) = trap(cx, &handler, &name)? else {
            return object_ops::prevent_extensions(cx, &target);
        };

        let result = call_trap(cx, &trap, &handler, vec![JsValue::Object(target.clone())])?;
        if !result.to_boolean() {
            return Ok(ObjectOpResult::fail(FailureCode::CantPreventExtensions));
        }
        if object_ops::is_extensible(cx, &target)? {
            return Err(JsError::type_error(
                "proxy can't report an extensible object as non-extensible",
            ));
        }
        Ok(ObjectOpResult::succeed())
    }

    fn is_extensible(&self, cx: &mut Context, proxy: &JsObjectRef) -> Result<bool, JsError> {
        let (target, handler) = parts(proxy)?;
        let name = cx.atoms.is_extensible.cheap_clone();
        let Some(trap) = trap(cx, &handler, &name)? else {
            return object_ops::is_extensible(cx, &target);
        };

        let reported = call_trap(cx, &trap, &handler, vec![JsValue::Object(target.clone())])?
            .to_boolean();
        if reported != object_ops::is_extensible(cx, &target)? {
            return Err(JsError::type_error(
                "proxy must report the same extensibility as the target",
            ));
        }
        Ok(reported)
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
        cx: &mut Context,
        proxy: &JsObjectRef,
    ) -> Result<Option<JsObjectRef>, JsError> {
        let (target, handler) = parts(proxy)?;
        let name = cx.atoms.get_prototype_of.cheap_clone();
        let Some(trap) = trap(cx, &handler, &name)? else {
            return object_ops::get_prototype(cx, &target);
        };

        let proto = match call_trap(cx, &trap, &handler, vec![JsValue::Object(target.clone())])? {
            JsValue::Object(p) => Some(p),
            JsValue::Null => None,
            _ => {
                return Err(JsError::type_error(
                    "getPrototypeOf trap returned neither an object nor null",
                ));
            }
        };
        if object_ops::is_extensible(cx, &target)? {
            return Ok(proto);
        }
        let target_proto = object_ops::get_prototype(cx, &target)?;
        if !same_proto(&proto, &target_proto) {
            return Err(JsError::type_error(
                "proxy getPrototypeOf handler didn't return the target object's prototype",
            ));
        }
        Ok(proto)
    }

    fn set_prototype(
        &self,
        cx: &mut Context,
        proxy: &JsObjectRef,
        proto: Option<JsObjectRef>,
    ) -> Result<ObjectOpResult, JsError> {
        let (target, handler) = parts(proxy)?;
        let name = cx.atoms.set_prototype_of.cheap_clone();
        let Some(trap) = trap(cx, &handler, &name)? else {
            return object_ops::set_prototype(cx, &target, proto);
        };

        let result = call_trap(
            cx,
            &trap,
            &handler,
            vec![JsValue::Object(target.clone()), JsValue::from(proto.clone())],
        )?;
        if !result.to_boolean() {
            return Ok(ObjectOpResult::fail(FailureCode::CantSetProto));
        }
        if object_ops::is_extensible(cx, &target)? {
            return Ok(ObjectOpResult::succeed());
        }
        let target_proto = object_ops::get_prototype(cx, &target)?;
        if !same_proto(&proto, &target_proto) {
            return Err(JsError::type_error(
                "proxy setPrototypeOf handler returned true for a non-extensible target with a different prototype",
            ));
        }
        Ok(ObjectOpResult::succeed())
    }

    fn set_immutable_prototype(&self, cx: &mut Context, proxy: &JsObjectRef) -> Result<bool, JsError> {
        let (target, _) = parts(proxy)?;
        object_ops::set_immutable_prototype(cx, &target)
    }

    fn has(&self, cx: &mut Context, proxy: &JsObjectRef, key: &PropertyKey) -> Result<bool, JsError> {
        assert_entered_policy(cx, proxy, Some(key), Action::GET);
        let (target, handler) = parts(proxy)?;
        let name = cx.atoms.has.cheap_clone();
        let Some(trap) = trap(cx, &handler, &name)? else {
            return object_ops::has_property(cx, &target, key);
        };

        let found = call_trap(
            cx,
            &trap,
            &handler,
            vec![JsValue::Object(target.clone()), key.to_value()],
        )?
        .to_boolean();
        if found {
            return Ok(true);
        }
        if let Some(target_desc) = object_ops::get_own_property_descriptor(cx, &target, key)? {
            if !target_desc.configurable {
                return Err(JsError::type_error(format!(
                    "proxy can't report a non-configurable own property '{}' as non-existent",
                    key
                )));
            }
            if !object_ops::is_extensible(cx, &target)? {
                return Err(JsError::type_error(format!(
                    "proxy can't report an existing own property '{}' as non-existent on a non-extensible object",
                    key
                )));
            }
        }
        Ok(false)
    }

    fn get(
        &self,
        cx: &mut Context,
        proxy: &JsObjectRef,
        receiver: &JsValue,
        key: &PropertyKey,
    ) -> Result<JsValue, JsError> {
        assert_entered_policy(cx, proxy, Some(key), Action::GET);
        let (target, handler) = parts(proxy)?;
        let name = cx.atoms.get.cheap_clone();
        let Some(trap) = trap(cx, &handler, &name)? else {
            return object_ops::get_property(cx, &target, receiver, key);
        };

        let value = call_trap(
            cx,
            &trap,
            &handler,
            vec![JsValue::Object(target.clone()), key.to_value(), receiver.clone()],
        )?;
        if let Some(t) = object_ops::get_own_property_descriptor(cx, &target, key)?
            && !t.configurable
        {
            if !t.is_accessor() && !t.writable && !value.same_value(&t.value) {
                return Err(JsError::type_error(format!(
                    "proxy must report the same value for the non-writable, non-configurable property '{}'",
                    key
                )));
            }
            if t.is_accessor() && t.getter.is_none() && !value.is_undefined() {
                return Err(JsError::type_error(format!(
                    "proxy must report undefined for a non-configurable accessor property '{}' without a getter",
                    key
                )));
            }
        }
        Ok(value)
    }

    fn set(
        &self,
        cx: &mut Context,
        proxy: &JsObjectRef,
        key: &PropertyKey,
        value: JsValue,
        receiver: &JsValue,
    ) -> Result<ObjectOpResult, JsError> {
        assert_entered_policy(cx, proxy, Some(key), Action::SET);
        let (target, handler) = parts(proxy)?;
        let name = cx.atoms.set.cheap_clone();
        let Some(trap) = trap(cx, &handler, &name)? else {
            return object_ops::set_property(cx, &target, key, value, receiver);
        };

        let result = call_trap(
            cx,
            &trap,
            &handler,
            vec![
                JsValue::Object(target.clone()),
                key.to_value(),
                value.clone(),
                receiver.clone(),
            ],
        )?;
        if !result.to_boolean() {
            return Ok(ObjectOpResult::fail(FailureCode::TrapReturnedFalsish));
        }
        if let Some(t) = object_ops::get_own_property_descriptor(cx, &target, key)?
            && !t.configurable
        {
            if !t.is_accessor() && !t.writable && !value.same_value(&t.value) {
                return Err(JsError::type_error(format!(
                    "proxy can't successfully set a non-writable, non-configurable property '{}'",
                    key
                )));
            }
            if t.is_accessor() && t.setter.is_none() {
                return Err(JsError::type_error(format!(
                    "proxy can't successfully set an accessor property '{}' without a setter",
                    key
                )));
            }
        }
        Ok(ObjectOpResult::succeed())
    }

    fn call(&self, cx: &mut Context, proxy: &JsObjectRef, args: &CallArgs) -> Result<JsValue, JsError> {
        assert_entered_policy(cx, proxy, None, Action::CALL);
        let (target, handler) = parts(proxy)?;
        let name = cx.atoms.apply.cheap_clone();
        let Some(trap) = trap(cx, &handler, &name)? else {
            return object_ops::call_object(cx, &target, args.this.clone(), args.args.clone());
        };

        let arg_array = cx.create_array(args.args.clone());
        call_trap(
            cx,
            &trap,
            &handler,
            vec![
                JsValue::Object(target),
                args.this.clone(),
                JsValue::Object(arg_array),
            ],
        )
    }

    fn construct(
        &self,
        cx: &mut Context,
        proxy: &JsObjectRef,
        args: &CallArgs,
    ) -> Result<JsObjectRef, JsError> {
        assert_entered_policy(cx, proxy, None, Action::CALL);
        let (target, handler) = parts(proxy)?;
        let new_target = args.new_target.clone().unwrap_or_else(|| proxy.clone());
        let name = cx.atoms.construct.cheap_clone();
        let Some(trap) = trap(cx, &handler, &name)? else {
            return object_ops::construct(cx, &target, args.args.clone(), Some(&new_target));
        };

        let arg_array = cx.create_array(args.args.clone());
        match call_trap(
            cx,
            &trap,
            &handler,
            vec![
                JsValue::Object(target),
                JsValue::Object(arg_array),
                JsValue::Object(new_target),
            ],
        )? {
            JsValue::Object(obj) => Ok(obj),
            _ => Err(JsError::type_error("proxy construct trap must return an object")),
        }
    }

    fn is_callable(&self, data: &ProxyData) -> bool {
        callability(data) & CALLABLE != 0
    }

    fn is_constructor(&self, data: &ProxyData) -> bool {
        callability(data) & CONSTRUCTOR != 0
    }

    fn has_instance(
        &self,
        cx: &mut Context,
        proxy: &JsObjectRef,
        value: &JsValue,
    ) -> Result<bool, JsError> {
        assert_entered_policy(cx, proxy, None, Action::GET);
        if !object_ops::is_callable(proxy) {
            return Err(JsError::type_error("invalid 'instanceof' operand"));
        }
        object_ops::ordinary_has_instance(cx, proxy, value)
    }

    fn is_array(&self, cx: &mut Context, proxy: &JsObjectRef) -> Result<IsArrayAnswer, JsError> {
        let Some(target) = scripted_target(proxy) else {
            return Ok(IsArrayAnswer::RevokedProxy);
        };
        if is_proxy(&target) {
            return Proxy::is_array(cx, &target);
        }
        Ok(if object_ops::is_array(cx, &target)? {
            IsArrayAnswer::Array
        } else {
            IsArrayAnswer::NotArray
        })
    }

    fn can_nursery_allocate(&self) -> bool {
        true
    }

    fn is_scripted(&self) -> bool {
        true
    }
}

fn callability(data: &ProxyData) -> u32 {
    match data.reserved_slot(CALLABILITY_SLOT) {
        Some(JsValue::Number(n)) => *n as u32,
        _ => 0,
    }
}
