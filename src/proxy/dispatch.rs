//! Entry points from generic object code into proxy handlers.
//!
//! Each operation looks up the handler, enters the security policy with the
//! matching action and only then calls the handler. A denied operation
//! quietly reports its default result unless the policy asked for an error.
//! For handlers with `has_prototype`, `has`, `get` and `set` consult only
//! own properties on the handler and continue up the prototype chain here.

use crate::context::Context;
use crate::error::{FailureCode, JsError, ObjectOpResult};
use crate::object_ops;
use crate::value::{
    CallArgs, JsObjectRef, JsString, JsValue, Property, PropertyDescriptor, PropertyKey,
    RegExpData,
};

use super::handler::{EsClass, IsArrayAnswer, PrototypeIfOrdinary, ProxyHandler, base_class_name};
use super::object::handler_of;
use super::policy::{Action, AutoEnterPolicy};

fn handler(proxy: &JsObjectRef) -> Result<&'static dyn ProxyHandler, JsError> {
    handler_of(proxy).ok_or_else(|| JsError::internal_error("proxy operation on a non-proxy object"))
}

/// Namespace for the proxy entry points
pub struct Proxy;

impl Proxy {
    pub fn get_own_property_descriptor(
        cx: &mut Context,
        proxy: &JsObjectRef,
        key: &PropertyKey,
    ) -> Result<Option<Property>, JsError> {
        let handler = handler(proxy)?;
        let policy = AutoEnterPolicy::new(
            cx,
            handler,
            proxy,
            Some(key),
            Action::GET_PROPERTY_DESCRIPTOR,
            true,
        )?;
        if !policy.allowed() {
            return Ok(None);
        }
        handler.get_own_property_descriptor(cx, proxy, key)
    }

    pub fn define_property(
        cx: &mut Context,
        proxy: &JsObjectRef,
        key: &PropertyKey,
        desc: &PropertyDescriptor,
    ) -> Result<ObjectOpResult, JsError> {
        let handler = handler(proxy)?;
        let policy = AutoEnterPolicy::new(cx, handler, proxy, Some(key), Action::SET, true)?;
        if !policy.allowed() {
            return Ok(ObjectOpResult::fail(FailureCode::AccessDenied));
        }
        handler.define_property(cx, proxy, key, desc)
    }

    pub fn own_property_keys(
        cx: &mut Context,
        proxy: &JsObjectRef,
    ) -> Result<Vec<PropertyKey>, JsError> {
        let handler = handler(proxy)?;
        let policy = AutoEnterPolicy::new(cx, handler, proxy, None, Action::ENUMERATE, true)?;
        if !policy.allowed() {
            return Ok(Vec::new());
        }
        handler.own_property_keys(cx, proxy)
    }

    pub fn delete(
        cx: &mut Context,
        proxy: &JsObjectRef,
        key: &PropertyKey,
    ) -> Result<ObjectOpResult, JsError> {
        let handler = handler(proxy)?;
        let policy = AutoEnterPolicy::new(cx, handler, proxy, Some(key), Action::SET, true)?;
        if !policy.allowed() {
            return Ok(ObjectOpResult::fail(FailureCode::AccessDenied));
        }
        handler.delete(cx, proxy, key)
    }

    pub fn prevent_extensions(
        cx: &mut Context,
        proxy: &JsObjectRef,
    ) -> Result<ObjectOpResult, JsError> {
        handler(proxy)?.prevent_extensions(cx, proxy)
    }

    pub fn is_extensible(cx: &mut Context, proxy: &JsObjectRef) -> Result<bool, JsError> {
        handler(proxy)?.is_extensible(cx, proxy)
    }

    /// Only for proxies with a lazy prototype
    pub fn get_prototype(
        cx: &mut Context,
        proxy: &JsObjectRef,
    ) -> Result<Option<JsObjectRef>, JsError> {
        handler(proxy)?.get_prototype(cx, proxy)
    }

    /// Only for proxies with a lazy prototype
    pub fn set_prototype(
        cx: &mut Context,
        proxy: &JsObjectRef,
        proto: Option<JsObjectRef>,
    ) -> Result<ObjectOpResult, JsError> {
        handler(proxy)?.set_prototype(cx, proxy, proto)
    }

    pub fn get_prototype_if_ordinary(
        cx: &mut Context,
        proxy: &JsObjectRef,
    ) -> Result<PrototypeIfOrdinary, JsError> {
        handler(proxy)?.get_prototype_if_ordinary(cx, proxy)
    }

    pub fn set_immutable_prototype(cx: &mut Context, proxy: &JsObjectRef) -> Result<bool, JsError> {
        handler(proxy)?.set_immutable_prototype(cx, proxy)
    }

    pub fn has(cx: &mut Context, proxy: &JsObjectRef, key: &PropertyKey) -> Result<bool, JsError> {
        let handler = handler(proxy)?;
        let policy = AutoEnterPolicy::new(cx, handler, proxy, Some(key), Action::GET, true)?;
        if !policy.allowed() {
            return Ok(false);
        }

        if handler.has_prototype() {
            if handler.has_own(cx, proxy, key)? {
                return Ok(true);
            }
            return match object_ops::get_prototype(cx, proxy)? {
                Some(proto) => object_ops::has_property(cx, &proto, key),
                None => Ok(false),
            };
        }
        handler.has(cx, proxy, key)
    }

    pub fn has_own(cx: &mut Context, proxy: &JsObjectRef, key: &PropertyKey) -> Result<bool, JsError> {
        let handler = handler(proxy)?;
        let policy = AutoEnterPolicy::new(cx, handler, proxy, Some(key), Action::GET, true)?;
        if !policy.allowed() {
            return Ok(false);
        }
        handler.has_own(cx, proxy, key)
    }

    pub fn get(
        cx: &mut Context,
        proxy: &JsObjectRef,
        receiver: &JsValue,
        key: &PropertyKey,
    ) -> Result<JsValue, JsError> {
        let handler = handler(proxy)?;
        let policy = AutoEnterPolicy::new(cx, handler, proxy, Some(key), Action::GET, true)?;
        if !policy.allowed() {
            return Ok(JsValue::Undefined);
        }

        if handler.has_prototype() && !handler.has_own(cx, proxy, key)? {
            return match object_ops::get_prototype(cx, proxy)? {
                Some(proto) => object_ops::get_property(cx, &proto, receiver, key),
                None => Ok(JsValue::Undefined),
            };
        }
        handler.get(cx, proxy, receiver, key)
    }

    pub fn set(
        cx: &mut Context,
        proxy: &JsObjectRef,
        key: &PropertyKey,
        value: JsValue,
        receiver: &JsValue,
    ) -> Result<ObjectOpResult, JsError> {
        let handler = handler(proxy)?;
        let policy = AutoEnterPolicy::new(cx, handler, proxy, Some(key), Action::SET, true)?;
        if !policy.allowed() {
            return Ok(ObjectOpResult::fail(FailureCode::AccessDenied));
        }

        if handler.has_prototype() {
            let own = handler.get_own_property_descriptor(cx, proxy, key)?;
            if own.is_none()
                && let Some(proto) = object_ops::get_prototype(cx, proxy)?
            {
                return object_ops::set_property(cx, &proto, key, value, receiver);
            }
            return object_ops::set_with_own_descriptor(cx, key, value, receiver, own);
        }
        handler.set(cx, proxy, key, value, receiver)
    }

    pub fn get_own_enumerable_property_keys(
        cx: &mut Context,
        proxy: &JsObjectRef,
    ) -> Result<Vec<PropertyKey>, JsError> {
        let handler = handler(proxy)?;
        let policy = AutoEnterPolicy::new(cx, handler, proxy, None, Action::ENUMERATE, true)?;
        if !policy.allowed() {
            return Ok(Vec::new());
        }
        handler.get_own_enumerable_property_keys(cx, proxy)
    }

    pub fn enumerate(cx: &mut Context, proxy: &JsObjectRef) -> Result<Vec<PropertyKey>, JsError> {
        let handler = handler(proxy)?;
        let policy = AutoEnterPolicy::new(cx, handler, proxy, None, Action::ENUMERATE, true)?;
        if !policy.allowed() {
            return Ok(Vec::new());
        }

        if handler.has_prototype() {
            let mut keys = handler.get_own_enumerable_property_keys(cx, proxy)?;
            if let Some(proto) = object_ops::get_prototype(cx, proxy)? {
                for key in object_ops::enumerate(cx, &proto)? {
                    if !keys.contains(&key) {
                        keys.push(key);
                    }
                }
            }
            return Ok(keys);
        }
        handler.enumerate(cx, proxy)
    }

    pub fn call(cx: &mut Context, proxy: &JsObjectRef, args: &CallArgs) -> Result<JsValue, JsError> {
        let handler = handler(proxy)?;
        let policy = AutoEnterPolicy::new(cx, handler, proxy, None, Action::CALL, true)?;
        if !policy.allowed() {
            return Ok(JsValue::Undefined);
        }
        handler.call(cx, proxy, args)
    }

    pub fn construct(
        cx: &mut Context,
        proxy: &JsObjectRef,
        args: &CallArgs,
    ) -> Result<JsObjectRef, JsError> {
        let handler = handler(proxy)?;
        let policy = AutoEnterPolicy::new(cx, handler, proxy, None, Action::CALL, true)?;
        if !policy.allowed() {
            return Err(JsError::access_denied(None));
        }
        handler.construct(cx, proxy, args)
    }

    pub fn has_instance(
        cx: &mut Context,
        proxy: &JsObjectRef,
        value: &JsValue,
    ) -> Result<bool, JsError> {
        let handler = handler(proxy)?;
        let policy = AutoEnterPolicy::new(cx, handler, proxy, None, Action::GET, true)?;
        if !policy.allowed() {
            return Ok(false);
        }
        handler.has_instance(cx, proxy, value)
    }

    pub fn get_builtin_class(cx: &mut Context, proxy: &JsObjectRef) -> Result<EsClass, JsError> {
        handler(proxy)?.get_builtin_class(cx, proxy)
    }

    pub fn is_array(cx: &mut Context, proxy: &JsObjectRef) -> Result<IsArrayAnswer, JsError> {
        handler(proxy)?.is_array(cx, proxy)
    }

    /// Falls back to the base class name when the policy denies access
    pub fn class_name(cx: &mut Context, proxy: &JsObjectRef) -> Result<&'static str, JsError> {
        let handler = handler(proxy)?;
        let policy = AutoEnterPolicy::new(cx, handler, proxy, None, Action::GET, false)?;
        if !policy.allowed() {
            return Ok(base_class_name(proxy));
        }
        handler.class_name(cx, proxy)
    }

    /// Falls back to the generic native-code string when the policy denies access
    pub fn fun_to_string(
        cx: &mut Context,
        proxy: &JsObjectRef,
        is_to_source: bool,
    ) -> Result<JsString, JsError> {
        let handler = handler(proxy)?;
        let policy = AutoEnterPolicy::new(cx, handler, proxy, None, Action::GET, false)?;
        if !policy.allowed() {
            return if proxy.borrow().is_callable() {
                Ok(JsString::from("function () {\n    [native code]\n}"))
            } else {
                Err(JsError::type_error(
                    "Function.prototype.toString called on incompatible object",
                ))
            };
        }
        handler.fun_to_string(cx, proxy, is_to_source)
    }

    pub fn regexp_to_shared(
        cx: &mut Context,
        proxy: &JsObjectRef,
    ) -> Result<Option<RegExpData>, JsError> {
        handler(proxy)?.regexp_to_shared(cx, proxy)
    }

    pub fn boxed_value_unbox(
        cx: &mut Context,
        proxy: &JsObjectRef,
    ) -> Result<Option<JsValue>, JsError> {
        handler(proxy)?.boxed_value_unbox(cx, proxy)
    }
}
