//! The proxy handler interface.
//!
//! Every proxy stores a `&'static dyn ProxyHandler`. The seven required
//! methods are the fundamental internal methods; everything else has a
//! default written in terms of them. Entry into a handler always goes
//! through [`Proxy`](super::Proxy), which runs the security policy and the
//! prototype walk for handlers that opt into `has_prototype`.

use std::fmt;

use crate::context::Context;
use crate::error::{JsError, ObjectOpResult};
use crate::object_ops;
use crate::value::{
    CallArgs, JsObjectRef, JsString, JsValue, Property, PropertyDescriptor, PropertyKey,
    RegExpData,
};

use super::object::ProxyData;
use super::policy::{Action, PolicyVerdict, assert_entered_policy};

/// Opaque grouping tag for handlers.
///
/// Families compare by address, so a consumer declares one with a private
/// static and recognizes its own proxies without knowing handler types.
#[derive(Clone, Copy)]
pub struct Family(&'static u8);

impl Family {
    pub const fn new(tag: &'static u8) -> Self {
        Family(tag)
    }
}

impl PartialEq for Family {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.0, other.0)
    }
}

impl Eq for Family {}

impl fmt::Debug for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Family({:p})", self.0)
    }
}

/// Answer of `IsArray`, which can fail on revoked proxies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsArrayAnswer {
    Array,
    NotArray,
    RevokedProxy,
}

/// Builtin classification used by generic introspection code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EsClass {
    Object,
    Array,
    Number,
    String,
    Boolean,
    RegExp,
    Function,
    Other,
}

/// Result of `[[GetPrototypeIfOrdinary]]`
#[derive(Debug, Clone)]
pub enum PrototypeIfOrdinary {
    /// The prototype can be read without observable side effects
    Ordinary(Option<JsObjectRef>),
    /// Reading the prototype runs handler code
    NotOrdinary,
}

/// The contract every proxy behavior implements.
///
/// Handlers are shared by any number of proxies and are normally
/// process-wide `static` singletons, hence `Sync + 'static`. Per-instance
/// state lives in the proxy's private and reserved slots.
pub trait ProxyHandler: Sync + 'static {
    /// Grouping tag used for fast "is this one of mine" checks
    fn family(&self) -> Option<Family> {
        None
    }

    /// When true, `has`, `get` and `set` on the proxy consult only the
    /// handler's own-property methods and the runtime walks the prototype
    /// chain itself.
    fn has_prototype(&self) -> bool {
        false
    }

    /// When true, every entry runs [`ProxyHandler::enter`] first and checked
    /// unwrapping refuses to look through this handler.
    fn has_security_policy(&self) -> bool {
        false
    }

    /// Wrapper flag bits accumulated by unchecked unwrapping
    fn wrapper_flags(&self) -> u32 {
        0
    }

    /// Whether the proxy's private slot is a target this handler forwards to
    fn is_wrapper(&self) -> bool {
        false
    }

    /// Security check, consulted only when `has_security_policy` is true.
    ///
    /// With `may_throw` unset the caller cannot report an exception, so
    /// the handler should answer with a verdict rather than an error.
    fn enter(
        &self,
        _cx: &mut Context,
        _proxy: &JsObjectRef,
        _key: Option<&PropertyKey>,
        _action: Action,
        _may_throw: bool,
    ) -> Result<PolicyVerdict, JsError> {
        Ok(PolicyVerdict::Allow)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Fundamental internal methods
    // ═══════════════════════════════════════════════════════════════════════════

    /// `None` means the property does not exist
    fn get_own_property_descriptor(
        &self,
        cx: &mut Context,
        proxy: &JsObjectRef,
        key: &PropertyKey,
    ) -> Result<Option<Property>, JsError>;

    fn define_property(
        &self,
        cx: &mut Context,
        proxy: &JsObjectRef,
        key: &PropertyKey,
        desc: &PropertyDescriptor,
    ) -> Result<ObjectOpResult, JsError>;

    /// Every own key, including non-enumerable and symbol keys
    fn own_property_keys(
        &self,
        cx: &mut Context,
        proxy: &JsObjectRef,
    ) -> Result<Vec<PropertyKey>, JsError>;

    fn delete(
        &self,
        cx: &mut Context,
        proxy: &JsObjectRef,
        key: &PropertyKey,
    ) -> Result<ObjectOpResult, JsError>;

    fn prevent_extensions(
        &self,
        cx: &mut Context,
        proxy: &JsObjectRef,
    ) -> Result<ObjectOpResult, JsError>;

    fn is_extensible(&self, cx: &mut Context, proxy: &JsObjectRef) -> Result<bool, JsError>;

    fn get_prototype_if_ordinary(
        &self,
        cx: &mut Context,
        proxy: &JsObjectRef,
    ) -> Result<PrototypeIfOrdinary, JsError>;

    // ═══════════════════════════════════════════════════════════════════════════
    // Prototype
    // ═══════════════════════════════════════════════════════════════════════════

    /// Only called for proxies created with a lazy prototype. Handlers that
    /// create such proxies must override this.
    fn get_prototype(
        &self,
        _cx: &mut Context,
        _proxy: &JsObjectRef,
    ) -> Result<Option<JsObjectRef>, JsError> {
        #[allow(clippy::panic)]
        {
            panic!("proxy handler with a lazy prototype must implement get_prototype")
        }
    }

    fn set_prototype(
        &self,
        _cx: &mut Context,
        proxy: &JsObjectRef,
        _proto: Option<JsObjectRef>,
    ) -> Result<ObjectOpResult, JsError> {
        Err(JsError::type_error(format!(
            "can't set prototype of {}",
            base_class_name(proxy)
        )))
    }

    /// Returns whether the prototype is now immutable
    fn set_immutable_prototype(
        &self,
        _cx: &mut Context,
        _proxy: &JsObjectRef,
    ) -> Result<bool, JsError> {
        Ok(false)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Derived property access
    // ═══════════════════════════════════════════════════════════════════════════

    fn has(&self, cx: &mut Context, proxy: &JsObjectRef, key: &PropertyKey) -> Result<bool, JsError> {
        assert_entered_policy(cx, proxy, Some(key), Action::GET);
        self.has_own(cx, proxy, key)
    }

    fn get(
        &self,
        cx: &mut Context,
        proxy: &JsObjectRef,
        receiver: &JsValue,
        key: &PropertyKey,
    ) -> Result<JsValue, JsError> {
        assert_entered_policy(cx, proxy, Some(key), Action::GET);
        match self.get_own_property_descriptor(cx, proxy, key)? {
            None => Ok(JsValue::Undefined),
            Some(prop) if prop.is_accessor() => match prop.getter {
                Some(getter) => object_ops::call_object(cx, &getter, receiver.clone(), Vec::new()),
                None => Ok(JsValue::Undefined),
            },
            Some(prop) => Ok(prop.value),
        }
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
        let own = self.get_own_property_descriptor(cx, proxy, key)?;
        object_ops::set_with_own_descriptor(cx, key, value, receiver, own)
    }

    fn has_own(
        &self,
        cx: &mut Context,
        proxy: &JsObjectRef,
        key: &PropertyKey,
    ) -> Result<bool, JsError> {
        assert_entered_policy(cx, proxy, Some(key), Action::GET);
        Ok(self.get_own_property_descriptor(cx, proxy, key)?.is_some())
    }

    /// Enumerable string-keyed own properties
    fn get_own_enumerable_property_keys(
        &self,
        cx: &mut Context,
        proxy: &JsObjectRef,
    ) -> Result<Vec<PropertyKey>, JsError> {
        assert_entered_policy(cx, proxy, None, Action::ENUMERATE);
        let keys = self.own_property_keys(cx, proxy)?;
        let mut enumerable = Vec::with_capacity(keys.len());
        for key in keys {
            if key.is_symbol() {
                continue;
            }
            if self
                .get_own_property_descriptor(cx, proxy, &key)?
                .is_some_and(|prop| prop.enumerable)
            {
                enumerable.push(key);
            }
        }
        Ok(enumerable)
    }

    /// Keys visited by `for-in`
    fn enumerate(&self, cx: &mut Context, proxy: &JsObjectRef) -> Result<Vec<PropertyKey>, JsError> {
        assert_entered_policy(cx, proxy, None, Action::ENUMERATE);
        object_ops::enumerate_keys_generic(cx, proxy)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Call and construct
    // ═══════════════════════════════════════════════════════════════════════════

    /// Only reached when [`ProxyHandler::is_callable`] is true for the proxy
    fn call(&self, _cx: &mut Context, _proxy: &JsObjectRef, _args: &CallArgs) -> Result<JsValue, JsError> {
        #[allow(clippy::panic)]
        {
            panic!("callable proxy handler must implement call")
        }
    }

    /// Only reached when [`ProxyHandler::is_constructor`] is true for the proxy
    fn construct(
        &self,
        _cx: &mut Context,
        _proxy: &JsObjectRef,
        _args: &CallArgs,
    ) -> Result<JsObjectRef, JsError> {
        #[allow(clippy::panic)]
        {
            panic!("constructible proxy handler must implement construct")
        }
    }

    /// Queried per instance: the same handler may serve callable and
    /// non-callable proxies.
    fn is_callable(&self, _data: &ProxyData) -> bool {
        false
    }

    fn is_constructor(&self, _data: &ProxyData) -> bool {
        false
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Introspection
    // ═══════════════════════════════════════════════════════════════════════════

    fn has_instance(
        &self,
        cx: &mut Context,
        proxy: &JsObjectRef,
        _value: &JsValue,
    ) -> Result<bool, JsError> {
        assert_entered_policy(cx, proxy, None, Action::GET);
        Err(JsError::type_error("invalid 'instanceof' operand"))
    }

    fn get_builtin_class(&self, _cx: &mut Context, _proxy: &JsObjectRef) -> Result<EsClass, JsError> {
        Ok(EsClass::Other)
    }

    fn is_array(&self, _cx: &mut Context, _proxy: &JsObjectRef) -> Result<IsArrayAnswer, JsError> {
        Ok(IsArrayAnswer::NotArray)
    }

    fn class_name(&self, cx: &mut Context, proxy: &JsObjectRef) -> Result<&'static str, JsError> {
        assert_entered_policy(cx, proxy, None, Action::GET);
        Ok(base_class_name(proxy))
    }

    fn fun_to_string(
        &self,
        cx: &mut Context,
        proxy: &JsObjectRef,
        _is_to_source: bool,
    ) -> Result<JsString, JsError> {
        assert_entered_policy(cx, proxy, None, Action::GET);
        if proxy.borrow().is_callable() {
            Ok(JsString::from("function () {\n    [native code]\n}"))
        } else {
            Err(JsError::type_error(
                "Function.prototype.toString called on incompatible object",
            ))
        }
    }

    fn regexp_to_shared(
        &self,
        _cx: &mut Context,
        _proxy: &JsObjectRef,
    ) -> Result<Option<RegExpData>, JsError> {
        Ok(None)
    }

    /// Primitive value of a boxed Boolean, Number or String
    fn boxed_value_unbox(
        &self,
        _cx: &mut Context,
        _proxy: &JsObjectRef,
    ) -> Result<Option<JsValue>, JsError> {
        Ok(None)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // GC hooks
    // ═══════════════════════════════════════════════════════════════════════════

    /// The object that stands in for the proxy as a weak map key
    fn weakmap_key_delegate(&self, _proxy: &JsObjectRef) -> Option<JsObjectRef> {
        None
    }

    /// Runs when a tenured proxy is reclaimed. Must not touch other objects.
    fn finalize(&self, _data: &mut ProxyData) {}

    fn object_moved(&self, _data: &mut ProxyData, _old_id: usize) {}

    /// Nursery proxies are reclaimed without `finalize`. Only return true if
    /// skipping it is harmless.
    fn can_nursery_allocate(&self) -> bool {
        false
    }

    fn finalize_in_background(&self, _private: &JsValue) -> bool {
        true
    }

    /// True for proxies whose traps are script functions
    fn is_scripted(&self) -> bool {
        false
    }
}

/// The class name generic code reports for a proxy with no better answer
pub fn base_class_name(proxy: &JsObjectRef) -> &'static str {
    if proxy.borrow().is_callable() {
        "Function"
    } else {
        "Object"
    }
}
