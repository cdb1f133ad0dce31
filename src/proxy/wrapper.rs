//! Forwarding handlers and unwrapping.
//!
//! A wrapper keeps its target in the proxy's private slot and forwards
//! every operation to it through the generic object operations, so generic
//! code cannot tell the wrapper from the object it wraps. What differs
//! between wrapper kinds is the security policy, supplied as a
//! [`WrapperPolicy`], and the flag bits reported while unwrapping.

use tracing::debug;

use crate::context::Context;
use crate::error::{JsError, ObjectOpResult};
use crate::gc::{Gc, Traceable};
use crate::object_ops::{self, KeyFlags};
use crate::value::{
    CallArgs, JsObjectRef, JsString, JsValue, Property, PropertyDescriptor, PropertyKey,
    RegExpData,
};

use super::dispatch::Proxy;
use super::handler::{EsClass, Family, IsArrayAnswer, PrototypeIfOrdinary, ProxyHandler};
use super::object::{ProxyData, ProxyOptions, handler_of, is_proxy, new_proxy_object};
use super::policy::{Action, PolicyVerdict, assert_entered_policy};

/// Flag set by wrappers that cross a compartment boundary
pub const CROSS_COMPARTMENT: u32 = 1;

static WRAPPER_FAMILY_TAG: u8 = 0;

/// Family shared by the built-in wrappers
pub const WRAPPER_FAMILY: Family = Family::new(&WRAPPER_FAMILY_TAG);

const DESCRIPTOR_ACCESS: Action = Action::GET_PROPERTY_DESCRIPTOR
    .union(Action::GET)
    .union(Action::SET);

/// Security decision of a wrapper.
///
/// The default is transparent: no policy, every operation forwarded.
pub trait WrapperPolicy: Sync + 'static {
    fn has_security_policy(&self) -> bool {
        false
    }

    fn enter(
        &self,
        _cx: &mut Context,
        _wrapper: &JsObjectRef,
        _key: Option<&PropertyKey>,
        _action: Action,
        _may_throw: bool,
    ) -> Result<PolicyVerdict, JsError> {
        Ok(PolicyVerdict::Allow)
    }
}

/// Policy of wrappers that hide nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct Transparent;

impl WrapperPolicy for Transparent {}

/// A handler forwarding every operation to the object in the private slot
#[derive(Debug)]
pub struct Wrapper<P: WrapperPolicy = Transparent> {
    flags: u32,
    has_prototype: bool,
    family: Family,
    policy: P,
}

impl<P: WrapperPolicy> Wrapper<P> {
    pub const fn new(flags: u32, has_prototype: bool, policy: P) -> Self {
        Self {
            flags,
            has_prototype,
            family: WRAPPER_FAMILY,
            policy,
        }
    }

    /// Replace the handler family, e.g. to mark window proxies
    pub const fn with_family(mut self, family: Family) -> Self {
        self.family = family;
        self
    }

    pub const fn flags(&self) -> u32 {
        self.flags
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }
}

static TRANSPARENT_WRAPPER: Wrapper = Wrapper::new(0, false, Transparent);
static TRANSPARENT_WRAPPER_WITH_PROTOTYPE: Wrapper = Wrapper::new(0, true, Transparent);
static CROSS_COMPARTMENT_WRAPPER: Wrapper = Wrapper::new(CROSS_COMPARTMENT, false, Transparent);

impl Wrapper {
    pub const SINGLETON: &'static Wrapper = &TRANSPARENT_WRAPPER;
    pub const SINGLETON_WITH_PROTOTYPE: &'static Wrapper = &TRANSPARENT_WRAPPER_WITH_PROTOTYPE;
}

/// Transparent wrapper marked as crossing a compartment boundary
pub struct CrossCompartmentWrapper;

impl CrossCompartmentWrapper {
    pub const SINGLETON: &'static Wrapper = &CROSS_COMPARTMENT_WRAPPER;
}

/// Wrap `target` with `handler`. Wrappers are never nursery-allocated so
/// their finalization class stays that of the target.
pub fn new_wrapper(
    cx: &mut Context,
    target: &JsObjectRef,
    handler: &'static dyn ProxyHandler,
    proto: Option<JsObjectRef>,
    options: &ProxyOptions,
) -> Result<JsObjectRef, JsError> {
    debug_assert!(handler.is_wrapper(), "new_wrapper needs a forwarding handler");
    new_proxy_object(cx, handler, JsValue::Object(target.maybe_forwarded()), proto, options)
}

/// Cross-compartment wrapper for `obj` whose prototype is read from the target
pub fn transparent_object_wrapper(
    cx: &mut Context,
    obj: &JsObjectRef,
) -> Result<JsObjectRef, JsError> {
    let options = ProxyOptions::new().with_lazy_proto(true);
    new_wrapper(cx, obj, CrossCompartmentWrapper::SINGLETON, None, &options)
}

fn target(proxy: &JsObjectRef) -> Result<JsObjectRef, JsError> {
    let data = proxy.borrow();
    data.as_proxy()
        .and_then(ProxyData::target)
        .map(Gc::maybe_forwarded)
        .ok_or_else(|| JsError::type_error("wrapper has no target"))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Forwarding
// ═══════════════════════════════════════════════════════════════════════════════

impl<P: WrapperPolicy> ProxyHandler for Wrapper<P> {
    fn family(&self) -> Option<Family> {
        Some(self.family)
    }

    fn has_prototype(&self) -> bool {
        self.has_prototype
    }

    fn has_security_policy(&self) -> bool {
        self.policy.has_security_policy()
    }

    fn wrapper_flags(&self) -> u32 {
        self.flags
    }

    fn is_wrapper(&self) -> bool {
        true
    }

    fn enter(
        &self,
        cx: &mut Context,
        proxy: &JsObjectRef,
        key: Option<&PropertyKey>,
        action: Action,
        may_throw: bool,
    ) -> Result<PolicyVerdict, JsError> {
        self.policy.enter(cx, proxy, key, action, may_throw)
    }

    fn get_own_property_descriptor(
        &self,
        cx: &mut Context,
        proxy: &JsObjectRef,
        key: &PropertyKey,
    ) -> Result<Option<Property>, JsError> {
        assert_entered_policy(cx, proxy, Some(key), DESCRIPTOR_ACCESS);
        let target = target(proxy)?;
        object_ops::get_own_property_descriptor(cx, &target, key)
    }

    fn define_property(
        &self,
        cx: &mut Context,
        proxy: &JsObjectRef,
        key: &PropertyKey,
        desc: &PropertyDescriptor,
    ) -> Result<ObjectOpResult, JsError> {
        assert_entered_policy(cx, proxy, Some(key), Action::SET);
        let target = target(proxy)?;
        object_ops::define_property(cx, &target, key, desc)
    }

    fn own_property_keys(
        &self,
        cx: &mut Context,
        proxy: &JsObjectRef,
    ) -> Result<Vec<PropertyKey>, JsError> {
        assert_entered_policy(cx, proxy, None, Action::ENUMERATE);
        let target = target(proxy)?;
        object_ops::own_property_keys(cx, &target)
    }

    fn delete(
        &self,
        cx: &mut Context,
        proxy: &JsObjectRef,
        key: &PropertyKey,
    ) -> Result<ObjectOpResult, JsError> {
        assert_entered_policy(cx, proxy, Some(key), Action::SET);
        let target = target(proxy)?;
        object_ops::delete_property(cx, &target, key)
    }

    fn prevent_extensions(
        &self,
        cx: &mut Context,
        proxy: &JsObjectRef,
    ) -> Result<ObjectOpResult, JsError> {
        let target = target(proxy)?;
        object_ops::prevent_extensions(cx, &target)
    }

    fn is_extensible(&self, cx: &mut Context, proxy: &JsObjectRef) -> Result<bool, JsError> {
        let target = target(proxy)?;
        object_ops::is_extensible(cx, &target)
    }

    fn get_prototype_if_ordinary(
        &self,
        _cx: &mut Context,
        _proxy: &JsObjectRef,
    ) -> Result<PrototypeIfOrdinary, JsError> {
        // Reading the target's prototype may run its handler
        Ok(PrototypeIfOrdinary::NotOrdinary)
    }

    fn get_prototype(
        &self,
        cx: &mut Context,
        proxy: &JsObjectRef,
    ) -> Result<Option<JsObjectRef>, JsError> {
        let target = target(proxy)?;
        object_ops::get_prototype(cx, &target)
    }

    fn set_prototype(
        &self,
        cx: &mut Context,
        proxy: &JsObjectRef,
        proto: Option<JsObjectRef>,
    ) -> Result<ObjectOpResult, JsError> {
        let target = target(proxy)?;
        object_ops::set_prototype(cx, &target, proto)
    }

    fn set_immutable_prototype(&self, cx: &mut Context, proxy: &JsObjectRef) -> Result<bool, JsError> {
        let target = target(proxy)?;
        object_ops::set_immutable_prototype(cx, &target)
    }

    fn has(&self, cx: &mut Context, proxy: &JsObjectRef, key: &PropertyKey) -> Result<bool, JsError> {
        assert_entered_policy(cx, proxy, Some(key), Action::GET);
        let target = target(proxy)?;
        object_ops::has_property(cx, &target, key)
    }

    fn has_own(&self, cx: &mut Context, proxy: &JsObjectRef, key: &PropertyKey) -> Result<bool, JsError> {
        assert_entered_policy(cx, proxy, Some(key), Action::GET);
        let target = target(proxy)?;
        object_ops::has_own_property(cx, &target, key)
    }

    fn get(
        &self,
        cx: &mut Context,
        proxy: &JsObjectRef,
        receiver: &JsValue,
        key: &PropertyKey,
    ) -> Result<JsValue, JsError> {
        assert_entered_policy(cx, proxy, Some(key), Action::GET);
        let target = target(proxy)?;
        object_ops::get_property(cx, &target, receiver, key)
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
        let target = target(proxy)?;
        object_ops::set_property(cx, &target, key, value, receiver)
    }

    fn get_own_enumerable_property_keys(
        &self,
        cx: &mut Context,
        proxy: &JsObjectRef,
    ) -> Result<Vec<PropertyKey>, JsError> {
        assert_entered_policy(cx, proxy, None, Action::ENUMERATE);
        let target = target(proxy)?;
        object_ops::get_property_keys(cx, &target, KeyFlags::OWN_ONLY)
    }

    fn enumerate(&self, cx: &mut Context, proxy: &JsObjectRef) -> Result<Vec<PropertyKey>, JsError> {
        assert_entered_policy(cx, proxy, None, Action::ENUMERATE);
        let target = target(proxy)?;
        object_ops::enumerate(cx, &target)
    }

    fn call(&self, cx: &mut Context, proxy: &JsObjectRef, args: &CallArgs) -> Result<JsValue, JsError> {
        assert_entered_policy(cx, proxy, None, Action::CALL);
        let target = target(proxy)?;
        if !object_ops::is_callable(&target) {
            return Err(JsError::not_a_function(target.borrow().exotic.kind_name()));
        }
        object_ops::call_object(cx, &target, args.this.clone(), args.args.clone())
    }

    fn construct(
        &self,
        cx: &mut Context,
        proxy: &JsObjectRef,
        args: &CallArgs,
    ) -> Result<JsObjectRef, JsError> {
        assert_entered_policy(cx, proxy, None, Action::CALL);
        let target = target(proxy)?;
        if !object_ops::is_constructor(&target) {
            return Err(JsError::not_a_constructor(target.borrow().exotic.kind_name()));
        }
        // `new wrapper()` behaves like `new target()`
        let new_target = match &args.new_target {
            Some(nt) if !Gc::ptr_eq(nt, proxy) => nt.clone(),
            _ => target.clone(),
        };
        object_ops::construct(cx, &target, args.args.clone(), Some(&new_target))
    }

    fn is_callable(&self, data: &ProxyData) -> bool {
        data.target()
            .and_then(|t| t.try_borrow().map(|t| t.is_callable()))
            .unwrap_or(false)
    }

    fn is_constructor(&self, data: &ProxyData) -> bool {
        data.target()
            .and_then(|t| t.try_borrow().map(|t| t.is_constructor()))
            .unwrap_or(false)
    }

    fn has_instance(
        &self,
        cx: &mut Context,
        proxy: &JsObjectRef,
        value: &JsValue,
    ) -> Result<bool, JsError> {
        assert_entered_policy(cx, proxy, None, Action::GET);
        let target = target(proxy)?;
        object_ops::has_instance(cx, &target, value)
    }

    fn get_builtin_class(&self, cx: &mut Context, proxy: &JsObjectRef) -> Result<EsClass, JsError> {
        let target = target(proxy)?;
        object_ops::get_builtin_class(cx, &target)
    }

    fn is_array(&self, cx: &mut Context, proxy: &JsObjectRef) -> Result<IsArrayAnswer, JsError> {
        let target = target(proxy)?;
        if is_proxy(&target) {
            return Proxy::is_array(cx, &target);
        }
        Ok(if object_ops::is_array(cx, &target)? {
            IsArrayAnswer::Array
        } else {
            IsArrayAnswer::NotArray
        })
    }

    fn class_name(&self, cx: &mut Context, proxy: &JsObjectRef) -> Result<&'static str, JsError> {
        assert_entered_policy(cx, proxy, None, Action::GET);
        let target = target(proxy)?;
        object_ops::class_name(cx, &target)
    }

    fn fun_to_string(
        &self,
        cx: &mut Context,
        proxy: &JsObjectRef,
        is_to_source: bool,
    ) -> Result<JsString, JsError> {
        assert_entered_policy(cx, proxy, None, Action::GET);
        let target = target(proxy)?;
        object_ops::fun_to_string(cx, &target, is_to_source)
    }

    fn regexp_to_shared(
        &self,
        cx: &mut Context,
        proxy: &JsObjectRef,
    ) -> Result<Option<RegExpData>, JsError> {
        let target = target(proxy)?;
        object_ops::regexp_source(cx, &target)
    }

    fn boxed_value_unbox(
        &self,
        cx: &mut Context,
        proxy: &JsObjectRef,
    ) -> Result<Option<JsValue>, JsError> {
        let target = target(proxy)?;
        object_ops::unbox(cx, &target)
    }

    // Window proxies are looked through too, so a key keeps one identity
    // however many layers wrap it
    fn weakmap_key_delegate(&self, proxy: &JsObjectRef) -> Option<JsObjectRef> {
        Some(unwrap_fully(proxy))
    }

    fn finalize_in_background(&self, private: &JsValue) -> bool {
        match private {
            // The target may be mid-teardown when this is asked during a sweep
            JsValue::Object(target) => target
                .try_borrow()
                .is_none_or(|t| t.finalize_in_background()),
            _ => true,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Unwrapping
// ═══════════════════════════════════════════════════════════════════════════════

/// The target of `obj` if it is a wrapper, resolved through forwarding
pub fn wrapped_object(obj: &JsObjectRef) -> Option<JsObjectRef> {
    let data = obj.borrow();
    let proxy = data.as_proxy()?;
    if !proxy.handler().is_wrapper() {
        return None;
    }
    proxy.target().map(Gc::maybe_forwarded)
}

/// Whether `obj` belongs to the context's window-proxy family
pub fn is_window_proxy(cx: &Context, obj: &JsObjectRef) -> bool {
    match (cx.window_proxy_family(), handler_of(obj).and_then(|h| h.family())) {
        (Some(window), Some(family)) => window == family,
        _ => false,
    }
}

fn unwrap_chain(
    obj: &JsObjectRef,
    mut stop: impl FnMut(&JsObjectRef) -> bool,
    flags: &mut u32,
) -> JsObjectRef {
    let mut current = obj.maybe_forwarded();
    while !stop(&current) {
        let next = {
            let data = current.borrow();
            match data.as_proxy() {
                Some(proxy) if proxy.handler().is_wrapper() => {
                    *flags |= proxy.handler().wrapper_flags();
                    proxy.target().map(Gc::maybe_forwarded)
                }
                _ => None,
            }
        };
        match next {
            Some(target) => current = target,
            None => break,
        }
    }
    current
}

/// Walk every wrapper layer regardless of policy. `flags` is overwritten
/// with the OR of the traversed handlers' flags. With
/// `stop_at_window_proxy`, a window proxy is returned instead of being
/// looked through.
pub fn unchecked_unwrap(
    cx: &Context,
    obj: &JsObjectRef,
    stop_at_window_proxy: bool,
    flags: &mut u32,
) -> JsObjectRef {
    let mut traversed = 0;
    let unwrapped = unwrap_chain(
        obj,
        |o| stop_at_window_proxy && is_window_proxy(cx, o),
        &mut traversed,
    );
    *flags = traversed;
    unwrapped
}

/// Unchecked unwrap through every layer, window proxies included
pub fn unwrap_fully(obj: &JsObjectRef) -> JsObjectRef {
    let mut flags = 0;
    unwrap_chain(obj, |_| false, &mut flags)
}

/// Remove one wrapper layer unless its handler has a security policy.
/// A non-wrapper is returned unchanged.
pub fn unwrap_one_checked(obj: &JsObjectRef) -> Option<JsObjectRef> {
    let Some(handler) = handler_of(obj) else {
        return Some(obj.maybe_forwarded());
    };
    if !handler.is_wrapper() {
        return Some(obj.maybe_forwarded());
    }
    if handler.has_security_policy() {
        debug!(wrapper = obj.id(), "checked unwrap refused");
        return None;
    }
    wrapped_object(obj)
}

/// Walk the wrapper chain, failing at the first layer with a security policy
pub fn checked_unwrap(
    cx: &Context,
    obj: &JsObjectRef,
    stop_at_window_proxy: bool,
) -> Option<JsObjectRef> {
    let mut current = obj.maybe_forwarded();
    loop {
        if stop_at_window_proxy && is_window_proxy(cx, &current) {
            return Some(current);
        }
        let next = unwrap_one_checked(&current)?;
        if Gc::ptr_eq(&next, &current) {
            return Some(current);
        }
        current = next;
    }
}
