//! Proxy object layout: handler, private slot and reserved slots.

use tracing::debug;

use crate::context::Context;
use crate::error::JsError;
use crate::gc::{Gc, GcPtr, Generation};
use crate::value::{ExoticObject, HeapValue, JsObject, JsObjectRef, JsValue};

use super::handler::ProxyHandler;

/// Static description of a kind of proxy object.
///
/// The reserved slot count is fixed here and checked at compile time.
#[derive(Debug)]
pub struct ProxyClass {
    pub name: &'static str,
    reserved_slots: usize,
}

impl ProxyClass {
    pub const fn new<const SLOTS: usize>(name: &'static str) -> Self {
        const {
            assert!(SLOTS >= 1, "proxy classes need at least one reserved slot");
        }
        Self {
            name,
            reserved_slots: SLOTS,
        }
    }

    pub const fn reserved_slots(&self) -> usize {
        self.reserved_slots
    }
}

/// Class used when [`ProxyOptions`] does not name one
pub static PROXY_CLASS: ProxyClass = ProxyClass::new::<2>("Proxy");

/// Creation options for [`new_proxy_object`]
#[derive(Debug, Clone, Copy)]
pub struct ProxyOptions {
    pub class: &'static ProxyClass,
    /// The prototype is computed by the handler instead of stored
    pub lazy_proto: bool,
    /// Hint that only one object of this shape will exist
    pub singleton: bool,
}

impl ProxyOptions {
    pub fn new() -> Self {
        Self {
            class: &PROXY_CLASS,
            lazy_proto: false,
            singleton: false,
        }
    }

    pub fn with_class(mut self, class: &'static ProxyClass) -> Self {
        self.class = class;
        self
    }

    pub fn with_lazy_proto(mut self, lazy: bool) -> Self {
        self.lazy_proto = lazy;
        self
    }

    pub fn with_singleton(mut self, singleton: bool) -> Self {
        self.singleton = singleton;
        self
    }
}

impl Default for ProxyOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// Proxy payload of a [`JsObject`].
///
/// A static prototype lives in the object's ordinary prototype field; a
/// lazy one is always asked of the handler.
pub struct ProxyData {
    handler: &'static dyn ProxyHandler,
    private: HeapValue,
    reserved: Box<[HeapValue]>,
    class: &'static ProxyClass,
    lazy_proto: bool,
    singleton: bool,
}

impl ProxyData {
    fn new(
        handler: &'static dyn ProxyHandler,
        private: JsValue,
        options: &ProxyOptions,
    ) -> Self {
        let reserved = (0..options.class.reserved_slots())
            .map(|_| HeapValue::default())
            .collect();
        Self {
            handler,
            private: HeapValue::new(private),
            reserved,
            class: options.class,
            lazy_proto: options.lazy_proto,
            singleton: options.singleton,
        }
    }

    #[inline]
    pub fn handler(&self) -> &'static dyn ProxyHandler {
        self.handler
    }

    #[inline]
    pub fn private(&self) -> &JsValue {
        self.private.get()
    }

    /// The private slot as an object, which is the target for wrappers
    pub fn target(&self) -> Option<&JsObjectRef> {
        self.private.object()
    }

    pub fn set_private(&mut self, value: JsValue) {
        self.private.set(value);
    }

    pub fn reserved_slot(&self, n: usize) -> Option<&JsValue> {
        self.reserved.get(n).map(HeapValue::get)
    }

    pub fn set_reserved_slot(&mut self, n: usize, value: JsValue) -> Result<(), JsError> {
        let count = self.reserved.len();
        match self.reserved.get_mut(n) {
            Some(slot) => {
                slot.set(value);
                Ok(())
            }
            None => Err(JsError::range_error(format!(
                "reserved slot {} out of range for {} ({} slots)",
                n, self.class.name, count
            ))),
        }
    }

    pub fn reserved_slot_count(&self) -> usize {
        self.reserved.len()
    }

    pub fn class(&self) -> &'static ProxyClass {
        self.class
    }

    pub fn has_lazy_proto(&self) -> bool {
        self.lazy_proto
    }

    pub fn is_singleton(&self) -> bool {
        self.singleton
    }

    pub(crate) fn trace(&self, visitor: &mut dyn FnMut(GcPtr<JsObject>)) {
        self.private.trace(visitor);
        for slot in self.reserved.iter() {
            slot.trace(visitor);
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Creation and in-place mutation
// ═══════════════════════════════════════════════════════════════════════════════

/// Create a proxy object.
///
/// `proto` is only meaningful for a static prototype; lazy-prototype proxies
/// must be created without one.
pub fn new_proxy_object(
    cx: &mut Context,
    handler: &'static dyn ProxyHandler,
    private: JsValue,
    proto: Option<JsObjectRef>,
    options: &ProxyOptions,
) -> Result<JsObjectRef, JsError> {
    if options.lazy_proto && proto.is_some() {
        return Err(JsError::internal_error(
            "a proxy with a lazy prototype cannot be given a static one",
        ));
    }

    let generation = if handler.can_nursery_allocate() && !options.singleton {
        Generation::Nursery
    } else {
        Generation::Tenured
    };

    let mut data = JsObject::new();
    data.prototype = proto;
    data.exotic = ExoticObject::Proxy(ProxyData::new(handler, private, options));
    let proxy = cx.alloc(data, generation);
    debug!(
        proxy = proxy.id(),
        class = options.class.name,
        lazy_proto = options.lazy_proto,
        "proxy created"
    );
    Ok(proxy)
}

/// Give an existing lazy-prototype proxy a new handler and private value,
/// clearing its reserved slots. The object keeps its identity.
pub fn renew_proxy(
    obj: &JsObjectRef,
    handler: &'static dyn ProxyHandler,
    private: JsValue,
) -> Result<(), JsError> {
    let mut data = obj.borrow_mut();
    let Some(proxy) = data.as_proxy_mut() else {
        return Err(JsError::type_error("renew_proxy called on a non-proxy object"));
    };
    if !proxy.lazy_proto {
        return Err(JsError::internal_error(
            "only proxies with a lazy prototype can be renewed",
        ));
    }
    proxy.handler = handler;
    proxy.private.set(private);
    for slot in proxy.reserved.iter_mut() {
        slot.set(JsValue::Undefined);
    }
    debug!(proxy = obj.id(), "proxy renewed");
    Ok(())
}

/// Exchange the contents of two objects so each handle now sees the other
/// object's state. Both must agree on whether they finalize in the background.
pub fn swap_objects(cx: &mut Context, a: &JsObjectRef, b: &JsObjectRef) -> Result<(), JsError> {
    use crate::gc::Traceable;

    if Gc::ptr_eq(a, b) {
        return Ok(());
    }
    debug_assert_eq!(
        a.borrow().finalize_in_background(),
        b.borrow().finalize_in_background(),
        "swapped objects must share a finalization kind"
    );
    if !cx.heap().swap(a, b) {
        return Err(JsError::internal_error("cannot swap an object that is in use"));
    }
    debug!(a = a.id(), b = b.id(), "objects swapped");
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════════
// Accessors
// ═══════════════════════════════════════════════════════════════════════════════

pub fn is_proxy(obj: &JsObjectRef) -> bool {
    obj.borrow().as_proxy().is_some()
}

pub fn is_scripted_proxy(obj: &JsObjectRef) -> bool {
    handler_of(obj).is_some_and(|handler| handler.is_scripted())
}

/// Whether `obj` is a proxy whose handler forwards to a target
pub fn is_wrapper(obj: &JsObjectRef) -> bool {
    handler_of(obj).is_some_and(|handler| handler.is_wrapper())
}

pub fn handler_of(obj: &JsObjectRef) -> Option<&'static dyn ProxyHandler> {
    obj.borrow().as_proxy().map(ProxyData::handler)
}

pub fn proxy_private(obj: &JsObjectRef) -> Option<JsValue> {
    obj.borrow().as_proxy().map(|data| data.private().clone())
}

pub fn set_proxy_private(obj: &JsObjectRef, value: JsValue) -> Result<(), JsError> {
    let mut data = obj.borrow_mut();
    let proxy = data
        .as_proxy_mut()
        .ok_or_else(|| JsError::type_error("not a proxy"))?;
    proxy.set_private(value);
    Ok(())
}

pub fn proxy_reserved_slot(obj: &JsObjectRef, n: usize) -> Option<JsValue> {
    obj.borrow()
        .as_proxy()
        .and_then(|data| data.reserved_slot(n).cloned())
}

pub fn set_proxy_reserved_slot(obj: &JsObjectRef, n: usize, value: JsValue) -> Result<(), JsError> {
    let mut data = obj.borrow_mut();
    let proxy = data
        .as_proxy_mut()
        .ok_or_else(|| JsError::type_error("not a proxy"))?;
    proxy.set_reserved_slot(n, value)
}
