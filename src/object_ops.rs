//! Generic object operations.
//!
//! These implement the internal methods for any object. Native objects use
//! the ordinary algorithms below; proxies go through [`Proxy`], which runs
//! the policy check and the handler. Code elsewhere in the crate never
//! inspects an object's representation to perform a property operation.

use crate::context::Context;
use crate::error::{FailureCode, JsError, ObjectOpResult};
use crate::gc::Gc;
use crate::prelude::*;
use crate::proxy::{EsClass, IsArrayAnswer, PrototypeIfOrdinary, Proxy};
use crate::value::{
    CallArgs, CheapClone, ExoticObject, JsObjectRef, JsString, JsValue, Property,
    PropertyDescriptor, PropertyKey, RegExpData,
};

/// How an object's proxy-ness affects dispatch
enum Kind {
    Native,
    /// Proxy whose prototype is stored on the object
    StaticProxy,
    /// Proxy whose prototype comes from the handler
    LazyProxy,
}

fn kind(obj: &JsObjectRef) -> Kind {
    match obj.borrow().as_proxy() {
        None => Kind::Native,
        Some(data) if data.has_lazy_proto() => Kind::LazyProxy,
        Some(_) => Kind::StaticProxy,
    }
}

fn is_proxy(obj: &JsObjectRef) -> bool {
    !matches!(kind(obj), Kind::Native)
}

fn same_object(a: &Option<JsObjectRef>, b: &Option<JsObjectRef>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => Gc::ptr_eq(a, b),
        _ => false,
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Own properties
// ═══════════════════════════════════════════════════════════════════════════════

/// `[[GetOwnProperty]]`. `None` means the property does not exist.
pub fn get_own_property_descriptor(
    cx: &mut Context,
    obj: &JsObjectRef,
    key: &PropertyKey,
) -> Result<Option<Property>, JsError> {
    if is_proxy(obj) {
        return Proxy::get_own_property_descriptor(cx, obj, key);
    }
    Ok(obj.borrow().get_own_property(key).cloned())
}

/// `[[DefineOwnProperty]]`
pub fn define_property(
    cx: &mut Context,
    obj: &JsObjectRef,
    key: &PropertyKey,
    desc: &PropertyDescriptor,
) -> Result<ObjectOpResult, JsError> {
    if is_proxy(obj) {
        return Proxy::define_property(cx, obj, key, desc);
    }
    ordinary_define_own_property(obj, key, desc)
}

/// Define or throw, for callers that behave like strict-mode code
pub fn define_property_or_throw(
    cx: &mut Context,
    obj: &JsObjectRef,
    key: &PropertyKey,
    desc: &PropertyDescriptor,
) -> Result<(), JsError> {
    define_property(cx, obj, key, desc)?.check_strict(Some(key))
}

/// CreateDataProperty: a writable, enumerable, configurable data property
pub fn create_data_property(
    cx: &mut Context,
    obj: &JsObjectRef,
    key: &PropertyKey,
    value: JsValue,
) -> Result<ObjectOpResult, JsError> {
    define_property(cx, obj, key, &PropertyDescriptor::data(value))
}

/// `[[OwnPropertyKeys]]`: every own key in property order
pub fn own_property_keys(cx: &mut Context, obj: &JsObjectRef) -> Result<Vec<PropertyKey>, JsError> {
    if is_proxy(obj) {
        return Proxy::own_property_keys(cx, obj);
    }
    Ok(obj.borrow().own_keys())
}

/// Key selection for [`get_property_keys`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyFlags(u8);

impl KeyFlags {
    /// Enumerable string keys along the whole prototype chain
    pub const DEFAULT: KeyFlags = KeyFlags(0);
    /// Do not walk the prototype chain
    pub const OWN_ONLY: KeyFlags = KeyFlags(1);
    /// Include non-enumerable keys
    pub const HIDDEN: KeyFlags = KeyFlags(2);
    /// Include symbol keys
    pub const SYMBOLS: KeyFlags = KeyFlags(4);

    pub const fn contains(self, other: KeyFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for KeyFlags {
    type Output = KeyFlags;

    fn bitor(self, rhs: KeyFlags) -> KeyFlags {
        KeyFlags(self.0 | rhs.0)
    }
}

/// Collect keys of `obj` (and its prototypes unless `OWN_ONLY`). Shadowed
/// keys appear once.
pub fn get_property_keys(
    cx: &mut Context,
    obj: &JsObjectRef,
    flags: KeyFlags,
) -> Result<Vec<PropertyKey>, JsError> {
    let mut seen = FxHashSet::default();
    let mut keys = Vec::new();
    let mut current = Some(obj.clone());

    while let Some(o) = current {
        for key in own_property_keys(cx, &o)? {
            if key.is_symbol() && !flags.contains(KeyFlags::SYMBOLS) {
                continue;
            }
            if !seen.insert(key.clone()) {
                continue;
            }
            if flags.contains(KeyFlags::HIDDEN) {
                keys.push(key);
            } else if get_own_property_descriptor(cx, &o, &key)?.is_some_and(|p| p.enumerable) {
                keys.push(key);
            }
        }
        if flags.contains(KeyFlags::OWN_ONLY) {
            break;
        }
        current = get_prototype(cx, &o)?;
    }
    Ok(keys)
}

/// `[[Delete]]`
pub fn delete_property(
    cx: &mut Context,
    obj: &JsObjectRef,
    key: &PropertyKey,
) -> Result<ObjectOpResult, JsError> {
    if is_proxy(obj) {
        return Proxy::delete(cx, obj, key);
    }
    let mut data = obj.borrow_mut();
    match data.get_own_property(key) {
        None => Ok(ObjectOpResult::succeed()),
        Some(prop) if !prop.configurable => Ok(ObjectOpResult::fail(FailureCode::CantDelete)),
        Some(_) => {
            data.remove_own(key);
            Ok(ObjectOpResult::succeed())
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Ordinary [[DefineOwnProperty]]
// ═══════════════════════════════════════════════════════════════════════════════

fn ordinary_define_own_property(
    obj: &JsObjectRef,
    key: &PropertyKey,
    desc: &PropertyDescriptor,
) -> Result<ObjectOpResult, JsError> {
    let is_array = matches!(obj.borrow().exotic, ExoticObject::Array);
    if is_array {
        if key.eq_str("length") {
            return array_set_length(obj, key, desc);
        }
        if let PropertyKey::Index(index) = key {
            let (old_len, len_writable) = array_length(obj);
            if *index >= old_len && !len_writable {
                return Ok(ObjectOpResult::fail(FailureCode::ReadOnly));
            }
            let result = validate_and_apply(obj, key, desc);
            if result.ok() && *index >= old_len {
                write_array_length(obj, index.saturating_add(1));
            }
            return Ok(result);
        }
    }
    Ok(validate_and_apply(obj, key, desc))
}

fn array_length(obj: &JsObjectRef) -> (u32, bool) {
    let data = obj.borrow();
    let length = data
        .properties
        .iter()
        .find(|(k, _)| k.eq_str("length"))
        .map(|(_, p)| p);
    match length {
        Some(prop) => (prop.value.to_number() as u32, prop.writable),
        None => (0, true),
    }
}

fn write_array_length(obj: &JsObjectRef, len: u32) {
    let mut data = obj.borrow_mut();
    data.set_own_value(PropertyKey::from("length"), JsValue::Number(f64::from(len)));
}

/// ArraySetLength: shrinking deletes elements from the end and stops at the
/// first non-configurable one.
fn array_set_length(
    obj: &JsObjectRef,
    key: &PropertyKey,
    desc: &PropertyDescriptor,
) -> Result<ObjectOpResult, JsError> {
    let Some(value) = &desc.value else {
        return Ok(validate_and_apply(obj, key, desc));
    };
    let number = value.to_number();
    let new_len = number as u32;
    if f64::from(new_len) != number {
        return Err(JsError::range_error("invalid array length"));
    }

    let mut new_desc = desc.clone();
    new_desc.value = Some(JsValue::Number(f64::from(new_len)));
    let (old_len, writable) = array_length(obj);
    if new_len >= old_len {
        return Ok(validate_and_apply(obj, key, &new_desc));
    }
    if !writable {
        return Ok(ObjectOpResult::fail(FailureCode::ReadOnly));
    }

    let mut doomed: Vec<u32> = obj
        .borrow()
        .properties
        .keys()
        .filter_map(|k| match k {
            PropertyKey::Index(i) if *i >= new_len => Some(*i),
            _ => None,
        })
        .collect();
    doomed.sort_unstable_by(|a, b| b.cmp(a));

    for index in doomed {
        let mut data = obj.borrow_mut();
        let key = PropertyKey::Index(index);
        if data.get_own_property(&key).is_some_and(|p| !p.configurable) {
            drop(data);
            write_array_length(obj, index + 1);
            return Ok(ObjectOpResult::fail(FailureCode::CantDelete));
        }
        data.remove_own(&key);
    }
    Ok(validate_and_apply(obj, key, &new_desc))
}

/// The failure ValidateAndApplyPropertyDescriptor would report, if any
fn descriptor_conflict(
    extensible: bool,
    desc: &PropertyDescriptor,
    current: Option<&Property>,
) -> Option<FailureCode> {
    let Some(current) = current else {
        return (!extensible).then_some(FailureCode::CantDefinePropObjectNotExtensible);
    };
    if current.configurable {
        return None;
    }
    if desc.configurable == Some(true) {
        return Some(FailureCode::CantRedefineProp);
    }
    if desc.enumerable.is_some_and(|e| e != current.enumerable) {
        return Some(FailureCode::CantRedefineProp);
    }
    if !desc.is_generic_descriptor() && desc.is_accessor_descriptor() != current.is_accessor() {
        return Some(FailureCode::CantRedefineProp);
    }
    if current.is_accessor() {
        if desc.get.as_ref().is_some_and(|g| !same_object(g, &current.getter))
            || desc.set.as_ref().is_some_and(|s| !same_object(s, &current.setter))
        {
            return Some(FailureCode::CantRedefineProp);
        }
    } else if !current.writable {
        if desc.writable == Some(true) {
            return Some(FailureCode::CantRedefineProp);
        }
        if desc.value.as_ref().is_some_and(|v| !v.same_value(&current.value)) {
            return Some(FailureCode::ReadOnly);
        }
    }
    None
}

/// IsCompatiblePropertyDescriptor
pub(crate) fn is_compatible_property_descriptor(
    extensible: bool,
    desc: &PropertyDescriptor,
    current: Option<&Property>,
) -> bool {
    descriptor_conflict(extensible, desc, current).is_none()
}

/// ValidateAndApplyPropertyDescriptor against the current own property
fn validate_and_apply(obj: &JsObjectRef, key: &PropertyKey, desc: &PropertyDescriptor) -> ObjectOpResult {
    let (current, extensible) = {
        let data = obj.borrow();
        (data.get_own_property(key).cloned(), data.extensible)
    };
    if let Some(code) = descriptor_conflict(extensible, desc, current.as_ref()) {
        return ObjectOpResult::fail(code);
    }
    let Some(current) = current else {
        obj.borrow_mut().define_own(key.clone(), desc.to_property());
        return ObjectOpResult::succeed();
    };

    let mut updated = if desc.is_accessor_descriptor() && !current.is_accessor() {
        let mut prop = Property::accessor(None, None);
        prop.enumerable = current.enumerable;
        prop.configurable = current.configurable;
        prop
    } else if desc.is_data_descriptor() && current.is_accessor() {
        Property::with_attributes(JsValue::Undefined, false, current.enumerable, current.configurable)
    } else {
        current
    };

    if let Some(value) = &desc.value {
        updated.value = value.clone();
    }
    if let Some(writable) = desc.writable {
        updated.writable = writable;
    }
    if let Some(getter) = &desc.get {
        updated.getter = getter.clone();
    }
    if let Some(setter) = &desc.set {
        updated.setter = setter.clone();
    }
    if let Some(enumerable) = desc.enumerable {
        updated.enumerable = enumerable;
    }
    if let Some(configurable) = desc.configurable {
        updated.configurable = configurable;
    }

    obj.borrow_mut().define_own(key.clone(), updated);
    ObjectOpResult::succeed()
}

// ═══════════════════════════════════════════════════════════════════════════════
// Prototype
// ═══════════════════════════════════════════════════════════════════════════════

/// `[[GetPrototypeOf]]`
pub fn get_prototype(cx: &mut Context, obj: &JsObjectRef) -> Result<Option<JsObjectRef>, JsError> {
    match kind(obj) {
        Kind::LazyProxy => Proxy::get_prototype(cx, obj),
        Kind::Native | Kind::StaticProxy => Ok(obj.borrow().prototype.clone()),
    }
}

/// `[[SetPrototypeOf]]`
pub fn set_prototype(
    cx: &mut Context,
    obj: &JsObjectRef,
    proto: Option<JsObjectRef>,
) -> Result<ObjectOpResult, JsError> {
    if let Kind::LazyProxy = kind(obj) {
        return Proxy::set_prototype(cx, obj, proto);
    }

    let (current, immutable) = {
        let data = obj.borrow();
        (data.prototype.clone(), data.immutable_prototype)
    };
    if same_object(&current, &proto) {
        return Ok(ObjectOpResult::succeed());
    }
    if immutable || !is_extensible(cx, obj)? {
        return Ok(ObjectOpResult::fail(FailureCode::CantSetProto));
    }

    // Refuse cycles, stopping at the first prototype that is not ordinary.
    let mut walk = proto.clone();
    while let Some(p) = walk {
        if Gc::ptr_eq(&p, obj) {
            return Ok(ObjectOpResult::fail(FailureCode::CantSetProto));
        }
        walk = match get_prototype_if_ordinary(cx, &p)? {
            PrototypeIfOrdinary::Ordinary(next) => next,
            PrototypeIfOrdinary::NotOrdinary => None,
        };
    }

    obj.borrow_mut().set_prototype_slot(proto);
    Ok(ObjectOpResult::succeed())
}

/// `[[GetPrototypeIfOrdinary]]`
pub fn get_prototype_if_ordinary(
    cx: &mut Context,
    obj: &JsObjectRef,
) -> Result<PrototypeIfOrdinary, JsError> {
    match kind(obj) {
        Kind::LazyProxy => Proxy::get_prototype_if_ordinary(cx, obj),
        Kind::Native | Kind::StaticProxy => {
            Ok(PrototypeIfOrdinary::Ordinary(obj.borrow().prototype.clone()))
        }
    }
}

/// `[[SetImmutablePrototype]]`. Returns whether the prototype is now fixed.
pub fn set_immutable_prototype(cx: &mut Context, obj: &JsObjectRef) -> Result<bool, JsError> {
    match kind(obj) {
        Kind::LazyProxy => Proxy::set_immutable_prototype(cx, obj),
        Kind::Native | Kind::StaticProxy => {
            obj.borrow_mut().immutable_prototype = true;
            Ok(true)
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Extensibility
// ═══════════════════════════════════════════════════════════════════════════════

pub fn is_extensible(cx: &mut Context, obj: &JsObjectRef) -> Result<bool, JsError> {
    if is_proxy(obj) {
        return Proxy::is_extensible(cx, obj);
    }
    Ok(obj.borrow().extensible)
}

pub fn prevent_extensions(cx: &mut Context, obj: &JsObjectRef) -> Result<ObjectOpResult, JsError> {
    if is_proxy(obj) {
        return Proxy::prevent_extensions(cx, obj);
    }
    obj.borrow_mut().extensible = false;
    Ok(ObjectOpResult::succeed())
}

// ═══════════════════════════════════════════════════════════════════════════════
// Has / Get / Set
// ═══════════════════════════════════════════════════════════════════════════════

/// `[[HasProperty]]`
pub fn has_property(cx: &mut Context, obj: &JsObjectRef, key: &PropertyKey) -> Result<bool, JsError> {
    let mut current = obj.clone();
    loop {
        if is_proxy(&current) {
            return Proxy::has(cx, &current, key);
        }
        let next = {
            let data = current.borrow();
            if data.get_own_property(key).is_some() {
                return Ok(true);
            }
            data.prototype.clone()
        };
        match next {
            Some(proto) => current = proto,
            None => return Ok(false),
        }
    }
}

pub fn has_own_property(
    cx: &mut Context,
    obj: &JsObjectRef,
    key: &PropertyKey,
) -> Result<bool, JsError> {
    if is_proxy(obj) {
        return Proxy::has_own(cx, obj, key);
    }
    Ok(obj.borrow().get_own_property(key).is_some())
}

/// `[[Get]]` with an explicit receiver
pub fn get_property(
    cx: &mut Context,
    obj: &JsObjectRef,
    receiver: &JsValue,
    key: &PropertyKey,
) -> Result<JsValue, JsError> {
    let mut current = obj.clone();
    loop {
        if is_proxy(&current) {
            return Proxy::get(cx, &current, receiver, key);
        }
        let (own, next) = {
            let data = current.borrow();
            (data.get_own_property(key).cloned(), data.prototype.clone())
        };
        match own {
            Some(prop) if prop.is_accessor() => {
                return match prop.getter {
                    Some(getter) => call_object(cx, &getter, receiver.clone(), Vec::new()),
                    None => Ok(JsValue::Undefined),
                };
            }
            Some(prop) => return Ok(prop.value),
            None => match next {
                Some(proto) => current = proto,
                None => return Ok(JsValue::Undefined),
            },
        }
    }
}

/// `[[Get]]` with the object itself as receiver
pub fn get(cx: &mut Context, obj: &JsObjectRef, key: &PropertyKey) -> Result<JsValue, JsError> {
    get_property(cx, obj, &JsValue::Object(obj.clone()), key)
}

/// `[[Set]]` with an explicit receiver
pub fn set_property(
    cx: &mut Context,
    obj: &JsObjectRef,
    key: &PropertyKey,
    value: JsValue,
    receiver: &JsValue,
) -> Result<ObjectOpResult, JsError> {
    let mut current = obj.clone();
    loop {
        if is_proxy(&current) {
            return Proxy::set(cx, &current, key, value, receiver);
        }
        let (own, next) = {
            let data = current.borrow();
            (data.get_own_property(key).cloned(), data.prototype.clone())
        };
        match (own, next) {
            (None, Some(proto)) => current = proto,
            (own, _) => return set_with_own_descriptor(cx, key, value, receiver, own),
        }
    }
}

/// `[[Set]]` with the object itself as receiver
pub fn set(
    cx: &mut Context,
    obj: &JsObjectRef,
    key: &PropertyKey,
    value: JsValue,
) -> Result<ObjectOpResult, JsError> {
    set_property(cx, obj, key, value, &JsValue::Object(obj.clone()))
}

/// OrdinarySetWithOwnDescriptor: finish a set once the property that
/// governs it (or its absence along the whole chain) is known.
pub fn set_with_own_descriptor(
    cx: &mut Context,
    key: &PropertyKey,
    value: JsValue,
    receiver: &JsValue,
    own: Option<Property>,
) -> Result<ObjectOpResult, JsError> {
    let own = own.unwrap_or_else(|| Property::data(JsValue::Undefined));

    if own.is_accessor() {
        return match own.setter {
            Some(setter) => {
                call_object(cx, &setter, receiver.clone(), vec![value])?;
                Ok(ObjectOpResult::succeed())
            }
            None => Ok(ObjectOpResult::fail(FailureCode::ReadOnly)),
        };
    }
    if !own.writable {
        return Ok(ObjectOpResult::fail(FailureCode::ReadOnly));
    }

    let JsValue::Object(receiver) = receiver else {
        return Ok(ObjectOpResult::fail(FailureCode::ReadOnly));
    };
    match get_own_property_descriptor(cx, receiver, key)? {
        Some(existing) if existing.is_accessor() || !existing.writable => {
            Ok(ObjectOpResult::fail(FailureCode::ReadOnly))
        }
        Some(_) => {
            let desc = PropertyDescriptor {
                value: Some(value),
                ..Default::default()
            };
            define_property(cx, receiver, key, &desc)
        }
        None => create_data_property(cx, receiver, key, value),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Call / Construct
// ═══════════════════════════════════════════════════════════════════════════════

pub fn is_callable(obj: &JsObjectRef) -> bool {
    obj.borrow().is_callable()
}

pub fn is_constructor(obj: &JsObjectRef) -> bool {
    obj.borrow().is_constructor()
}

/// Call any value, failing if it is not callable
pub fn call(
    cx: &mut Context,
    callee: &JsValue,
    this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JsError> {
    match callee {
        JsValue::Object(f) => call_object(cx, f, this, args),
        other => Err(JsError::not_a_function(other.type_of())),
    }
}

pub fn call_object(
    cx: &mut Context,
    f: &JsObjectRef,
    this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JsError> {
    let native = {
        let data = f.borrow();
        match &data.exotic {
            ExoticObject::Function(func) => Some(func.func),
            ExoticObject::Proxy(proxy) if proxy.handler().is_callable(proxy) => None,
            other => return Err(JsError::not_a_function(other.kind_name())),
        }
    };
    let call_args = CallArgs {
        callee: f.clone(),
        this,
        args,
        new_target: None,
    };
    match native {
        Some(func) => func(cx, &call_args),
        None => Proxy::call(cx, f, &call_args),
    }
}

/// `[[Construct]]`. `new_target` defaults to the constructor itself.
pub fn construct(
    cx: &mut Context,
    f: &JsObjectRef,
    args: Vec<JsValue>,
    new_target: Option<&JsObjectRef>,
) -> Result<JsObjectRef, JsError> {
    if !is_constructor(f) {
        return Err(JsError::not_a_constructor(f.borrow().exotic.kind_name()));
    }
    let new_target = new_target.unwrap_or(f).clone();

    if is_proxy(f) {
        let call_args = CallArgs {
            callee: f.clone(),
            this: JsValue::Undefined,
            args,
            new_target: Some(new_target),
        };
        return Proxy::construct(cx, f, &call_args);
    }

    let prototype_key = PropertyKey::String(cx.atoms.prototype.cheap_clone());
    let proto = match get(cx, &new_target, &prototype_key)? {
        JsValue::Object(proto) => proto,
        _ => cx.object_prototype.clone(),
    };
    let this = cx.create_object_with_proto(Some(proto));

    let func = match &f.borrow().exotic {
        ExoticObject::Function(func) => func.func,
        other => return Err(JsError::not_a_constructor(other.kind_name())),
    };
    let call_args = CallArgs {
        callee: f.clone(),
        this: JsValue::Object(this.clone()),
        args,
        new_target: Some(new_target),
    };
    match func(cx, &call_args)? {
        JsValue::Object(result) => Ok(result),
        _ => Ok(this),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Introspection
// ═══════════════════════════════════════════════════════════════════════════════

/// IsArray, looking through proxies
pub fn is_array(cx: &mut Context, obj: &JsObjectRef) -> Result<bool, JsError> {
    if is_proxy(obj) {
        return match Proxy::is_array(cx, obj)? {
            IsArrayAnswer::Array => Ok(true),
            IsArrayAnswer::NotArray => Ok(false),
            IsArrayAnswer::RevokedProxy => {
                Err(JsError::type_error("can't perform IsArray on a revoked proxy"))
            }
        };
    }
    Ok(matches!(obj.borrow().exotic, ExoticObject::Array))
}

pub fn get_builtin_class(cx: &mut Context, obj: &JsObjectRef) -> Result<EsClass, JsError> {
    if is_proxy(obj) {
        return Proxy::get_builtin_class(cx, obj);
    }
    Ok(match &obj.borrow().exotic {
        ExoticObject::Ordinary => EsClass::Object,
        ExoticObject::Array => EsClass::Array,
        ExoticObject::Function(_) => EsClass::Function,
        ExoticObject::Boolean(_) => EsClass::Boolean,
        ExoticObject::Number(_) => EsClass::Number,
        ExoticObject::String(_) => EsClass::String,
        ExoticObject::RegExp(_) => EsClass::RegExp,
        ExoticObject::Environment(_) | ExoticObject::Module(_) | ExoticObject::Proxy(_) => {
            EsClass::Other
        }
    })
}

pub fn class_name(cx: &mut Context, obj: &JsObjectRef) -> Result<&'static str, JsError> {
    if is_proxy(obj) {
        return Proxy::class_name(cx, obj);
    }
    Ok(obj.borrow().exotic.kind_name())
}

/// Function.prototype.toString
pub fn fun_to_string(
    cx: &mut Context,
    obj: &JsObjectRef,
    is_to_source: bool,
) -> Result<JsString, JsError> {
    if is_proxy(obj) {
        return Proxy::fun_to_string(cx, obj, is_to_source);
    }
    match &obj.borrow().exotic {
        ExoticObject::Function(func) => Ok(JsString::from(format!(
            "function {}() {{\n    [native code]\n}}",
            func.name
        ))),
        _ => Err(JsError::type_error(
            "Function.prototype.toString called on incompatible object",
        )),
    }
}

/// Primitive value of a boxed Boolean, Number or String
pub fn unbox(cx: &mut Context, obj: &JsObjectRef) -> Result<Option<JsValue>, JsError> {
    if is_proxy(obj) {
        return Proxy::boxed_value_unbox(cx, obj);
    }
    Ok(match &obj.borrow().exotic {
        ExoticObject::Boolean(b) => Some(JsValue::Boolean(*b)),
        ExoticObject::Number(n) => Some(JsValue::Number(*n)),
        ExoticObject::String(s) => Some(JsValue::String(s.cheap_clone())),
        _ => None,
    })
}

/// The compiled pattern behind a RegExp object
pub fn regexp_source(cx: &mut Context, obj: &JsObjectRef) -> Result<Option<RegExpData>, JsError> {
    if is_proxy(obj) {
        return Proxy::regexp_to_shared(cx, obj);
    }
    Ok(match &obj.borrow().exotic {
        ExoticObject::RegExp(re) => Some(re.clone()),
        _ => None,
    })
}

/// `value instanceof obj`, without consulting `@@hasInstance`
pub fn has_instance(cx: &mut Context, obj: &JsObjectRef, value: &JsValue) -> Result<bool, JsError> {
    if is_proxy(obj) {
        return Proxy::has_instance(cx, obj, value);
    }
    if !is_callable(obj) {
        return Err(JsError::type_error("invalid 'instanceof' operand"));
    }
    ordinary_has_instance(cx, obj, value)
}

/// OrdinaryHasInstance
pub fn ordinary_has_instance(
    cx: &mut Context,
    ctor: &JsObjectRef,
    value: &JsValue,
) -> Result<bool, JsError> {
    if !is_callable(ctor) {
        return Ok(false);
    }
    let JsValue::Object(obj) = value else {
        return Ok(false);
    };
    let prototype_key = PropertyKey::String(cx.atoms.prototype.cheap_clone());
    let JsValue::Object(proto) = get(cx, ctor, &prototype_key)? else {
        return Err(JsError::type_error(
            "'prototype' property of the constructor is not an object",
        ));
    };

    let mut current = get_prototype(cx, obj)?;
    while let Some(p) = current {
        if Gc::ptr_eq(&p, &proto) {
            return Ok(true);
        }
        current = get_prototype(cx, &p)?;
    }
    Ok(false)
}

/// Keys visited by `for-in`
pub fn enumerate(cx: &mut Context, obj: &JsObjectRef) -> Result<Vec<PropertyKey>, JsError> {
    if is_proxy(obj) {
        return Proxy::enumerate(cx, obj);
    }
    enumerate_keys_generic(cx, obj)
}

/// Enumerable string keys of `obj` and its prototypes, built only from
/// generic operations so it also works for proxies.
pub fn enumerate_keys_generic(
    cx: &mut Context,
    obj: &JsObjectRef,
) -> Result<Vec<PropertyKey>, JsError> {
    get_property_keys(cx, obj, KeyFlags::DEFAULT)
}
