//! JavaScript value representation
//!
//! `JsValue`, property keys and descriptors, and the heap object type that
//! native objects, environments, proxies and module records share.

use std::fmt;
use std::rc::Rc;

use crate::context::Context;
use crate::error::JsError;
use crate::gc::{Gc, GcPtr, Reset, Traceable};
use crate::module::ModuleRecord;
use crate::prelude::{IndexMap, index_map_new};
use crate::proxy::ProxyData;

/// Trait for types that have cheap (O(1), reference-counted) clones.
///
/// Regular `.clone()` still works; `cheap_clone()` documents at the call
/// site that only a count is bumped.
pub trait CheapClone: Clone {
    fn cheap_clone(&self) -> Self {
        self.clone()
    }
}

impl<T: ?Sized> CheapClone for Rc<T> {}

/// Internal sentinel values that never escape to script
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MagicValue {
    /// A let/const/class binding whose declaration has not run yet
    UninitializedLexical,
}

/// A JavaScript value
#[derive(Clone, Default)]
pub enum JsValue {
    #[default]
    Undefined,
    Null,
    Boolean(bool),
    Number(f64),
    String(JsString),
    Symbol(JsSymbol),
    Object(JsObjectRef),
    Magic(MagicValue),
}

impl JsValue {
    pub fn is_null_or_undefined(&self) -> bool {
        matches!(self, JsValue::Null | JsValue::Undefined)
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, JsValue::Undefined)
    }

    pub fn is_object(&self) -> bool {
        matches!(self, JsValue::Object(_))
    }

    pub fn as_object(&self) -> Option<&JsObjectRef> {
        match self {
            JsValue::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn is_magic(&self, which: MagicValue) -> bool {
        matches!(self, JsValue::Magic(m) if *m == which)
    }

    /// Get the typeof result for this value
    pub fn type_of(&self) -> &'static str {
        match self {
            JsValue::Undefined | JsValue::Magic(_) => "undefined",
            JsValue::Null => "object",
            JsValue::Boolean(_) => "boolean",
            JsValue::Number(_) => "number",
            JsValue::String(_) => "string",
            JsValue::Symbol(_) => "symbol",
            JsValue::Object(obj) => {
                if obj.borrow().is_callable() {
                    "function"
                } else {
                    "object"
                }
            }
        }
    }

    /// Convert to boolean (ToBoolean)
    pub fn to_boolean(&self) -> bool {
        match self {
            JsValue::Undefined | JsValue::Null | JsValue::Magic(_) => false,
            JsValue::Boolean(b) => *b,
            JsValue::Number(n) => *n != 0.0 && !n.is_nan(),
            JsValue::String(s) => !s.is_empty(),
            JsValue::Symbol(_) | JsValue::Object(_) => true,
        }
    }

    /// Convert to number (ToNumber), without invoking ToPrimitive on objects
    pub fn to_number(&self) -> f64 {
        match self {
            JsValue::Undefined | JsValue::Magic(_) => f64::NAN,
            JsValue::Null => 0.0,
            JsValue::Boolean(b) => f64::from(u8::from(*b)),
            JsValue::Number(n) => *n,
            JsValue::String(s) => {
                let trimmed = s.as_str().trim();
                if trimmed.is_empty() {
                    0.0
                } else {
                    trimmed.parse::<f64>().unwrap_or(f64::NAN)
                }
            }
            JsValue::Symbol(_) | JsValue::Object(_) => f64::NAN,
        }
    }

    /// Convert to string (ToString), without invoking ToPrimitive on objects
    pub fn to_js_string(&self) -> JsString {
        match self {
            JsValue::Undefined => JsString::from("undefined"),
            JsValue::Null => JsString::from("null"),
            JsValue::Boolean(b) => JsString::from(if *b { "true" } else { "false" }),
            JsValue::Number(n) => JsString::from(number_to_string(*n)),
            JsValue::String(s) => s.cheap_clone(),
            JsValue::Symbol(s) => JsString::from(s.to_string()),
            JsValue::Object(_) => JsString::from("[object Object]"),
            JsValue::Magic(_) => JsString::from("[magic]"),
        }
    }

    /// Strict equality (===)
    pub fn strict_equals(&self, other: &JsValue) -> bool {
        match (self, other) {
            (JsValue::Undefined, JsValue::Undefined) | (JsValue::Null, JsValue::Null) => true,
            (JsValue::Boolean(a), JsValue::Boolean(b)) => a == b,
            (JsValue::Number(a), JsValue::Number(b)) => a == b,
            (JsValue::String(a), JsValue::String(b)) => a == b,
            (JsValue::Symbol(a), JsValue::Symbol(b)) => a == b,
            (JsValue::Object(a), JsValue::Object(b)) => Gc::ptr_eq(a, b),
            (JsValue::Magic(a), JsValue::Magic(b)) => a == b,
            _ => false,
        }
    }

    /// SameValue: like `===` but NaN equals NaN and +0 differs from -0
    pub fn same_value(&self, other: &JsValue) -> bool {
        match (self, other) {
            (JsValue::Number(a), JsValue::Number(b)) => {
                (a.is_nan() && b.is_nan()) || (a == b && a.is_sign_negative() == b.is_sign_negative())
            }
            _ => self.strict_equals(other),
        }
    }
}

fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n == 0.0 {
        "0".to_string()
    } else {
        n.to_string()
    }
}

impl fmt::Debug for JsValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JsValue::Undefined => write!(f, "undefined"),
            JsValue::Null => write!(f, "null"),
            JsValue::Boolean(b) => write!(f, "{}", b),
            JsValue::Number(n) => write!(f, "{}", n),
            JsValue::String(s) => write!(f, "{:?}", s),
            JsValue::Symbol(s) => write!(f, "{}", s),
            JsValue::Magic(m) => write!(f, "<{:?}>", m),
            JsValue::Object(obj) => match obj.try_borrow_mut() {
                Some(data) => write!(f, "[object {}#{}]", data.exotic.kind_name(), obj.id()),
                None => write!(f, "[object #{}]", obj.id()),
            },
        }
    }
}

impl PartialEq for JsValue {
    fn eq(&self, other: &Self) -> bool {
        self.strict_equals(other)
    }
}

impl From<bool> for JsValue {
    fn from(b: bool) -> Self {
        JsValue::Boolean(b)
    }
}

impl From<f64> for JsValue {
    fn from(n: f64) -> Self {
        JsValue::Number(n)
    }
}

impl From<i32> for JsValue {
    fn from(n: i32) -> Self {
        JsValue::Number(f64::from(n))
    }
}

impl From<&str> for JsValue {
    fn from(s: &str) -> Self {
        JsValue::String(JsString::from(s))
    }
}

impl From<String> for JsValue {
    fn from(s: String) -> Self {
        JsValue::String(JsString::from(s))
    }
}

impl From<JsString> for JsValue {
    fn from(s: JsString) -> Self {
        JsValue::String(s)
    }
}

impl From<JsObjectRef> for JsValue {
    fn from(obj: JsObjectRef) -> Self {
        JsValue::Object(obj)
    }
}

impl From<Option<JsObjectRef>> for JsValue {
    fn from(obj: Option<JsObjectRef>) -> Self {
        obj.map_or(JsValue::Null, JsValue::Object)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Strings and symbols
// ═══════════════════════════════════════════════════════════════════════════════

/// Reference-counted string
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JsString(Rc<str>);

impl CheapClone for JsString {}

impl JsString {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl AsRef<str> for JsString {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for JsString {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for JsString {
    fn eq(&self, other: &str) -> bool {
        self.0.as_ref() == other
    }
}

impl PartialEq<&str> for JsString {
    fn eq(&self, other: &&str) -> bool {
        self.0.as_ref() == *other
    }
}

impl From<&str> for JsString {
    fn from(s: &str) -> Self {
        JsString(s.into())
    }
}

impl From<String> for JsString {
    fn from(s: String) -> Self {
        JsString(s.into())
    }
}

impl fmt::Debug for JsString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\"", self.0)
    }
}

impl fmt::Display for JsString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl serde::Serialize for JsString {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

/// Symbols compare by id; the description is informational.
#[derive(Clone, Debug)]
pub struct JsSymbol {
    id: u64,
    pub description: Option<JsString>,
}

impl JsSymbol {
    pub fn new(id: u64, description: Option<JsString>) -> Self {
        Self { id, description }
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

impl PartialEq for JsSymbol {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for JsSymbol {}

impl std::hash::Hash for JsSymbol {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for JsSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.description {
            Some(desc) => write!(f, "Symbol({})", desc),
            None => write!(f, "Symbol()"),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Property keys and descriptors
// ═══════════════════════════════════════════════════════════════════════════════

/// Property key (string, array index, or symbol)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PropertyKey {
    String(JsString),
    Index(u32),
    Symbol(JsSymbol),
}

impl PropertyKey {
    /// ToPropertyKey for primitives
    pub fn from_value(value: &JsValue) -> Self {
        match value {
            JsValue::Symbol(s) => PropertyKey::Symbol(s.clone()),
            JsValue::String(s) => PropertyKey::from(s.cheap_clone()),
            other => PropertyKey::from(other.to_js_string()),
        }
    }

    pub fn is_symbol(&self) -> bool {
        matches!(self, PropertyKey::Symbol(_))
    }

    /// Check if this key equals a string literal (avoids allocation)
    #[inline]
    pub fn eq_str(&self, s: &str) -> bool {
        match self {
            PropertyKey::String(js_str) => js_str.as_str() == s,
            PropertyKey::Index(i) => s.parse::<u32>().is_ok_and(|n| n == *i),
            PropertyKey::Symbol(_) => false,
        }
    }

    pub fn to_value(&self) -> JsValue {
        match self {
            PropertyKey::String(s) => JsValue::String(s.cheap_clone()),
            PropertyKey::Index(i) => JsValue::String(JsString::from(i.to_string())),
            PropertyKey::Symbol(s) => JsValue::Symbol(s.clone()),
        }
    }

    /// The key as a string, if it is not a symbol
    pub fn to_js_string(&self) -> Option<JsString> {
        match self {
            PropertyKey::String(s) => Some(s.cheap_clone()),
            PropertyKey::Index(i) => Some(JsString::from(i.to_string())),
            PropertyKey::Symbol(_) => None,
        }
    }
}

fn canonical_index(s: &str) -> Option<u32> {
    let first = s.bytes().next()?;
    if !first.is_ascii_digit() || (first == b'0' && s.len() > 1) {
        return None;
    }
    s.parse::<u32>().ok().filter(|idx| *idx != u32::MAX)
}

impl From<&str> for PropertyKey {
    fn from(s: &str) -> Self {
        match canonical_index(s) {
            Some(idx) => PropertyKey::Index(idx),
            None => PropertyKey::String(JsString::from(s)),
        }
    }
}

impl From<JsString> for PropertyKey {
    fn from(s: JsString) -> Self {
        match canonical_index(s.as_str()) {
            Some(idx) => PropertyKey::Index(idx),
            None => PropertyKey::String(s),
        }
    }
}

impl From<u32> for PropertyKey {
    fn from(idx: u32) -> Self {
        PropertyKey::Index(idx)
    }
}

impl From<JsSymbol> for PropertyKey {
    fn from(sym: JsSymbol) -> Self {
        PropertyKey::Symbol(sym)
    }
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyKey::String(s) => write!(f, "{}", s),
            PropertyKey::Index(i) => write!(f, "{}", i),
            PropertyKey::Symbol(s) => write!(f, "{}", s),
        }
    }
}

/// A complete property as stored on an object.
///
/// For accessors `value` and `writable` are ignored; either accessor
/// function may be absent.
#[derive(Debug, Clone)]
pub struct Property {
    pub value: JsValue,
    pub writable: bool,
    pub enumerable: bool,
    pub configurable: bool,
    pub getter: Option<JsObjectRef>,
    pub setter: Option<JsObjectRef>,
    pub accessor: bool,
}

impl Property {
    /// Writable, enumerable, configurable data property
    pub fn data(value: JsValue) -> Self {
        Self::with_attributes(value, true, true, true)
    }

    pub fn with_attributes(
        value: JsValue,
        writable: bool,
        enumerable: bool,
        configurable: bool,
    ) -> Self {
        Self {
            value,
            writable,
            enumerable,
            configurable,
            getter: None,
            setter: None,
            accessor: false,
        }
    }

    pub fn accessor(getter: Option<JsObjectRef>, setter: Option<JsObjectRef>) -> Self {
        Self {
            value: JsValue::Undefined,
            writable: false,
            enumerable: true,
            configurable: true,
            getter,
            setter,
            accessor: true,
        }
    }

    pub fn is_accessor(&self) -> bool {
        self.accessor
    }

    fn barrier(&self) {
        write_barrier(&self.value);
        if let Some(g) = &self.getter {
            g.write_barrier();
        }
        if let Some(s) = &self.setter {
            s.write_barrier();
        }
    }
}

/// A partial descriptor, as passed to `[[DefineOwnProperty]]`.
///
/// `None` fields are absent. For `get`/`set`, `Some(None)` means present
/// and undefined.
#[derive(Debug, Clone, Default)]
pub struct PropertyDescriptor {
    pub value: Option<JsValue>,
    pub writable: Option<bool>,
    pub get: Option<Option<JsObjectRef>>,
    pub set: Option<Option<JsObjectRef>>,
    pub enumerable: Option<bool>,
    pub configurable: Option<bool>,
}

impl PropertyDescriptor {
    /// `{ value, writable: true, enumerable: true, configurable: true }`
    pub fn data(value: JsValue) -> Self {
        Self::data_with(value, true, true, true)
    }

    pub fn data_with(value: JsValue, writable: bool, enumerable: bool, configurable: bool) -> Self {
        Self {
            value: Some(value),
            writable: Some(writable),
            enumerable: Some(enumerable),
            configurable: Some(configurable),
            get: None,
            set: None,
        }
    }

    pub fn accessor(
        get: Option<JsObjectRef>,
        set: Option<JsObjectRef>,
        enumerable: bool,
        configurable: bool,
    ) -> Self {
        Self {
            get: Some(get),
            set: Some(set),
            enumerable: Some(enumerable),
            configurable: Some(configurable),
            value: None,
            writable: None,
        }
    }

    pub fn is_accessor_descriptor(&self) -> bool {
        self.get.is_some() || self.set.is_some()
    }

    pub fn is_data_descriptor(&self) -> bool {
        self.value.is_some() || self.writable.is_some()
    }

    pub fn is_generic_descriptor(&self) -> bool {
        !self.is_accessor_descriptor() && !self.is_data_descriptor()
    }

    /// Fill absent fields with their defaults
    pub fn to_property(&self) -> Property {
        if self.is_accessor_descriptor() {
            Property {
                value: JsValue::Undefined,
                writable: false,
                enumerable: self.enumerable.unwrap_or(false),
                configurable: self.configurable.unwrap_or(false),
                getter: self.get.clone().flatten(),
                setter: self.set.clone().flatten(),
                accessor: true,
            }
        } else {
            Property::with_attributes(
                self.value.clone().unwrap_or_default(),
                self.writable.unwrap_or(false),
                self.enumerable.unwrap_or(false),
                self.configurable.unwrap_or(false),
            )
        }
    }
}

impl From<&Property> for PropertyDescriptor {
    fn from(prop: &Property) -> Self {
        if prop.is_accessor() {
            PropertyDescriptor::accessor(
                prop.getter.clone(),
                prop.setter.clone(),
                prop.enumerable,
                prop.configurable,
            )
        } else {
            PropertyDescriptor::data_with(
                prop.value.clone(),
                prop.writable,
                prop.enumerable,
                prop.configurable,
            )
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// HeapValue - barriered slot
// ═══════════════════════════════════════════════════════════════════════════════

/// Run the write barrier for a value about to be stored or overwritten
#[inline]
pub fn write_barrier(value: &JsValue) {
    if let JsValue::Object(obj) = value {
        obj.write_barrier();
    }
}

/// A traced value slot. Every store goes through the write barrier.
#[derive(Debug, Clone, Default)]
pub struct HeapValue(JsValue);

impl HeapValue {
    /// Initialize a slot in an object that is not yet reachable
    pub fn new(value: JsValue) -> Self {
        HeapValue(value)
    }

    pub fn get(&self) -> &JsValue {
        &self.0
    }

    pub fn set(&mut self, value: JsValue) {
        write_barrier(&self.0);
        write_barrier(&value);
        self.0 = value;
    }

    /// The stored object, if any
    pub fn object(&self) -> Option<&JsObjectRef> {
        self.0.as_object()
    }

    pub fn trace(&self, visitor: &mut dyn FnMut(GcPtr<JsObject>)) {
        trace_value(&self.0, visitor);
    }
}

pub(crate) fn trace_value(value: &JsValue, visitor: &mut dyn FnMut(GcPtr<JsObject>)) {
    if let JsValue::Object(obj) = value {
        visitor(obj.copy_ref());
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Objects
// ═══════════════════════════════════════════════════════════════════════════════

/// Reference to a heap-allocated object (GC-managed)
pub type JsObjectRef = Gc<JsObject>;

impl<T: Default + Reset + Traceable> CheapClone for Gc<T> {}

/// A heap object: an ordinary property table plus exotic state
pub struct JsObject {
    /// Prototype link (for proxies with a lazy prototype this stays None)
    pub prototype: Option<JsObjectRef>,
    pub extensible: bool,
    /// Set by `[[SetImmutablePrototype]]`
    pub immutable_prototype: bool,
    /// Own properties in definition order
    pub properties: IndexMap<PropertyKey, Property>,
    pub exotic: ExoticObject,
}

impl JsObject {
    pub fn new() -> Self {
        Self {
            prototype: None,
            extensible: true,
            immutable_prototype: false,
            properties: index_map_new(),
            exotic: ExoticObject::Ordinary,
        }
    }

    pub fn is_callable(&self) -> bool {
        match &self.exotic {
            ExoticObject::Function(_) => true,
            ExoticObject::Proxy(data) => data.handler().is_callable(data),
            _ => false,
        }
    }

    pub fn is_constructor(&self) -> bool {
        match &self.exotic {
            ExoticObject::Function(f) => f.constructor,
            ExoticObject::Proxy(data) => data.handler().is_constructor(data),
            _ => false,
        }
    }

    pub fn get_own_property(&self, key: &PropertyKey) -> Option<&Property> {
        self.properties.get(key)
    }

    /// Insert or replace an own property
    pub fn define_own(&mut self, key: PropertyKey, prop: Property) {
        prop.barrier();
        if let Some(old) = self.properties.insert(key, prop) {
            old.barrier();
        }
    }

    /// Overwrite the value of an existing data property, or add a default one
    pub fn set_own_value(&mut self, key: PropertyKey, value: JsValue) {
        write_barrier(&value);
        match self.properties.get_mut(&key) {
            Some(prop) => {
                write_barrier(&prop.value);
                prop.value = value;
            }
            None => {
                self.properties.insert(key, Property::data(value));
            }
        }
    }

    pub fn remove_own(&mut self, key: &PropertyKey) -> Option<Property> {
        let removed = self.properties.shift_remove(key);
        if let Some(prop) = &removed {
            prop.barrier();
        }
        removed
    }

    pub fn set_prototype_slot(&mut self, proto: Option<JsObjectRef>) {
        if let Some(old) = &self.prototype {
            old.write_barrier();
        }
        if let Some(new) = &proto {
            new.write_barrier();
        }
        self.prototype = proto;
    }

    /// OrdinaryOwnPropertyKeys: integer keys ascending, then strings and
    /// symbols in definition order
    pub fn own_keys(&self) -> Vec<PropertyKey> {
        let mut indices: Vec<u32> = self
            .properties
            .keys()
            .filter_map(|k| match k {
                PropertyKey::Index(i) => Some(*i),
                _ => None,
            })
            .collect();
        indices.sort_unstable();

        let mut keys: Vec<PropertyKey> = indices.into_iter().map(PropertyKey::Index).collect();
        keys.extend(
            self.properties
                .keys()
                .filter(|k| matches!(k, PropertyKey::String(_)))
                .cloned(),
        );
        keys.extend(self.properties.keys().filter(|k| k.is_symbol()).cloned());
        keys
    }

    pub fn as_proxy(&self) -> Option<&ProxyData> {
        match &self.exotic {
            ExoticObject::Proxy(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_proxy_mut(&mut self) -> Option<&mut ProxyData> {
        match &mut self.exotic {
            ExoticObject::Proxy(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_environment(&self) -> Option<&EnvironmentData> {
        match &self.exotic {
            ExoticObject::Environment(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_environment_mut(&mut self) -> Option<&mut EnvironmentData> {
        match &mut self.exotic {
            ExoticObject::Environment(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_module(&self) -> Option<&ModuleRecord> {
        match &self.exotic {
            ExoticObject::Module(record) => Some(record),
            _ => None,
        }
    }

    pub fn as_module_mut(&mut self) -> Option<&mut ModuleRecord> {
        match &mut self.exotic {
            ExoticObject::Module(record) => Some(record),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&NativeFunction> {
        match &self.exotic {
            ExoticObject::Function(f) => Some(f),
            _ => None,
        }
    }
}

impl Default for JsObject {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for JsObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsObject")
            .field("kind", &self.exotic.kind_name())
            .field("properties", &self.properties.len())
            .field("extensible", &self.extensible)
            .finish()
    }
}

impl Reset for JsObject {
    fn reset(&mut self) {
        self.prototype = None;
        self.extensible = true;
        self.immutable_prototype = false;
        self.properties.clear();
        self.exotic = ExoticObject::Ordinary;
    }
}

impl Traceable for JsObject {
    fn trace<F: FnMut(GcPtr<Self>)>(&self, mut visitor: F) {
        let visitor: &mut dyn FnMut(GcPtr<JsObject>) = &mut visitor;
        if let Some(proto) = &self.prototype {
            visitor(proto.copy_ref());
        }
        for prop in self.properties.values() {
            trace_value(&prop.value, visitor);
            if let Some(g) = &prop.getter {
                visitor(g.copy_ref());
            }
            if let Some(s) = &prop.setter {
                visitor(s.copy_ref());
            }
        }
        match &self.exotic {
            ExoticObject::Function(func) => {
                if let Some(env) = &func.environment {
                    visitor(env.copy_ref());
                }
            }
            ExoticObject::Environment(env) => env.trace(visitor),
            ExoticObject::Proxy(data) => data.trace(visitor),
            ExoticObject::Module(record) => record.trace(visitor),
            ExoticObject::Ordinary
            | ExoticObject::Array
            | ExoticObject::Boolean(_)
            | ExoticObject::Number(_)
            | ExoticObject::String(_)
            | ExoticObject::RegExp(_) => {}
        }
    }

    fn finalize(&mut self) {
        if let ExoticObject::Proxy(data) = &mut self.exotic {
            let handler = data.handler();
            handler.finalize(data);
        }
    }

    fn finalize_in_background(&self) -> bool {
        match &self.exotic {
            ExoticObject::Proxy(data) => data.handler().finalize_in_background(data.private()),
            _ => true,
        }
    }

    fn object_moved(&mut self, old_id: usize) {
        if let ExoticObject::Proxy(data) = &mut self.exotic {
            let handler = data.handler();
            handler.object_moved(data, old_id);
        }
    }
}

/// Exotic object behavior
pub enum ExoticObject {
    Ordinary,
    Array,
    Function(NativeFunction),
    /// Boxed primitives (`new Boolean(..)` etc.)
    Boolean(bool),
    Number(f64),
    String(JsString),
    RegExp(RegExpData),
    Environment(EnvironmentData),
    Proxy(ProxyData),
    Module(Box<ModuleRecord>),
}

impl ExoticObject {
    pub fn kind_name(&self) -> &'static str {
        match self {
            ExoticObject::Ordinary => "Object",
            ExoticObject::Array => "Array",
            ExoticObject::Function(_) => "Function",
            ExoticObject::Boolean(_) => "Boolean",
            ExoticObject::Number(_) => "Number",
            ExoticObject::String(_) => "String",
            ExoticObject::RegExp(_) => "RegExp",
            ExoticObject::Environment(_) => "Environment",
            ExoticObject::Proxy(_) => "Proxy",
            ExoticObject::Module(_) => "Module",
        }
    }
}

/// Compiled regular expression as far as this crate needs it
#[derive(Debug, Clone, PartialEq)]
pub struct RegExpData {
    pub source: JsString,
    pub flags: JsString,
}

// ═══════════════════════════════════════════════════════════════════════════════
// Functions
// ═══════════════════════════════════════════════════════════════════════════════

/// Arguments of a native call or construct
pub struct CallArgs {
    pub callee: JsObjectRef,
    pub this: JsValue,
    pub args: Vec<JsValue>,
    /// Set when invoked as a constructor
    pub new_target: Option<JsObjectRef>,
}

impl CallArgs {
    /// Argument `i`, or undefined
    pub fn arg(&self, i: usize) -> JsValue {
        self.args.get(i).cloned().unwrap_or_default()
    }

    pub fn is_construct(&self) -> bool {
        self.new_target.is_some()
    }
}

/// Native function signature
pub type NativeFn = fn(&mut Context, &CallArgs) -> Result<JsValue, JsError>;

/// Function object payload
#[derive(Clone)]
pub struct NativeFunction {
    pub name: JsString,
    pub func: NativeFn,
    pub arity: u32,
    pub constructor: bool,
    /// Environment captured when the function was instantiated in a scope
    pub environment: Option<JsObjectRef>,
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFunction")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .field("constructor", &self.constructor)
            .finish()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Environments
// ═══════════════════════════════════════════════════════════════════════════════

/// How a binding was declared
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    Var,
    Let,
    Const,
    Function,
    Class,
}

impl BindingKind {
    /// let/const/class start in the temporal dead zone
    pub fn is_lexical(&self) -> bool {
        matches!(self, BindingKind::Let | BindingKind::Const | BindingKind::Class)
    }

    pub fn is_mutable(&self) -> bool {
        !matches!(self, BindingKind::Const)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BindingInfo {
    pub slot: usize,
    pub kind: BindingKind,
}

/// Variable storage with stable slot numbers.
///
/// Slots are allocated when a name is declared and never move, so a
/// `(environment, slot)` pair stays valid for the environment's lifetime.
#[derive(Debug, Default)]
pub struct EnvironmentData {
    bindings: IndexMap<JsString, BindingInfo>,
    slots: Vec<HeapValue>,
    pub outer: Option<JsObjectRef>,
}

impl EnvironmentData {
    pub fn new(outer: Option<JsObjectRef>) -> Self {
        Self {
            bindings: index_map_new(),
            slots: Vec::new(),
            outer,
        }
    }

    /// Declare a binding and return its slot. Redeclaring returns the existing slot.
    pub fn declare(&mut self, name: JsString, kind: BindingKind) -> usize {
        if let Some(info) = self.bindings.get(&name) {
            return info.slot;
        }
        let slot = self.slots.len();
        let initial = if kind.is_lexical() {
            JsValue::Magic(MagicValue::UninitializedLexical)
        } else {
            JsValue::Undefined
        };
        self.slots.push(HeapValue::new(initial));
        self.bindings.insert(name, BindingInfo { slot, kind });
        slot
    }

    pub fn lookup(&self, name: &str) -> Option<BindingInfo> {
        self.bindings.get(name).copied()
    }

    pub fn slot(&self, slot: usize) -> Option<&JsValue> {
        self.slots.get(slot).map(HeapValue::get)
    }

    /// Store into a slot. Returns false if the slot does not exist.
    pub fn set_slot(&mut self, slot: usize, value: JsValue) -> bool {
        match self.slots.get_mut(slot) {
            Some(cell) => {
                cell.set(value);
                true
            }
            None => false,
        }
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn names(&self) -> impl Iterator<Item = &JsString> {
        self.bindings.keys()
    }

    fn trace(&self, visitor: &mut dyn FnMut(GcPtr<JsObject>)) {
        for slot in &self.slots {
            slot.trace(visitor);
        }
        if let Some(outer) = &self.outer {
            visitor(outer.copy_ref());
        }
    }
}
