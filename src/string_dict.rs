//! Interned names.
//!
//! Property names that the proxy and module layers look up on every
//! operation (trap names, descriptor fields, module markers) are interned
//! once per context so comparisons and map lookups share one allocation.

use rustc_hash::FxHashMap;

use crate::value::{CheapClone, JsString};

/// Deduplicating string table
pub struct StringDict {
    strings: FxHashMap<Box<str>, JsString>,
}

impl StringDict {
    pub fn new() -> Self {
        Self {
            strings: FxHashMap::default(),
        }
    }

    /// A dictionary pre-populated with every atom in [`Atoms`]
    pub fn with_atoms() -> (Self, Atoms) {
        let mut dict = Self::new();
        let atoms = Atoms::new(&mut dict);
        (dict, atoms)
    }

    /// Return the shared instance for `s`, inserting it on first use
    pub fn intern(&mut self, s: &str) -> JsString {
        if let Some(existing) = self.strings.get(s) {
            return existing.cheap_clone();
        }
        let js_str = JsString::from(s);
        self.strings.insert(s.into(), js_str.cheap_clone());
        js_str
    }

    /// Intern a string built elsewhere, keeping the existing instance if any
    pub fn intern_owned(&mut self, js_str: JsString) -> JsString {
        if let Some(existing) = self.strings.get(js_str.as_str()) {
            return existing.cheap_clone();
        }
        self.strings
            .insert(js_str.as_str().into(), js_str.cheap_clone());
        js_str
    }

    pub fn get(&self, s: &str) -> Option<JsString> {
        self.strings.get(s).map(CheapClone::cheap_clone)
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

impl Default for StringDict {
    fn default() -> Self {
        Self::new()
    }
}

macro_rules! define_atoms {
    ($($field:ident => $text:literal,)*) => {
        /// Frequently used names, interned at context creation
        pub struct Atoms {
            $(pub $field: JsString,)*
        }

        impl Atoms {
            fn new(dict: &mut StringDict) -> Self {
                Self {
                    $($field: dict.intern($text),)*
                }
            }
        }
    };
}

define_atoms! {
    // descriptor fields
    value => "value",
    writable => "writable",
    enumerable => "enumerable",
    configurable => "configurable",
    get => "get",
    set => "set",
    // object basics
    prototype => "prototype",
    constructor => "constructor",
    length => "length",
    name => "name",
    // scripted proxy traps
    get_prototype_of => "getPrototypeOf",
    set_prototype_of => "setPrototypeOf",
    is_extensible => "isExtensible",
    prevent_extensions => "preventExtensions",
    get_own_property_descriptor => "getOwnPropertyDescriptor",
    define_property => "defineProperty",
    has => "has",
    delete_property => "deleteProperty",
    own_keys => "ownKeys",
    apply => "apply",
    construct => "construct",
    // modules
    default => "default",
    star_default => "*default*",
    star => "*",
    module_tag => "Module",
}
