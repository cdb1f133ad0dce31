//! Execution context
//!
//! Owns the object heap and the per-context state every object operation
//! needs: interned names, well-known symbols, intrinsic prototypes and the
//! record of proxy policies currently entered.

use tracing::debug;

use crate::gc::{GcStats, Generation, Guard, Heap};
use crate::prelude::*;
use crate::proxy::{EnteredPolicy, Family};
use crate::string_dict::{Atoms, StringDict};
use crate::value::{
    CheapClone, EnvironmentData, ExoticObject, JsObject, JsObjectRef, JsString, JsSymbol,
    JsValue, NativeFn, NativeFunction, Property, PropertyKey, RegExpData,
};

/// Tuning knobs for a context
#[derive(Debug, Clone)]
pub struct ContextConfig {
    /// Net allocations between automatic collections (0 disables them)
    pub gc_threshold: usize,
    /// Honor nursery allocation hints; when false every object is tenured
    pub nursery: bool,
    /// Objects marked per [`Context::gc_slice`]
    pub incremental_slice: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            gc_threshold: 100,
            nursery: true,
            incremental_slice: 64,
        }
    }
}

/// Symbols with fixed meaning shared by every object in a context
pub struct WellKnownSymbols {
    pub to_string_tag: JsSymbol,
    pub iterator: JsSymbol,
    pub has_instance: JsSymbol,
}

pub struct Context {
    heap: Heap<JsObject>,
    /// Keeps the intrinsics alive for the context's lifetime
    root_guard: Guard<JsObject>,
    strings: StringDict,
    pub atoms: Atoms,
    pub symbols: WellKnownSymbols,
    /// Object.prototype
    pub object_prototype: JsObjectRef,
    /// Function.prototype
    pub function_prototype: JsObjectRef,
    /// Array.prototype
    pub array_prototype: JsObjectRef,
    config: ContextConfig,
    next_symbol_id: u64,
    window_proxy_family: Option<Family>,
    /// Policies entered and not yet left, innermost last
    pub(crate) entered_policies: Rc<RefCell<Vec<EnteredPolicy>>>,
}

impl Context {
    pub fn new() -> Self {
        Self::with_config(ContextConfig::default())
    }

    pub fn with_config(config: ContextConfig) -> Self {
        let heap: Heap<JsObject> = Heap::new();
        heap.set_gc_threshold(config.gc_threshold);
        heap.set_nursery_enabled(config.nursery);

        let root_guard = heap.create_guard();
        let (strings, atoms) = StringDict::with_atoms();

        let object_prototype = root_guard.alloc_tenured();
        let function_prototype = root_guard.alloc_tenured();
        function_prototype
            .borrow_mut()
            .set_prototype_slot(Some(object_prototype.clone()));
        let array_prototype = root_guard.alloc_tenured();
        {
            let mut proto = array_prototype.borrow_mut();
            proto.set_prototype_slot(Some(object_prototype.clone()));
            proto.exotic = ExoticObject::Array;
            proto.define_own(
                PropertyKey::String(atoms.length.cheap_clone()),
                Property::with_attributes(JsValue::Number(0.0), true, false, false),
            );
        }

        let symbols = WellKnownSymbols {
            to_string_tag: JsSymbol::new(1, Some(JsString::from("Symbol.toStringTag"))),
            iterator: JsSymbol::new(2, Some(JsString::from("Symbol.iterator"))),
            has_instance: JsSymbol::new(3, Some(JsString::from("Symbol.hasInstance"))),
        };

        debug!(gc_threshold = config.gc_threshold, "context created");
        Self {
            heap,
            root_guard,
            strings,
            atoms,
            symbols,
            object_prototype,
            function_prototype,
            array_prototype,
            config,
            next_symbol_id: 4,
            window_proxy_family: None,
            entered_policies: Rc::new(RefCell::new(Vec::new())),
        }
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Names and symbols
    // ═══════════════════════════════════════════════════════════════════════════

    /// Intern a string
    pub fn intern(&mut self, s: &str) -> JsString {
        self.strings.intern(s)
    }

    /// Interned property key
    #[inline]
    pub fn key(&mut self, s: &str) -> PropertyKey {
        PropertyKey::from(self.strings.intern(s))
    }

    pub fn new_symbol(&mut self, description: Option<&str>) -> JsSymbol {
        let id = self.next_symbol_id;
        self.next_symbol_id += 1;
        JsSymbol::new(id, description.map(JsString::from))
    }

    pub fn to_string_tag_key(&self) -> PropertyKey {
        PropertyKey::Symbol(self.symbols.to_string_tag.clone())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Allocation
    // ═══════════════════════════════════════════════════════════════════════════

    /// Allocate a cell holding `data`
    pub fn alloc(&mut self, data: JsObject, generation: Generation) -> JsObjectRef {
        let obj = self.heap.alloc(generation);
        *obj.borrow_mut() = data;
        obj
    }

    /// Keep `obj` alive for the lifetime of the context
    pub fn root(&mut self, obj: &JsObjectRef) {
        self.root_guard.guard(obj.clone());
    }

    /// Plain object inheriting from Object.prototype
    pub fn create_object(&mut self) -> JsObjectRef {
        let proto = self.object_prototype.clone();
        self.create_object_with_proto(Some(proto))
    }

    pub fn create_object_with_proto(&mut self, proto: Option<JsObjectRef>) -> JsObjectRef {
        let mut data = JsObject::new();
        data.prototype = proto;
        self.alloc(data, Generation::Nursery)
    }

    pub fn create_array(&mut self, elements: Vec<JsValue>) -> JsObjectRef {
        let mut data = JsObject::new();
        data.prototype = Some(self.array_prototype.clone());
        data.exotic = ExoticObject::Array;
        let len = elements.len();
        for (i, elem) in (0u32..).zip(elements) {
            data.define_own(PropertyKey::Index(i), Property::data(elem));
        }
        data.define_own(
            PropertyKey::String(self.atoms.length.cheap_clone()),
            Property::with_attributes(JsValue::Number(len as f64), true, false, false),
        );
        self.alloc(data, Generation::Nursery)
    }

    /// Native function object with `name` and `length` properties
    pub fn create_function(&mut self, name: &str, func: NativeFn, arity: u32) -> JsObjectRef {
        self.create_native(name, func, arity, false, None)
    }

    /// Native function that also has [[Construct]] and a `prototype` object
    pub fn create_constructor(&mut self, name: &str, func: NativeFn, arity: u32) -> JsObjectRef {
        let ctor = self.create_native(name, func, arity, true, None);
        let proto = self.create_object();
        proto.borrow_mut().define_own(
            PropertyKey::String(self.atoms.constructor.cheap_clone()),
            Property::with_attributes(JsValue::Object(ctor.clone()), true, false, true),
        );
        ctor.borrow_mut().define_own(
            PropertyKey::String(self.atoms.prototype.cheap_clone()),
            Property::with_attributes(JsValue::Object(proto), true, false, false),
        );
        ctor
    }

    /// Native function closing over an environment
    pub fn create_closure(
        &mut self,
        name: &str,
        func: NativeFn,
        arity: u32,
        environment: &JsObjectRef,
    ) -> JsObjectRef {
        self.create_native(name, func, arity, false, Some(environment.clone()))
    }

    fn create_native(
        &mut self,
        name: &str,
        func: NativeFn,
        arity: u32,
        constructor: bool,
        environment: Option<JsObjectRef>,
    ) -> JsObjectRef {
        let name = self.intern(name);
        let mut data = JsObject::new();
        data.prototype = Some(self.function_prototype.clone());
        data.define_own(
            PropertyKey::String(self.atoms.length.cheap_clone()),
            Property::with_attributes(JsValue::Number(f64::from(arity)), false, false, true),
        );
        data.define_own(
            PropertyKey::String(self.atoms.name.cheap_clone()),
            Property::with_attributes(JsValue::String(name.cheap_clone()), false, false, true),
        );
        data.exotic = ExoticObject::Function(NativeFunction {
            name,
            func,
            arity,
            constructor,
            environment,
        });
        self.alloc(data, Generation::Nursery)
    }

    /// Declarative environment with no prototype
    pub fn create_environment(&mut self, outer: Option<JsObjectRef>) -> JsObjectRef {
        let mut data = JsObject::new();
        data.extensible = false;
        data.exotic = ExoticObject::Environment(EnvironmentData::new(outer));
        self.alloc(data, Generation::Tenured)
    }

    pub fn create_regexp(&mut self, source: &str, flags: &str) -> JsObjectRef {
        let mut data = JsObject::new();
        data.prototype = Some(self.object_prototype.clone());
        data.exotic = ExoticObject::RegExp(RegExpData {
            source: self.intern(source),
            flags: self.intern(flags),
        });
        self.alloc(data, Generation::Nursery)
    }

    /// Box a boolean, number or string primitive
    pub fn create_boxed(&mut self, value: JsValue) -> Option<JsObjectRef> {
        let exotic = match value {
            JsValue::Boolean(b) => ExoticObject::Boolean(b),
            JsValue::Number(n) => ExoticObject::Number(n),
            JsValue::String(s) => ExoticObject::String(s),
            _ => return None,
        };
        let mut data = JsObject::new();
        data.prototype = Some(self.object_prototype.clone());
        data.exotic = exotic;
        Some(self.alloc(data, Generation::Nursery))
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Window proxies
    // ═══════════════════════════════════════════════════════════════════════════

    /// Register the handler family whose proxies act as window proxies.
    /// Unwrapping can be asked to stop at such an object.
    pub fn set_window_proxy_family(&mut self, family: Family) {
        self.window_proxy_family = Some(family);
    }

    pub fn window_proxy_family(&self) -> Option<Family> {
        self.window_proxy_family
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Garbage collection
    // ═══════════════════════════════════════════════════════════════════════════

    pub fn heap(&self) -> &Heap<JsObject> {
        &self.heap
    }

    /// Run a full collection
    pub fn gc(&mut self) -> bool {
        self.heap.collect()
    }

    /// Advance an incremental cycle by one slice, starting one if needed.
    /// Returns true when the cycle finished during this call.
    pub fn gc_slice(&mut self) -> bool {
        if !self.heap.is_marking() && !self.heap.start_incremental() {
            return false;
        }
        if self.heap.mark_slice(self.config.incremental_slice) {
            return self.heap.finish_incremental();
        }
        false
    }

    pub fn gc_stats(&self) -> GcStats {
        self.heap.stats()
    }

    /// Depth of the entered-policy stack
    pub fn entered_policy_depth(&self) -> usize {
        self.entered_policies.borrow().len()
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}
