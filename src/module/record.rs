//! Module records and the module object API.
//!
//! A module object is an ordinary heap cell whose exotic payload is a
//! [`ModuleRecord`]. [`ModuleObject`] is the typed handle through which the
//! loader, the builder and the namespace handler reach that payload.

use serde::Serialize;
use tracing::debug;

use crate::context::Context;
use crate::error::JsError;
use crate::gc::{GcPtr, Generation};
use crate::prelude::*;
use crate::value::{
    BindingKind, CheapClone, ExoticObject, HeapValue, JsObject, JsObjectRef, JsString, JsValue,
    MagicValue, NativeFn,
};

use super::bindings::{IndirectBinding, IndirectBindingMap};
use super::entries::{ImportName, ModuleStatus, ModuleTables};
use super::namespace;

/// Compiled body of a module, run once by [`ModuleObject::execute`]
pub type ModuleBody = fn(&mut Context, &ModuleObject) -> Result<JsValue, JsError>;

/// A hoisted `function` declaration, instantiated as a closure over the
/// module environment
#[derive(Debug, Clone)]
pub struct FunctionDeclaration {
    pub name: JsString,
    pub func: NativeFn,
    pub arity: u32,
}

/// Exotic payload of a module object
pub struct ModuleRecord {
    body: Option<ModuleBody>,
    pub(super) status: ModuleStatus,
    /// Only meaningful while `status` is `Errored`
    error: HeapValue,
    host_defined: HeapValue,
    pub(super) tables: ModuleTables,
    frozen: bool,
    /// Set at creation, cleared once tables are installed or an error is recorded
    awaiting_tables: bool,
    initial_environment: HeapValue,
    environment: HeapValue,
    pub(super) namespace: HeapValue,
    pub(super) namespace_exports: Rc<[JsString]>,
    pub(super) namespace_bindings: IndirectBindingMap,
    import_bindings: IndirectBindingMap,
    /// `None` once the declarations have been instantiated
    function_declarations: Option<Vec<FunctionDeclaration>>,
}

impl ModuleRecord {
    fn new(body: Option<ModuleBody>) -> Self {
        Self {
            body,
            status: ModuleStatus::Errored,
            error: HeapValue::default(),
            host_defined: HeapValue::default(),
            tables: ModuleTables::default(),
            frozen: false,
            awaiting_tables: true,
            initial_environment: HeapValue::default(),
            environment: HeapValue::default(),
            namespace: HeapValue::default(),
            namespace_exports: Rc::from(Vec::new()),
            namespace_bindings: IndirectBindingMap::new(),
            import_bindings: IndirectBindingMap::new(),
            function_declarations: Some(Vec::new()),
        }
    }

    pub fn status(&self) -> ModuleStatus {
        self.status
    }

    pub fn tables(&self) -> &ModuleTables {
        &self.tables
    }

    pub fn trace(&self, visitor: &mut dyn FnMut(GcPtr<JsObject>)) {
        self.error.trace(visitor);
        self.host_defined.trace(visitor);
        self.initial_environment.trace(visitor);
        self.environment.trace(visitor);
        self.namespace.trace(visitor);
        self.namespace_bindings.trace(visitor);
        self.import_bindings.trace(visitor);
    }

    /// Environment bindings resolve against: the live one once created,
    /// the initial one before that
    fn binding_environment(&self) -> Option<JsObjectRef> {
        self.environment
            .object()
            .or_else(|| self.initial_environment.object())
            .cloned()
    }
}

impl fmt::Debug for ModuleRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleRecord")
            .field("status", &self.status)
            .field("frozen", &self.frozen)
            .field("imports", &self.tables.import_entries.len())
            .field("namespace", &self.namespace.object().is_some())
            .finish()
    }
}

/// JSON view of a module, see [`ModuleObject::describe`]
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ModuleSnapshot<'a> {
    status: ModuleStatus,
    frozen: bool,
    #[serde(flatten)]
    tables: &'a ModuleTables,
    has_environment: bool,
    namespace_exports: Option<&'a [JsString]>,
    pending_function_declarations: Option<Vec<&'a str>>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// ModuleObject
// ═══════════════════════════════════════════════════════════════════════════════

/// Handle to an object carrying a [`ModuleRecord`]
#[derive(Debug, Clone)]
pub struct ModuleObject(JsObjectRef);

impl CheapClone for ModuleObject {}

impl PartialEq for ModuleObject {
    fn eq(&self, other: &Self) -> bool {
        crate::gc::Gc::ptr_eq(&self.0, &other.0)
    }
}

impl ModuleObject {
    /// A new module in the `Errored` state with empty tables. The state
    /// becomes `Uninstantiated` once [`ModuleObject::init_import_export_data`]
    /// installs the tables.
    pub fn create(cx: &mut Context, body: Option<ModuleBody>) -> ModuleObject {
        let mut data = JsObject::new();
        data.extensible = false;
        data.exotic = ExoticObject::Module(Box::new(ModuleRecord::new(body)));
        let obj = cx.alloc(data, Generation::Tenured);
        debug!(module = obj.id(), "module created");
        ModuleObject(obj)
    }

    /// View `obj` as a module, if it is one
    pub fn from_object(obj: &JsObjectRef) -> Option<ModuleObject> {
        obj.borrow()
            .as_module()
            .is_some()
            .then(|| ModuleObject(obj.cheap_clone()))
    }

    pub fn as_object(&self) -> &JsObjectRef {
        &self.0
    }

    fn record(&self) -> Result<Ref<'_, ModuleRecord>, JsError> {
        Ref::filter_map(self.0.borrow(), JsObject::as_module)
            .map_err(|_| JsError::internal_error("object is no longer a module"))
    }

    fn record_mut(&self) -> Result<RefMut<'_, ModuleRecord>, JsError> {
        RefMut::filter_map(self.0.borrow_mut(), JsObject::as_module_mut)
            .map_err(|_| JsError::internal_error("object is no longer a module"))
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Tables
    // ═══════════════════════════════════════════════════════════════════════════

    /// Install the tables produced by the builder. Only a freshly created
    /// module accepts them; this is the one way out of the initial
    /// `Errored` status.
    pub fn init_import_export_data(&self, tables: ModuleTables) -> Result<(), JsError> {
        let mut record = self.record_mut()?;
        if record.frozen {
            return Err(JsError::internal_error(
                "module tables cannot change after the module is frozen",
            ));
        }
        if !record.awaiting_tables {
            return Err(JsError::internal_error(format!(
                "module tables already installed or module failed (status {})",
                record.status.as_str()
            )));
        }
        record.tables = tables;
        record.awaiting_tables = false;
        record.status = ModuleStatus::Uninstantiated;
        debug!(
            module = self.0.id(),
            requested = record.tables.requested_modules.len(),
            imports = record.tables.import_entries.len(),
            "module tables installed"
        );
        Ok(())
    }

    /// Make the tables immutable. Done before the module is linked.
    pub fn freeze(&self) -> Result<(), JsError> {
        self.record_mut()?.frozen = true;
        Ok(())
    }

    pub fn is_frozen(&self) -> Result<bool, JsError> {
        Ok(self.record()?.frozen)
    }

    /// Debug check that [`ModuleObject::freeze`] ran
    pub fn assert_frozen(&self) {
        debug_assert!(
            self.record().is_ok_and(|record| record.frozen),
            "module tables are not frozen"
        );
    }

    /// A copy of the tables
    pub fn tables(&self) -> Result<ModuleTables, JsError> {
        Ok(self.record()?.tables.clone())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Status
    // ═══════════════════════════════════════════════════════════════════════════

    pub fn status(&self) -> Result<ModuleStatus, JsError> {
        Ok(self.record()?.status)
    }

    /// The recorded error, only while the module is errored
    pub fn error(&self) -> Result<Option<JsValue>, JsError> {
        let record = self.record()?;
        Ok((record.status == ModuleStatus::Errored).then(|| record.error.get().clone()))
    }

    /// Move to a later, non-error status
    pub fn set_status(&self, status: ModuleStatus) -> Result<(), JsError> {
        let mut record = self.record_mut()?;
        let current = record.status;
        if status == ModuleStatus::Errored
            || current == ModuleStatus::Errored
            || status <= current
        {
            return Err(JsError::internal_error(format!(
                "invalid module status transition from {} to {}",
                current.as_str(),
                status.as_str()
            )));
        }
        record.status = status;
        debug!(
            module = self.0.id(),
            from = current.as_str(),
            to = status.as_str(),
            "module status"
        );
        Ok(())
    }

    /// Record `error` and move to `Errored`, from any status
    pub fn set_errored(&self, error: JsValue) -> Result<(), JsError> {
        let mut record = self.record_mut()?;
        let from = record.status;
        record.status = ModuleStatus::Errored;
        record.awaiting_tables = false;
        record.error.set(error);
        debug!(module = self.0.id(), from = from.as_str(), "module errored");
        Ok(())
    }

    /// The recorded error as an exception
    fn recorded_error(&self) -> Result<JsError, JsError> {
        Ok(JsError::thrown(self.record()?.error.get().clone()))
    }

    pub fn host_defined_field(&self) -> Result<JsValue, JsError> {
        Ok(self.record()?.host_defined.get().clone())
    }

    /// Embedder data carried with the module
    pub fn set_host_defined_field(&self, value: JsValue) -> Result<(), JsError> {
        self.record_mut()?.host_defined.set(value);
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Environments
    // ═══════════════════════════════════════════════════════════════════════════

    /// The environment the compiler declared the module's bindings in
    pub fn set_initial_environment(&self, env: &JsObjectRef) -> Result<(), JsError> {
        if env.borrow().as_environment().is_none() {
            return Err(JsError::internal_error("module environment must be an environment"));
        }
        let mut record = self.record_mut()?;
        if record.initial_environment.object().is_some() {
            return Err(JsError::internal_error("module already has an initial environment"));
        }
        record.initial_environment.set(JsValue::Object(env.cheap_clone()));
        Ok(())
    }

    pub fn initial_environment(&self) -> Result<Option<JsObjectRef>, JsError> {
        Ok(self.record()?.initial_environment.object().cloned())
    }

    /// The live environment, present once the module is instantiated
    pub fn environment(&self) -> Result<Option<JsObjectRef>, JsError> {
        Ok(self.record()?.environment.object().cloned())
    }

    /// Promote the initial environment to the live one
    pub fn create_environment(&self) -> Result<JsObjectRef, JsError> {
        let mut record = self.record_mut()?;
        if record.environment.object().is_some() {
            return Err(JsError::internal_error("module environment already created"));
        }
        let env = record
            .initial_environment
            .object()
            .cloned()
            .ok_or_else(|| JsError::internal_error("module has no initial environment"))?;
        record.environment.set(JsValue::Object(env.cheap_clone()));
        Ok(env)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Function declarations
    // ═══════════════════════════════════════════════════════════════════════════

    pub fn note_function_declaration(
        &self,
        name: JsString,
        func: NativeFn,
        arity: u32,
    ) -> Result<(), JsError> {
        let mut record = self.record_mut()?;
        let decls = record.function_declarations.as_mut().ok_or_else(|| {
            JsError::internal_error("Module function declarations have already been instantiated")
        })?;
        decls.push(FunctionDeclaration { name, func, arity });
        Ok(())
    }

    /// Create each noted function as a closure over the module environment
    /// and store it in its binding. Runs once.
    pub fn instantiate_function_declarations(&self, cx: &mut Context) -> Result<(), JsError> {
        let (env, decls) = {
            let mut record = self.record_mut()?;
            if record.function_declarations.is_none() {
                return Err(JsError::internal_error(
                    "Module function declarations have already been instantiated",
                ));
            }
            let env = record.environment.object().cloned().ok_or_else(|| {
                JsError::internal_error("Module declarations have not yet been instantiated")
            })?;
            (env, record.function_declarations.take().unwrap_or_default())
        };

        for decl in decls {
            let func = cx.create_closure(decl.name.as_str(), decl.func, decl.arity, &env);
            let mut data = env.borrow_mut();
            let Some(scope) = data.as_environment_mut() else {
                return Err(JsError::internal_error("module environment must be an environment"));
            };
            let slot = match scope.lookup(decl.name.as_str()) {
                Some(info) => info.slot,
                None => scope.declare(decl.name.cheap_clone(), BindingKind::Function),
            };
            scope.set_slot(slot, JsValue::Object(func));
        }
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Linking and evaluation
    // ═══════════════════════════════════════════════════════════════════════════

    /// Instantiate this module alone: create its environment and hoisted
    /// functions. Import bindings must already be in place. A failure is
    /// recorded on the module.
    pub fn instantiate(&self, cx: &mut Context) -> Result<(), JsError> {
        match self.status()? {
            ModuleStatus::Uninstantiated => {}
            ModuleStatus::Errored => return Err(self.recorded_error()?),
            ModuleStatus::Instantiating
            | ModuleStatus::Instantiated
            | ModuleStatus::Evaluated => return Ok(()),
        }
        self.set_status(ModuleStatus::Instantiating)?;

        let result = self.instantiate_declarations(cx);
        match result {
            Ok(()) => self.set_status(ModuleStatus::Instantiated),
            Err(err) => {
                self.set_errored(err.to_value())?;
                Err(err)
            }
        }
    }

    fn instantiate_declarations(&self, cx: &mut Context) -> Result<(), JsError> {
        let (has_environment, pending) = {
            let record = self.record()?;
            (
                record.environment.object().is_some(),
                record.function_declarations.is_some(),
            )
        };
        if !has_environment {
            self.create_environment()?;
        }
        if pending {
            self.instantiate_function_declarations(cx)?;
        }
        Ok(())
    }

    /// Run the module body
    pub fn execute(&self, cx: &mut Context) -> Result<JsValue, JsError> {
        let body = {
            let record = self.record()?;
            if record.environment.object().is_none() {
                return Err(JsError::internal_error(
                    "Module declarations have not yet been instantiated",
                ));
            }
            record.body
        };
        match body {
            Some(body) => body(cx, self),
            None => Ok(JsValue::Undefined),
        }
    }

    /// Execute an instantiated module once. An exception moves the module
    /// to `Errored` and is rethrown by every later call.
    pub fn evaluate(&self, cx: &mut Context) -> Result<JsValue, JsError> {
        match self.status()? {
            ModuleStatus::Instantiated => {}
            ModuleStatus::Evaluated => return Ok(JsValue::Undefined),
            ModuleStatus::Errored => return Err(self.recorded_error()?),
            ModuleStatus::Uninstantiated | ModuleStatus::Instantiating => {
                return Err(JsError::internal_error(
                    "module must be instantiated before it is evaluated",
                ));
            }
        }

        match self.execute(cx) {
            Ok(value) => {
                self.set_status(ModuleStatus::Evaluated)?;
                Ok(value)
            }
            Err(err) => {
                self.set_errored(err.to_value())?;
                Err(err)
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Bindings
    // ═══════════════════════════════════════════════════════════════════════════

    /// Bind `local_name` in this module to `target_local` in the initial
    /// environment of `target`
    pub fn add_import_binding(
        &self,
        local_name: JsString,
        target: &ModuleObject,
        target_local: &str,
    ) -> Result<(), JsError> {
        if self.record()?.tables.import_entry_for(local_name.as_str()).is_none() {
            return Err(JsError::internal_error(format!(
                "'{}' is not bound by an import of this module",
                local_name
            )));
        }
        let env = target.initial_environment()?.ok_or_else(|| {
            JsError::internal_error("imported module has no initial environment")
        })?;
        let binding = IndirectBinding::resolve(&env, target_local)?;
        self.record_mut()?.import_bindings.insert_new(local_name, binding)
    }

    /// Where `name` lives, looking at the module's own declarations first
    /// and its imports second
    fn resolve_binding(&self, name: &str) -> Result<Option<IndirectBinding>, JsError> {
        let record = self.record()?;
        if let Some(env) = record.binding_environment() {
            let slot = env
                .borrow()
                .as_environment()
                .and_then(|scope| scope.lookup(name))
                .map(|info| info.slot);
            if let Some(slot) = slot {
                return Ok(Some(IndirectBinding {
                    environment: env,
                    slot,
                }));
            }
        }
        Ok(record.import_bindings.lookup(name).cloned())
    }

    /// Read a local or imported binding
    pub fn get_binding_value(&self, name: &str) -> Result<JsValue, JsError> {
        let binding = self
            .resolve_binding(name)?
            .ok_or_else(|| JsError::reference_error(name))?;
        let value = binding.value()?;
        if value.is_magic(MagicValue::UninitializedLexical) {
            return Err(JsError::uninitialized_lexical(name));
        }
        Ok(value)
    }

    /// Write a binding declared by this module, ending its dead zone
    pub fn initialize_binding(&self, name: &str, value: JsValue) -> Result<(), JsError> {
        let env = self
            .record()?
            .binding_environment()
            .ok_or_else(|| JsError::internal_error("module has no environment"))?;
        let mut data = env.borrow_mut();
        let scope = data
            .as_environment_mut()
            .ok_or_else(|| JsError::internal_error("module environment must be an environment"))?;
        let info = scope
            .lookup(name)
            .ok_or_else(|| JsError::reference_error(name))?;
        scope.set_slot(info.slot, value);
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Namespace
    // ═══════════════════════════════════════════════════════════════════════════

    pub fn namespace(&self) -> Result<Option<JsObjectRef>, JsError> {
        Ok(self.record()?.namespace.object().cloned())
    }

    /// Create the namespace object over `exports`. A module has at most one.
    pub fn create_namespace(
        &self,
        cx: &mut Context,
        exports: Vec<JsString>,
    ) -> Result<JsObjectRef, JsError> {
        namespace::create(cx, self, exports)
    }

    /// The namespace, created on first use from the local and indirect
    /// export tables. Indirect exports are bound through this module's own
    /// import bindings; names that need another module's star exports are
    /// left to the loader, which adds them with
    /// [`ModuleNamespace::add_binding`](super::ModuleNamespace::add_binding).
    pub fn get_or_create_namespace(&self, cx: &mut Context) -> Result<JsObjectRef, JsError> {
        if let Some(ns) = self.namespace()? {
            return Ok(ns);
        }

        let resolved = self.resolve_exports()?;
        let names = resolved.iter().map(|(name, _)| name.cheap_clone()).collect();
        let ns = self.create_namespace(cx, names)?;
        let mut record = self.record_mut()?;
        for (name, binding) in resolved {
            if !record.namespace_bindings.has(name.as_str()) {
                record.namespace_bindings.insert_new(name, binding)?;
            }
        }
        Ok(ns)
    }

    fn resolve_exports(&self) -> Result<Vec<(JsString, IndirectBinding)>, JsError> {
        let tables = self.tables()?;
        let mut resolved = Vec::new();

        for entry in &tables.local_export_entries {
            let (Some(export_name), Some(local_name)) = (&entry.export_name, &entry.local_name)
            else {
                continue;
            };
            let binding = self
                .resolve_binding(local_name.as_str())?
                .ok_or_else(|| JsError::reference_error(local_name.as_str()))?;
            resolved.push((export_name.cheap_clone(), binding));
        }

        for entry in &tables.indirect_export_entries {
            let (Some(export_name), Some(request), Some(ImportName::Name(import_name))) =
                (&entry.export_name, &entry.module_request, &entry.import_name)
            else {
                continue;
            };
            let import = tables.import_entries.iter().find(|import| {
                &import.module_request == request
                    && import.import_name.as_name() == Some(import_name)
            });
            let Some(import) = import else {
                continue;
            };
            let binding = self.record()?.import_bindings.lookup(import.local_name.as_str()).cloned();
            if let Some(binding) = binding {
                resolved.push((export_name.cheap_clone(), binding));
            }
        }
        Ok(resolved)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Diagnostics
    // ═══════════════════════════════════════════════════════════════════════════

    /// Status and tables as JSON
    pub fn describe(&self) -> Result<serde_json::Value, JsError> {
        let record = self.record()?;
        let snapshot = ModuleSnapshot {
            status: record.status,
            frozen: record.frozen,
            tables: &record.tables,
            has_environment: record.environment.object().is_some(),
            namespace_exports: record
                .namespace
                .object()
                .map(|_| &*record.namespace_exports),
            pending_function_declarations: record
                .function_declarations
                .as_ref()
                .map(|decls| decls.iter().map(|d| d.name.as_str()).collect()),
        };
        serde_json::to_value(&snapshot).map_err(|e| JsError::internal_error(e.to_string()))
    }
}
