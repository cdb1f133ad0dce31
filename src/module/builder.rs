//! Builds a module's import and export tables from its declarations.
//!
//! The parser feeds declarations in source order. Requested modules are
//! recorded once each, in first-use order. Exports are collected as written
//! and classified by [`ModuleBuilder::build_tables`]:
//!
//! - an export of a local declaration is a **local** export
//! - an export of an imported name becomes an **indirect** export pointing
//!   at the imported module, unless the import was `* as ns`, in which case
//!   the namespace binding is exported locally
//! - `export { a } from "m"` is indirect, `export * from "m"` is a **star**
//!   export

use crate::context::Context;
use crate::error::JsError;
use crate::prelude::*;
use crate::value::{CheapClone, JsString};

use super::entries::{
    ExportEntry, ImportEntry, ImportName, ModuleTables, RequestedModule, SourcePos,
    find_import_entry,
};
use super::record::ModuleObject;

/// `import { a as b, default as c, * as ns } from "m"`
#[derive(Debug, Clone)]
pub struct ImportDeclaration {
    pub module_request: JsString,
    /// Position of the module specifier string
    pub pos: SourcePos,
    pub specifiers: Vec<ImportSpecifier>,
}

#[derive(Debug, Clone)]
pub struct ImportSpecifier {
    pub import_name: ImportName,
    pub local_name: JsString,
    pub pos: SourcePos,
}

/// `export { local as exported }`
#[derive(Debug, Clone)]
pub struct ExportSpecifier {
    pub local_name: JsString,
    pub export_name: JsString,
    pub pos: SourcePos,
}

/// An `export` or `export default` declaration without a `from` clause
#[derive(Debug, Clone)]
pub enum ExportDeclaration {
    /// `export { a, b as c }`
    List(Vec<ExportSpecifier>),
    /// `export var/let/const a = .., b = ..`
    Variables(Vec<JsString>),
    /// `export [default] function f() {}`; a default export may be anonymous
    Function {
        name: Option<JsString>,
        is_default: bool,
    },
    /// `export [default] class C {}`
    Class {
        name: Option<JsString>,
        is_default: bool,
    },
    /// `export default <expression>`
    DefaultExpression,
}

/// `export { a as b } from "m"` and `export * from "m"`
#[derive(Debug, Clone)]
pub struct ExportFromDeclaration {
    pub module_request: JsString,
    pub pos: SourcePos,
    pub specifiers: Vec<ExportFromSpecifier>,
}

#[derive(Debug, Clone)]
pub enum ExportFromSpecifier {
    Named {
        import_name: JsString,
        export_name: JsString,
        pos: SourcePos,
    },
    All {
        pos: SourcePos,
    },
}

/// Accumulates the tables of one module
pub struct ModuleBuilder {
    module: ModuleObject,
    default_name: JsString,
    star_default_name: JsString,
    requested_specifiers: FxHashSet<JsString>,
    requested_modules: Vec<RequestedModule>,
    imported_bound_names: Vec<JsString>,
    import_entries: Vec<ImportEntry>,
    export_entries: Vec<ExportEntry>,
    local_export_entries: Vec<ExportEntry>,
    indirect_export_entries: Vec<ExportEntry>,
    star_export_entries: Vec<ExportEntry>,
}

impl ModuleBuilder {
    pub fn new(cx: &Context, module: &ModuleObject) -> Self {
        Self {
            module: module.cheap_clone(),
            default_name: cx.atoms.default.cheap_clone(),
            star_default_name: cx.atoms.star_default.cheap_clone(),
            requested_specifiers: FxHashSet::default(),
            requested_modules: Vec::new(),
            imported_bound_names: Vec::new(),
            import_entries: Vec::new(),
            export_entries: Vec::new(),
            local_export_entries: Vec::new(),
            indirect_export_entries: Vec::new(),
            star_export_entries: Vec::new(),
        }
    }

    pub fn process_import(&mut self, decl: &ImportDeclaration) -> Result<(), JsError> {
        self.maybe_append_requested_module(&decl.module_request, decl.pos);
        for spec in &decl.specifiers {
            self.imported_bound_names.push(spec.local_name.cheap_clone());
            self.import_entries.push(ImportEntry {
                module_request: decl.module_request.cheap_clone(),
                import_name: spec.import_name.clone(),
                local_name: spec.local_name.cheap_clone(),
                pos: spec.pos,
            });
        }
        Ok(())
    }

    pub fn process_export(&mut self, decl: &ExportDeclaration) -> Result<(), JsError> {
        match decl {
            ExportDeclaration::DefaultExpression => {
                let local = self.star_default_name.cheap_clone();
                self.append_export_entry(self.default_name.cheap_clone(), local, SourcePos::default());
            }
            ExportDeclaration::List(specs) => {
                for spec in specs {
                    self.append_export_entry(
                        spec.export_name.cheap_clone(),
                        spec.local_name.cheap_clone(),
                        spec.pos,
                    );
                }
            }
            ExportDeclaration::Variables(names) => {
                for name in names {
                    self.append_export_entry(name.cheap_clone(), name.cheap_clone(), SourcePos::default());
                }
            }
            ExportDeclaration::Function { name, is_default }
            | ExportDeclaration::Class { name, is_default } => {
                let local = match (name, is_default) {
                    (Some(name), _) => name.cheap_clone(),
                    (None, true) => self.star_default_name.cheap_clone(),
                    (None, false) => {
                        return Err(JsError::internal_error(
                            "exported declaration without a name",
                        ));
                    }
                };
                let export = if *is_default {
                    self.default_name.cheap_clone()
                } else {
                    local.cheap_clone()
                };
                self.append_export_entry(export, local, SourcePos::default());
            }
        }
        Ok(())
    }

    pub fn process_export_from(&mut self, decl: &ExportFromDeclaration) -> Result<(), JsError> {
        self.maybe_append_requested_module(&decl.module_request, decl.pos);
        for spec in &decl.specifiers {
            let entry = match spec {
                ExportFromSpecifier::Named {
                    import_name,
                    export_name,
                    pos,
                } => ExportEntry::from_module(
                    Some(export_name.cheap_clone()),
                    decl.module_request.cheap_clone(),
                    ImportName::Name(import_name.cheap_clone()),
                    *pos,
                ),
                ExportFromSpecifier::All { pos } => ExportEntry::from_module(
                    None,
                    decl.module_request.cheap_clone(),
                    ImportName::All,
                    *pos,
                ),
            };
            self.export_entries.push(entry);
        }
        Ok(())
    }

    /// Whether some earlier declaration already exports `name`. The parser
    /// uses this to report duplicate exports.
    pub fn has_exported_name(&self, name: &str) -> bool {
        self.export_entries
            .iter()
            .any(|entry| entry.export_name.as_ref().is_some_and(|n| n.as_str() == name))
    }

    /// Local names bound by imports, in declaration order
    pub fn imported_bound_names(&self) -> &[JsString] {
        &self.imported_bound_names
    }

    /// Sort the collected exports into the local, indirect and star tables
    pub fn build_tables(&mut self) -> Result<(), JsError> {
        let mut local = Vec::new();
        let mut indirect = Vec::new();
        let mut star = Vec::new();

        for exp in &self.export_entries {
            if exp.module_request.is_none() {
                let local_name = exp
                    .local_name
                    .as_ref()
                    .ok_or_else(|| JsError::internal_error("local export without a local name"))?;
                match find_import_entry(&self.import_entries, local_name.as_str()) {
                    Some(import) if !import.import_name.is_all() => {
                        indirect.push(ExportEntry::from_module(
                            exp.export_name.clone(),
                            import.module_request.cheap_clone(),
                            import.import_name.clone(),
                            exp.pos,
                        ));
                    }
                    _ => local.push(exp.clone()),
                }
            } else if exp.is_star() {
                star.push(exp.clone());
            } else {
                indirect.push(exp.clone());
            }
        }

        self.local_export_entries = local;
        self.indirect_export_entries = indirect;
        self.star_export_entries = star;
        Ok(())
    }

    /// Hand the tables to the module, moving it to `Uninstantiated`
    pub fn init_module(self) -> Result<ModuleObject, JsError> {
        let tables = ModuleTables {
            requested_modules: self.requested_modules,
            import_entries: self.import_entries,
            local_export_entries: self.local_export_entries,
            indirect_export_entries: self.indirect_export_entries,
            star_export_entries: self.star_export_entries,
        };
        self.module.init_import_export_data(tables)?;
        Ok(self.module)
    }

    fn append_export_entry(&mut self, export_name: JsString, local_name: JsString, pos: SourcePos) {
        self.export_entries
            .push(ExportEntry::local(export_name, local_name, pos));
    }

    fn maybe_append_requested_module(&mut self, specifier: &JsString, pos: SourcePos) {
        if !self.requested_specifiers.insert(specifier.cheap_clone()) {
            return;
        }
        self.requested_modules.push(RequestedModule {
            specifier: specifier.cheap_clone(),
            pos,
        });
    }
}
