//! Import and export entry records.
//!
//! These are the rows of a module's tables. They are immutable once the
//! builder hands them to the module, and they serialize for diagnostics.

use serde::Serialize;

use crate::value::JsString;

/// Line and column of the declaration that produced an entry.
/// Entries synthesized from declarations without a specifier use 0:0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SourcePos {
    pub line: u32,
    pub column: u32,
}

impl SourcePos {
    pub const fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

/// Lifecycle of a module record.
///
/// Ordered: status only moves forward, except that any state may move to
/// `Errored`. A fresh record starts out `Errored` until its tables are
/// installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum ModuleStatus {
    Errored = 0,
    Uninstantiated = 1,
    Instantiating = 2,
    Instantiated = 3,
    Evaluated = 4,
}

impl ModuleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModuleStatus::Errored => "errored",
            ModuleStatus::Uninstantiated => "uninstantiated",
            ModuleStatus::Instantiating => "instantiating",
            ModuleStatus::Instantiated => "instantiated",
            ModuleStatus::Evaluated => "evaluated",
        }
    }
}

/// The name an import or re-export pulls from the other module
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum ImportName {
    /// `*`: the whole namespace
    #[serde(serialize_with = "serialize_star")]
    All,
    Name(JsString),
}

fn serialize_star<S: serde::Serializer>(serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str("*")
}

impl ImportName {
    pub fn is_all(&self) -> bool {
        matches!(self, ImportName::All)
    }

    pub fn as_name(&self) -> Option<&JsString> {
        match self {
            ImportName::All => None,
            ImportName::Name(name) => Some(name),
        }
    }
}

/// A module specifier this module depends on
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestedModule {
    pub specifier: JsString,
    #[serde(flatten)]
    pub pos: SourcePos,
}

/// `import { importName as localName } from "moduleRequest"`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportEntry {
    pub module_request: JsString,
    pub import_name: ImportName,
    pub local_name: JsString,
    #[serde(flatten)]
    pub pos: SourcePos,
}

/// One exported name. Which fields are set depends on the table the entry
/// lands in:
///
/// - local: `export_name` and `local_name`
/// - indirect: `export_name`, `module_request` and `import_name`
/// - star: `module_request` and `import_name == All`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportEntry {
    pub export_name: Option<JsString>,
    pub module_request: Option<JsString>,
    pub import_name: Option<ImportName>,
    pub local_name: Option<JsString>,
    #[serde(flatten)]
    pub pos: SourcePos,
}

impl ExportEntry {
    /// `export { localName as exportName }` and declaration exports
    pub fn local(export_name: JsString, local_name: JsString, pos: SourcePos) -> Self {
        Self {
            export_name: Some(export_name),
            module_request: None,
            import_name: None,
            local_name: Some(local_name),
            pos,
        }
    }

    /// `export { importName as exportName } from "moduleRequest"`, or
    /// `export * from "moduleRequest"` when `export_name` is `None`
    pub fn from_module(
        export_name: Option<JsString>,
        module_request: JsString,
        import_name: ImportName,
        pos: SourcePos,
    ) -> Self {
        Self {
            export_name,
            module_request: Some(module_request),
            import_name: Some(import_name),
            local_name: None,
            pos,
        }
    }

    pub fn is_star(&self) -> bool {
        self.module_request.is_some() && self.import_name.as_ref().is_some_and(ImportName::is_all)
    }
}

/// The five tables a module is linked with
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleTables {
    pub requested_modules: Vec<RequestedModule>,
    pub import_entries: Vec<ImportEntry>,
    pub local_export_entries: Vec<ExportEntry>,
    pub indirect_export_entries: Vec<ExportEntry>,
    pub star_export_entries: Vec<ExportEntry>,
}

impl ModuleTables {
    /// The import that binds `local_name`, if any
    pub fn import_entry_for(&self, local_name: &str) -> Option<&ImportEntry> {
        find_import_entry(&self.import_entries, local_name)
    }
}

pub(crate) fn find_import_entry<'a>(
    entries: &'a [ImportEntry],
    local_name: &str,
) -> Option<&'a ImportEntry> {
    entries
        .iter()
        .find(|entry| entry.local_name.as_str() == local_name)
}
