//! ES module records and namespace objects.
//!
//! - [`entries`]: import/export table rows and module status
//! - [`bindings`]: live name to environment-slot bindings
//! - [`record`]: the module object, its lifecycle and environments
//! - [`namespace`]: the proxy handler behind `import * as ns`
//! - [`builder`]: classification of parsed declarations into tables

pub mod bindings;
pub mod builder;
pub mod entries;
pub mod namespace;
pub mod record;

pub use bindings::{IndirectBinding, IndirectBindingMap};
pub use builder::{
    ExportDeclaration, ExportFromDeclaration, ExportFromSpecifier, ExportSpecifier,
    ImportDeclaration, ImportSpecifier, ModuleBuilder,
};
pub use entries::{
    ExportEntry, ImportEntry, ImportName, ModuleStatus, ModuleTables, RequestedModule, SourcePos,
};
pub use namespace::{MODULE_NAMESPACE_HANDLER, ModuleNamespace, NAMESPACE_FAMILY};
pub use record::{FunctionDeclaration, ModuleBody, ModuleObject, ModuleRecord};
