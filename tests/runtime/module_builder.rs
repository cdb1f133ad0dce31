//! Sorting parsed import/export declarations into module tables

use super::create_test_context;
use jsproxy::module::{
    ExportDeclaration, ExportFromDeclaration, ExportFromSpecifier, ExportSpecifier,
    ImportDeclaration, ImportName, ImportSpecifier, ModuleTables, SourcePos,
};
use jsproxy::{Context, JsString, ModuleBuilder, ModuleObject, ModuleStatus};
use serde_json::json;

fn s(text: &str) -> JsString {
    JsString::from(text)
}

fn import(module: &str, specs: &[(ImportName, &str)]) -> ImportDeclaration {
    ImportDeclaration {
        module_request: s(module),
        pos: SourcePos::new(1, 20),
        specifiers: specs
            .iter()
            .map(|(import_name, local)| ImportSpecifier {
                import_name: import_name.clone(),
                local_name: s(local),
                pos: SourcePos::new(1, 9),
            })
            .collect(),
    }
}

fn export(local: &str, exported: &str) -> ExportDeclaration {
    ExportDeclaration::List(vec![ExportSpecifier {
        local_name: s(local),
        export_name: s(exported),
        pos: SourcePos::new(2, 9),
    }])
}

fn export_from(module: &str, specs: Vec<ExportFromSpecifier>) -> ExportFromDeclaration {
    ExportFromDeclaration {
        module_request: s(module),
        pos: SourcePos::new(3, 20),
        specifiers: specs,
    }
}

fn build(cx: &mut Context, steps: impl FnOnce(&mut ModuleBuilder)) -> ModuleTables {
    let module = ModuleObject::create(cx, None);
    let mut builder = ModuleBuilder::new(cx, &module);
    steps(&mut builder);
    builder.build_tables().unwrap();
    builder.init_module().unwrap().tables().unwrap()
}

#[test]
fn test_local_exports() {
    let mut cx = create_test_context();
    let tables = build(&mut cx, |b| {
        b.process_export(&export("x", "x")).unwrap();
        b.process_export(&export("y", "z")).unwrap();
        b.process_export(&ExportDeclaration::Variables(vec![s("v"), s("w")]))
            .unwrap();
        b.process_export(&ExportDeclaration::Class {
            name: Some(s("C")),
            is_default: false,
        })
        .unwrap();
    });

    let pairs: Vec<(String, String)> = tables
        .local_export_entries
        .iter()
        .map(|e| {
            (
                e.export_name.as_ref().map(|n| n.to_string()).unwrap_or_default(),
                e.local_name.as_ref().map(|n| n.to_string()).unwrap_or_default(),
            )
        })
        .collect();
    assert_eq!(
        pairs,
        vec![
            ("x".to_string(), "x".to_string()),
            ("z".to_string(), "y".to_string()),
            ("v".to_string(), "v".to_string()),
            ("w".to_string(), "w".to_string()),
            ("C".to_string(), "C".to_string()),
        ]
    );
    assert!(tables.indirect_export_entries.is_empty());
    assert!(tables.star_export_entries.is_empty());
    assert!(tables.requested_modules.is_empty());
}

#[test]
fn test_default_export_forms() {
    let mut cx = create_test_context();
    let tables = build(&mut cx, |b| {
        b.process_export(&ExportDeclaration::Function {
            name: None,
            is_default: true,
        })
        .unwrap();
    });
    let entry = tables.local_export_entries.first().unwrap();
    assert_eq!(entry.export_name, Some(s("default")));
    assert_eq!(entry.local_name, Some(s("*default*")));

    let tables = build(&mut cx, |b| {
        b.process_export(&ExportDeclaration::Function {
            name: Some(s("main")),
            is_default: true,
        })
        .unwrap();
    });
    let entry = tables.local_export_entries.first().unwrap();
    assert_eq!(entry.export_name, Some(s("default")));
    assert_eq!(entry.local_name, Some(s("main")));

    let tables = build(&mut cx, |b| {
        b.process_export(&ExportDeclaration::DefaultExpression).unwrap();
    });
    let entry = tables.local_export_entries.first().unwrap();
    assert_eq!(entry.local_name, Some(s("*default*")));
}

#[test]
fn test_anonymous_non_default_declaration_is_rejected() {
    let mut cx = create_test_context();
    let module = ModuleObject::create(&mut cx, None);
    let mut builder = ModuleBuilder::new(&cx, &module);
    let result = builder.process_export(&ExportDeclaration::Class {
        name: None,
        is_default: false,
    });
    assert!(result.is_err());
}

#[test]
fn test_reexports_of_imports() {
    let mut cx = create_test_context();
    let tables = build(&mut cx, |b| {
        b.process_import(&import(
            "m",
            &[
                (ImportName::Name(s("a")), "a"),
                (ImportName::Name(s("default")), "d"),
                (ImportName::All, "ns"),
            ],
        ))
        .unwrap();
        b.process_export(&export("a", "a")).unwrap();
        b.process_export(&export("d", "dflt")).unwrap();
        b.process_export(&export("ns", "ns")).unwrap();
    });

    // Named imports re-exported become indirect, namespace imports stay local
    assert_eq!(tables.indirect_export_entries.len(), 2);
    let a = tables.indirect_export_entries.first().unwrap();
    assert_eq!(a.export_name, Some(s("a")));
    assert_eq!(a.module_request, Some(s("m")));
    assert_eq!(a.import_name, Some(ImportName::Name(s("a"))));
    assert_eq!(a.local_name, None);
    let d = tables.indirect_export_entries.get(1).unwrap();
    assert_eq!(d.export_name, Some(s("dflt")));
    assert_eq!(d.import_name, Some(ImportName::Name(s("default"))));

    assert_eq!(tables.local_export_entries.len(), 1);
    let ns = tables.local_export_entries.first().unwrap();
    assert_eq!(ns.local_name, Some(s("ns")));

    assert_eq!(tables.import_entries.len(), 3);
    assert!(tables.import_entry_for("ns").is_some_and(|e| e.import_name.is_all()));
}

#[test]
fn test_export_from_forms() {
    let mut cx = create_test_context();
    let tables = build(&mut cx, |b| {
        b.process_export_from(&export_from(
            "m",
            vec![ExportFromSpecifier::Named {
                import_name: s("x"),
                export_name: s("y"),
                pos: SourcePos::new(3, 9),
            }],
        ))
        .unwrap();
        b.process_export_from(&export_from(
            "n",
            vec![ExportFromSpecifier::All {
                pos: SourcePos::new(4, 0),
            }],
        ))
        .unwrap();
        b.process_export_from(&export_from(
            "m",
            vec![ExportFromSpecifier::Named {
                import_name: s("default"),
                export_name: s("other"),
                pos: SourcePos::new(5, 9),
            }],
        ))
        .unwrap();
    });

    let requested: Vec<String> = tables
        .requested_modules
        .iter()
        .map(|r| r.specifier.to_string())
        .collect();
    assert_eq!(requested, vec!["m", "n"]);
    assert_eq!(tables.indirect_export_entries.len(), 2);
    assert_eq!(tables.star_export_entries.len(), 1);
    let star = tables.star_export_entries.first().unwrap();
    assert!(star.is_star());
    assert_eq!(star.export_name, None);
    assert_eq!(star.module_request, Some(s("n")));
    assert!(tables.local_export_entries.is_empty());
}

#[test]
fn test_duplicate_detection_helpers() {
    let mut cx = create_test_context();
    let module = ModuleObject::create(&mut cx, None);
    let mut builder = ModuleBuilder::new(&cx, &module);
    builder
        .process_import(&import("m", &[(ImportName::Name(s("a")), "a")]))
        .unwrap();
    builder
        .process_import(&import("n", &[(ImportName::All, "all")]))
        .unwrap();
    builder.process_export(&export("a", "shared")).unwrap();

    assert!(builder.has_exported_name("shared"));
    assert!(!builder.has_exported_name("a"));
    let names: Vec<String> = builder
        .imported_bound_names()
        .iter()
        .map(|n| n.to_string())
        .collect();
    assert_eq!(names, vec!["a", "all"]);
}

#[test]
fn test_init_module_installs_tables_once() {
    let mut cx = create_test_context();
    let module = ModuleObject::create(&mut cx, None);
    assert_eq!(module.status().unwrap(), ModuleStatus::Errored);

    let mut builder = ModuleBuilder::new(&cx, &module);
    builder.process_import(&import("dep", &[])).unwrap();
    builder.build_tables().unwrap();
    let module = builder.init_module().unwrap();
    assert_eq!(module.status().unwrap(), ModuleStatus::Uninstantiated);

    module.freeze().unwrap();
    assert!(module.is_frozen().unwrap());
    let builder = ModuleBuilder::new(&cx, &module);
    assert!(builder.init_module().is_err());
}

#[test]
fn test_tables_serialize_for_diagnostics() {
    let mut cx = create_test_context();
    let tables = build(&mut cx, |b| {
        b.process_export_from(&export_from(
            "m",
            vec![ExportFromSpecifier::All {
                pos: SourcePos::new(1, 0),
            }],
        ))
        .unwrap();
    });
    let value = serde_json::to_value(&tables).unwrap();
    assert_eq!(
        value["requestedModules"],
        json!([{ "specifier": "m", "line": 3, "column": 20 }])
    );
    assert_eq!(value["starExportEntries"][0]["importName"], "*");
    assert_eq!(value["starExportEntries"][0]["exportName"], serde_json::Value::Null);
}
