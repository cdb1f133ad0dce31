//! Module namespace objects as seen through generic object operations

use super::{create_test_context, key_names};
use jsproxy::module::{ExportDeclaration, ExportSpecifier, ImportDeclaration, ImportName, ImportSpecifier, SourcePos};
use jsproxy::value::{BindingKind, PropertyDescriptor};
use jsproxy::{
    Context, FailureCode, JsError, JsObjectRef, JsString, JsValue, ModuleBuilder, ModuleNamespace,
    ModuleObject, object_ops,
};

fn s(text: &str) -> JsString {
    JsString::from(text)
}

fn environment_with(cx: &mut Context, names: &[(&str, BindingKind)]) -> JsObjectRef {
    let env = cx.create_environment(None);
    if let Some(scope) = env.borrow_mut().as_environment_mut() {
        for (name, kind) in names {
            scope.declare(s(name), *kind);
        }
    }
    env
}

/// `let a; var b; export { a, b as renamed }; export const later = ..;`
fn library(cx: &mut Context) -> ModuleObject {
    let module = ModuleObject::create(cx, None);
    let env = environment_with(
        cx,
        &[
            ("a", BindingKind::Let),
            ("b", BindingKind::Var),
            ("later", BindingKind::Const),
        ],
    );
    module.set_initial_environment(&env).unwrap();

    let mut builder = ModuleBuilder::new(cx, &module);
    builder
        .process_export(&ExportDeclaration::List(vec![
            ExportSpecifier {
                local_name: s("a"),
                export_name: s("a"),
                pos: SourcePos::new(1, 9),
            },
            ExportSpecifier {
                local_name: s("b"),
                export_name: s("renamed"),
                pos: SourcePos::new(1, 12),
            },
        ]))
        .unwrap();
    builder
        .process_export(&ExportDeclaration::Variables(vec![s("later")]))
        .unwrap();
    builder.build_tables().unwrap();
    let module = builder.init_module().unwrap();
    module.instantiate(cx).unwrap();
    module
}

fn get(cx: &mut Context, ns: &JsObjectRef, name: &str) -> Result<JsValue, JsError> {
    let key = cx.key(name);
    object_ops::get(cx, ns, &key)
}

#[test]
fn test_namespace_reads_live_bindings() {
    let mut cx = create_test_context();
    let module = library(&mut cx);
    let ns = module.get_or_create_namespace(&mut cx).unwrap();

    module.initialize_binding("a", JsValue::from(1)).unwrap();
    assert_eq!(get(&mut cx, &ns, "a").unwrap(), JsValue::from(1));
    module.initialize_binding("a", JsValue::from(2)).unwrap();
    assert_eq!(get(&mut cx, &ns, "a").unwrap(), JsValue::from(2));

    // var bindings start out undefined rather than in the dead zone
    assert_eq!(get(&mut cx, &ns, "renamed").unwrap(), JsValue::Undefined);
    module.initialize_binding("b", JsValue::from("bee")).unwrap();
    assert_eq!(get(&mut cx, &ns, "renamed").unwrap(), JsValue::from("bee"));

    assert_eq!(get(&mut cx, &ns, "b").unwrap(), JsValue::Undefined);
    assert_eq!(get(&mut cx, &ns, "missing").unwrap(), JsValue::Undefined);

    // Repeated requests hand back the same object
    let again = module.get_or_create_namespace(&mut cx).unwrap();
    assert!(jsproxy::Gc::ptr_eq(&ns, &again));
}

#[test]
fn test_dead_zone_reads_throw() {
    let mut cx = create_test_context();
    let module = library(&mut cx);
    let ns = module.get_or_create_namespace(&mut cx).unwrap();

    let err = get(&mut cx, &ns, "later").unwrap_err();
    assert!(matches!(err, JsError::ReferenceError { .. }));

    let key = cx.key("later");
    assert!(object_ops::get_own_property_descriptor(&mut cx, &ns, &key).is_err());
    // Existence does not depend on initialization
    assert!(object_ops::has_property(&mut cx, &ns, &key).unwrap());

    module.initialize_binding("later", JsValue::from(3)).unwrap();
    let prop = object_ops::get_own_property_descriptor(&mut cx, &ns, &key)
        .unwrap()
        .unwrap();
    assert_eq!(prop.value, JsValue::from(3));
    assert!(prop.writable && prop.enumerable && !prop.configurable);
}

#[test]
fn test_namespace_writes_always_fail() {
    let mut cx = create_test_context();
    let module = library(&mut cx);
    module.initialize_binding("a", JsValue::from(1)).unwrap();
    let ns = module.get_or_create_namespace(&mut cx).unwrap();

    let a = cx.key("a");
    let result = object_ops::set(&mut cx, &ns, &a, JsValue::from(9)).unwrap();
    assert_eq!(result.failure_code(), Some(FailureCode::ReadOnly));
    assert!(matches!(result.check_strict(Some(&a)), Err(JsError::TypeError { .. })));

    let fresh = cx.key("fresh");
    let result = object_ops::set(&mut cx, &ns, &fresh, JsValue::from(9)).unwrap();
    assert!(!result.ok());
    assert_eq!(get(&mut cx, &ns, "a").unwrap(), JsValue::from(1));

    // Redefining with the current value and attributes is allowed
    let same = PropertyDescriptor::data_with(JsValue::from(1), true, true, false);
    assert!(object_ops::define_property(&mut cx, &ns, &a, &same).unwrap().ok());
    let changed = PropertyDescriptor::data(JsValue::from(5));
    assert_eq!(
        object_ops::define_property(&mut cx, &ns, &a, &changed)
            .unwrap()
            .failure_code(),
        Some(FailureCode::CantRedefineProp)
    );
}

#[test]
fn test_own_keys_are_sorted_exports_and_tag() {
    let mut cx = create_test_context();
    let module = library(&mut cx);
    let ns = module.get_or_create_namespace(&mut cx).unwrap();

    assert_eq!(
        key_names(&mut cx, &ns),
        vec!["a", "later", "renamed", "Symbol(Symbol.toStringTag)"]
    );
    let exports: Vec<String> = ModuleNamespace::exports(&ns)
        .iter()
        .map(|name| name.to_string())
        .collect();
    assert_eq!(exports, vec!["a", "later", "renamed"]);

    let tag = cx.to_string_tag_key();
    assert_eq!(object_ops::get(&mut cx, &ns, &tag).unwrap(), JsValue::from("Module"));
    assert_eq!(object_ops::class_name(&mut cx, &ns).unwrap(), "Module");
}

#[test]
fn test_delete_fails_only_for_existing_names() {
    let mut cx = create_test_context();
    let module = library(&mut cx);
    let ns = module.get_or_create_namespace(&mut cx).unwrap();

    let a = cx.key("a");
    assert_eq!(
        object_ops::delete_property(&mut cx, &ns, &a)
            .unwrap()
            .failure_code(),
        Some(FailureCode::CantDelete)
    );
    let tag = cx.to_string_tag_key();
    assert!(!object_ops::delete_property(&mut cx, &ns, &tag).unwrap().ok());
    let missing = cx.key("missing");
    assert!(object_ops::delete_property(&mut cx, &ns, &missing).unwrap().ok());
    let other = cx.new_symbol(Some("other"));
    let other = jsproxy::PropertyKey::Symbol(other);
    assert!(object_ops::delete_property(&mut cx, &ns, &other).unwrap().ok());
}

#[test]
fn test_reexported_import_reads_through() {
    let mut cx = create_test_context();
    let lib = library(&mut cx);
    lib.initialize_binding("a", JsValue::from("from lib")).unwrap();

    // import { a as x } from "lib"; export { x as y };
    let main = ModuleObject::create(&mut cx, None);
    let env = environment_with(&mut cx, &[]);
    main.set_initial_environment(&env).unwrap();
    let mut builder = ModuleBuilder::new(&cx, &main);
    builder
        .process_import(&ImportDeclaration {
            module_request: s("lib"),
            pos: SourcePos::new(1, 22),
            specifiers: vec![ImportSpecifier {
                import_name: ImportName::Name(s("a")),
                local_name: s("x"),
                pos: SourcePos::new(1, 9),
            }],
        })
        .unwrap();
    builder
        .process_export(&ExportDeclaration::List(vec![ExportSpecifier {
            local_name: s("x"),
            export_name: s("y"),
            pos: SourcePos::new(2, 9),
        }]))
        .unwrap();
    builder.build_tables().unwrap();
    let main = builder.init_module().unwrap();
    main.add_import_binding(s("x"), &lib, "a").unwrap();
    // Only names bound by an import entry can be linked
    assert!(main.add_import_binding(s("stray"), &lib, "a").is_err());
    main.instantiate(&mut cx).unwrap();

    assert_eq!(main.get_binding_value("x").unwrap(), JsValue::from("from lib"));
    let ns = main.get_or_create_namespace(&mut cx).unwrap();
    assert_eq!(get(&mut cx, &ns, "y").unwrap(), JsValue::from("from lib"));

    lib.initialize_binding("a", JsValue::from("updated")).unwrap();
    assert_eq!(get(&mut cx, &ns, "y").unwrap(), JsValue::from("updated"));
}

#[test]
fn test_loader_adds_star_export_bindings() {
    let mut cx = create_test_context();
    let lib = library(&mut cx);
    lib.initialize_binding("b", JsValue::from(10)).unwrap();

    let main = ModuleObject::create(&mut cx, None);
    let ns = main.create_namespace(&mut cx, vec![s("b")]).unwrap();
    assert_eq!(ModuleNamespace::module(&ns), Some(main.clone()));
    // Listed but not yet bound
    assert_eq!(get(&mut cx, &ns, "b").unwrap(), JsValue::Undefined);

    ModuleNamespace::add_binding(&ns, s("b"), &lib, "b").unwrap();
    assert_eq!(get(&mut cx, &ns, "b").unwrap(), JsValue::from(10));
    assert!(ModuleNamespace::add_binding(&ns, s("b"), &lib, "b").is_err());
    assert!(ModuleNamespace::add_binding(&ns, s("c"), &lib, "nope").is_err());

    // Names outside the export list stay invisible
    assert!(ModuleNamespace::add_binding(&ns, s("zzz"), &lib, "a").is_err());
    let zzz = cx.key("zzz");
    assert!(!object_ops::has_property(&mut cx, &ns, &zzz).unwrap());
    assert_eq!(key_names(&mut cx, &ns), vec!["b", "Symbol(Symbol.toStringTag)"]);

    let plain = cx.create_object();
    assert!(!ModuleNamespace::is_namespace(&plain));
    assert!(ModuleNamespace::add_binding(&plain, s("b"), &lib, "b").is_err());
}
