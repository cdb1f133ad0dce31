//! Instantiation and evaluation of module records

use super::create_test_context;
use jsproxy::module::ModuleTables;
use jsproxy::value::{BindingKind, CallArgs};
use jsproxy::{Context, JsError, JsString, JsValue, ModuleObject, ModuleStatus, object_ops};

fn ready_module(cx: &mut Context, body: Option<jsproxy::module::ModuleBody>, names: &[&str]) -> ModuleObject {
    let module = ModuleObject::create(cx, body);
    let env = cx.create_environment(None);
    if let Some(scope) = env.borrow_mut().as_environment_mut() {
        for name in names {
            scope.declare(JsString::from(*name), BindingKind::Let);
        }
    }
    module.set_initial_environment(&env).unwrap();
    module.init_import_export_data(ModuleTables::default()).unwrap();
    module
}

fn sets_answer(_cx: &mut Context, module: &ModuleObject) -> Result<JsValue, JsError> {
    module.initialize_binding("answer", JsValue::from(42))?;
    Ok(JsValue::from("done"))
}

fn throws(_cx: &mut Context, _module: &ModuleObject) -> Result<JsValue, JsError> {
    Err(JsError::thrown(JsValue::from("boom")))
}

fn calls_hoisted(cx: &mut Context, module: &ModuleObject) -> Result<JsValue, JsError> {
    let f = module.get_binding_value("helper")?;
    object_ops::call(cx, &f, JsValue::Undefined, Vec::new())
}

fn helper(_cx: &mut Context, args: &CallArgs) -> Result<JsValue, JsError> {
    // Closures created for module functions capture the module environment
    let captured = args
        .callee
        .borrow()
        .as_function()
        .is_some_and(|f| f.environment.is_some());
    Ok(JsValue::from(captured))
}

#[test]
fn test_instantiate_then_evaluate() {
    let mut cx = create_test_context();
    let module = ready_module(&mut cx, Some(sets_answer), &["answer"]);
    assert_eq!(module.status().unwrap(), ModuleStatus::Uninstantiated);
    assert!(module.environment().unwrap().is_none());

    module.instantiate(&mut cx).unwrap();
    assert_eq!(module.status().unwrap(), ModuleStatus::Instantiated);
    let env = module.environment().unwrap().unwrap();
    let initial = module.initial_environment().unwrap().unwrap();
    assert!(jsproxy::Gc::ptr_eq(&env, &initial));
    assert!(module.get_binding_value("answer").is_err());

    assert_eq!(module.evaluate(&mut cx).unwrap(), JsValue::from("done"));
    assert_eq!(module.status().unwrap(), ModuleStatus::Evaluated);
    assert_eq!(module.get_binding_value("answer").unwrap(), JsValue::from(42));

    // Evaluating again does not rerun the body
    assert_eq!(module.evaluate(&mut cx).unwrap(), JsValue::Undefined);
    module.instantiate(&mut cx).unwrap();
    assert_eq!(module.status().unwrap(), ModuleStatus::Evaluated);
}

#[test]
fn test_evaluate_before_instantiate_fails() {
    let mut cx = create_test_context();
    let module = ready_module(&mut cx, Some(sets_answer), &["answer"]);
    assert!(matches!(module.evaluate(&mut cx), Err(JsError::Internal(_))));
    assert!(module.execute(&mut cx).is_err());
    assert_eq!(module.status().unwrap(), ModuleStatus::Uninstantiated);
}

#[test]
fn test_throwing_body_errors_the_module() {
    let mut cx = create_test_context();
    let module = ready_module(&mut cx, Some(throws), &[]);
    module.instantiate(&mut cx).unwrap();

    let err = module.evaluate(&mut cx).unwrap_err();
    assert_eq!(err.thrown_value(), Some(&JsValue::from("boom")));
    assert_eq!(module.status().unwrap(), ModuleStatus::Errored);
    assert_eq!(module.error().unwrap(), Some(JsValue::from("boom")));

    // The recorded error is rethrown from then on
    let again = module.evaluate(&mut cx).unwrap_err();
    assert_eq!(again.thrown_value(), Some(&JsValue::from("boom")));
    let link = module.instantiate(&mut cx).unwrap_err();
    assert_eq!(link.thrown_value(), Some(&JsValue::from("boom")));
}

#[test]
fn test_instantiate_without_environment_records_error() {
    let mut cx = create_test_context();
    let module = ModuleObject::create(&mut cx, None);
    module.init_import_export_data(ModuleTables::default()).unwrap();

    assert!(module.instantiate(&mut cx).is_err());
    assert_eq!(module.status().unwrap(), ModuleStatus::Errored);
    let recorded = module.error().unwrap().unwrap();
    assert!(recorded.to_js_string().as_str().contains("no initial environment"));
}

#[test]
fn test_hoisted_functions_exist_before_body_runs() {
    let mut cx = create_test_context();
    let module = ready_module(&mut cx, Some(calls_hoisted), &[]);
    module
        .note_function_declaration(JsString::from("helper"), helper, 0)
        .unwrap();

    module.instantiate(&mut cx).unwrap();
    assert!(module
        .describe()
        .unwrap()
        .get("pendingFunctionDeclarations")
        .is_some_and(|v| v.is_null()));
    assert_eq!(module.evaluate(&mut cx).unwrap(), JsValue::from(true));
}

#[test]
fn test_host_defined_field_round_trips() {
    let mut cx = create_test_context();
    let module = ready_module(&mut cx, None, &[]);
    assert_eq!(module.host_defined_field().unwrap(), JsValue::Undefined);

    let data = cx.create_object();
    module.set_host_defined_field(JsValue::Object(data.clone())).unwrap();
    cx.gc();
    assert_eq!(module.host_defined_field().unwrap(), JsValue::Object(data));
}

#[test]
fn test_from_object_recognizes_modules() {
    let mut cx = create_test_context();
    let module = ready_module(&mut cx, None, &[]);
    let same = ModuleObject::from_object(module.as_object()).unwrap();
    assert_eq!(same, module);

    let plain = cx.create_object();
    assert!(ModuleObject::from_object(&plain).is_none());
    assert!(!object_ops::is_extensible(&mut cx, module.as_object()).unwrap());
}

#[test]
fn test_reinstalling_tables_cannot_rewind_status() {
    let mut cx = create_test_context();
    let module = ready_module(&mut cx, Some(sets_answer), &["answer"]);
    module.instantiate(&mut cx).unwrap();
    module.evaluate(&mut cx).unwrap();
    assert_eq!(module.status().unwrap(), ModuleStatus::Evaluated);

    let result = module.init_import_export_data(ModuleTables::default());
    assert!(matches!(result, Err(JsError::Internal(_))));
    assert_eq!(module.status().unwrap(), ModuleStatus::Evaluated);
}

#[test]
fn test_reinstalling_tables_keeps_recorded_error() {
    let mut cx = create_test_context();
    let module = ModuleObject::create(&mut cx, None);
    module.set_errored(JsValue::from("boom")).unwrap();

    let result = module.init_import_export_data(ModuleTables::default());
    assert!(matches!(result, Err(JsError::Internal(_))));
    assert_eq!(module.status().unwrap(), ModuleStatus::Errored);
    assert_eq!(module.error().unwrap(), Some(JsValue::from("boom")));

    let failed = ready_module(&mut cx, Some(throws), &[]);
    module_fails(&mut cx, &failed);
    assert!(failed.init_import_export_data(ModuleTables::default()).is_err());
    assert_eq!(failed.error().unwrap(), Some(JsValue::from("boom")));
}

fn module_fails(cx: &mut Context, module: &ModuleObject) {
    module.instantiate(cx).unwrap();
    assert!(module.evaluate(cx).is_err());
    assert_eq!(module.status().unwrap(), ModuleStatus::Errored);
}
