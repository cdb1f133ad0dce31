//! Script-style proxies whose traps are functions on a handler object

use super::{create_test_context, get, key_names, object_with};
use jsproxy::object_ops;
use jsproxy::proxy::{
    is_revoked, is_scripted_proxy, new_scripted_proxy, proxy_revocable, revoke, scripted_handler,
    scripted_target,
};
use jsproxy::value::{CallArgs, NativeFn, PropertyDescriptor};
use jsproxy::{Context, FailureCode, Gc, JsError, JsObjectRef, JsValue};

fn handler_with(cx: &mut Context, traps: &[(&str, NativeFn)]) -> JsObjectRef {
    let handler = cx.create_object();
    for (name, trap) in traps {
        let f = cx.create_function(name, *trap, 0);
        let key = cx.key(name);
        assert!(object_ops::set(cx, &handler, &key, JsValue::Object(f)).unwrap().ok());
    }
    handler
}

fn always_100(_cx: &mut Context, _args: &CallArgs) -> Result<JsValue, JsError> {
    Ok(JsValue::from(100))
}

fn always_false(_cx: &mut Context, _args: &CallArgs) -> Result<JsValue, JsError> {
    Ok(JsValue::from(false))
}

fn reversed_keys(cx: &mut Context, _args: &CallArgs) -> Result<JsValue, JsError> {
    let keys = cx.create_array(vec![JsValue::from("b"), JsValue::from("a")]);
    Ok(JsValue::Object(keys))
}

/// `get` trap that records the key on the handler (`this`)
fn recording_get(cx: &mut Context, args: &CallArgs) -> Result<JsValue, JsError> {
    if let JsValue::Object(handler) = &args.this {
        let key = cx.key("lastKey");
        object_ops::set(cx, handler, &key, args.arg(1))?.check_strict(Some(&key))?;
    }
    let JsValue::Object(target) = args.arg(0) else {
        return Err(JsError::type_error("get trap needs a target"));
    };
    let key = jsproxy::PropertyKey::from_value(&args.arg(1));
    object_ops::get(cx, &target, &key)
}

fn count_args(_cx: &mut Context, args: &CallArgs) -> Result<JsValue, JsError> {
    let JsValue::Object(list) = args.arg(2) else {
        return Err(JsError::type_error("apply trap needs an argument list"));
    };
    let length = list
        .borrow()
        .get_own_property(&jsproxy::PropertyKey::from("length"))
        .map(|p| p.value.clone())
        .unwrap_or_default();
    Ok(length)
}

fn identity(_cx: &mut Context, args: &CallArgs) -> Result<JsValue, JsError> {
    Ok(args.arg(0))
}

#[test]
fn test_missing_traps_forward_to_target() {
    let mut cx = create_test_context();
    let target = object_with(&mut cx, &[("a", JsValue::from(1))]);
    let handler = cx.create_object();
    let proxy = new_scripted_proxy(&mut cx, &target, &handler).unwrap();

    assert!(is_scripted_proxy(&proxy));
    assert_eq!(get(&mut cx, &proxy, "a"), JsValue::from(1));
    let b = cx.key("b");
    assert!(object_ops::set(&mut cx, &proxy, &b, JsValue::from(2)).unwrap().ok());
    assert_eq!(get(&mut cx, &target, "b"), JsValue::from(2));
    assert_eq!(key_names(&mut cx, &proxy), vec!["a", "b"]);

    let proto = object_ops::get_prototype(&mut cx, &proxy).unwrap();
    assert!(proto.is_some_and(|p| Gc::ptr_eq(&p, &cx.object_prototype)));
    assert!(scripted_target(&proxy).is_some_and(|t| Gc::ptr_eq(&t, &target)));
    assert!(scripted_handler(&proxy).is_some_and(|h| Gc::ptr_eq(&h, &handler)));
}

#[test]
fn test_get_trap_result_is_returned() {
    let mut cx = create_test_context();
    let target = cx.create_object();
    let handler = handler_with(&mut cx, &[("get", recording_get)]);
    let proxy = new_scripted_proxy(&mut cx, &target, &handler).unwrap();

    assert_eq!(get(&mut cx, &proxy, "anything"), JsValue::Undefined);
    assert_eq!(get(&mut cx, &handler, "lastKey"), JsValue::from("anything"));

    let handler = handler_with(&mut cx, &[("get", always_100)]);
    let proxy = new_scripted_proxy(&mut cx, &target, &handler).unwrap();
    assert_eq!(get(&mut cx, &proxy, "x"), JsValue::from(100));
}

#[test]
fn test_get_trap_cannot_lie_about_frozen_values() {
    let mut cx = create_test_context();
    let target = cx.create_object();
    let key = cx.key("fixed");
    let desc = PropertyDescriptor::data_with(JsValue::from(1), false, true, false);
    assert!(object_ops::define_property(&mut cx, &target, &key, &desc).unwrap().ok());

    let handler = handler_with(&mut cx, &[("get", always_100)]);
    let proxy = new_scripted_proxy(&mut cx, &target, &handler).unwrap();
    let result = object_ops::get(&mut cx, &proxy, &key);
    assert!(matches!(result, Err(JsError::TypeError { .. })));
    // Other keys are unconstrained
    assert_eq!(get(&mut cx, &proxy, "free"), JsValue::from(100));
}

#[test]
fn test_falsish_traps_report_failure() {
    let mut cx = create_test_context();
    let target = object_with(&mut cx, &[("a", JsValue::from(1))]);
    let handler = handler_with(
        &mut cx,
        &[
            ("set", always_false),
            ("deleteProperty", always_false),
            ("defineProperty", always_false),
        ],
    );
    let proxy = new_scripted_proxy(&mut cx, &target, &handler).unwrap();
    let a = cx.key("a");

    let result = object_ops::set(&mut cx, &proxy, &a, JsValue::from(2)).unwrap();
    assert_eq!(result.failure_code(), Some(FailureCode::TrapReturnedFalsish));
    let result = object_ops::delete_property(&mut cx, &proxy, &a).unwrap();
    assert_eq!(result.failure_code(), Some(FailureCode::TrapReturnedFalsish));
    let desc = PropertyDescriptor::data(JsValue::from(3));
    let result = object_ops::define_property(&mut cx, &proxy, &a, &desc).unwrap();
    assert_eq!(result.failure_code(), Some(FailureCode::TrapReturnedFalsish));
    assert_eq!(get(&mut cx, &target, "a"), JsValue::from(1));
}

#[test]
fn test_has_trap_cannot_hide_non_configurable() {
    let mut cx = create_test_context();
    let target = cx.create_object();
    let key = cx.key("pinned");
    let desc = PropertyDescriptor::data_with(JsValue::from(1), true, true, false);
    assert!(object_ops::define_property(&mut cx, &target, &key, &desc).unwrap().ok());

    let handler = handler_with(&mut cx, &[("has", always_false)]);
    let proxy = new_scripted_proxy(&mut cx, &target, &handler).unwrap();
    assert!(matches!(
        object_ops::has_property(&mut cx, &proxy, &key),
        Err(JsError::TypeError { .. })
    ));
    let other = cx.key("other");
    assert!(!object_ops::has_property(&mut cx, &proxy, &other).unwrap());
}

#[test]
fn test_own_keys_trap_order_and_invariants() {
    let mut cx = create_test_context();
    let target = cx.create_object();
    let handler = handler_with(&mut cx, &[("ownKeys", reversed_keys)]);
    let proxy = new_scripted_proxy(&mut cx, &target, &handler).unwrap();
    assert_eq!(key_names(&mut cx, &proxy), vec!["b", "a"]);

    // A non-configurable target key must be reported
    let key = cx.key("c");
    let desc = PropertyDescriptor::data_with(JsValue::from(1), true, true, false);
    assert!(object_ops::define_property(&mut cx, &target, &key, &desc).unwrap().ok());
    assert!(matches!(
        object_ops::own_property_keys(&mut cx, &proxy),
        Err(JsError::TypeError { .. })
    ));
}

#[test]
fn test_apply_trap_and_callability() {
    let mut cx = create_test_context();
    let target = cx.create_function("identity", identity, 1);
    let handler = handler_with(&mut cx, &[("apply", count_args)]);
    let proxy = new_scripted_proxy(&mut cx, &target, &handler).unwrap();
    assert!(object_ops::is_callable(&proxy));

    let result = object_ops::call(
        &mut cx,
        &JsValue::Object(proxy.clone()),
        JsValue::Undefined,
        vec![JsValue::from(1), JsValue::from(2), JsValue::from(3)],
    )
    .unwrap();
    assert_eq!(result, JsValue::from(3));

    let plain_target = cx.create_object();
    let plain = new_scripted_proxy(&mut cx, &plain_target, &handler).unwrap();
    assert!(!object_ops::is_callable(&plain));
}

#[test]
fn test_non_callable_trap_is_a_type_error() {
    let mut cx = create_test_context();
    let target = cx.create_object();
    let handler = object_with(&mut cx, &[("get", JsValue::from(5))]);
    let proxy = new_scripted_proxy(&mut cx, &target, &handler).unwrap();
    let key = cx.key("x");
    match object_ops::get(&mut cx, &proxy, &key) {
        Err(JsError::TypeError { message }) => assert!(message.contains("'get'")),
        other => panic!("expected a trap type error, got {:?}", other),
    }
}

#[test]
fn test_revocable_proxy() {
    let mut cx = create_test_context();
    let target = cx.create_function("identity", identity, 1);
    let handler = cx.create_object();
    let (proxy, revoke_fn) = proxy_revocable(&mut cx, &target, &handler).unwrap();
    assert!(!is_revoked(&proxy));

    let result = object_ops::call(
        &mut cx,
        &JsValue::Object(proxy.clone()),
        JsValue::Undefined,
        vec![JsValue::from(7)],
    )
    .unwrap();
    assert_eq!(result, JsValue::from(7));

    let revoker = JsValue::Object(revoke_fn);
    object_ops::call(&mut cx, &revoker, JsValue::Undefined, Vec::new()).unwrap();
    assert!(is_revoked(&proxy));
    assert!(scripted_target(&proxy).is_none());
    // Revoking twice is harmless
    object_ops::call(&mut cx, &revoker, JsValue::Undefined, Vec::new()).unwrap();

    let key = cx.key("x");
    assert!(matches!(
        object_ops::get(&mut cx, &proxy, &key),
        Err(JsError::TypeError { .. })
    ));
    // A revoked function proxy is still callable, the call itself fails
    assert!(object_ops::is_callable(&proxy));
    assert!(
        object_ops::call(&mut cx, &JsValue::Object(proxy.clone()), JsValue::Undefined, Vec::new())
            .is_err()
    );
    assert!(object_ops::is_array(&mut cx, &proxy).is_err());
}

#[test]
fn test_revoke_rejects_other_objects() {
    let mut cx = create_test_context();
    let plain = cx.create_object();
    assert!(revoke(&plain).is_err());
    assert!(!is_revoked(&plain));
}
