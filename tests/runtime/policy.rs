//! Security policies consulted on entry to a wrapper

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use super::{create_test_context, get, key_names, object_with};
use jsproxy::object_ops;
use jsproxy::proxy::{
    Action, PolicyVerdict, ProxyOptions, Wrapper, WrapperPolicy, checked_unwrap, new_wrapper,
    unchecked_unwrap, unwrap_one_checked,
};
use jsproxy::value::{CallArgs, PropertyDescriptor};
use jsproxy::{Context, FailureCode, Gc, JsError, JsObjectRef, JsValue, PropertyKey};

fn is_secret(key: Option<&PropertyKey>) -> bool {
    key.is_some_and(|k| *k == PropertyKey::from("secret"))
}

/// Hides `secret` and refuses every write, reporting defaults quietly
struct QuietDeny;

impl WrapperPolicy for QuietDeny {
    fn has_security_policy(&self) -> bool {
        true
    }

    fn enter(
        &self,
        _cx: &mut Context,
        _wrapper: &JsObjectRef,
        key: Option<&PropertyKey>,
        action: Action,
        _may_throw: bool,
    ) -> Result<PolicyVerdict, JsError> {
        if is_secret(key) || action.contains(Action::SET) || action.contains(Action::ENUMERATE) {
            return Ok(PolicyVerdict::Deny { return_value: true });
        }
        Ok(PolicyVerdict::Allow)
    }
}

/// Refuses everything and asks the caller to throw
struct ThrowingDeny;

impl WrapperPolicy for ThrowingDeny {
    fn has_security_policy(&self) -> bool {
        true
    }

    fn enter(
        &self,
        _cx: &mut Context,
        _wrapper: &JsObjectRef,
        _key: Option<&PropertyKey>,
        _action: Action,
        _may_throw: bool,
    ) -> Result<PolicyVerdict, JsError> {
        Ok(PolicyVerdict::Deny {
            return_value: false,
        })
    }
}

static ENTER_CALLS: AtomicUsize = AtomicUsize::new(0);

/// Counts `enter` calls but claims to have no policy
struct Counting;

impl WrapperPolicy for Counting {
    fn enter(
        &self,
        _cx: &mut Context,
        _wrapper: &JsObjectRef,
        _key: Option<&PropertyKey>,
        _action: Action,
        _may_throw: bool,
    ) -> Result<PolicyVerdict, JsError> {
        ENTER_CALLS.fetch_add(1, Ordering::SeqCst);
        Ok(PolicyVerdict::Deny { return_value: true })
    }
}

/// The policy check itself fails
struct Failing;

impl WrapperPolicy for Failing {
    fn has_security_policy(&self) -> bool {
        true
    }

    fn enter(
        &self,
        _cx: &mut Context,
        _wrapper: &JsObjectRef,
        _key: Option<&PropertyKey>,
        _action: Action,
        _may_throw: bool,
    ) -> Result<PolicyVerdict, JsError> {
        Err(JsError::type_error("policy lookup failed"))
    }
}

static SAW_NO_THROW: AtomicBool = AtomicBool::new(false);

/// Raises its own error, but only where the caller can report it
struct ThrowsWhenAllowed;

impl WrapperPolicy for ThrowsWhenAllowed {
    fn has_security_policy(&self) -> bool {
        true
    }

    fn enter(
        &self,
        _cx: &mut Context,
        _wrapper: &JsObjectRef,
        _key: Option<&PropertyKey>,
        _action: Action,
        may_throw: bool,
    ) -> Result<PolicyVerdict, JsError> {
        if may_throw {
            return Err(JsError::type_error("custom denial"));
        }
        SAW_NO_THROW.store(true, Ordering::SeqCst);
        Ok(PolicyVerdict::Deny { return_value: true })
    }
}

static QUIET_WRAPPER: Wrapper<QuietDeny> = Wrapper::new(0, false, QuietDeny);
static THROWING_WRAPPER: Wrapper<ThrowingDeny> = Wrapper::new(0, false, ThrowingDeny);
static COUNTING_WRAPPER: Wrapper<Counting> = Wrapper::new(0, false, Counting);
static FAILING_WRAPPER: Wrapper<Failing> = Wrapper::new(0, false, Failing);
static CAREFUL_WRAPPER: Wrapper<ThrowsWhenAllowed> = Wrapper::new(0, false, ThrowsWhenAllowed);

fn secret_holder(cx: &mut Context) -> JsObjectRef {
    object_with(
        cx,
        &[
            ("secret", JsValue::from("hidden")),
            ("open", JsValue::from("visible")),
        ],
    )
}

#[test]
fn test_quiet_denial_reports_defaults() {
    let mut cx = create_test_context();
    let target = secret_holder(&mut cx);
    let wrapper = new_wrapper(&mut cx, &target, &QUIET_WRAPPER, None, &ProxyOptions::new()).unwrap();

    assert_eq!(get(&mut cx, &wrapper, "open"), JsValue::from("visible"));
    assert_eq!(get(&mut cx, &wrapper, "secret"), JsValue::Undefined);

    let secret = cx.key("secret");
    assert!(!object_ops::has_property(&mut cx, &wrapper, &secret).unwrap());
    assert!(object_ops::get_own_property_descriptor(&mut cx, &wrapper, &secret)
        .unwrap()
        .is_none());

    let open = cx.key("open");
    let result = object_ops::set(&mut cx, &wrapper, &open, JsValue::from(1)).unwrap();
    assert_eq!(result.failure_code(), Some(FailureCode::AccessDenied));
    let desc = PropertyDescriptor::data(JsValue::from(1));
    let result = object_ops::define_property(&mut cx, &wrapper, &open, &desc).unwrap();
    assert_eq!(result.failure_code(), Some(FailureCode::AccessDenied));
    let result = object_ops::delete_property(&mut cx, &wrapper, &open).unwrap();
    assert_eq!(result.failure_code(), Some(FailureCode::AccessDenied));

    assert!(key_names(&mut cx, &wrapper).is_empty());
    assert_eq!(get(&mut cx, &target, "open"), JsValue::from("visible"));
    assert_eq!(cx.entered_policy_depth(), 0);
}

#[test]
fn test_throwing_denial_raises_access_error() {
    let mut cx = create_test_context();
    let target = secret_holder(&mut cx);
    let wrapper =
        new_wrapper(&mut cx, &target, &THROWING_WRAPPER, None, &ProxyOptions::new()).unwrap();

    let secret = cx.key("secret");
    match object_ops::get(&mut cx, &wrapper, &secret) {
        Err(JsError::AccessDenied { property }) => {
            assert_eq!(property.as_deref(), Some("secret"));
        }
        other => panic!("expected an access error, got {:?}", other),
    }
    assert!(matches!(
        object_ops::own_property_keys(&mut cx, &wrapper),
        Err(JsError::AccessDenied { property: None })
    ));
    assert_eq!(cx.entered_policy_depth(), 0);
}

#[test]
fn test_denied_queries_that_cannot_throw_fall_back() {
    let mut cx = create_test_context();
    let array = cx.create_array(Vec::new());
    let wrapper = new_wrapper(&mut cx, &array, &THROWING_WRAPPER, None, &ProxyOptions::new()).unwrap();
    assert_eq!(object_ops::class_name(&mut cx, &wrapper).unwrap(), "Object");

    fn noop(_cx: &mut Context, _args: &CallArgs) -> Result<JsValue, JsError> {
        Ok(JsValue::Undefined)
    }
    let f = cx.create_function("secretFunction", noop, 0);
    let fn_wrapper = new_wrapper(&mut cx, &f, &THROWING_WRAPPER, None, &ProxyOptions::new()).unwrap();
    let source = object_ops::fun_to_string(&mut cx, &fn_wrapper, false).unwrap();
    assert!(!source.as_str().contains("secretFunction"));
    assert!(source.as_str().contains("[native code]"));
}

#[test]
fn test_denied_construct_always_throws() {
    fn ctor(_cx: &mut Context, _args: &CallArgs) -> Result<JsValue, JsError> {
        Ok(JsValue::Undefined)
    }
    let mut cx = create_test_context();
    let f = cx.create_constructor("Thing", ctor, 0);
    let wrapper = new_wrapper(&mut cx, &f, &QUIET_WRAPPER, None, &ProxyOptions::new()).unwrap();
    assert!(object_ops::construct(&mut cx, &wrapper, Vec::new(), None).is_ok());

    let denied = new_wrapper(&mut cx, &f, &THROWING_WRAPPER, None, &ProxyOptions::new()).unwrap();
    assert!(matches!(
        object_ops::construct(&mut cx, &denied, Vec::new(), None),
        Err(JsError::AccessDenied { .. })
    ));
}

#[test]
fn test_enter_skipped_without_security_policy() {
    let mut cx = create_test_context();
    let target = secret_holder(&mut cx);
    let wrapper =
        new_wrapper(&mut cx, &target, &COUNTING_WRAPPER, None, &ProxyOptions::new()).unwrap();

    let before = ENTER_CALLS.load(Ordering::SeqCst);
    assert_eq!(get(&mut cx, &wrapper, "secret"), JsValue::from("hidden"));
    let key = cx.key("added");
    assert!(object_ops::set(&mut cx, &wrapper, &key, JsValue::from(1)).unwrap().ok());
    assert_eq!(key_names(&mut cx, &wrapper).len(), 3);
    assert_eq!(ENTER_CALLS.load(Ordering::SeqCst), before);

    // Without a policy, checked unwrapping looks straight through
    let unwrapped = checked_unwrap(&cx, &wrapper, false).unwrap();
    assert!(Gc::ptr_eq(&unwrapped, &target));
}

#[test]
fn test_policy_errors_propagate_and_leave_no_entry() {
    let mut cx = create_test_context();
    let target = secret_holder(&mut cx);
    let wrapper = new_wrapper(&mut cx, &target, &FAILING_WRAPPER, None, &ProxyOptions::new()).unwrap();

    let key = cx.key("open");
    match object_ops::get(&mut cx, &wrapper, &key) {
        Err(JsError::TypeError { message }) => assert_eq!(message, "policy lookup failed"),
        other => panic!("expected the policy error, got {:?}", other),
    }
    assert_eq!(cx.entered_policy_depth(), 0);
}

#[test]
fn test_checked_unwrap_stops_at_policy() {
    let mut cx = create_test_context();
    let target = cx.create_object();
    let guarded = new_wrapper(&mut cx, &target, &QUIET_WRAPPER, None, &ProxyOptions::new()).unwrap();
    let outer = new_wrapper(&mut cx, &guarded, Wrapper::SINGLETON, None, &ProxyOptions::new()).unwrap();

    assert!(unwrap_one_checked(&guarded).is_none());
    assert!(unwrap_one_checked(&outer).is_some_and(|o| Gc::ptr_eq(&o, &guarded)));
    assert!(checked_unwrap(&cx, &outer, false).is_none());

    let mut flags = 0;
    let unwrapped = unchecked_unwrap(&cx, &outer, false, &mut flags);
    assert!(Gc::ptr_eq(&unwrapped, &target));
    assert_eq!(flags, 0);
}

#[test]
fn test_policy_learns_when_caller_cannot_throw() {
    let mut cx = create_test_context();
    let target = secret_holder(&mut cx);
    let wrapper =
        new_wrapper(&mut cx, &target, &CAREFUL_WRAPPER, None, &ProxyOptions::new()).unwrap();

    let key = cx.key("open");
    match object_ops::get(&mut cx, &wrapper, &key) {
        Err(JsError::TypeError { message }) => assert_eq!(message, "custom denial"),
        other => panic!("expected the policy error, got {:?}", other),
    }

    assert_eq!(object_ops::class_name(&mut cx, &wrapper).unwrap(), "Object");
    assert!(SAW_NO_THROW.load(Ordering::SeqCst));
    assert_eq!(cx.entered_policy_depth(), 0);
}

#[test]
fn test_failing_policy_cannot_break_non_throwing_queries() {
    fn noop(_cx: &mut Context, _args: &CallArgs) -> Result<JsValue, JsError> {
        Ok(JsValue::Undefined)
    }
    let mut cx = create_test_context();
    let target = secret_holder(&mut cx);
    let wrapper = new_wrapper(&mut cx, &target, &FAILING_WRAPPER, None, &ProxyOptions::new()).unwrap();
    assert_eq!(object_ops::class_name(&mut cx, &wrapper).unwrap(), "Object");

    let f = cx.create_function("hidden", noop, 0);
    let fn_wrapper = new_wrapper(&mut cx, &f, &FAILING_WRAPPER, None, &ProxyOptions::new()).unwrap();
    assert_eq!(object_ops::class_name(&mut cx, &fn_wrapper).unwrap(), "Function");
    let source = object_ops::fun_to_string(&mut cx, &fn_wrapper, false).unwrap();
    assert!(source.as_str().contains("[native code]"));
    assert_eq!(cx.entered_policy_depth(), 0);
}
