//! Transparent wrappers forward every operation to their target

use super::{create_test_context, get, key_names, object_with};
use jsproxy::object_ops;
use jsproxy::proxy::{
    PrototypeIfOrdinary, ProxyOptions, Wrapper, handler_of, is_proxy, is_wrapper, new_wrapper,
    proxy_private, renew_proxy, swap_objects, unwrap_fully, wrapped_object,
};
use jsproxy::value::{CallArgs, PropertyDescriptor};
use jsproxy::{Context, Gc, JsError, JsObjectRef, JsValue};

fn wrap(cx: &mut Context, target: &JsObjectRef) -> JsObjectRef {
    new_wrapper(cx, target, Wrapper::SINGLETON, None, &ProxyOptions::new()).unwrap()
}

#[test]
fn test_get_and_set_reach_target() {
    let mut cx = create_test_context();
    let target = object_with(&mut cx, &[("x", JsValue::from(1))]);
    let wrapper = wrap(&mut cx, &target);

    assert_eq!(get(&mut cx, &wrapper, "x"), JsValue::from(1));

    let key = cx.key("y");
    assert!(object_ops::set(&mut cx, &wrapper, &key, JsValue::from(2)).unwrap().ok());
    assert_eq!(get(&mut cx, &target, "y"), JsValue::from(2));
    assert!(object_ops::has_property(&mut cx, &wrapper, &key).unwrap());
    assert_eq!(get(&mut cx, &wrapper, "missing"), JsValue::Undefined);
}

#[test]
fn test_define_delete_and_keys_reach_target() {
    let mut cx = create_test_context();
    let target = object_with(&mut cx, &[("a", JsValue::from(1))]);
    let wrapper = wrap(&mut cx, &target);

    let key = cx.key("fixed");
    let desc = PropertyDescriptor::data_with(JsValue::from(7), false, true, false);
    assert!(object_ops::define_property(&mut cx, &wrapper, &key, &desc).unwrap().ok());

    let prop = object_ops::get_own_property_descriptor(&mut cx, &target, &key)
        .unwrap()
        .unwrap();
    assert_eq!(prop.value, JsValue::from(7));
    assert!(!prop.writable && !prop.configurable);

    assert_eq!(key_names(&mut cx, &wrapper), vec!["a", "fixed"]);

    // Non-configurable on the target, so deletion fails through the wrapper too
    assert!(!object_ops::delete_property(&mut cx, &wrapper, &key).unwrap().ok());
    let a = cx.key("a");
    assert!(object_ops::delete_property(&mut cx, &wrapper, &a).unwrap().ok());
    assert_eq!(key_names(&mut cx, &target), vec!["fixed"]);
}

#[test]
fn test_extensibility_forwards() {
    let mut cx = create_test_context();
    let target = cx.create_object();
    let wrapper = wrap(&mut cx, &target);

    assert!(object_ops::is_extensible(&mut cx, &wrapper).unwrap());
    assert!(object_ops::prevent_extensions(&mut cx, &wrapper).unwrap().ok());
    assert!(!object_ops::is_extensible(&mut cx, &target).unwrap());

    let key = cx.key("late");
    assert!(!object_ops::set(&mut cx, &wrapper, &key, JsValue::from(1)).unwrap().ok());
}

fn double(_cx: &mut Context, args: &CallArgs) -> Result<JsValue, JsError> {
    Ok(JsValue::Number(args.arg(0).to_number() * 2.0))
}

fn make_point(cx: &mut Context, args: &CallArgs) -> Result<JsValue, JsError> {
    if let JsValue::Object(this) = &args.this {
        let key = cx.key("x");
        object_ops::set(cx, this, &key, args.arg(0))?.check_strict(Some(&key))?;
    }
    Ok(JsValue::Undefined)
}

#[test]
fn test_call_and_construct_forward() {
    let mut cx = create_test_context();
    let f = cx.create_function("double", double, 1);
    let wrapper = wrap(&mut cx, &f);
    assert!(object_ops::is_callable(&wrapper));
    assert!(!object_ops::is_constructor(&wrapper));

    let result = object_ops::call(
        &mut cx,
        &JsValue::Object(wrapper.clone()),
        JsValue::Undefined,
        vec![JsValue::from(21)],
    )
    .unwrap();
    assert_eq!(result, JsValue::from(42));

    let ctor = cx.create_constructor("Point", make_point, 1);
    let ctor_wrapper = wrap(&mut cx, &ctor);
    assert!(object_ops::is_constructor(&ctor_wrapper));
    let point = object_ops::construct(&mut cx, &ctor_wrapper, vec![JsValue::from(3)], None).unwrap();
    assert_eq!(get(&mut cx, &point, "x"), JsValue::from(3));
    // `new wrapper()` builds an instance of the target
    let instance = JsValue::Object(point);
    assert!(object_ops::has_instance(&mut cx, &ctor, &instance).unwrap());
}

#[test]
fn test_calling_a_plain_object_wrapper_fails() {
    let mut cx = create_test_context();
    let target = cx.create_object();
    let wrapper = wrap(&mut cx, &target);
    assert!(!object_ops::is_callable(&wrapper));
    let result = object_ops::call(
        &mut cx,
        &JsValue::Object(wrapper),
        JsValue::Undefined,
        Vec::new(),
    );
    assert!(matches!(result, Err(JsError::TypeError { .. })));
}

#[test]
fn test_builtin_queries_see_the_target() {
    let mut cx = create_test_context();
    let array = cx.create_array(vec![JsValue::from(1)]);
    let wrapper = wrap(&mut cx, &array);
    assert!(object_ops::is_array(&mut cx, &wrapper).unwrap());
    assert_eq!(object_ops::class_name(&mut cx, &wrapper).unwrap(), "Array");

    let boxed = cx.create_boxed(JsValue::from("text")).unwrap();
    let boxed_wrapper = wrap(&mut cx, &boxed);
    assert_eq!(
        object_ops::unbox(&mut cx, &boxed_wrapper).unwrap(),
        Some(JsValue::from("text"))
    );

    let re = cx.create_regexp("a+", "g");
    let re_wrapper = wrap(&mut cx, &re);
    let shared = object_ops::regexp_source(&mut cx, &re_wrapper).unwrap().unwrap();
    assert_eq!(shared.source.as_str(), "a+");
}

#[test]
fn test_wrapper_with_prototype_walks_its_own_chain() {
    let mut cx = create_test_context();
    let proto = object_with(&mut cx, &[("inherited", JsValue::from("proto"))]);
    let target = object_with(&mut cx, &[("own", JsValue::from("target"))]);
    let wrapper = new_wrapper(
        &mut cx,
        &target,
        Wrapper::SINGLETON_WITH_PROTOTYPE,
        Some(proto.clone()),
        &ProxyOptions::new(),
    )
    .unwrap();

    assert_eq!(get(&mut cx, &wrapper, "own"), JsValue::from("target"));
    assert_eq!(get(&mut cx, &wrapper, "inherited"), JsValue::from("proto"));
    let inherited = cx.key("inherited");
    assert!(object_ops::has_property(&mut cx, &wrapper, &inherited).unwrap());
    assert!(!object_ops::has_own_property(&mut cx, &wrapper, &inherited).unwrap());

    // Assigning an inherited name creates an own property on the target
    assert!(object_ops::set(&mut cx, &wrapper, &inherited, JsValue::from(5)).unwrap().ok());
    assert_eq!(get(&mut cx, &target, "inherited"), JsValue::from(5));
    assert_eq!(get(&mut cx, &proto, "inherited"), JsValue::from("proto"));

    let keys: Vec<String> = object_ops::enumerate(&mut cx, &wrapper)
        .unwrap()
        .iter()
        .map(|key| key.to_string())
        .collect();
    assert_eq!(keys, vec!["own", "inherited"]);
}

#[test]
fn test_lazy_prototype_comes_from_target() {
    let mut cx = create_test_context();
    let proto = cx.create_object();
    let target = cx.create_object_with_proto(Some(proto.clone()));
    let wrapper = new_wrapper(
        &mut cx,
        &target,
        Wrapper::SINGLETON,
        None,
        &ProxyOptions::new().with_lazy_proto(true),
    )
    .unwrap();

    let seen = object_ops::get_prototype(&mut cx, &wrapper).unwrap();
    assert!(seen.is_some_and(|p| Gc::ptr_eq(&p, &proto)));
    assert!(matches!(
        object_ops::get_prototype_if_ordinary(&mut cx, &wrapper).unwrap(),
        PrototypeIfOrdinary::NotOrdinary
    ));

    assert!(object_ops::set_prototype(&mut cx, &wrapper, None).unwrap().ok());
    assert!(object_ops::get_prototype(&mut cx, &target).unwrap().is_none());
}

#[test]
fn test_static_prototype_is_rejected_for_lazy_proxies() {
    let mut cx = create_test_context();
    let target = cx.create_object();
    let proto = cx.create_object();
    let options = ProxyOptions::new().with_lazy_proto(true);
    let result = new_wrapper(&mut cx, &target, Wrapper::SINGLETON, Some(proto), &options);
    assert!(matches!(result, Err(JsError::Internal(_))));
}

#[test]
fn test_weakmap_key_delegate_is_fully_unwrapped_target() {
    let mut cx = create_test_context();
    let target = cx.create_object();
    let inner = wrap(&mut cx, &target);
    let outer = wrap(&mut cx, &inner);

    let handler = handler_of(&outer).unwrap();
    let delegate = handler.weakmap_key_delegate(&outer).unwrap();
    assert!(Gc::ptr_eq(&delegate, &target));
    assert!(Gc::ptr_eq(&delegate, &unwrap_fully(&outer)));
}

#[test]
fn test_private_slot_holds_target() {
    let mut cx = create_test_context();
    let target = cx.create_object();
    let wrapper = wrap(&mut cx, &target);

    assert!(is_proxy(&wrapper) && is_wrapper(&wrapper));
    assert!(!is_proxy(&target));
    assert_eq!(proxy_private(&wrapper), Some(JsValue::Object(target.clone())));
    assert!(wrapped_object(&wrapper).is_some_and(|o| Gc::ptr_eq(&o, &target)));
}

#[test]
fn test_renew_keeps_identity_and_switches_target() {
    let mut cx = create_test_context();
    let first = object_with(&mut cx, &[("which", JsValue::from("first"))]);
    let second = object_with(&mut cx, &[("which", JsValue::from("second"))]);
    let options = ProxyOptions::new().with_lazy_proto(true);
    let wrapper = new_wrapper(&mut cx, &first, Wrapper::SINGLETON, None, &options).unwrap();
    let id = wrapper.id();

    renew_proxy(&wrapper, Wrapper::SINGLETON, JsValue::Object(second.clone())).unwrap();
    assert_eq!(wrapper.id(), id);
    assert_eq!(get(&mut cx, &wrapper, "which"), JsValue::from("second"));
}

#[test]
fn test_renew_requires_lazy_prototype() {
    let mut cx = create_test_context();
    let target = cx.create_object();
    let wrapper = wrap(&mut cx, &target);
    let result = renew_proxy(&wrapper, Wrapper::SINGLETON, JsValue::Object(target.clone()));
    assert!(result.is_err());

    let plain = cx.create_object();
    let result = renew_proxy(&plain, Wrapper::SINGLETON, JsValue::Object(target));
    assert!(matches!(result, Err(JsError::TypeError { .. })));
}

#[test]
fn test_swap_exchanges_contents() {
    let mut cx = create_test_context();
    let target = object_with(&mut cx, &[("v", JsValue::from("target"))]);
    let wrapper = wrap(&mut cx, &target);
    let plain = object_with(&mut cx, &[("v", JsValue::from("plain"))]);

    swap_objects(&mut cx, &wrapper, &plain).unwrap();
    assert!(is_proxy(&plain));
    assert!(!is_proxy(&wrapper));
    assert_eq!(get(&mut cx, &plain, "v"), JsValue::from("target"));
    assert_eq!(get(&mut cx, &wrapper, "v"), JsValue::from("plain"));

    // Swapping an object with itself is a no-op
    swap_objects(&mut cx, &plain, &plain).unwrap();
    assert!(is_proxy(&plain));
}
