//! Proxy objects: objects whose internal methods are implemented by a
//! pluggable [`ProxyHandler`] instead of the native representation.
//!
//! - [`handler`]: the handler contract and its defaults
//! - [`object`]: proxy layout, creation, renewal and swapping
//! - [`policy`]: security policy guards around handler entry
//! - [`dispatch`]: the [`Proxy`] entry points generic object code calls
//! - [`wrapper`]: forwarding handlers and unwrapping
//! - [`scripted`]: script-visible `Proxy(target, handler)` objects

pub mod dispatch;
pub mod handler;
pub mod object;
pub mod policy;
pub mod scripted;
pub mod wrapper;

pub use dispatch::Proxy;
pub use handler::{
    EsClass, Family, IsArrayAnswer, PrototypeIfOrdinary, ProxyHandler, base_class_name,
};
pub use object::{
    PROXY_CLASS, ProxyClass, ProxyData, ProxyOptions, handler_of, is_proxy, is_scripted_proxy,
    is_wrapper, new_proxy_object, proxy_private, proxy_reserved_slot, renew_proxy,
    set_proxy_private, set_proxy_reserved_slot, swap_objects,
};
pub use policy::{
    Action, AutoEnterPolicy, EnteredPolicy, PolicyVerdict, assert_entered_policy,
};
pub use scripted::{
    SCRIPTED_PROXY_HANDLER, ScriptedProxyHandler, is_revoked, new_scripted_proxy,
    proxy_revocable, revoke, scripted_handler, scripted_target,
};
pub use wrapper::{
    CROSS_COMPARTMENT, CrossCompartmentWrapper, Transparent, WRAPPER_FAMILY, Wrapper,
    WrapperPolicy, checked_unwrap, is_window_proxy, new_wrapper, transparent_object_wrapper,
    unchecked_unwrap, unwrap_fully, unwrap_one_checked, wrapped_object,
};
