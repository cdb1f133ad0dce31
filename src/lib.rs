//! Proxy dispatch for an embeddable JavaScript object model
//!
//! Objects either implement their internal methods natively or defer them
//! to a [`ProxyHandler`](proxy::ProxyHandler). Generic code in
//! [`object_ops`] works on both; the [`proxy`] module provides the handler
//! contract, policy checks, forwarding wrappers and script-style proxies;
//! [`module`] builds ES module records and their namespace objects on top of
//! the same mechanism.
//!
//! # Example
//!
//! ```
//! use jsproxy::{Context, JsValue, object_ops};
//! use jsproxy::proxy::{ProxyOptions, Wrapper, new_wrapper, unwrap_fully};
//!
//! let mut cx = Context::new();
//! let target = cx.create_object();
//! let key = cx.key("answer");
//! assert!(object_ops::set(&mut cx, &target, &key, JsValue::from(42)).unwrap().ok());
//!
//! let wrapper = new_wrapper(&mut cx, &target, Wrapper::SINGLETON, None, &ProxyOptions::new()).unwrap();
//! assert_eq!(object_ops::get(&mut cx, &wrapper, &key).unwrap(), JsValue::from(42));
//! assert!(jsproxy::Gc::ptr_eq(&unwrap_fully(&wrapper), &target));
//! ```

pub mod context;
pub mod error;
pub mod gc;
pub mod module;
pub mod object_ops;
pub mod prelude;
pub mod proxy;
pub mod string_dict;
pub mod value;

pub use context::{Context, ContextConfig};
pub use error::{FailureCode, JsError, ObjectOpResult};
pub use gc::{Gc, GcStats};
pub use module::{ModuleBuilder, ModuleNamespace, ModuleObject, ModuleStatus};
pub use proxy::{Proxy, ProxyHandler};
pub use value::CheapClone;
pub use value::JsObjectRef;
pub use value::JsString;
pub use value::JsValue;
pub use value::PropertyKey;
