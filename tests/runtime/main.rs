//! Integration tests for proxy dispatch and module namespaces
//!
//! These tests drive the object model through the public API only.
//!
//! ## Aggressive Test Defaults
//!
//! Tests use aggressive defaults to catch bugs early:
//! - `GC_THRESHOLD=1` - GC on every allocation to catch missing write barriers
//!
//! Override via environment variables:
//!
//! ```bash
//! cargo test                           # Default: aggressive settings
//! GC_THRESHOLD=100 cargo test          # Less aggressive GC for faster runs
//! ```

mod forwarding;
mod logging;
mod module_builder;
mod module_status;
mod namespace;
mod policy;
mod scripted;

use jsproxy::{Context, ContextConfig, JsObjectRef, JsValue, object_ops};

/// Create a context with aggressive defaults for testing:
/// - GC_THRESHOLD=1 (GC on every allocation)
pub fn create_test_context() -> Context {
    // GC_THRESHOLD=0 disables automatic collection
    let gc_threshold = std::env::var("GC_THRESHOLD")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(1);
    Context::with_config(ContextConfig {
        gc_threshold,
        ..Default::default()
    })
}

/// Plain object holding the given data properties
pub fn object_with(cx: &mut Context, props: &[(&str, JsValue)]) -> JsObjectRef {
    let obj = cx.create_object();
    for (name, value) in props {
        let key = cx.key(name);
        let result = object_ops::set(cx, &obj, &key, value.clone()).unwrap();
        assert!(result.ok(), "failed to set {}", name);
    }
    obj
}

/// `obj[name]`
pub fn get(cx: &mut Context, obj: &JsObjectRef, name: &str) -> JsValue {
    let key = cx.key(name);
    object_ops::get(cx, obj, &key).unwrap()
}

/// Own keys of `obj` rendered as strings, for comparisons
pub fn key_names(cx: &mut Context, obj: &JsObjectRef) -> Vec<String> {
    object_ops::own_property_keys(cx, obj)
        .unwrap()
        .iter()
        .map(|key| key.to_string())
        .collect()
}
