//! Structured log events emitted by the proxy and module layers

use std::io;
use std::sync::{Arc, Mutex};

use tracing_subscriber::fmt::MakeWriter;

use super::{create_test_context, object_with};
use jsproxy::proxy::{
    Action, PolicyVerdict, ProxyOptions, Wrapper, WrapperPolicy, new_wrapper, proxy_revocable,
};
use jsproxy::{Context, JsError, JsObjectRef, JsValue, ModuleObject, PropertyKey, object_ops};

#[derive(Clone, Default)]
struct SharedWriter {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl SharedWriter {
    fn contents(&self) -> String {
        String::from_utf8(self.buffer.lock().unwrap().clone()).unwrap()
    }
}

struct SharedWriterGuard<'a> {
    buffer: &'a Arc<Mutex<Vec<u8>>>,
}

impl io::Write for SharedWriterGuard<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for SharedWriter {
    type Writer = SharedWriterGuard<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        SharedWriterGuard {
            buffer: &self.buffer,
        }
    }
}

/// Run `f` with a debug-level subscriber and return everything it logged
fn capture(f: impl FnOnce()) -> String {
    let writer = SharedWriter::default();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(::tracing::Level::DEBUG)
        .with_ansi(false)
        .with_writer(writer.clone())
        .finish();
    ::tracing::subscriber::with_default(subscriber, f);
    writer.contents()
}

struct DenyAll;

impl WrapperPolicy for DenyAll {
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
            return_value: true,
        })
    }
}

static DENY_ALL: Wrapper<DenyAll> = Wrapper::new(0, false, DenyAll);

#[test]
fn test_policy_denials_are_logged() {
    let output = capture(|| {
        let mut cx = create_test_context();
        let target = object_with(&mut cx, &[("secret", JsValue::from(1))]);
        let wrapper = new_wrapper(&mut cx, &target, &DENY_ALL, None, &ProxyOptions::new()).unwrap();
        let key = cx.key("secret");
        assert_eq!(object_ops::get(&mut cx, &wrapper, &key).unwrap(), JsValue::Undefined);
    });
    assert!(
        output.contains("policy denied"),
        "expected a denial event, got: {output}"
    );
}

#[test]
fn test_revocation_and_module_lifecycle_are_logged() {
    let output = capture(|| {
        let mut cx = create_test_context();
        let target = cx.create_object();
        let handler = cx.create_object();
        let (_proxy, revoke_fn) = proxy_revocable(&mut cx, &target, &handler).unwrap();
        object_ops::call(&mut cx, &JsValue::Object(revoke_fn), JsValue::Undefined, Vec::new())
            .unwrap();

        let _module = ModuleObject::create(&mut cx, None);
    });
    assert!(output.contains("proxy revoked"), "got: {output}");
    assert!(output.contains("module created"), "got: {output}");
}
