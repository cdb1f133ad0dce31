//! Security policy entry for proxy operations.
//!
//! Every handler entry creates an [`AutoEnterPolicy`]. Handlers without a
//! security policy are never asked; the others decide per key and action.
//! In debug builds each guard also records itself on the context's
//! entered-policy stack so handler code can assert it was entered for the
//! operation it is performing.

use std::ops::{BitOr, BitOrAssign};

use tracing::debug;

use crate::context::Context;
use crate::error::JsError;
use crate::prelude::*;
use crate::value::{JsObjectRef, PropertyKey};

use super::handler::ProxyHandler;

/// Kind of access requested from a policy. Values combine with `|`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Action(u8);

impl Action {
    pub const NONE: Action = Action(0);
    pub const GET: Action = Action(1);
    pub const SET: Action = Action(2);
    pub const CALL: Action = Action(4);
    pub const ENUMERATE: Action = Action(8);
    pub const GET_PROPERTY_DESCRIPTOR: Action = Action(16);

    /// Every action, used when a policy is waived
    pub const ALL: Action = Action(1 | 2 | 4 | 8 | 16);

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, other: Action) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn intersects(self, other: Action) -> bool {
        self.0 & other.0 != 0
    }

    /// `|` usable in const context
    pub const fn union(self, other: Action) -> Action {
        Action(self.0 | other.0)
    }
}

impl BitOr for Action {
    type Output = Action;

    fn bitor(self, rhs: Action) -> Action {
        Action(self.0 | rhs.0)
    }
}

impl BitOrAssign for Action {
    fn bitor_assign(&mut self, rhs: Action) {
        self.0 |= rhs.0;
    }
}

/// Answer of [`ProxyHandler::enter`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyVerdict {
    Allow,
    /// With `return_value` set, the denied operation quietly yields its
    /// default result; otherwise the caller may raise an access error.
    Deny { return_value: bool },
}

/// One entry of the debug entered-policy stack
#[derive(Debug, Clone)]
pub struct EnteredPolicy {
    proxy_id: usize,
    key: Option<PropertyKey>,
    action: Action,
}

impl EnteredPolicy {
    fn matches(&self, proxy_id: usize, key: Option<&PropertyKey>, action: Action) -> bool {
        self.proxy_id == proxy_id && self.key.as_ref() == key && self.action.intersects(action)
    }
}

fn record_enter(cx: &Context, proxy: &JsObjectRef, key: Option<&PropertyKey>, action: Action) -> bool {
    if !cfg!(debug_assertions) {
        return false;
    }
    cx.entered_policies.borrow_mut().push(EnteredPolicy {
        proxy_id: proxy.id(),
        key: key.cloned(),
        action,
    });
    true
}

fn record_leave(stack: &RefCell<Vec<EnteredPolicy>>, proxy_id: usize, action: Action) {
    let left = stack.borrow_mut().pop();
    debug_assert!(
        left.as_ref()
            .is_some_and(|e| e.proxy_id == proxy_id && e.action == action),
        "unbalanced proxy policy enter/leave"
    );
}

/// Scoped policy check around one handler entry.
///
/// Dropping the guard leaves the policy, including on early `?` returns.
pub struct AutoEnterPolicy {
    allow: bool,
    return_value: bool,
    proxy_id: usize,
    action: Action,
    stack: Option<Rc<RefCell<Vec<EnteredPolicy>>>>,
}

impl AutoEnterPolicy {
    /// Ask the handler's policy about `action` on `key`.
    ///
    /// Errors when the policy denied without a quiet return value and
    /// `may_throw` is set, or when the policy itself failed while throwing
    /// was allowed. A failing policy of a caller that cannot throw counts
    /// as a quiet denial.
    pub fn new(
        cx: &mut Context,
        handler: &'static dyn ProxyHandler,
        proxy: &JsObjectRef,
        key: Option<&PropertyKey>,
        action: Action,
        may_throw: bool,
    ) -> Result<Self, JsError> {
        let verdict = if !handler.has_security_policy() {
            PolicyVerdict::Allow
        } else {
            match handler.enter(cx, proxy, key, action, may_throw) {
                Ok(verdict) => verdict,
                Err(err) if may_throw => return Err(err),
                Err(err) => {
                    debug!(
                        proxy = proxy.id(),
                        error = %err,
                        "policy failed where throwing is not allowed"
                    );
                    PolicyVerdict::Deny { return_value: true }
                }
            }
        };

        let (allow, return_value) = match verdict {
            PolicyVerdict::Allow => (true, true),
            PolicyVerdict::Deny { return_value } => {
                debug!(proxy = proxy.id(), key = ?key, action = action.bits(), "policy denied");
                (false, return_value)
            }
        };

        if !allow && !return_value && may_throw {
            return Err(JsError::access_denied(key));
        }

        let stack = record_enter(cx, proxy, key, action).then(|| cx.entered_policies.clone());
        Ok(Self {
            allow,
            return_value,
            proxy_id: proxy.id(),
            action,
            stack,
        })
    }

    #[inline]
    pub fn allowed(&self) -> bool {
        self.allow
    }

    /// What a denied operation reports to its caller
    #[inline]
    pub fn return_value(&self) -> bool {
        self.return_value
    }
}

impl Drop for AutoEnterPolicy {
    fn drop(&mut self) {
        if let Some(stack) = &self.stack {
            record_leave(stack, self.proxy_id, self.action);
        }
    }
}

/// Debug check that the innermost entered policy covers this operation
#[inline]
pub fn assert_entered_policy(
    cx: &Context,
    proxy: &JsObjectRef,
    key: Option<&PropertyKey>,
    action: Action,
) {
    if cfg!(debug_assertions) {
        let stack = cx.entered_policies.borrow();
        debug_assert!(
            stack
                .last()
                .is_some_and(|entered| entered.matches(proxy.id(), key, action)),
            "proxy handler entered without a matching policy"
        );
    }
}
