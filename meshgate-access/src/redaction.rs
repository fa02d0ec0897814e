//! Permission Redaction Pass
//!
//! Walks a rendered tree depth first. Every object carrying a namespace
//! under [`NAMESPACE_KEY`] is checked for READ: denied rows are dropped
//! from their list, denied nested objects lose their key entirely, and
//! allowed objects run their conditional handlers and shed the namespace
//! key. Denial is always silent; only the caller decides whether a denied
//! root is an error.

use meshgate_core::{Namespace, Permissions, NAMESPACE_KEY};
use serde_json::Value;

use crate::grants::{PermissionEvaluator, RequesterIdentity};
use crate::handlers::{HandlerTable, PermissionCheck};

/// Whether the value passed to [`RedactionPass::apply`] survived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedactionOutcome {
    Allowed,
    Denied,
}

#[derive(Clone, Copy)]
pub struct RedactionPass<'a> {
    handlers: &'a HandlerTable,
    evaluator: &'a dyn PermissionEvaluator,
}

impl<'a> RedactionPass<'a> {
    pub fn new(handlers: &'a HandlerTable, evaluator: &'a dyn PermissionEvaluator) -> Self {
        Self {
            handlers,
            evaluator,
        }
    }

    /// Redact `value` in place for `identity`.
    ///
    /// A denied root object is left untouched and reported as
    /// [`RedactionOutcome::Denied`]; lists are never denied as a whole.
    pub fn apply(&self, value: &mut Value, identity: &RequesterIdentity) -> RedactionOutcome {
        let check = PermissionCheck::new(self.evaluator, identity);
        let mut dropped = 0usize;
        let outcome = self.visit(value, &check, &mut dropped);
        if dropped > 0 {
            tracing::debug!(dropped, "Redacted rows and fields");
        }
        outcome
    }

    fn visit(&self, value: &mut Value, check: &PermissionCheck<'_>, dropped: &mut usize) -> RedactionOutcome {
        match value {
            Value::Array(items) => {
                items.retain_mut(|item| {
                    let keep = self.visit(item, check, dropped) == RedactionOutcome::Allowed;
                    if !keep {
                        *dropped += 1;
                    }
                    keep
                });
                RedactionOutcome::Allowed
            }
            Value::Object(map) => {
                if let Some(raw) = map.get(NAMESPACE_KEY).and_then(Value::as_str) {
                    let namespace = Namespace::parse(raw);
                    let explicit = self.handlers.requires_explicit(&namespace);
                    if !check.allows(&namespace, Permissions::READ, explicit) {
                        return RedactionOutcome::Denied;
                    }
                    for handler in self.handlers.matching(&namespace) {
                        if let Some(conditional) = handler.conditional {
                            conditional(check, &namespace, map);
                        }
                    }
                }
                map.remove(NAMESPACE_KEY);

                let denied: Vec<String> = map
                    .iter_mut()
                    .filter_map(|(key, child)| {
                        let outcome = match child {
                            Value::Object(_) | Value::Array(_) => self.visit(child, check, dropped),
                            _ => RedactionOutcome::Allowed,
                        };
                        (outcome == RedactionOutcome::Denied).then(|| key.clone())
                    })
                    .collect();
                for key in denied {
                    *dropped += 1;
                    map.remove(&key);
                }
                RedactionOutcome::Allowed
            }
            _ => RedactionOutcome::Allowed,
        }
    }
}
