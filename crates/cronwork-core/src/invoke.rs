use std::collections::HashMap;
use std::fmt;

use serde_json::Value;

use crate::error::{InvocationError, Result};

type InvocationHandler = Box<dyn Fn(&[Value]) -> Result<Value> + Send + Sync>;

/// Build-time registration table resolving (target, method) pairs to
/// handlers. This is the explicit replacement for reflection-based dispatch:
/// an invocation task names an entry here instead of a runtime type.
#[derive(Default)]
pub struct InvocationRegistry {
    targets: HashMap<String, HashMap<String, InvocationHandler>>,
}

impl InvocationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, target: &str, method: &str, handler: F)
    where
        F: Fn(&[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        self.targets
            .entry(target.to_string())
            .or_default()
            .insert(method.to_string(), Box::new(handler));
    }

    /// Resolve and call a registered handler. The three failure shapes are
    /// distinct: unknown target, unknown method on a known target, and an
    /// argument payload that is not a JSON array.
    pub fn invoke(&self, target: &str, method: &str, args: &Value) -> Result<Value> {
        let methods = self
            .targets
            .get(target)
            .ok_or_else(|| InvocationError::UnknownTarget {
                target: target.to_string(),
            })?;

        let handler = methods.get(method).ok_or_else(|| InvocationError::UnknownMethod {
            target: target.to_string(),
            method: method.to_string(),
        })?;

        let args = args.as_array().ok_or_else(|| InvocationError::InvalidArgs {
            target: target.to_string(),
            method: method.to_string(),
            reason: "argument payload must be a JSON array".to_string(),
        })?;

        handler(args)
    }

    pub fn contains(&self, target: &str, method: &str) -> bool {
        self.targets
            .get(target)
            .is_some_and(|methods| methods.contains_key(method))
    }
}

impl fmt::Debug for InvocationRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let targets: Vec<&String> = self.targets.keys().collect();
        f.debug_struct("InvocationRegistry").field("targets", &targets).finish()
    }
}
