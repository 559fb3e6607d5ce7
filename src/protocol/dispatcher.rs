use crate::core::value::Value;
use crate::error::{kind, RemoteError};
use crate::registry::Definition;
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::RwLock;

/// What a named task hands back to the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskResult {
    Value(Value),
    Definitions(Vec<Definition>),
}

type TaskFn = dyn Fn(Value) -> Result<TaskResult, RemoteError> + Send + Sync + 'static;

/// Named server-side task dispatcher with zero-copy routing for statics.
/// Uses Cow<'static, str> to avoid heap allocations for built-in task names.
pub struct TaskDispatcher {
    tasks: RwLock<HashMap<Cow<'static, str>, Box<TaskFn>>>,
}

impl Default for TaskDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskDispatcher {
    pub fn new() -> Self {
        Self {
            tasks: RwLock::new(HashMap::new()),
        }
    }

    pub fn register<F>(&self, name: impl Into<Cow<'static, str>>, task: F)
    where
        F: Fn(Value) -> Result<TaskResult, RemoteError> + Send + Sync + 'static,
    {
        let mut tasks = self.tasks.write().unwrap_or_else(|e| e.into_inner());
        tasks.insert(name.into(), Box::new(task));
    }

    pub fn dispatch(&self, name: &str, args: Value) -> Result<TaskResult, RemoteError> {
        let tasks = self.tasks.read().unwrap_or_else(|e| e.into_inner());
        match tasks.get(name) {
            Some(task) => task(args),
            None => Err(RemoteError::new(kind::UNKNOWN_TASK, name)),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tasks
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registered_tasks_are_dispatched() {
        let dispatcher = TaskDispatcher::new();
        dispatcher.register("double", |args| {
            let n = args.as_i64().unwrap_or(0);
            Ok(TaskResult::Value(Value::Int(n * 2)))
        });

        assert!(dispatcher.contains("double"));
        assert_eq!(
            dispatcher.dispatch("double", Value::Int(21)).unwrap(),
            TaskResult::Value(Value::Int(42))
        );
    }

    #[test]
    fn unknown_task_yields_typed_error() {
        let dispatcher = TaskDispatcher::new();
        let err = dispatcher.dispatch("missing", Value::Null).unwrap_err();
        assert_eq!(err.kind, kind::UNKNOWN_TASK);
        assert_eq!(err.message, "missing");
    }

    #[test]
    fn task_errors_pass_through() {
        let dispatcher = TaskDispatcher::new();
        dispatcher.register("explode", |_| Err(RemoteError::exception("boom")));
        let err = dispatcher.dispatch("explode", Value::Null).unwrap_err();
        assert_eq!(err.message, "boom");
    }
}
