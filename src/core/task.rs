//! The unit of work flowing between pipeline stages.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A unit of work with routing tags and an opaque JSON payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Where the task came from: an input binding, or the group that produced it.
    pub origin: String,
    /// Output binding (or group, for admitted tasks) the task is headed to.
    pub destination: String,
    /// Task payload supplied by the endpoint or handler.
    pub payload: Value,
}

impl Task {
    /// Create a task with explicit tags.
    pub fn new(origin: impl Into<String>, destination: impl Into<String>, payload: Value) -> Self {
        Self {
            origin: origin.into(),
            destination: destination.into(),
            payload,
        }
    }

    /// Create a result task for the given output binding.
    ///
    /// The origin is left empty; the routing step stamps it with the name of
    /// the group that produced the task.
    pub fn to(destination: impl Into<String>, payload: Value) -> Self {
        Self::new(String::new(), destination, payload)
    }

    /// Derive a result task that keeps this task's origin.
    #[must_use]
    pub fn forward(&self, destination: impl Into<String>, payload: Value) -> Self {
        Self::new(self.origin.clone(), destination, payload)
    }
}

/// An item produced by an input endpoint, before it becomes a [`Task`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fetched {
    /// Optional distinguishing key supplied by the source.
    pub key: Option<String>,
    /// Item payload.
    pub payload: Value,
}

impl Fetched {
    /// An item without a distinguishing key.
    pub const fn new(payload: Value) -> Self {
        Self { key: None, payload }
    }

    /// An item carrying a distinguishing key.
    pub fn keyed(key: impl Into<String>, payload: Value) -> Self {
        Self {
            key: Some(key.into()),
            payload,
        }
    }

    /// Origin tag for a task admitted through `binding`.
    ///
    /// Without a key the origin is the binding name alone.
    #[must_use]
    pub fn origin_for(&self, binding: &str) -> String {
        match &self.key {
            Some(key) => format!("{binding}:{key}"),
            None => binding.to_string(),
        }
    }

    /// Wrap into a task admitted through `binding` of group `group`.
    #[must_use]
    pub fn into_task(self, binding: &str, group: &str) -> Task {
        let origin = self.origin_for(binding);
        Task::new(origin, group, self.payload)
    }
}

/// One element of a handler's result list.
#[derive(Debug, Clone, PartialEq)]
pub enum HandlerOutput {
    /// A single result task.
    Task(Task),
    /// A nested list of result tasks.
    Many(Vec<Task>),
}

impl From<Task> for HandlerOutput {
    fn from(task: Task) -> Self {
        Self::Task(task)
    }
}

impl From<Vec<Task>> for HandlerOutput {
    fn from(tasks: Vec<Task>) -> Self {
        Self::Many(tasks)
    }
}

/// Flatten a handler result list into tasks, preserving order.
pub fn flatten(outputs: Vec<HandlerOutput>) -> impl Iterator<Item = Task> {
    outputs.into_iter().flat_map(|out| match out {
        HandlerOutput::Task(task) => vec![task],
        HandlerOutput::Many(tasks) => tasks,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_origin_without_key_is_binding_name() {
        let item = Fetched::new(json!(1));
        assert_eq!(item.origin_for("files"), "files");
    }

    #[test]
    fn test_origin_with_key() {
        let item = Fetched::keyed("a.csv", json!(1));
        let task = item.into_task("files", "parse");
        assert_eq!(task.origin, "files:a.csv");
        assert_eq!(task.destination, "parse");
    }

    #[test]
    fn test_flatten_preserves_order() {
        let outputs = vec![
            HandlerOutput::from(Task::to("a", json!(1))),
            HandlerOutput::from(vec![Task::to("b", json!(2)), Task::to("a", json!(3))]),
            HandlerOutput::Many(Vec::new()),
            HandlerOutput::from(Task::to("c", json!(4))),
        ];
        let payloads: Vec<_> = flatten(outputs).map(|t| t.payload).collect();
        assert_eq!(payloads, vec![json!(1), json!(2), json!(3), json!(4)]);
    }
}
