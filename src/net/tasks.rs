//! Status registry for deferred write tasks.
//!
//! Mutating commands are acknowledged immediately with a task ID; the
//! actual work runs later on the writer queue. Clients poll the outcome
//! with `get_write_result`, so every task's status must move monotonically
//! from `NotProcessed` through `InProgress` to exactly one terminal value.

use parking_lot::RwLock;

use crate::index::table::IdRegistry;
use crate::net::codes::ResponseCode;

/// Identifier of a deferred write task. `0` is reserved.
pub type TaskId = u64;

/// Lifecycle state of a deferred write task.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskStatus {
    /// Queued, not yet picked up by a worker.
    NotProcessed,
    /// A worker is executing the mutation.
    InProgress,
    /// The mutation succeeded.
    Done,
    /// An add failed (duplicate, unreadable body, storage error).
    CouldNotAdd,
    /// A modify or remove failed because the file is not indexed.
    FileNotFound,
}

impl TaskStatus {
    /// Whether the task has finished, one way or the other.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Done | TaskStatus::CouldNotAdd | TaskStatus::FileNotFound
        )
    }
}

impl From<TaskStatus> for ResponseCode {
    fn from(status: TaskStatus) -> ResponseCode {
        match status {
            TaskStatus::NotProcessed => ResponseCode::OperationNotProcessed,
            TaskStatus::InProgress => ResponseCode::OperationInProgress,
            TaskStatus::Done => ResponseCode::Ok,
            TaskStatus::CouldNotAdd => ResponseCode::CouldNotAddFile,
            TaskStatus::FileNotFound => ResponseCode::FileNotFound,
        }
    }
}

/// Thread-safe `TaskId -> TaskStatus` registry.
#[derive(Debug, Default)]
pub struct WriteTaskRegistry {
    statuses: RwLock<IdRegistry<TaskId, TaskStatus>>,
}

impl WriteTaskRegistry {
    pub fn new() -> Self {
        WriteTaskRegistry::default()
    }

    /// Allocate a fresh task ID with status `NotProcessed`.
    pub fn register(&self) -> TaskId {
        self.statuses.write().insert(TaskStatus::NotProcessed)
    }

    /// Overwrite a task's status. Unknown IDs are ignored (the registry is
    /// append-only, so this only happens if a caller fabricates an ID).
    pub fn update(&self, task_id: TaskId, status: TaskStatus) {
        let _ = self.statuses.write().set(task_id, status);
    }

    /// The current status of a task, or `None` for unknown IDs.
    pub fn status(&self, task_id: TaskId) -> Option<TaskStatus> {
        self.statuses.read().get_opt(task_id).copied()
    }

    pub fn len(&self) -> usize {
        self.statuses.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.statuses.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_starts_not_processed() {
        let registry = WriteTaskRegistry::new();
        let first = registry.register();
        let second = registry.register();

        assert_eq!(first, 1);
        assert_eq!(second, 2);
        assert_eq!(registry.status(first), Some(TaskStatus::NotProcessed));
    }

    #[test]
    fn test_status_progression() {
        let registry = WriteTaskRegistry::new();
        let id = registry.register();

        registry.update(id, TaskStatus::InProgress);
        assert_eq!(registry.status(id), Some(TaskStatus::InProgress));

        registry.update(id, TaskStatus::Done);
        assert_eq!(registry.status(id), Some(TaskStatus::Done));
        assert!(registry.status(id).unwrap().is_terminal());
    }

    #[test]
    fn test_unknown_id() {
        let registry = WriteTaskRegistry::new();
        assert_eq!(registry.status(42), None);
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!TaskStatus::NotProcessed.is_terminal());
        assert!(!TaskStatus::InProgress.is_terminal());
        assert!(TaskStatus::Done.is_terminal());
        assert!(TaskStatus::CouldNotAdd.is_terminal());
        assert!(TaskStatus::FileNotFound.is_terminal());
    }

    #[test]
    fn test_status_to_response_code() {
        assert_eq!(ResponseCode::from(TaskStatus::Done), ResponseCode::Ok);
        assert_eq!(
            ResponseCode::from(TaskStatus::NotProcessed),
            ResponseCode::OperationNotProcessed
        );
        assert_eq!(
            ResponseCode::from(TaskStatus::CouldNotAdd),
            ResponseCode::CouldNotAddFile
        );
    }
}
