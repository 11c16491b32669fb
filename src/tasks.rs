//! Background task tracking.
//!
//! Tasks are identified by id and report progress through a [`TaskHandle`].
//! Every update is broadcast, so observers that connect later still see
//! completion of work started by someone else.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::Value;

use crate::broadcast::Broadcaster;
use crate::models::events::ShowEvent;
use crate::models::tasks::{TaskInfo, TaskStatus};

#[derive(Clone)]
pub struct TaskRegistry {
    inner: Arc<Mutex<HashMap<String, TaskInfo>>>,
    broadcaster: Broadcaster,
}

impl TaskRegistry {
    pub fn new(broadcaster: Broadcaster) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
            broadcaster,
        }
    }

    pub fn start(&self, kind: &str, description: impl Into<String>) -> TaskHandle {
        let id = uuid::Uuid::new_v4().simple().to_string();
        let info = TaskInfo {
            id: format!("task-{}", &id[..8]),
            kind: kind.to_string(),
            description: description.into(),
            status: TaskStatus::Running,
            progress: 0.0,
            message: "started".into(),
            started_at: chrono::Utc::now().to_rfc3339(),
            finished_at: None,
            result: None,
        };
        log::info!("[tasks] {} started: {}", info.id, info.description);
        let handle = TaskHandle {
            id: info.id.clone(),
            registry: self.clone(),
        };
        self.store(info);
        handle
    }

    pub fn get(&self, id: &str) -> Option<TaskInfo> {
        self.inner.lock().expect("task registry poisoned").get(id).cloned()
    }

    /// All tasks, newest first.
    pub fn list(&self) -> Vec<TaskInfo> {
        let guard = self.inner.lock().expect("task registry poisoned");
        let mut tasks: Vec<TaskInfo> = guard.values().cloned().collect();
        tasks.sort_by(|a, b| b.started_at.cmp(&a.started_at).then(a.id.cmp(&b.id)));
        tasks
    }

    pub fn running(&self) -> usize {
        let guard = self.inner.lock().expect("task registry poisoned");
        guard.values().filter(|t| t.status == TaskStatus::Running).count()
    }

    fn store(&self, info: TaskInfo) {
        {
            let mut guard = self.inner.lock().expect("task registry poisoned");
            guard.insert(info.id.clone(), info.clone());
        }
        self.broadcaster.broadcast(ShowEvent::TaskUpdated(info));
    }

    fn update<F>(&self, id: &str, apply: F)
    where
        F: FnOnce(&mut TaskInfo),
    {
        let updated = {
            let mut guard = self.inner.lock().expect("task registry poisoned");
            let Some(task) = guard.get_mut(id) else {
                return;
            };
            if task.status != TaskStatus::Running {
                return;
            }
            apply(task);
            task.clone()
        };
        self.broadcaster.broadcast(ShowEvent::TaskUpdated(updated));
    }
}

/// Reporting side of one task. Finishing twice is ignored.
#[derive(Clone)]
pub struct TaskHandle {
    id: String,
    registry: TaskRegistry,
}

impl TaskHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn progress(&self, progress: f32, message: impl Into<String>) {
        let message = message.into();
        self.registry.update(&self.id, |task| {
            task.progress = progress.clamp(0.0, 1.0);
            task.message = message;
        });
    }

    pub fn complete(&self, result: Value) {
        log::info!("[tasks] {} completed", self.id);
        self.registry.update(&self.id, |task| {
            task.status = TaskStatus::Completed;
            task.progress = 1.0;
            task.message = "completed".into();
            task.finished_at = Some(chrono::Utc::now().to_rfc3339());
            task.result = Some(result);
        });
    }

    pub fn fail(&self, error: impl Into<String>) {
        let error = error.into();
        log::warn!("[tasks] {} failed: {}", self.id, error);
        self.registry.update(&self.id, |task| {
            task.status = TaskStatus::Failed;
            task.message = error;
            task.finished_at = Some(chrono::Utc::now().to_rfc3339());
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn lifecycle_is_broadcast() {
        let broadcaster = Broadcaster::new();
        let (_, mut rx) = broadcaster.subscribe();
        let registry = TaskRegistry::new(broadcaster);

        let handle = registry.start("analyze", "context summary");
        handle.progress(0.5, "halfway");
        handle.complete(json!({"sections": 3}));
        handle.fail("too late");

        let task = registry.get(handle.id()).expect("task");
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.result, Some(json!({"sections": 3})));
        assert_eq!(registry.running(), 0);

        let mut statuses = Vec::new();
        while let Ok(ShowEvent::TaskUpdated(info)) = rx.try_recv() {
            statuses.push(info.status);
        }
        assert_eq!(
            statuses,
            vec![TaskStatus::Running, TaskStatus::Running, TaskStatus::Completed]
        );
    }
}
