//! View-local task cache.
//!
//! `TaskBoard` is what a task list view renders from. It is never
//! authoritative: `reload` replaces it from the server, and deletes are applied
//! optimistically and rolled back if the server refuses.

use crate::client::{validate_task_id, TaskClient};
use crate::error::ApiError;
use crate::types::Task;

/// One page of a task board.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<'a> {
    pub items: &'a [Task],
    /// 1-based page number.
    pub current: usize,
    pub total_pages: usize,
    pub has_previous: bool,
    pub has_next: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskBoard {
    tasks: Vec<Task>,
}

impl TaskBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tasks(tasks: Vec<Task>) -> Self {
        Self { tasks }
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Replace the board with the server's current list. On failure the
    /// previous contents stay in place.
    pub async fn reload(&mut self, client: &TaskClient) -> Result<(), ApiError> {
        self.tasks = client.list_tasks().await?;
        Ok(())
    }

    /// Remove a task locally, then on the server. If the server call fails the
    /// previous list is restored and the error returned.
    pub async fn delete(&mut self, client: &TaskClient, id: &str) -> Result<(), ApiError> {
        validate_task_id(id)?;

        let previous = self.tasks.clone();
        self.tasks.retain(|task| task.id != id);

        if let Err(err) = client.delete_task(id).await {
            tracing::debug!(status = err.status, "delete failed, restoring task list");
            self.tasks = previous;
            return Err(err);
        }
        Ok(())
    }

    /// Slice out page `page` (1-based) of `per_page` items. Pages past the end
    /// are empty; an empty board has zero pages.
    pub fn page(&self, page: usize, per_page: usize) -> Page<'_> {
        let per_page = per_page.max(1);
        let page = page.max(1);
        let total_pages = self.tasks.len().div_ceil(per_page);

        let start = (page - 1).saturating_mul(per_page).min(self.tasks.len());
        let end = start.saturating_add(per_page).min(self.tasks.len());

        Page {
            items: &self.tasks[start..end],
            current: page,
            total_pages,
            has_previous: page > 1,
            has_next: page < total_pages,
        }
    }
}
