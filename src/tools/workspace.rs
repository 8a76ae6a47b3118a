//! Workspace selection tools.

use crate::cache::ReferenceCache;
use crate::error::CrmApiResult;
use crate::models::Workspace;
use crate::repositories::RecordRepository;
use serde::Serialize;
use std::sync::Arc;

/// Current workspace plus the ones that can be switched to.
#[derive(Debug, Clone, Serialize)]
pub struct WorkspaceOverview {
    pub current: Workspace,
    pub available: Vec<Workspace>,
}

pub struct WorkspaceTools {
    repo: Arc<dyn RecordRepository>,
    cache: Arc<ReferenceCache>,
}

impl WorkspaceTools {
    pub fn new(repo: Arc<dyn RecordRepository>, cache: Arc<ReferenceCache>) -> Self {
        Self { repo, cache }
    }

    pub async fn current_workspace(&self) -> CrmApiResult<WorkspaceOverview> {
        let current = self.cache.current_workspace().await?;
        let available = self.repo.list_workspaces().await?;
        Ok(WorkspaceOverview { current, available })
    }

    /// Switch workspaces; cached stage names are rebuilt on next use.
    pub async fn switch_workspace(&self, name_or_id: &str) -> CrmApiResult<Workspace> {
        self.cache.switch_workspace(name_or_id).await
    }
}
