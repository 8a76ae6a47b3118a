//! Workspace and pipeline-stage reference cache.
//!
//! One cache belongs to one server session. Both entries are populated
//! lazily on first use and replaced wholesale when the workspace changes.
//! Concurrent first uses may each fetch; the last completed write wins and
//! nothing is corrupted.

use crate::error::{CrmApiError, CrmApiResult};
use crate::models::{EntityType, ListQuery, Workspace};
use crate::query::pagination::{fetch_all, PAGE_SIZE};
use crate::repositories::RecordRepository;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

#[derive(Debug, Default)]
struct CacheState {
    workspace: Option<Workspace>,
    stage_names: Option<Arc<HashMap<String, String>>>,
}

/// Lazily-populated workspace id and stage-name lookup for one session.
pub struct ReferenceCache {
    repo: Arc<dyn RecordRepository>,
    preferred_workspace: Option<String>,
    state: RwLock<CacheState>,
}

/// Pick the workspace matching `preferred` (case-insensitive), else the first.
pub fn select_workspace<'a>(
    workspaces: &'a [Workspace],
    preferred: Option<&str>,
) -> Option<&'a Workspace> {
    preferred
        .and_then(|name| {
            let name = name.trim();
            workspaces
                .iter()
                .find(|ws| ws.name.trim().eq_ignore_ascii_case(name))
        })
        .or_else(|| workspaces.first())
}

impl ReferenceCache {
    pub fn new(repo: Arc<dyn RecordRepository>, preferred_workspace: Option<String>) -> Self {
        Self {
            repo,
            preferred_workspace,
            state: RwLock::new(CacheState::default()),
        }
    }

    fn cached_workspace(&self) -> Option<Workspace> {
        self.state.read().ok().and_then(|state| state.workspace.clone())
    }

    fn cached_stage_names(&self) -> Option<Arc<HashMap<String, String>>> {
        self.state
            .read()
            .ok()
            .and_then(|state| state.stage_names.clone())
    }

    /// Return the current workspace id, resolving it on first use.
    pub async fn ensure_workspace(&self) -> CrmApiResult<String> {
        Ok(self.current_workspace().await?.id)
    }

    /// Return the current workspace, resolving it on first use.
    pub async fn current_workspace(&self) -> CrmApiResult<Workspace> {
        if let Some(workspace) = self.cached_workspace() {
            return Ok(workspace);
        }

        let workspaces = self.repo.list_workspaces().await?;
        let selected = select_workspace(&workspaces, self.preferred_workspace.as_deref())
            .cloned()
            .ok_or_else(|| CrmApiError::NotFound("No accessible workspaces".to_string()))?;

        tracing::info!("Using workspace {} ({})", selected.name, selected.id);

        if let Ok(mut state) = self.state.write() {
            if state.workspace.is_none() {
                state.workspace = Some(selected.clone());
            }
            if let Some(existing) = &state.workspace {
                return Ok(existing.clone());
            }
        }

        Ok(selected)
    }

    /// Switch to the workspace named (or identified by) `name_or_id`.
    ///
    /// Downstream reference data is dropped and rebuilt on next use.
    pub async fn switch_workspace(&self, name_or_id: &str) -> CrmApiResult<Workspace> {
        let wanted = name_or_id.trim();
        let workspaces = self.repo.list_workspaces().await?;
        let workspace = workspaces
            .into_iter()
            .find(|ws| ws.id == wanted || ws.name.trim().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| CrmApiError::NotFound(format!("Workspace '{}'", wanted)))?;

        if let Ok(mut state) = self.state.write() {
            state.workspace = Some(workspace.clone());
            state.stage_names = None;
        }

        tracing::info!("Switched to workspace {} ({})", workspace.name, workspace.id);
        Ok(workspace)
    }

    /// Resolve a pipeline-stage id to its display name.
    ///
    /// Falls back to returning `stage_id` unchanged when the id is unknown
    /// or the stage list cannot be fetched. Never fails.
    pub async fn resolve_stage_name(&self, stage_id: &str) -> String {
        let names = match self.cached_stage_names() {
            Some(names) => names,
            None => match self.load_stage_names().await {
                Ok(names) => names,
                Err(e) => {
                    tracing::warn!("Failed to load pipeline stages: {}", e);
                    return stage_id.to_string();
                }
            },
        };

        names
            .get(stage_id)
            .cloned()
            .unwrap_or_else(|| stage_id.to_string())
    }

    async fn load_stage_names(&self) -> CrmApiResult<Arc<HashMap<String, String>>> {
        let workspace_id = self.ensure_workspace().await?;
        let query = ListQuery::new(PAGE_SIZE)
            .in_workspace(&workspace_id)
            .with_fields(["id", "name"]);

        let stages = fetch_all(self.repo.as_ref(), EntityType::PipelineStage, &query).await?;
        let names: HashMap<String, String> = stages
            .records
            .into_iter()
            .filter_map(|stage| {
                let name = stage.name?;
                Some((stage.id, name))
            })
            .collect();
        let names = Arc::new(names);

        tracing::debug!("Cached {} pipeline stage names", names.len());

        // A switch that landed mid-fetch makes this table stale.
        if let Ok(mut state) = self.state.write() {
            let still_current = state
                .workspace
                .as_ref()
                .map(|ws| ws.id == workspace_id)
                .unwrap_or(false);
            if still_current {
                state.stage_names = Some(names.clone());
            }
        }

        Ok(names)
    }

    /// Drop all cached reference data.
    pub fn clear(&self) {
        if let Ok(mut state) = self.state.write() {
            *state = CacheState::default();
        }
    }
}

impl std::fmt::Debug for ReferenceCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReferenceCache")
            .field("preferred_workspace", &self.preferred_workspace)
            .field("workspace", &self.cached_workspace())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_workspace_prefers_name() {
        let workspaces = vec![Workspace::new("ws-1", "Personal"), Workspace::new("ws-2", "Sales")];
        assert_eq!(select_workspace(&workspaces, Some("sales")).unwrap().id, "ws-2");
    }

    #[test]
    fn test_select_workspace_falls_back_to_first() {
        let workspaces = vec![Workspace::new("ws-1", "Personal"), Workspace::new("ws-2", "Sales")];
        assert_eq!(select_workspace(&workspaces, Some("Missing")).unwrap().id, "ws-1");
        assert_eq!(select_workspace(&workspaces, None).unwrap().id, "ws-1");
        assert!(select_workspace(&[], Some("Sales")).is_none());
    }
}
