use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkspaceSummary {
    pub id: String,
    pub name: String,
    pub owner_id: String,
    pub created_at: DateTime<Utc>,
}

/// Source of the current principal's workspace-membership count.
#[async_trait]
pub trait MembershipSource: Send + Sync {
    async fn membership_count(&self) -> Result<u64, ApiError>;
}

#[derive(Debug, Default)]
struct Inner {
    workspaces: HashMap<String, (u64, WorkspaceSummary)>,
    members: HashMap<String, HashSet<String>>,
    seq: u64,
}

/// In-memory workspaces and memberships. Cloning shares the same directory.
#[derive(Clone, Default)]
pub struct WorkspaceDirectory {
    inner: Arc<RwLock<Inner>>,
}

impl WorkspaceDirectory {
    pub fn new() -> Self { Self::default() }

    /// Create a workspace; the owner becomes its first member.
    pub fn create(&self, owner_id: &str, name: &str) -> WorkspaceSummary {
        let ws = WorkspaceSummary {
            id: uuid::Uuid::new_v4().simple().to_string(),
            name: name.trim().to_string(),
            owner_id: owner_id.to_string(),
            created_at: Utc::now(),
        };
        let mut inner = self.inner.write();
        inner.seq += 1;
        let seq = inner.seq;
        inner.workspaces.insert(ws.id.clone(), (seq, ws.clone()));
        inner.members.entry(ws.id.clone()).or_default().insert(owner_id.to_string());
        ws
    }

    pub fn add_member(&self, workspace_id: &str, user_id: &str) -> bool {
        let mut inner = self.inner.write();
        if !inner.workspaces.contains_key(workspace_id) { return false; }
        inner.members.entry(workspace_id.to_string()).or_default().insert(user_id.to_string())
    }

    /// Workspaces the user belongs to, most recently created first.
    pub fn list_for(&self, user_id: &str) -> Vec<WorkspaceSummary> {
        let inner = self.inner.read();
        let mut out: Vec<&(u64, WorkspaceSummary)> = inner
            .workspaces
            .values()
            .filter(|(_, ws)| inner.members.get(&ws.id).map(|m| m.contains(user_id)).unwrap_or(false))
            .collect();
        out.sort_by(|a, b| b.1.created_at.cmp(&a.1.created_at).then(b.0.cmp(&a.0)));
        out.into_iter().map(|(_, ws)| ws.clone()).collect()
    }

    pub fn count_for(&self, user_id: &str) -> u64 {
        let inner = self.inner.read();
        inner.members.values().filter(|m| m.contains(user_id)).count() as u64
    }

    pub fn first_for(&self, user_id: &str) -> Option<WorkspaceSummary> {
        self.list_for(user_id).into_iter().next()
    }

    /// Bind the directory to one user as a [`MembershipSource`].
    pub fn scoped(&self, user_id: &str) -> ScopedMembership {
        ScopedMembership { dir: self.clone(), user_id: user_id.to_string() }
    }
}

#[derive(Clone)]
pub struct ScopedMembership {
    dir: WorkspaceDirectory,
    user_id: String,
}

#[async_trait]
impl MembershipSource for ScopedMembership {
    async fn membership_count(&self) -> Result<u64, ApiError> {
        Ok(self.dir.count_for(&self.user_id))
    }
}
