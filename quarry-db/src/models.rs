//! Data models for stored project records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stored project: a repository acquisition plus caller metadata
///
/// Carries a copy of the repository metadata produced at acquisition
/// time, keyed by an identifier the caller generates. The ingestion layer
/// has no awareness of these records.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ProjectRecord {
    /// Caller-generated identifier
    pub id: String,

    /// Human-readable project name
    pub name: String,

    /// Optional free-form description
    pub description: Option<String>,

    /// Source string the repository was acquired from
    pub repo_url: String,

    /// Absolute on-disk location of the repository
    pub repo_path: String,

    /// Whether the repository is caller-owned rather than a cached clone
    pub is_local: bool,

    /// Branch the repository considers primary
    pub default_branch: String,

    /// Branch that was checked out when the record was written
    pub current_branch: String,

    /// Head commit at the time the record was written
    pub last_commit: String,

    /// Size of head's ancestry at the time the record was written
    pub commit_count: i64,

    /// Number of local branches at the time the record was written
    pub branch_count: i64,

    /// When this record was created
    pub created_at: DateTime<Utc>,

    /// When this record was last updated
    pub updated_at: DateTime<Utc>,
}

impl ProjectRecord {
    /// Create a new record with timestamps set to now
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        repo_url: impl Into<String>,
        repo_path: impl Into<String>,
        is_local: bool,
        default_branch: impl Into<String>,
        current_branch: impl Into<String>,
        last_commit: impl Into<String>,
        commit_count: i64,
        branch_count: i64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            repo_url: repo_url.into(),
            repo_path: repo_path.into(),
            is_local,
            default_branch: default_branch.into(),
            current_branch: current_branch.into(),
            last_commit: last_commit.into(),
            commit_count,
            branch_count,
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the description for this record
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Bump the updated-at timestamp
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
