//! Project record storage

use sqlx::SqlitePool;

use crate::error::{Error, Result};
use crate::models::ProjectRecord;

/// Repository of stored projects
#[derive(Clone)]
pub struct ProjectsRepo {
    pool: SqlitePool,
}

impl ProjectsRepo {
    /// Create a projects repository over an existing pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a new project record
    pub async fn create(&self, record: &ProjectRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO projects (
                id, name, description, repo_url, repo_path, is_local,
                default_branch, current_branch, last_commit,
                commit_count, branch_count, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        )
        .bind(&record.id)
        .bind(&record.name)
        .bind(&record.description)
        .bind(&record.repo_url)
        .bind(&record.repo_path)
        .bind(record.is_local)
        .bind(&record.default_branch)
        .bind(&record.current_branch)
        .bind(&record.last_commit)
        .bind(record.commit_count)
        .bind(record.branch_count)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await?;

        tracing::debug!(id = %record.id, name = %record.name, "stored project record");
        Ok(())
    }

    /// Fetch a project record by id
    pub async fn get(&self, id: &str) -> Result<ProjectRecord> {
        sqlx::query_as::<_, ProjectRecord>("SELECT * FROM projects WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound(format!("project {} not found", id)))
    }

    /// List all project records, newest first
    pub async fn list(&self) -> Result<Vec<ProjectRecord>> {
        let records = sqlx::query_as::<_, ProjectRecord>(
            "SELECT * FROM projects ORDER BY created_at DESC, id DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    /// Record a head change for a project (branch switch or update)
    pub async fn update_head(
        &self,
        id: &str,
        current_branch: &str,
        last_commit: &str,
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE projects
             SET current_branch = ?2, last_commit = ?3, updated_at = ?4
             WHERE id = ?1",
        )
        .bind(id)
        .bind(current_branch)
        .bind(last_commit)
        .bind(chrono::Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("project {} not found", id)));
        }
        Ok(())
    }

    /// Delete a project record by id
    pub async fn delete(&self, id: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM projects WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("project {} not found", id)));
        }
        Ok(())
    }
}
