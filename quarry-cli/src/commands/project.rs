//! Project record commands
//!
//! Projects pair an acquired repository with caller metadata and persist
//! the acquisition's RepositoryInfo fields through quarry-db.

use clap::{Args, Subcommand};
use quarry_core::{Config, WorkspaceStore};
use quarry_db::{Database, ProjectRecord};
use uuid::Uuid;

/// Project record commands
#[derive(Args, Debug)]
pub struct ProjectArgs {
    #[command(subcommand)]
    pub command: ProjectCommand,
}

#[derive(Subcommand, Debug)]
pub enum ProjectCommand {
    /// Acquire a repository and store it as a project
    Add {
        /// Human-readable project name
        name: String,

        /// Local path or remote git URL
        source: String,

        /// Free-form description
        #[arg(short, long)]
        description: Option<String>,
    },

    /// List stored projects, newest first
    List,

    /// Show one stored project
    Show {
        /// Project identifier
        id: String,
    },

    /// Remove a stored project record
    Remove {
        /// Project identifier
        id: String,
    },
}

impl ProjectArgs {
    /// Execute the project command
    pub async fn execute(&self, verbose: bool, config: &Config) -> anyhow::Result<()> {
        let db = Database::open_default().await?;
        let projects = db.projects();

        match &self.command {
            ProjectCommand::Add {
                name,
                source,
                description,
            } => {
                let store = WorkspaceStore::open(config.workspace_root()?)?;
                let handle = store.acquire_with(source, &config.transfer_options())?;
                let info = handle.info();

                let mut record = ProjectRecord::new(
                    Uuid::new_v4().to_string(),
                    name,
                    source,
                    info.path.display().to_string(),
                    info.is_local,
                    &info.default_branch,
                    &info.default_branch,
                    &info.last_commit,
                    info.commit_count as i64,
                    info.branch_count as i64,
                );
                if let Some(description) = description {
                    record = record.with_description(description);
                }
                projects.create(&record).await?;

                println!("Added project '{}' ({})", name, record.id);
                if verbose {
                    println!("  source: {}", source);
                    println!("  path: {}", info.path.display());
                    println!("  head: {}", info.last_commit);
                }
            }
            ProjectCommand::List => {
                let records = projects.list().await?;
                if records.is_empty() {
                    println!("No projects stored");
                    return Ok(());
                }
                for record in records {
                    println!(
                        "{}  {}  {}  {}",
                        record.id, record.name, record.repo_url, record.created_at
                    );
                }
            }
            ProjectCommand::Show { id } => {
                let record = projects.get(id).await?;
                println!("Project: {} ({})", record.name, record.id);
                if let Some(description) = &record.description {
                    println!("  description: {}", description);
                }
                println!("  source: {}", record.repo_url);
                println!("  path: {}", record.repo_path);
                println!("  local: {}", record.is_local);
                println!("  default branch: {}", record.default_branch);
                println!("  current branch: {}", record.current_branch);
                println!("  head: {}", record.last_commit);
                println!("  commits: {}", record.commit_count);
                println!("  branches: {}", record.branch_count);
                println!("  created: {}", record.created_at);
                println!("  updated: {}", record.updated_at);
            }
            ProjectCommand::Remove { id } => {
                projects.delete(id).await?;
                println!("Removed project {}", id);
            }
        }

        Ok(())
    }
}
