//! Repository acquisition and query commands

use clap::{Args, Subcommand};
use quarry_core::{Config, RepositoryHandle, RepositoryInfo, WorkspaceStore};

/// Repository commands
#[derive(Args, Debug)]
pub struct RepoArgs {
    #[command(subcommand)]
    pub command: RepoCommand,
}

#[derive(Subcommand, Debug)]
pub enum RepoCommand {
    /// Acquire a repository and show its metadata
    Open {
        /// Local path or remote git URL
        source: String,
    },

    /// List the files committed at a reference
    Tree {
        /// Local path or remote git URL
        source: String,

        /// Reference to read from (defaults to head)
        #[arg(long)]
        at: Option<String>,
    },

    /// Print a file's content as committed at a reference
    Cat {
        /// Local path or remote git URL
        source: String,

        /// Path inside the repository
        path: String,

        /// Reference to read from (defaults to head)
        #[arg(long)]
        at: Option<String>,
    },

    /// Show the commits that touched a path, newest first
    Log {
        /// Local path or remote git URL
        source: String,

        /// Path inside the repository
        path: String,
    },

    /// Check out a branch
    Checkout {
        /// Local path or remote git URL
        source: String,

        /// Branch to check out
        branch: String,
    },

    /// Remove a cached clone (remote repositories only)
    Clean {
        /// Local path or remote git URL
        source: String,
    },
}

impl RepoArgs {
    /// Execute the repo command
    pub async fn execute(&self, verbose: bool, config: &Config) -> anyhow::Result<()> {
        let store = WorkspaceStore::open(config.workspace_root()?)?;

        match &self.command {
            RepoCommand::Open { source } => {
                let handle = acquire(&store, source, config)?;
                print_info(&handle.info(), verbose);
            }
            RepoCommand::Tree { source, at } => {
                let handle = acquire(&store, source, config)?;
                let entries = handle.file_tree(at.as_deref())?;
                for entry in &entries {
                    if verbose {
                        println!(
                            "{:o} {} {:>9}  {}",
                            entry.mode, entry.blob_id, entry.size, entry.path
                        );
                    } else {
                        println!("{}", entry.path);
                    }
                }
                if verbose {
                    println!();
                    println!("{} files", entries.len());
                }
            }
            RepoCommand::Cat { source, path, at } => {
                let handle = acquire(&store, source, config)?;
                let content = handle.file_content(path, at.as_deref())?;
                let mut stdout = std::io::stdout();
                std::io::Write::write_all(&mut stdout, &content)?;
            }
            RepoCommand::Log { source, path } => {
                let handle = acquire(&store, source, config)?;
                for entry in handle.file_history(path)? {
                    println!("{} {} {} {}", entry.commit, entry.timestamp, entry.author, entry.message);
                }
            }
            RepoCommand::Checkout { source, branch } => {
                let handle = acquire(&store, source, config)?;
                handle.switch_branch(branch)?;
                println!("Switched to '{}' at {}", branch, handle.last_commit());
            }
            RepoCommand::Clean { source } => {
                let handle = acquire(&store, source, config)?;
                let was_local = handle.is_local();
                store.cleanup(&handle)?;
                if was_local {
                    println!("Unregistered '{}' (local repository left in place)", handle.name());
                } else {
                    println!("Removed cached clone '{}'", handle.name());
                }
            }
        }

        Ok(())
    }
}

fn acquire(
    store: &WorkspaceStore,
    source: &str,
    config: &Config,
) -> quarry_core::Result<RepositoryHandle> {
    store.acquire_with(source, &config.transfer_options())
}

fn print_info(info: &RepositoryInfo, verbose: bool) {
    println!("Repository: {}", info.name);
    println!("  path: {}", info.path.display());
    println!("  local: {}", info.is_local);
    println!("  default branch: {}", info.default_branch);
    println!("  head: {}", info.last_commit);
    if verbose {
        println!("  commits: {}", info.commit_count);
        println!("  branches: {}", info.branch_count);
    }
}
