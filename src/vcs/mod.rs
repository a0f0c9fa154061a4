//! Version control for the backup tree.
//!
//! [`SyncOrchestrator`] drives a [`VcsClient`]; [`GitCli`] is the process
//! adapter. Syncs are serialized by callers through [`SyncLock`].

mod git;
mod lock;
mod sync;

pub use git::GitCli;
pub use lock::{SYNC_LOCK_FILE, SyncLock};
pub use sync::{
    COMMIT_EMAIL, COMMIT_NAME, GITIGNORE_CONTENT, REMOTE_NAME, SyncOrchestrator, SyncOutcome,
    authenticated_url,
};

/// Exit code and combined stdout/stderr of one client invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VcsOutput {
    pub code: i32,
    pub output: String,
}

impl VcsOutput {
    pub fn success(&self) -> bool {
        self.code == 0
    }
}

/// The narrow set of version control operations sync needs.
///
/// Every call reports its outcome instead of failing, so the orchestrator
/// decides which failures matter.
pub trait VcsClient {
    fn init(&self) -> VcsOutput;
    fn set_config(&self, key: &str, value: &str) -> VcsOutput;
    fn add_remote(&self, name: &str, url: &str) -> VcsOutput;
    fn remove_remote(&self, name: &str) -> VcsOutput;
    /// Stage every change, including deletions.
    fn add_all(&self) -> VcsOutput;
    /// Porcelain status; empty output means a clean tree.
    fn status(&self) -> VcsOutput;
    fn commit(&self, message: &str) -> VcsOutput;
    fn push(&self, remote: &str, branch: &str) -> VcsOutput;
    fn pull_rebase(&self, remote: &str, branch: &str) -> VcsOutput;
}
