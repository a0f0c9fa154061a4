//! `git` command-line adapter.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::debug;

use super::{VcsClient, VcsOutput};

/// Runs the `git` binary against one working tree (`git -C <root> ...`).
///
/// Prompts are disabled so a missing or wrong token fails fast instead of
/// hanging an unattended run.
#[derive(Debug, Clone)]
pub struct GitCli {
    root: PathBuf,
    program: OsString,
}

impl GitCli {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            program: OsString::from("git"),
        }
    }

    /// Use a specific git executable.
    pub fn with_program(mut self, program: impl Into<OsString>) -> Self {
        self.program = program.into();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn run(&self, args: &[&str]) -> VcsOutput {
        // Arguments can carry the token-bearing URL; only the verb is logged
        debug!(root = %self.root.display(), verb = args.first().copied().unwrap_or(""), "running git");
        let result = Command::new(&self.program)
            .arg("-C")
            .arg(&self.root)
            .args(args)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .output();

        match result {
            Ok(out) => {
                let mut output = String::from_utf8_lossy(&out.stdout).into_owned();
                output.push_str(&String::from_utf8_lossy(&out.stderr));
                VcsOutput {
                    code: out.status.code().unwrap_or(-1),
                    output,
                }
            }
            Err(e) => VcsOutput {
                code: -1,
                output: format!("failed to run git: {}", e),
            },
        }
    }
}

impl VcsClient for GitCli {
    fn init(&self) -> VcsOutput {
        self.run(&["init"])
    }

    fn set_config(&self, key: &str, value: &str) -> VcsOutput {
        self.run(&["config", key, value])
    }

    fn add_remote(&self, name: &str, url: &str) -> VcsOutput {
        self.run(&["remote", "add", name, url])
    }

    fn remove_remote(&self, name: &str) -> VcsOutput {
        self.run(&["remote", "remove", name])
    }

    fn add_all(&self) -> VcsOutput {
        self.run(&["add", "-A"])
    }

    fn status(&self) -> VcsOutput {
        self.run(&["status", "--porcelain"])
    }

    fn commit(&self, message: &str) -> VcsOutput {
        self.run(&["commit", "-m", message])
    }

    fn push(&self, remote: &str, branch: &str) -> VcsOutput {
        let refspec = format!("HEAD:refs/heads/{}", branch);
        self.run(&["push", "-u", remote, &refspec])
    }

    fn pull_rebase(&self, remote: &str, branch: &str) -> VcsOutput {
        self.run(&["pull", "--rebase", remote, branch])
    }
}
