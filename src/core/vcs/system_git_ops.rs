//! Additional operations for SystemGit (remotes, branches, index, commits)

use super::system_git::SystemGit;
use crate::core::error::{GitError, PublishError, PublishResult};
use std::path::Path;

impl SystemGit {
    /// Paths with unstaged modifications (`git ls-files -m`)
    pub fn modified_files(&self) -> PublishResult<Vec<String>> {
        let stdout = self.run(["ls-files", "-m"])?;
        Ok(stdout
            .lines()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .collect())
    }

    /// Get remote URL, `None` if the remote is not configured
    pub fn remote_url(&self, name: &str) -> PublishResult<Option<String>> {
        let remotes = self.run(["remote"])?;
        if !remotes.lines().any(|r| r.trim() == name) {
            return Ok(None);
        }
        let url = self.run(["remote", "get-url", name])?;
        Ok(Some(url.trim().to_string()))
    }

    /// Add a remote repository
    pub fn add_remote(&self, name: &str, url: &str) -> PublishResult<()> {
        self.run(["remote", "add", name, url])?;
        Ok(())
    }

    pub fn remove_remote(&self, name: &str) -> PublishResult<()> {
        self.run(["remote", "remove", name])?;
        Ok(())
    }

    /// Make `name` point at `url`, re-adding it if it points elsewhere
    pub fn ensure_remote(&self, name: &str, url: &str) -> PublishResult<()> {
        match self.remote_url(name)? {
            Some(existing) if existing == url => Ok(()),
            Some(existing) => {
                tracing::info!(remote = name, from = %existing, to = url, "re-pointing remote");
                self.remove_remote(name)?;
                self.add_remote(name, url)
            }
            None => self.add_remote(name, url),
        }
    }

    /// Fetch from remote
    pub fn fetch(&self, remote_name: &str) -> PublishResult<()> {
        self.run(["fetch", remote_name])?;
        Ok(())
    }

    /// Whether `refs/heads/<branch>` exists on the remote
    pub fn remote_branch_exists(&self, remote_name: &str, branch: &str) -> PublishResult<bool> {
        let stdout = self.run(["ls-remote", "--heads", remote_name, branch])?;
        let wanted = format!("refs/heads/{}", branch);
        Ok(stdout
            .lines()
            .any(|line| line.split_whitespace().nth(1) == Some(wanted.as_str())))
    }

    pub fn local_branch_exists(&self, branch: &str) -> PublishResult<bool> {
        let stdout = self.run(["branch", "--list", branch])?;
        Ok(!stdout.trim().is_empty())
    }

    pub fn delete_branch(&self, branch: &str) -> PublishResult<()> {
        self.run(["branch", "-D", branch])?;
        Ok(())
    }

    /// Checkout a branch
    pub fn checkout(&self, branch_name: &str) -> PublishResult<()> {
        self.run(["checkout", branch_name])?;
        Ok(())
    }

    /// Checkout a branch, discarding changes to tracked files
    pub fn checkout_force(&self, branch_name: &str) -> PublishResult<()> {
        self.run(["checkout", "-f", branch_name])?;
        Ok(())
    }

    /// Create `branch` tracking `upstream` and switch to it
    pub fn checkout_tracking(&self, branch: &str, upstream: &str) -> PublishResult<()> {
        self.run(["checkout", "-b", branch, "--track", upstream])?;
        Ok(())
    }

    /// Create `branch` with no history and switch to it
    pub fn checkout_orphan(&self, branch: &str) -> PublishResult<()> {
        self.run(["checkout", "--orphan", branch])?;
        Ok(())
    }

    /// Restore the whole tree of `source` into the working tree and index
    pub fn checkout_tree_from(&self, source: &str) -> PublishResult<()> {
        self.run(["checkout", source, "--", "."])?;
        Ok(())
    }

    /// Drop paths from the index, leaving the working tree alone
    pub fn remove_cached(&self, paths: &[String]) -> PublishResult<()> {
        if paths.is_empty() {
            return Ok(());
        }
        let mut args = vec!["rm", "-r", "-q", "--cached", "--ignore-unmatch", "--"];
        args.extend(paths.iter().map(String::as_str));
        self.run(args)?;
        Ok(())
    }

    pub fn add_all(&self) -> PublishResult<()> {
        self.run(["add", "-A"])?;
        Ok(())
    }

    pub fn add_path(&self, path: &Path) -> PublishResult<()> {
        let mut args = vec![std::ffi::OsString::from("add"), "-A".into(), "--".into()];
        args.push(path.as_os_str().to_os_string());
        self.run(args)?;
        Ok(())
    }

    pub fn commit(&self, message: &str, amend: bool, allow_empty: bool) -> PublishResult<()> {
        let mut args = vec!["commit", "-q", "-m", message];
        if amend {
            args.push("--amend");
        }
        if allow_empty {
            args.push("--allow-empty");
        }
        self.run(args)?;
        Ok(())
    }

    /// Full messages of every commit reachable from `reference`
    pub fn log_messages(&self, reference: &str) -> PublishResult<String> {
        self.run(["log", reference, "--pretty=%B"])
    }

    /// Whether HEAD changes nothing relative to its first parent
    pub fn head_diff_is_empty(&self) -> PublishResult<bool> {
        let stdout = self.run(["diff", "@~..@"])?;
        Ok(stdout.trim().is_empty())
    }

    /// Push `local` to `branch` on the remote
    pub fn push(&self, remote_name: &str, local: &str, branch: &str) -> PublishResult<()> {
        let refspec = format!("{}:{}", local, branch);
        let args: Vec<std::ffi::OsString> = vec!["push".into(), remote_name.into(), refspec.into()];
        let output = self.output(&args)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PublishError::Git(GitError::PushFailed {
                remote: remote_name.to_string(),
                branch: branch.to_string(),
                reason: stderr.trim().to_string(),
            }));
        }

        Ok(())
    }
}
