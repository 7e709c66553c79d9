// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Version control access.
//!
//! The diff calculator only needs three things from version control: the full
//! listing of tracked files, a way to fetch the latest state of a remote
//! branch, and the listing of paths that differ between two commits. These
//! are modeled through [`VersionControl`] so the calculator can be exercised
//! without a real repository.
//!
//! [`Git2Repository`] answers listing and diffing questions through libgit2
//! directly. Fetching is delegated to the Git binary, because the CI platform
//! already configures its credentials for it.

use crate::syscall::{syscall_non_interactive, SyscallError};

use async_trait::async_trait;
use git2::{DiffFindOptions, Repository, Tree};
use std::{ffi::OsString, path::Path, time::Duration};
use tracing::{debug, info, instrument};

/// Version control operations used to compute a change set.
#[async_trait(?Send)]
pub trait VersionControl {
    /// Fetch latest state of remote branch.
    async fn fetch_branch(&self, branch: &str) -> Result<()>;

    /// List every tracked file, like git-ls-files.
    fn list_tracked_files(&self) -> Result<Vec<String>>;

    /// List paths that differ between a commit and the fetched remote branch
    /// tip, like `git diff --name-only <before> origin/<branch>`.
    fn changed_paths(&self, before: &str, branch: &str) -> Result<Vec<String>>;
}

/// Version control through libgit2 and the Git binary.
pub struct Git2Repository {
    repository: Repository,
    remote: String,
    timeout: Duration,
}

impl Git2Repository {
    /// Construct from already opened repository.
    pub fn new(repository: Repository, remote: impl Into<String>, timeout: Duration) -> Self {
        Self {
            repository,
            remote: remote.into(),
            timeout,
        }
    }

    /// Open repository containing target path.
    ///
    /// # Errors
    ///
    /// - Return [`VcsError::Git2`] if no repository can be found.
    pub fn discover(
        path: impl AsRef<Path>,
        remote: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        debug!("discover repository from {:?}", path.as_ref().display());
        let repository = Repository::discover(path.as_ref())?;
        Ok(Self::new(repository, remote, timeout))
    }

    fn remote_ref(&self, branch: &str) -> String {
        format!("refs/remotes/{}/{branch}", self.remote)
    }

    fn resolve_tree(&self, reference: &str) -> Result<Tree<'_>> {
        self.repository
            .revparse_single(reference)
            .and_then(|object| object.peel_to_tree())
            .map_err(|err| VcsError::Resolve {
                source: err,
                reference: reference.to_string(),
            })
    }

    fn expand_bin_args(&self, args: impl IntoIterator<Item = impl Into<OsString>>) -> Vec<OsString> {
        let mut bin_args: Vec<OsString> = vec![
            "--git-dir".into(),
            self.repository.path().as_os_str().to_os_string(),
        ];
        if let Some(workdir) = self.repository.workdir() {
            bin_args.extend(["--work-tree".into(), workdir.as_os_str().to_os_string()]);
        }
        bin_args.extend(args.into_iter().map(Into::into));

        bin_args
    }
}

#[async_trait(?Send)]
impl VersionControl for Git2Repository {
    #[instrument(skip(self), level = "debug")]
    async fn fetch_branch(&self, branch: &str) -> Result<()> {
        info!("fetch {branch} from {}", self.remote);
        let args = self.expand_bin_args(["fetch".into(), self.remote.clone(), branch.to_string()]);
        syscall_non_interactive("git", args, self.timeout).await?;

        Ok(())
    }

    fn list_tracked_files(&self) -> Result<Vec<String>> {
        let index = self.repository.index()?;
        let paths = index
            .iter()
            .map(|entry| String::from_utf8_lossy(&entry.path).into_owned())
            .collect();

        Ok(paths)
    }

    #[instrument(skip(self), level = "debug")]
    fn changed_paths(&self, before: &str, branch: &str) -> Result<Vec<String>> {
        let tip = self.remote_ref(branch);
        info!("calculate diff between {before} and {tip}");

        let before_tree = self.resolve_tree(before)?;
        let tip_tree = self.resolve_tree(&tip)?;
        let mut diff = self
            .repository
            .diff_tree_to_tree(Some(&before_tree), Some(&tip_tree), None)?;

        // INVARIANT: Renamed files only report their new path.
        diff.find_similar(Some(DiffFindOptions::new().renames(true)))?;

        // INVARIANT: Deleted files only carry their old path.
        let paths = diff
            .deltas()
            .filter_map(|delta| {
                delta
                    .new_file()
                    .path()
                    .or_else(|| delta.old_file().path())
                    .map(|path| path.to_string_lossy().into_owned())
            })
            .collect();

        Ok(paths)
    }
}

/// Version control error types.
#[derive(Debug, thiserror::Error)]
pub enum VcsError {
    /// Reference cannot be resolved to a tree.
    #[error("failed to resolve {reference:?} to a tree")]
    Resolve {
        #[source]
        source: git2::Error,
        reference: String,
    },

    /// Operations from libgit2 fail.
    #[error(transparent)]
    Git2(#[from] git2::Error),

    /// Git binary fails.
    #[error(transparent)]
    Syscall(#[from] SyscallError),
}

/// Friendly result alias :3
pub type Result<T, E = VcsError> = std::result::Result<T, E>;
