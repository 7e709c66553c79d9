// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Change set handling.
//!
//! A __change set__ is the ordered listing of repository-relative paths that
//! changed in the current build. The diff calculator writes it out as plain
//! text, one path per line, and the renderer reads it back in. The file only
//! lives for a single pipeline run and is never committed.

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    fs::{read_to_string, write},
    path::{Path, PathBuf},
};

/// Ordered listing of changed paths.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ChangeSet {
    paths: Vec<String>,
}

impl ChangeSet {
    /// Read change set from file.
    ///
    /// # Errors
    ///
    /// - Return [`ChangeSetError::Read`] if change set file cannot be read.
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        read_to_string(path.as_ref())
            .map(Self::from)
            .map_err(|err| ChangeSetError::Read {
                source: err,
                path: path.as_ref().to_path_buf(),
            })
    }

    /// Write change set to file, replacing any previous content.
    ///
    /// # Errors
    ///
    /// - Return [`ChangeSetError::Write`] if change set file cannot be written.
    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        write(path.as_ref(), self.to_string().as_bytes()).map_err(|err| ChangeSetError::Write {
            source: err,
            path: path.as_ref().to_path_buf(),
        })
    }

    /// Iterate over every changed path in order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.paths.iter().map(String::as_str)
    }

    /// Iterate over changed paths that live beneath dashboards root.
    pub fn dashboards<'a>(&'a self, root: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.paths().filter(move |path| is_beneath(path, root))
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

impl Display for ChangeSet {
    fn fmt(&self, fmt: &mut Formatter) -> FmtResult {
        for path in &self.paths {
            writeln!(fmt, "{path}")?;
        }

        Ok(())
    }
}

impl From<&str> for ChangeSet {
    fn from(content: &str) -> Self {
        // INVARIANT: Tolerate CRLF line endings and skip blank lines.
        content
            .lines()
            .map(|line| line.trim_end_matches('\r'))
            .filter(|line| !line.is_empty())
            .collect()
    }
}

impl From<String> for ChangeSet {
    fn from(content: String) -> Self {
        Self::from(content.as_str())
    }
}

impl<S> FromIterator<S> for ChangeSet
where
    S: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            paths: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// Check if repository-relative path lives beneath root directory.
///
/// Matches whole path components only, so `dashboards-old/x.json` is not
/// beneath `dashboards`.
pub fn is_beneath(path: &str, root: &str) -> bool {
    path.strip_prefix(root.trim_end_matches('/'))
        .and_then(|rest| rest.strip_prefix('/'))
        .is_some_and(|rest| !rest.is_empty())
}

/// Change set error types.
#[derive(Debug, thiserror::Error)]
pub enum ChangeSetError {
    /// Change set file cannot be read from.
    #[error("failed to read change set at {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Change set file cannot be written to.
    #[error("failed to write change set at {:?}", path.display())]
    Write {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = ChangeSetError> = std::result::Result<T, E>;
