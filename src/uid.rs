// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Deterministic Grafana identifiers.
//!
//! Grafana limits uids to 40 characters. Every identifier derived here stays
//! one below that at [`MAX_UID_LEN`]. Identifiers only depend on the branch
//! name and the dashboard file name, which makes repeated uploads from the
//! same branch overwrite each other instead of piling up.

use md5::{Digest, Md5};
use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    path::Path,
};

/// Longest uid handed to Grafana.
pub const MAX_UID_LEN: usize = 39;

/// Number of hex characters of the branch digest embedded into dashboard uids.
const BRANCH_DIGEST_LEN: usize = 7;

/// Strip every slash out of a branch name.
pub fn clean_branch(branch: impl AsRef<str>) -> String {
    branch.as_ref().replace('/', "")
}

/// Unique identifier of a rendered dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DashboardUid(String);

impl DashboardUid {
    /// Derive dashboard uid from branch name and dashboard file name.
    ///
    /// Layout is `uid-<digest><stem>` where `<digest>` is the first seven hex
    /// characters of the MD5 digest of the slash-free branch name, and
    /// `<stem>` is the file name without its extension.
    pub fn derive(branch: impl AsRef<str>, file_name: impl AsRef<Path>) -> Self {
        let digest = format!("{:x}", Md5::digest(clean_branch(branch).as_bytes()));
        let stem = file_name
            .as_ref()
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();

        Self(truncate(format!(
            "uid-{}{stem}",
            &digest[..BRANCH_DIGEST_LEN]
        )))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for DashboardUid {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(self.as_str())
    }
}

/// Unique identifier of the folder grouping a branch's dashboards.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FolderUid(String);

impl FolderUid {
    /// Derive folder uid from slash-free branch name.
    pub fn derive(branch: impl AsRef<str>) -> Self {
        Self(truncate(clean_branch(branch)))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for FolderUid {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(self.as_str())
    }
}

// INVARIANT: Cut on character boundaries, never inside a code point.
fn truncate(uid: String) -> String {
    match uid.char_indices().nth(MAX_UID_LEN) {
        Some((index, _)) => uid[..index].to_string(),
        None => uid,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use simple_test_case::test_case;

    #[test]
    fn dashboard_uid_layout() {
        // MD5 of "featurelogin".
        let digest = format!("{:x}", Md5::digest(b"featurelogin"));
        let result = DashboardUid::derive("feature/login", "overview.json");
        assert_eq!(result.as_str(), format!("uid-{}overview", &digest[..7]));
    }

    #[test]
    fn dashboard_uid_is_deterministic() {
        let first = DashboardUid::derive("feature/login", "overview.json");
        let second = DashboardUid::derive("feature/login", "overview.json");
        assert_eq!(first, second);
    }

    #[test]
    fn dashboard_uid_ignores_slashes_in_branch() {
        let slashed = DashboardUid::derive("feature/login", "overview.json");
        let clean = DashboardUid::derive("featurelogin", "overview.json");
        assert_eq!(slashed, clean);
    }

    #[test]
    fn dashboard_uid_differs_per_branch() {
        let left = DashboardUid::derive("feature/login", "overview.json");
        let right = DashboardUid::derive("feature/logout", "overview.json");
        assert_ne!(left, right);
    }

    #[test_case("overview.json", "overview"; "json source")]
    #[test_case("overview.jsonnet", "overview"; "jsonnet source")]
    #[test_case("dashboards/team/overview.json", "overview"; "full path")]
    #[test]
    fn dashboard_uid_uses_file_stem(file_name: &str, stem: &str) {
        let result = DashboardUid::derive("master", file_name);
        assert!(result.as_str().ends_with(stem));
        assert!(result.as_str().starts_with("uid-"));
    }

    #[test_case("a"; "short")]
    #[test_case("a-very-long-dashboard-name-that-blows-past-the-limit"; "long")]
    #[test_case("überlange-übersicht-mit-vielen-umlauten-ääääääää"; "multibyte")]
    #[test]
    fn dashboard_uid_respects_length_limit(name: &str) {
        let result = DashboardUid::derive("feature/login", format!("{name}.json"));
        assert!(result.as_str().chars().count() <= MAX_UID_LEN);
    }

    #[test_case("feature/login", "featurelogin"; "slashes removed")]
    #[test_case("master", "master"; "plain")]
    #[test_case(
        "project/this-branch-name-is-much-too-long-for-grafana",
        "projectthis-branch-name-is-much-too-lon";
        "truncated"
    )]
    #[test]
    fn folder_uid_derivation(branch: &str, expect: &str) {
        pretty_assertions::assert_eq!(FolderUid::derive(branch).as_str(), expect);
    }
}
