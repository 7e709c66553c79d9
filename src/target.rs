// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Target environment selection.

use std::fmt::{Display, Formatter, Result as FmtResult};

/// Branch name fragment that routes a build to the test server.
pub const PROJECT_BRANCH_MARKER: &str = "project/";

/// Grafana server a branch deploys to.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// Development server.
    #[default]
    Dev,

    /// Test server, used by long lived project branches.
    Test,
}

impl Target {
    /// Select target environment from branch name alone.
    pub fn select(branch: impl AsRef<str>) -> Self {
        if branch.as_ref().contains(PROJECT_BRANCH_MARKER) {
            Self::Test
        } else {
            Self::Dev
        }
    }
}

impl Display for Target {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Dev => fmt.write_str("dev"),
            Self::Test => fmt.write_str("tst"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use simple_test_case::test_case;

    #[test_case("project/billing", Target::Test; "project branch")]
    #[test_case("team/project/billing", Target::Test; "nested project branch")]
    #[test_case("feature/login", Target::Dev; "feature branch")]
    #[test_case("master", Target::Dev; "trunk")]
    #[test_case("project", Target::Dev; "marker without slash")]
    #[test_case("", Target::Dev; "empty branch")]
    #[test]
    fn select_by_branch_name(branch: &str, expect: Target) {
        pretty_assertions::assert_eq!(Target::select(branch), expect);
    }
}
