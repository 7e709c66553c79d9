// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Grafana dashboard pipeline for CI.
//!
//! Dashboards live in a Git repository as either plain JSON or Jsonnet
//! sources beneath `dashboards/<project>/`. On every push the CI platform
//! runs two programs:
//!
//! 1. `grafship-diff` figures out which files changed since the previous
//!    push and writes them to a change set file.
//! 2. `grafship` renders every changed dashboard into `dist/<project>/`,
//!    giving each one a deterministic uid derived from the branch, and can
//!    then upload the output tree into a per-branch Grafana folder on the
//!    development or test server.
//!
//! Both programs talk to the outside world through small traits, i.e.,
//! [`vcs::VersionControl`], [`tools::Toolchain`], and
//! [`grafana::DashboardApi`], so the pipeline itself can be exercised
//! without Git remotes, Jsonnet, jq, or a live Grafana server.

pub mod change;
pub mod config;
pub mod deploy;
pub mod diff;
pub mod grafana;
pub mod logging;
pub mod pipeline;
pub mod render;
pub mod syscall;
pub mod target;
pub mod tools;
pub mod uid;
pub mod vcs;

pub use change::ChangeSet;
pub use config::{Environment, Requirements, Settings};
pub use pipeline::{DeployRequest, Stage};
pub use target::Target;
pub use uid::{DashboardUid, FolderUid};
