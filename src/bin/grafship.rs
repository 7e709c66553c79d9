// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use grafship::{
    config::{
        ConfigError, Environment, Requirements, Settings, GRAFANA_PASSWORD_VAR, GRAFANA_USER_VAR,
    },
    grafana::GrafanaClient,
    logging,
    pipeline::{self, DeployRequest},
    target::Target,
    tools::ExternalTools,
};

use anyhow::Result;
use clap::Parser;
use std::{env::current_dir, path::PathBuf};
use tracing::info;

/// Render changed Grafana dashboards and optionally deploy them.
#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "grafship [options] [--project <name> --deploy]",
    version
)]
struct Cli {
    /// Project being built, required for deployment.
    #[arg(short, long, value_name = "name")]
    pub project: Option<String>,

    /// Deploy rendered dashboards after rendering.
    #[arg(short, long)]
    pub deploy: bool,

    /// Delete Grafana folder of current branch instead of rendering.
    #[arg(long, conflicts_with = "deploy")]
    pub cleanup: bool,

    /// Path to pipeline settings file.
    #[arg(short, long, value_name = "path")]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// Check flag combinations clap cannot express.
    ///
    /// Returns the project to deploy, if deployment was requested.
    fn validate(&self) -> Result<Option<String>, ConfigError> {
        if !self.deploy {
            return Ok(None);
        }

        match self.project.as_deref().map(str::trim) {
            Some(project) if !project.is_empty() => Ok(Some(project.to_string())),
            _ => Err(ConfigError::MissingFlag(
                "--deploy requires a non-empty --project <name>".into(),
            )),
        }
    }

    async fn run(self) -> Result<()> {
        let project = self.validate()?;
        let settings = Settings::load(self.config.as_deref())?;

        let requirements = Requirements {
            before_sha_unless_trunk: None,
            credentials: self.deploy || self.cleanup,
        };
        let environment = Environment::from_env(&requirements)?;
        let toolchain = ExternalTools::from_settings(&settings);
        let workdir = current_dir()?;

        if self.cleanup {
            let api = connect(&settings, &environment)?;
            pipeline::cleanup(&environment, toolchain, api).await?;
            return Ok(());
        }

        let deploy = match project {
            Some(project) => Some(DeployRequest {
                project,
                target: Target::select(&environment.branch),
                api: connect(&settings, &environment)?,
            }),
            None => None,
        };

        let stage = pipeline::build(&settings, &environment, workdir, toolchain, deploy).await?;
        info!("pipeline finished at stage: {stage}");

        Ok(())
    }
}

fn connect(settings: &Settings, environment: &Environment) -> Result<GrafanaClient> {
    let target = Target::select(&environment.branch);
    let credentials = environment
        .credentials
        .clone()
        .ok_or_else(|| ConfigError::MissingEnv {
            keys: vec![GRAFANA_USER_VAR.into(), GRAFANA_PASSWORD_VAR.into()],
        })?;
    let client = GrafanaClient::new(settings.server_url(target)?, credentials, &settings.grafana)?;
    info!("use {target} server at {}", client.base_url());

    Ok(client)
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    logging::init();
    logging::exit_with(Cli::parse().run().await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use simple_test_case::test_case;

    #[test_case(&["grafship", "--deploy"]; "missing project")]
    #[test_case(&["grafship", "--deploy", "--project", ""]; "empty project")]
    #[test_case(&["grafship", "--deploy", "--project", "  "]; "blank project")]
    #[test]
    fn deploy_without_project_is_rejected(args: &[&str]) {
        let cli = Cli::try_parse_from(args).unwrap();
        assert!(matches!(cli.validate(), Err(ConfigError::MissingFlag(_))));
    }

    #[test_case(&["grafship"], None; "render only")]
    #[test_case(&["grafship", "--project", "billing"], None; "project without deploy")]
    #[test_case(&["grafship", "--deploy", "--project", "billing"], Some("billing"); "deploy")]
    #[test]
    fn valid_flags(args: &[&str], expect: Option<&str>) {
        let cli = Cli::try_parse_from(args).unwrap();
        pretty_assertions::assert_eq!(cli.validate().unwrap(), expect.map(String::from));
    }

    #[test]
    fn cleanup_conflicts_with_deploy() {
        let result = Cli::try_parse_from(["grafship", "--deploy", "--cleanup", "--project", "x"]);
        assert!(result.is_err());
    }
}
