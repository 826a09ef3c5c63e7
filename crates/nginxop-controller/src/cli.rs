//!
//! # CLI for the NginxOp controller
//!
//! Parameters are resolved in the following sequence:
//!     1) default values
//!     2) environment variables
//!     3) cli parameters
//!
use std::io::Write;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::debug;

use nginxop_metadata::crd::nginxop_crd;

use crate::config::{DEFAULT_CLUSTER_ROLE, DEFAULT_CONCURRENCY, OperatorConfig};
use crate::rbac::cluster_role;

/// cli options
#[derive(Debug, Parser)]
#[command(name = "nginxop-controller", about = "NginxOp reconciliation controller")]
pub struct OperatorOpt {
    #[command(subcommand)]
    pub command: OperatorCmd,
}

impl OperatorOpt {
    pub async fn process(self) -> Result<()> {
        match self.command {
            OperatorCmd::Run(opt) => {
                let config = opt.as_config();
                debug!(?config, "operator config");
                let client = kube::Client::try_default()
                    .await
                    .context("unable to connect to kubernetes")?;
                crate::operator::run(client, config).await;
                Ok(())
            }
            OperatorCmd::Crd => print_yaml(&nginxop_crd()),
            OperatorCmd::Rbac(opt) => print_yaml(&cluster_role(&opt.name)),
        }
    }
}

fn print_yaml<T: serde::Serialize>(value: &T) -> Result<()> {
    let yaml = serde_yaml::to_string(value)?;
    std::io::stdout().write_all(yaml.as_bytes())?;
    Ok(())
}

#[derive(Debug, Subcommand)]
pub enum OperatorCmd {
    /// Watch NginxOp resources and reconcile their children
    Run(RunOpt),

    /// Print the NginxOp CustomResourceDefinition
    Crd,

    /// Print the ClusterRole the controller runs with
    Rbac(RbacOpt),
}

#[derive(Debug, Args)]
pub struct RunOpt {
    /// k8 namespace to watch, all namespaces if omitted
    #[arg(short = 'n', long, value_name = "namespace", env = "NGINXOP_NAMESPACE")]
    namespace: Option<String>,

    /// Requeue delay after a successful pass
    #[arg(
        long,
        value_parser = humantime::parse_duration,
        default_value = "5m",
        env = "NGINXOP_RESYNC_INTERVAL"
    )]
    resync_interval: Duration,

    /// Requeue delay after a failed pass
    #[arg(
        long,
        value_parser = humantime::parse_duration,
        default_value = "30s",
        env = "NGINXOP_RETRY_INTERVAL"
    )]
    retry_interval: Duration,

    /// Maximum number of passes running at once, 0 for unbounded
    #[arg(long, default_value_t = DEFAULT_CONCURRENCY, env = "NGINXOP_CONCURRENCY")]
    concurrency: u16,
}

impl RunOpt {
    #[allow(clippy::wrong_self_convention)]
    pub fn as_config(self) -> OperatorConfig {
        let mut config = OperatorConfig::default();

        if let Some(namespace) = self.namespace {
            config.namespace = Some(namespace);
        }
        config.resync_interval = self.resync_interval;
        config.retry_interval = self.retry_interval;
        config.concurrency = self.concurrency;
        config
    }
}

#[derive(Debug, Args)]
pub struct RbacOpt {
    /// name of the generated ClusterRole
    #[arg(long, default_value = DEFAULT_CLUSTER_ROLE)]
    pub name: String,
}
