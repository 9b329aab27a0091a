//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod init;
mod pipeline;
mod runtime;

use anyhow::Result;
use clap::Subcommand;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::config::{CONF_DIR, Config};

/// Pipeline run when none is given
const DEFAULT_PIPELINE: &str = "__default__";

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// List all the jobs (current and historical) on the orchestrator
    ListPipelines,
    /// Deploy the pipeline as a single run
    RunOnce {
        /// Image to use for pipeline execution [default: run_config.image]
        #[arg(short, long)]
        image: Option<String>,

        /// Name of the pipeline to run
        #[arg(short, long, default_value = DEFAULT_PIPELINE)]
        pipeline: String,

        /// Parameter override in the form key=value
        #[arg(long, value_parser = parse_key_val)]
        param: Vec<(String, String)>,

        /// Wait for the run to finish
        #[arg(short, long)]
        wait: bool,

        /// Seconds to wait before giving up
        #[arg(long, default_value_t = 3600)]
        timeout: u64,
    },
    /// Translate the pipeline into a compiled graph JSON file
    Compile {
        /// Image to use for pipeline execution [default: run_config.image]
        #[arg(short, long)]
        image: Option<String>,

        /// Name of the pipeline to compile
        #[arg(short, long, default_value = DEFAULT_PIPELINE)]
        pipeline: String,

        /// Compiled graph output file
        #[arg(short, long, default_value = "pipeline.json")]
        output: PathBuf,
    },
    /// Schedule recurring runs of the pipeline
    Schedule {
        /// Name of the pipeline to schedule
        #[arg(short, long, default_value = DEFAULT_PIPELINE)]
        pipeline: String,

        /// Cron expression for recurring run
        #[arg(short, long, default_value = "0 0 12 * *")]
        cron_expression: String,

        /// Time zone of the cron expression
        #[arg(long, default_value = "Etc/UTC")]
        time_zone: String,

        /// Parameter override in the form key=value
        #[arg(long, value_parser = parse_key_val)]
        param: Vec<(String, String)>,
    },
    /// Show how the pipeline is grouped into units
    Describe {
        /// Name of the pipeline to describe
        #[arg(short, long, default_value = DEFAULT_PIPELINE)]
        pipeline: String,
    },
    /// Write a starter configuration for the project
    Init {
        /// Cloud project id
        project_id: String,

        /// Cloud region
        region: String,

        /// Template image and run names for CI and write a GitHub Actions workflow
        #[arg(long)]
        with_github_actions: bool,
    },
    /// Print the orchestrator UI address for the configured project
    Ui,
    /// Store run parameters and generate provider config files (run inside units)
    #[command(hide = true)]
    InitializeJob {
        /// Parameters as a JSON object
        #[arg(long, default_value = "")]
        params: String,

        /// Runtime config file to update
        #[arg(long, default_value = pipeweave_core::generator::RUNTIME_CONFIG_FILE)]
        output: PathBuf,
    },
    /// Write a fresh tracking run id to a file (run inside units)
    #[command(hide = true)]
    MlflowStart {
        /// Orchestrator run name
        run_name: String,

        /// File receiving the tracking run id
        #[arg(long, default_value = "/tmp/mlflow_run_id")]
        output: PathBuf,
    },
}

/// Parse a single key=value pair
fn parse_key_val(s: &str) -> Result<(String, String)> {
    let pos = s
        .find('=')
        .ok_or_else(|| anyhow::anyhow!("invalid KEY=value: no `=` found in `{}`", s))?;
    Ok((s[..pos].to_string(), s[pos + 1..].to_string()))
}

/// Parameter overrides as orchestrator parameter values
fn format_params(params: Vec<(String, String)>) -> HashMap<String, JsonValue> {
    params
        .into_iter()
        .map(|(k, v)| (k, JsonValue::String(v)))
        .collect()
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::ListPipelines => pipeline::list_pipelines(config).await,
        Commands::RunOnce {
            image,
            pipeline,
            param,
            wait,
            timeout,
        } => {
            pipeline::run_once(config, image, &pipeline, format_params(param), wait, timeout).await
        }
        Commands::Compile {
            image,
            pipeline,
            output,
        } => pipeline::compile(config, image, &pipeline, &output).await,
        Commands::Schedule {
            pipeline,
            cron_expression,
            time_zone,
            param,
        } => {
            pipeline::schedule(config, &pipeline, &cron_expression, &time_zone, format_params(param))
                .await
        }
        Commands::Describe { pipeline } => pipeline::describe(config, &pipeline).await,
        Commands::Init {
            project_id,
            region,
            with_github_actions,
        } => init::init(&project_id, &region, with_github_actions),
        Commands::Ui => init::ui(config),
        Commands::InitializeJob { params, output } => {
            runtime::initialize_job(config, &params, &output, Path::new(CONF_DIR))
        }
        Commands::MlflowStart { run_name, output } => runtime::mlflow_start(&run_name, &output),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_val() {
        assert_eq!(
            parse_key_val("lr=0.1").unwrap(),
            ("lr".to_string(), "0.1".to_string())
        );
        assert_eq!(
            parse_key_val("query=a=b").unwrap(),
            ("query".to_string(), "a=b".to_string())
        );
        assert!(parse_key_val("novalue").is_err());
    }

    #[test]
    fn test_format_params_keeps_strings() {
        let params = format_params(vec![("epochs".into(), "3".into())]);
        assert_eq!(params["epochs"], JsonValue::String("3".into()));
    }
}
