//! Shell invocations run inside generated units

use serde_json::{Map, Value};

use crate::config::RunConfig;

/// Command-line tool installed in the unit image
pub const CLI_COMMAND: &str = "pipeweave";

/// Runtime config file written by `initialize-job`
pub const RUNTIME_CONFIG_FILE: &str = "config.yaml";

/// Resolved by the orchestrator to the id of the running job
pub const PIPELINE_JOB_ID_PLACEHOLDER: &str = "{{$.pipeline_job_uuid}}";

/// Environment variable carrying the job id into the framework run
pub const RUN_ID_ENV: &str = "KEDRO_CONFIG_RUN_ID";

/// Turns off run-id templating of the framework config inside units
pub const CONFIG_HOOK_ENV: &str = "PIPEWEAVE_DISABLE_CONFIG_HOOK";

/// Framework globals file pattern, forwarded to units when set
pub const GLOBALS_PATTERN_ENV: &str = "KEDRO_GLOBALS_PATTERN";

pub const MLFLOW_RUN_ID_PLACEHOLDER: &str = "{{$.inputs.parameters['mlflow_run_id']}}";
pub const MLFLOW_TOKEN_PLACEHOLDER: &str = "{{$.inputs.parameters['mlflow_tracking_token']}}";
pub const MLFLOW_OUTPUT_PLACEHOLDER: &str = "{{$.outputs.parameters['output'].output_file}}";

/// Environment of the compiling process forwarded into unit commands
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnitEnvironment {
    pub config_hook_disabled: bool,
    pub globals_pattern: Option<String>,
}

impl UnitEnvironment {
    /// Read [`CONFIG_HOOK_ENV`] and [`GLOBALS_PATTERN_ENV`] from the process environment
    pub fn from_env() -> Self {
        Self {
            config_hook_disabled: std::env::var(CONFIG_HOOK_ENV)
                .map(|value| parse_flag(&value))
                .unwrap_or(false),
            globals_pattern: std::env::var(GLOBALS_PATTERN_ENV)
                .ok()
                .filter(|value| !value.is_empty()),
        }
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "y" | "yes" | "t" | "true" | "on"
    )
}

/// Single-quote `value` for `/bin/bash`
///
/// Embedded single quotes become `'\''`, so the result is always one word.
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Builds the `/bin/bash -c` argument of each unit
pub(crate) struct CommandBuilder<'a> {
    run_config: &'a RunConfig,
    env: &'a str,
    params: &'a Map<String, Value>,
    environment: &'a UnitEnvironment,
}

impl<'a> CommandBuilder<'a> {
    pub(crate) fn new(
        run_config: &'a RunConfig,
        env: &'a str,
        params: &'a Map<String, Value>,
        environment: &'a UnitEnvironment,
    ) -> Self {
        Self {
            run_config,
            env,
            params,
            environment,
        }
    }

    fn has_params(&self) -> bool {
        !self.params.is_empty()
    }

    /// `/etc/hosts` entries for the configured host aliases
    fn hosts_file(&self) -> String {
        self.run_config
            .network
            .host_aliases
            .iter()
            .map(|alias| format!("echo {}\t{} >> /etc/hosts;", alias.ip, alias.hostnames.join(" ")))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn globals_env(&self) -> String {
        match &self.environment.globals_pattern {
            Some(pattern) => format!("{GLOBALS_PATTERN_ENV}={}", shell_quote(pattern)),
            None => String::new(),
        }
    }

    /// Materializes run parameters into the runtime config before the run
    fn params_command(&self) -> String {
        if !self.has_params() {
            return String::new();
        }
        let params = Value::Object(self.params.clone()).to_string();
        join_parts([
            self.globals_env(),
            format!(
                "{CLI_COMMAND} -e {} initialize-job --params={} --output {RUNTIME_CONFIG_FILE} &&",
                self.env,
                shell_quote(&params)
            ),
        ])
    }

    /// Invocation running `nodes` of `pipeline` through the framework
    pub(crate) fn unit_command(&self, pipeline: &str, nodes: &[String], mlflow: bool) -> String {
        let framework_run = format!(
            "{} run -e {} --pipeline {} --nodes {}",
            self.run_config.framework_command,
            self.env,
            shell_quote(pipeline),
            shell_quote(&nodes.join(","))
        );

        join_parts([
            self.hosts_file(),
            self.params_command(),
            if mlflow {
                format!("MLFLOW_RUN_ID=\"{MLFLOW_RUN_ID_PLACEHOLDER}\"")
            } else {
                String::new()
            },
            format!("{CONFIG_HOOK_ENV}={}", self.environment.config_hook_disabled),
            format!("{RUN_ID_ENV}={PIPELINE_JOB_ID_PLACEHOLDER}"),
            self.globals_env(),
            framework_run,
            if self.has_params() {
                format!("--config {RUNTIME_CONFIG_FILE}")
            } else {
                String::new()
            },
        ])
    }

    /// Invocation of the unit that allocates the tracking run id
    pub(crate) fn mlflow_command(&self, run_name: &str) -> String {
        join_parts([
            self.hosts_file(),
            format!("mkdir --parents `dirname {MLFLOW_OUTPUT_PLACEHOLDER}` &&"),
            self.params_command(),
            format!("MLFLOW_TRACKING_TOKEN={MLFLOW_TOKEN_PLACEHOLDER}"),
            format!(
                "{CLI_COMMAND} -e {} mlflow-start --output {MLFLOW_OUTPUT_PLACEHOLDER} {}",
                self.env,
                shell_quote(run_name)
            ),
        ])
    }
}

fn join_parts<const N: usize>(parts: [String; N]) -> String {
    parts
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{HostAlias, PluginConfig};
    use std::process::Command;

    fn run_config() -> RunConfig {
        PluginConfig::from_yaml_str(
            "project_id: p\nregion: r\nrun_config:\n  image: img\n  experiment_name: exp\n",
        )
        .unwrap()
        .run_config
    }

    /// Run `command` under bash with the unit tools stubbed to print their arguments
    fn stubbed_calls(command: &str) -> Vec<String> {
        let script = format!(
            "set -f; pipeweave() {{ printf '%s\\0' pipeweave \"$@\"; }}; \
             kedro() {{ printf '%s\\0' kedro \"$@\"; }}; {command}"
        );
        let output = Command::new("bash").arg("-c").arg(script).output().unwrap();
        assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
        String::from_utf8(output.stdout)
            .unwrap()
            .split_terminator('\0')
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("a,b"), "'a,b'");
        assert_eq!(shell_quote("O'Brien"), r"'O'\''Brien'");
        assert_eq!(shell_quote(""), "''");
    }

    #[test]
    fn test_plain_unit_command() {
        let config = run_config();
        let params = Map::new();
        let environment = UnitEnvironment::default();
        let command = CommandBuilder::new(&config, "base", &params, &environment).unit_command(
            "pipeline",
            &["a".to_string(), "b".to_string()],
            false,
        );

        assert_eq!(
            command,
            "PIPEWEAVE_DISABLE_CONFIG_HOOK=false KEDRO_CONFIG_RUN_ID={{$.pipeline_job_uuid}} \
             kedro run -e base --pipeline 'pipeline' --nodes 'a,b'"
        );
    }

    #[test]
    fn test_unit_command_with_params_and_mlflow() {
        let config = run_config();
        let mut params = Map::new();
        params.insert("lr".into(), Value::from(0.1));
        let environment = UnitEnvironment::default();

        let command = CommandBuilder::new(&config, "dev", &params, &environment)
            .unit_command("p", &["n".to_string()], true);

        assert!(command.starts_with(
            "pipeweave -e dev initialize-job --params='{\"lr\":0.1}' --output config.yaml && MLFLOW_RUN_ID="
        ));
        assert!(command.contains("MLFLOW_RUN_ID=\"{{$.inputs.parameters['mlflow_run_id']}}\""));
        assert!(command.ends_with("--nodes 'n' --config config.yaml"));
    }

    #[test]
    fn test_quotes_and_shell_syntax_stay_inside_their_arguments() {
        let config = run_config();
        let mut params = Map::new();
        params.insert("owner".into(), Value::from("O'Brien; echo injected"));
        let environment = UnitEnvironment::default();
        let nodes = vec!["say \"hi\"".to_string(), "cost_$HOME".to_string()];

        let command =
            CommandBuilder::new(&config, "base", &params, &environment).unit_command("p", &nodes, false);

        assert_eq!(
            stubbed_calls(&command),
            vec![
                "pipeweave",
                "-e",
                "base",
                "initialize-job",
                "--params={\"owner\":\"O'Brien; echo injected\"}",
                "--output",
                "config.yaml",
                "kedro",
                "run",
                "-e",
                "base",
                "--pipeline",
                "p",
                "--nodes",
                "say \"hi\",cost_$HOME",
                "--config",
                "config.yaml",
            ]
        );
    }

    #[test]
    fn test_unit_environment_is_forwarded() {
        let config = run_config();
        let mut params = Map::new();
        params.insert("lr".into(), Value::from(0.1));
        let environment = UnitEnvironment {
            config_hook_disabled: true,
            globals_pattern: Some("*globals.yml".into()),
        };

        let command = CommandBuilder::new(&config, "base", &params, &environment)
            .unit_command("p", &["n".to_string()], false);

        assert!(command.starts_with("KEDRO_GLOBALS_PATTERN='*globals.yml' pipeweave -e base initialize-job"));
        assert!(command.contains(
            "PIPEWEAVE_DISABLE_CONFIG_HOOK=true KEDRO_CONFIG_RUN_ID={{$.pipeline_job_uuid}} \
             KEDRO_GLOBALS_PATTERN='*globals.yml' kedro run"
        ));
    }

    #[test]
    fn test_parse_flag() {
        for value in ["1", "true", "True", "yes", "on", " t "] {
            assert!(parse_flag(value), "{value}");
        }
        for value in ["", "0", "false", "no", "off", "nope"] {
            assert!(!parse_flag(value), "{value}");
        }
    }

    #[test]
    fn test_host_aliases_come_first() {
        let mut config = run_config();
        config.network.host_aliases = vec![HostAlias {
            ip: "10.0.0.1".into(),
            hostnames: vec!["mlflow".into(), "mlflow.internal".into()],
        }];
        let params = Map::new();
        let environment = UnitEnvironment::default();

        let command = CommandBuilder::new(&config, "base", &params, &environment)
            .unit_command("p", &["n".into()], false);
        assert!(command.starts_with(
            "echo 10.0.0.1\tmlflow mlflow.internal >> /etc/hosts; PIPEWEAVE_DISABLE_CONFIG_HOOK=false"
        ));
    }

    #[test]
    fn test_mlflow_command() {
        let config = run_config();
        let params = Map::new();
        let environment = UnitEnvironment::default();
        let command = CommandBuilder::new(&config, "base", &params, &environment)
            .mlflow_command("exp-20240101000000");

        assert!(command.starts_with("mkdir --parents"));
        assert!(command.contains("MLFLOW_TRACKING_TOKEN={{$.inputs.parameters['mlflow_tracking_token']}}"));
        assert!(command.ends_with(
            "mlflow-start --output {{$.outputs.parameters['output'].output_file}} 'exp-20240101000000'"
        ));
    }
}
