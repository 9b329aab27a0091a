//! Init command handlers
//!
//! Generates the starter plugin configuration and points at the UI.

use anyhow::{Context, Result};
use colored::*;
use pipeweave_core::config::PluginConfig;
use std::fs;
use std::path::Path;

use crate::config::{Config, default_config_path, project_name};

/// CI workflow written by `init --with-github-actions`
pub const GITHUB_WORKFLOW_PATH: &str = ".github/workflows/on-push.yml";

const GITHUB_WORKFLOW_TEMPLATE: &str = r#"name: Build and run {project_name}

on:
  push:
    branches:
      - main

env:
  GOOGLE_PROJECT_ID: ${{ secrets.GOOGLE_PROJECT_ID }}
  IMAGE: gcr.io/${{ secrets.GOOGLE_PROJECT_ID }}/{project_name}:${{ github.sha }}

jobs:
  deploy:
    runs-on: ubuntu-latest
    steps:
      - uses: actions/checkout@v4

      - uses: google-github-actions/auth@v2
        with:
          credentials_json: ${{ secrets.GOOGLE_APPLICATION_CREDENTIALS }}

      - uses: google-github-actions/setup-gcloud@v2

      - name: Build and push image
        run: |
          gcloud auth configure-docker --quiet
          docker build -t "$IMAGE" .
          docker push "$IMAGE"

      - name: Run pipeline
        env:
          PIPEWEAVE_ORCHESTRATOR_URL: ${{ secrets.PIPEWEAVE_ORCHESTRATOR_URL }}
        run: pipeweave run-once --image "$IMAGE"
"#;

/// Write `conf/base/pipeweave.yaml`, and the CI workflow when asked
pub fn init(project_id: &str, region: &str, with_github_actions: bool) -> Result<()> {
    let project = project_name();
    let (image, run_name) = if with_github_actions {
        (
            format!("gcr.io/${{google_project_id}}/{}:${{commit_id}}", project),
            format!("{}:${{commit_id}}", project),
        )
    } else {
        (project.clone(), project.clone())
    };

    let sample = PluginConfig::sample_config(project_id, region, &image, &project, &run_name);
    let config_path = default_config_path("base");
    write_config(&config_path, &sample)?;

    println!("{}", "✓ Configuration generated!".green().bold());
    println!("  {} {}", "Created".green(), config_path.display().to_string().cyan());

    if with_github_actions {
        let workflow_path = Path::new(GITHUB_WORKFLOW_PATH);
        write_config(workflow_path, &github_workflow(&project))?;
        println!("  {} {}", "Created".green(), workflow_path.display().to_string().cyan());
    }
    println!();
    println!("{}", "Next steps:".bold());
    println!("  1. Adjust image, resources and grouping in the file above");
    println!("  2. Export the pipeline manifest of your project");
    println!("  3. Use {} to compile the pipeline", "pipeweave compile".cyan());

    Ok(())
}

/// CI workflow building the project image and running the pipeline on push
pub fn github_workflow(project_name: &str) -> String {
    GITHUB_WORKFLOW_TEMPLATE.replace("{project_name}", project_name)
}

fn write_config(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {:?}", parent))?;
    }
    fs::write(path, content).with_context(|| format!("Failed to write configuration to {:?}", path))
}

/// Orchestrator console address for a project
pub fn ui_url(project_id: &str) -> String {
    format!(
        "https://console.cloud.google.com/vertex-ai/pipelines?project={}",
        project_id
    )
}

/// Print the console address of the configured project
pub fn ui(config: &Config) -> Result<()> {
    let plugin_config = config.plugin_config()?;
    println!("{}", "Pipelines UI:".bold());
    println!("  {}", ui_url(&plugin_config.project_id).cyan());
    Ok(())
}
