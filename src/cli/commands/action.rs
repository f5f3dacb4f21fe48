use anyhow::Context;
use clap::Subcommand;
use serde_json::Value;
use std::path::PathBuf;

use crate::cli::config::load_config;
use crate::cli::utils::{output_error, output_success};
use crate::cli::OutputFormat;

#[derive(Subcommand)]
pub enum ActionCommands {
    #[command(about = "List actions the server offers")]
    List,

    #[command(about = "Run an action")]
    Run {
        #[arg(help = "Action name, e.g. importContacts")]
        name: String,
        #[arg(long, help = "Input as inline JSON", conflicts_with = "file")]
        data: Option<String>,
        #[arg(long, help = "Read input JSON from a file")]
        file: Option<PathBuf>,
    },
}

fn read_input(data: Option<String>, file: Option<PathBuf>) -> anyhow::Result<Value> {
    let raw = match (data, file) {
        (Some(data), _) => data,
        (None, Some(path)) => {
            std::fs::read_to_string(&path).with_context(|| format!("failed to read {}", path.display()))?
        }
        (None, None) => "{}".to_string(),
    };
    serde_json::from_str(&raw).context("action input is not valid JSON")
}

pub async fn handle(cmd: ActionCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let config = load_config()?;
    let (_, server) = config.current()?;
    let token = config
        .token
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("No session token, run `formbricks auth token` or `formbricks auth login`"))?;
    let client = reqwest::Client::new();

    let request = match cmd {
        ActionCommands::List => client.get(format!("{}/api/actions", server.url)),
        ActionCommands::Run { name, data, file } => {
            let input = read_input(data, file)?;
            client.post(format!("{}/api/actions/{}", server.url, name)).json(&input)
        }
    };

    let response = request.bearer_auth(token).send().await.context("request failed")?;
    let status = response.status();
    let body: Value = response.json().await.context("server returned a non-JSON body")?;

    if status.is_success() {
        output_success(output_format, &format!("{}", status), body.get("data").cloned())
    } else {
        let message = body["message"].as_str().unwrap_or("request failed");
        output_error(output_format, message, body["code"].as_str())?;
        if let Some(fields) = body.get("field_errors") {
            eprintln!("{}", serde_json::to_string_pretty(fields)?);
        }
        anyhow::bail!("action failed with {}", status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_defaults_to_empty_object() {
        assert_eq!(read_input(None, None).unwrap(), serde_json::json!({}));
        assert!(read_input(Some("{nope".into()), None).is_err());
    }
}
