use clap::Subcommand;
use serde_json::json;

use crate::cli::config::{load_config, ping_server, save_config, ServerInfo};
use crate::cli::utils::output_success;
use crate::cli::OutputFormat;

#[derive(Subcommand)]
pub enum ServerCommands {
    #[command(about = "Register remote server and select it")]
    Add {
        #[arg(help = "Server URL")]
        url: String,
        #[arg(help = "Server name", default_value = "default")]
        name: String,
    },

    #[command(about = "List registered servers")]
    List,

    #[command(about = "Switch to a registered server")]
    Use {
        #[arg(help = "Server name to switch to")]
        name: String,
    },

    #[command(about = "Remove server from registry")]
    Delete {
        #[arg(help = "Server name to delete")]
        name: String,
    },

    #[command(about = "Health check a server (defaults to current server)")]
    Ping {
        #[arg(help = "Server name to ping")]
        name: Option<String>,
    },
}

pub async fn handle(cmd: ServerCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let mut config = load_config()?;

    match cmd {
        ServerCommands::Add { url, name } => {
            url::Url::parse(&url).map_err(|e| anyhow::anyhow!("Invalid server URL '{}': {}", url, e))?;
            config.servers.insert(name.clone(), ServerInfo::new(&url));
            config.current_server = Some(name.clone());
            save_config(&config)?;
            output_success(output_format, &format!("Added server '{}'", name), None)
        }
        ServerCommands::List => {
            let servers = serde_json::to_value(&config.servers)?;
            output_success(output_format, &format!("{} server(s)", config.servers.len()), Some(servers))
        }
        ServerCommands::Use { name } => {
            if !config.servers.contains_key(&name) {
                anyhow::bail!("Unknown server '{}'", name);
            }
            config.current_server = Some(name.clone());
            save_config(&config)?;
            output_success(output_format, &format!("Switched to server '{}'", name), None)
        }
        ServerCommands::Delete { name } => {
            if config.servers.remove(&name).is_none() {
                anyhow::bail!("Unknown server '{}'", name);
            }
            if config.current_server.as_deref() == Some(name.as_str()) {
                config.current_server = None;
            }
            save_config(&config)?;
            output_success(output_format, &format!("Removed server '{}'", name), None)
        }
        ServerCommands::Ping { name } => {
            let name = match name {
                Some(name) => name,
                None => config.current()?.0.to_string(),
            };
            let server = config
                .servers
                .get_mut(&name)
                .ok_or_else(|| anyhow::anyhow!("Unknown server '{}'", name))?;
            let status = ping_server(server).await;
            server.update_ping(status);
            let data = json!({ "server": name, "url": server.url, "status": status });
            save_config(&config)?;
            output_success(output_format, &format!("Server '{}' is {:?}", name, status), Some(data))
        }
    }
}
