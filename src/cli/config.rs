use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerInfo {
    pub url: String,
    pub added_at: DateTime<Utc>,
    pub last_ping: Option<DateTime<Utc>>,
    pub status: ServerStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerStatus {
    Up,
    Down,
    Unknown,
}

/// Everything the CLI remembers between runs
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CliConfig {
    pub servers: BTreeMap<String, ServerInfo>,
    pub current_server: Option<String>,
    /// Session token sent as `Authorization: Bearer`
    pub token: Option<String>,
}

impl ServerInfo {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.trim_end_matches('/').to_string(),
            added_at: Utc::now(),
            last_ping: None,
            status: ServerStatus::Unknown,
        }
    }

    pub fn update_ping(&mut self, status: ServerStatus) {
        self.last_ping = Some(Utc::now());
        self.status = status;
    }
}

impl CliConfig {
    /// Server actions are sent to
    pub fn current(&self) -> anyhow::Result<(&str, &ServerInfo)> {
        let name = self
            .current_server
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("No server selected, run `formbricks server add <url>` first"))?;
        let info = self
            .servers
            .get(name)
            .ok_or_else(|| anyhow::anyhow!("Selected server '{}' is no longer registered", name))?;
        Ok((name, info))
    }
}

pub fn get_config_dir() -> anyhow::Result<PathBuf> {
    let config_dir = if let Ok(custom_dir) = std::env::var("FORMBRICKS_CLI_CONFIG_DIR") {
        PathBuf::from(custom_dir)
    } else {
        let home = std::env::var("HOME").map_err(|_| anyhow::anyhow!("HOME environment variable not set"))?;
        PathBuf::from(home).join(".config").join("formbricks").join("cli")
    };

    if !config_dir.exists() {
        fs::create_dir_all(&config_dir)?;
    }

    Ok(config_dir)
}

pub fn load_config() -> anyhow::Result<CliConfig> {
    let file = get_config_dir()?.join("cli.json");
    if !file.exists() {
        return Ok(CliConfig::default());
    }

    let content = fs::read_to_string(file)?;
    Ok(serde_json::from_str(&content)?)
}

pub fn save_config(config: &CliConfig) -> anyhow::Result<()> {
    let file = get_config_dir()?.join("cli.json");
    fs::write(file, serde_json::to_string_pretty(config)?)?;
    Ok(())
}

pub async fn ping_server(server: &ServerInfo) -> ServerStatus {
    let client = reqwest::Client::new();
    let url = format!("{}/health", server.url);

    match client.get(&url).timeout(std::time::Duration::from_secs(5)).send().await {
        Ok(response) if response.status().is_success() => ServerStatus::Up,
        _ => ServerStatus::Down,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_requires_a_registered_selection() {
        let mut config = CliConfig::default();
        assert!(config.current().is_err());

        config.current_server = Some("local".into());
        assert!(config.current().is_err());

        config.servers.insert("local".into(), ServerInfo::new("http://localhost:3000/"));
        let (name, info) = config.current().unwrap();
        assert_eq!(name, "local");
        assert_eq!(info.url, "http://localhost:3000");
    }
}
