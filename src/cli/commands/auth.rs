use clap::Subcommand;
use serde_json::json;
use uuid::Uuid;

use crate::auth::generate_jwt;
use crate::cli::config::{load_config, save_config};
use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::config::config;
use crate::crypto::generate_key_hex;

#[derive(Subcommand)]
pub enum AuthCommands {
    #[command(about = "Mint a session token with the local JWT_SECRET and store it")]
    Token {
        #[arg(long, help = "User id the token is issued for")]
        user: Uuid,
        #[arg(long, help = "Email carried in the token")]
        email: Option<String>,
        #[arg(long, help = "Print the token without storing it")]
        print_only: bool,
    },

    #[command(about = "Use an existing session token")]
    Login {
        #[arg(help = "Session token")]
        token: String,
    },

    #[command(about = "Forget the stored session token")]
    Logout,

    #[command(about = "Generate a new ENCRYPTION_KEY value")]
    Keygen,
}

pub async fn handle(cmd: AuthCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        AuthCommands::Token { user, email, print_only } => {
            let token = generate_jwt(&config().security, user, email)?;
            if !print_only {
                let mut cli_config = load_config()?;
                cli_config.token = Some(token.clone());
                save_config(&cli_config)?;
            }
            output_success(output_format, "Issued session token", Some(json!(token)))
        }
        AuthCommands::Login { token } => {
            let mut cli_config = load_config()?;
            cli_config.token = Some(token.trim().to_string());
            save_config(&cli_config)?;
            output_success(output_format, "Stored session token", None)
        }
        AuthCommands::Logout => {
            let mut cli_config = load_config()?;
            cli_config.token = None;
            save_config(&cli_config)?;
            output_success(output_format, "Logged out", None)
        }
        AuthCommands::Keygen => output_success(output_format, "Generated encryption key", Some(json!(generate_key_hex()))),
    }
}
