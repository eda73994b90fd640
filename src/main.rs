mod cli;
mod client;
mod config;
mod dto;
mod error;
mod server;
mod upload;
mod whisper;

use anyhow::Result;
use clap::Parser;
use log::error;

use cli::{Cli, Commands};
use config::{ClientConfig, ServerConfig};
use whisper::config::WhisperApiConfig;

#[actix_web::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            host,
            port,
            upload_dir,
            debug_dir,
            small_file_threshold,
            max_debug_files,
            delete_failed_uploads,
        } => {
            let api = WhisperApiConfig::from_env().inspect_err(|e| error!("{e:#}"))?;
            let config = ServerConfig {
                host,
                port,
                upload_dir,
                debug_dir,
                small_file_threshold,
                max_debug_files,
                delete_failed_uploads,
            };
            server::run_server(config, api).await?;
        }
        Commands::TranscribeFile {
            audio_file,
            server_url,
            lang,
        } => {
            client::run_client(ClientConfig::new(server_url, audio_file, lang)).await?;
        }
    }

    Ok(())
}
