use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "transcribe-relay",
    about = "Transcribe Relay - forwards audio uploads to the Whisper API",
    long_about = "An HTTP relay that accepts multipart audio uploads, keeps a debug copy of each one and returns the Whisper API transcription, with a small client for sending files to it.",
    after_help = "EXAMPLES:\n    # Start the relay on 0.0.0.0:3001\n    transcribe-relay serve\n\n    # Keep only the 200 most recent debug copies\n    transcribe-relay serve --max-debug-files 200\n\n    # Send a recording to a running relay\n    transcribe-relay file recording.m4a\n\n    # Force the recognized language\n    transcribe-relay file recording.m4a --lang en --server-url http://my-server:3001"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(name = "serve")]
    Serve {
        #[arg(long, default_value = "0.0.0.0")]
        host: String,

        #[arg(long, default_value = "3001")]
        port: u16,

        #[arg(long, default_value = "uploads")]
        upload_dir: PathBuf,

        #[arg(long, default_value = "debug")]
        debug_dir: PathBuf,

        /// Uploads smaller than this many bytes log a warning
        #[arg(long, default_value = "12000")]
        small_file_threshold: u64,

        /// Oldest debug copies beyond this count are pruned (0 keeps everything)
        #[arg(long, default_value = "0")]
        max_debug_files: usize,

        /// Remove the working file when the Whisper call fails instead of keeping it for inspection
        #[arg(long)]
        delete_failed_uploads: bool,
    },
    #[command(name = "file")]
    TranscribeFile {
        audio_file: PathBuf,

        #[arg(long, default_value = "http://localhost:3001")]
        server_url: String,

        #[arg(long, value_parser = validate_lang)]
        lang: Option<String>,
    },
}

pub fn validate_lang(s: &str) -> Result<String, String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Err("Language code must not be blank".to_string());
    }
    if !trimmed.chars().all(|c| c.is_ascii_alphabetic() || c == '-') {
        return Err("Language code must be letters, e.g. 'en' or 'pt-BR'".to_string());
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serve_defaults_match_fixed_address() {
        let cli = Cli::parse_from(["transcribe-relay", "serve"]);
        match cli.command {
            Commands::Serve {
                host,
                port,
                small_file_threshold,
                max_debug_files,
                delete_failed_uploads,
                ..
            } => {
                assert_eq!(host, "0.0.0.0");
                assert_eq!(port, 3001);
                assert_eq!(small_file_threshold, 12000);
                assert_eq!(max_debug_files, 0);
                assert!(!delete_failed_uploads);
            }
            _ => panic!("expected serve"),
        }
    }

    #[test]
    fn file_mode_trims_lang() {
        let cli = Cli::parse_from(["transcribe-relay", "file", "a.m4a", "--lang", " en "]);
        match cli.command {
            Commands::TranscribeFile { lang, .. } => assert_eq!(lang.as_deref(), Some("en")),
            _ => panic!("expected file"),
        }
    }

    #[test]
    fn rejects_blank_lang() {
        assert!(validate_lang("   ").is_err());
        assert!(validate_lang("e n").is_err());
        assert_eq!(validate_lang("pt-BR").unwrap(), "pt-BR");
    }
}
