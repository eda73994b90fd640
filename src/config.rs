use std::path::PathBuf;

/// Sizes below this are usually a silent mic or a permissions problem on the recording side.
pub const DEFAULT_SMALL_FILE_THRESHOLD: u64 = 12_000;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub upload_dir: PathBuf,
    pub debug_dir: PathBuf,
    pub small_file_threshold: u64,
    /// 0 keeps every debug copy.
    pub max_debug_files: usize,
    /// Failed uploads stay in the working directory for inspection unless this is set.
    pub delete_failed_uploads: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            upload_dir: PathBuf::from("uploads"),
            debug_dir: PathBuf::from("debug"),
            small_file_threshold: DEFAULT_SMALL_FILE_THRESHOLD,
            max_debug_files: 0,
            delete_failed_uploads: false,
        }
    }
}

#[derive(Debug)]
pub struct ClientConfig {
    pub server_url: String,
    pub audio_file: PathBuf,
    pub lang: Option<String>,
}

impl ClientConfig {
    pub fn new(server_url: String, audio_file: PathBuf, lang: Option<String>) -> Self {
        Self {
            server_url: server_url.trim_end_matches('/').to_string(),
            audio_file,
            lang,
        }
    }

    pub fn transcribe_url(&self) -> String {
        match &self.lang {
            Some(lang) => format!("{}/transcribe?lang={}", self.server_url, lang),
            None => format!("{}/transcribe", self.server_url),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transcribe_url_carries_lang() {
        let config = ClientConfig::new(
            "http://localhost:3001/".to_string(),
            PathBuf::from("a.m4a"),
            Some("en".to_string()),
        );
        assert_eq!(config.transcribe_url(), "http://localhost:3001/transcribe?lang=en");

        let config = ClientConfig::new("http://localhost:3001".to_string(), PathBuf::from("a.m4a"), None);
        assert_eq!(config.transcribe_url(), "http://localhost:3001/transcribe");
    }

    #[test]
    fn failed_uploads_are_kept_by_default() {
        assert!(!ServerConfig::default().delete_failed_uploads);
    }
}
