use std::path::Path;

use log::{error, info};
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use secrecy::ExposeSecret;
use serde::Deserialize;

use crate::error::{RelayError, Result};
use crate::whisper::config::WhisperApiConfig;

/// Whisper sniffs the container from the filename, so every upload goes out as `.m4a`.
pub const UPLOAD_FILENAME: &str = "upload.m4a";
const RESPONSE_FORMAT: &str = "verbose_json";
const TEMPERATURE: &str = "0";

#[derive(Debug, Clone, PartialEq)]
pub struct TranscribeOutput {
    pub text: String,
    pub duration: Option<f64>,
    pub language: Option<String>,
    pub segments: Vec<Segment>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

#[derive(Deserialize)]
struct VerboseResponse {
    text: Option<String>,
    duration: Option<f64>,
    language: Option<String>,
    segments: Option<Vec<VerboseSegment>>,
}

#[derive(Deserialize)]
struct VerboseSegment {
    start: Option<f64>,
    end: Option<f64>,
    text: Option<String>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

impl From<VerboseResponse> for TranscribeOutput {
    fn from(raw: VerboseResponse) -> Self {
        Self {
            text: raw.text.unwrap_or_default(),
            duration: raw.duration,
            language: raw.language,
            segments: raw
                .segments
                .unwrap_or_default()
                .into_iter()
                .map(|seg| Segment {
                    start: seg.start.unwrap_or(0.0),
                    end: seg.end.unwrap_or(0.0),
                    text: seg.text.unwrap_or_default(),
                })
                .collect(),
        }
    }
}

/// Trims a `lang` hint; blank hints mean "let the API detect the language".
pub fn language_hint(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|lang| !lang.is_empty())
        .map(str::to_string)
}

#[derive(Clone)]
pub struct WhisperApiClient {
    client: Client,
    config: WhisperApiConfig,
}

impl WhisperApiClient {
    pub fn new(config: WhisperApiConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    /// Sends the file at `path` to the transcriptions endpoint with greedy decoding.
    pub async fn transcribe(&self, path: &Path, language: Option<&str>) -> Result<TranscribeOutput> {
        let audio = tokio::fs::File::open(path).await?;
        let audio_len = audio.metadata().await?.len();

        info!(">>> Sending to Whisper API");
        info!(
            "    file={} ({} bytes), model={}, response_format={}, temperature={}, language={}",
            path.display(),
            audio_len,
            self.config.model,
            RESPONSE_FORMAT,
            TEMPERATURE,
            language.unwrap_or("(auto)")
        );

        let mut form = Form::new()
            .part(
                "file",
                Part::stream_with_length(audio, audio_len).file_name(UPLOAD_FILENAME),
            )
            .text("model", self.config.model.clone())
            .text("response_format", RESPONSE_FORMAT)
            .text("temperature", TEMPERATURE);

        if let Some(language) = language {
            form = form.text("language", language.to_string());
        }

        let response = self
            .client
            .post(self.config.transcriptions_url())
            .bearer_auth(self.config.api_key.expose_secret())
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ApiErrorBody>(&body)
                .map(|parsed| parsed.error.message)
                .unwrap_or(body);
            error!("Whisper API error ({status}): {message}");
            return Err(RelayError::Upstream {
                status: status.as_u16(),
                message,
            });
        }

        let (pretty, output) = decode_verbose(&body)?;
        info!("<<< Whisper API raw response:\n{pretty}");

        Ok(output)
    }
}

/// Parses a `verbose_json` body, returning it pretty-printed alongside the normalized output.
fn decode_verbose(body: &str) -> Result<(String, TranscribeOutput)> {
    let raw: serde_json::Value =
        serde_json::from_str(body).map_err(|e| RelayError::Decode(e.to_string()))?;
    let pretty = serde_json::to_string_pretty(&raw).unwrap_or_else(|_| body.to_string());

    let parsed: VerboseResponse =
        serde_json::from_value(raw).map_err(|e| RelayError::Decode(e.to_string()))?;

    Ok((pretty, parsed.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    use secrecy::SecretString;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(base_url: &str) -> WhisperApiClient {
        WhisperApiClient::new(WhisperApiConfig::new(
            SecretString::from("sk-test".to_string()),
            Some(base_url.to_string()),
        ))
    }

    fn write_audio(dir: &tempfile::TempDir) -> std::path::PathBuf {
        let path = dir.path().join("upload.m4a");
        let mut bytes = b"\0\0\0\x20ftypM4A ".to_vec();
        bytes.resize(2048, 7);
        std::fs::write(&path, bytes).unwrap();
        path
    }

    async fn sent_body(server: &MockServer) -> String {
        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        String::from_utf8_lossy(&requests[0].body).into_owned()
    }

    #[test]
    fn language_hint_ignores_blank_values() {
        assert_eq!(language_hint(None), None);
        assert_eq!(language_hint(Some("   ")), None);
        assert_eq!(language_hint(Some(" en ")), Some("en".to_string()));
    }

    #[tokio::test]
    async fn sends_verbose_greedy_request_with_language() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/audio/transcriptions"))
            .and(header("authorization", "Bearer sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "text": "hello world",
                "language": "english",
                "duration": 2.5,
                "segments": [
                    {"id": 0, "start": 0.0, "end": 1.2, "text": " hello"},
                    {"id": 1, "start": 1.2, "end": 2.5, "text": " world"}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let audio = write_audio(&dir);
        let output = test_client(&server.uri())
            .transcribe(&audio, Some("en"))
            .await
            .unwrap();

        assert_eq!(output.text, "hello world");
        assert_eq!(output.duration, Some(2.5));
        assert_eq!(output.segments.len(), 2);
        assert_eq!(output.segments[1].start, 1.2);
        assert_eq!(output.segments[1].text, " world");

        let body = sent_body(&server).await;
        assert!(body.contains("filename=\"upload.m4a\""));
        assert!(body.contains("ftypM4A"));
        assert!(body.contains("name=\"model\"\r\n\r\nwhisper-1"));
        assert!(body.contains("name=\"response_format\"\r\n\r\nverbose_json"));
        assert!(body.contains("name=\"temperature\"\r\n\r\n0"));
        assert!(body.contains("name=\"language\"\r\n\r\nen"));
    }

    #[test]
    fn raw_response_keeps_provider_fields() {
        let body = r#"{"text":"hi","segments":[{"start":0.0,"end":0.8,"text":"hi","avg_logprob":-0.25,"no_speech_prob":0.01}]}"#;
        let (pretty, output) = decode_verbose(body).unwrap();

        assert!(pretty.contains("\"avg_logprob\": -0.25"));
        assert!(pretty.contains("\"no_speech_prob\""));
        assert_eq!(output.text, "hi");
        assert_eq!(output.segments.len(), 1);
    }

    #[test]
    fn malformed_response_is_decode_error() {
        assert!(matches!(decode_verbose("not json"), Err(RelayError::Decode(_))));
    }

    #[tokio::test]
    async fn omits_language_field_without_hint() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/audio/transcriptions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"text": "hi"})))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let audio = write_audio(&dir);
        test_client(&server.uri()).transcribe(&audio, None).await.unwrap();

        let body = sent_body(&server).await;
        assert!(!body.contains("name=\"language\""));
    }

    #[tokio::test]
    async fn missing_fields_fall_back_to_defaults() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "segments": [{"text": " partial"}]
            })))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let audio = write_audio(&dir);
        let output = test_client(&server.uri()).transcribe(&audio, None).await.unwrap();

        assert_eq!(output.text, "");
        assert_eq!(output.duration, None);
        assert_eq!(
            output.segments,
            vec![Segment {
                start: 0.0,
                end: 0.0,
                text: " partial".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn api_error_message_is_surfaced() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "error": {"message": "Incorrect API key provided", "type": "invalid_request_error"}
            })))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let audio = write_audio(&dir);
        let err = test_client(&server.uri()).transcribe(&audio, None).await.unwrap_err();

        assert!(matches!(err, RelayError::Upstream { status: 401, ref message } if message == "Incorrect API key provided"));
    }

    #[tokio::test]
    async fn non_json_error_body_is_kept_verbatim() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let audio = write_audio(&dir);
        let err = test_client(&server.uri()).transcribe(&audio, None).await.unwrap_err();

        assert_eq!(err.to_string(), "Whisper API error 502: bad gateway");
    }

    #[tokio::test]
    async fn missing_file_is_io_error() {
        let err = test_client("http://127.0.0.1:9")
            .transcribe(Path::new("/nonexistent/upload.m4a"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::Io(_)));
    }
}
