use std::path::Path;

use actix_cors::Cors;
use actix_multipart::{Field, Multipart, MultipartError};
use actix_web::{App, HttpResponse, HttpServer, Responder, get, middleware::Logger, post, web};
use futures_util::TryStreamExt;
use log::{debug, error, info, warn};
use serde::Deserialize;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::dto::TranscriptionDto;
use crate::error::{RelayError, Result};
use crate::upload::{Upload, UploadGuard, UploadWorkspace, peek_header, render_header};
use crate::whisper::config::WhisperApiConfig;
use crate::whisper::transcriber::{TranscribeOutput, WhisperApiClient, language_hint};

const USAGE: &str = "OK – POST /transcribe with multipart field 'file'";

pub struct AppState {
    pub config: ServerConfig,
    pub workspace: UploadWorkspace,
    pub whisper: WhisperApiClient,
}

impl AppState {
    pub fn new(config: ServerConfig, api: WhisperApiConfig) -> Self {
        Self {
            workspace: UploadWorkspace::new(&config),
            whisper: WhisperApiClient::new(api),
            config,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TranscribeQuery {
    lang: Option<String>,
}

#[get("/")]
pub async fn usage() -> impl Responder {
    HttpResponse::Ok().content_type("text/plain; charset=utf-8").body(USAGE)
}

#[get("/health")]
pub async fn health_check() -> impl Responder {
    debug!("Health check endpoint called");
    HttpResponse::Ok().json(serde_json::json!({ "ok": true }))
}

#[post("/transcribe")]
pub async fn transcribe_upload(
    data: web::Data<AppState>,
    query: web::Query<TranscribeQuery>,
    payload: Multipart,
) -> Result<HttpResponse> {
    debug!("Transcription request received");

    let result = handle_upload(&data, query.into_inner(), payload).await;
    if let Err(e) = &result {
        match e {
            RelayError::MissingFile => warn!("No file provided in transcription request"),
            other => error!("Transcription error: {other:?}"),
        }
    }
    result.map(|dto| HttpResponse::Ok().json(dto))
}

async fn handle_upload(
    data: &AppState,
    query: TranscribeQuery,
    payload: Multipart,
) -> Result<TranscriptionDto> {
    let upload = receive_upload(&data.workspace, payload)
        .await?
        .ok_or(RelayError::MissingFile)?;

    upload.log_summary(data.config.small_file_threshold);

    let debug_copy = data.workspace.save_debug_copy(&upload).await?;
    info!("debug copy  : {}", debug_copy.display());

    let header = peek_header(upload.path()).await?;
    info!("header bytes: {}", render_header(&header));
    info!("-------------------------");

    let language = language_hint(query.lang.as_deref());

    let result = data.whisper.transcribe(upload.path(), language.as_deref()).await;
    let output = match result {
        Ok(output) => output,
        Err(e) => {
            if data.config.delete_failed_uploads {
                upload.guard.remove().await;
            } else {
                let kept = upload.guard.keep();
                info!("Keeping working file {} for inspection", kept.display());
            }
            return Err(e);
        }
    };

    log_transcript(&output);
    upload.guard.remove().await;

    Ok(TranscriptionDto::new(output, debug_copy.display().to_string()))
}

/// Streams the first `file` field to a fresh working path.
///
/// Returns `None` when the form has no such field, including bodies that are
/// not multipart at all. A malformed multipart body is an error.
async fn receive_upload(workspace: &UploadWorkspace, mut payload: Multipart) -> Result<Option<Upload>> {
    loop {
        let field = match payload.try_next().await {
            Ok(Some(field)) => field,
            Ok(None) => return Ok(None),
            Err(
                e @ (MultipartError::ContentTypeMissing
                | MultipartError::ContentTypeParse
                | MultipartError::ContentTypeIncompatible),
            ) => {
                warn!("Request body is not multipart: {e}");
                return Ok(None);
            }
            Err(e) => return Err(RelayError::Multipart(e.to_string())),
        };

        if field.name() != Some("file") {
            continue;
        }

        let id = Uuid::new_v4();
        let guard = UploadGuard::new(workspace.working_path(&id));
        let original_name = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .map(str::to_string);
        let mime_type = field.content_type().map(|mime| mime.to_string());

        let size = write_field_data(field, guard.path()).await?;

        return Ok(Some(Upload {
            id,
            original_name,
            mime_type,
            size,
            guard,
        }));
    }
}

async fn write_field_data(mut field: Field, path: &Path) -> Result<u64> {
    let mut file = tokio::fs::File::create(path).await?;
    let mut size = 0u64;
    while let Some(chunk) = field
        .try_next()
        .await
        .map_err(|e| RelayError::Multipart(e.to_string()))?
    {
        file.write_all(&chunk).await?;
        size += chunk.len() as u64;
    }
    file.flush().await?;
    debug!("Wrote field data: {size} bytes to {}", path.display());
    Ok(size)
}

fn log_transcript(output: &TranscribeOutput) {
    info!("===== TRANSCRIPT =====");
    info!("{}", if output.text.is_empty() { "(empty)" } else { output.text.as_str() });
    info!("======================");

    let duration = output
        .duration
        .map_or_else(|| "unknown".to_string(), |d| format!("{d}"));
    info!(
        "Segments: {}  Duration(s): {}  Language: {}",
        output.segments.len(),
        duration,
        output.language.as_deref().unwrap_or("unknown")
    );
    for seg in &output.segments {
        info!("[{:.2}s-{:.2}s] {}", seg.start, seg.end, seg.text);
    }
    info!("==== END SEGMENTS ====");
}

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(usage)
        .service(health_check)
        .service(transcribe_upload);
}

pub async fn run_server(config: ServerConfig, api: WhisperApiConfig) -> std::io::Result<()> {
    info!("Starting transcription relay");
    info!(
        "Using configuration: upload_dir={:?}, debug_dir={:?}, small_file_threshold={}, max_debug_files={}, delete_failed_uploads={}, model={}, api={}",
        config.upload_dir,
        config.debug_dir,
        config.small_file_threshold,
        config.max_debug_files,
        config.delete_failed_uploads,
        api.model,
        api.base_url
    );

    let host = config.host.clone();
    let port = config.port;

    let state = AppState::new(config, api);
    state.workspace.prepare().await?;
    let app_state = web::Data::new(state);

    info!("Transcribe server → http://{host}:{port}");

    HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allow_any_method()
                    .allow_any_header()
                    .max_age(3600),
            )
            .wrap(Logger::default())
            .configure(routes)
    })
    .bind((host.as_str(), port))?
    .run()
    .await
}
