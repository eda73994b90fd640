use actix_web::{HttpResponse, ResponseError, http::StatusCode};

use crate::dto::ErrorDto;

pub type Result<T, E = RelayError> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("No file")]
    MissingFile,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read multipart upload: {0}")]
    Multipart(String),

    #[error("Whisper API error {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("Whisper API request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Failed to decode Whisper API response: {0}")]
    Decode(String),
}

impl ResponseError for RelayError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingFile => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            Self::MissingFile => HttpResponse::BadRequest().json(ErrorDto {
                error: self.to_string(),
            }),
            _ => HttpResponse::InternalServerError()
                .content_type("text/plain; charset=utf-8")
                .body(self.to_string()),
        }
    }
}
