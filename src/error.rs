use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use serde_json::json;
use thiserror::Error;

/// Failures surfaced by the recognition core. A matcher that finds no
/// candidates is not one of these; it is an ordinary empty result.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no audio file provided")]
    InputMissing,

    #[error("unsupported audio format: .{0}")]
    UnsupportedFormat(String),

    #[error("failed to decode audio: {0}")]
    Decode(String),

    #[error("signal processing failed: {0}")]
    Dsp(String),

    #[error("fingerprint store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("file not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl actix_web::ResponseError for EngineError {
    fn status_code(&self) -> StatusCode {
        match self {
            EngineError::InputMissing | EngineError::UnsupportedFormat(_) => {
                StatusCode::BAD_REQUEST
            }
            EngineError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .json(json!({ "success": false, "detail": self.to_string() }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::ResponseError;

    #[test]
    fn test_status_mapping() {
        assert_eq!(EngineError::InputMissing.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            EngineError::UnsupportedFormat("ogg".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            EngineError::NotFound("x.wav".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            EngineError::Dsp("empty input".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
