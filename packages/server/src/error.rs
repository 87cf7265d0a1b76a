//! API error type and its HTTP mapping.

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use road_watch_database::DbError;
use road_watch_server_models::{ApiErrorBody, ApiErrorDetail};
use thiserror::Error;

/// Errors surfaced to API clients.
///
/// The three variants map to the three things a client can do about a
/// failure: fix the input (400), give up on the incident (404), or retry
/// (500).
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed or missing input, rejected before touching the store.
    #[error("{0}")]
    Validation(String),

    /// The referenced incident does not exist.
    #[error("incident {0} not found")]
    NotFound(i64),

    /// Store or other server-side failure. The detail is logged, not
    /// returned.
    #[error("internal error")]
    Internal(String),
}

impl ApiError {
    const fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::NotFound(_) => "not_found",
            Self::Internal(_) => "internal_error",
        }
    }
}

impl From<DbError> for ApiError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::NotFound { incident_id } => Self::NotFound(incident_id),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if let Self::Internal(detail) = self {
            log::error!("Request failed: {detail}");
        }

        HttpResponse::build(self.status_code()).json(ApiErrorBody {
            error: ApiErrorDetail {
                code: self.code().to_string(),
                message: self.to_string(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_map_to_status() {
        let not_found = ApiError::from(DbError::NotFound { incident_id: 3 });
        assert_eq!(not_found.status_code(), StatusCode::NOT_FOUND);

        let internal = ApiError::from(DbError::Conversion {
            message: "bad row".to_string(),
        });
        assert_eq!(internal.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(internal.to_string(), "internal error");
    }
}
