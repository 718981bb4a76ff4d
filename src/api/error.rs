use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};

use super::models::ErrorResponse;
use crate::blockchain::LedgerError;

impl ResponseError for LedgerError {
    fn status_code(&self) -> StatusCode {
        match self {
            LedgerError::Pow(e) if e.is_exhaustion() => StatusCode::SERVICE_UNAVAILABLE,
            LedgerError::Pow(_) => StatusCode::INTERNAL_SERVER_ERROR,
            LedgerError::Discontinuous { .. } | LedgerError::InvalidSeal { .. } => {
                StatusCode::BAD_REQUEST
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorResponse {
            error: self.to_string(),
        })
    }
}
