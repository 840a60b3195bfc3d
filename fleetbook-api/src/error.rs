use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use fleetbook_core::{BookingError, ErrorKind};
use serde_json::json;

#[derive(Debug)]
pub enum AppError {
    AuthenticationError(String),
    BadRequest(String),
    Booking(BookingError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::AuthenticationError(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Booking(err) => {
                let kind = err.kind();
                if kind == ErrorKind::Internal {
                    tracing::error!("Internal Server Error: {}", err);
                }
                let status = StatusCode::from_u16(kind.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                (status, err.public_message())
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<BookingError> for AppError {
    fn from(err: BookingError) -> Self {
        Self::Booking(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetbook_core::BookingStatus;

    #[test]
    fn test_status_codes_follow_error_kind() {
        let cases = [
            (BookingError::InvalidRequest(vec!["vehicle_id is required".into()]), StatusCode::BAD_REQUEST),
            (BookingError::InvalidOtp, StatusCode::BAD_REQUEST),
            (BookingError::BookingNotFound, StatusCode::NOT_FOUND),
            (BookingError::BookingConflict, StatusCode::CONFLICT),
            (BookingError::CancellationNotAllowed, StatusCode::FORBIDDEN),
            (
                BookingError::InvalidTransition {
                    from: BookingStatus::Returned,
                    to: BookingStatus::Cancelled,
                },
                StatusCode::FORBIDDEN,
            ),
            (BookingError::internal("pool timed out"), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, expected) in cases {
            assert_eq!(AppError::from(err).into_response().status(), expected);
        }
    }

    #[test]
    fn test_missing_token_is_unauthorized() {
        let response = AppError::AuthenticationError("Missing bearer token".into()).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_malformed_input_is_bad_request() {
        let response = AppError::BadRequest("expected value at line 1 column 1".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
