use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tonic::Status;
use tracing::error;

pub type Result<T> = std::result::Result<T, ProxyError>;

/// A failed resolution.
///
/// Every resolver error surfaces as HTTP 500 with an empty body. Deployed
/// clients depend on this exact status for dead links, so `NotFound` is
/// deliberately not translated to 404.
#[derive(Debug)]
pub struct ProxyError(Status);

impl From<Status> for ProxyError {
    fn from(status: Status) -> Self {
        Self(status)
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        error!(code = ?self.0.code(), message = %self.0.message(), "short-url resolution failed");
        StatusCode::INTERNAL_SERVER_ERROR.into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tonic::Code;

    #[test]
    fn every_status_maps_to_500() {
        for status in [
            Status::new(Code::NotFound, "short link not found"),
            Status::new(Code::FailedPrecondition, "invalid short link"),
            Status::new(Code::Internal, "internal error"),
            Status::new(Code::Unauthenticated, "invalid access token"),
        ] {
            let response = ProxyError(status).into_response();
            assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        }
    }
}
