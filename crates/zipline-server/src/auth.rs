use tonic::service::Interceptor;
use tonic::{Request, Status};

/// Bearer-token interceptor for the `ShortUrl` service.
///
/// Every request must carry `authorization: Bearer <token>` matching the
/// configured access token. The gRPC health service is registered outside
/// this interceptor, so health checks are never rejected.
#[derive(Debug, Clone)]
pub struct BearerAuth {
    access_token: String,
}

impl BearerAuth {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
        }
    }
}

impl Interceptor for BearerAuth {
    fn call(&mut self, request: Request<()>) -> Result<Request<()>, Status> {
        let header = request
            .metadata()
            .get("authorization")
            .ok_or_else(|| Status::unauthenticated("missing authorization metadata"))?;

        let header = header
            .to_str()
            .map_err(|_| Status::unauthenticated("malformed authorization metadata"))?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| Status::unauthenticated("authorization is not a bearer token"))?;

        if token != self.access_token {
            return Err(Status::unauthenticated("invalid access token"));
        }

        Ok(request)
    }
}
