use tonic::metadata::errors::InvalidMetadataValue;
use tonic::metadata::{Ascii, MetadataValue};
use tonic::service::interceptor::InterceptedService;
use tonic::service::Interceptor;
use tonic::transport::{Channel, Endpoint};
use tonic::{Request, Status};
use zipline_proto_schema::v1::short_url_client::ShortUrlClient;

/// Client interceptor that attaches the configured bearer token to every
/// outgoing request.
#[derive(Debug, Clone)]
pub struct ClientBearerAuth {
    header: MetadataValue<Ascii>,
}

impl ClientBearerAuth {
    pub fn new(access_token: &str) -> Result<Self, InvalidMetadataValue> {
        let header = MetadataValue::try_from(format!("Bearer {access_token}"))?;
        Ok(Self { header })
    }
}

impl Interceptor for ClientBearerAuth {
    fn call(&mut self, mut request: Request<()>) -> Result<Request<()>, Status> {
        request
            .metadata_mut()
            .insert("authorization", self.header.clone());
        Ok(request)
    }
}

pub type ShortUrlChannel = ShortUrlClient<InterceptedService<Channel, ClientBearerAuth>>;

/// Shared application state: the authenticated gRPC client for the
/// short-url service.
#[derive(Debug, Clone)]
pub struct AppState {
    client: ShortUrlChannel,
}

impl AppState {
    /// Builds the state with a lazily connecting channel; the TCP connection
    /// is established on the first request.
    pub fn new(endpoint: String, access_token: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let channel = Endpoint::from_shared(endpoint)?.connect_lazy();
        let auth = ClientBearerAuth::new(access_token)?;
        let client = ShortUrlClient::with_interceptor(channel, auth);
        Ok(Self { client })
    }

    /// Returns a client handle for one request. tonic clients are cheap to
    /// clone; each handler call takes its own.
    pub fn client(&self) -> ShortUrlChannel {
        self.client.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interceptor_attaches_bearer_header() {
        let mut auth = ClientBearerAuth::new("secret").unwrap();
        let request = auth.call(Request::new(())).unwrap();

        let header = request.metadata().get("authorization").unwrap();
        assert_eq!(header.to_str().unwrap(), "Bearer secret");
    }

    #[tokio::test]
    async fn state_builds_without_a_live_server() {
        assert!(AppState::new("http://127.0.0.1:1".to_string(), "secret").is_ok());
    }

    #[test]
    fn invalid_endpoint_is_rejected() {
        assert!(AppState::new("not a uri".to_string(), "secret").is_err());
    }
}
