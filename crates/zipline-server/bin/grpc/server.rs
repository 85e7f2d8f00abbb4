use std::sync::Arc;
use tonic::{Request, Response, Status};
use zipline_core::{KvCache, UrlMapStore};
use zipline_proto_schema::v1 as proto;
use zipline_proto_schema::v1::short_url_server::ShortUrl;
use zipline_server::ShortUrlService;

/// tonic adapter over [`ShortUrlService`].
pub struct ShortUrlGrpcServer<S, C, K> {
    service: Arc<ShortUrlService<S, C, K>>,
}

impl<S, C, K> ShortUrlGrpcServer<S, C, K> {
    pub fn new(service: Arc<ShortUrlService<S, C, K>>) -> Self {
        Self { service }
    }
}

#[tonic::async_trait]
impl<S, C, K> ShortUrl for ShortUrlGrpcServer<S, C, K>
where
    S: UrlMapStore,
    C: KvCache,
    K: KvCache,
{
    async fn get_short_url(
        &self,
        request: Request<proto::Url>,
    ) -> Result<Response<proto::Url>, Status> {
        let req = request.into_inner();
        let short_url = self
            .service
            .shorten(&req.url, req.user_id, req.is_public)
            .await
            .map_err(Status::from)?;

        Ok(Response::new(proto::Url {
            url: short_url,
            user_id: req.user_id,
            is_public: req.is_public,
        }))
    }

    async fn get_original_url(
        &self,
        request: Request<proto::ShortKey>,
    ) -> Result<Response<proto::Url>, Status> {
        let req = request.into_inner();
        let original_url = self
            .service
            .resolve(&req.key, req.user_id, req.is_public)
            .await
            .map_err(Status::from)?;

        Ok(Response::new(proto::Url {
            url: original_url,
            user_id: req.user_id,
            is_public: req.is_public,
        }))
    }
}
