// src/proxy/forwarder.rs

use async_trait::async_trait;
use hyper::client::HttpConnector;
use hyper::{Body, Request, Response, Uri};

#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    #[error("invalid upstream uri for target {0}")]
    InvalidUri(String),

    #[error("upstream request failed: {0}")]
    Transport(#[from] hyper::Error),
}

/// Streams a request to a chosen target and streams the response back.
/// The seam the request path depends on; tests substitute their own.
#[async_trait]
pub trait Forwarder: Send + Sync {
    async fn forward(
        &self,
        target: &str,
        req: Request<Body>,
    ) -> Result<Response<Body>, ForwardError>;
}

/// Plain-HTTP forwarder over a shared hyper client with pooled connections.
pub struct HttpForwarder {
    client: hyper::Client<HttpConnector>,
}

impl HttpForwarder {
    pub fn new() -> Self {
        Self {
            client: hyper::Client::new(),
        }
    }
}

impl Default for HttpForwarder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Forwarder for HttpForwarder {
    async fn forward(
        &self,
        target: &str,
        mut req: Request<Body>,
    ) -> Result<Response<Body>, ForwardError> {
        let path_and_query = req
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");

        let uri: Uri = format!("http://{}{}", target, path_and_query)
            .parse()
            .map_err(|_| ForwardError::InvalidUri(target.to_string()))?;
        *req.uri_mut() = uri;

        // Let hyper set Host from the rewritten authority.
        req.headers_mut().remove(hyper::header::HOST);

        Ok(self.client.request(req).await?)
    }
}
