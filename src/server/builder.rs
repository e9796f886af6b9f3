// src/server/builder.rs

use crate::server::handler::RequestHandler;
use crate::server::listener::bind_tcp;
use anyhow::Result;
use hyper::server::conn::Http;
use std::net::SocketAddr;

/// Accept loop over the bound listener; one task per connection.
pub struct ServerBuilder {
    addr: SocketAddr,
    handler: RequestHandler,
}

impl ServerBuilder {
    pub fn new(addr: SocketAddr, handler: RequestHandler) -> Self {
        Self { addr, handler }
    }

    pub async fn serve(self) -> Result<()> {
        let listener = bind_tcp(self.addr).await?;
        tracing::info!("HTTP server listening on {}", self.addr);

        loop {
            let (stream, peer) = listener.accept().await?;
            let svc = self.handler.clone();

            tokio::spawn(async move {
                if let Err(err) = Http::new().serve_connection(stream, svc).await {
                    tracing::warn!(%peer, %err, "connection error");
                }
            });
        }
    }
}
