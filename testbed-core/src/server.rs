// HTTP server hosting an application's routes

use crate::logging::{debug, info, warn};
use crate::{Error, HttpRequest, HttpResponse, Result, Router};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming as IncomingBody;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};

/// A running accept loop. Dropping it without [`Server::shutdown`] leaves
/// the loop running until the runtime exits.
pub struct Server {
    local_addr: SocketAddr,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl Server {
    /// Bind `host:port` (port 0 picks an ephemeral port) and start serving.
    pub async fn start(host: &str, port: u16, router: Arc<Router>) -> Result<Self> {
        let listener = TcpListener::bind((host, port))
            .await
            .map_err(|e| Error::Server(format!("failed to bind {}:{}: {}", host, port, e)))?;
        let local_addr = listener.local_addr()?;
        let (shutdown, shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(accept_loop(listener, router, shutdown_rx));
        info!(address = %local_addr, "Server listening");

        Ok(Self {
            local_addr,
            shutdown,
            task,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting, close open connections and wait for the loop to exit.
    pub async fn shutdown(self) -> Result<()> {
        let _ = self.shutdown.send(true);
        self.task
            .await
            .map_err(|e| Error::Server(format!("server task failed: {}", e)))?;
        info!(address = %self.local_addr, "Server stopped");
        Ok(())
    }
}

async fn accept_loop(
    listener: TcpListener,
    router: Arc<Router>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, remote)) => {
                    debug!(remote = %remote, "Accepted connection");
                    let router = router.clone();
                    connections.spawn(serve_connection(stream, router));
                }
                Err(err) => warn!(error = %err, "Failed to accept connection"),
            },
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
        }
    }

    connections.shutdown().await;
}

async fn serve_connection(stream: tokio::net::TcpStream, router: Arc<Router>) {
    let io = TokioIo::new(stream);
    let service = service_fn(move |req: Request<IncomingBody>| {
        let router = router.clone();
        async move { Ok::<_, Infallible>(handle_request(req, router).await) }
    });

    if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
        debug!(error = %err, "Error serving connection");
    }
}

/// Handle an incoming HTTP request
async fn handle_request(req: Request<IncomingBody>, router: Arc<Router>) -> Response<Full<Bytes>> {
    let (parts, body) = req.into_parts();
    let path = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| parts.uri.path().to_string());

    let mut request = HttpRequest::new(parts.method, path);
    request.headers = parts.headers;

    let response = match body.collect().await {
        Ok(collected) => {
            request.body = collected.to_bytes();
            match router.dispatch(request).await {
                Ok(resp) => resp,
                Err(err) => error_response(&err),
            }
        }
        Err(err) => error_response(&Error::BadRequest(err.to_string())),
    };

    let mut hyper_response = Response::new(Full::new(response.body));
    *hyper_response.status_mut() = http::StatusCode::from_u16(response.status)
        .unwrap_or(http::StatusCode::INTERNAL_SERVER_ERROR);
    *hyper_response.headers_mut() = response.headers;
    hyper_response
}

fn error_response(err: &Error) -> HttpResponse {
    let status = err.status_code();
    let body = serde_json::json!({
        "error": err.to_string(),
        "status": status,
    });
    HttpResponse::new(status)
        .with_json(&body)
        .unwrap_or_else(|_| HttpResponse::internal_server_error())
}
