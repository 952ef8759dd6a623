use datamover_upload_api_core::{
    AuthConfigSource, Authorization, Authorizer, RequestInfo, ReviewClient, TlsStatus,
};
use futures::future;
use hyper::{http, Request, Response};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, trace, warn};

pub type Body = http_body_util::Full<bytes::Bytes>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to encode json response: {0}")]
    Json(#[from] serde_json::Error),
}

/// Gates an inner service on the authorizer.
///
/// Denials answer with a Kubernetes `Status` carrying the deny reason;
/// internal failures answer `500` with an opaque message, logging the cause
/// rather than leaking it to the caller.
///
/// The gate learns the connection's client-certificate state from a
/// [`TlsStatus`] request extension. The deployment's TLS acceptor must insert
/// it after verifying the peer against the client CA pool; without it every
/// protected request is treated as unauthenticated and answers `403`.
pub struct AuthGate<C, W, S> {
    authorizer: Arc<Authorizer<C, W>>,
    inner: S,
}

/// Terminal handler for resource traffic that cleared the gate. The upload
/// token business logic lives outside this service.
#[derive(Clone, Copy, Debug, Default)]
pub struct NotImplemented(());

// === impl AuthGate ===

impl<C, W, S> AuthGate<C, W, S> {
    pub fn new(authorizer: Arc<Authorizer<C, W>>, inner: S) -> Self {
        Self { authorizer, inner }
    }
}

impl<C, W, S: Clone> Clone for AuthGate<C, W, S> {
    fn clone(&self) -> Self {
        Self {
            authorizer: self.authorizer.clone(),
            inner: self.inner.clone(),
        }
    }
}

impl<C, W, S, B> tower::Service<Request<B>> for AuthGate<C, W, S>
where
    C: ReviewClient + Send + Sync + 'static,
    W: AuthConfigSource + Send + Sync + 'static,
    S: tower::Service<Request<B>, Response = Response<Body>, Error = Error>
        + Clone
        + Send
        + 'static,
    S::Future: Send,
    B: Send + 'static,
{
    type Response = Response<Body>;
    type Error = Error;
    type Future = future::BoxFuture<'static, Result<Response<Body>, Error>>;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<B>) -> Self::Future {
        trace!(method = %req.method(), path = %req.uri().path(), "Authorizing request");

        let authorizer = self.authorizer.clone();
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        Box::pin(async move {
            let info = request_info(&req);
            match authorizer.authorize(&info).await {
                Authorization::Allowed => inner.call(req).await,
                Authorization::Denied(reason) => {
                    info!(%reason, path = %info.path, "Denying request");
                    status_response(http::StatusCode::FORBIDDEN, "Forbidden", &reason)
                }
                Authorization::Failed(error) => {
                    warn!(%error, path = %info.path, "Authorization failed");
                    status_response(
                        http::StatusCode::INTERNAL_SERVER_ERROR,
                        "InternalError",
                        "internal server error",
                    )
                }
            }
        })
    }
}

/// Copies the parts of the request the authorizer consumes. The TLS acceptor
/// records the connection's `TlsStatus` as a request extension; its absence
/// means the channel is not authenticated.
fn request_info<B>(req: &Request<B>) -> RequestInfo {
    RequestInfo {
        method: req.method().clone(),
        path: req.uri().path().to_string(),
        headers: req.headers().clone(),
        tls: req.extensions().get::<TlsStatus>().cloned(),
    }
}

fn status_response(
    code: http::StatusCode,
    reason: &str,
    message: &str,
) -> Result<Response<Body>, Error> {
    let status = serde_json::json!({
        "kind": "Status",
        "apiVersion": "v1",
        "status": "Failure",
        "message": message,
        "reason": reason,
        "code": code.as_u16(),
    });
    let bytes = serde_json::to_vec(&status)?;
    Ok(Response::builder()
        .status(code)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(Body::from(bytes))
        .expect("status response must be valid"))
}

// === impl NotImplemented ===

impl<B> tower::Service<Request<B>> for NotImplemented {
    type Response = Response<Body>;
    type Error = Error;
    type Future = future::Ready<Result<Response<Body>, Error>>;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, _req: Request<B>) -> Self::Future {
        future::ready(status_response(
            http::StatusCode::NOT_IMPLEMENTED,
            "NotImplemented",
            "no handler registered for this resource",
        ))
    }
}
