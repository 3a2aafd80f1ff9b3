use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use axum::{
    Json,
    http::{HeaderMap, Request},
    response::{IntoResponse, Response},
};
use pin_project_lite::pin_project;
use tower::{Layer, Service};

use crate::gate::{
    AuthorizationGate, Denial, Outcome, RequestContext, RequestView, X_IDENTITY_STATUS, X_ROLES,
    X_TENANT_ID,
};

impl IntoResponse for Denial {
    fn into_response(self) -> Response {
        (self.status(), Json(self.body)).into_response()
    }
}

/// Tower layer running the [`AuthorizationGate`] in front of a service.
///
/// When the gate applies, a [`RequestContext`] is inserted into the request
/// extensions before the inner service is called. Denials carry the same
/// context in the response extensions so outer layers can still read it.
///
/// ```ignore
/// Router::new()
///     .route("/v2.0/log/single", post(send_log))
///     .layer(RoleLayer::new(gate));
/// ```
#[derive(Clone)]
pub struct RoleLayer {
    gate: Arc<AuthorizationGate>,
}

impl RoleLayer {
    pub fn new(gate: impl Into<Arc<AuthorizationGate>>) -> Self {
        Self { gate: gate.into() }
    }
}

impl<S> Layer<S> for RoleLayer {
    type Service = RoleService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RoleService {
            inner,
            gate: self.gate.clone(),
        }
    }
}

#[derive(Clone)]
pub struct RoleService<S> {
    inner: S,
    gate: Arc<AuthorizationGate>,
}

impl<S, B> Service<Request<B>> for RoleService<S>
where
    S: Service<Request<B>, Response = Response>,
{
    type Response = Response;
    type Error = S::Error;
    type Future = RoleFuture<S::Future>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<B>) -> Self::Future {
        let mut context = RequestContext::default();
        let outcome = {
            let headers = req.headers();
            let view = RequestView {
                path: req.uri().path(),
                method: req.method().as_str(),
                identity_status: header_str(headers, X_IDENTITY_STATUS),
                roles: header_str(headers, X_ROLES),
                tenant_id: header_str(headers, X_TENANT_ID),
            };
            self.gate.evaluate(&view, &mut context)
        };

        match outcome {
            Outcome::PassThrough => RoleFuture::Inner {
                fut: self.inner.call(req),
            },
            Outcome::Allow => {
                req.extensions_mut().insert(context);
                RoleFuture::Inner {
                    fut: self.inner.call(req),
                }
            }
            Outcome::Deny(denial) => {
                let mut resp = denial.into_response();
                resp.extensions_mut().insert(context);
                RoleFuture::Rejected { resp: Some(resp) }
            }
        }
    }
}

/// Header value as text. Non-ASCII UTF-8 is kept; invalid UTF-8 counts as
/// absent.
fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| std::str::from_utf8(value.as_bytes()).ok())
}

pin_project! {
    /// Future for [`RoleService`].
    #[project = RoleFutureProj]
    pub enum RoleFuture<F> {
        Inner { #[pin] fut: F },
        Rejected { resp: Option<Response> },
    }
}

impl<F, E> Future for RoleFuture<F>
where
    F: Future<Output = Result<Response, E>>,
{
    type Output = Result<Response, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.project() {
            RoleFutureProj::Inner { fut } => fut.poll(cx),
            RoleFutureProj::Rejected { resp } => {
                Poll::Ready(Ok(resp.take().expect("polled after completion")))
            }
        }
    }
}
