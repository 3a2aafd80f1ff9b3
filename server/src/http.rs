use std::{
    collections::BTreeMap,
    net::{IpAddr, SocketAddr},
    sync::Arc,
};

use anyhow::Context;
use axum::{
    Json, Router,
    http::{self, Extensions, HeaderMap, HeaderName, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use platform_authz::{AuthorizationGate, RequestContext, RoleLayer, X_TENANT_ID};
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{debug, info};

use crate::config::AppConfig;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub gate: Arc<AuthorizationGate>,
}

impl AppState {
    pub fn new(config: AppConfig) -> anyhow::Result<Self> {
        let gate = config.gate()?;
        Ok(Self {
            config: Arc::new(config),
            gate: Arc::new(gate),
        })
    }
}

#[derive(Clone, Debug)]
pub struct ServeConfig {
    addr: SocketAddr,
}

impl ServeConfig {
    pub fn new(host: IpAddr, port: u16) -> Self {
        Self {
            addr: SocketAddr::from((host, port)),
        }
    }
}

pub async fn serve(config: ServeConfig, state: AppState) -> anyhow::Result<()> {
    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("failed to bind {}", config.addr))?;

    info!(%config.addr, "log api listening");
    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;
    Ok(())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed = origins
        .iter()
        .filter_map(|origin| origin.parse::<HeaderValue>().ok())
        .collect::<Vec<_>>();
    let allow_origin = if allowed.is_empty() {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(allowed)
    };
    CorsLayer::new()
        .allow_headers([
            http::header::CONTENT_TYPE,
            HeaderName::from_static("x-auth-token"),
        ])
        .allow_methods([Method::POST, Method::GET])
        .allow_origin(allow_origin)
}

pub fn build_router(state: AppState) -> Router {
    let request_id = MakeRequestUuid;
    let header_name = HeaderName::from_static("x-request-id");
    Router::new()
        .route("/healthcheck", get(health_handler))
        .route("/v2.0/log/single", post(send_log_handler))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(header_name.clone(), request_id))
                .layer(PropagateRequestIdLayer::new(header_name))
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(&state.config.cors_allowed_origins))
                .layer(RoleLayer::new(state.gate.clone())),
        )
        .with_state(state)
}

async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse {
        ok: true,
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
struct HealthResponse {
    ok: bool,
    version: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct SingleLog {
    pub message: String,
    #[serde(default)]
    pub dimensions: BTreeMap<String, String>,
}

async fn send_log_handler(
    headers: HeaderMap,
    extensions: Extensions,
    Json(log): Json<SingleLog>,
) -> HttpResult<StatusCode> {
    if log.message.trim().is_empty() {
        return Err(HttpError::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            "log message must not be empty",
        ));
    }
    let log_agent = extensions
        .get::<RequestContext>()
        .is_some_and(|ctx| ctx.is_agent);
    let tenant = headers
        .get(X_TENANT_ID)
        .and_then(|value| std::str::from_utf8(value.as_bytes()).ok())
        .unwrap_or_default();
    debug!(
        tenant,
        log_agent,
        dimensions = log.dimensions.len(),
        bytes = log.message.len(),
        "log accepted"
    );
    Ok(StatusCode::NO_CONTENT)
}

type HttpResult<T> = Result<T, HttpError>;

#[derive(Debug)]
struct HttpError {
    status: StatusCode,
    message: String,
}

impl HttpError {
    fn new(status: StatusCode, msg: &str) -> Self {
        Self {
            status,
            message: msg.to_string(),
        }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        (self.status, self.message).into_response()
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install CTRL+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        signal(SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    ctrl_c.await;

    #[cfg(unix)]
    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    };
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use http_body_util::BodyExt;
    use platform_authz::{DenialBody, RolesConfig};
    use tower::ServiceExt;

    use super::*;

    fn router() -> Router {
        let config = AppConfig {
            roles: RolesConfig::new(["/v2.0/log"], ["monasca-user"], ["monasca-log-agent"]),
            cors_allowed_origins: Vec::new(),
        };
        build_router(AppState::new(config).unwrap())
    }

    fn send_log(headers: &[(&str, &str)], body: &str) -> http::Request<Body> {
        let mut builder = http::Request::builder()
            .method(Method::POST)
            .uri("/v2.0/log/single")
            .header(http::header::CONTENT_TYPE, "application/json");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    #[tokio::test]
    async fn health_is_outside_the_gate() {
        let request = http::Request::builder()
            .uri("/healthcheck")
            .body(Body::empty())
            .unwrap();
        let response = router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn confirmed_user_can_send_logs() {
        let request = send_log(
            &[
                ("X-Identity-Status", "Confirmed"),
                ("X-Roles", "Monasca-User, other-role"),
                ("X-Tenant-Id", "tenant-1"),
            ],
            r#"{"message": "hello", "dimensions": {"hostname": "node-1"}}"#,
        );
        let response = router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn unauthenticated_agent_is_rejected() {
        let request = send_log(&[("X-Roles", "monasca-log-agent")], r#"{"message": "hi"}"#);
        let response = router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: DenialBody = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body.title, "Unauthorized");
        assert!(body.message.contains("authenticate"));
    }

    #[tokio::test]
    async fn invalid_bodies_are_rejected_after_the_gate() {
        let headers = [
            ("X-Identity-Status", "Confirmed"),
            ("X-Roles", "monasca-user"),
        ];
        let response = router()
            .oneshot(send_log(&headers, r#"{"dimensions": {}}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let response = router()
            .oneshot(send_log(&headers, r#"{"message": "   "}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
