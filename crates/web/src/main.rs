mod handlers;
mod relay;
#[cfg(test)]
mod testing;

use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    sync::Arc,
    time::Duration,
};

use axum::{
    Router,
    extract::{ConnectInfo, FromRef},
    http::{Request, StatusCode, header},
};
use chrono::Utc;
use pushgate_core::{EventStore, QueuePublisher, config::Config, semester::SemesterSchedule};
use pushgate_db::Database;
use pushgate_queue::Queue;
use tokio::{net::TcpListener, signal};
use tower::ServiceBuilder;
use tower_http::{
    normalize_path::NormalizePathLayer,
    timeout::TimeoutLayer,
    trace::{DefaultOnResponse, MakeSpan, TraceLayer},
};
use tracing::{Level, Span};
use tracing_subscriber::{
    EnvFilter, Layer, filter::LevelFilter, layer::SubscriberExt, util::SubscriberInitExt,
};

/// Everything a delivery pipeline needs, constructed once at startup.
/// Configuration is immutable from here on; the store and queue handles are
/// shared across all in-flight deliveries.
#[derive(Clone, FromRef)]
pub struct AppState {
    pub config: Arc<Config>,
    pub schedule: Arc<SemesterSchedule>,
    pub store: Arc<dyn EventStore>,
    pub queue: Arc<dyn QueuePublisher>,
}

#[tokio::main]
async fn main() {
    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config.yml".to_string());
    let config = Config::load(&config_path).expect("Failed to load config file");

    let default_level = if config.server.debug { LevelFilter::DEBUG } else { LevelFilter::INFO };
    let env_filter =
        EnvFilter::builder().with_default_directive(default_level.into()).from_env_lossy();
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_filter(env_filter))
        .init();

    let schedule = SemesterSchedule::from_config(&config).expect("Failed to parse semester table");
    match schedule.resolve(Utc::now()) {
        Some(semester) => tracing::info!("Current semester: {semester}"),
        None => tracing::info!("No semester covers the current date"),
    }

    let db = Database::connect(&config.db).await.expect("Failed to connect to MongoDB");
    let queue = Queue::connect(&config.queue).await.expect("Failed to connect to Redis");

    let port = config.server.port;
    let state = AppState {
        config: Arc::new(config),
        schedule: Arc::new(schedule),
        store: Arc::new(db),
        queue: Arc::new(queue),
    };
    let router = app(state).into_make_service_with_connect_info::<SocketAddr>();

    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    tracing::info!("Webhook listener: Listening on {}", addr);
    let listener = TcpListener::bind(addr).await.expect("bind error");
    if let Err(e) =
        axum::serve(listener, router).with_graceful_shutdown(shutdown_signal()).await
    {
        tracing::error!("Server error: {e:?}");
    }
    tracing::info!("Shut down gracefully");
}

fn app(state: AppState) -> Router {
    let middleware = ServiceBuilder::new()
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(RequestSpan)
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(30),
        ))
        .layer(NormalizePathLayer::trim_trailing_slash());
    let router = handlers::build_router(&state.config).with_state(state);
    router.layer(middleware)
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler");
        tokio::select! {
            result = signal::ctrl_c() => result.expect("Failed to listen for ctrl-c"),
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        signal::ctrl_c().await.expect("Failed to listen for ctrl-c")
    }
}

#[derive(Debug, Clone)]
struct RequestSpan;

impl<B> MakeSpan<B> for RequestSpan {
    fn make_span(&mut self, request: &Request<B>) -> Span {
        let ip = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip())
            .unwrap_or(IpAddr::from([0, 0, 0, 0]));
        let user_agent = request
            .headers()
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("[unknown]");
        tracing::span!(
            Level::INFO,
            "request",
            method = %request.method(),
            uri = %request.uri(),
            ip = %ip,
            user_agent = %user_agent,
        )
    }
}
