//! Server initialization and routing

use crate::api;
use crate::config::Config;
use crate::mail::{MailTransport, Mailer, MimeComposer, SmtpTransport};
use crate::middleware::{log_bodies, normalize_error_response};
use crate::repository::{InMemoryMessageRepository, InMemoryTemplateRepository};
use crate::scheduler::{DeliveryScheduler, ScheduleQueue};
use crate::service::{MessageService, TemplateService};
use anyhow::Result;
use axum::{
    http::StatusCode,
    routing::{get, post, MethodRouter},
    Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub message_service: Arc<MessageService>,
    pub template_service: Arc<TemplateService>,
    pub scheduler: Arc<DeliveryScheduler>,
}

impl AppState {
    /// Wire repositories, queue, mailer and services around one transport
    pub fn new(config: Config, transport: Arc<dyn MailTransport>) -> Self {
        let messages = Arc::new(InMemoryMessageRepository::new());
        let templates = Arc::new(InMemoryTemplateRepository::new());
        let queue = Arc::new(ScheduleQueue::new());
        let mailer = Mailer::new(MimeComposer::new(config.default_from_name.clone()), transport);

        let scheduler = Arc::new(DeliveryScheduler::new(
            queue.clone(),
            mailer.clone(),
            messages.clone(),
            &config.scheduler,
        ));
        let message_service = Arc::new(MessageService::new(
            messages.clone(),
            templates.clone(),
            queue,
            mailer,
            config.debug,
        ));
        let template_service = Arc::new(TemplateService::new(templates, messages));

        Self {
            config: Arc::new(config),
            message_service,
            template_service,
            scheduler,
        }
    }
}

/// Run the server until Ctrl-C or SIGTERM
pub async fn run(config: Config) -> Result<()> {
    let transport = Arc::new(SmtpTransport::new(config.smtp.clone()));
    let http_addr = config.http_addr();
    info!(
        smtp = %config.smtp_addr(),
        security = config.smtp.security.as_str(),
        keys = config.api_keys.len(),
        debug = config.debug,
        "Configured SMTP relay"
    );

    let state = AppState::new(config, transport);
    let scheduler = state.scheduler.clone();
    scheduler.start().await;

    let app = build_router(state);
    let listener = TcpListener::bind(&http_addr).await?;
    info!("HTTP server started on {}", http_addr);

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    scheduler.stop().await;
    scheduler.drain().await;
    info!("Server stopped");

    served?;
    Ok(())
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c().await.ok();
    };
    #[cfg(unix)]
    let term = async {
        if let Ok(mut s) = signal::unix::signal(signal::unix::SignalKind::terminate()) {
            s.recv().await;
        }
    };
    #[cfg(not(unix))]
    let term = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = term => {},
    }
    info!("Shutdown signal received");
}

/// Mount a handler at `/X`, `/X.json` and `/api/1.0/X.json`
fn mandrill_route(
    router: Router<AppState>,
    path: &str,
    handler: MethodRouter<AppState>,
) -> Router<AppState> {
    router
        .route(&format!("/{}", path), handler.clone())
        .route(&format!("/{}.json", path), handler.clone())
        .route(&format!("/api/1.0/{}.json", path), handler)
}

/// Build the HTTP router
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let endpoints: Vec<(&str, MethodRouter<AppState>)> = vec![
        ("messages/send", post(api::message::send)),
        ("messages/send-template", post(api::message::send_template)),
        ("messages/send-raw", post(api::message::send_raw)),
        ("messages/parse", post(api::message::parse)),
        ("messages/info", post(api::message::info)),
        ("messages/content", post(api::message::content)),
        ("messages/search", post(api::message::search)),
        ("messages/search-time-series", post(api::message::search_time_series)),
        ("messages/list-scheduled", post(api::message::list_scheduled)),
        ("messages/cancel-scheduled", post(api::message::cancel_scheduled)),
        ("messages/reschedule", post(api::message::reschedule)),
        ("templates/add", post(api::template::add)),
        ("templates/info", post(api::template::info)),
        ("templates/update", post(api::template::update)),
        ("templates/publish", post(api::template::publish)),
        ("templates/delete", post(api::template::delete)),
        ("templates/list", post(api::template::list)),
        ("templates/time-series", post(api::template::time_series)),
        ("templates/render", post(api::template::render)),
    ];

    let mut router = Router::new().route("/healthz", get(api::health::healthz));
    for (path, handler) in endpoints {
        router = mandrill_route(router, path, handler);
    }

    let debug = state.config.debug;
    let router = router
        .fallback(|| async { StatusCode::NOT_FOUND })
        .layer(axum::middleware::from_fn(normalize_error_response));
    let router = if debug {
        router.layer(axum::middleware::from_fn(log_bodies))
    } else {
        router
    };

    router
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
