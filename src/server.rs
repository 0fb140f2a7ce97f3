use crate::config::Config;
use crate::error::Result;
use crate::guard::DdosGuard;
use crate::handlers::{client_status, guard_stats, health_check, protected_resource, AppState};
use crate::middleware::{guard_middleware, logging_middleware, GuardLayerState, RequestLogState};
use axum::routing::get;
use axum::{middleware, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Build the application router. The guard layer is only installed when the
/// guard is enabled.
pub fn create_app(config: &Config) -> Router {
    let guard_config = config.guard_config();
    let guard = guard_config
        .enabled
        .then(|| Arc::new(DdosGuard::new(guard_config)));

    create_app_with_guard(guard, config.server.trust_forwarded_headers)
}

/// Build the router around an existing guard instance.
pub fn create_app_with_guard(guard: Option<Arc<DdosGuard>>, trust_forwarded_headers: bool) -> Router {
    let state = AppState { guard: guard.clone() };

    let mut app = Router::new()
        .route("/health", get(health_check))
        .route("/guard/stats", get(guard_stats))
        .route("/guard/clients/:key", get(client_status))
        .fallback(protected_resource)
        .with_state(state);

    if let Some(guard) = guard {
        let guard_state = GuardLayerState {
            guard,
            trust_forwarded_headers,
        };
        app = app.layer(middleware::from_fn_with_state(guard_state, guard_middleware));
    }

    app.layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
            .layer(middleware::from_fn_with_state(
                RequestLogState {
                    trust_forwarded_headers,
                },
                logging_middleware,
            )),
    )
}

pub struct Server {
    app: Router,
    bind_addr: String,
}

impl Server {
    pub fn new(config: &Config) -> Self {
        Self {
            app: create_app(config),
            bind_addr: config.server.bind_addr.clone(),
        }
    }

    pub async fn run(self) -> Result<()> {
        let listener = TcpListener::bind(&self.bind_addr).await?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener until a shutdown signal arrives.
    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "ddos-guard server starting");
        tracing::info!("Health check available at /health");
        tracing::info!("Guard statistics available at /guard/stats");

        axum::serve(
            listener,
            self.app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await?;

        tracing::info!("ddos-guard server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        },
    }
}
