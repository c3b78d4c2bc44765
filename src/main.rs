use std::sync::Arc;
use tokengate::{
    demo, start_cleanup_task, AppState, AuthConfig, AuthEngine, CleanupConfig,
    InMemorySessionStore, PostgresSessionStore, SessionStore,
};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tokengate=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting token gate demo server");

    // DATABASE_URL switches to the PostgreSQL store
    let store: Arc<dyn SessionStore> = match std::env::var("DATABASE_URL") {
        Ok(database_url) => {
            let pool = sqlx::PgPool::connect(&database_url).await?;
            let store = PostgresSessionStore::new(pool);
            store.ensure_schema().await?;
            info!("Using PostgreSQL session store");
            Arc::new(store)
        }
        Err(_) => {
            info!("Using in-memory session store");
            Arc::new(InMemorySessionStore::new())
        }
    };

    let engine = AuthEngine::new(AuthConfig::from_env(store)?)?;
    let app_state = AppState::new(engine);

    // Sweep expired sessions so abandoned tokens do not accumulate
    tokio::spawn(start_cleanup_task(
        app_state.engine.clone(),
        CleanupConfig::default(),
    ));

    let app = demo::router(app_state).layer(TraceLayer::new_for_http());

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("Server running on http://{}", bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}
