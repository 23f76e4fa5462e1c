mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use fontid_api::auth::{AppState, AppStateInner};
use fontid_api::billing::MockGateway;
use fontid_api::recordings::RecordingLibrary;
use fontid_db::CredentialStore;
use fontid_model::ModelContext;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "fontid=debug,fontid_api=debug,fontid_db=debug,fontid_model=debug,tower_http=debug"
                    .into()
            }),
        )
        .init();

    let config = Config::from_env()?;

    // Schema creation is the one fatal startup step
    let store = CredentialStore::new(&config.db_path);
    store.initialize()?;

    let recordings = RecordingLibrary::new(&config.recordings_dir);
    recordings.ensure_dir().await?;

    if config.payment_provider_key.is_none() {
        info!("No payment provider key configured, using mock gateway");
    } else {
        warn!("Payment provider key set but only the mock gateway is available");
    }

    let app_state: AppState = Arc::new(AppStateInner {
        store,
        models: ModelContext::new(config.model.clone(), Default::default()),
        preprocessor: config.preprocess.build(),
        gateway: Box::new(MockGateway),
        recordings,
        secret_key: config.secret_key.clone(),
    });

    // Warm the model cache so the first request does not pay for loading
    let warm = app_state.clone();
    match tokio::task::spawn_blocking(move || warm.models.load_model_and_classes()).await? {
        Ok(model) if model.is_placeholder() => {
            warn!("Serving placeholder predictions until a model is deployed")
        }
        Ok(model) => info!("Model ready with {} classes", model.labels().len()),
        Err(e) => warn!("Model failed to load, will retry on first prediction: {}", e),
    }

    let app = fontid_api::router(app_state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Font identifier listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
