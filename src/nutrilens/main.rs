use axum::http::header::HeaderName;
use log::{info, warn};
use nutrilens::application::advice_service::AdviceService;
use nutrilens::application::food_log::FoodLog;
use nutrilens::application::scan_service::ScanService;
use nutrilens::config::AppConfig;
use nutrilens::domain::backend::{NutritionAdvisor, NutritionBackend};
use nutrilens::infrastructure::axum_handler::{router, AppState};
use nutrilens::infrastructure::gemini_advisor::GeminiAdvisor;
use nutrilens::infrastructure::http_backend::HttpNutritionBackend;
use nutrilens::infrastructure::image_rasterizer::DefaultRasterizer;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = AppConfig::load()?;
    info!("Analysis backend at {}", config.api_url);

    let backend = HttpNutritionBackend::new(&config.api_url, config.upload_timeout)?;
    if !backend.check_health().await {
        warn!("Analysis backend at {} is not reachable yet", config.api_url);
    }
    let advisor = match config.gemini_api_key.as_deref() {
        Some(key) => Some(GeminiAdvisor::new(&config.gemini_api_url, key, config.upload_timeout)?),
        None => {
            warn!("GEMINI_API_KEY not set, advice is disabled");
            None
        }
    };

    let backend: Arc<dyn NutritionBackend> = Arc::new(backend);
    let scan_service = Arc::new(ScanService::new(
        Arc::new(DefaultRasterizer::new()),
        backend.clone(),
        FoodLog::new(),
    ));
    let advice_service = advisor.map(|advisor| {
        let advisor: Arc<dyn NutritionAdvisor> = Arc::new(advisor);
        Arc::new(AdviceService::new(advisor, backend.clone()))
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_headers(vec![HeaderName::from_static("content-type")]);

    let mut app = router(Arc::new(AppState::new(scan_service, advice_service)));
    if let Some(dir) = &config.static_dir {
        info!("Serving frontend from {}", dir.display());
        app = app.fallback_service(ServeDir::new(dir));
    }
    let app = app.layer(cors);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Listening on {}", addr);
    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await?;
    Ok(())
}
