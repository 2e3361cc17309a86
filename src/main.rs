use std::net::SocketAddr;

use axum::Router;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use cruscotto::config::Config;
use cruscotto::middleware::rate_limit;
use cruscotto::models::ErrorResponse;
use cruscotto::routes;
use cruscotto::routes::proxy::ProxyState;
use cruscotto::services::{CredentialStore, GatewayClient};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Cruscotto Proxy",
        version = "1.0.0",
        description = "Proxy con cache verso il backend della dashboard finanziaria",
        license(name = "MIT"),
    ),
    paths(
        cruscotto::routes::data::get_insights,
        cruscotto::routes::data::get_index_groups,
        cruscotto::routes::data::get_performances_grouped,
        cruscotto::routes::data::get_performance,
        cruscotto::routes::data::get_performance_by_path,
        cruscotto::routes::data::get_predictions,
        cruscotto::routes::data::get_predictions_by_path,
        cruscotto::routes::system::trigger_daily_task,
        cruscotto::routes::system::health_check,
    ),
    components(schemas(ErrorResponse)),
    tags(
        (name = "Dati", description = "Insights e gruppi di indici"),
        (name = "Performance", description = "Performance raggruppate e per titolo"),
        (name = "Previsioni", description = "Previsioni per serie storica"),
        (name = "Sistema", description = "Health check e task"),
    ),
    servers(
        (url = "http://localhost:3000", description = "Server locale"),
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() {
    // Carica variabili da .env
    dotenvy::dotenv().ok();

    // Inizializza logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cruscotto=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Carica configurazione
    let config = Config::from_env();

    // Il proxy non ha una sessione propria: il token arriva dal browser
    let gateway = GatewayClient::from_config(&config, CredentialStore::detached());
    let Some(base_url) = gateway.base_url().map(str::to_string) else {
        tracing::error!("CRUSCOTTO_API_URL mancante o non valido: impossibile avviare il proxy");
        std::process::exit(1);
    };

    let rate_limiter = rate_limit::create_rate_limiter(config.rate_limit_per_minute);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(routes::create_router(ProxyState::new(gateway), rate_limiter))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        );

    let addr: SocketAddr = match format!("{}:{}", config.host, config.port).parse() {
        Ok(addr) => addr,
        Err(e) => {
            tracing::error!("Indirizzo non valido {}:{}: {}", config.host, config.port, e);
            std::process::exit(1);
        }
    };

    tracing::info!("========================================");
    tracing::info!("  Cruscotto Proxy v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("========================================");
    tracing::info!("Server: http://{}", addr);
    tracing::info!("Backend: {}", base_url);
    tracing::info!("Swagger UI: http://{}/swagger-ui/", addr);
    tracing::info!("----------------------------------------");
    tracing::info!("Endpoints:");
    tracing::info!("  GET /api/insights               - Lista insights");
    tracing::info!("  GET /api/index-groups           - Gruppi di indici");
    tracing::info!("  GET /api/performances-grouped   - Snapshot (cache 1h)");
    tracing::info!("  GET /api/performance?code=      - Performance titolo");
    tracing::info!("  GET /api/predictions?name=      - Previsioni");
    tracing::info!("  GET /api/tasks/daily            - Task giornaliero");
    tracing::info!("  GET /api/health                 - Health check backend");
    tracing::info!("----------------------------------------");

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Bind su {} fallito: {}", addr, e);
            std::process::exit(1);
        }
    };

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("Server terminato con errore: {}", e);
        std::process::exit(1);
    }
}
