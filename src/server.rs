use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use tower_http::{compression::CompressionLayer, trace::TraceLayer};
use tracing::info;

use crate::{
    api::{
        discovery::{
            get_issued_token, get_wallet_assets, get_wallet_balance, list_issuer_tokens,
            validate_addresses,
        },
        handler::{
            cancel_airdrop, check_readiness, create_airdrop, create_slots, estimate_airdrop,
            get_airdrop_status, get_signing_status, health_check, list_airdrops, list_slots,
            request_slots, AppState,
        },
        streaming::stream_airdrop,
    },
    middleware::{create_cors_layer, rate_limit_middleware, RateLimitLayer},
};

pub fn create_app(state: AppState, allowed_origins: &[String], limiter: RateLimitLayer) -> Router {
    info!("⚙️ Setting up HTTP routes...");

    // Only task creation is limited; listing stays open
    let tasks = post(create_airdrop)
        .route_layer(from_fn_with_state(limiter, rate_limit_middleware))
        .get(list_airdrops);

    let app = Router::new()
        .route("/health", get(health_check))
        .nest(
            "/api/v1",
            Router::new()
                // Planning
                .route("/airdrop/estimate", post(estimate_airdrop))
                .route("/airdrop/readiness", post(check_readiness))
                // Tasks
                .route("/airdrop/tasks", tasks)
                .route("/airdrop/tasks/:id", get(get_airdrop_status))
                .route("/airdrop/tasks/:id/cancel", post(cancel_airdrop))
                .route("/airdrop/tasks/:id/stream", get(stream_airdrop))
                // Tickets
                .route("/slots/list", post(list_slots))
                .route("/slots/request", post(request_slots))
                .route("/slots/create", post(create_slots))
                // Wallets and issued assets
                .route("/wallet/validate", post(validate_addresses))
                .route("/wallet/:address/balance", get(get_wallet_balance))
                .route("/wallet/:address/assets", get(get_wallet_assets))
                .route("/tokens/:issuer", get(list_issuer_tokens))
                .route("/tokens/:issuer/:currency", get(get_issued_token))
                // Signing service
                .route("/signing/:request_id", get(get_signing_status)),
        )
        .layer(CompressionLayer::new())
        .layer(create_cors_layer(allowed_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    info!("✓ HTTP routes configured");
    app
}

pub async fn run_server(app: Router, bind_address: &str) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind_address).await?;
    info!("🌐 Server listening on: {}", bind_address);

    axum::serve(listener, app).await
}
