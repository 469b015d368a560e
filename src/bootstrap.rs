use std::{sync::Arc, time::Duration};
use tracing::{info, warn};

use crate::{
    airdrop::{registry::InMemoryTaskRegistry, service::AirdropService},
    api::handler::AppState,
    config::Config,
    error::AppResult,
    ledger::{
        client::{LedgerRouter, NetworkServices},
        models::Network,
        rpc::{JsonRpcLedgerClient, RpcConfig},
        signer::DefaultResolver,
    },
    signing::client::{SigningService, XamanClient, XamanConfig},
};

/// How often an interactive signer asks the signing service for a decision
const SIGNING_POLL_INTERVAL: Duration = Duration::from_secs(2);

const CLEANUP_INTERVAL: Duration = Duration::from_secs(3600);

pub async fn initialize_app_state(config: &Config) -> AppResult<AppState> {
    info!("Initializing application components ...");

    let signing = initialize_signing(config)?;

    // One ledger client and resolver per network
    let mut router = LedgerRouter::new();
    for network in Network::all() {
        let rpc = Arc::new(JsonRpcLedgerClient::new(RpcConfig::new(
            config.rpc_url(network),
            network,
            config.ledger_timeout,
        ))?);
        let resolver = Arc::new(DefaultResolver::new(
            rpc.clone(),
            signing.clone(),
            SIGNING_POLL_INTERVAL,
            config.signing_timeout,
        ));
        router.register(
            network,
            NetworkServices {
                ledger: rpc,
                resolver,
            },
        );
        info!("✅ {} ledger client registered: {}", network, config.rpc_url(network));
    }

    let registry = Arc::new(InMemoryTaskRegistry::new());
    info!("✅ Task registry initialized");

    let service = Arc::new(AirdropService::new(
        config.airdrop_settings(),
        router,
        registry,
        signing,
    ));

    let settings = service.settings();
    info!(
        "📋 Airdrop limits: {} recipients, {} concurrent tasks, {:?} between submissions",
        settings.max_recipients, settings.max_concurrent_tasks, settings.executor.tx_delay
    );

    spawn_cleanup(service.clone(), config.task_cleanup_after);

    Ok(AppState {
        service,
        default_network: config.default_network,
    })
}

fn initialize_signing(config: &Config) -> AppResult<Option<Arc<dyn SigningService>>> {
    let Some(api) = &config.signing else {
        warn!("⚠️  SIGNING_API_KEY/SIGNING_API_SECRET not set - interactive signing disabled");
        return Ok(None);
    };

    let expire_minutes = config.signing_timeout.as_secs().div_ceil(60).max(1);
    let client = XamanClient::new(XamanConfig {
        base_url: api.url.clone(),
        api_key: api.api_key.clone(),
        api_secret: api.api_secret.clone(),
        timeout: config.ledger_timeout,
        expire_minutes: u32::try_from(expire_minutes).unwrap_or(u32::MAX),
    })?;

    info!("✅ Signing service client initialized: {}", api.url);
    Ok(Some(Arc::new(client)))
}

/// Drop finished tasks once they are older than `max_age` (checked hourly)
fn spawn_cleanup(service: Arc<AirdropService>, max_age: chrono::Duration) {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(CLEANUP_INTERVAL).await;

            let purged = service.purge_finished(max_age);
            if purged > 0 {
                info!("🗑️  Purged {} finished airdrop tasks", purged);
            }
        }
    });
    info!("✅ Task cleanup started (hourly, retention {}h)", max_age.num_hours());
}
