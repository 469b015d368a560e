use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use validator::Validate;

use crate::airdrop::holdings::{AccountBalance, AddressCheck, IssuedToken, IssuerTokens, WalletAssets};
use crate::api::handler::AppState;
use crate::error::AppResult;
use crate::ledger::models::Network;

#[derive(Debug, Deserialize)]
pub struct NetworkQuery {
    pub network: Option<Network>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddressListRequest {
    #[validate(length(min = 1, message = "addresses list is required"))]
    pub addresses: Vec<String>,
}

/// POST /wallet/validate
pub async fn validate_addresses(
    State(state): State<AppState>,
    Json(request): Json<AddressListRequest>,
) -> AppResult<Json<AddressCheck>> {
    request.validate()?;
    Ok(Json(state.service.check_addresses(&request.addresses)?))
}

/// GET /wallet/:address/balance
pub async fn get_wallet_balance(
    State(state): State<AppState>,
    Path(address): Path<String>,
    Query(query): Query<NetworkQuery>,
) -> AppResult<Json<AccountBalance>> {
    let network = state.network(query.network);
    Ok(Json(state.service.get_account_balance(network, &address).await?))
}

/// Native balance plus every positive trust line
/// GET /wallet/:address/assets
pub async fn get_wallet_assets(
    State(state): State<AppState>,
    Path(address): Path<String>,
    Query(query): Query<NetworkQuery>,
) -> AppResult<Json<WalletAssets>> {
    let network = state.network(query.network);
    Ok(Json(state.service.get_wallet_assets(network, &address).await?))
}

/// GET /tokens/:issuer
pub async fn list_issuer_tokens(
    State(state): State<AppState>,
    Path(issuer): Path<String>,
    Query(query): Query<NetworkQuery>,
) -> AppResult<Json<IssuerTokens>> {
    let network = state.network(query.network);
    Ok(Json(state.service.get_issuer_tokens(network, &issuer).await?))
}

/// GET /tokens/:issuer/:currency
pub async fn get_issued_token(
    State(state): State<AppState>,
    Path((issuer, currency)): Path<(String, String)>,
    Query(query): Query<NetworkQuery>,
) -> AppResult<Json<IssuedToken>> {
    let network = state.network(query.network);
    let token = state
        .service
        .get_issued_token(network, &issuer, &currency)
        .await?;
    Ok(Json(token))
}
