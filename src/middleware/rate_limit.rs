use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use governor::{clock::DefaultClock, state::InMemoryState, state::NotKeyed, Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::error::ErrorResponse;

/// Process-wide limiter for the routes it is layered on
#[derive(Clone)]
pub struct RateLimitLayer {
    limiter: Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
}

impl RateLimitLayer {
    /// `requests` per `per_seconds`, allowed in one burst. Zero values fall
    /// back to one request per second.
    pub fn new(requests: u32, per_seconds: u64) -> Self {
        let burst = NonZeroU32::new(requests).unwrap_or(NonZeroU32::MIN);
        let period = Duration::from_secs(per_seconds.max(1)) / burst.get();
        let quota = Quota::with_period(period)
            .unwrap_or_else(|| Quota::per_second(NonZeroU32::MIN))
            .allow_burst(burst);

        RateLimitLayer {
            limiter: Arc::new(RateLimiter::direct(quota)),
        }
    }

    pub fn check(&self) -> Result<(), Response> {
        match self.limiter.check() {
            Ok(_) => Ok(()),
            Err(_) => {
                warn!("🚦 Rate limit exceeded");
                let body = Json(ErrorResponse {
                    error: "Rate limit exceeded. Please try again later.".to_string(),
                    error_code: "RATE_LIMITED".to_string(),
                    details: None,
                });
                Err((StatusCode::TOO_MANY_REQUESTS, body).into_response())
            }
        }
    }
}

/// Use with `axum::middleware::from_fn_with_state`
pub async fn rate_limit_middleware(
    State(limiter): State<RateLimitLayer>,
    req: Request,
    next: Next,
) -> Result<impl IntoResponse, Response> {
    limiter.check()?;
    Ok(next.run(req).await)
}
