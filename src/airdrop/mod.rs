pub mod estimator;
pub mod executor;
pub mod holdings;
pub mod models;
pub mod readiness;
pub mod registry;
pub mod service;
pub mod slots;
pub mod validation;
