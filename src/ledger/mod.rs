pub mod client;
pub mod models;
pub mod rpc;
pub mod signer;
