pub mod client;
pub mod interactive;
