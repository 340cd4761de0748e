pub mod cli;
pub mod engine;
pub mod platform;

pub const CAPSTAN_VERSION: &str = env!("CARGO_PKG_VERSION");
