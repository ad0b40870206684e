pub mod cancellation;
pub mod config;
pub mod env;
pub mod progress_bars;
pub mod signature;
