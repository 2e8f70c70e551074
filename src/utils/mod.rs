pub mod constants;
pub mod config_loader;
pub mod format;

pub use constants::*;
pub use config_loader::*;
pub use format::{gas_price_to_gwei, log_bundle};
