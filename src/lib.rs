pub mod cli;
pub mod config;
pub mod error;
pub mod load_config;
pub mod param_store;
pub mod provision;
pub mod token;
pub mod vault;

pub use cli::{run, Cli};
pub use error::ProvisionError;
