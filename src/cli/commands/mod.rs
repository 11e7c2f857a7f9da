//! CLI command implementations.

mod config;
mod doctor;
mod export;
mod init;
mod resolve;

pub use config::run_config;
pub use doctor::run_doctor;
pub use export::run_export;
pub use init::run_init;
pub use resolve::run_resolve;
