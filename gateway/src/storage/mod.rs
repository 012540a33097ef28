pub mod config;
pub mod credentials;
pub mod layout;
pub mod migrate;
