pub mod access;
pub mod config;
pub mod error;
pub mod export;
pub mod identity;
pub mod server;
