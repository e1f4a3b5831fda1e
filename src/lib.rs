pub mod config;
pub mod crypto;
pub mod models;
pub mod pipeline;
