pub mod config;
pub mod engine;
pub mod handlers;
pub mod models;
pub mod server;
pub mod session;
pub mod state;
pub mod utils;
