pub mod bank;
pub mod config;
pub mod crypto;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod security;
pub mod service;
pub mod types;

pub use error::TallyError;
