pub mod clients;
pub mod config;
pub mod csrf;
pub mod dispatcher;
pub mod dto;
pub mod error;
pub mod grants;
pub mod idp;
pub mod middleware;
pub mod models;
pub mod orchestrator;
pub mod router;
pub mod session;
pub mod stores;
