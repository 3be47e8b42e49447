pub mod chatbot;
pub mod config;
pub mod inference;
pub mod models;
pub mod risk;
pub mod service;
pub mod stages;
pub mod uploads;
pub mod views;

pub use config::ServiceConfig;
pub use models::*;
pub use service::{AppState, build_router, create_app};
