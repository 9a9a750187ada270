//! Core whisper library (request dispatcher, access-control model, admin client, config).

pub mod admin;
pub mod config;
pub mod logging;
pub mod model;
pub mod notify;
pub mod stub;
