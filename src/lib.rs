pub mod api;
pub mod business;
pub mod carrier;
pub mod config;
pub mod domain;
pub mod error;
pub mod logging;
pub mod observability;
pub mod security;
