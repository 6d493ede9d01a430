pub mod client;
pub mod error;
pub mod extract;
pub mod metrics;
pub mod models;
pub mod token;

pub use client::*;
pub use error::*;
pub use metrics::*;
pub use models::*;
pub use token::*;
