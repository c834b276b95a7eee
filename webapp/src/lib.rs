pub mod error;
pub mod config;
pub mod calc;
pub mod api;

pub use api::{Reply, Service};
pub use error::{Error, Result};
