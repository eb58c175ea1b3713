pub mod auth;
pub mod client;

pub use auth::AuthProvider;
pub use client::{GcsClient, GcsClientFactory};
