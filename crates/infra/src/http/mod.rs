//! HTTP clients

pub mod client;
pub mod profile_api;

pub use client::{HttpClient, HttpClientBuilder};
pub use profile_api::HttpProfileApi;
