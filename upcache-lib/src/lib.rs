//! Caching API gateway for Reddit
//!
//! An in-memory cache and rate governor that sits in front of Reddit's OAuth
//! API. It keeps one bearer token, paces every outbound call through one
//! shared governor, caches normalized responses per key, and serves stale or
//! empty data when Reddit misbehaves instead of failing.

pub mod auth;
pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod fetch;
pub mod gateway;
pub mod rate_limit;
pub mod reddit;
pub mod resource;
pub mod response;

mod client;

pub use client::*;
pub use config::GatewayConfig;
pub use error::Error;
pub use gateway::RedditGateway;
pub use gateway::ResourceKind;
pub use response::Freshness;
pub use response::Response;
