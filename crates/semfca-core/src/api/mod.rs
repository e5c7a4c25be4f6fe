//! Platform client module.
//!
//! This module provides the `PlatformClient` trait, the capability set the
//! session orchestrator relies on (login, restore, save, user id), and
//! `HttpPlatformClient`, a token-endpoint adapter that implements it over
//! HTTP and keeps its session in a `SessionStore` artifact.

pub mod client;
pub mod error;

pub use client::{HttpPlatformClient, PlatformClient};
pub use error::ClientError;
