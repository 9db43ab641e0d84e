//! # Vibeman Client
//!
//! Shared entities for the Vibeman control plane, plus a typed HTTP
//! client for driving it. The CLI and the server both depend on this
//! crate; the server implements the API this client consumes.

pub mod entities;

mod client;

pub use client::VibemanClient;
