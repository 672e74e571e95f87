//! Offer/answer negotiation with the realtime relay

pub mod client;
pub mod credential;

pub use client::{SignalingClient, SignalingConfig};
pub use credential::{Credential, CredentialRequest, CredentialResponse};
