//! Microsoft account OAuth 2.0 authorization
//!
//! # Module Layout
//!
//! - [`client`]      -- authorization-code exchange, refresh and
//!   authenticated request building
//! - [`token`]       -- access and refresh token value types
//! - [`token_store`] -- durable refresh-token persistence

pub mod client;
pub mod token;
pub mod token_store;

pub use client::{OAuth2Client, ProviderConfig, TokenPlacement, TokenRequestMethod};
pub use token::{AccessToken, RefreshToken};
pub use token_store::{KeyringTokenStore, MemoryTokenStore, TokenStore};
