//! # Memberlink
//!
//! Client core for gym members: signing in against the membership backend,
//! keeping that session alive across restarts, and registering the device
//! for push notifications while someone is signed in.
//!
//! ## Architecture Overview
//!
//! The system consists of several key components organized into modules:
//!
//! - **[`session`]**: Authenticated identity, login and logout, restore at startup
//! - **[`notifications`]**: Push token registration and incoming notification routing
//! - **[`api`]**: Typed client for the membership backend
//! - **[`store`]**: Durable key-value storage for the session marker and push token
//! - **[`integration`]**: Assembly of all subsystems into one running client
//!
//! ## Features
//!
//! ### 🔐 Session Management
//! - **Observable Identity**: Every transition is published on a watch channel
//! - **Silent Restore**: A stale or unreadable session falls back to logged out
//! - **Unauthorized Teardown**: Any authenticated call answered with 401 ends the session
//!
//! ### 🔔 Push Registration
//! - **Once per Session**: The device token is sent once for each login
//! - **Stale Result Guard**: A send that finishes after the member changed is dropped
//! - **Graceful Degradation**: Simulators and denied permissions just skip registration
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use memberlink::{ClientConfig, MemberClient};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = MemberClient::new(&ClientConfig::default()).await?;
//!
//!     match client.session().identity().member() {
//!         Some(member) => println!("Welcome back, {}", member.display_name()),
//!         None => println!("Please log in"),
//!     }
//!
//!     client.shutdown().await?;
//!     Ok(())
//! }
//! ```

/// Typed access to the membership backend.
///
/// Defines the [`api::MemberApi`] seam, its reqwest implementation and the
/// records exchanged with the server.
pub mod api;

/// Client configuration loaded from TOML with environment overrides.
pub mod config;

/// Environment constants and path utilities.
///
/// Centralizes all hardcoded paths, file names and storage keys used
/// throughout the application for easier maintenance and consistency.
pub mod env;

/// Durable key-value storage.
pub mod store;

/// Session lifecycle and the authenticated identity.
///
/// The session manager is the only writer of the identity; everything else
/// observes it.
pub mod session;

/// Push notification registration and dispatch.
pub mod notifications;

/// High-level assembly of all subsystems.
pub mod integration;

// CLI module for command-line interface
pub mod cli;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export main session types
pub use session::{Identity, MembershipOverview, SessionError, SessionManager, SessionSnapshot};

// Re-export API types
pub use api::{ApiError, HttpApiClient, LoginCredentials, Member, MemberApi, MemberId};

// Re-export notification types
pub use notifications::{NotificationRegistrar, NotificationRoute, PushPlatform, SyncOutcome};

// Re-export storage and configuration types
pub use config::ClientConfig;
pub use store::{FileStore, KeyValueStore, MemoryStore};

// Re-export integration types
pub use integration::{ClientStatus, MemberClient};
