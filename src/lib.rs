//! Finance Chat Cascade
//!
//! Routes a single chat request through a prioritized cascade of
//! interchangeable AI providers:
//! - Temporarily disables misbehaving providers (auth, rate limit, server error)
//! - Retries where safe, within each provider's own budget
//! - Prefers a persona-appropriate provider when one is available
//! - Normalizes every reply into one response contract
//!
//! CONTROL LOOP:
//! VALIDATE → REFRESH → PRESELECT → ATTEMPT → NORMALIZE → RESPOND

pub mod adapters;
pub mod api;
pub mod cascade;
pub mod clock;
pub mod config;
pub mod error;
pub mod models;
pub mod normalizer;
pub mod prompt;
pub mod providers;
pub mod router;

pub use error::Result;

// Re-export common types
pub use cascade::CascadeOrchestrator;
pub use config::{CredentialSource, EnvCredentials, Settings, StaticCredentials};
pub use models::*;
pub use providers::{AvailabilityTracker, ProviderRegistry};
