//! Provider registry and per-provider availability state

pub mod availability;
pub mod registry;

pub use availability::{AvailabilityTracker, AvailabilityWindow, DisableReason};
pub use registry::{default_descriptors, AdapterKind, Provider, ProviderDescriptor, ProviderRegistry};
