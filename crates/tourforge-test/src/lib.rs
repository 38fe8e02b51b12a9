//! Shared test fixtures for TourForge crates.
//!
//! This crate provides instances and gateway doubles for testing.
//! It depends only on `tourforge-core` so that solver crates can use it as a
//! dev-dependency without cycles.
//!
//! - [`instances`] - ring, asymmetric and seeded random instances, brute-force optimum
//! - [`recording`] - `RecordingGateway`, a scriptable gateway that records every call
//!
//! # Usage
//!
//! Add as a dev-dependency in your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! tourforge-test = { workspace = true }
//! ```
//!
//! Then import the fixtures you need:
//!
//! ```ignore
//! use tourforge_test::instances::ring_instance;
//! use tourforge_test::RecordingGateway;
//! ```

pub mod instances;
pub mod recording;

// Re-export commonly used types at crate root for convenience
pub use instances::{
    brute_force_optimum, directed_ring_instance, random_symmetric_instance, ring_instance,
};
pub use recording::{ConstraintSense, RecordedConstraint, RecordingGateway, RecordingLog};
