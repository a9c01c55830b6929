//! Alternate weight sources.
//!
//! - [`mesh`]: weights computed in-process by a [`WeightGenerator`]
//! - [`tempest`]: the external mesh-generation toolchain

pub mod mesh;
pub mod tempest;

pub use mesh::{
    generated_metadata, GridDescription, MeshMethod, MeshOptions, PoleMethod, UnmappedAction, WeightGenerator,
};
pub use tempest::{TempestCommand, TempestInvocation};
