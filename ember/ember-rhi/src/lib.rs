//! Ember RHI: backend-agnostic Rendering Hardware Interface.
//!
//! The contract is a set of `Arc<dyn …>` resource traits, plain-data *Info*
//! structs, and a [`Device`] factory trait, thin enough to host a D3D11-style
//! immediate backend as well as an explicit Vulkan/D3D12-style one. The
//! in-tree reference implementation is the deterministic [`soft`] backend,
//! which records every command into an inspectable journal instead of
//! touching a GPU.

mod command;
mod device;
mod info;
mod resource;
mod types;

pub mod soft;

pub use command::*;
pub use device::*;
pub use info::*;
pub use resource::*;
pub use types::*;
