//! Agent packages: discovery on disk, loading into runnable graphs.

pub mod context;
pub mod descriptor;
pub mod loader;
pub mod registry;

pub use context::AgentContext;
pub use descriptor::{AgentDescriptor, GraphRef};
pub use loader::{AgentLoader, LoadedAgent};
pub use registry::AgentRegistry;
