//! Session lifecycle: per-session handles and the registry that caches them.

mod handle;
mod registry;

pub use handle::SessionHandle;
pub use registry::SessionRegistry;
