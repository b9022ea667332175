//! Command implementations for invsync-cli

pub mod debug;
pub mod sync;

pub use debug::run_debug;
pub use sync::run_sync;
