//! The operations a request layer exposes, as plain async functions over the
//! process-wide library.

pub mod cleanup;
pub mod organize;
pub mod scan;
pub mod system;
pub mod works;

pub use cleanup::*;
pub use organize::*;
pub use scan::*;
pub use system::*;
pub use works::*;
