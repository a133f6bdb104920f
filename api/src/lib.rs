pub mod config;
pub mod error;
pub mod globals;

pub mod server_fns;

pub use server_fns::*;
