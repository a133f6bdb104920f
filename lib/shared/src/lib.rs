pub mod catalog;
pub mod events;
pub mod library;
pub mod organize;
pub mod system;
pub mod work;
