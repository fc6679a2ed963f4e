//! Request handlers.

pub mod health;
pub mod info;
pub mod overlay;
pub mod upload;

pub use health::*;
pub use info::*;
pub use overlay::*;
