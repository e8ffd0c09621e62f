//! Core constants, configuration, errors and collaborator traits.

pub mod constants;
mod config;
mod error;
mod traits;

pub use config::*;
pub use error::*;
pub use traits::*;
