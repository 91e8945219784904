#![doc = include_str!("../README.md")]
#![forbid(unsafe_code)]

pub mod config;
pub mod logging;
pub mod render;

mod error;
pub use error::{OverzoomError, OverzoomResult};
