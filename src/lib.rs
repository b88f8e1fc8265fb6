#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::return_self_not_must_use
)]

pub mod app;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod sophos;
pub mod state;
pub mod todoist;

pub use config::Config;
pub use error::{Result, WardenError};
