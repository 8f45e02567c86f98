// src/cli/mod.rs
// Command line front end: arguments, request files and streaming display

pub mod args;
pub mod display;
pub mod request;

pub use args::{CliArgs, OutputFormat};
pub use display::StreamingDisplay;
pub use request::AdvisoryRequest;
