//! Command-line interface
mod opts;

pub use opts::Opts;
