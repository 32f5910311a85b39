//! Subcommand implementations

pub mod ads;
pub mod config;
pub mod doctor;
pub mod platforms;
pub mod publish;
