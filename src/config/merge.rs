//! Configuration merging.

pub mod service;
