//! Front ends of [ocisize]: the `ocisize` command and the `ocisize-web` server

pub mod cli;
pub mod format;
pub mod spinner;
pub mod web;
