//! Core engine for streamfn.
//!
//! This crate provides:
//! - The backend contract (`init -> build -> run`) and the extension registry
//! - The Go backend: entry-point injection, import rewriting, isolated
//!   workspaces, dependency fetching, compilation and foreground runs
//! - go.mod inspection for runtime version reporting

pub mod backend;
pub mod error;
pub mod golang;
pub mod gomod;
pub mod options;

pub use backend::{Backend, BackendConfig, BackendFactory, Registry};
pub use error::{Error, Result};
pub use golang::{GolangBackend, Stage};
pub use options::{BuildOptions, DEFAULT_HOST, DEFAULT_PORT};
