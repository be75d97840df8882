//! plinth-lib: build-target orchestration for plinth
//!
//! This crate turns command-line target specs into builds and REPL sessions:
//! - `spec`: splitting specs from pass-through builder arguments
//! - `graph` / `resolve`: loading `BUILD.toml` packages and resolving closures
//! - `dispatch` / `executor`: routing a target set to the python builder
//! - `repl`: running an interactive JVM session with the run lock released
//! - `workunit`: the per-invocation report tree

pub mod address;
pub mod build;
pub mod config;
pub mod consts;
pub mod context;
pub mod dispatch;
pub mod executor;
pub mod graph;
pub mod jvm;
pub mod repl;
pub mod resolve;
pub mod run_lock;
pub mod spec;
pub mod target;
pub mod terminal;
pub mod workunit;
