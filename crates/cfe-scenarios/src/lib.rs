//! # cfe-scenarios: Run-set configuration
//!
//! Named matching runs loaded from YAML or JSON, resolved against a
//! defaults block and validated before anything touches a network. A run
//! names the parent buses that get a consumer system, the carve-out
//! fraction, the technology palette, and the matching targets.

pub mod spec;

pub use spec::{
    load_run_set, resolve_runs, MatchingMode, ResolvedRun, RunDefaults, RunSet, RunSpec,
};
