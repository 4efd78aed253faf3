//! # cfe-io: Persistence for matching runs
//!
//! Two artifact families:
//!
//! - the **iteration trace** of a hourly-matching run, written as CSV with
//!   one column per fixed-point iteration and one row per snapshot
//!   ([`write_trace_csv`]), named `cfe<score>.csv` per run
//! - the **network document**, a self-describing JSON flattening of the
//!   component tables ([`export_network`] / [`import_network`]) that
//!   round-trips capacities exactly and dispatch to serialization
//!   precision

pub mod network;
pub mod trace;

pub use network::{export_network, import_network};
pub use trace::{trace_file_name, write_trace_csv};
