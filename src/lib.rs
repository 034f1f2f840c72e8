//! A crate for compiling general game playing rules into propositional networks.
//!
//! The input is a listing of components produced by a rule-to-circuit front
//! end. The compiler links it into a network, folds constants, optimizes,
//! schedules, verifies, and emits a flat description a runtime can load.
//! It can also split the network on control bases, and play games on the
//! result to check that nothing changed along the way.

#![allow(clippy::many_single_char_names)]

#[macro_use] extern crate log;
extern crate simplelog;

/// Interned ground terms.
pub mod sym;
/// Components (the nodes of a network).
pub mod comp;
/// Raw component listings.
pub mod listing;
/// The network itself: an arena of components plus role indices.
pub mod net;
pub use net::Propnet;

/// Build a network from a listing.
pub mod builder;
/// Optimizer passes.
pub mod opt;
/// Constant propagation.
pub mod cprop;
/// Topological scheduling.
pub mod topo;
/// Count-based evaluation.
pub mod eval;
/// Invariant checks.
pub mod verify;

/// Bit vectors of base propositions.
pub mod state;
/// Playing games on compiled networks.
pub mod sm;
/// Random playouts and split validation.
pub mod rollout;
/// Abstract evaluation, for finding control bases.
pub mod trace;
/// Control base discovery and network splitting.
pub mod controls;
/// Canonical ordering and the flat description.
pub mod describe;
/// The compile pipeline and the per-game cache.
pub mod compile;
pub use compile::{compile, Artifact, Build, Cache};

pub mod config;
pub use config::{OptLevel, Options};
pub mod error;
pub use error::{CompileError, PlayError};
pub mod observe;

/// Hand-built listings for tests and benchmarks.
pub mod fixtures;
