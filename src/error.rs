//! Errors raised while compiling or playing a network.
use thiserror::Error;
use crate::comp::CID;

/// Everything that can stop compilation of a game.
///
/// Only `SplitRejected` and `NoControl` are recoverable: the compile driver
/// logs them and falls back to the unsplit network. Everything else is
/// deterministic given the same listing and is reported once per game.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CompileError {
  #[error("malformed listing: {0}")]
  Listing(String),

  #[error("structural error at component {cid} ({kind}{}): {msg}", show_gdl(.gdl))]
  Structural { cid: CID, kind: String, gdl: Option<String>, msg: String },

  #[error("network has no terminal proposition")]
  NoTerminal,

  #[error("invariant violated at component {cid} ({kind}{}): {msg}", show_gdl(.gdl))]
  Invariant { cid: CID, kind: String, gdl: Option<String>, msg: String },

  #[error("count mismatch at component {cid} ({kind}): stored {stored}, recomputed {computed}")]
  CountMismatch { cid: CID, kind: String, stored: i32, computed: i32 },

  #[error("unschedulable component {cid} ({kind}{})", show_gdl(.gdl))]
  Schedule { cid: CID, kind: String, gdl: Option<String> },

  #[error("no control bases found")]
  NoControl,

  #[error("control split rejected: {0}")]
  SplitRejected(String) }

impl CompileError {
  /// true for the errors the compile driver is allowed to recover from.
  pub fn is_recoverable(&self)->bool {
    matches!(self, CompileError::SplitRejected(_) | CompileError::NoControl) }}

fn show_gdl(gdl:&Option<String>)->String {
  match gdl { Some(g) => format!(" {}", g), None => String::new() }}

/// Errors raised by a state machine during play.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PlayError {
  #[error("no control network is active for the current state")]
  NoActiveNetwork,

  #[error("more than one control network is active: {0:?}")]
  AmbiguousNetwork(Vec<CID>),

  #[error("role {role} has no legal move {mv}")]
  UnknownMove { role: usize, mv: String },

  #[error("state has {got} bases but the network has {expected}")]
  StateSize { expected: usize, got: usize },

  #[error("networks diverged at depth {depth}: {what}")]
  Divergence { depth: usize, what: String } }

impl From<PlayError> for CompileError {
  fn from(e:PlayError)->Self { CompileError::SplitRejected(e.to_string()) }}


#[test] fn test_messages() {
  let e = CompileError::Structural {
    cid: CID(7), kind: "Proposition".into(), gdl: Some("(true x)".into()), msg: "two inputs".into() };
  assert_eq!(e.to_string(), "structural error at component #7 (Proposition (true x)): two inputs");
  assert!(!e.is_recoverable());
  let e:CompileError = PlayError::Divergence{ depth: 3, what: "terminal".into() }.into();
  assert!(e.is_recoverable()); }
