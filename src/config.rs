//! Compiler options.
use std::{fmt, sync::Arc, time::Duration};
use crate::observe::{Observer, LogObserver, Quiet};
use crate::verify::VerificationLevel;

/// default cap on the number of inputs to any one gate
pub const MAX_FAN_OUT_SIZE:usize = 256;

/// how hard the optimizer works
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OptLevel {
  /// only the structural steps evaluation needs. the result computes the
  /// same functions as the listing, gate for gate.
  Raw,
  /// the cheap rewrites, run to a fixed point
  Fast,
  /// also distributive factoring and same-kind flattening
  Full }

#[derive(Clone)]
pub struct Options {
  pub max_fan_in: usize,
  pub verify: VerificationLevel,
  pub level: OptLevel,
  /// try to find control bases and split the network on them
  pub split_controls: bool,
  /// drop goals from split networks (goals come from a separate network)
  pub strip_goals: bool,
  /// wall clock for the statistical control search
  pub stats_budget: Duration,
  /// wall clock for split validation when no seed is given
  pub validate_budget: Duration,
  /// games per worker for seeded validation
  pub validate_games: usize,
  /// pin the random seed. validation becomes deterministic.
  pub seed: Option<u64>,
  /// validation threads. 0 means one per cpu.
  pub workers: usize,
  /// rollouts give up after this many moves
  pub max_depth: usize,
  pub observer: Arc<dyn Observer> }

impl Default for Options {
  fn default()->Self {
    Options {
      max_fan_in: MAX_FAN_OUT_SIZE,
      verify: VerificationLevel::Invariants,
      level: OptLevel::Fast,
      split_controls: true,
      strip_goals: true,
      stats_budget: Duration::from_secs(1),
      validate_budget: Duration::from_secs(1),
      validate_games: 100,
      seed: None,
      workers: 0,
      max_depth: 1000,
      observer: Arc::new(LogObserver) }}}

impl Options {

  /// full verification, a pinned seed, and small budgets.
  pub fn testing()->Self {
    Options {
      verify: VerificationLevel::Full,
      stats_budget: Duration::from_millis(200),
      validate_budget: Duration::from_millis(200),
      validate_games: 50,
      seed: Some(1234),
      workers: 2,
      ..Options::default() }}

  /// no verification and no split attempt.
  pub fn fast()->Self {
    Options {
      verify: VerificationLevel::None,
      split_controls: false,
      observer: Arc::new(Quiet),
      ..Options::default() }}

  pub fn with_level(mut self, level:OptLevel)->Self { self.level = level; self }
  pub fn with_fan_in(mut self, n:usize)->Self { self.max_fan_in = n; self }
  pub fn with_observer(mut self, o:Arc<dyn Observer>)->Self { self.observer = o; self }

  /// number of validation workers to actually spawn
  pub fn worker_count(&self)->usize {
    if self.workers == 0 { num_cpus::get() } else { self.workers }}}

impl fmt::Debug for Options {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    f.debug_struct("Options")
      .field("max_fan_in", &self.max_fan_in)
      .field("verify", &self.verify)
      .field("level", &self.level)
      .field("split_controls", &self.split_controls)
      .field("strip_goals", &self.strip_goals)
      .field("stats_budget", &self.stats_budget)
      .field("validate_budget", &self.validate_budget)
      .field("validate_games", &self.validate_games)
      .field("seed", &self.seed)
      .field("workers", &self.workers)
      .field("max_depth", &self.max_depth)
      .finish_non_exhaustive() }}


#[test] fn test_presets() {
  let o = Options::testing();
  assert_eq!(o.verify, VerificationLevel::Full);
  assert_eq!(o.seed, Some(1234));
  assert_eq!(o.max_fan_in, MAX_FAN_OUT_SIZE);
  let f = Options::fast().with_fan_in(4);
  assert_eq!(f.max_fan_in, 4);
  assert!(!f.split_controls);
  assert!(Options::default().worker_count() >= 1); }
