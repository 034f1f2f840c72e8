//! Diagnostics hooks for the compiler.
//!
//! The compile pipeline reports what it does through an `Observer`. The
//! default `LogObserver` just forwards everything to the `log` crate.
use std::fmt;
use std::sync::Mutex;
use crate::comp::CID;

/// component counts for one stage of compilation
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Summary {
  pub ands: usize,
  pub ors: usize,
  pub nots: usize,
  pub props: usize,
  pub transitions: usize,
  pub constants: usize,
  pub edges: usize }

impl Summary {
  pub fn total(&self)->usize {
    self.ands + self.ors + self.nots + self.props + self.transitions + self.constants }}

impl fmt::Display for Summary {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "comps:{} and:{} or:{} not:{} prop:{} trans:{} const:{} edges:{}",
           self.total(), self.ands, self.ors, self.nots, self.props,
           self.transitions, self.constants, self.edges) }}

/// things worth telling someone about, but not worth stopping for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Warning {
  SyntheticInit,
  OrphanLegal { cid: CID, gdl: String },
  PermanentLegal { cid: CID, gdl: String },
  ForcedCycle { level: usize, size: usize },
  SplitFallback { reason: String } }

impl fmt::Display for Warning {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      Warning::SyntheticInit => write!(f, "no init proposition; synthesized one"),
      Warning::OrphanLegal{cid, gdl} => write!(f, "legal {} {} has no matching input", cid, gdl),
      Warning::PermanentLegal{cid, gdl} => write!(f, "legal {} {} is always true", cid, gdl),
      Warning::ForcedCycle{level, size} =>
        write!(f, "forced {} cyclic components into level {}", size, level),
      Warning::SplitFallback{reason} => write!(f, "control split abandoned: {}", reason) }}}

pub trait Observer: Send + Sync {
  /// an optimizer pass finished with this many rewrites
  fn on_pass(&self, _pass:&str, _rewrites:usize) {}
  /// a pipeline stage finished
  fn on_stage(&self, _stage:&str, _summary:&Summary) {}
  fn on_warning(&self, _w:&Warning) {}}

/// forwards all events to the `log` crate
#[derive(Clone, Copy, Debug, Default)]
pub struct LogObserver;

impl Observer for LogObserver {
  fn on_pass(&self, pass:&str, rewrites:usize) {
    if rewrites > 0 { trace!("{}: {} rewrites", pass, rewrites) }}
  fn on_stage(&self, stage:&str, summary:&Summary) { debug!("{}: {}", stage, summary) }
  fn on_warning(&self, w:&Warning) { warn!("{}", w) }}

/// ignores everything
#[derive(Clone, Copy, Debug, Default)]
pub struct Quiet;
impl Observer for Quiet {}

/// keeps every warning and stage name, for inspection afterwards
#[derive(Debug, Default)]
pub struct Collect {
  warnings: Mutex<Vec<Warning>>,
  stages: Mutex<Vec<String>> }

impl Collect {
  pub fn new()->Self { Self::default() }
  pub fn warnings(&self)->Vec<Warning> { self.warnings.lock().map(|w| w.clone()).unwrap_or_default() }
  pub fn stages(&self)->Vec<String> { self.stages.lock().map(|s| s.clone()).unwrap_or_default() }}

impl Observer for Collect {
  fn on_stage(&self, stage:&str, _summary:&Summary) {
    if let Ok(mut s) = self.stages.lock() { s.push(stage.to_string()) }}
  fn on_warning(&self, w:&Warning) {
    if let Ok(mut ws) = self.warnings.lock() { ws.push(w.clone()) }}}


#[test] fn test_collect() {
  let c = Collect::new();
  c.on_warning(&Warning::ForcedCycle{ level:3, size:2 });
  c.on_stage("build", &Summary::default());
  assert_eq!(c.warnings(), vec![Warning::ForcedCycle{ level:3, size:2 }]);
  assert_eq!(c.stages(), vec!["build".to_string()]);
  assert_eq!(Warning::ForcedCycle{ level:3, size:2 }.to_string(), "forced 2 cyclic components into level 3"); }
