//! Count-based evaluators.
//!
//! * `Forward` pushes a single flip downstream depth first, only recursing
//!   through gates whose count crosses a threshold.
//! * `Levels` does the same work, batched by topological level.
//! * `back_propagate` recomputes counts from scratch. It derives the initial
//!   state and cross-checks the incremental evaluators.
//!
//! All three use explicit work lists, so stack use does not depend on how
//! deep the circuit is.
use fxhash::{FxHashMap, FxHashSet};
use crate::comp::{Op, CID, UNSET};
use crate::error::CompileError;
use crate::net::Propnet;

/// activity recorded for one flipped component
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PropStats {
  /// how many times it flipped
  pub flips: u64,
  /// gates visited because of its flips
  pub visits: u64,
  /// output edges touched because of its flips
  pub fanning: u64 }

#[derive(Clone, Debug, Default)]
pub struct Forward {
  stack: Vec<(CID, i32)>,
  stats: Option<FxHashMap<CID, PropStats>> }

impl Forward {

  pub fn new()->Self { Self::default() }

  /// a propagator that also records per-component activity
  pub fn with_stats()->Self { Forward{ stack:vec![], stats:Some(FxHashMap::default()) }}

  pub fn stats(&self)->Option<&FxHashMap<CID, PropStats>> { self.stats.as_ref() }

  /// set a leaf component (proposition or constant) and push the change downstream.
  pub fn propagate(&mut self, net:&mut Propnet, cid:CID, value:bool) {
    let v = value as i32;
    let c = net.get_mut(cid);
    if c.count == v { return }
    c.count = v;
    let (visits, fanning) = self.forward(net, cid, if value { 1 } else { -1 });
    if let Some(s) = self.stats.as_mut() {
      let e = s.entry(cid).or_default();
      e.flips += 1; e.visits += visits; e.fanning += fanning }}

  /// add incr to the count of every output of cid, and keep going through
  /// every output whose truth value flipped. returns (visits, fanning).
  pub fn forward(&mut self, net:&mut Propnet, cid:CID, incr:i32)->(u64, u64) {
    let (mut visits, mut fanning) = (0, 0);
    self.stack.push((cid, incr));
    while let Some((c, incr)) = self.stack.pop() {
      visits += 1;
      let n = net.get(c).outputs.len();
      for k in 0..n {
        let o = net.get(c).outputs[k];
        fanning += 1;
        let oc = net.get_mut(o);
        oc.count += incr;
        let crossed = if incr > 0 { oc.count == oc.req_true } else { oc.count == oc.req_false };
        if crossed && !oc.outputs.is_empty() { self.stack.push((o, incr * oc.incr)) }}}
    (visits, fanning) }}

/// forward propagation batched by topological level: every delta queued for
/// a level is applied before moving on to the next one.
#[derive(Clone, Debug, Default)]
pub struct Levels { pending: Vec<Vec<(CID, i32)>> }

impl Levels {

  pub fn new(net:&Propnet)->Self { Levels{ pending: vec![vec![]; net.levels.len().max(1)] }}

  /// queue a new value for a leaf component. nothing moves until `run`.
  pub fn set(&mut self, net:&Propnet, cid:CID, value:bool) {
    let c = net.get(cid);
    let delta = value as i32 - c.count;
    if delta != 0 { self.queue(c.topo as usize, cid, delta) }}

  fn queue(&mut self, lvl:usize, cid:CID, delta:i32) {
    if lvl >= self.pending.len() { self.pending.resize_with(lvl+1, Vec::new) }
    self.pending[lvl].push((cid, delta)) }

  /// apply every queued delta, level by level.
  pub fn run(&mut self, net:&mut Propnet) {
    let mut lvl = 0;
    while lvl < self.pending.len() {
      let mut i = 0;
      while i < self.pending[lvl].len() {
        let (cid, delta) = self.pending[lvl][i]; i += 1;
        let c = net.get_mut(cid);
        c.count += delta;
        let crossed = if delta > 0 { c.count == c.req_true } else { c.count == c.req_false };
        if !crossed { continue }
        let out_delta = delta * c.incr;
        let n = c.outputs.len();
        for k in 0..n {
          let o = net.get(cid).outputs[k];
          // cyclic remnants share a level, so never queue backwards
          let olvl = (net.get(o).topo as usize).max(lvl);
          self.queue(olvl, o, out_delta) }}
      self.pending[lvl].clear();
      lvl += 1 }}}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark { Visiting, Done }

/// recompute the count of every component upstream of the roots.
/// in compare mode, a recomputed count that differs from the stored one
/// is an error (the incremental evaluator went wrong somewhere).
pub fn back_propagate(net:&mut Propnet, roots:&[CID], compare:bool)->Result<(), CompileError> {
  let mut marks:FxHashMap<CID, Mark> = FxHashMap::default();
  let mut stack:Vec<(CID, bool)> = roots.iter().rev().map(|&r| (r, false)).collect();
  while let Some((cid, expanded)) = stack.pop() {
    if !expanded {
      if marks.contains_key(&cid) { continue }
      marks.insert(cid, Mark::Visiting);
      stack.push((cid, true));
      for &i in net.get(cid).inputs.iter().rev() {
        if !marks.contains_key(&i) { stack.push((i, false)) }}
      continue }
    let count = recount(net, cid, &marks)?;
    let c = net.get_mut(cid);
    if compare && c.count != count {
      let kind = c.op().name().to_string();
      return Err(CompileError::CountMismatch{ cid, kind, stored:c.count, computed:count }) }
    c.count = count;
    marks.insert(cid, Mark::Done); }
  Ok(()) }

/// count for one component, given that its inputs are up to date.
fn recount(net:&Propnet, cid:CID, marks:&FxHashMap<CID, Mark>)->Result<i32, CompileError> {
  let c = net.get(cid);
  let value = |i:CID|->Result<bool, CompileError> {
    let ic = net.get(i);
    if marks.get(&i) == Some(&Mark::Visiting) && ic.count == UNSET {
      return Err(net.invariant(i, "cycle through a component with no count")) }
    Ok(ic.value()) };
  let leaf = || if c.count == UNSET { Err(net.invariant(cid, "leaf component has no count")) } else { Ok(c.count) };
  match c.op() {
    Op::Prop => match c.inputs.as_slice() {
      [] => leaf(),
      [i] if net.op(*i) == Op::Trans => leaf(),
      [i] => Ok(value(*i)? as i32),
      _ => Err(net.invariant(cid, "proposition with more than one input")) },
    Op::And | Op::Or => {
      let mut n = 0;
      for &i in &c.inputs { if value(i)? { n += 1 }}
      Ok(n) }
    Op::Not => match c.inputs.as_slice() {
      [] => leaf(),
      [i] => Ok(value(*i)? as i32),
      _ => Err(net.invariant(cid, "NOT with more than one input")) },
    Op::Trans => match c.inputs.as_slice() {
      [] => leaf(),
      [i] => Ok(value(*i)? as i32),
      _ => Err(net.invariant(cid, "transition with more than one input")) },
    Op::Const => leaf() }}

/// the sinks of the network: everything with inputs but no outputs.
pub fn sinks(net:&Propnet)->Vec<CID> {
  net.iter().filter(|c| c.outputs.is_empty() && !c.inputs.is_empty()).map(|c| c.cid).collect() }

/// network inputs (bases, inputs, constants...) upstream of cid.
pub fn dependencies(net:&Propnet, cid:CID)->Vec<CID> {
  let mut seen = FxHashSet::default();
  let mut stack = vec![cid];
  let mut res = vec![];
  while let Some(c) = stack.pop() {
    if !seen.insert(c) { continue }
    let comp = net.get(c);
    if comp.inputs.is_empty() { res.push(c) }
    stack.extend(comp.inputs.iter().copied()) }
  res.sort();
  res }


#[test] fn test_forward_matches_recount() {
  let mut net = crate::compile::compile(&crate::fixtures::tictactoe(), &crate::config::Options::fast()).unwrap();
  let bases = net.bases.clone();
  let mut fwd = Forward::new();
  for &b in bases.iter().step_by(2) { fwd.propagate(&mut net, b, true) }
  let sk = sinks(&net);
  back_propagate(&mut net, &sk, true).unwrap();
  for &b in bases.iter().step_by(3) { fwd.propagate(&mut net, b, false) }
  let sk = sinks(&net);
  back_propagate(&mut net, &sk, true).unwrap(); }

#[test] fn test_levels_match_forward() {
  let net = crate::compile::compile(&crate::fixtures::tictactoe(), &crate::config::Options::fast()).unwrap();
  let (mut a, mut b) = (net.dupe(), net.dupe());
  let mut fwd = Forward::new();
  let mut lv = Levels::new(&b);
  for (k, &x) in net.bases.iter().enumerate() {
    let v = k % 3 != 1;
    fwd.propagate(&mut a, x, v);
    lv.set(&b, x, v) }
  lv.run(&mut b);
  for c in a.iter() { assert_eq!(c.count, b.get(c.cid).count, "count of {} differs", c.cid) }}

#[test] fn test_stats() {
  let mut net = crate::compile::compile(&crate::fixtures::simple_game(), &crate::config::Options::fast()).unwrap();
  let mut fwd = Forward::with_stats();
  let b = net.bases[0];
  fwd.propagate(&mut net, b, true);
  fwd.propagate(&mut net, b, true);
  let s = fwd.stats().and_then(|s| s.get(&b)).copied().unwrap_or_default();
  assert_eq!(s.flips, 1, "setting a value it already has is not a flip");
  assert!(s.visits >= 1); }

#[test] fn test_dependencies() {
  let net = crate::compile::compile(&crate::fixtures::simple_game(), &crate::config::Options::fast()).unwrap();
  let mut deps:Vec<String> = dependencies(&net, net.terminal).into_iter().filter_map(|c| net.gdl_string(c)).collect();
  deps.sort();
  assert_eq!(deps, vec!["(true o2)", "(true o3)"]); }
