//! Topological scheduling.
//!
//! Level 0 holds the free inputs of the network (bases, inputs, init and
//! constants). Every gate goes one level past the latest of its inputs.
//! Transitions and legals are sinks the runtime reads, so they go last,
//! followed by any goals that never got scheduled.
//!
//! If gates remain that can never have all their inputs scheduled, they sit
//! on a cycle. Those are forced into a single shared level. This is not
//! sound for cyclic logic in general; it is what the residual loops seen in
//! practice need, and it is reported through the observer every time.
use fxhash::FxHashSet;
use crate::comp::{Op, PropRole, CID};
use crate::error::CompileError;
use crate::net::{CidSet, Propnet};
use crate::observe::{Observer, Warning};

pub fn topological_ordering(net:&mut Propnet, obs:&dyn Observer)->Result<(), CompileError> {
  let mut levels:Vec<Vec<CID>> = vec![];
  let mut left:CidSet = net.cids().into_iter().collect();
  let mut seen = CidSet::default();

  let mut first:Vec<CID> = net.bases.iter().chain(net.inputs.iter()).copied().collect();
  first.extend(net.init);
  first.extend(net.iter().filter(|c| c.op() == Op::Const).map(|c| c.cid));
  first.sort(); first.dedup();
  let mut candidates:Vec<CID> = vec![];
  for &c in &first {
    if !net.get(c).inputs.is_empty() { return Err(net.invariant(c, "network input has inputs")) }
    seen.insert(c); left.remove(&c);
    candidates.extend(net.get(c).outputs.iter().copied()) }
  levels.push(first);

  let legals:CidSet = net.legals().collect();
  let transitions:CidSet = net.transitions.iter().copied().collect();

  while !candidates.is_empty() {
    let todo = std::mem::take(&mut candidates);
    let mut queued = FxHashSet::default();
    let mut level = vec![];
    let mut in_level = CidSet::default();
    for c in todo {
      if seen.contains(&c) || legals.contains(&c) || transitions.contains(&c) { continue }
      if in_level.contains(&c) { continue }
      if net.get(c).inputs.iter().all(|i| seen.contains(i)) {
        level.push(c); in_level.insert(c);
        candidates.extend(net.get(c).outputs.iter().copied()) }
      else if queued.insert(c) { candidates.push(c) }}
    if level.is_empty() {
      let mut forced:Vec<CID> = candidates.iter().copied().filter(|&c| net.get(c).is_gate()).collect();
      forced.sort(); forced.dedup();
      if forced.is_empty() { break }
      obs.on_warning(&Warning::ForcedCycle{ level:levels.len(), size:forced.len() });
      for &c in &forced {
        candidates.extend(net.get(c).outputs.iter().copied().filter(|o| !seen.contains(o))) }
      level = forced }
    level.sort();
    for &c in &level { seen.insert(c); left.remove(&c); }
    levels.push(level) }

  let mut tl:Vec<CID> = net.transitions.clone();
  tl.sort();
  let mut ll:Vec<CID> = legals.iter().copied().collect();
  ll.sort();
  for c in tl.iter().chain(ll.iter()) { left.remove(c); }
  levels.push(tl);
  levels.push(ll);

  let mut goals:Vec<CID> = left.iter().copied().filter(|&c| net.is_role(c, PropRole::Goal)).collect();
  if !goals.is_empty() {
    goals.sort();
    for g in &goals { left.remove(g); }
    levels.push(goals) }

  // whatever is left must be an input-less leftover, which is never
  // evaluated and keeps whatever count it has.
  let mut left:Vec<CID> = left.into_iter().collect();
  left.sort();
  for c in left {
    if !net.get(c).inputs.is_empty() {
      return Err(CompileError::Schedule{ cid:c, kind:net.kind_name(c), gdl:net.gdl_string(c) }) }}

  for c in net.iter_mut() { c.topo = 0 }
  for (e, lvl) in levels.iter().enumerate() {
    for &c in lvl { net.get_mut(c).topo = e as u32 }}
  net.levels = levels;
  Ok(()) }

/// number of levels
pub fn topological_size(net:&Propnet)->usize { net.levels.len() }


#[test] fn test_levels() {
  let net = crate::compile::compile(&crate::fixtures::tictactoe(), &crate::config::Options::testing()).unwrap();
  assert_eq!(topological_size(&net), net.levels.len());
  let last_gate = net.iter().filter(|c| c.is_gate()).map(|c| c.topo).max().unwrap_or(0);
  for c in net.iter() {
    if c.is_gate() {
      for &i in &c.inputs { assert!(net.get(i).topo < c.topo, "{} feeds {} on the same level", i, c.cid) }}}
  for &t in &net.transitions { assert!(net.get(t).topo > last_gate) }
  for l in net.legals() { assert!(net.get(l).topo > last_gate) }
  for &b in &net.bases { assert_eq!(net.get(b).topo, 0) }}

#[test] fn test_forced_cycle() {
  use crate::comp::Kind;
  let mut b = crate::fixtures::ListingBuilder::new(&["r"]);
  let a = b.base("a");
  b.next(a, a);
  let x = b.or(&[a]);
  let y = b.and(&[x]);
  b.link(y, x);
  b.prop(PropRole::Terminal, "terminal", &[y]);
  let mut net = crate::builder::build(&b.finish(), &crate::observe::Quiet).unwrap();
  crate::opt::unlink_transitions(&mut net).unwrap();
  let obs = crate::observe::Collect::new();
  topological_ordering(&mut net, &obs).unwrap();
  assert!(obs.warnings().iter().any(|w| matches!(w, Warning::ForcedCycle{ size:1, .. })));
  let (x, y) = (CID(x), CID(y));
  assert!(matches!(net.get(x).kind, Kind::Or));
  assert!(net.get(x).topo > 0, "the cycle still gets a level");
  assert!(net.get(y).topo > net.get(x).topo); }
