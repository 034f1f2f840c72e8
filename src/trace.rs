//! Abstract evaluation of the network, used to find the transitions that
//! move independently of what the players do.
//!
//! Bases evaluate to `Flow::Base` (known only at run time), inputs to true
//! or false depending on whether they are in the chosen move set. A strict
//! tracer refuses to look at inputs at all: tracing a transition strictly
//! succeeds exactly when no move can influence it.
use fxhash::FxHashMap;
use crate::comp::{Op, PropRole, CID};
use crate::net::{CidSet, Propnet};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Flow { False, True, Base }

impl Flow {
  fn of(b:bool)->Flow { if b { Flow::True } else { Flow::False }}}

/// a strict trace ran into an input proposition
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SeenInput(pub CID);

pub struct Tracer {
  /// inputs taken as true. the others are false.
  inputs: CidSet,
  strict: bool,
  memo: FxHashMap<CID, Flow>,
  /// bases met so far
  pub bases: CidSet }

impl Tracer {

  pub fn new(inputs:CidSet)->Self {
    Tracer{ inputs, strict:false, memo:FxHashMap::default(), bases:CidSet::default() }}

  /// a tracer that fails on the first input proposition it meets
  pub fn strict()->Self { Tracer{ strict:true, ..Tracer::new(CidSet::default()) }}

  /// abstract value of cid. components on a cycle read as `Flow::Base`.
  pub fn value(&mut self, net:&Propnet, cid:CID)->Result<Flow, SeenInput> {
    let mut visiting = CidSet::default();
    let mut stack = vec![(cid, false)];
    while let Some((c, expanded)) = stack.pop() {
      if self.memo.contains_key(&c) { continue }
      if !expanded {
        if !visiting.insert(c) { continue }
        stack.push((c, true));
        for &i in net.get(c).inputs.iter().rev() {
          if !self.memo.contains_key(&i) && !visiting.contains(&i) { stack.push((i, false)) }}
        continue }
      let v = self.eval(net, c)?;
      self.memo.insert(c, v); }
    Ok(self.memo.get(&cid).copied().unwrap_or(Flow::Base)) }

  fn input_value(&self, i:CID)->Flow { self.memo.get(&i).copied().unwrap_or(Flow::Base) }

  fn eval(&mut self, net:&Propnet, cid:CID)->Result<Flow, SeenInput> {
    let c = net.get(cid);
    let ins:Vec<Flow> = c.inputs.iter().map(|&i| self.input_value(i)).collect();
    Ok(match c.op() {
      Op::Or =>
        if ins.contains(&Flow::True) { Flow::True }
        else if ins.contains(&Flow::Base) { Flow::Base }
        else { Flow::False },
      Op::And =>
        if ins.contains(&Flow::False) { Flow::False }
        else if ins.contains(&Flow::Base) { Flow::Base }
        else { Flow::True },
      Op::Not => match ins.first() {
        Some(Flow::True) => Flow::False, Some(Flow::False) => Flow::True,
        Some(Flow::Base) => Flow::Base, None => Flow::of(c.value()) },
      Op::Trans | Op::Const => match ins.first() { Some(&f) => f, None => Flow::of(c.value()) },
      Op::Prop => match c.role() {
        Some(PropRole::Base) => { self.bases.insert(cid); Flow::Base }
        Some(PropRole::Input) => {
          if self.strict { return Err(SeenInput(cid)) }
          Flow::of(self.inputs.contains(&cid)) }
        _ => match ins.first() { Some(&f) => f, None => Flow::of(c.value()) }}})}}

/// transitions no move can influence
pub fn controls(net:&Propnet)->Vec<CID> {
  let mut res = vec![];
  for &t in &net.transitions {
    // a failed trace leaves partial results behind, so each one starts fresh
    let mut tr = Tracer::strict();
    if tr.value(net, t).is_ok() { res.push(t) }}
  res }

/// groups of bases that only feed each other: for each control transition
/// whose single input is a base, its own base depends on that base. chains
/// that run off the end are pruned, and what is left is merged into loops.
/// each loop is sorted, and so is the list of loops.
pub fn control_loops(net:&Propnet, controls:&[CID])->Vec<Vec<CID>> {
  let mut deps:FxHashMap<CID, CID> = FxHashMap::default();
  for &t in controls {
    let tc = net.get(t);
    let (i, b) = match (tc.inputs.as_slice(), tc.trans_base()) {
      ([i], Some(b)) => (*i, b),
      _ => continue };
    if net.is_role(i, PropRole::Base) { deps.insert(b, i); }}
  loop {
    let dead:Vec<CID> = deps.iter().filter(|(_, v)| !deps.contains_key(v)).map(|(&k, _)| k).collect();
    if dead.is_empty() { break }
    for k in dead { deps.remove(&k); }}

  // union-find over the surviving bases
  let mut parent:FxHashMap<CID, CID> = FxHashMap::default();
  fn find(parent:&mut FxHashMap<CID, CID>, x:CID)->CID {
    let mut r = x;
    while let Some(&p) = parent.get(&r) { if p == r { break } r = p }
    let mut y = x;
    while y != r { let p = parent[&y]; parent.insert(y, r); y = p }
    r }
  for (&k, &v) in &deps {
    parent.entry(k).or_insert(k); parent.entry(v).or_insert(v);
    let (rk, rv) = (find(&mut parent, k), find(&mut parent, v));
    if rk != rv { parent.insert(rk.max(rv), rk.min(rv)); }}
  let mut groups:FxHashMap<CID, Vec<CID>> = FxHashMap::default();
  let keys:Vec<CID> = parent.keys().copied().collect();
  for k in keys { let r = find(&mut parent, k); groups.entry(r).or_default().push(k) }
  let mut res:Vec<Vec<CID>> = groups.into_values().map(|mut g| { g.sort(); g }).collect();
  res.sort();
  res }


#[cfg(test)] fn find(net:&Propnet, xs:&[CID], gdl:&str)->usize {
  xs.iter().position(|&x| net.gdl_string(x).as_deref() == Some(gdl)).unwrap_or_else(|| panic!("no {}", gdl)) }

#[test] fn test_controls() {
  let net = crate::compile::compile(&crate::fixtures::tictactoe(), &crate::config::Options::testing()).unwrap();
  let cs = controls(&net);
  let mut names:Vec<String> = cs.iter().filter_map(|&t| net.get(t).trans_base()).filter_map(|b| net.gdl_string(b)).collect();
  names.sort();
  assert_eq!(names, vec!["(true (control oplayer))", "(true (control xplayer))"]);
  let loops = control_loops(&net, &cs);
  assert_eq!(loops.len(), 1);
  assert_eq!(loops[0].len(), 2); }

#[test] fn test_trace_inputs() {
  let net = crate::compile::compile(&crate::fixtures::tictactoe(), &crate::config::Options::testing()).unwrap();
  let t = net.transitions[find(&net, &net.bases, "(true (cell 2 2 b))")];
  let i = net.inputs[find(&net, &net.inputs, "(does xplayer (mark 2 2))")];
  assert_eq!(Tracer::new(CidSet::default()).value(&net, t), Ok(Flow::Base));
  let mut tr = Tracer::new([i].into_iter().collect());
  assert_eq!(tr.value(&net, t), Ok(Flow::False), "marking a cell clears it");
  assert!(!tr.bases.is_empty());
  assert!(matches!(Tracer::strict().value(&net, t), Err(SeenInput(_)))); }
