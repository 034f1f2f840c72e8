//! The propnet: an arena of components plus the index lists that give them
//! meaning (bases, inputs, transitions, per-role legals and goals...).
//!
//! Components are addressed by `CID`, which is simply an index into the
//! arena. Edges are stored on both ends: `o` is in `c.outputs` exactly when
//! `c` is in `o.inputs`. Removing a component leaves a hole, so ids are
//! never reused while a network lives.
use fxhash::FxHashSet;
use crate::comp::{Comp, Kind, Op, PropRole, CID};
use crate::error::CompileError;
use crate::observe::Summary;
use crate::sym::SymPool;

pub type CidSet = FxHashSet<CID>;

/// everything the network knows about one player
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RoleInfo {
  pub name: String,
  /// inputs and legals are paired index for index
  pub inputs: Vec<CID>,
  pub legals: Vec<CID>,
  pub goals: Vec<CID> }

#[derive(Clone, Debug, Default)]
pub struct Propnet {
  pub roles: Vec<String>,
  pub syms: SymPool,
  comps: Vec<Option<Comp>>,
  live: usize,
  /// base propositions, aligned with `transitions` and `initial_state`
  pub bases: Vec<CID>,
  pub inputs: Vec<CID>,
  pub transitions: Vec<CID>,
  pub role_infos: Vec<RoleInfo>,
  pub terminal: CID,
  /// only present until the initial state has been derived
  pub init: Option<CID>,
  pub initial_state: Vec<bool>,
  /// evaluation levels from the scheduler
  pub levels: Vec<Vec<CID>>,
  /// for split networks: the control base forced true
  pub fixed_base: Option<CID> }

impl Propnet {

  pub fn new(roles:Vec<String>, syms:SymPool)->Self {
    Propnet{ roles, syms, ..Default::default() }}

  // -- arena ----------------------------------------------------------------

  /// number of live components
  pub fn len(&self)->usize { self.live }
  pub fn is_empty(&self)->bool { self.live == 0 }

  /// one past the largest id ever allocated
  pub fn capacity(&self)->usize { self.comps.len() }

  pub fn contains(&self, cid:CID)->bool {
    matches!(self.comps.get(cid.ix()), Some(Some(_))) }

  pub fn try_get(&self, cid:CID)->Option<&Comp> {
    self.comps.get(cid.ix()).and_then(|c| c.as_ref()) }

  pub fn get(&self, cid:CID)->&Comp {
    self.try_get(cid).unwrap_or_else(|| panic!("no component {}", cid)) }

  pub fn get_mut(&mut self, cid:CID)->&mut Comp {
    self.comps.get_mut(cid.ix()).and_then(|c| c.as_mut())
      .unwrap_or_else(|| panic!("no component {}", cid)) }

  /// place a component at its own id. returns false if the slot was taken.
  pub fn insert(&mut self, c:Comp)->bool {
    let ix = c.cid.ix();
    if ix >= self.comps.len() { self.comps.resize_with(ix+1, || None) }
    if self.comps[ix].is_some() { return false }
    self.comps[ix] = Some(c); self.live += 1;
    true }

  /// allocate a fresh component with no edges
  pub fn add(&mut self, kind:Kind, count:i32)->CID {
    let cid = CID::from_ix(self.comps.len());
    self.comps.push(Some(Comp::new(cid, kind, count)));
    self.live += 1;
    cid }

  /// drop a component from the arena. edges are the caller's problem.
  pub fn remove(&mut self, cid:CID)->Option<Comp> {
    let res = self.comps.get_mut(cid.ix()).and_then(|c| c.take());
    if res.is_some() { self.live -= 1 }
    res }

  /// snapshot of the live ids, in ascending order
  pub fn cids(&self)->Vec<CID> { self.iter().map(|c| c.cid).collect() }

  pub fn iter(&self)->impl Iterator<Item=&Comp> { self.comps.iter().filter_map(|c| c.as_ref()) }

  pub fn iter_mut(&mut self)->impl Iterator<Item=&mut Comp> {
    self.comps.iter_mut().filter_map(|c| c.as_mut()) }

  pub fn op(&self, cid:CID)->Op { self.get(cid).op() }

  // -- edges ----------------------------------------------------------------

  /// add the edge src -> dst
  pub fn link(&mut self, src:CID, dst:CID) {
    self.get_mut(src).outputs.push(dst);
    self.get_mut(dst).inputs.push(src); }

  /// remove one copy of the edge src -> dst (from both ends)
  pub fn unlink(&mut self, src:CID, dst:CID) {
    remove_one(&mut self.get_mut(src).outputs, dst);
    remove_one(&mut self.get_mut(dst).inputs, src); }

  /// detach every input and output edge of c
  pub fn isolate(&mut self, cid:CID) {
    let c = self.get_mut(cid);
    let ins = std::mem::take(&mut c.inputs);
    let outs = std::mem::take(&mut c.outputs);
    for i in ins { if self.contains(i) { remove_one(&mut self.get_mut(i).outputs, cid); }}
    for o in outs { if self.contains(o) { remove_one(&mut self.get_mut(o).inputs, cid); }}}

  // -- roles and protection ---------------------------------------------------

  pub fn legals(&self)->impl Iterator<Item=CID> + '_ {
    self.role_infos.iter().flat_map(|ri| ri.legals.iter().copied()) }

  pub fn goals(&self)->impl Iterator<Item=CID> + '_ {
    self.role_infos.iter().flat_map(|ri| ri.goals.iter().copied()) }

  /// bases, inputs and the init proposition
  pub fn all_inbound(&self)->CidSet {
    let mut res:CidSet = self.bases.iter().chain(self.inputs.iter()).copied().collect();
    if let Some(i) = self.init { res.insert(i); }
    res }

  /// legals, goals, transitions and the terminal
  pub fn all_outbound(&self, with_goals:bool)->CidSet {
    let mut res:CidSet = self.legals().collect();
    if with_goals { res.extend(self.goals()) }
    res.extend(self.transitions.iter().copied());
    res.insert(self.terminal);
    res }

  /// the components dead code elimination must never remove
  pub fn protected(&self, with_goals:bool)->CidSet {
    let mut res = self.all_inbound();
    res.extend(self.all_outbound(with_goals));
    res }

  /// deep copy. ids are preserved, so role bindings carry over unchanged.
  pub fn dupe(&self)->Self { self.clone() }

  // -- diagnostics ------------------------------------------------------------

  pub fn kind_name(&self, cid:CID)->String {
    self.try_get(cid).map(|c| c.op().name().to_string()).unwrap_or_else(|| "missing".into()) }

  pub fn gdl_string(&self, cid:CID)->Option<String> {
    self.try_get(cid).and_then(|c| c.gdl()).map(|s| self.syms.show(s)) }

  pub fn structural(&self, cid:CID, msg:impl Into<String>)->CompileError {
    CompileError::Structural{ cid, kind:self.kind_name(cid), gdl:self.gdl_string(cid), msg:msg.into() }}

  pub fn invariant(&self, cid:CID, msg:impl Into<String>)->CompileError {
    CompileError::Invariant{ cid, kind:self.kind_name(cid), gdl:self.gdl_string(cid), msg:msg.into() }}

  /// the move of an input or legal, as text
  pub fn move_string(&self, cid:CID)->Option<String> {
    self.try_get(cid).and_then(|c| c.meta()).and_then(|m| m.mv).map(|s| self.syms.show(s)) }

  pub fn summary(&self)->Summary {
    let mut s = Summary::default();
    for c in self.iter() {
      match c.op() {
        Op::And => s.ands += 1, Op::Or => s.ors += 1, Op::Not => s.nots += 1,
        Op::Prop => s.props += 1, Op::Trans => s.transitions += 1, Op::Const => s.constants += 1 }
      s.edges += c.outputs.len() }
    s }

  /// render the network in graphviz *.dot format
  pub fn dot(&self, wr: &mut dyn std::fmt::Write) -> std::fmt::Result {
    writeln!(wr, "digraph propnet {{")?;
    writeln!(wr, "rankdir=LR;")?;
    for c in self.iter() {
      let label = match &c.kind {
        Kind::And => "∧".to_string(), Kind::Or => "∨".to_string(), Kind::Not => "¬".to_string(),
        Kind::Trans(_) => "T".to_string(), Kind::Const => format!("{}", c.count),
        Kind::Prop(m) => self.syms.show(m.gdl).replace('"', "'") };
      let shape = match c.op() { Op::Prop => "box", Op::Trans => "diamond", _ => "circle" };
      writeln!(wr, " \"{}\"[label=\"{}\",shape={}];", c.cid.0, label, shape)?;
      for o in &c.outputs { writeln!(wr, " \"{}\"->\"{}\";", c.cid.0, o.0)? }
      if let Some(b) = c.trans_base() { writeln!(wr, " \"{}\"->\"{}\"[style=dashed];", c.cid.0, b.0)? }}
    writeln!(wr, "}}") }

  pub fn to_dot(&self)->String {
    let mut s = String::new();
    // writing to a String can't fail
    let _ = self.dot(&mut s);
    s }

  // -- renumbering ------------------------------------------------------------

  /// give every component a new id: order[i] becomes CID(i). every live
  /// component must appear exactly once in order.
  pub fn renumber(&mut self, order:&[CID])->Result<(), CompileError> {
    let mut map = vec![None; self.comps.len()];
    for (i, &c) in order.iter().enumerate() {
      if !self.contains(c) || map[c.ix()].is_some() {
        return Err(self.invariant(c, "bad renumbering order")) }
      map[c.ix()] = Some(CID::from_ix(i)) }
    if order.len() != self.live {
      let missing = self.iter().find(|c| map[c.cid.ix()].is_none()).map(|c| c.cid).unwrap_or_default();
      return Err(self.invariant(missing, "component missing from renumbering order")) }
    let m = |c:CID| map[c.ix()].unwrap_or_else(|| panic!("dangling reference to {}", c));
    let mut arena:Vec<Option<Comp>> = Vec::with_capacity(order.len());
    for &old in order {
      let mut c = self.comps[old.ix()].take().unwrap_or_else(|| panic!("no component {}", old));
      c.cid = m(c.cid);
      c.inputs.iter_mut().for_each(|x| *x = m(*x));
      c.outputs.iter_mut().for_each(|x| *x = m(*x));
      match &mut c.kind {
        Kind::Trans(Some(b)) => *b = m(*b),
        Kind::Prop(meta) => {
          if let Some(x) = meta.legals_input.as_mut() { *x = m(*x) }
          if let Some(x) = meta.the_legal.as_mut() { *x = m(*x) }}
        _ => {}}
      arena.push(Some(c)) }
    self.comps = arena;
    let remap = |xs:&mut Vec<CID>| xs.iter_mut().for_each(|x| *x = m(*x));
    remap(&mut self.bases); remap(&mut self.inputs); remap(&mut self.transitions);
    for ri in self.role_infos.iter_mut() {
      remap(&mut ri.inputs); remap(&mut ri.legals); remap(&mut ri.goals) }
    for lvl in self.levels.iter_mut() { remap(lvl) }
    self.terminal = m(self.terminal);
    self.init = self.init.map(m);
    self.fixed_base = self.fixed_base.map(m);
    Ok(()) }

  /// role index for a role name
  pub fn role_ix(&self, name:&str)->Option<usize> { self.roles.iter().position(|r| r == name) }

  pub fn is_role(&self, cid:CID, r:PropRole)->bool {
    self.try_get(cid).is_some_and(|c| c.has_role(r)) }}

/// remove the first occurrence of x from xs. true if one was found.
pub fn remove_one(xs:&mut Vec<CID>, x:CID)->bool {
  match xs.iter().position(|&y| y == x) {
    Some(i) => { xs.remove(i); true }
    None => false }}

/// replace the first occurrence of old with new. true if one was found.
pub fn replace_one(xs:&mut [CID], old:CID, new:CID)->bool {
  match xs.iter().position(|&y| y == old) {
    Some(i) => { xs[i] = new; true }
    None => false }}


#[test] fn test_arena() {
  let mut n = Propnet::new(vec![], SymPool::new());
  let a = n.add(Kind::Or, 0);
  let b = n.add(Kind::And, 0);
  let c = n.add(Kind::Not, 0);
  n.link(a, b); n.link(a, c); n.link(b, c);
  assert_eq!(n.get(a).outputs, vec![b, c]);
  assert_eq!(n.get(c).inputs, vec![a, b]);
  n.unlink(a, c);
  assert_eq!(n.get(c).inputs, vec![b]);
  n.isolate(b);
  assert!(n.get(a).outputs.is_empty());
  assert!(n.get(c).inputs.is_empty());
  n.remove(b);
  assert_eq!(n.len(), 2);
  assert!(!n.contains(b));
  assert_eq!(n.add(Kind::Or, 0), CID(3), "ids are not reused"); }

#[test] fn test_renumber() {
  let mut n = Propnet::new(vec![], SymPool::new());
  let a = n.add(Kind::Or, 0);
  let b = n.add(Kind::And, 0);
  n.link(a, b);
  n.renumber(&[b, a]).unwrap();
  assert_eq!(n.op(CID(0)), Op::And);
  assert_eq!(n.get(CID(1)).outputs, vec![CID(0)]);
  assert!(n.renumber(&[CID(0)]).is_err()); }

#[test] fn test_dot() {
  let mut n = Propnet::new(vec![], SymPool::new());
  let a = n.add(Kind::Or, 0);
  let b = n.add(Kind::Not, 0);
  n.link(a, b);
  let s = n.to_dot();
  assert!(s.starts_with("digraph propnet {"));
  assert!(s.contains("\"0\"->\"1\";")); }
