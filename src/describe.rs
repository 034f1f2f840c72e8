//! Canonical ordering and the flat description of a compiled network.
//!
//! The runtime that loads a description indexes everything by position, so
//! the components are renumbered first: bases, then each role's inputs,
//! gates level by level, terminal, goals, transitions, and each role's
//! legals. Inputs and legals of a role end up as two contiguous runs, paired
//! index for index.
use crate::comp::{Op, CID};
use crate::error::CompileError;
use crate::net::{CidSet, Propnet};
use crate::sym::{Sym, SymPool, Term};
use crate::verify::{verify, VerificationLevel};

pub const DESCRIPTION_FORMAT:&str = "propnet-0.01";

/// terminates each component's run in the output table, and marks a role
/// with no legals or goals
pub const SENTINEL:i64 = -1;

/// atoms group by their own name, compound terms by their head
fn group_key(syms:&SymPool, s:Sym)->String {
  match syms.get(s) {
    Term::Func(xs) => xs.first().map(|&h| syms.show(h)).unwrap_or_default(),
    _ => syms.show(s) }}

/// sort by (group of the chosen part of the term, whole term), descending
fn sort_by_term(net:&Propnet, cids:&mut [CID], part:usize) {
  let key = |c:CID| {
    let gdl = net.get(c).gdl();
    let g = gdl.and_then(|g| net.syms.nth(g, part)).map(|p| group_key(&net.syms, p)).unwrap_or_default();
    (g, gdl.map(|g| net.syms.show(g)).unwrap_or_default()) };
  cids.sort_by_cached_key(|&c| key(c));
  cids.reverse() }

/// canonical base order. transitions and the initial state follow their bases.
pub fn reorder_base_propositions(net:&mut Propnet) {
  let mut order:Vec<usize> = (0..net.bases.len()).collect();
  let mut bases = net.bases.clone();
  sort_by_term(net, &mut bases, 1);
  let pos = |b:CID, net:&Propnet| net.bases.iter().position(|&x| x == b).unwrap_or_else(|| panic!("lost base {}", b));
  for (k, &b) in bases.iter().enumerate() { order[k] = pos(b, net) }
  net.transitions = order.iter().map(|&i| net.transitions[i]).collect();
  net.initial_state = order.iter().map(|&i| net.initial_state.get(i).copied().unwrap_or(false)).collect();
  net.bases = bases }

/// canonical legal order per role, by move. inputs follow their legals.
pub fn reorder_legals(net:&mut Propnet) {
  let mut all_inputs = vec![];
  for r in 0..net.role_infos.len() {
    let mut legals = net.role_infos[r].legals.clone();
    sort_by_term(net, &mut legals, 2);
    let inputs:Vec<CID> = legals.iter()
      .map(|&l| net.get(l).meta().and_then(|m| m.legals_input).unwrap_or_else(|| panic!("unpaired legal {}", l)))
      .collect();
    all_inputs.extend(inputs.iter().copied());
    let ri = &mut net.role_infos[r];
    ri.legals = legals; ri.inputs = inputs }
  // inputs of roles with no legals keep their place
  let placed:CidSet = all_inputs.iter().copied().collect();
  all_inputs.extend(net.inputs.iter().copied().filter(|i| !placed.contains(i)));
  net.inputs = all_inputs }

/// renumber the components into the canonical layout.
pub fn reorder_components(net:&mut Propnet)->Result<(), CompileError> {
  let mut order = Vec::with_capacity(net.len());
  let mut seen = CidSet::default();
  let mut put = |c:CID, order:&mut Vec<CID>| { if seen.insert(c) { order.push(c) }};
  for &b in &net.bases { put(b, &mut order) }
  for ri in &net.role_infos { for &i in &ri.inputs { put(i, &mut order) }}
  for &i in &net.inputs { put(i, &mut order) }
  for lvl in &net.levels {
    for &c in lvl { if net.get(c).is_gate() { put(c, &mut order) }}}
  put(net.terminal, &mut order);
  for ri in &net.role_infos { for &g in &ri.goals { put(g, &mut order) }}
  for &t in &net.transitions { put(t, &mut order) }
  for ri in &net.role_infos { for &l in &ri.legals { put(l, &mut order) }}
  for c in net.cids() { put(c, &mut order) }
  net.renumber(&order) }

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreateParams {
  pub roles: usize,
  pub bases: usize,
  pub transitions: usize,
  pub components: usize,
  /// length of the output table, sentinels included
  pub outputs: usize,
  pub topological_size: usize }

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoleRecord {
  pub index: usize,
  pub name: String,
  pub input_start: i64,
  pub legal_start: i64,
  pub goal_start: i64,
  pub moves: usize,
  pub goals: usize }

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompRecord {
  pub id: u32,
  pub req_false: i32,
  pub req_true: i32,
  pub output_start: usize,
  pub outputs: usize,
  pub count: i32,
  pub incr: i32,
  pub topo: u32 }

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MetaRecord {
  pub id: u32,
  pub kind: &'static str,
  pub gdl: String,
  pub mv: String,
  pub goal: i64 }

/// everything a runtime needs to rebuild the network as flat tables
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Description {
  pub params: CreateParams,
  pub roles: Vec<RoleRecord>,
  pub components: Vec<CompRecord>,
  pub outputs: Vec<i64>,
  pub meta: Vec<MetaRecord>,
  pub initial_state: Vec<bool>,
  /// number of AND/OR/NOT gates
  pub control_flows: usize,
  pub terminal: u32 }

/// canonicalize the network in place and describe it.
pub fn describe(net:&mut Propnet, level:VerificationLevel, max_fan_in:usize)->Result<Description, CompileError> {
  reorder_components(net)?;
  verify(net, level, max_fan_in)?;
  Description::new(net) }

impl Description {

  /// describe a network whose ids are already contiguous
  pub fn new(net:&Propnet)->Result<Self, CompileError> {
    if net.capacity() != net.len() { return Err(net.invariant(CID::from_ix(net.len()), "component ids have gaps")) }
    let first = |xs:&[CID]| xs.first().map(|c| c.0 as i64).unwrap_or(SENTINEL);
    let roles = net.role_infos.iter().enumerate().map(|(index, ri)| RoleRecord {
      index, name: ri.name.clone(),
      input_start: first(&ri.inputs), legal_start: first(&ri.legals), goal_start: first(&ri.goals),
      moves: ri.inputs.len(), goals: ri.goals.len() }).collect();

    let mut components = Vec::with_capacity(net.len());
    let mut outputs = vec![];
    let mut meta = Vec::with_capacity(net.len());
    for c in net.iter() {
      let mut outs = c.outputs.clone(); outs.sort();
      components.push(CompRecord {
        id: c.cid.0, req_false: c.req_false, req_true: c.req_true,
        output_start: outputs.len(), outputs: outs.len(),
        count: c.count, incr: c.incr, topo: c.topo });
      outputs.extend(outs.iter().map(|o| o.0 as i64));
      outputs.push(SENTINEL);
      let show = |s:Option<Sym>| s.map(|s| net.syms.show(s)).unwrap_or_default();
      let (gdl, mv, goal) = match c.op() {
        Op::Prop => {
          let m = c.meta();
          (show(c.gdl()), show(m.and_then(|m| m.mv)), m.and_then(|m| m.goal).map(|g| g as i64).unwrap_or(SENTINEL)) }
        Op::Trans => (show(c.trans_base().and_then(|b| net.get(b).gdl())), String::new(), SENTINEL),
        _ => (String::new(), String::new(), SENTINEL) };
      meta.push(MetaRecord{ id:c.cid.0, kind:c.op().name(), gdl, mv, goal }) }

    let params = CreateParams {
      roles: net.role_infos.len(), bases: net.bases.len(), transitions: net.transitions.len(),
      components: net.len(), outputs: outputs.len(), topological_size: net.levels.len() };
    Ok(Description {
      params, roles, components, outputs, meta,
      initial_state: net.initial_state.clone(),
      control_flows: net.iter().filter(|c| c.is_gate()).count(),
      terminal: net.terminal.0 }) }

  pub fn to_json(&self)->json::JsonValue {
    let p = &self.params;
    let mut roles = json::JsonValue::new_array();
    for r in &self.roles {
      let _ = roles.push(json::object!{
        "index": r.index, "name": r.name.as_str(), "input_start": r.input_start,
        "legal_start": r.legal_start, "goal_start": r.goal_start,
        "moves": r.moves, "goals": r.goals }); }
    let mut comps = json::JsonValue::new_array();
    for c in &self.components {
      let _ = comps.push(json::array![c.id, c.req_false, c.req_true, c.output_start, c.outputs,
                                      c.count, c.incr, c.topo]); }
    let mut meta = json::JsonValue::new_array();
    for m in &self.meta {
      let _ = meta.push(json::array![m.id, m.kind, m.gdl.as_str(), m.mv.as_str(), m.goal]); }
    json::object!{
      "format": DESCRIPTION_FORMAT,
      "create": json::object!{
        "roles": p.roles, "bases": p.bases, "transitions": p.transitions,
        "components": p.components, "outputs": p.outputs, "topological_size": p.topological_size },
      "roles": roles,
      "components": comps,
      "outputs": self.outputs.clone(),
      "meta": meta,
      "initial_state": self.initial_state.iter().map(|&b| b as u8).collect::<Vec<u8>>(),
      "control_flows": self.control_flows,
      "terminal": self.terminal }}

  /// the ground terms of the bases set in the initial state
  pub fn initial_terms(&self)->Vec<&str> {
    self.initial_state.iter().enumerate().filter(|(_, &b)| b)
      .map(|(i, _)| self.meta[i].gdl.as_str()).collect() }}


#[test] fn test_describe_simple() {
  let mut net = crate::compile::compile(&crate::fixtures::simple_game(), &crate::config::Options::testing()).unwrap();
  let d = describe(&mut net, VerificationLevel::Full, 256).unwrap();
  assert_eq!(d.params.components, 18);
  assert_eq!(d.components.len(), 18);
  assert_eq!(d.params.bases, 3);
  assert_eq!(d.control_flows, 1);
  assert_eq!(d.outputs.len(), d.params.outputs);
  assert_eq!(d.outputs.iter().filter(|&&x| x == SENTINEL).count(), 18);
  assert_eq!(d.initial_terms(), vec!["(true o1)"]);
  for m in &d.meta[0..3] { assert!(m.gdl.starts_with("(true ")) }
  assert_eq!(d.meta[d.terminal as usize].gdl, "terminal");
  let white = &d.roles[0];
  assert_eq!((white.name.as_str(), white.moves, white.goals), ("white", 2, 2));
  // inputs and legals line up index for index
  for k in 0..white.moves {
    let (i, l) = ((white.input_start as usize) + k, (white.legal_start as usize) + k);
    assert_eq!(d.meta[i].mv, d.meta[l].mv) }
  for m in &d.meta {
    if m.kind == "Transition" { assert!(m.gdl.starts_with("(true "), "a transition is named after its base") }}}

#[test] fn test_description_json() {
  let mut net = crate::compile::compile(&crate::fixtures::simple_game(), &crate::config::Options::testing()).unwrap();
  let d = describe(&mut net, VerificationLevel::Invariants, 256).unwrap();
  let j = d.to_json();
  assert_eq!(j["format"].as_str(), Some(DESCRIPTION_FORMAT));
  assert_eq!(j["create"]["components"].as_usize(), Some(18));
  assert_eq!(j["roles"][1]["name"].as_str(), Some("black"));
  assert_eq!(j["components"].len(), 18);
  assert_eq!(j["initial_state"].len(), 3); }

#[test] fn test_missing_role_parts() {
  let opts = crate::config::Options::testing();
  let net = crate::compile::compile(&crate::fixtures::simple_game(), &opts).unwrap();
  let mut g = crate::compile::goals_only(&net, &opts).unwrap();
  let d = describe(&mut g, VerificationLevel::Full, 256).unwrap();
  for r in &d.roles {
    assert_eq!((r.moves, r.legal_start, r.input_start), (0, SENTINEL, SENTINEL), "{} has no moves left", r.name);
    assert!(r.goal_start != SENTINEL) }
  assert_eq!(g.inputs.len(), 0);
  assert_eq!(d.params.bases, 3, "states from the full network still fit"); }

#[test] fn test_gaps() {
  let mut net = crate::compile::compile(&crate::fixtures::simple_game(), &crate::config::Options::testing()).unwrap();
  let extra = net.add(crate::comp::Kind::Or, 0);
  net.remove(extra);
  assert!(Description::new(&net).is_err()); }
