//! Invariant checks for a compiled network.
use crate::comp::{Op, PropRole};
use crate::error::CompileError;
use crate::eval::{back_propagate, sinks};
use crate::net::Propnet;

/// how much checking the compiler does between stages
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum VerificationLevel {
  None,
  /// structural invariants only
  Invariants,
  /// structural invariants plus a from-scratch recount of every sink
  Full }

/// check the network at the given level. `max_fan_in` of 0 skips the fan-in check.
pub fn verify(net:&mut Propnet, level:VerificationLevel, max_fan_in:usize)->Result<(), CompileError> {
  if level == VerificationLevel::None { return Ok(()) }
  check_invariants(net, max_fan_in)?;
  if level == VerificationLevel::Full { let sk = sinks(net); back_propagate(net, &sk, true)? }
  Ok(()) }

pub fn check_invariants(net:&Propnet, max_fan_in:usize)->Result<(), CompileError> {
  for c in net.iter() {
    for &o in &c.outputs {
      if !net.contains(o) { return Err(net.invariant(c.cid, format!("output {} is gone", o))) }
      if !net.get(o).inputs.contains(&c.cid) {
        return Err(net.invariant(c.cid, format!("output {} does not list it as an input", o))) }}
    for &i in &c.inputs {
      if !net.contains(i) { return Err(net.invariant(c.cid, format!("input {} is gone", i))) }
      if !net.get(i).outputs.contains(&c.cid) {
        return Err(net.invariant(c.cid, format!("input {} does not list it as an output", i))) }}
    if c.is_gate() && (c.count < 0 || c.count > c.inputs.len() as i32) {
      return Err(net.invariant(c.cid, format!("count {} outside [0, {}]", c.count, c.inputs.len()))) }
    if c.op() == Op::And && (c.req_true != c.inputs.len() as i32 || c.req_false != c.req_true - 1) {
      return Err(net.invariant(c.cid, "AND thresholds do not match its fan-in")) }
    if c.op() == Op::Not && c.inputs.len() > 1 { return Err(net.invariant(c.cid, "NOT with several inputs")) }
    if max_fan_in > 0 && c.inputs.len() > max_fan_in {
      return Err(net.invariant(c.cid, format!("fan-in {} over the cap of {}", c.inputs.len(), max_fan_in))) }}

  if net.bases.len() != net.transitions.len() {
    return Err(net.invariant(net.terminal, "bases and transitions are not aligned")) }
  for (&b, &t) in net.bases.iter().zip(net.transitions.iter()) {
    if !net.contains(b) { return Err(net.invariant(b, "base proposition is gone")) }
    if !net.contains(t) { return Err(net.invariant(t, "transition is gone")) }
    if net.get(b).inputs.len() > 1 { return Err(net.invariant(b, "base with more than one input")) }
    if net.get(t).inputs.len() > 1 { return Err(net.invariant(t, "transition with more than one input")) }
    if net.get(t).trans_base() != Some(b) { return Err(net.invariant(t, "transition does not point at its base")) }}
  for &i in &net.inputs {
    if !net.contains(i) { return Err(net.invariant(i, "input proposition is gone")) }}
  if !net.is_role(net.terminal, PropRole::Terminal) { return Err(CompileError::NoTerminal) }
  for ri in &net.role_infos {
    if !ri.legals.is_empty() && ri.legals.len() != ri.inputs.len() {
      return Err(net.invariant(ri.legals[0], format!("role {} has {} legals but {} inputs",
                                                    ri.name, ri.legals.len(), ri.inputs.len()))) }
    for (&l, &i) in ri.legals.iter().zip(ri.inputs.iter()) {
      let lc = match net.try_get(l) { Some(lc) => lc, None => return Err(net.invariant(l, "legal is gone")) };
      if !lc.outputs.is_empty() { return Err(net.invariant(l, "legal with outputs")) }
      if lc.meta().and_then(|m| m.legals_input) != Some(i) {
        return Err(net.invariant(l, "legal is not paired with its input")) }}}
  Ok(()) }


#[test] fn test_broken_threshold() {
  let mut net = crate::compile::compile(&crate::fixtures::tictactoe(), &crate::config::Options::fast()).unwrap();
  assert!(verify(&mut net, VerificationLevel::Full, 256).is_ok());
  let and = net.iter().find(|c| c.op() == Op::And).map(|c| c.cid).unwrap();
  net.get_mut(and).req_true += 1;
  assert!(matches!(check_invariants(&net, 256), Err(CompileError::Invariant{..}))); }

#[test] fn test_count_mismatch() {
  let mut net = crate::compile::compile(&crate::fixtures::tictactoe(), &crate::config::Options::fast()).unwrap();
  let or = net.iter().find(|c| c.op() == Op::Or && !c.inputs.is_empty()).map(|c| c.cid).unwrap();
  let c = net.get_mut(or);
  c.count = if c.count == 0 { 1 } else { 0 };
  assert!(verify(&mut net, VerificationLevel::Invariants, 256).is_ok(), "counts are not checked");
  assert!(matches!(verify(&mut net, VerificationLevel::Full, 256), Err(CompileError::CountMismatch{..}))); }

#[test] fn test_fan_in_cap() {
  let mut net = crate::compile::compile(&crate::fixtures::tictactoe(), &crate::config::Options::fast()).unwrap();
  assert!(check_invariants(&net, 2).is_err());
  assert!(verify(&mut net, VerificationLevel::None, 2).is_ok()); }
