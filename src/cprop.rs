//! Constant propagation.
//!
//! Once a component is known to be stuck at one value, fold that knowledge
//! into everything downstream: an AND losing a true input just needs one
//! fewer true input, an AND losing a false input is itself false, and OR is
//! the dual. Gates that become constant are deleted. Propositions and
//! transitions stay (the network still needs them) but lose their inputs.
//!
//! A legal that becomes permanently false drags its input proposition down
//! with it, so impossible moves vanish from the network entirely.
use std::collections::VecDeque;
use crate::comp::{Op, PropRole, CID};
use crate::error::CompileError;
use crate::eval::Forward;
use crate::net::{remove_one, Propnet};
use crate::observe::{Observer, Warning};

#[derive(Default)]
pub struct ConstProp {
  fwd: Forward,
  legals: VecDeque<CID>,
  /// number of components folded so far
  pub total: usize }

impl ConstProp {

  pub fn new()->Self { Self::default() }

  /// force cid (which must have no inputs) to value and fold it away.
  /// counts must already be consistent with the rest of the network.
  pub fn constant_propagate(&mut self, net:&mut Propnet, cid:CID, value:bool, obs:&dyn Observer)
    ->Result<(), CompileError> {
    let c = net.get(cid);
    if !c.inputs.is_empty() { return Err(net.invariant(cid, "constant propagation of a component with inputs")) }
    match c.op() {
      Op::Prop | Op::Const | Op::Trans => self.fwd.propagate(net, cid, value),
      _ => if c.value() != value {
        return Err(net.invariant(cid, "gate forced to a value it does not have")) }}
    self.fold(net, cid, value)?;

    while let Some(legal) = self.legals.pop_front() {
      let lc = net.get(legal);
      if lc.value() {
        let gdl = net.gdl_string(legal).unwrap_or_default();
        obs.on_warning(&Warning::PermanentLegal{ cid:legal, gdl });
        continue }
      let input = match lc.meta().and_then(|m| m.legals_input) {
        Some(i) if net.contains(i) && net.get(i).inputs.is_empty() => i,
        _ => continue };
      self.fwd.propagate(net, input, false);
      self.fold(net, input, false)? }
    Ok(()) }

  fn fold(&mut self, net:&mut Propnet, cid:CID, value:bool)->Result<(), CompileError> {
    let mut work = vec![(cid, value)];
    while let Some((c, v)) = work.pop() {
      let outputs = match net.op(c) {
        Op::Prop | Op::Trans => std::mem::take(&mut net.get_mut(c).outputs),
        _ => net.remove(c).map(|x| x.outputs).unwrap_or_default() };
      self.total += 1;
      for &o in outputs.iter().rev() {
        // an earlier fold may already have cut o loose from c
        if !net.contains(o) || !remove_one(&mut net.get_mut(o).inputs, c) { continue }
        match net.op(o) {
          Op::Or => {
            if v { drop_inputs(net, o); work.push((o, true)) }
            else if net.get(o).inputs.is_empty() { work.push((o, false)) }}
          Op::And => {
            if v {
              let oc = net.get_mut(o);
              oc.count -= 1; oc.req_true -= 1; oc.req_false -= 1;
              if oc.inputs.is_empty() { work.push((o, true)) }}
            else { drop_inputs(net, o); work.push((o, false)) }}
          Op::Not => work.push((o, !v)),
          Op::Trans => {}
          Op::Prop => {
            if net.is_role(o, PropRole::Legal) { self.legals.push_back(o) }
            if !net.get(o).outputs.is_empty() { work.push((o, v)) }}
          Op::Const => return Err(net.invariant(o, "constant with an input")) }}}
    Ok(()) }}

/// cut every input edge of o
fn drop_inputs(net:&mut Propnet, o:CID) {
  let ins = std::mem::take(&mut net.get_mut(o).inputs);
  for i in ins { if net.contains(i) { remove_one(&mut net.get_mut(i).outputs, o); }}}


#[test] fn test_dead_legal_takes_input() {
  let mut net = crate::builder::build(&crate::fixtures::simple_game(), &crate::observe::Quiet).unwrap();
  crate::opt::unlink_transitions(&mut net).unwrap();
  crate::compile::initial_state(&mut net).unwrap();
  let mut cp = ConstProp::new();
  let o1 = net.bases[0];
  cp.constant_propagate(&mut net, o1, false, &crate::observe::Quiet).unwrap();
  // o1 itself plus the three inputs whose legals died with it
  assert_eq!(cp.total, 4);
  assert!(net.get(net.transitions[1]).inputs.is_empty());
  assert!(net.get(net.transitions[2]).inputs.is_empty());
  assert!(net.legals().all(|l| net.get(l).inputs.is_empty() && !net.get(l).value())); }

#[test] fn test_const_and() {
  let net = crate::compile::compile(&crate::fixtures::const_and(), &crate::config::Options::testing()).unwrap();
  assert_eq!(net.summary().constants, 0);
  let and = net.get(net.terminal).inputs[0];
  let c = net.get(and);
  assert_eq!(c.op(), Op::And);
  assert_eq!((c.inputs.len(), c.req_true, c.req_false), (2, 2, 1)); }

#[test] fn test_gate_with_inputs() {
  let mut net = crate::builder::build(&crate::fixtures::simple_game(), &crate::observe::Quiet).unwrap();
  let t = net.terminal;
  assert!(ConstProp::new().constant_propagate(&mut net, t, false, &crate::observe::Quiet).is_err()); }

#[test] fn test_permanent_legal() {
  use crate::sm::{Machine, StateMachine, Strategy};
  let obs = std::sync::Arc::new(crate::observe::Collect::new());
  let opts = crate::config::Options::testing().with_observer(obs.clone());
  let net = crate::compile::compile(&crate::fixtures::always_legal(), &opts).unwrap();
  assert!(obs.warnings().iter().any(|w| matches!(w, Warning::PermanentLegal{ gdl, .. } if gdl == "(legal solo wait)")));
  let ri = &net.role_infos[0];
  assert_eq!((ri.legals.len(), ri.inputs.len()), (1, 1));
  let (l, i) = (ri.legals[0], ri.inputs[0]);
  assert!(net.get(l).inputs.is_empty() && net.get(l).value());
  // the input survives, still paired and still driving its transition
  assert_eq!(net.get(i).meta().and_then(|m| m.the_legal), Some(l));
  assert_eq!(net.get(i).outputs.len(), 1);
  let mut sm = StateMachine::new(&net, Strategy::DepthFirst);
  let wait = sm.find_move(0, "wait").unwrap();
  let next = sm.next_state(&[wait]).unwrap();
  sm.update_bases(&next).unwrap();
  assert!(sm.is_terminal());
  assert_eq!(sm.goal_value(0), Some(100)); }
