//! Optimizer passes.
//!
//! Each pass rewrites the live graph in place and returns how many rewrites
//! it made. `optimize` runs the passes until none of them fires. Every
//! rewrite preserves the function computed at each protected component, and
//! keeps counts consistent where they already were.
use fxhash::FxHashMap;
use crate::comp::{Kind, Op, CID, UNSET};
use crate::error::CompileError;
use crate::net::{remove_one, replace_one, CidSet, Propnet};
use crate::observe::Observer;

/// which passes `optimize` runs
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Mode {
  /// a single sweep instead of a fixed point
  pub once: bool,
  /// distributive factoring and same-kind flattening
  pub all_features: bool }

impl Mode {
  pub fn once()->Self { Mode{ once:true, all_features:false }}
  pub fn fixed()->Self { Mode{ once:false, all_features:false }}
  pub fn all()->Self { Mode{ once:false, all_features:true }}}

pub fn optimize(net:&mut Propnet, mode:Mode, obs:&dyn Observer)->usize {
  let mut grand = 0;
  macro_rules! pass {
    ($total:ident, $name:expr, $e:expr) => {{ let n = $e; obs.on_pass($name, n); $total += n; }}}
  loop {
    let mut total = 0;
    let keep = net.protected(true);
    pass!(total, "unlink_deadends", unlink_deadends(net, &keep));
    pass!(total, "subexpr_elimination", subexpr_elimination(net));
    if mode.all_features {
      pass!(total, "and_over_or", x_over_y(net, Op::And, Op::Or));
      pass!(total, "or_over_and", x_over_y(net, Op::Or, Op::And));
      pass!(total, "or_over_or", x_over_y(net, Op::Or, Op::Or));
      pass!(total, "and_over_and", x_over_y(net, Op::And, Op::And));
      pass!(total, "subexpr_elimination", subexpr_elimination(net)); }
    pass!(total, "unlink_passthrough", unlink_passthrough(net, &[Op::And, Op::Or, Op::Prop], &keep));
    pass!(total, "sanitize_outputs", sanitize_outputs(net));
    if mode.all_features {
      pass!(total, "double_negation", double_negation(net));
      pass!(total, "flatten_and", flatten(net, Op::And));
      pass!(total, "flatten_or", flatten(net, Op::Or)); }
    grand += total;
    if mode.once || total == 0 { break }}
  fixup_requires(net);
  grand }

/// AND thresholds follow the fan-in.
pub fn fixup_requires(net:&mut Propnet) { net.iter_mut().for_each(|c| c.fixup_requires()) }

/// recompute the thresholds and count of a gate from its inputs.
fn refresh(net:&mut Propnet, cid:CID) {
  let n = net.get(cid).inputs.iter().filter(|&&i| net.get(i).value()).count() as i32;
  let c = net.get_mut(cid);
  c.fixup_requires();
  if c.is_gate() { c.count = n }}

/// remove the edge src -> dst, keeping dst's count in step.
fn drop_edge(net:&mut Propnet, src:CID, dst:CID) {
  let on = net.get(src).value();
  net.unlink(src, dst);
  let d = net.get_mut(dst);
  if on && d.count != UNSET && d.count > 0 && d.is_gate() { d.count -= 1 }}

/// repeatedly delete unprotected components with no outputs.
pub fn unlink_deadends(net:&mut Propnet, keep:&CidSet)->usize {
  let mut total = 0;
  let mut dead:Vec<CID> = net.iter().filter(|c| c.outputs.is_empty()).map(|c| c.cid).collect();
  while let Some(c) = dead.pop() {
    if keep.contains(&c) || !net.contains(c) || net.op(c) == Op::Const { continue }
    if !net.get(c).outputs.is_empty() { continue }
    let ins = net.remove(c).map(|x| x.inputs).unwrap_or_default();
    for i in ins {
      if !net.contains(i) { continue }
      let ic = net.get_mut(i);
      remove_one(&mut ic.outputs, c);
      if ic.outputs.is_empty() { dead.push(i) }}
    total += 1 }
  total }

/// merge gates of the same kind with the same set of inputs.
pub fn subexpr_elimination(net:&mut Propnet)->usize {
  let mut total = 0;
  let mut seen:FxHashMap<(Op, Vec<CID>), CID> = FxHashMap::default();
  for cid in net.cids() {
    let c = match net.try_get(cid) { Some(c) => c, None => continue };
    if !c.is_gate() || c.inputs.is_empty() { continue }
    let mut key = c.inputs.clone(); key.sort();
    let key = (c.op(), key);
    let existing = match seen.get(&key) {
      Some(&e) if net.contains(e) => e,
      _ => { seen.insert(key, cid); continue }};
    let outs = c.outputs.clone();
    // an output fed by both keeps a single edge
    for &o in &outs {
      if net.get(existing).outputs.contains(&o) { drop_edge(net, existing, o) }}
    let ins = net.get(cid).inputs.clone();
    for i in ins { remove_one(&mut net.get_mut(i).outputs, cid); }
    for o in outs {
      replace_one(&mut net.get_mut(o).inputs, cid, existing);
      net.get_mut(existing).outputs.push(o) }
    net.remove(cid);
    total += 1 }
  total }

/// splice out gates and plain propositions with a single input.
pub fn unlink_passthrough(net:&mut Propnet, ops:&[Op], keep:&CidSet)->usize {
  let mut total = 0;
  for cid in net.cids() {
    let c = match net.try_get(cid) { Some(c) => c, None => continue };
    if !ops.contains(&c.op()) || keep.contains(&cid) { continue }
    if c.inputs.len() != 1 || c.outputs.is_empty() { continue }
    let the_input = c.inputs[0];
    if c.outputs.contains(&the_input) || the_input == cid { continue }
    let outs = c.outputs.clone();
    for o in outs {
      let io = &mut net.get_mut(the_input).outputs;
      if !replace_one(io, cid, o) { io.push(o) }
      replace_one(&mut net.get_mut(o).inputs, cid, the_input); }
    net.remove(cid);
    total += 1 }
  total }

/// collapse repeated edges between the same pair of components.
pub fn sanitize_outputs(net:&mut Propnet)->usize {
  let mut total = 0;
  for cid in net.cids() {
    let outs = net.get(cid).outputs.clone();
    let mut uniq = outs.clone(); uniq.sort(); uniq.dedup();
    if uniq.len() == outs.len() { continue }
    let mut seen = CidSet::default();
    for o in outs {
      if !seen.insert(o) { drop_edge(net, cid, o); total += 1 }}}
  if total > 0 {
    for c in net.cids() { if net.get(c).op() == Op::And { refresh(net, c) }}}
  total }

/// distributive factoring. when every input of a Y gate is an X gate whose
/// only output is that Y gate, pull the inputs all the X gates share out
/// into a new X gate above the Y gate:
///
///   or(and(a,b), and(a,c))  =>  and(a, or(and(b), and(c)))
pub fn x_over_y(net:&mut Propnet, x:Op, y:Op)->usize {
  let xk = match Kind::gate(x) { Some(k) => k, None => return 0 };
  let mut total = 0;
  for cid in net.cids() {
    let c = match net.try_get(cid) { Some(c) if c.op() == y => c, _ => continue };
    let xs:Vec<CID> = c.inputs.iter().copied()
      .filter(|&i| { let ic = net.get(i); ic.op() == x && ic.outputs.len() == 1 }).collect();
    if xs.len() < 2 || xs.len() != c.inputs.len() { continue }
    let mut common = net.get(xs[0]).inputs.clone();
    common.sort(); common.dedup();
    for &a in &xs[1..] {
      let ins = &net.get(a).inputs;
      common.retain(|i| ins.contains(i)) }
    if common.is_empty() { continue }
    if common.iter().any(|&k| k == cid || c.inputs.contains(&k) || c.outputs.contains(&k)) { continue }
    // factoring must not leave an X gate with nothing to compute
    if xs.iter().any(|&a| net.get(a).inputs.iter().all(|i| common.contains(i))) { continue }

    for &k in &common { for &a in &xs { net.unlink(k, a) }}
    let outs = std::mem::take(&mut net.get_mut(cid).outputs);
    let g = net.add(xk.clone(), UNSET);
    for &k in &common { net.link(k, g) }
    net.link(cid, g);
    for o in outs {
      replace_one(&mut net.get_mut(o).inputs, cid, g);
      net.get_mut(g).outputs.push(o) }
    for &a in &xs { refresh(net, a) }
    refresh(net, cid);
    refresh(net, g);
    total += 1 }
  total }

/// not(not(x)) feeding o becomes x feeding o.
pub fn double_negation(net:&mut Propnet)->usize {
  let mut total = 0;
  for cid in net.cids() {
    let c = match net.try_get(cid) { Some(c) if c.op() == Op::Not => c, _ => continue };
    if c.outputs.is_empty() || c.inputs.len() != 1 { continue }
    let inner = c.inputs[0];
    let ic = net.get(inner);
    if ic.op() != Op::Not || ic.inputs.len() != 1 { continue }
    let x = ic.inputs[0];
    if x == cid || c.outputs.contains(&x) { continue }
    let outs = c.outputs.clone();
    net.isolate(cid);
    for o in outs { net.link(x, o) }
    net.remove(cid);
    total += 1 }
  total }

/// a gate whose outputs are all gates of the same kind merges into them:
///
///   and(and(a,b), c)  =>  and(a, b, c)
pub fn flatten(net:&mut Propnet, op:Op)->usize {
  let mut total = 0;
  for cid in net.cids() {
    let c = match net.try_get(cid) { Some(c) if c.op() == op => c, _ => continue };
    if c.outputs.is_empty() || c.inputs.is_empty() { continue }
    if !c.outputs.iter().all(|&o| net.op(o) == op) { continue }
    if c.outputs.iter().any(|o| *o == cid || c.inputs.contains(o)) { continue }
    let mut ins = c.inputs.clone(); ins.sort(); ins.dedup();
    let mut outs = c.outputs.clone(); outs.sort(); outs.dedup();
    net.isolate(cid);
    net.remove(cid);
    for &o in &outs {
      for &i in &ins { if !net.get(o).inputs.contains(&i) { net.link(i, o) }}
      refresh(net, o) }
    total += 1 }
  total }

/// split gates with more than `max` inputs into a tree of same-kind gates.
pub fn breakup_large_inputs(net:&mut Propnet, max:usize)->Result<usize, CompileError> {
  let max = max.max(2);
  let mut total = 0;
  loop {
    let big:Vec<CID> = net.iter().filter(|c| c.inputs.len() > max).map(|c| c.cid).collect();
    if big.is_empty() { break }
    for cid in big {
      let kind = match Kind::gate(net.op(cid)) {
        Some(k @ (Kind::And | Kind::Or)) => k,
        _ => return Err(net.invariant(cid, "too many inputs")) };
      let old = std::mem::take(&mut net.get_mut(cid).inputs);
      for chunk in old.chunks(max) {
        let g = net.add(kind.clone(), UNSET);
        for &i in chunk {
          replace_one(&mut net.get_mut(i).outputs, cid, g);
          net.get_mut(g).inputs.push(i) }
        net.link(g, cid);
        refresh(net, g);
        total += 1 }
      refresh(net, cid) }}
  Ok(total) }

/// legals must be sinks: a legal with outputs hands them to a new OR that
/// sits between the legal and its input.
pub fn ensure_legal_endpoints(net:&mut Propnet)->Result<usize, CompileError> {
  let mut total = 0;
  let legals:Vec<CID> = net.legals().collect();
  for l in legals {
    if net.get(l).outputs.is_empty() { continue }
    let the_input = match net.get(l).inputs.as_slice() {
      [i] => *i,
      _ => return Err(net.structural(l, "legal with outputs must have exactly one input")) };
    let g = net.add(Kind::Or, UNSET);
    replace_one(&mut net.get_mut(the_input).outputs, l, g);
    let outs = std::mem::take(&mut net.get_mut(l).outputs);
    for &o in &outs { replace_one(&mut net.get_mut(o).inputs, l, g); }
    let gc = net.get_mut(g);
    gc.inputs = vec![the_input];
    gc.outputs = std::iter::once(l).chain(outs).collect();
    net.get_mut(l).inputs = vec![g];
    refresh(net, g);
    total += 1 }
  Ok(total) }

/// cut each transition from its base. the transition remembers the base,
/// and nothing inside one turn evaluates through it any more.
pub fn unlink_transitions(net:&mut Propnet)->Result<(), CompileError> {
  for k in 0..net.transitions.len() {
    let t = net.transitions[k];
    let b = net.bases[k];
    if net.get(t).outputs != [b] || net.get(b).inputs != [t] {
      return Err(net.structural(t, "transition should feed exactly its base")) }
    net.get_mut(t).outputs.clear();
    net.get_mut(b).inputs.clear();
    net.get_mut(t).kind = Kind::Trans(Some(b)) }
  Ok(()) }

/// drop bases nobody reads whose transitions are constant.
pub fn remove_useless_bases(net:&mut Propnet)->usize {
  let mut keep_b = vec![]; let mut keep_t = vec![]; let mut keep_s = vec![];
  let mut total = 0;
  for k in 0..net.bases.len() {
    let (b, t) = (net.bases[k], net.transitions[k]);
    if net.get(b).outputs.is_empty() && net.get(t).inputs.is_empty() {
      net.remove(b); net.remove(t);
      total += 1 }
    else {
      keep_b.push(b); keep_t.push(t);
      keep_s.push(net.initial_state.get(k).copied().unwrap_or(false)) }}
  if total > 0 {
    net.bases = keep_b; net.transitions = keep_t; net.initial_state = keep_s }
  total }

/// gates left with no inputs at all
pub fn danglers(net:&Propnet)->Vec<CID> {
  net.iter().filter(|c| c.is_gate() && c.inputs.is_empty()).map(|c| c.cid).collect() }


#[cfg(test)] fn tiny(f:impl FnOnce(&mut crate::fixtures::ListingBuilder, u32)->u32)->Propnet {
  let mut b = crate::fixtures::ListingBuilder::new(&["r"]);
  let a = b.base("a");
  b.next(a, a);
  let t = f(&mut b, a);
  b.prop(crate::comp::PropRole::Terminal, "terminal", &[t]);
  let mut net = crate::builder::build(&b.finish(), &crate::observe::Quiet).unwrap();
  unlink_transitions(&mut net).unwrap();
  net }

#[test] fn test_passthrough() {
  let mut net = tiny(|b, a| b.prop(crate::comp::PropRole::Other, "p", &[a]));
  let keep = net.protected(true);
  assert_eq!(unlink_passthrough(&mut net, &[Op::Prop], &keep), 1);
  assert_eq!(net.get(net.terminal).inputs, vec![net.bases[0]]); }

#[test] fn test_subexpr() {
  let mut net = tiny(|b, a| {
    let c = b.base("c");
    b.next(c, c);
    let x = b.and(&[a, c]);
    let y = b.and(&[c, a]);
    b.or(&[x, y]) });
  assert_eq!(subexpr_elimination(&mut net), 1);
  let or = net.get(net.terminal).inputs[0];
  assert_eq!(net.get(or).inputs.len(), 1, "the merged AND feeds the OR once");
  assert_eq!(net.summary().ands, 1); }

#[test] fn test_deadends() {
  let mut net = tiny(|b, a| { b.not(a); b.or(&[a]) });
  let keep = net.protected(true);
  assert_eq!(unlink_deadends(&mut net, &keep), 1);
  assert_eq!(net.summary().nots, 0); }

#[test] fn test_breakup() {
  let mut net = tiny(|b, a| {
    let mut xs = vec![a];
    for k in 0..4 { let x = b.base(&format!("x{}", k)); b.next(x, x); xs.push(x) }
    b.or(&xs) });
  assert!(breakup_large_inputs(&mut net, 2).unwrap() > 0);
  assert!(net.iter().all(|c| c.inputs.len() <= 2));
  // the top OR still sees all five bases
  let or = net.get(net.terminal).inputs[0];
  let mut deps = crate::eval::dependencies(&net, or);
  deps.sort();
  let mut bases = net.bases.clone();
  bases.sort();
  assert_eq!(deps, bases); }

#[test] fn test_legal_endpoints() {
  let mut b = crate::fixtures::ListingBuilder::new(&["r"]);
  let a = b.base("a");
  b.next(a, a);
  let l = b.legal("r", "go", a);
  b.input("r", "go");
  b.prop(crate::comp::PropRole::Terminal, "terminal", &[l]);
  let mut net = crate::builder::build(&b.finish(), &crate::observe::Quiet).unwrap();
  assert_eq!(ensure_legal_endpoints(&mut net).unwrap(), 1);
  let l = net.role_infos[0].legals[0];
  assert!(net.get(l).outputs.is_empty());
  let g = net.get(l).inputs[0];
  assert_eq!(net.op(g), Op::Or);
  assert!(net.get(g).outputs.contains(&net.terminal)); }
