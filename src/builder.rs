//! Materialize a raw listing into a linked `Propnet`, then record the index
//! structures (bases, transitions, role infos, terminal, init).
use fxhash::FxHashMap;
use crate::comp::{Comp, Kind, Meta, Op, PropRole, CID};
use crate::error::CompileError;
use crate::listing::{Listing, RawComp};
use crate::net::{Propnet, RoleInfo};
use crate::observe::{Observer, Warning};
use crate::sym::{Sym, SymPool};

/// build and record a network from a listing.
pub fn build(listing:&Listing, obs:&dyn Observer)->Result<Propnet, CompileError> {
  let mut net = Propnet::new(listing.roles.clone(), SymPool::new());
  for raw in &listing.comps { add_raw(&mut net, raw)? }
  check_edges(&net)?;
  net.iter_mut().for_each(|c| c.fixup_requires());
  record(&mut net, obs)?;
  Ok(net) }

fn add_raw(net:&mut Propnet, raw:&RawComp)->Result<(), CompileError> {
  let cid = CID(raw.cid);
  let kind = match (&raw.prop, raw.op) {
    (Some((role, gdl)), Op::Prop) => Kind::Prop(Box::new(classify(net, cid, *role, gdl)?)),
    (None, Op::Prop) => return Err(CompileError::Listing(format!("proposition {} has no role tag", cid))),
    (_, op) => Kind::gate(op)
      .ok_or_else(|| CompileError::Listing(format!("component {} has no kind", cid)))? };
  let mut c = Comp::new(cid, kind, raw.count);
  c.inputs = raw.inputs.iter().map(|&x| CID(x)).collect();
  c.outputs = raw.outputs.iter().map(|&x| CID(x)).collect();
  if !net.insert(c) { return Err(CompileError::Listing(format!("duplicate component id {}", cid))) }
  Ok(()) }

/// check the term shape against the role tag and pull out player/move/goal.
fn classify(net:&mut Propnet, cid:CID, role:PropRole, gdl:&str)->Result<Meta, CompileError> {
  let sym = net.syms.symbolize(gdl)?;
  let mut meta = Meta::new(role, sym);
  let err = |msg:String| CompileError::Structural{
    cid, kind:"Proposition".into(), gdl:Some(gdl.to_string()), msg };
  let shape = |syms:&SymPool, head:&str, arity:usize| {
    syms.arity(sym) == arity && syms.head(sym) == Some(head) };
  match role {
    PropRole::Base => if !shape(&net.syms, "true", 2) { return Err(err("base should look like (true X)".into())) },
    PropRole::Input | PropRole::Legal | PropRole::Goal => {
      let head = match role { PropRole::Input => "does", PropRole::Legal => "legal", _ => "goal" };
      if !shape(&net.syms, head, 3) { return Err(err(format!("{} should look like ({} R X)", role.tag(), head))) }
      let (r, x) = match (net.syms.nth(sym, 1), net.syms.nth(sym, 2)) {
        (Some(r), Some(x)) => (r, x),
        _ => return Err(err("missing role or argument".into())) };
      let name = net.syms.name(r).unwrap_or("");
      let player = net.role_ix(name).ok_or_else(|| err(format!("unknown role {}", net.syms.show(r))))?;
      meta.player = Some(player);
      if role == PropRole::Goal {
        let v = net.syms.name(x).and_then(|s| s.parse::<u32>().ok())
          .ok_or_else(|| err("goal value should be an integer".into()))?;
        if v > 100 { return Err(err(format!("goal value {} out of range", v))) }
        meta.goal = Some(v) }
      else { meta.mv = Some(x) }}
    PropRole::Init | PropRole::Terminal => {
      let atom = if role == PropRole::Init { "init" } else { "terminal" };
      if net.syms.name(sym) != Some(atom) { return Err(err(format!("{} should be the bare atom {}", role.tag(), atom))) }}
    PropRole::Other => {}}
  Ok(meta) }

/// every listed edge has to exist and be listed on both ends.
fn check_edges(net:&Propnet)->Result<(), CompileError> {
  for c in net.iter() {
    for &o in &c.outputs {
      match net.try_get(o) {
        None => return Err(net.structural(c.cid, format!("output {} does not exist", o))),
        Some(oc) if !oc.inputs.contains(&c.cid) =>
          return Err(net.structural(c.cid, format!("output {} does not list it as an input", o))),
        _ => {} }}
    for &i in &c.inputs {
      match net.try_get(i) {
        None => return Err(net.structural(c.cid, format!("input {} does not exist", i))),
        Some(ic) if !ic.outputs.contains(&c.cid) =>
          return Err(net.structural(c.cid, format!("input {} does not list it as an output", i))),
        _ => {} }}}
  Ok(()) }

/// classify propositions into the network's index lists.
pub fn record(net:&mut Propnet, obs:&dyn Observer)->Result<(), CompileError> {
  let mut bases = vec![]; let mut inputs = vec![]; let mut legals = vec![];
  let mut goals = vec![]; let mut inits = vec![]; let mut terminals = vec![];
  for c in net.iter() {
    match c.role() {
      Some(PropRole::Base) => bases.push(c.cid),
      Some(PropRole::Input) => inputs.push(c.cid),
      Some(PropRole::Legal) => legals.push(c.cid),
      Some(PropRole::Goal) => goals.push(c.cid),
      Some(PropRole::Init) => inits.push(c.cid),
      Some(PropRole::Terminal) => terminals.push(c.cid),
      Some(PropRole::Other) | None => {}}}

  // bases are driven by exactly one transition
  let mut transitions = Vec::with_capacity(bases.len());
  for &b in &bases {
    let c = net.get(b);
    if c.inputs.len() != 1 || net.op(c.inputs[0]) != Op::Trans {
      return Err(net.structural(b, "base must have exactly one input, a transition")) }
    let t = c.inputs[0];
    if net.get(t).inputs.len() > 1 { return Err(net.structural(t, "transition has more than one input")) }
    if net.get(t).trans_base().is_some() { return Err(net.structural(t, "transition drives two bases")) }
    net.get_mut(t).kind = Kind::Trans(Some(b));
    transitions.push(t) }
  if let Some(t) = net.iter().find(|c| c.op() == Op::Trans && c.trans_base().is_none()) {
    return Err(net.structural(t.cid, "transition does not drive a base")) }

  for &i in &inputs {
    if !net.get(i).inputs.is_empty() { return Err(net.structural(i, "input proposition has inputs")) }}

  net.terminal = match terminals.as_slice() {
    [t] => *t,
    [] => return Err(CompileError::NoTerminal),
    [_, t, ..] => return Err(net.structural(*t, "more than one terminal proposition")) };

  net.init = match inits.as_slice() {
    [i] => Some(*i),
    [] => {
      obs.on_warning(&Warning::SyntheticInit);
      let gdl = net.syms.atom("init");
      Some(net.add(Kind::Prop(Box::new(Meta::new(PropRole::Init, gdl))), 0)) }
    [_, i, ..] => return Err(net.structural(*i, "more than one init proposition")) };

  // pair each legal with the input for the same (player, move)
  let mut by_move:FxHashMap<(usize, Sym), CID> = FxHashMap::default();
  for &i in &inputs {
    let m = net.get(i).meta().map(|m| (m.player, m.mv));
    if let Some((Some(p), Some(mv))) = m {
      if by_move.insert((p, mv), i).is_some() {
        return Err(net.structural(i, "duplicate input proposition for the same move")) }}}
  let mut role_infos:Vec<RoleInfo> = net.roles.iter()
    .map(|r| RoleInfo{ name:r.clone(), ..Default::default() }).collect();
  for &l in &legals {
    let (player, mv) = match net.get(l).meta() {
      Some(m) => (m.player.unwrap_or(0), m.mv),
      None => continue };
    match mv.and_then(|mv| by_move.get(&(player, mv)).copied()) {
      Some(i) => {
        if net.get(i).meta().and_then(|m| m.the_legal).is_some() {
          return Err(net.structural(l, "duplicate legal/input pairing")) }
        if let Some(m) = net.get_mut(i).meta_mut() { m.the_legal = Some(l) }
        if let Some(m) = net.get_mut(l).meta_mut() { m.legals_input = Some(i) }
        role_infos[player].inputs.push(i);
        role_infos[player].legals.push(l) }
      None => {
        // an orphan legal is demoted to a plain proposition: dead code
        // elimination or pass-through splicing then prunes it.
        let gdl = net.gdl_string(l).unwrap_or_default();
        obs.on_warning(&Warning::OrphanLegal{ cid:l, gdl });
        if let Some(m) = net.get_mut(l).meta_mut() { m.role = PropRole::Other }}}}
  for &g in &goals {
    if let Some(p) = net.get(g).meta().and_then(|m| m.player) { role_infos[p].goals.push(g) }}

  net.bases = bases;
  net.transitions = transitions;
  net.inputs = inputs;
  net.role_infos = role_infos;
  Ok(()) }


#[test] fn test_build_simple() {
  let net = build(&crate::fixtures::simple_game(), &crate::observe::Quiet).unwrap();
  assert_eq!(net.bases.len(), 3);
  assert_eq!(net.transitions.len(), 3);
  assert!(net.init.is_some());
  let white = &net.role_infos[0];
  assert_eq!((white.legals.len(), white.inputs.len(), white.goals.len()), (2, 2, 2));
  for (&l, &i) in white.legals.iter().zip(white.inputs.iter()) {
    assert_eq!(net.move_string(l), net.move_string(i));
    assert_eq!(net.get(i).meta().and_then(|m| m.the_legal), Some(l)) }
  for (&b, &t) in net.bases.iter().zip(net.transitions.iter()) {
    assert_eq!(net.get(t).trans_base(), Some(b)) }}

#[test] fn test_orphan_legal() {
  use crate::fixtures::ListingBuilder;
  let mut b = ListingBuilder::new(&["r"]);
  let a = b.base("a");
  b.next(a, a);
  b.legal("r", "jump", a);
  b.prop(PropRole::Terminal, "terminal", &[a]);
  let obs = crate::observe::Collect::new();
  let net = build(&b.finish(), &obs).unwrap();
  assert!(net.role_infos[0].legals.is_empty());
  let ws = obs.warnings();
  assert!(ws.contains(&Warning::SyntheticInit), "no init in the listing");
  assert!(ws.iter().any(|w| matches!(w, Warning::OrphanLegal{..})));
  assert_eq!(net.iter().filter(|c| c.has_role(PropRole::Legal)).count(), 0); }

#[test] fn test_build_errors() {
  use crate::fixtures::ListingBuilder;
  let q = crate::observe::Quiet;
  let mut b = ListingBuilder::new(&["r"]);
  let a = b.base("a");
  b.next(a, a);
  let l = b.finish();
  assert_eq!(build(&l, &q).err(), Some(CompileError::NoTerminal));

  let mut one_sided = crate::fixtures::simple_game();
  one_sided.comps[0].outputs.push(14);
  assert!(matches!(build(&one_sided, &q), Err(CompileError::Structural{..})));

  let mut dup = crate::fixtures::simple_game();
  let c = dup.comps[3].clone();
  dup.comps.push(c);
  assert!(build(&dup, &q).is_err());

  let mut b = ListingBuilder::new(&["r"]);
  b.prop(PropRole::Base, "(false a)", &[]);
  assert!(matches!(build(&b.finish(), &q), Err(CompileError::Structural{..}))); }

#[test] fn test_init_terminal_atoms() {
  use crate::fixtures::ListingBuilder;
  let q = crate::observe::Quiet;
  for (role, gdl) in [(PropRole::Terminal, "(terminal now)"), (PropRole::Init, "(init x)"), (PropRole::Init, "start")] {
    let mut b = ListingBuilder::new(&["r"]);
    let a = b.base("a");
    b.next(a, a);
    b.prop(role, gdl, &[]);
    if role == PropRole::Init { b.prop(PropRole::Terminal, "terminal", &[a]); }
    match build(&b.finish(), &q) {
      Err(CompileError::Structural{ gdl:Some(g), .. }) => assert_eq!(g, gdl),
      other => panic!("{} was accepted as {}: {:?}", gdl, role.tag(), other.map(|n| n.len())) }}}
