//! Control bases: a set of bases exactly one of which is true in every
//! reachable state (typically "whose turn is it"). Splitting the network on
//! them gives one much smaller network per control value.
use fxhash::FxHashMap;
use crate::comp::{PropRole, CID};
use crate::config::Options;
use crate::cprop::ConstProp;
use crate::error::CompileError;
use crate::eval::{back_propagate, sinks};
use crate::net::Propnet;
use crate::opt::{breakup_large_inputs, optimize, unlink_deadends, Mode};
use crate::rollout::{depth_charges, make_rng, validate, Limit};
use crate::sm::{CombinedMachine, StateMachine, Strategy};
use crate::topo::topological_ordering;
use crate::trace::{control_loops, controls};
use crate::verify::verify;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ControlBase {
  pub bases: Vec<CID>,
  /// drop goals from the split networks
  pub strip_goals: bool,
  /// the shared predicate, when found statistically
  pub name: Option<String>,
  /// propagation work caused by these bases during the statistical search
  pub total_pushes: u64 }

impl ControlBase {
  pub fn new(bases:Vec<CID>, strip_goals:bool)->Self {
    ControlBase{ bases, strip_goals, name:None, total_pushes:0 }}}

/// find control bases: structurally if there is exactly one control loop,
/// else by watching which bases do the most work during random play.
pub fn discover(net:&Propnet, opts:&Options)->Result<ControlBase, CompileError> {
  let loops = control_loops(net, &controls(net));
  if let [lp] = loops.as_slice() {
    debug!("found a single control loop of {} bases", lp.len());
    return Ok(ControlBase::new(lp.clone(), opts.strip_goals)) }
  debug!("{} control loops; falling back to statistics", loops.len());
  statistical(net, opts)?.ok_or(CompileError::NoControl) }

/// play random games for `opts.stats_budget`, then look for a group of bases
/// among the busiest ones that lines up with the roles.
pub fn statistical(net:&Propnet, opts:&Options)->Result<Option<ControlBase>, CompileError> {
  let mut sm = StateMachine::with_stats(net);
  let mut rng = make_rng(opts.seed);
  depth_charges(&mut sm, &mut rng, Limit::Time(opts.stats_budget), opts.max_depth)?;
  let a = sm.analysis();
  debug!("statistics: {} flips, {} visits, {} edges", a.flips, a.visits(), a.fanning);
  Ok(do_we_have_control_bases(net, &a.ranked, opts.strip_goals)) }

/// bases shaped like `(true (P role))` are grouped by P. a group with one
/// base per role whose members all rank among the busiest bases is a
/// candidate; the busiest candidate wins.
pub fn do_we_have_control_bases(net:&Propnet, most_used:&[(u64, CID)], strip_goals:bool)->Option<ControlBase> {
  let top:Vec<(u64, CID)> = most_used.iter().copied()
    .filter(|&(_, c)| net.is_role(c, PropRole::Base))
    .take(net.roles.len() * 2).collect();
  let mut groups:FxHashMap<String, Vec<CID>> = FxHashMap::default();
  for &b in &net.bases {
    let gdl = match net.get(b).gdl() { Some(g) => g, None => continue };
    let x = match net.syms.nth(gdl, 1) { Some(x) if net.syms.arity(x) == 2 => x, _ => continue };
    let (p, r) = match (net.syms.nth(x, 0), net.syms.nth(x, 1)) { (Some(p), Some(r)) => (p, r), _ => continue };
    if net.syms.name(r).is_some_and(|r| net.role_ix(r).is_some()) {
      groups.entry(net.syms.show(p)).or_default().push(b) }}
  let mut names:Vec<&String> = groups.keys().collect();
  names.sort();
  let mut best:Option<ControlBase> = None;
  for name in names {
    let bases = &groups[name];
    if bases.len() != net.roles.len() { continue }
    let ranks:Vec<u64> = bases.iter().filter_map(|b| top.iter().find(|t| t.1 == *b).map(|t| t.0)).collect();
    if ranks.len() != bases.len() { continue }
    let total:u64 = ranks.iter().sum();
    debug!("'{}' looks like a control base ({} pushes)", name, total);
    if best.as_ref().map_or(true, |b| total > b.total_pushes) {
      best = Some(ControlBase{ bases:bases.clone(), strip_goals, name:Some(name.clone()), total_pushes:total }) }}
  best }

/// one network per control base: that base forced true, the others false.
/// each network remembers its base in `fixed_base`.
pub fn split(net:&Propnet, cb:&ControlBase, opts:&Options)->Result<Vec<Propnet>, CompileError> {
  let obs = opts.observer.as_ref();
  let mut res = vec![];
  for (k, &fixed) in cb.bases.iter().enumerate() {
    info!("splitting network for {}", net.gdl_string(fixed).unwrap_or_default());
    let mut s = net.dupe();
    if cb.strip_goals { strip_goals(&mut s, obs) }
    let mut cp = ConstProp::new();
    cp.constant_propagate(&mut s, fixed, true, obs)?;
    for (j, &b) in cb.bases.iter().enumerate() {
      if j != k { cp.constant_propagate(&mut s, b, false, obs)? }}
    s.fixed_base = Some(fixed);
    optimize(&mut s, Mode::all(), obs);
    if opts.max_fan_in > 0 { breakup_large_inputs(&mut s, opts.max_fan_in)?; }
    optimize(&mut s, Mode::fixed(), obs);
    let sk = sinks(&s);
    back_propagate(&mut s, &sk, false)?;
    topological_ordering(&mut s, obs)?;
    verify(&mut s, opts.verify, opts.max_fan_in)?;
    obs.on_stage("split", &s.summary());
    res.push(s) }
  Ok(res) }

/// remove the goals and everything only they needed
pub fn strip_goals(net:&mut Propnet, obs:&dyn crate::observe::Observer) {
  let keep = net.protected(false);
  unlink_deadends(net, &keep);
  let live:Vec<Vec<CID>> = net.role_infos.iter()
    .map(|ri| ri.goals.iter().copied().filter(|&g| net.contains(g)).collect()).collect();
  for (ri, g) in net.role_infos.iter_mut().zip(live) { ri.goals = g }
  optimize(net, Mode::fixed(), obs); }

/// play the split networks against the unsplit one. any disagreement
/// rejects the split.
pub fn validate_split(net:&Propnet, nets:&[Propnet], goals:Option<&Propnet>, opts:&Options)->Result<usize, CompileError> {
  let games = validate(|| {
    let reference = StateMachine::new(net, Strategy::DepthFirst);
    let combined = CombinedMachine::new(nets, goals, Strategy::DepthFirst)?;
    Ok((reference, combined)) }, opts)?;
  info!("split networks agreed with the unsplit network over {} games", games);
  Ok(games) }


#[test] fn test_ranked_controls() {
  let opts = Options::testing();
  let net = crate::compile::compile(&crate::fixtures::tictactoe(), &opts).unwrap();
  let is_control = |b:CID| net.gdl_string(b).is_some_and(|g| g.contains("control"));
  let mut ranked:Vec<(u64, CID)> = net.bases.iter().map(|&b| (if is_control(b) { 100 } else { 1 }, b)).collect();
  ranked.sort_by(|a, b| b.cmp(a));
  let cb = do_we_have_control_bases(&net, &ranked, true).unwrap();
  assert_eq!(cb.name.as_deref(), Some("control"));
  assert_eq!(cb.total_pushes, 200);
  assert!(cb.bases.iter().all(|&b| is_control(b)));
  // buried under busier bases, they no longer qualify
  let mut ranked:Vec<(u64, CID)> = net.bases.iter().map(|&b| (if is_control(b) { 1 } else { 100 }, b)).collect();
  ranked.sort_by(|a, b| b.cmp(a));
  assert_eq!(do_we_have_control_bases(&net, &ranked, true), None); }

#[test] fn test_split() {
  let opts = Options::testing();
  let net = crate::compile::compile(&crate::fixtures::tictactoe(), &opts).unwrap();
  let cb = discover(&net, &opts).unwrap();
  assert_eq!(cb.bases.len(), 2);
  let nets = split(&net, &cb, &opts).unwrap();
  for (s, &fb) in nets.iter().zip(cb.bases.iter()) {
    assert_eq!(s.fixed_base, Some(fb));
    assert_eq!(s.bases, net.bases, "split networks keep the base order");
    assert!(s.len() < net.len());
    // the player not to move has no marks to make
    let idle = if net.gdl_string(fb).is_some_and(|g| g.contains("xplayer")) { 1 } else { 0 };
    for &l in &s.role_infos[idle].legals {
      let c = s.get(l);
      if s.move_string(l).as_deref() != Some("noop") { assert!(c.inputs.is_empty() && !c.value()) }}}
  let goals = crate::compile::goals_only(&net, &opts).unwrap();
  assert!(validate_split(&net, &nets, Some(&goals), &opts).unwrap() > 0); }

#[test] fn test_statistical() {
  let opts = Options::testing();
  let net = crate::compile::compile(&crate::fixtures::tictactoe(), &opts).unwrap();
  let cb = statistical(&net, &opts).unwrap().expect("random play should single out the turn bases");
  assert_eq!(cb.name.as_deref(), Some("control"));
  assert_eq!(cb.bases.len(), 2);
  assert!(cb.total_pushes > 0);
  assert!(cb.bases.iter().all(|&b| net.gdl_string(b).is_some_and(|g| g.contains("control")))); }
