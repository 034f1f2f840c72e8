//! The compile pipeline: listing in, scheduled and verified network out,
//! plus the machine-ready builds and a per-game cache of the results.
use std::sync::Arc;
use dashmap::DashMap;
use crate::builder;
use crate::comp::{Op, CID, UNSET};
use crate::config::{OptLevel, Options};
use crate::controls::{discover, split, strip_goals, validate_split};
use crate::cprop::ConstProp;
use crate::describe::{describe, reorder_base_propositions, reorder_components, reorder_legals, Description};
use crate::error::{CompileError, PlayError};
use crate::eval::{back_propagate, sinks, Forward};
use crate::listing::Listing;
use crate::net::{CidSet, Propnet};
use crate::observe::{Observer, Warning};
use crate::opt::{breakup_large_inputs, danglers, ensure_legal_endpoints, optimize, remove_useless_bases,
                 unlink_deadends, unlink_passthrough, unlink_transitions, Mode};
use crate::sm::{CombinedMachine, GoallessMachine, Machine, StateMachine, Strategy};
use crate::topo::topological_ordering;
use crate::verify::verify;

fn stage(obs:&dyn Observer, name:&str, net:&Propnet) { obs.on_stage(name, &net.summary()) }

/// compile a listing into a single network.
pub fn compile(listing:&Listing, opts:&Options)->Result<Propnet, CompileError> {
  let obs = opts.observer.as_ref();
  let mut net = builder::build(listing, obs)?;
  stage(obs, "build", &net);
  unlink_transitions(&mut net)?;

  if opts.level == OptLevel::Raw {
    ensure_legal_endpoints(&mut net)?;
    initial_state(&mut net)?;
    return finish(net, opts, 0) }

  let keep = net.protected(true);
  unlink_passthrough(&mut net, &[Op::Prop], &keep);
  optimize(&mut net, Mode::once(), obs);
  ensure_legal_endpoints(&mut net)?;
  initial_state(&mut net)?;
  stage(obs, "initial state", &net);

  // constants and init only ever matter once
  let mut cp = ConstProp::new();
  let consts:Vec<CID> = net.iter().filter(|c| c.op() == Op::Const).map(|c| c.cid).collect();
  for c in consts {
    if !net.contains(c) { continue }
    let v = net.get(c).count > 0;
    cp.constant_propagate(&mut net, c, v, obs)? }
  if let Some(init) = net.init.take() {
    cp.constant_propagate(&mut net, init, false, obs)?;
    net.isolate(init);
    net.remove(init); }
  optimize(&mut net, Mode::once(), obs);

  for d in danglers(&net) {
    if !net.contains(d) || !net.get(d).inputs.is_empty() { continue }
    let v = net.get(d).value();
    cp.constant_propagate(&mut net, d, v, obs)? }

  // an input nobody can make legal never happens
  let (paired, unpaired):(Vec<CID>, Vec<CID>) = net.inputs.iter().copied()
    .partition(|&i| net.get(i).meta().and_then(|m| m.the_legal).is_some());
  for i in unpaired {
    cp.constant_propagate(&mut net, i, false, obs)?;
    net.isolate(i);
    net.remove(i); }
  net.inputs = paired;
  debug!("constant propagation folded {} components", cp.total);
  stage(obs, "constants", &net);

  let removed = remove_useless_bases(&mut net);
  if removed > 0 { debug!("removed {} useless bases", removed) }
  let mode = if opts.level == OptLevel::Full { Mode::all() } else { Mode::fixed() };
  optimize(&mut net, mode, obs);
  finish(net, opts, opts.max_fan_in) }

/// cap fan-in, recount, schedule, verify, and put everything in canonical order.
fn finish(mut net:Propnet, opts:&Options, max_fan_in:usize)->Result<Propnet, CompileError> {
  let obs = opts.observer.as_ref();
  if max_fan_in > 0 { breakup_large_inputs(&mut net, max_fan_in)?; }
  let sk = sinks(&net);
  back_propagate(&mut net, &sk, false)?;
  topological_ordering(&mut net, obs)?;
  verify(&mut net, opts.verify, max_fan_in)?;
  reorder_base_propositions(&mut net);
  reorder_legals(&mut net);
  reorder_components(&mut net)?;
  verify(&mut net, opts.verify, max_fan_in)?;
  stage(obs, "compiled", &net);
  Ok(net) }

/// set init true and every base and input false, count everything from
/// scratch, and read the initial state off the transitions. init is then
/// switched back off, so the counts are left consistent.
pub fn initial_state(net:&mut Propnet)->Result<(), CompileError> {
  let init = net.init.ok_or_else(|| net.invariant(net.terminal, "initial state was already derived"))?;
  for c in net.iter_mut() {
    match c.op() {
      Op::Const => c.count = (c.count > 0) as i32,
      Op::Prop if c.inputs.is_empty() => c.count = 0,
      // cycles read this seed on their back edge
      _ => if c.count == UNSET { c.count = 0 }}}
  net.get_mut(init).count = 1;
  let sk = sinks(net);
  back_propagate(net, &sk, false)?;
  net.initial_state = net.transitions.iter().map(|&t| net.get(t).value()).collect();
  Forward::new().propagate(net, init, false);
  Ok(()) }

/// a copy with every input forced false and only the terminal and goals
/// left to compute. transitions are cut loose, legals and inputs removed,
/// but the bases stay, so states from the full network still fit.
pub fn goals_only(net:&Propnet, opts:&Options)->Result<Propnet, CompileError> {
  let obs = opts.observer.as_ref();
  let mut g = net.dupe();
  let mut cp = ConstProp::new();
  for i in g.inputs.clone() { cp.constant_propagate(&mut g, i, false, obs)? }
  for t in g.transitions.clone() { g.isolate(t) }
  for l in g.legals().collect::<Vec<CID>>() { g.isolate(l); g.remove(l); }
  // with no legals left there are no moves either
  for i in std::mem::take(&mut g.inputs) { g.isolate(i); g.remove(i); }
  for ri in g.role_infos.iter_mut() { ri.legals.clear(); ri.inputs.clear() }
  let mut keep:CidSet = g.all_inbound();
  keep.extend(g.goals());
  keep.extend(g.transitions.iter().copied());
  keep.insert(g.terminal);
  unlink_deadends(&mut g, &keep);
  optimize(&mut g, Mode::fixed(), obs);
  let sk = sinks(&g);
  back_propagate(&mut g, &sk, false)?;
  topological_ordering(&mut g, obs)?;
  verify(&mut g, opts.verify, opts.max_fan_in)?;
  stage(obs, "goals only", &g);
  Ok(g) }

/// a copy with the goals and their logic removed
pub fn goalless(net:&Propnet, opts:&Options)->Result<Propnet, CompileError> {
  let obs = opts.observer.as_ref();
  let mut g = net.dupe();
  strip_goals(&mut g, obs);
  let sk = sinks(&g);
  back_propagate(&mut g, &sk, false)?;
  topological_ordering(&mut g, obs)?;
  verify(&mut g, opts.verify, opts.max_fan_in)?;
  stage(obs, "goalless", &g);
  Ok(g) }

/// the networks a game is actually played with
#[derive(Clone, Debug)]
pub enum Build {
  Standard(Propnet),
  /// play without goals, ask a goals-only network at the end
  Goalless { goalless: Propnet, goals: Propnet },
  /// one network per control base
  Combined { controls: Vec<Propnet>, goals: Option<Propnet> }}

impl Build {
  pub fn name(&self)->&'static str {
    match self { Build::Standard(_) => "standard", Build::Goalless{..} => "goalless", Build::Combined{..} => "combined" }}

  /// every network in the build
  pub fn networks(&self)->Vec<&Propnet> {
    match self {
      Build::Standard(n) => vec![n],
      Build::Goalless{ goalless, goals } => vec![goalless, goals],
      Build::Combined{ controls, goals } => goals.iter().chain(controls.iter()).collect() }}}

/// split on control bases and validate the split against the unsplit network.
pub fn build_combined(net:&Propnet, opts:&Options)->Result<Build, CompileError> {
  let cb = discover(net, opts)?;
  let nets = split(net, &cb, opts)?;
  let goals = if cb.strip_goals { Some(goals_only(net, opts)?) } else { None };
  validate_split(net, &nets, goals.as_ref(), opts)?;
  Ok(Build::Combined{ controls:nets, goals }) }

/// pick a build: a validated split if one exists, else goalless for two
/// player games, else the network as it is.
pub fn choose_build(net:&Propnet, opts:&Options)->Result<Build, CompileError> {
  let two = net.roles.len() == 2;
  if opts.split_controls && two && opts.level != OptLevel::Raw {
    match build_combined(net, opts) {
      Ok(b) => return Ok(b),
      Err(CompileError::NoControl) => debug!("no control bases; not splitting"),
      // any failure of the split attempt falls back to the unsplit network
      Err(e) => opts.observer.on_warning(&Warning::SplitFallback{ reason:e.to_string() }) }}
  if two { Ok(Build::Goalless{ goalless:goalless(net, opts)?, goals:goals_only(net, opts)? }) }
  else { Ok(Build::Standard(net.dupe())) }}

/// a compiled game, ready to hand out machines
#[derive(Clone, Debug)]
pub struct Artifact {
  pub name: String,
  /// the full compiled network
  pub net: Propnet,
  pub build: Build }

impl Artifact {

  pub fn new(name:&str, listing:&Listing, opts:&Options)->Result<Self, CompileError> {
    info!("compiling {}", name);
    let net = compile(listing, opts)?;
    let build = choose_build(&net, opts)?;
    info!("{}: {} build, {}", name, build.name(), net.summary());
    Ok(Artifact{ name:name.to_string(), net, build }) }

  /// a fresh machine over private copies of the build's networks
  pub fn machine(&self, strategy:Strategy)->Result<Box<dyn Machine>, PlayError> {
    Ok(match &self.build {
      Build::Standard(n) => Box::new(StateMachine::new(n, strategy)),
      Build::Goalless{ goalless, goals } => Box::new(GoallessMachine::new(goalless, goals, strategy)),
      Build::Combined{ controls, goals } => Box::new(CombinedMachine::new(controls, goals.as_ref(), strategy)?) })}

  /// descriptions of every network in the build, in `Build::networks` order
  pub fn descriptions(&self, opts:&Options)->Result<Vec<Description>, CompileError> {
    self.build.networks().into_iter()
      .map(|n| describe(&mut n.dupe(), opts.verify, opts.max_fan_in))
      .collect() }}

pub type CacheEntry = Arc<Result<Artifact, CompileError>>;

/// compiled games by name. a failure is kept too, so each game is compiled
/// (and its error reported) once.
pub struct Cache {
  opts: Options,
  map: DashMap<String, CacheEntry> }

impl Cache {

  pub fn new(opts:Options)->Self { Cache{ opts, map:DashMap::new() }}

  pub fn get(&self, name:&str)->Option<CacheEntry> { self.map.get(name).map(|e| e.value().clone()) }

  pub fn get_or_compile(&self, name:&str, listing:&Listing)->CacheEntry {
    if let Some(e) = self.get(name) { return e }
    let res = Artifact::new(name, listing, &self.opts);
    if let Err(e) = &res { error!("compiling {} failed: {}", name, e) }
    self.map.entry(name.to_string()).or_insert_with(|| Arc::new(res)).value().clone() }

  pub fn len(&self)->usize { self.map.len() }
  pub fn is_empty(&self)->bool { self.map.is_empty() }}
include!("test-games.rs");
