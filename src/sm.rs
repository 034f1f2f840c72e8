//! State machines: play a compiled network one joint move at a time.
//!
//! A machine owns a private copy of its network and keeps the counts in
//! step with the current state, so the legal moves, terminal flag and goals
//! can be read straight off the components.
use fxhash::FxHashMap;
use crate::comp::CID;
use crate::error::PlayError;
use crate::eval::{Forward, Levels, PropStats};
use crate::net::Propnet;
use crate::state::BaseState;

/// which incremental evaluator a machine uses
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Strategy {
  /// push each flip through depth first
  #[default] DepthFirst,
  /// batch all flips and process them level by level
  ByLevel }

pub trait Machine {
  /// the network this machine reads roles and bases from
  fn net(&self)->&Propnet;
  fn role_count(&self)->usize { self.net().roles.len() }
  fn initial_state(&self)->BaseState { BaseState::from_bools(&self.net().initial_state) }
  /// go back to the initial state
  fn reset(&mut self)->Result<(), PlayError> { let s = self.initial_state(); self.update_bases(&s) }
  fn update_bases(&mut self, state:&BaseState)->Result<(), PlayError>;
  fn current_state(&self)->BaseState;
  /// legal propositions currently true for the role
  fn legal_moves(&self, role:usize)->Vec<CID>;
  /// the state that follows from one legal per role. the current state is unchanged.
  fn next_state(&mut self, legals:&[CID])->Result<BaseState, PlayError>;
  fn is_terminal(&self)->bool;
  fn goal_value(&mut self, role:usize)->Option<u32>;
  /// move text for a legal of this machine
  fn move_string(&self, legal:CID)->String {
    self.net().move_string(legal).unwrap_or_else(|| legal.to_string()) }
  /// the role's currently legal move with this text
  fn find_move(&self, role:usize, mv:&str)->Option<CID> {
    self.legal_moves(role).into_iter().find(|&l| self.move_string(l) == mv) }
  /// the ground terms of the bases set in a state
  fn state_terms(&self, state:&BaseState)->Vec<String> {
    let net = self.net();
    state.hi_bits().into_iter().filter_map(|i| net.gdl_string(net.bases[i])).collect() }}

/// where a statistics machine spent its time
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Analysis {
  /// (gates visited, component) for every base and input, busiest first
  pub ranked: Vec<(u64, CID)>,
  pub flips: u64,
  pub fanning: u64 }

impl Analysis {
  pub fn visits(&self)->u64 { self.ranked.iter().map(|r| r.0).sum() }}

pub struct StateMachine {
  net: Propnet,
  strategy: Strategy,
  fwd: Forward,
  lv: Levels }

impl StateMachine {

  /// a machine over a private copy of the network, set to its initial state.
  pub fn new(net:&Propnet, strategy:Strategy)->Self {
    let net = net.dupe();
    let lv = Levels::new(&net);
    let mut res = StateMachine{ net, strategy, fwd:Forward::new(), lv };
    let s = res.initial_state();
    res.set_state(&s);
    res }

  /// a depth-first machine that records how much work each flip causes.
  pub fn with_stats(net:&Propnet)->Self {
    let mut res = StateMachine::new(net, Strategy::DepthFirst);
    res.fwd = Forward::with_stats();
    res }

  pub fn stats(&self)->Option<&FxHashMap<CID, PropStats>> { self.fwd.stats() }

  /// rank the bases and inputs by the work their flips caused so far
  pub fn analysis(&self)->Analysis {
    let empty = FxHashMap::default();
    let stats = self.stats().unwrap_or(&empty);
    let mut ranked:Vec<(u64, CID)> = self.net.bases.iter().chain(self.net.inputs.iter())
      .map(|&c| (stats.get(&c).map(|s| s.visits).unwrap_or(0), c)).collect();
    ranked.sort_by(|a, b| b.cmp(a));
    let flips = stats.values().map(|s| s.flips).sum();
    let fanning = stats.values().map(|s| s.fanning).sum();
    Analysis{ ranked, flips, fanning }}

  pub fn strategy(&self)->Strategy { self.strategy }

  /// hand the network back (the counts reflect the current state)
  pub fn into_net(self)->Propnet { self.net }

  fn set_many(&mut self, vals:&[(CID, bool)]) {
    match self.strategy {
      Strategy::DepthFirst => for &(c, v) in vals { self.fwd.propagate(&mut self.net, c, v) },
      Strategy::ByLevel => {
        for &(c, v) in vals { self.lv.set(&self.net, c, v) }
        self.lv.run(&mut self.net) }}}

  fn transitions_state(&self)->BaseState {
    let mut res = BaseState::new(self.net.transitions.len());
    for (k, &t) in self.net.transitions.iter().enumerate() {
      if self.net.get(t).value() { res.put(k, true) }}
    res }

  fn unknown(&self, legal:CID)->PlayError {
    let role = self.net.try_get(legal).and_then(|c| c.meta()).and_then(|m| m.player).unwrap_or(0);
    PlayError::UnknownMove{ role, mv:self.move_string(legal) }}

  /// a state has to carry exactly one bit per base
  pub fn check_state(&self, state:&BaseState)->Result<(), PlayError> {
    let expected = self.net.bases.len();
    if state.len() == expected { Ok(()) } else { Err(PlayError::StateSize{ expected, got:state.len() }) }}

  /// set every base from the state. a single network can always do this.
  pub fn set_state(&mut self, state:&BaseState) {
    let vals:Vec<(CID, bool)> = self.net.bases.iter().enumerate().map(|(k, &b)| (b, state.get(k))).collect();
    self.set_many(&vals) }}

impl Machine for StateMachine {

  fn net(&self)->&Propnet { &self.net }

  fn update_bases(&mut self, state:&BaseState)->Result<(), PlayError> {
    self.check_state(state)?;
    self.set_state(state);
    Ok(()) }

  fn current_state(&self)->BaseState {
    let mut res = BaseState::new(self.net.bases.len());
    for (k, &b) in self.net.bases.iter().enumerate() {
      if self.net.get(b).count > 0 { res.put(k, true) }}
    res }

  fn legal_moves(&self, role:usize)->Vec<CID> {
    match self.net.role_infos.get(role) {
      Some(ri) => ri.legals.iter().copied().filter(|&l| self.net.get(l).value()).collect(),
      None => vec![] }}

  fn next_state(&mut self, legals:&[CID])->Result<BaseState, PlayError> {
    let mut inputs = Vec::with_capacity(legals.len());
    for &l in legals {
      let c = match self.net.try_get(l) { Some(c) if c.value() => c, _ => return Err(self.unknown(l)) };
      match c.meta().and_then(|m| m.legals_input) {
        Some(i) => inputs.push(i),
        None => return Err(self.unknown(l)) }}
    let on:Vec<(CID, bool)> = inputs.iter().map(|&i| (i, true)).collect();
    self.set_many(&on);
    let res = self.transitions_state();
    let off:Vec<(CID, bool)> = inputs.iter().map(|&i| (i, false)).collect();
    self.set_many(&off);
    Ok(res) }

  fn is_terminal(&self)->bool { self.net.get(self.net.terminal).value() }

  fn goal_value(&mut self, role:usize)->Option<u32> {
    self.net.role_infos.get(role)?.goals.iter()
      .find(|&&g| self.net.get(g).value())
      .and_then(|&g| self.net.get(g).meta().and_then(|m| m.goal)) }}

/// one machine per control base plus an optional goals-only machine.
/// which machine plays is decided by which control base is set.
pub struct CombinedMachine {
  machines: Vec<StateMachine>,
  /// index into the state vector of each machine's fixed base
  fixed: Vec<usize>,
  goals: Option<StateMachine>,
  active: usize,
  state: BaseState }

impl CombinedMachine {

  pub fn new(nets:&[Propnet], goals:Option<&Propnet>, strategy:Strategy)->Result<Self, PlayError> {
    let mut machines = vec![]; let mut fixed = vec![];
    for n in nets {
      let fb = n.fixed_base.and_then(|fb| n.bases.iter().position(|&b| b == fb))
        .ok_or(PlayError::NoActiveNetwork)?;
      fixed.push(fb);
      machines.push(StateMachine::new(n, strategy)) }
    if machines.is_empty() { return Err(PlayError::NoActiveNetwork) }
    let goals = goals.map(|g| StateMachine::new(g, strategy));
    let state = machines[0].initial_state();
    let mut res = CombinedMachine{ machines, fixed, goals, active:0, state:state.clone() };
    res.switch(&state)?;
    Ok(res) }

  /// index of the machine for the state's control base
  pub fn select(&self, state:&BaseState)->Result<usize, PlayError> {
    let on:Vec<usize> = self.fixed.iter().enumerate().filter(|(_, &ix)| state.get(ix)).map(|(k, _)| k).collect();
    match on.as_slice() {
      [k] => Ok(*k),
      [] => Err(PlayError::NoActiveNetwork),
      _ => Err(PlayError::AmbiguousNetwork(on.iter().map(|&k| self.machines[k].net.bases[self.fixed[k]]).collect())) }}

  /// move to a new state. exactly one control base must be set in it.
  pub fn switch(&mut self, state:&BaseState)->Result<(), PlayError> {
    self.machines[self.active].check_state(state)?;
    self.active = self.select(state)?;
    self.machines[self.active].set_state(state);
    self.state = state.clone();
    Ok(()) }

  pub fn active(&self)->usize { self.active }
  pub fn networks(&self)->usize { self.machines.len() }}

impl Machine for CombinedMachine {

  fn net(&self)->&Propnet { &self.machines[self.active].net }

  fn update_bases(&mut self, state:&BaseState)->Result<(), PlayError> { self.switch(state) }

  fn current_state(&self)->BaseState { self.state.clone() }

  fn legal_moves(&self, role:usize)->Vec<CID> { self.machines[self.active].legal_moves(role) }

  fn next_state(&mut self, legals:&[CID])->Result<BaseState, PlayError> {
    self.machines[self.active].next_state(legals) }

  fn is_terminal(&self)->bool { self.machines[self.active].is_terminal() }

  fn goal_value(&mut self, role:usize)->Option<u32> {
    match self.goals.as_mut() {
      Some(g) => { g.set_state(&self.state); g.goal_value(role) }
      None => self.machines[self.active].goal_value(role) }}}

/// plays on a network with the goals stripped out, and reads goals from a
/// separate goals-only network when asked.
pub struct GoallessMachine {
  play: StateMachine,
  goals: StateMachine }

impl GoallessMachine {
  pub fn new(goalless:&Propnet, goals:&Propnet, strategy:Strategy)->Self {
    GoallessMachine{ play:StateMachine::new(goalless, strategy), goals:StateMachine::new(goals, strategy) }}}

impl Machine for GoallessMachine {
  fn net(&self)->&Propnet { self.play.net() }
  fn update_bases(&mut self, state:&BaseState)->Result<(), PlayError> { self.play.update_bases(state) }
  fn current_state(&self)->BaseState { self.play.current_state() }
  fn legal_moves(&self, role:usize)->Vec<CID> { self.play.legal_moves(role) }
  fn next_state(&mut self, legals:&[CID])->Result<BaseState, PlayError> { self.play.next_state(legals) }
  fn is_terminal(&self)->bool { self.play.is_terminal() }
  fn goal_value(&mut self, role:usize)->Option<u32> {
    let s = self.play.current_state();
    self.goals.set_state(&s);
    self.goals.goal_value(role) }}


#[cfg(test)] fn simple_net()->Propnet {
  crate::compile::compile(&crate::fixtures::simple_game(), &crate::config::Options::testing()).unwrap() }

#[test] fn test_simple_play() {
  let net = simple_net();
  for strategy in [Strategy::DepthFirst, Strategy::ByLevel] {
    let mut sm = StateMachine::new(&net, strategy);
    assert_eq!(sm.state_terms(&sm.current_state()), vec!["(true o1)"]);
    assert!(!sm.is_terminal());
    let mut moves:Vec<String> = sm.legal_moves(0).into_iter().map(|l| sm.move_string(l)).collect();
    moves.sort();
    assert_eq!(moves, vec!["a", "b"]);
    for (mv, white, black) in [("a", 10, 90), ("b", 90, 10)] {
      sm.reset().unwrap();
      let joint = [sm.find_move(0, mv).unwrap(), sm.find_move(1, "noop").unwrap()];
      let next = sm.next_state(&joint).unwrap();
      assert_eq!(sm.current_state(), sm.initial_state(), "next_state leaves the state alone");
      sm.update_bases(&next).unwrap();
      assert!(sm.is_terminal());
      assert_eq!((sm.goal_value(0), sm.goal_value(1)), (Some(white), Some(black)));
      assert!(sm.legal_moves(0).is_empty()); }}}

#[test] fn test_illegal_move() {
  let net = simple_net();
  let mut sm = StateMachine::new(&net, Strategy::DepthFirst);
  let (a, noop) = (sm.find_move(0, "a").unwrap(), sm.find_move(1, "noop").unwrap());
  let next = sm.next_state(&[a, noop]).unwrap();
  sm.update_bases(&next).unwrap();
  assert!(matches!(sm.next_state(&[a, noop]), Err(PlayError::UnknownMove{ role:0, .. }))); }

#[test] fn test_goalless() {
  let opts = crate::config::Options::testing();
  let net = simple_net();
  let (gl, go) = (crate::compile::goalless(&net, &opts).unwrap(), crate::compile::goals_only(&net, &opts).unwrap());
  assert!(gl.goals().next().is_none());
  assert!(go.legals().next().is_none());
  let mut m = GoallessMachine::new(&gl, &go, Strategy::DepthFirst);
  let joint = [m.find_move(0, "b").unwrap(), m.find_move(1, "noop").unwrap()];
  let next = m.next_state(&joint).unwrap();
  m.update_bases(&next).unwrap();
  assert!(m.is_terminal());
  assert_eq!((m.goal_value(0), m.goal_value(1)), (Some(90), Some(10))); }

#[test] fn test_combined_select() {
  let opts = crate::config::Options::testing();
  let net = crate::compile::compile(&crate::fixtures::tictactoe(), &opts).unwrap();
  let cb = crate::controls::discover(&net, &opts).unwrap();
  let nets = crate::controls::split(&net, &cb, &opts).unwrap();
  let mut m = CombinedMachine::new(&nets, None, Strategy::DepthFirst).unwrap();
  assert_eq!(m.networks(), 2);
  let n = net.bases.len();
  assert_eq!(m.switch(&BaseState::new(n)), Err(PlayError::NoActiveNetwork));
  let both:Vec<usize> = cb.bases.iter().map(|b| net.bases.iter().position(|x| x == b).unwrap()).collect();
  assert!(matches!(m.switch(&BaseState::from_bits(n, &both)), Err(PlayError::AmbiguousNetwork(_))));
  assert!(CombinedMachine::new(&[], None, Strategy::DepthFirst).is_err()); }

#[test] fn test_analysis() {
  let net = simple_net();
  let mut sm = StateMachine::with_stats(&net);
  let mut rng = crate::rollout::make_rng(Some(7));
  crate::rollout::depth_charges(&mut sm, &mut rng, crate::rollout::Limit::Games(10), 10).unwrap();
  let a = sm.analysis();
  assert_eq!(a.ranked.len(), net.bases.len() + net.inputs.len());
  assert!(a.ranked.windows(2).all(|w| w[0] >= w[1]), "busiest first");
  assert!(a.flips > 0 && a.visits() > 0);
  // a plain machine keeps no statistics
  let plain = StateMachine::new(&net, Strategy::DepthFirst);
  assert_eq!(plain.analysis().flips, 0); }

#[test] fn test_bad_state_and_role() {
  let net = simple_net();
  let mut sm = StateMachine::new(&net, Strategy::DepthFirst);
  let short = BaseState::new(net.bases.len() - 1);
  assert_eq!(sm.update_bases(&short), Err(PlayError::StateSize{ expected:net.bases.len(), got:net.bases.len() - 1 }));
  assert_eq!(sm.current_state(), sm.initial_state(), "a rejected state changes nothing");
  assert!(sm.legal_moves(7).is_empty());
  assert_eq!(sm.goal_value(7), None);
  let opts = crate::config::Options::testing();
  let (gl, go) = (crate::compile::goalless(&net, &opts).unwrap(), crate::compile::goals_only(&net, &opts).unwrap());
  let mut m = GoallessMachine::new(&gl, &go, Strategy::ByLevel);
  assert!(matches!(m.update_bases(&BaseState::new(40)), Err(PlayError::StateSize{ got:40, .. }))); }

#[test] fn test_combined_bad_state() {
  let opts = crate::config::Options::testing();
  let net = crate::compile::compile(&crate::fixtures::tictactoe(), &opts).unwrap();
  let cb = crate::controls::discover(&net, &opts).unwrap();
  let nets = crate::controls::split(&net, &cb, &opts).unwrap();
  let mut m = CombinedMachine::new(&nets, None, Strategy::DepthFirst).unwrap();
  assert!(matches!(m.update_bases(&BaseState::new(3)), Err(PlayError::StateSize{ expected:29, got:3 })));
  assert!(m.legal_moves(2).is_empty()); }
