//! Random playouts ("depth charges"), lock-step comparison of two machines,
//! and parallel validation built on top of the comparison.
use std::time::{Duration, Instant};
use crossbeam_channel::unbounded;
use fxhash::FxHashSet;
use rand::{rngs::SmallRng, Rng, SeedableRng};
use crate::comp::CID;
use crate::config::Options;
use crate::error::PlayError;
use crate::sm::Machine;

/// when to stop a batch of rollouts
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Limit { Time(Duration), Games(usize) }

/// how one rollout ended
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Outcome {
  pub depth: usize,
  /// false if the game stopped without reaching a terminal state
  pub terminal: bool,
  pub goals: Vec<Option<u32>> }

/// totals over a batch of rollouts
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChargeReport {
  pub rollouts: usize,
  pub total_depth: usize,
  /// sum of the goal values per role
  pub scores: Vec<u64>,
  pub elapsed: Duration }

impl ChargeReport {
  pub fn avg_depth(&self)->f64 {
    if self.rollouts == 0 { 0.0 } else { self.total_depth as f64 / self.rollouts as f64 }}
  pub fn per_second(&self)->f64 {
    let s = self.elapsed.as_secs_f64();
    if s == 0.0 { 0.0 } else { self.rollouts as f64 / s }}}

/// a seeded generator, or one seeded from the os
pub fn make_rng(seed:Option<u64>)->SmallRng {
  match seed { Some(s) => SmallRng::seed_from_u64(s), None => SmallRng::from_os_rng() }}

fn pick<R:Rng>(rng:&mut R, n:usize)->usize { rng.random_range(0..n) }

/// play one random game from the initial state.
pub fn depth_charge<M:Machine+?Sized, R:Rng>(sm:&mut M, rng:&mut R, max_depth:usize)->Result<Outcome, PlayError> {
  sm.reset()?;
  let roles = sm.role_count();
  let mut depth = 0;
  let mut joint:Vec<CID> = Vec::with_capacity(roles);
  while !sm.is_terminal() && depth < max_depth {
    joint.clear();
    for r in 0..roles {
      let ls = sm.legal_moves(r);
      if ls.is_empty() { break }
      joint.push(ls[pick(rng, ls.len())]) }
    // somebody has no move: the game is stuck
    if joint.len() < roles { break }
    let next = sm.next_state(&joint)?;
    sm.update_bases(&next)?;
    depth += 1 }
  let terminal = sm.is_terminal();
  let goals = (0..roles).map(|r| sm.goal_value(r)).collect();
  Ok(Outcome{ depth, terminal, goals }) }

/// play random games until the limit runs out.
pub fn depth_charges<M:Machine+?Sized, R:Rng>(sm:&mut M, rng:&mut R, limit:Limit, max_depth:usize)
  ->Result<ChargeReport, PlayError> {
  let start = Instant::now();
  let mut res = ChargeReport{ scores: vec![0; sm.role_count()], ..Default::default() };
  loop {
    match limit {
      Limit::Time(t) => if start.elapsed() >= t { break },
      Limit::Games(n) => if res.rollouts >= n { break }}
    let o = depth_charge(sm, rng, max_depth)?;
    res.rollouts += 1;
    res.total_depth += o.depth;
    for (s, g) in res.scores.iter_mut().zip(o.goals) { *s += g.unwrap_or(0) as u64 }}
  res.elapsed = start.elapsed();
  debug!("depth charges: {} rollouts, {:.1}/s, average depth {:.2}",
         res.rollouts, res.per_second(), res.avg_depth());
  Ok(res) }

/// base terms both machines know about
fn shared_terms<A:Machine+?Sized, B:Machine+?Sized>(a:&A, b:&B)->FxHashSet<String> {
  let names = |net:&crate::net::Propnet|->FxHashSet<String> {
    net.bases.iter().filter_map(|&x| net.gdl_string(x)).collect() };
  let (na, nb) = (names(a.net()), names(b.net()));
  na.intersection(&nb).cloned().collect() }

fn state_terms<M:Machine+?Sized>(m:&M, shared:&FxHashSet<String>)->Vec<String> {
  let mut res:Vec<String> = m.state_terms(&m.current_state()).into_iter().filter(|t| shared.contains(t)).collect();
  res.sort();
  res }

/// legals sorted by move text, so two networks line up even when their ids differ
fn sorted_legals<M:Machine+?Sized>(m:&M, role:usize)->Vec<(String, CID)> {
  let mut res:Vec<(String, CID)> = m.legal_moves(role).into_iter().map(|l| (m.move_string(l), l)).collect();
  res.sort();
  res }

/// play the same random game on two machines in lock step. every turn the
/// legal moves, the terminal flag and the state (over the bases both share)
/// have to agree, and so do the goals at the end. returns the depth reached.
pub fn play_comparison<A:Machine+?Sized, B:Machine+?Sized, R:Rng>(a:&mut A, b:&mut B, rng:&mut R, max_depth:usize)
  ->Result<usize, PlayError> {
  a.reset()?; b.reset()?;
  let shared = shared_terms(a, b);
  let roles = a.role_count();
  if roles != b.role_count() {
    return Err(PlayError::Divergence{ depth:0, what:format!("{} roles vs {}", roles, b.role_count()) }) }
  let mut depth = 0;
  loop {
    let (sa, sb) = (state_terms(a, &shared), state_terms(b, &shared));
    if sa != sb { return Err(PlayError::Divergence{ depth, what:format!("state {:?} vs {:?}", sa, sb) }) }
    if a.is_terminal() != b.is_terminal() {
      return Err(PlayError::Divergence{ depth, what:format!("terminal {} vs {}", a.is_terminal(), b.is_terminal()) }) }
    if a.is_terminal() || depth >= max_depth { break }
    let (mut ja, mut jb) = (vec![], vec![]);
    for r in 0..roles {
      let (la, lb) = (sorted_legals(a, r), sorted_legals(b, r));
      let (ma, mb):(Vec<&String>, Vec<&String>) = (la.iter().map(|x| &x.0).collect(), lb.iter().map(|x| &x.0).collect());
      if ma != mb { return Err(PlayError::Divergence{ depth, what:format!("legals for role {}: {:?} vs {:?}", r, ma, mb) }) }
      if la.is_empty() { break }
      let k = pick(rng, la.len());
      ja.push(la[k].1); jb.push(lb[k].1) }
    if ja.len() < roles { break }
    let (na, nb) = (a.next_state(&ja)?, b.next_state(&jb)?);
    a.update_bases(&na)?; b.update_bases(&nb)?;
    depth += 1 }
  if a.is_terminal() {
    for r in 0..roles {
      let (ga, gb) = (a.goal_value(r), b.goal_value(r));
      if ga != gb { return Err(PlayError::Divergence{ depth, what:format!("goal for role {}: {:?} vs {:?}", r, ga, gb) }) }}}
  Ok(depth) }

/// run play comparisons on several threads. `make` builds a fresh pair of
/// machines inside each worker, so nothing is shared while playing.
///
/// With `opts.seed` set, worker w plays `opts.validate_games` games from
/// seed + w, and the result is the same on every run. Without a seed, each
/// worker plays until `opts.validate_budget` runs out. Returns the total
/// number of games played.
pub fn validate<A, B, F>(make:F, opts:&Options)->Result<usize, PlayError>
where A:Machine, B:Machine, F:Fn()->Result<(A, B), PlayError> + Sync {
  let workers = opts.worker_count();
  let (tx, rx) = unbounded();
  let start = Instant::now();
  std::thread::scope(|s| {
    for w in 0..workers {
      let tx = tx.clone();
      let make = &make;
      s.spawn(move || {
        let run = || -> Result<usize, PlayError> {
          let (mut a, mut b) = make()?;
          let mut rng = make_rng(opts.seed.map(|x| x.wrapping_add(w as u64)));
          let mut games = 0;
          loop {
            match opts.seed {
              Some(_) => if games >= opts.validate_games { break },
              None => if games > 0 && start.elapsed() >= opts.validate_budget { break }}
            play_comparison(&mut a, &mut b, &mut rng, opts.max_depth)?;
            games += 1 }
          Ok(games) };
        // the receiver outlives the scope, so this can't fail
        let _ = tx.send((w, run())); }); }});
  drop(tx);
  let mut results:Vec<(usize, Result<usize, PlayError>)> = rx.iter().collect();
  results.sort_by_key(|r| r.0);
  let mut total = 0;
  for (w, r) in results {
    match r {
      Ok(n) => { trace!("validation worker {}: {} games", w, n); total += n }
      Err(e) => return Err(e) }}
  debug!("validated {} games on {} workers in {:?}", total, workers, start.elapsed());
  Ok(total) }


#[test] fn test_depth_charges() {
  use crate::sm::{StateMachine, Strategy};
  let net = crate::compile::compile(&crate::fixtures::simple_game(), &Options::testing()).unwrap();
  let mut sm = StateMachine::new(&net, Strategy::DepthFirst);
  let mut rng = make_rng(Some(5));
  let r = depth_charges(&mut sm, &mut rng, Limit::Games(20), 100).unwrap();
  assert_eq!(r.rollouts, 20);
  assert_eq!(r.avg_depth(), 1.0);
  assert_eq!(r.scores.iter().sum::<u64>(), 20 * 100, "every game pays out 100 in total"); }

#[test] fn test_max_depth() {
  use crate::sm::{StateMachine, Strategy};
  let net = crate::compile::compile(&crate::fixtures::tictactoe(), &Options::testing()).unwrap();
  let mut sm = StateMachine::new(&net, Strategy::ByLevel);
  let o = depth_charge(&mut sm, &mut make_rng(Some(9)), 2).unwrap();
  assert_eq!(o.depth, 2);
  assert!(!o.terminal); }

#[test] fn test_divergence() {
  use crate::sm::{StateMachine, Strategy};
  let opts = Options::testing();
  let a = crate::compile::compile(&crate::fixtures::simple_game(), &opts).unwrap();
  let b = crate::compile::compile(&crate::fixtures::tictactoe(), &opts).unwrap();
  let (mut ma, mut mb) = (StateMachine::new(&a, Strategy::DepthFirst), StateMachine::new(&b, Strategy::DepthFirst));
  let res = play_comparison(&mut ma, &mut mb, &mut make_rng(Some(1)), 100);
  assert!(matches!(res, Err(PlayError::Divergence{ depth:0, .. }))); }

#[test] fn test_validate_seeded() {
  use crate::sm::{StateMachine, Strategy};
  let opts = Options{ validate_games: 5, workers: 2, seed: Some(7), ..Options::testing() };
  let net = crate::compile::compile(&crate::fixtures::tictactoe(), &opts).unwrap();
  let games = validate(|| Ok((StateMachine::new(&net, Strategy::DepthFirst), StateMachine::new(&net, Strategy::ByLevel))), &opts);
  assert_eq!(games, Ok(10)); }
