// end-to-end tests over the fixture games. (included at the bottom of compile.rs)

#[cfg(test)] use crate::fixtures::{both_start, const_and, simple_game, tictactoe};
#[cfg(test)] use crate::rollout::{make_rng, play_comparison, depth_charge};

#[cfg(test)] fn init_logger() {
  use simplelog::*;
  let _ = SimpleLogger::init(LevelFilter::Info, Config::default()); }

/// play joint moves given as text, one pair per turn
#[cfg(test)] fn play_moves(m:&mut dyn Machine, turns:&[[&str; 2]])->usize {
  let mut depth = 0;
  for turn in turns {
    assert!(!m.is_terminal(), "game ended early at depth {}", depth);
    let joint:Vec<CID> = turn.iter().enumerate()
      .map(|(r, mv)| m.find_move(r, mv).unwrap_or_else(|| panic!("{} is not legal for role {} at depth {}", mv, r, depth)))
      .collect();
    let next = m.next_state(&joint).unwrap();
    m.update_bases(&next).unwrap();
    depth += 1 }
  depth }

#[cfg(test)] const X_WINS:[[&str; 2]; 5] = [
  ["(mark 2 2)", "noop"], ["noop", "(mark 3 3)"], ["(mark 2 3)", "noop"],
  ["noop", "(mark 1 1)"], ["(mark 2 1)", "noop"]];

// -- simple game --------------------------------------------------------------

#[test] fn test_simple_game() {
  init_logger();
  let a = Artifact::new("simple", &simple_game(), &Options::testing()).unwrap();
  assert_eq!(a.build.name(), "goalless", "nothing here looks like a control base");
  assert_eq!(a.net.bases.len(), 3);
  for (mv, white, black) in [("a", 10, 90), ("b", 90, 10)] {
    let mut m = a.machine(Strategy::DepthFirst).unwrap();
    assert_eq!(play_moves(m.as_mut(), &[[mv, "noop"]]), 1);
    assert!(m.is_terminal());
    assert_eq!((m.goal_value(0), m.goal_value(1)), (Some(white), Some(black))); }}

// -- tic-tac-toe --------------------------------------------------------------

#[test] fn test_tictactoe_standard() {
  init_logger();
  let net = compile(&tictactoe(), &Options::testing()).unwrap();
  assert_eq!(net.bases.len(), 29);
  for strategy in [Strategy::DepthFirst, Strategy::ByLevel] {
    let mut m = StateMachine::new(&net, strategy);
    assert_eq!(m.legal_moves(0).len(), 9);
    assert_eq!(m.legal_moves(1).len(), 1);
    assert_eq!(play_moves(&mut m, &X_WINS), 5);
    assert!(m.is_terminal());
    assert_eq!((m.goal_value(0), m.goal_value(1)), (Some(100), Some(0))); }}

#[test] fn test_tictactoe_split() {
  init_logger();
  let a = Artifact::new("tictactoe", &tictactoe(), &Options::testing()).unwrap();
  match &a.build {
    Build::Combined{ controls, goals } => {
      assert_eq!(controls.len(), 2);
      assert!(goals.is_some());
      assert!(controls.iter().all(|n| n.fixed_base.is_some())) }
    other => panic!("expected a control split, got a {} build", other.name()) }
  for strategy in [Strategy::DepthFirst, Strategy::ByLevel] {
    let mut m = a.machine(strategy).unwrap();
    assert_eq!(play_moves(m.as_mut(), &X_WINS), 5);
    assert!(m.is_terminal());
    assert_eq!((m.goal_value(0), m.goal_value(1)), (Some(100), Some(0))); }}

#[test] fn test_split_switches() {
  let opts = Options::testing();
  let net = compile(&tictactoe(), &opts).unwrap();
  let build = build_combined(&net, &opts).unwrap();
  let (controls, goals) = match &build { Build::Combined{ controls, goals } => (controls, goals.as_ref()), _ => unreachable!() };
  let mut m = CombinedMachine::new(controls, goals, Strategy::DepthFirst).unwrap();
  let first = m.active();
  play_moves(&mut m, &X_WINS[..1]);
  assert_ne!(m.active(), first, "the other player's network takes over");
  play_moves(&mut m, &X_WINS[1..2]);
  assert_eq!(m.active(), first); }

#[test] fn test_split_fallback() {
  init_logger();
  let obs = Arc::new(crate::observe::Collect::new());
  let opts = Options::testing().with_observer(obs.clone());
  let net = compile(&both_start(), &opts).unwrap();
  assert_eq!(discover(&net, &opts).unwrap().bases.len(), 2, "the turn bases look like controls");
  // but both are set in the initial state, so no one network can start
  assert!(matches!(build_combined(&net, &opts), Err(CompileError::SplitRejected(_))));
  let a = Artifact::new("both_start", &both_start(), &opts).unwrap();
  assert_eq!(a.build.name(), "goalless");
  assert!(obs.warnings().iter().any(|w| matches!(w, Warning::SplitFallback{..})));
  let mut m = a.machine(Strategy::DepthFirst).unwrap();
  assert_eq!(play_moves(m.as_mut(), &[["go", "go"]]), 1);
  assert!(m.is_terminal());
  assert_eq!((m.goal_value(0), m.goal_value(1)), (Some(50), Some(50))); }

#[test] fn test_no_split_for_raw() {
  let opts = Options::testing().with_level(OptLevel::Raw);
  let a = Artifact::new("tictactoe", &tictactoe(), &opts).unwrap();
  assert_eq!(a.build.name(), "goalless"); }

// -- compile pipeline ---------------------------------------------------------

#[test] fn test_const_and_game() {
  let a = Artifact::new("const_and", &const_and(), &Options::testing()).unwrap();
  assert_eq!(a.build.name(), "standard", "one role never splits");
  let mut m = a.machine(Strategy::DepthFirst).unwrap();
  assert!(!m.is_terminal());
  let go = m.find_move(0, "go").unwrap();
  let next = m.next_state(&[go]).unwrap();
  m.update_bases(&next).unwrap();
  assert!(m.is_terminal());
  assert_eq!(m.goal_value(0), Some(100)); }

#[test] fn test_raw_matches_fast() {
  let raw = compile(&tictactoe(), &Options::testing().with_level(OptLevel::Raw)).unwrap();
  let fast = compile(&tictactoe(), &Options::testing()).unwrap();
  let full = compile(&tictactoe(), &Options::testing().with_level(OptLevel::Full)).unwrap();
  assert!(fast.len() < raw.len());
  assert!(raw.init.is_some() && fast.init.is_none());
  let mut rng = make_rng(Some(42));
  for other in [&fast, &full] {
    let mut a = StateMachine::new(&raw, Strategy::DepthFirst);
    let mut b = StateMachine::new(other, Strategy::ByLevel);
    for _ in 0..30 { play_comparison(&mut a, &mut b, &mut rng, 20).unwrap(); }}}

#[test] fn test_fan_in_cap() {
  let opts = Options::testing().with_fan_in(4);
  let net = compile(&tictactoe(), &opts).unwrap();
  assert!(net.iter().all(|c| c.inputs.len() <= 4));
  let mut m = StateMachine::new(&net, Strategy::ByLevel);
  assert_eq!(play_moves(&mut m, &X_WINS), 5);
  assert_eq!(m.goal_value(0), Some(100)); }

#[test] fn test_role_pairing() {
  let net = compile(&tictactoe(), &Options::testing()).unwrap();
  for ri in &net.role_infos {
    assert_eq!(ri.legals.len(), ri.inputs.len());
    for (&l, &i) in ri.legals.iter().zip(ri.inputs.iter()) {
      assert_eq!(net.get(l).meta().and_then(|m| m.legals_input), Some(i));
      assert_eq!(net.get(i).meta().and_then(|m| m.the_legal), Some(l));
      assert_eq!(net.move_string(l), net.move_string(i)) }}}

#[test] fn test_dupe_independence() {
  let net = compile(&simple_game(), &Options::testing()).unwrap();
  let mut copy = net.dupe();
  let b = copy.bases[0];
  crate::eval::Forward::new().propagate(&mut copy, b, true);
  copy.add(crate::comp::Kind::Or, 0);
  assert_eq!(net.get(b).count, 0);
  assert_eq!(copy.get(b).count, 1);
  assert_eq!(copy.len(), net.len() + 1); }

#[test] fn test_recount_during_play() {
  let net = compile(&tictactoe(), &Options::fast()).unwrap();
  let mut rng = make_rng(Some(3));
  for strategy in [Strategy::DepthFirst, Strategy::ByLevel] {
    let mut m = StateMachine::new(&net, strategy);
    for _ in 0..10 {
      depth_charge(&mut m, &mut rng, 100).unwrap();
      // the counts left behind by incremental play match a full recount
      let mut n = m.net().dupe();
      let sk = sinks(&n);
      back_propagate(&mut n, &sk, true).unwrap(); }}}

#[test] fn test_stages() {
  let obs = std::sync::Arc::new(crate::observe::Collect::new());
  let opts = Options::testing().with_observer(obs.clone());
  compile(&simple_game(), &opts).unwrap();
  let stages = obs.stages();
  assert_eq!(stages.first().map(|s| s.as_str()), Some("build"));
  assert_eq!(stages.last().map(|s| s.as_str()), Some("compiled")); }

#[test] fn test_descriptions() {
  let opts = Options::testing();
  let a = Artifact::new("tictactoe", &tictactoe(), &opts).unwrap();
  let ds = a.descriptions(&opts).unwrap();
  assert_eq!(ds.len(), a.build.networks().len());
  for d in &ds {
    assert_eq!(d.params.bases, 29);
    assert_eq!(d.initial_terms().len(), 10, "nine blanks and xplayer's turn") }}

// -- cache --------------------------------------------------------------------

#[test] fn test_cache() {
  let cache = Cache::new(Options::fast());
  assert!(cache.is_empty());
  let a = cache.get_or_compile("simple", &simple_game());
  let b = cache.get_or_compile("simple", &simple_game());
  assert!(Arc::ptr_eq(&a, &b), "compiled once");
  assert!(a.is_ok());
  let broken = Listing::new(vec!["r".into()]);
  let e = cache.get_or_compile("broken", &broken);
  assert!(matches!(&*e, Err(CompileError::NoTerminal)));
  assert_eq!(cache.len(), 2);
  assert!(cache.get("broken").is_some_and(|e| e.is_err()));
  assert!(cache.get("missing").is_none()); }

#[cfg(feature="slowtests")]
#[test] fn test_split_thousand_games() {
  init_logger();
  let opts = Options { validate_games: 250, workers: 4, ..Options::testing() };
  let net = compile(&tictactoe(), &opts).unwrap();
  let cb = crate::controls::discover(&net, &opts).unwrap();
  let nets = crate::controls::split(&net, &cb, &opts).unwrap();
  let goals = goals_only(&net, &opts).unwrap();
  assert_eq!(crate::controls::validate_split(&net, &nets, Some(&goals), &opts).unwrap(), 1000); }
