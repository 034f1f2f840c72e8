use divan::Bencher;
use propnet::fixtures::tictactoe;
use propnet::rollout::{depth_charge, make_rng};
use propnet::sm::{StateMachine, Strategy};
use propnet::{compile, Options};

fn main() { divan::main() }

#[divan::bench(args = [Strategy::DepthFirst, Strategy::ByLevel])]
fn depth_charges(b:Bencher, strategy:Strategy) {
  let net = compile(&tictactoe(), &Options::fast()).unwrap();
  let mut sm = StateMachine::new(&net, strategy);
  let mut rng = make_rng(Some(1));
  b.bench_local(|| depth_charge(&mut sm, &mut rng, 100).unwrap()); }

#[divan::bench]
fn compile_tictactoe(b:Bencher) {
  let listing = tictactoe();
  let opts = Options::fast();
  b.bench(|| compile(&listing, &opts).unwrap()); }
