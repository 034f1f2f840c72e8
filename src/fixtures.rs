//! Small hand-built game listings, for tests and benchmarks.
//!
//! `ListingBuilder` hands out ids in order and keeps every edge listed on
//! both of its ends, the way a front end would emit them.
use crate::comp::{Op, PropRole};
use crate::listing::{Listing, RawComp};

pub struct ListingBuilder { listing: Listing }

impl ListingBuilder {

  pub fn new(roles:&[&str])->Self {
    ListingBuilder{ listing: Listing::new(roles.iter().map(|r| r.to_string()).collect()) }}

  fn push(&mut self, op:Op, count:i32, prop:Option<(PropRole, String)>, inputs:&[u32])->u32 {
    let cid = self.listing.len() as u32;
    for &i in inputs { self.listing.comps[i as usize].outputs.push(cid) }
    self.listing.push(RawComp{ cid, count, op, inputs:inputs.to_vec(), outputs:vec![], prop });
    cid }

  /// add the edge src -> dst after the fact
  pub fn link(&mut self, src:u32, dst:u32) {
    self.listing.comps[src as usize].outputs.push(dst);
    self.listing.comps[dst as usize].inputs.push(src) }

  pub fn prop(&mut self, role:PropRole, gdl:&str, inputs:&[u32])->u32 {
    self.push(Op::Prop, 0, Some((role, gdl.to_string())), inputs) }

  pub fn and(&mut self, inputs:&[u32])->u32 { self.push(Op::And, 0, None, inputs) }
  pub fn or(&mut self, inputs:&[u32])->u32 { self.push(Op::Or, 0, None, inputs) }
  pub fn not(&mut self, input:u32)->u32 { self.push(Op::Not, 0, None, &[input]) }
  pub fn constant(&mut self, v:bool)->u32 { self.push(Op::Const, v as i32, None, &[]) }

  /// a base proposition `(true x)` behind its own transition
  pub fn base(&mut self, x:&str)->u32 {
    let t = self.push(Op::Trans, 0, None, &[]);
    self.prop(PropRole::Base, &format!("(true {})", x), &[t]) }

  /// drive a base's transition from src
  pub fn next(&mut self, base:u32, src:u32) {
    let t = self.listing.comps[base as usize].inputs[0];
    self.link(src, t) }

  pub fn input(&mut self, role:&str, mv:&str)->u32 {
    self.prop(PropRole::Input, &format!("(does {} {})", role, mv), &[]) }

  pub fn legal(&mut self, role:&str, mv:&str, src:u32)->u32 {
    self.prop(PropRole::Legal, &format!("(legal {} {})", role, mv), &[src]) }

  pub fn goal(&mut self, role:&str, value:u32, src:u32)->u32 {
    self.prop(PropRole::Goal, &format!("(goal {} {})", role, value), &[src]) }

  pub fn finish(self)->Listing { self.listing }}

/// two players, three bases. white picks a or b, black can only wait, and
/// the game ends after one move. a: white 10, black 90. b: white 90, black 10.
pub fn simple_game()->Listing {
  let mut b = ListingBuilder::new(&["white", "black"]);
  let init = b.prop(PropRole::Init, "init", &[]);
  let o1 = b.base("o1");
  let o2 = b.base("o2");
  let o3 = b.base("o3");
  b.next(o1, init);
  b.legal("white", "a", o1);
  b.legal("white", "b", o1);
  b.legal("black", "noop", o1);
  let wa = b.input("white", "a");
  let wb = b.input("white", "b");
  b.input("black", "noop");
  b.next(o2, wa);
  b.next(o3, wb);
  let done = b.or(&[o2, o3]);
  b.prop(PropRole::Terminal, "terminal", &[done]);
  b.goal("white", 10, o2);
  b.goal("white", 90, o3);
  b.goal("black", 90, o2);
  b.goal("black", 10, o3);
  b.finish() }

const LINES:[[(u32, u32); 3]; 8] = [
  [(1,1),(1,2),(1,3)], [(2,1),(2,2),(2,3)], [(3,1),(3,2),(3,3)],
  [(1,1),(2,1),(3,1)], [(1,2),(2,2),(3,2)], [(1,3),(2,3),(3,3)],
  [(1,1),(2,2),(3,3)], [(1,3),(2,2),(3,1)]];

/// tic-tac-toe. xplayer moves first, and each turn the other player plays noop.
pub fn tictactoe()->Listing {
  let roles = ["xplayer", "oplayer"];
  let marks = ["x", "o"];
  let mut b = ListingBuilder::new(&roles);
  let init = b.prop(PropRole::Init, "init", &[]);
  let ix = |i:u32, j:u32| ((i-1)*3 + (j-1)) as usize;

  // cells[m][k] for m in x, o, b
  let mut cells = vec![vec![]; 3];
  for i in 1..=3 { for j in 1..=3 {
    for (m, mark) in ["x", "o", "b"].iter().enumerate() {
      cells[m].push(b.base(&format!("(cell {} {} {})", i, j, mark))) }}}
  let control:Vec<u32> = roles.iter().map(|r| b.base(&format!("(control {})", r))).collect();

  let mut does = vec![vec![]; 2];
  for (r, role) in roles.iter().enumerate() {
    for i in 1..=3 { for j in 1..=3 {
      let mv = format!("(mark {} {})", i, j);
      does[r].push(b.input(role, &mv));
      let ok = b.and(&[cells[2][ix(i, j)], control[r]]);
      b.legal(role, &mv, ok); }}
    b.input(role, "noop");
    b.legal(role, "noop", control[1-r]); }

  for k in 0..9 {
    for r in 0..2 {
      let placed = b.and(&[does[r][k], cells[2][k]]);
      let keep = b.or(&[placed, cells[r][k]]);
      b.next(cells[r][k], keep) }
    let marked = b.or(&[does[0][k], does[1][k]]);
    let unmarked = b.not(marked);
    let still = b.and(&[cells[2][k], unmarked]);
    let blank = b.or(&[init, still]);
    b.next(cells[2][k], blank) }
  let first = b.or(&[init, control[1]]);
  b.next(control[0], first);
  b.next(control[1], control[0]);

  let mut line = vec![];
  for (m, mark) in marks.iter().enumerate() {
    let ands:Vec<u32> = LINES.iter()
      .map(|l| { let xs:Vec<u32> = l.iter().map(|&(i, j)| cells[m][ix(i, j)]).collect(); b.and(&xs) })
      .collect();
    let any = b.or(&ands);
    line.push(b.prop(PropRole::Other, &format!("(line {})", mark), &[any])) }
  let blanks = b.or(&cells[2]);
  let open = b.prop(PropRole::Other, "open", &[blanks]);

  let (nx, no) = (b.not(line[0]), b.not(line[1]));
  let draw = b.and(&[nx, no]);
  for (r, role) in roles.iter().enumerate() {
    b.goal(role, 100, line[r]);
    b.goal(role, 50, draw);
    b.goal(role, 0, line[1-r]); }
  let full = b.not(open);
  let over = b.or(&[line[0], line[1], full]);
  b.prop(PropRole::Terminal, "terminal", &[over]);
  b.finish() }

/// one player, one move. the terminal is an AND of a true constant and two
/// bases, so the constant folds out and leaves a two-input AND behind.
pub fn const_and()->Listing {
  let mut b = ListingBuilder::new(&["solo"]);
  let init = b.prop(PropRole::Init, "init", &[]);
  let a = b.base("a");
  let bb = b.base("b");
  let stay = b.or(&[init, a]);
  b.next(a, stay);
  b.legal("solo", "go", a);
  let go = b.input("solo", "go");
  b.next(bb, go);
  let k = b.constant(true);
  let both = b.and(&[k, a, bb]);
  let t = b.prop(PropRole::Terminal, "terminal", &[both]);
  b.goal("solo", 100, t);
  b.finish() }

/// two players who both start with the turn. the turn bases swap every
/// move, so they look like control bases, but a split on them has no
/// single network to start in.
pub fn both_start()->Listing {
  let roles = ["left", "right"];
  let mut b = ListingBuilder::new(&roles);
  let init = b.prop(PropRole::Init, "init", &[]);
  let turn:Vec<u32> = roles.iter().map(|r| b.base(&format!("(turn {})", r))).collect();
  let done = b.base("done");
  for r in 0..2 {
    let stay = b.or(&[init, turn[1-r]]);
    b.next(turn[r], stay) }
  let mut moved = vec![];
  for (r, role) in roles.iter().enumerate() {
    b.legal(role, "go", turn[r]);
    moved.push(b.input(role, "go")) }
  let any = b.or(&moved);
  b.next(done, any);
  b.prop(PropRole::Terminal, "terminal", &[done]);
  for role in roles { b.goal(role, 50, done); }
  b.finish() }

/// one player whose wait move is legal through a true constant.
pub fn always_legal()->Listing {
  let mut b = ListingBuilder::new(&["solo"]);
  let init = b.prop(PropRole::Init, "init", &[]);
  let a = b.base("a");
  let waited = b.base("waited");
  let stay = b.or(&[init, a]);
  b.next(a, stay);
  let k = b.constant(true);
  b.legal("solo", "wait", k);
  let wait = b.input("solo", "wait");
  b.next(waited, wait);
  let over = b.and(&[a, waited]);
  let t = b.prop(PropRole::Terminal, "terminal", &[over]);
  b.goal("solo", 100, t);
  b.finish() }

#[test] fn test_builder_edges() {
  let l = simple_game();
  for c in &l.comps {
    for &o in &c.outputs { assert!(l.comps[o as usize].inputs.contains(&c.cid), "{} -> {}", c.cid, o) }
    for &i in &l.comps[c.cid as usize].inputs { assert!(l.comps[i as usize].outputs.contains(&c.cid)) }}
  assert_eq!(l.roles, vec!["white", "black"]); }
