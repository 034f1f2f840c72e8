//! Circuit components: the nodes of a propnet.
//!
//! A component is a threshold gate. `count` holds the number of inputs
//! currently true (or the 0/1 value itself for leaf components), and the
//! component reads as true when `count >= req_true`, inverted for NOT.
//! `req_false` is the count at which a decrement flips the gate back off.
use std::fmt;
use crate::sym::Sym;

/// component id: a stable index into the network's arena.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Default)]
pub struct CID(pub u32);

impl CID {
  pub fn ix(&self)->usize { self.0 as usize }
  pub fn from_ix(ix:usize)->Self { CID(ix as u32) }}

impl fmt::Display for CID {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result { write!(f, "#{}", self.0) }}

/// count value for components whose count has not been computed yet.
pub const UNSET:i32 = -1;

/// semantic role of a proposition
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum PropRole { Base, Input, Legal, Goal, Init, Terminal, Other }

impl PropRole {
  pub fn from_tag(tag:&str)->Option<Self> {
    use PropRole::*;
    Some(match tag {
      "base" => Base, "input" => Input, "legal" => Legal, "goal" => Goal,
      "init" => Init, "terminal" => Terminal, "other" => Other,
      _ => return None })}

  pub fn tag(&self)->&'static str {
    use PropRole::*;
    match self {
      Base => "base", Input => "input", Legal => "legal", Goal => "goal",
      Init => "init", Terminal => "terminal", Other => "other" }}}

/// proposition-only metadata
#[derive(Clone, Debug)]
pub struct Meta {
  pub role: PropRole,
  /// the ground term this proposition stands for
  pub gdl: Sym,
  /// index of the player (inputs, legals and goals only)
  pub player: Option<usize>,
  /// the move term (inputs and legals only)
  pub mv: Option<Sym>,
  pub goal: Option<u32>,
  /// legal -> its paired input
  pub legals_input: Option<CID>,
  /// input -> its paired legal
  pub the_legal: Option<CID> }

impl Meta {
  pub fn new(role:PropRole, gdl:Sym)->Self {
    Meta{ role, gdl, player:None, mv:None, goal:None, legals_input:None, the_legal:None }}}

/// plain tag for the kind of a component, handy as a hash key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub enum Op { And, Or, Not, Prop, Trans, Const }

impl Op {
  pub fn name(&self)->&'static str {
    match self {
      Op::And => "And", Op::Or => "Or", Op::Not => "Not",
      Op::Prop => "Proposition", Op::Trans => "Transition", Op::Const => "Constant" }}

  pub fn from_name(s:&str)->Option<Op> {
    Some(match s.to_ascii_uppercase().as_str() {
      "AND" => Op::And, "OR" => Op::Or, "NOT" => Op::Not,
      "PROPOSITION" => Op::Prop, "TRANSITION" => Op::Trans, "CONSTANT" => Op::Const,
      _ => return None })}

  pub fn is_gate(&self)->bool { matches!(self, Op::And | Op::Or | Op::Not) }}

/// the kind of a component, with the data only that kind carries.
#[derive(Clone, Debug)]
pub enum Kind {
  And,
  Or,
  Not,
  Prop(Box<Meta>),
  /// a transition remembers the base proposition it drives
  Trans(Option<CID>),
  Const }

impl Kind {
  pub fn op(&self)->Op {
    match self {
      Kind::And => Op::And, Kind::Or => Op::Or, Kind::Not => Op::Not,
      Kind::Prop(_) => Op::Prop, Kind::Trans(_) => Op::Trans, Kind::Const => Op::Const }}

  /// fresh gate of the given op. props need metadata, so there is none for Op::Prop.
  pub fn gate(op:Op)->Option<Kind> {
    match op {
      Op::And => Some(Kind::And), Op::Or => Some(Kind::Or), Op::Not => Some(Kind::Not),
      Op::Trans => Some(Kind::Trans(None)), Op::Const => Some(Kind::Const),
      Op::Prop => None }}}

#[derive(Clone, Debug)]
pub struct Comp {
  pub cid: CID,
  pub kind: Kind,
  pub inputs: Vec<CID>,
  pub outputs: Vec<CID>,
  pub count: i32,
  pub req_true: i32,
  pub req_false: i32,
  /// +1, or -1 for NOT
  pub incr: i32,
  /// evaluation level assigned by the scheduler
  pub topo: u32 }

impl Comp {

  pub fn new(cid:CID, kind:Kind, count:i32)->Self {
    let incr = if matches!(kind, Kind::Not) { -1 } else { 1 };
    Comp{ cid, kind, inputs:vec![], outputs:vec![], count, req_true:1, req_false:0, incr, topo:0 }}

  pub fn op(&self)->Op { self.kind.op() }
  pub fn is_gate(&self)->bool { self.op().is_gate() }

  pub fn meta(&self)->Option<&Meta> {
    if let Kind::Prop(m) = &self.kind { Some(m) } else { None }}

  pub fn meta_mut(&mut self)->Option<&mut Meta> {
    if let Kind::Prop(m) = &mut self.kind { Some(m) } else { None }}

  pub fn role(&self)->Option<PropRole> { self.meta().map(|m| m.role) }
  pub fn has_role(&self, r:PropRole)->bool { self.role() == Some(r) }

  pub fn gdl(&self)->Option<Sym> { self.meta().map(|m| m.gdl) }

  /// the base proposition driven by this transition
  pub fn trans_base(&self)->Option<CID> {
    if let Kind::Trans(b) = self.kind { b } else { None }}

  /// current truth value derived from the count
  pub fn value(&self)->bool { (self.count >= self.req_true) != (self.incr < 0) }

  /// AND thresholds follow the fan-in; everything else is fixed.
  pub fn fixup_requires(&mut self) {
    if let Kind::And = self.kind {
      self.req_true = self.inputs.len() as i32;
      self.req_false = self.req_true - 1 }}}


#[test] fn test_thresholds() {
  let mut and = Comp::new(CID(1), Kind::And, 0);
  and.inputs = vec![CID(2), CID(3), CID(4)];
  and.fixup_requires();
  assert_eq!((and.req_true, and.req_false), (3, 2));
  assert!(!and.value());
  and.count = 3; assert!(and.value());
  let mut not = Comp::new(CID(5), Kind::Not, 0);
  assert!(not.value(), "NOT of a false input is true");
  not.count = 1; assert!(!not.value());
  let mut empty = Comp::new(CID(6), Kind::And, 0);
  empty.fixup_requires();
  assert!(empty.value(), "an AND with no inputs is true"); }

#[test] fn test_ops() {
  assert_eq!(Op::from_name("PROPOSITION"), Some(Op::Prop));
  assert_eq!(Op::from_name("or"), Some(Op::Or));
  assert_eq!(Op::from_name("XOR"), None);
  assert_eq!(PropRole::from_tag("legal").map(|r| r.tag()), Some("legal"));
  assert!(matches!(Kind::gate(Op::Trans), Some(Kind::Trans(None))));
  assert!(Kind::gate(Op::Prop).is_none(), "a proposition needs its metadata"); }
