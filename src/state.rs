//! Base states: one bit per base proposition, in `Propnet::bases` order.
use std::fmt;

#[derive(Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BaseState { nbits: usize, data: Vec<u64> }

const WORD:usize = u64::BITS as usize;

impl BaseState {

  /// all-false state with room for nbits bases
  pub fn new(nbits:usize)->Self {
    BaseState{ nbits, data: vec![0; nbits.div_ceil(WORD)] }}

  /// constructor that takes the indices of the high bits
  pub fn from_bits(nbits:usize, hi_bits:&[usize])->Self {
    let mut res = BaseState::new(nbits);
    for &bit in hi_bits { res.put(bit, true) }
    res }

  pub fn from_bools(bits:&[bool])->Self {
    let mut res = BaseState::new(bits.len());
    for (i, &b) in bits.iter().enumerate() { if b { res.put(i, true) }}
    res }

  /// indices of the bits that are set
  pub fn hi_bits(&self)->Vec<usize> {
    let mut res = vec![];
    for (j, &raw) in self.data.iter().enumerate() {
      let mut bits = raw;
      while bits != 0 {
        let i = bits.trailing_zeros() as usize;
        res.push(j * WORD + i);
        bits &= bits - 1 }}
    res }

  /// bits past the end read as false
  pub fn get(&self, ix:usize)->bool {
    ix < self.nbits && 0 < (self.data[ix/WORD] & (1 << (ix%WORD))) }

  /// panics if ix is out of range
  pub fn put(&mut self, ix:usize, v:bool) {
    assert!(ix < self.nbits, "bit {} out of range for a {}-bit state", ix, self.nbits);
    let i = ix/WORD; let x = self.data[i];
    self.data[i] = if v { x | (1 << (ix%WORD)) } else { x & !(1 << (ix%WORD)) }}

  pub fn len(&self)->usize { self.nbits }
  pub fn is_empty(&self)->bool { self.nbits == 0 }

  pub fn count_ones(&self)->usize { self.data.iter().map(|x| x.count_ones() as usize).sum() }

  pub fn to_bools(&self)->Vec<bool> { (0..self.nbits).map(|i| self.get(i)).collect() }}

/// e.g. state[1oo1]
impl fmt::Display for BaseState {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "state[")?;
    for i in 0..self.nbits { write!(f, "{}", if self.get(i) {'1'} else {'o'})? }
    write!(f, "]") }}

impl fmt::Debug for BaseState {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result { write!(f, "{}", self) }}


#[test] fn test_state() {
  let mut s = BaseState::new(70);
  assert_eq!(s.data.len(), 2);
  s.put(0, true); s.put(65, true);
  assert!(s.get(65) && !s.get(64));
  assert_eq!(s.hi_bits(), vec![0, 65]);
  assert_eq!(s.count_ones(), 2);
  s.put(0, false);
  assert_eq!(s, BaseState::from_bits(70, &[65]));
  assert!(!s.get(70) && !s.get(1000)); }

#[test] fn test_state_display() {
  let s = BaseState::from_bools(&[true, false, false, true]);
  assert_eq!(s.to_string(), "state[1oo1]");
  assert_eq!(s.to_bools(), vec![true, false, false, true]); }
