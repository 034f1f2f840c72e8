//! Interned terms: constant atoms, variables, and compound (function) terms.
//!
//! Every term lives in a `SymPool` and is referred to by a `Sym` handle.
//! The pool hash-conses terms by content, so two handles are equal exactly
//! when the terms they name are structurally equal.
use std::fmt;
use fxhash::FxHashMap;
use crate::error::CompileError;

/// handle to an interned term
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct Sym(u32);

impl Sym {
  pub fn ix(&self)->usize { self.0 as usize }}

impl fmt::Display for Sym {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result { write!(f, "s{}", self.0) }}

/// the content of a term. compound terms refer to their parts by handle.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum Term {
  Const(String),
  Var(String),
  Func(Vec<Sym>) }

#[derive(Default, Clone, Debug)]
pub struct SymPool {
  terms: Vec<Term>,
  hash: FxHashMap<Term, Sym> }

impl SymPool {

  pub fn new()->Self { Self::default() }

  /// return the handle for t, adding it to the pool if needed.
  pub fn intern(&mut self, t:Term)->Sym {
    match self.hash.get(&t) {
      Some(&s) => s,
      None => {
        let s = Sym(self.terms.len() as u32);
        self.terms.push(t.clone());
        self.hash.insert(t, s);
        s }}}

  /// atoms beginning with '?' are variables; everything else is a constant.
  pub fn atom(&mut self, name:&str)->Sym {
    if name.starts_with('?') { self.intern(Term::Var(name.to_string())) }
    else { self.intern(Term::Const(name.to_string())) }}

  pub fn func(&mut self, parts:Vec<Sym>)->Sym { self.intern(Term::Func(parts)) }

  pub fn get(&self, s:Sym)->&Term { &self.terms[s.ix()] }

  pub fn len(&self)->usize { self.terms.len() }
  pub fn is_empty(&self)->bool { self.terms.is_empty() }

  /// number of parts in a compound term (atoms count as 1)
  pub fn arity(&self, s:Sym)->usize {
    match self.get(s) { Term::Func(xs) => xs.len(), _ => 1 }}

  pub fn nth(&self, s:Sym, i:usize)->Option<Sym> {
    match self.get(s) { Term::Func(xs) => xs.get(i).copied(), _ => None }}

  /// name of an atom (constant or variable), None for compound terms.
  pub fn name(&self, s:Sym)->Option<&str> {
    match self.get(s) {
      Term::Const(n) | Term::Var(n) => Some(n.as_str()),
      Term::Func(_) => None }}

  /// a term is ground when it contains no variables.
  pub fn is_ground(&self, s:Sym)->bool {
    match self.get(s) {
      Term::Const(_) => true,
      Term::Var(_) => false,
      Term::Func(xs) => xs.iter().all(|&x| self.is_ground(x)) }}

  /// the head symbol name of a compound term, or the atom's own name.
  pub fn head(&self, s:Sym)->Option<&str> {
    match self.get(s) {
      Term::Func(xs) => xs.first().and_then(|&x| self.name(x)),
      _ => self.name(s) }}

  /// render a term back to its s-expression form.
  pub fn show(&self, s:Sym)->String {
    let mut res = String::new(); self.show_into(s, &mut res); res }

  fn show_into(&self, s:Sym, out:&mut String) {
    match self.get(s) {
      Term::Const(n) | Term::Var(n) => out.push_str(n),
      Term::Func(xs) => {
        out.push('(');
        for (i, &x) in xs.iter().enumerate() {
          if i > 0 { out.push(' ') }
          self.show_into(x, out) }
        out.push(')') }}}

  /// read a term from its s-expression text, e.g. `(true (cell 1 1 b))`.
  /// only the tiny subset of syntax used for ground terms is handled.
  pub fn symbolize(&mut self, src:&str)->Result<Sym, CompileError> {
    let toks = tokenize(src);
    let mut pos = 0;
    let res = self.read(&toks, &mut pos, src)?;
    if pos != toks.len() { return Err(CompileError::Listing(format!("trailing text in term: {}", src))) }
    Ok(res) }

  fn read(&mut self, toks:&[&str], pos:&mut usize, src:&str)->Result<Sym, CompileError> {
    let bad = || CompileError::Listing(format!("malformed term: {}", src));
    match toks.get(*pos) {
      None => Err(bad()),
      Some(&")") => Err(bad()),
      Some(&"(") => {
        *pos += 1;
        let mut parts = vec![];
        loop {
          match toks.get(*pos) {
            None => return Err(bad()),
            Some(&")") => { *pos += 1; break }
            _ => parts.push(self.read(toks, pos, src)?) }}
        if parts.is_empty() { return Err(bad()) }
        Ok(self.func(parts)) }
      Some(tok) => { *pos += 1; Ok(self.atom(tok)) }}}}

fn tokenize(src:&str)->Vec<&str> {
  let mut res = vec![];
  let mut start = None;
  for (i, ch) in src.char_indices() {
    match ch {
      '(' | ')' => {
        if let Some(s) = start.take() { res.push(&src[s..i]) }
        res.push(&src[i..i+1]) }
      c if c.is_whitespace() => {
        if let Some(s) = start.take() { res.push(&src[s..i]) }}
      _ => if start.is_none() { start = Some(i) }}}
  if let Some(s) = start { res.push(&src[s..]) }
  res }


#[test] fn test_intern() {
  let mut p = SymPool::new();
  let a = p.symbolize("(cell 1 1 x)").unwrap();
  let b = p.symbolize("( cell 1  1 x )").unwrap();
  assert_eq!(a, b, "structurally equal terms should share a handle");
  let c = p.symbolize("(cell 1 1 o)").unwrap();
  assert_ne!(a, c);
  assert_eq!(p.arity(a), 4);
  assert_eq!(p.head(a), Some("cell"));
  assert!(p.is_ground(a)); }

#[test] fn test_show() {
  let mut p = SymPool::new();
  let s = p.symbolize("(true (control  white))").unwrap();
  assert_eq!(p.show(s), "(true (control white))");
  let t = p.symbolize("terminal").unwrap();
  assert_eq!(p.show(t), "terminal");
  assert_eq!(p.arity(t), 1); }

#[test] fn test_vars() {
  let mut p = SymPool::new();
  let s = p.symbolize("(legal ?r (mark 1 ?y))").unwrap();
  assert!(!p.is_ground(s));
  assert!(matches!(p.get(p.nth(s, 1).unwrap()), Term::Var(_))); }

#[test] fn test_bad_terms() {
  let mut p = SymPool::new();
  assert!(p.symbolize("(a b").is_err());
  assert!(p.symbolize("a b)").is_err());
  assert!(p.symbolize("()").is_err());
  assert!(p.symbolize("").is_err()); }
