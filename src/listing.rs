//! Raw component listings, as produced by the rule-to-circuit front end.
//!
//! A listing is just the role names plus one tuple per component:
//!
//!   (id, count, kind, input ids, output ids)
//!   (id, count, "PROPOSITION", input ids, output ids, role tag, ground term)
//!
//! The json form wraps these tuples in an object tagged with a format string.
use crate::comp::{Op, PropRole};
use crate::error::CompileError;

pub const LISTING_FORMAT:&str = "propnet-listing-0.01";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawComp {
  pub cid: u32,
  pub count: i32,
  pub op: Op,
  pub inputs: Vec<u32>,
  pub outputs: Vec<u32>,
  /// role tag and ground term (propositions only)
  pub prop: Option<(PropRole, String)> }

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Listing {
  pub roles: Vec<String>,
  pub comps: Vec<RawComp> }

fn bad(msg:String)->CompileError { CompileError::Listing(msg) }

fn ids(v:&json::JsonValue, what:&str)->Result<Vec<u32>, CompileError> {
  if !v.is_array() { return Err(bad(format!("{} should be an array: {}", what, v))) }
  v.members().map(|x| x.as_u32().ok_or_else(|| bad(format!("bad id in {}: {}", what, x)))).collect() }

impl Listing {

  pub fn new(roles:Vec<String>)->Self { Listing{ roles, comps:vec![] }}

  pub fn push(&mut self, c:RawComp) { self.comps.push(c) }

  pub fn len(&self)->usize { self.comps.len() }
  pub fn is_empty(&self)->bool { self.comps.is_empty() }

  pub fn to_json(&self)->json::JsonValue {
    let mut comps = json::JsonValue::new_array();
    for c in &self.comps {
      let mut row = json::array![c.cid, c.count, c.op.name().to_ascii_uppercase(),
                                 c.inputs.clone(), c.outputs.clone()];
      if let Some((role, gdl)) = &c.prop {
        let _ = row.push(role.tag());
        let _ = row.push(gdl.as_str()); }
      let _ = comps.push(row); }
    json::object!{
      "format": LISTING_FORMAT,
      "roles": self.roles.clone(),
      "components": comps }}

  pub fn from_json(src:&str)->Result<Self, CompileError> {
    let data = json::parse(src).map_err(|e| bad(e.to_string()))?;
    if data["format"].as_str() != Some(LISTING_FORMAT) {
      return Err(bad(format!("unexpected format: {}", data["format"]))) }
    let mut roles = vec![];
    for r in data["roles"].members() {
      roles.push(r.as_str().ok_or_else(|| bad(format!("bad role name: {}", r)))?.to_string()) }
    let mut res = Listing::new(roles);
    for row in data["components"].members() {
      if row.len() != 5 && row.len() != 7 { return Err(bad(format!("bad component tuple: {}", row))) }
      let cid = row[0].as_u32().ok_or_else(|| bad(format!("bad id: {}", row[0])))?;
      let count = row[1].as_i32().ok_or_else(|| bad(format!("bad count: {}", row[1])))?;
      let op = row[2].as_str().and_then(Op::from_name)
        .ok_or_else(|| bad(format!("bad kind: {}", row[2])))?;
      let inputs = ids(&row[3], "inputs")?;
      let outputs = ids(&row[4], "outputs")?;
      let prop = if row.len() == 7 {
        let role = row[5].as_str().and_then(PropRole::from_tag)
          .ok_or_else(|| bad(format!("bad role tag: {}", row[5])))?;
        let gdl = row[6].as_str().ok_or_else(|| bad(format!("bad term: {}", row[6])))?;
        Some((role, gdl.to_string())) }
        else { None };
      if (op == Op::Prop) != prop.is_some() {
        return Err(bad(format!("component {} has kind {} but {} role tag", cid, op.name(),
          if prop.is_some() {"a"} else {"no"}))) }
      res.push(RawComp{ cid, count, op, inputs, outputs, prop }) }
    Ok(res) }}


#[test] fn test_json() {
  let mut l = Listing::new(vec!["white".into()]);
  l.push(RawComp{ cid:0, count:0, op:Op::Prop, inputs:vec![], outputs:vec![1],
                  prop:Some((PropRole::Base, "(true o1)".into())) });
  l.push(RawComp{ cid:1, count:0, op:Op::Not, inputs:vec![0], outputs:vec![], prop:None });
  let s = l.to_json().dump();
  assert!(s.contains("\"NOT\""));
  assert_eq!(Listing::from_json(&s).unwrap(), l); }

#[test] fn test_json_errors() {
  assert!(Listing::from_json("{").is_err());
  assert!(Listing::from_json(r#"{"format":"nope"}"#).is_err());
  let f = LISTING_FORMAT;
  let missing_tag = format!(r#"{{"format":"{}","roles":[],"components":[[0,0,"PROPOSITION",[],[]]]}}"#, f);
  assert!(Listing::from_json(&missing_tag).is_err());
  let bad_kind = format!(r#"{{"format":"{}","roles":[],"components":[[0,0,"XOR",[],[]]]}}"#, f);
  assert!(Listing::from_json(&bad_kind).is_err()); }
