//! Schema document types.
//!
//! A perspective is held as a flat, ordered list of typed entities that
//! cross-reference each other by `ref_id`. These structures are built once
//! by the parser and never mutated afterwards.
//!
//! Field decoding is lenient: a null or mistyped field falls back to its
//! default, so one sloppy entity degrades instead of failing the document.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Subject type whose merges are honored.
pub const GROUP_SUBJECT: &str = "Group";

/// A parsed perspective: its display name and its entities in document order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaDocument {
    /// Perspective name, if the container carried one
    pub name: Option<String>,
    /// Entities in declaration order
    pub entities: Vec<Entity>,
}

/// One record of the schema, discriminated by its `type` field.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum Entity {
    GroupBlock(GroupBlock),
    DynamicGroup(DynamicGroup),
    StaticGroup(StaticGroup),
    Merge(Merge),
    #[serde(other)]
    Other,
}

/// How a group block is introduced in the output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BlockKind {
    /// A tag-based categorization axis
    #[default]
    Categorize,
    /// The section listing explicit static groups
    Static,
}

/// A top-level categorization axis.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct GroupBlock {
    #[serde(default, deserialize_with = "lenient_ref")]
    pub ref_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(default, deserialize_with = "block_kind")]
    pub kind: BlockKind,
    /// Asset type the block categorizes, e.g. `AzureTaggableAsset`
    #[serde(default, deserialize_with = "lenient_ref")]
    pub asset: Option<String>,
    /// Tag key; only the first element is meaningful
    #[serde(default, deserialize_with = "lenient_strings")]
    pub tag_field: Vec<String>,
    /// Member group ref_ids in declared order
    #[serde(default, deserialize_with = "lenient_strings")]
    pub members: Vec<String>,
}

impl GroupBlock {
    /// The tag key dynamic members are matched on.
    pub fn tag_key(&self) -> &str {
        self.tag_field.first().map(String::as_str).unwrap_or("")
    }
}

/// A tag-based group.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DynamicGroup {
    #[serde(default, deserialize_with = "lenient_ref")]
    pub ref_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(default)]
    pub val: Option<TagValue>,
    /// Block this group was declared under
    #[serde(default, deserialize_with = "lenient_ref")]
    pub blk_id: Option<String>,
    /// Groups folded into this one
    #[serde(default, deserialize_with = "lenient_strings")]
    pub merged_from: Vec<String>,
    #[serde(default = "default_subject", deserialize_with = "subject")]
    pub subject: String,
}

/// The value (or values) a dynamic group matches.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct TagValue(pub Value);

impl TagValue {
    /// Every matched value, in declared order. Arrays expand per element.
    pub fn values(&self) -> Vec<String> {
        match &self.0 {
            Value::Array(items) => items.iter().map(value_text).collect(),
            other => vec![value_text(other)],
        }
    }
}

/// Strings unquoted, null empty, anything else as JSON.
fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// A group defined by explicit filter rules.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct StaticGroup {
    #[serde(default, deserialize_with = "lenient_ref")]
    pub ref_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(default, deserialize_with = "flag")]
    pub is_other: bool,
    #[serde(default, deserialize_with = "lenient_list")]
    pub rules: Vec<FilterRule>,
}

impl StaticGroup {
    /// The catch-all group, by flag or by name.
    pub fn is_catch_all(&self) -> bool {
        self.is_other || self.name.eq_ignore_ascii_case("other")
    }
}

/// One OR-branch of a static group: its clauses are AND'd.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FilterRule {
    #[serde(default, deserialize_with = "lenient_string")]
    pub asset: String,
    #[serde(default, deserialize_with = "lenient_option")]
    pub condition: Option<RuleCondition>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub clauses: Vec<Clause>,
    /// Set when the rule carries a `fwd_to` key, whatever its value
    #[serde(default, rename = "fwd_to", deserialize_with = "present")]
    pub forwarded: bool,
}

impl FilterRule {
    /// Clauses of the rule, whichever way they were nested.
    pub fn clauses(&self) -> &[Clause] {
        match &self.condition {
            Some(cond) if !cond.clauses.is_empty() => &cond.clauses,
            _ => &self.clauses,
        }
    }

    pub fn is_forwarded(&self) -> bool {
        self.forwarded
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RuleCondition {
    #[serde(default, deserialize_with = "lenient_list")]
    pub clauses: Vec<Clause>,
}

/// A single condition.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Clause {
    #[serde(default, deserialize_with = "lenient_strings")]
    pub field: Vec<String>,
    #[serde(default, deserialize_with = "lenient_tag_field")]
    pub tag_field: Option<Vec<String>>,
    #[serde(default, deserialize_with = "operator")]
    pub op: Operator,
    #[serde(default)]
    pub val: Option<Value>,
}

impl Clause {
    /// The field this clause tests.
    pub fn field(&self) -> Field {
        match &self.tag_field {
            Some(tags) => Field::Tag(tags.first().cloned().unwrap_or_default()),
            None => Field::Plain(self.field.first().cloned().unwrap_or_default()),
        }
    }
}

/// A clause field, tag-qualified or bare.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Field {
    Tag(String),
    Plain(String),
}

/// Clause operators.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Operator {
    #[default]
    Eq,
    Ne,
    Contains,
    NotContains,
    IsNull,
    IsNotNull,
    /// Anything else, echoed verbatim
    Unknown(String),
}

impl Operator {
    /// Null checks take no operand.
    pub fn is_unary(&self) -> bool {
        matches!(self, Operator::IsNull | Operator::IsNotNull)
    }
}

impl From<String> for Operator {
    fn from(op: String) -> Self {
        match op.trim().to_ascii_lowercase().as_str() {
            "=" => Operator::Eq,
            "!=" => Operator::Ne,
            "contains" => Operator::Contains,
            "does not contain" => Operator::NotContains,
            "is null" => Operator::IsNull,
            "is not null" => Operator::IsNotNull,
            _ => Operator::Unknown(op),
        }
    }
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operator::Eq => write!(f, "="),
            Operator::Ne => write!(f, "!="),
            Operator::Contains => write!(f, "CONTAINS"),
            Operator::NotContains => write!(f, "DOES NOT CONTAIN"),
            Operator::IsNull => write!(f, "IS NULL"),
            Operator::IsNotNull => write!(f, "IS NOT NULL"),
            Operator::Unknown(op) => write!(f, "{}", op),
        }
    }
}

/// A standalone merge relationship: `from` groups fold into `to`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Merge {
    #[serde(default = "default_subject", deserialize_with = "subject")]
    pub subject: String,
    #[serde(default, deserialize_with = "lenient_ref")]
    pub to: Option<String>,
    #[serde(default, deserialize_with = "lenient_strings")]
    pub from: Vec<String>,
}

// Lenient field decoders. Each accepts any JSON value for its field.

fn default_subject() -> String {
    GROUP_SUBJECT.to_string()
}

/// Scalars as text; numeric ref_ids are common in exported schemas.
fn scalar_text(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn lenient_ref<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(None);
    }
    let text = scalar_text(value.clone());
    if text.is_none() {
        tracing::warn!("Ignoring non-scalar reference {}", value);
    }
    Ok(text)
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_ref(deserializer)?.unwrap_or_default())
}

fn subject<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_ref(deserializer)?.unwrap_or_else(default_subject))
}

/// A list of scalars; a lone scalar counts as a one-element list.
fn lenient_strings<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => items.into_iter().filter_map(scalar_text).collect(),
        Value::Null => Vec::new(),
        other => scalar_text(other).into_iter().collect(),
    })
}

fn lenient_tag_field<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(None);
    }
    lenient_strings(value).map(Some).map_err(serde::de::Error::custom)
}

/// Elements that fail to decode are dropped with a warning.
fn lenient_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match T::deserialize(item) {
                Ok(decoded) => Some(decoded),
                Err(e) => {
                    tracing::warn!("Skipping undecodable element {}: {}", item, e);
                    None
                }
            })
            .collect(),
        Value::Null => Vec::new(),
        other => {
            tracing::warn!("Expected a list, found {}", other);
            Vec::new()
        }
    })
}

fn lenient_option<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(None);
    }
    match T::deserialize(&value) {
        Ok(decoded) => Ok(Some(decoded)),
        Err(e) => {
            tracing::warn!("Ignoring undecodable field {}: {}", value, e);
            Ok(None)
        }
    }
}

fn operator<'de, D>(deserializer: D) -> Result<Operator, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_ref(deserializer)?
        .map(Operator::from)
        .unwrap_or_default())
}

fn block_kind<'de, D>(deserializer: D) -> Result<BlockKind, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match lenient_ref(deserializer)? {
        Some(kind) if kind.eq_ignore_ascii_case("static") => BlockKind::Static,
        _ => BlockKind::Categorize,
    })
}

/// CloudHealth encodes booleans both as JSON booleans and as `"true"`.
fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Bool(b) => b,
        Value::String(s) => s.eq_ignore_ascii_case("true"),
        _ => false,
    })
}

/// Only called when the key exists, so any value (null included) means true.
fn present<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_entity_dispatch() {
        let entity: Entity = serde_json::from_value(json!({
            "type": "DynamicGroup",
            "ref_id": "g1",
            "name": "Marketing",
            "val": "Marketing"
        }))
        .unwrap();
        match entity {
            Entity::DynamicGroup(g) => {
                assert_eq!(g.ref_id.as_deref(), Some("g1"));
                assert_eq!(g.subject, "Group");
                assert_eq!(g.val.unwrap().values(), vec!["Marketing"]);
            }
            other => panic!("unexpected entity: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_type_is_other() {
        let entity: Entity = serde_json::from_value(json!({"type": "Widget"})).unwrap();
        assert_eq!(entity, Entity::Other);
    }

    #[test]
    fn test_null_and_mistyped_fields_default() {
        let group: DynamicGroup = serde_json::from_value(json!({
            "ref_id": 5841155522569u64,
            "name": null,
            "blk_id": {"nested": true},
            "merged_from": "g7",
            "subject": null
        }))
        .unwrap();
        assert_eq!(group.ref_id.as_deref(), Some("5841155522569"));
        assert_eq!(group.name, "");
        assert_eq!(group.blk_id, None);
        assert_eq!(group.merged_from, vec!["g7"]);
        assert_eq!(group.subject, GROUP_SUBJECT);
    }

    #[test]
    fn test_bad_rule_elements_are_dropped() {
        let group: StaticGroup = serde_json::from_value(json!({
            "ref_id": "s1",
            "name": "Prod",
            "rules": [
                "not a rule",
                {"asset": "AwsAccount", "condition": "oops", "clauses": [
                    {"field": ["Name"], "op": null, "val": "prod"},
                    17
                ]}
            ]
        }))
        .unwrap();
        assert_eq!(group.rules.len(), 1);
        let clauses = group.rules[0].clauses();
        assert_eq!(clauses.len(), 1);
        assert_eq!(clauses[0].op, Operator::Eq);
    }

    #[test]
    fn test_mixed_value_list_expands() {
        let val: TagValue = serde_json::from_value(json!(["a", 1, true])).unwrap();
        assert_eq!(val.values(), vec!["a", "1", "true"]);
        let empty: TagValue = serde_json::from_value(json!([])).unwrap();
        assert!(empty.values().is_empty());
    }

    #[test]
    fn test_operator_parsing() {
        assert_eq!(Operator::from("Contains".to_string()), Operator::Contains);
        assert_eq!(Operator::from("Does Not Contain".to_string()), Operator::NotContains);
        assert_eq!(Operator::from("Is null".to_string()), Operator::IsNull);
        assert_eq!(Operator::from("Is not null".to_string()), Operator::IsNotNull);
        assert_eq!(Operator::from(">=".to_string()), Operator::Unknown(">=".to_string()));
    }

    #[test]
    fn test_is_other_flag() {
        let group: StaticGroup =
            serde_json::from_value(json!({"name": "Leftovers", "is_other": "true"})).unwrap();
        assert!(group.is_catch_all());

        let named: StaticGroup = serde_json::from_value(json!({"name": "OTHER"})).unwrap();
        assert!(named.is_catch_all());
    }

    #[test]
    fn test_nested_clauses() {
        let rule: FilterRule = serde_json::from_value(json!({
            "asset": "AwsAccount",
            "condition": {"clauses": [{"field": ["name"], "op": "=", "val": "prod"}]}
        }))
        .unwrap();
        assert_eq!(rule.clauses().len(), 1);
        assert_eq!(rule.clauses()[0].field(), Field::Plain("name".to_string()));
        assert!(!rule.is_forwarded());
    }

    #[test]
    fn test_forwarding_key_presence() {
        let rule: FilterRule =
            serde_json::from_value(json!({"asset": "AwsAccount", "fwd_to": null})).unwrap();
        assert!(rule.is_forwarded());
    }
}
