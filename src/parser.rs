//! Schema document parser.
//!
//! Accepts an already-deserialized JSON value in one of two container shapes
//! and produces a [`SchemaDocument`]:
//!
//! ```text
//! [ {"type": "GroupBlock", ...}, {"type": "DynamicGroup", ...}, ... ]   flat entity list
//! {"schema": {"name": .., "rules": [..], "constants": [..], "merges": [..]}}   CloudHealth envelope
//! ```
//!
//! The envelope is flattened into the same entity list, so everything
//! downstream sees one shape.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::ast::*;
use crate::error::{PerspectiveError, PerspectiveResult};

/// Name of the synthetic block that lists static groups.
pub const STATIC_BLOCK_NAME: &str = "Static Groups";

/// Parse a schema document of either supported shape.
pub fn parse(doc: &Value) -> PerspectiveResult<SchemaDocument> {
    match doc {
        Value::Array(items) => parse_entities(items),
        Value::Object(map) => match map.get("schema") {
            Some(Value::Object(schema)) => parse_envelope(schema),
            Some(_) => Err(PerspectiveError::malformed("'schema' must be an object")),
            None => Err(PerspectiveError::malformed(
                "expected an entity array or an object with a 'schema' key",
            )),
        },
        _ => Err(PerspectiveError::malformed(format!(
            "expected an entity array, found {}",
            kind_of(doc)
        ))),
    }
}

/// Parse the flat entity list.
fn parse_entities(items: &[Value]) -> PerspectiveResult<SchemaDocument> {
    let mut entities = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        require_type(item, i)?;
        entities.extend(decode::<Entity>(item, i));
    }
    Ok(SchemaDocument {
        name: None,
        entities,
    })
}

/// Flatten the CloudHealth `{"schema": {...}}` envelope.
fn parse_envelope(schema: &Map<String, Value>) -> PerspectiveResult<SchemaDocument> {
    let name = schema.get("name").and_then(Value::as_str).map(str::to_string);
    let rules = section(schema, "rules")?;
    let constants = section(schema, "constants")?;
    let merges = section(schema, "merges")?;

    let mut dynamic_groups: Vec<DynamicGroup> = Vec::new();
    let mut static_groups: Vec<StaticGroup> = Vec::new();

    for (i, constant) in constants.iter().enumerate() {
        let kind = type_of(constant, i)?;
        let list: &[Value] = match constant.get("list") {
            Some(Value::Array(list)) => list.as_slice(),
            Some(_) => {
                return Err(PerspectiveError::malformed(format!(
                    "constants[{}].list must be an array",
                    i
                )));
            }
            None => &[],
        };
        match kind {
            "Dynamic Group" => dynamic_groups.extend(list.iter().filter_map(|item| decode(item, i))),
            "Static Group" => static_groups.extend(list.iter().filter_map(|item| decode(item, i))),
            // Block constants only mirror the categorize rules.
            _ => tracing::debug!("Skipping constant list of type '{}'", kind),
        }
    }

    let mut blocks: Vec<GroupBlock> = Vec::new();
    for (i, rule) in rules.iter().enumerate() {
        match type_of(rule, i)? {
            "categorize" => {
                let Some(mut block) = decode::<GroupBlock>(rule, i) else {
                    continue;
                };
                block.kind = BlockKind::Categorize;
                block.members = dynamic_groups
                    .iter()
                    .filter(|g| g.blk_id.is_some() && g.blk_id == block.ref_id)
                    .filter_map(|g| g.ref_id.clone())
                    .collect();
                blocks.push(block);
            }
            "filter" => {
                let Some(to) = ref_field(rule, "to") else {
                    continue;
                };
                let Some(filter) = decode::<FilterRule>(rule, i) else {
                    continue;
                };
                match static_groups
                    .iter_mut()
                    .find(|g| g.ref_id.as_deref() == Some(to.as_str()))
                {
                    Some(group) => group.rules.push(filter),
                    None => tracing::debug!("Filter rule {} targets unknown group '{}'", i, to),
                }
            }
            other => tracing::debug!("Skipping rule of type '{}'", other),
        }
    }

    if !static_groups.is_empty() {
        blocks.push(GroupBlock {
            ref_id: None,
            name: STATIC_BLOCK_NAME.to_string(),
            kind: BlockKind::Static,
            asset: None,
            tag_field: Vec::new(),
            members: static_groups.iter().filter_map(|g| g.ref_id.clone()).collect(),
        });
    }

    let mut entities: Vec<Entity> = blocks.into_iter().map(Entity::GroupBlock).collect();
    entities.extend(dynamic_groups.into_iter().map(Entity::DynamicGroup));
    entities.extend(static_groups.into_iter().map(Entity::StaticGroup));

    for (i, merge) in merges.iter().enumerate() {
        let subject = type_of(merge, i)?.to_string();
        if let Some(decoded) = decode::<Merge>(merge, i) {
            entities.push(Entity::Merge(Merge { subject, ..decoded }));
        }
    }

    Ok(SchemaDocument { name, entities })
}

/// An optional top-level array of the envelope.
fn section<'a>(schema: &'a Map<String, Value>, key: &str) -> PerspectiveResult<&'a [Value]> {
    match schema.get(key) {
        None | Some(Value::Null) => Ok(&[]),
        Some(Value::Array(items)) => Ok(items),
        Some(other) => Err(PerspectiveError::malformed(format!(
            "'{}' must be an array, found {}",
            key,
            kind_of(other)
        ))),
    }
}

fn require_type(item: &Value, index: usize) -> PerspectiveResult<()> {
    type_of(item, index).map(|_| ())
}

fn type_of(item: &Value, index: usize) -> PerspectiveResult<&str> {
    match item {
        Value::Object(map) => map.get("type").and_then(Value::as_str).ok_or_else(|| {
            PerspectiveError::malformed(format!("entity {} is missing a 'type' field", index))
        }),
        other => Err(PerspectiveError::malformed(format!(
            "entity {} must be an object, found {}",
            index,
            kind_of(other)
        ))),
    }
}

/// Decode one entity. A record that cannot be decoded is skipped with a
/// warning, so references to it render as unresolved.
fn decode<T: DeserializeOwned>(item: &Value, index: usize) -> Option<T> {
    match T::deserialize(item) {
        Ok(decoded) => Some(decoded),
        Err(e) => {
            tracing::warn!("Skipping entity {}: {}", index, e);
            None
        }
    }
}

/// A reference field; numeric ids are taken as their decimal text.
fn ref_field(item: &Value, key: &str) -> Option<String> {
    match item.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
