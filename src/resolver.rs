//! Group resolution.
//!
//! Walks each group block in document order and turns its members into
//! [`ResolvedGroup`] records: merges are folded in, forwarded filter rules
//! dropped, and anything that cannot be found becomes an explicit
//! placeholder instead of an error.

use std::collections::HashSet;

use crate::ast::*;
use crate::index::SchemaIndex;

/// One group block with its resolved members.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedBlock<'a> {
    pub name: &'a str,
    pub kind: BlockKind,
    pub groups: Vec<ResolvedGroup<'a>>,
}

/// A member of a block, ready for rendering.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedGroup<'a> {
    /// Tag-based group: a flat OR-list of tag conditions
    Dynamic {
        name: &'a str,
        asset: &'a str,
        conditions: Vec<TagCondition<'a>>,
    },
    /// Filter-based group
    Static {
        name: &'a str,
        is_other: bool,
        body: StaticBody<'a>,
    },
    /// A member ref_id found in no table
    Unresolved { ref_id: &'a str },
}

/// One OR-branch of a dynamic group.
#[derive(Debug, Clone, PartialEq)]
pub enum TagCondition<'a> {
    Match { tag: &'a str, value: String },
    /// A merge source that resolves to no dynamic group
    Unresolved { ref_id: &'a str },
}

#[derive(Debug, Clone, PartialEq)]
pub enum StaticBody<'a> {
    /// No qualifying filter rules
    Empty,
    /// Filters grouped by asset type, first appearance first
    Filters(Vec<AssetFilter<'a>>),
}

/// The OR'd rules of one asset type. Each branch is an AND-group.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetFilter<'a> {
    pub asset: &'a str,
    pub branches: Vec<&'a [Clause]>,
}

/// Resolve every block of the index in document order.
pub fn resolve<'a>(index: &SchemaIndex<'a>) -> Vec<ResolvedBlock<'a>> {
    index
        .blocks
        .iter()
        .copied()
        .map(|block| resolve_block(index, block))
        .collect()
}

fn resolve_block<'a>(index: &SchemaIndex<'a>, block: &'a GroupBlock) -> ResolvedBlock<'a> {
    let mut groups = Vec::with_capacity(block.members.len());

    for member in &block.members {
        let ref_id = member.as_str();
        if index.is_merged_source(ref_id) {
            tracing::debug!("'{}' is merged into another group, not rendered alone", ref_id);
            continue;
        }

        if let Some(group) = index.dynamic_groups.get(ref_id).copied() {
            groups.push(ResolvedGroup::Dynamic {
                name: &group.name,
                asset: block.asset.as_deref().unwrap_or(""),
                conditions: tag_conditions(index, block.tag_key(), ref_id, group),
            });
        } else if let Some(group) = index.static_groups.get(ref_id).copied() {
            groups.push(ResolvedGroup::Static {
                name: &group.name,
                is_other: group.is_catch_all(),
                body: static_body(group),
            });
        } else {
            tracing::warn!("Block '{}' references unknown group '{}'", block.name, ref_id);
            groups.push(ResolvedGroup::Unresolved { ref_id });
        }
    }

    ResolvedBlock {
        name: &block.name,
        kind: block.kind,
        groups,
    }
}

/// The group's own values followed by those of every group merged into it.
///
/// Merges are followed transitively; `seen` stops cycles so each group
/// contributes at most once.
fn tag_conditions<'a>(
    index: &SchemaIndex<'a>,
    tag: &'a str,
    ref_id: &'a str,
    group: &'a DynamicGroup,
) -> Vec<TagCondition<'a>> {
    let mut conditions = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();
    seen.insert(ref_id);
    push_values(&mut conditions, tag, group);

    let mut pending: Vec<&'a str> = index.merge_sources(ref_id).iter().rev().copied().collect();
    while let Some(source) = pending.pop() {
        if !seen.insert(source) {
            continue;
        }
        match index.dynamic_groups.get(source).copied() {
            Some(merged) => {
                push_values(&mut conditions, tag, merged);
                pending.extend(index.merge_sources(source).iter().rev().copied());
            }
            None => {
                tracing::warn!("Merge source '{}' into '{}' is not a dynamic group", source, ref_id);
                conditions.push(TagCondition::Unresolved { ref_id: source });
            }
        }
    }
    conditions
}

/// A group without a value matches the empty tag value.
fn push_values<'a>(conditions: &mut Vec<TagCondition<'a>>, tag: &'a str, group: &DynamicGroup) {
    let values = match &group.val {
        Some(val) => val.values(),
        None => vec![String::new()],
    };
    conditions.extend(
        values
            .into_iter()
            .map(|value| TagCondition::Match { tag, value }),
    );
}

fn static_body(group: &StaticGroup) -> StaticBody<'_> {
    let mut filters: Vec<AssetFilter<'_>> = Vec::new();

    for rule in &group.rules {
        if rule.is_forwarded() {
            tracing::debug!("Skipping forwarded rule in '{}'", group.name);
            continue;
        }
        let clauses = rule.clauses();
        if clauses.is_empty() {
            continue;
        }
        match filters.iter_mut().find(|f| f.asset == rule.asset) {
            Some(filter) => filter.branches.push(clauses),
            None => filters.push(AssetFilter {
                asset: &rule.asset,
                branches: vec![clauses],
            }),
        }
    }

    if filters.is_empty() {
        StaticBody::Empty
    } else {
        StaticBody::Filters(filters)
    }
}
