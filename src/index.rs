//! Lookup tables over a schema document.
//!
//! One pass over the entity list partitions it into ref-keyed tables. The
//! tables borrow from the document and are read-only once built.

use std::collections::{HashMap, HashSet};

use crate::ast::*;

/// Ref-keyed lookup tables for one conversion run.
#[derive(Debug, Default)]
pub struct SchemaIndex<'a> {
    /// Group blocks in document order, with or without a ref_id
    pub blocks: Vec<&'a GroupBlock>,
    pub group_blocks: HashMap<&'a str, &'a GroupBlock>,
    pub dynamic_groups: HashMap<&'a str, &'a DynamicGroup>,
    pub static_groups: HashMap<&'a str, &'a StaticGroup>,
    /// target ref_id -> source ref_ids, in declaration order
    pub merge_targets: HashMap<&'a str, Vec<&'a str>>,
    merged_sources: HashSet<&'a str>,
}

impl<'a> SchemaIndex<'a> {
    /// Build every table with a single pass over `doc`.
    pub fn build(doc: &'a SchemaDocument) -> Self {
        let mut index = SchemaIndex::default();

        for entity in &doc.entities {
            match entity {
                Entity::GroupBlock(block) => {
                    index.blocks.push(block);
                    if let Some(ref_id) = block.ref_id.as_deref() {
                        insert_unique(&mut index.group_blocks, ref_id, block);
                    }
                }
                Entity::DynamicGroup(group) => {
                    let Some(ref_id) = group.ref_id.as_deref() else {
                        tracing::debug!("Dynamic group '{}' has no ref_id, skipping", group.name);
                        continue;
                    };
                    insert_unique(&mut index.dynamic_groups, ref_id, group);
                    index.add_merge(&group.subject, ref_id, &group.merged_from);
                }
                Entity::StaticGroup(group) => match group.ref_id.as_deref() {
                    Some(ref_id) => insert_unique(&mut index.static_groups, ref_id, group),
                    None => {
                        tracing::debug!("Static group '{}' has no ref_id, skipping", group.name)
                    }
                },
                Entity::Merge(merge) => match merge.to.as_deref() {
                    Some(to) => index.add_merge(&merge.subject, to, &merge.from),
                    None => tracing::debug!("Merge without a target, skipping"),
                },
                Entity::Other => {}
            }
        }

        tracing::debug!(
            blocks = index.blocks.len(),
            dynamic = index.dynamic_groups.len(),
            static_groups = index.static_groups.len(),
            merges = index.merge_targets.len(),
            "Indexed schema"
        );
        index
    }

    /// Record `sources` as folded into `target`. Only group merges count.
    fn add_merge(&mut self, subject: &str, target: &'a str, sources: &'a [String]) {
        if sources.is_empty() {
            return;
        }
        if subject != GROUP_SUBJECT {
            tracing::debug!("Ignoring merge into '{}' on subject '{}'", target, subject);
            return;
        }
        let entry = self.merge_targets.entry(target).or_default();
        for source in sources {
            if source == target {
                continue;
            }
            entry.push(source.as_str());
            self.merged_sources.insert(source.as_str());
        }
    }

    /// True when `ref_id` has been folded into some other group.
    pub fn is_merged_source(&self, ref_id: &str) -> bool {
        self.merged_sources.contains(ref_id)
    }

    /// Groups merged directly into `target`.
    pub fn merge_sources(&self, target: &str) -> &[&'a str] {
        self.merge_targets
            .get(target)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

fn insert_unique<'a, T>(table: &mut HashMap<&'a str, &'a T>, ref_id: &'a str, value: &'a T) {
    if table.contains_key(ref_id) {
        tracing::warn!("Duplicate ref_id '{}', keeping the first", ref_id);
        return;
    }
    table.insert(ref_id, value);
}
