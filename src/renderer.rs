//! Text renderer for resolved groups.
//!
//! Produces the line-oriented WHERE/AND/OR layout:
//!
//! ```text
//! Group:  Production
//!
//! Filter: Aws Account
//!         WHERE Name = 'prod'
//!         AND tag env IS NOT NULL
//!         OR (Name CONTAINS 'stage'
//!             AND tag team = 'core')
//! ```
//!
//! Rendering never fails: every resolved record has a textual form.

use serde_json::Value;

use crate::ast::{BlockKind, Clause, Field};
use crate::resolver::{AssetFilter, ResolvedBlock, ResolvedGroup, StaticBody, TagCondition};

/// Width of the rule between groups.
pub const SEPARATOR_WIDTH: usize = 76;

pub const OTHER_NOTE: &str = "Note: Catches all assets not matched by other groups";
pub const EMPTY_GROUP: &str = "EMPTY GROUP";
/// Shown for a dynamic group whose value list is empty.
pub const NO_VALUES: &str = "NO TAG VALUES";

const INDENT: &str = "        ";
const CONTINUATION: &str = "            ";

/// Trait for converting schema nodes to clause text.
pub trait ToText {
    fn to_text(&self) -> String;
}

impl ToText for Clause {
    fn to_text(&self) -> String {
        let field = match self.field() {
            Field::Tag(name) => format!("tag {}", name),
            Field::Plain(name) => name,
        };
        if self.op.is_unary() {
            return format!("{} {}", field, self.op);
        }
        format!("{} {} {}", field, self.op, operand(self.val.as_ref()))
    }
}

impl ToText for TagCondition<'_> {
    fn to_text(&self) -> String {
        match self {
            TagCondition::Match { tag, value } => format!("tag {} = '{}'", tag, value),
            TagCondition::Unresolved { ref_id } => unresolved(ref_id),
        }
    }
}

/// Strings are quoted; other scalars render bare.
fn operand(val: Option<&Value>) -> String {
    match val {
        None | Some(Value::Null) => "''".to_string(),
        Some(Value::String(s)) => format!("'{}'", s),
        Some(other) => other.to_string(),
    }
}

fn unresolved(ref_id: &str) -> String {
    format!("UNRESOLVED REFERENCE '{}'", ref_id)
}

/// Split a joined-capitalized identifier into words.
///
/// `AzureTaggableAsset` becomes `Azure Taggable Asset`. A space is only
/// inserted where none precedes the capital, so humanizing twice is a no-op.
pub fn humanize(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 4);
    let mut prev: Option<char> = None;
    for c in text.chars() {
        if c.is_uppercase() && prev.is_some_and(|p| !p.is_whitespace()) {
            out.push(' ');
        }
        out.push(c);
        prev = Some(c);
    }
    out
}

/// Render a whole perspective.
pub fn render(perspective: &str, blocks: &[ResolvedBlock<'_>]) -> Vec<String> {
    let mut lines = vec![format!("Perspective: {}", perspective), String::new()];
    for block in blocks {
        render_block(&mut lines, block);
    }
    lines.push("Done".to_string());
    lines
}

fn render_block(lines: &mut Vec<String>, block: &ResolvedBlock<'_>) {
    match block.kind {
        BlockKind::Categorize => lines.push(format!("Group Block: {}", block.name)),
        BlockKind::Static => lines.push(format!("{}:", block.name)),
    }
    lines.push(String::new());

    for group in &block.groups {
        lines.push("-".repeat(SEPARATOR_WIDTH));
        lines.push(String::new());
        render_group(lines, group);
        lines.push(String::new());
    }
}

fn render_group(lines: &mut Vec<String>, group: &ResolvedGroup<'_>) {
    match group {
        ResolvedGroup::Dynamic {
            name,
            asset,
            conditions,
        } => {
            lines.push(format!("Group:  {}", name));
            lines.push(String::new());
            lines.push(format!("Filter: {}", humanize(asset)));
            if conditions.is_empty() {
                lines.push(format!("{}{}", INDENT, NO_VALUES));
            }
            for (i, cond) in conditions.iter().enumerate() {
                let keyword = if i == 0 { "WHERE" } else { "OR" };
                lines.push(format!("{}{} {}", INDENT, keyword, cond.to_text()));
            }
        }
        ResolvedGroup::Static {
            name,
            is_other,
            body,
        } => {
            lines.push(format!("Group:  {}", name));
            if *is_other {
                lines.push(String::new());
                lines.push(OTHER_NOTE.to_string());
            }
            match body {
                StaticBody::Filters(filters) => {
                    for filter in filters {
                        lines.push(String::new());
                        render_filter(lines, filter);
                    }
                }
                // The note already says what the catch-all holds.
                StaticBody::Empty if *is_other => {}
                StaticBody::Empty => {
                    lines.push(String::new());
                    lines.push(format!("{}{}", INDENT, EMPTY_GROUP));
                }
            }
        }
        ResolvedGroup::Unresolved { ref_id } => {
            lines.push(format!("Group:  {}", ref_id));
            lines.push(String::new());
            lines.push(format!("{}{}", INDENT, unresolved(ref_id)));
        }
    }
}

/// First branch opens with WHERE; later branches are OR'd, parenthesized
/// only when they hold more than one clause.
fn render_filter(lines: &mut Vec<String>, filter: &AssetFilter<'_>) {
    lines.push(format!("Filter: {}", humanize(filter.asset)));

    for (i, clauses) in filter.branches.iter().enumerate() {
        if i == 0 {
            for (j, clause) in clauses.iter().enumerate() {
                let keyword = if j == 0 { "WHERE" } else { "AND" };
                lines.push(format!("{}{} {}", INDENT, keyword, clause.to_text()));
            }
        } else if clauses.len() == 1 {
            lines.push(format!("{}OR {}", INDENT, clauses[0].to_text()));
        } else {
            let last = clauses.len() - 1;
            for (j, clause) in clauses.iter().enumerate() {
                let text = clause.to_text();
                let line = match j {
                    0 => format!("{}OR ({}", INDENT, text),
                    j if j == last => format!("{}AND {})", CONTINUATION, text),
                    _ => format!("{}AND {}", CONTINUATION, text),
                };
                lines.push(line);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Operator;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn clause(field: &str, op: Operator, val: Value) -> Clause {
        Clause {
            field: vec![field.to_string()],
            tag_field: None,
            op,
            val: Some(val),
        }
    }

    fn tag_clause(tag: &str, op: Operator, val: Option<Value>) -> Clause {
        Clause {
            field: Vec::new(),
            tag_field: Some(vec![tag.to_string()]),
            op,
            val,
        }
    }

    #[test]
    fn test_humanize() {
        assert_eq!(humanize("AzureTaggableAsset"), "Azure Taggable Asset");
        assert_eq!(humanize("Azure Taggable Asset"), "Azure Taggable Asset");
        assert_eq!(humanize(&humanize("AwsAccount")), "Aws Account");
        assert_eq!(humanize(""), "");
    }

    #[test]
    fn test_clause_text() {
        assert_eq!(clause("Name", Operator::Eq, json!("prod")).to_text(), "Name = 'prod'");
        assert_eq!(clause("Name", Operator::Ne, json!("dev")).to_text(), "Name != 'dev'");
        assert_eq!(
            clause("Name", Operator::Contains, json!("stg")).to_text(),
            "Name CONTAINS 'stg'"
        );
        assert_eq!(
            clause("Name", Operator::NotContains, json!("tmp")).to_text(),
            "Name DOES NOT CONTAIN 'tmp'"
        );
        assert_eq!(clause("Cores", Operator::Eq, json!(4)).to_text(), "Cores = 4");
        assert_eq!(
            tag_clause("env", Operator::IsNull, None).to_text(),
            "tag env IS NULL"
        );
        assert_eq!(
            tag_clause("env", Operator::IsNotNull, Some(json!(""))).to_text(),
            "tag env IS NOT NULL"
        );
        assert_eq!(
            clause("Name", Operator::Unknown("Starts With".into()), json!("a")).to_text(),
            "Name Starts With 'a'"
        );
    }

    fn render_static(branches: Vec<&[Clause]>) -> Vec<String> {
        let block = ResolvedBlock {
            name: "Static Groups",
            kind: BlockKind::Static,
            groups: vec![ResolvedGroup::Static {
                name: "Prod",
                is_other: false,
                body: StaticBody::Filters(vec![AssetFilter {
                    asset: "AwsAccount",
                    branches,
                }]),
            }],
        };
        let mut lines = Vec::new();
        render_block(&mut lines, &block);
        lines
    }

    #[test]
    fn test_and_binds_tighter_than_or() {
        let c1 = clause("a", Operator::Eq, json!("1"));
        let c2 = clause("b", Operator::Eq, json!("2"));
        let c3 = clause("c", Operator::Eq, json!("3"));

        let first = [c1.clone(), c2.clone()];
        let second = [c3.clone()];
        let lines = render_static(vec![&first[..], &second[..]]);
        assert_eq!(
            lines[6..].to_vec(),
            vec![
                "Filter: Aws Account",
                "        WHERE a = '1'",
                "        AND b = '2'",
                "        OR c = '3'",
                "",
            ]
        );

        let first = [c1];
        let second = [c2, c3];
        let lines = render_static(vec![&first[..], &second[..]]);
        assert_eq!(
            lines[6..].to_vec(),
            vec![
                "Filter: Aws Account",
                "        WHERE a = '1'",
                "        OR (b = '2'",
                "            AND c = '3')",
                "",
            ]
        );
    }

    #[test]
    fn test_empty_and_other_groups() {
        let block = ResolvedBlock {
            name: "Static Groups",
            kind: BlockKind::Static,
            groups: vec![
                ResolvedGroup::Static {
                    name: "Nothing",
                    is_other: false,
                    body: StaticBody::Empty,
                },
                ResolvedGroup::Static {
                    name: "Other",
                    is_other: true,
                    body: StaticBody::Empty,
                },
            ],
        };
        let mut lines = Vec::new();
        render_block(&mut lines, &block);
        let separator = "-".repeat(SEPARATOR_WIDTH);
        assert_eq!(
            lines,
            vec![
                "Static Groups:",
                "",
                separator.as_str(),
                "",
                "Group:  Nothing",
                "",
                "        EMPTY GROUP",
                "",
                separator.as_str(),
                "",
                "Group:  Other",
                "",
                OTHER_NOTE,
                "",
            ]
        );
    }

    #[test]
    fn test_group_without_values() {
        let mut lines = Vec::new();
        render_group(
            &mut lines,
            &ResolvedGroup::Dynamic {
                name: "Nobody",
                asset: "AwsAccount",
                conditions: Vec::new(),
            },
        );
        assert_eq!(
            lines,
            vec!["Group:  Nobody", "", "Filter: Aws Account", "        NO TAG VALUES"]
        );
    }

    #[test]
    fn test_unresolved_line() {
        let mut lines = Vec::new();
        render_group(&mut lines, &ResolvedGroup::Unresolved { ref_id: "5841155522569" });
        assert_eq!(
            lines,
            vec![
                "Group:  5841155522569",
                "",
                "        UNRESOLVED REFERENCE '5841155522569'",
            ]
        );
    }

    #[test]
    fn test_render_is_deterministic() {
        let blocks = vec![ResolvedBlock {
            name: "owners",
            kind: BlockKind::Categorize,
            groups: vec![ResolvedGroup::Dynamic {
                name: "Marketing",
                asset: "AzureTaggableAsset",
                conditions: vec![TagCondition::Match {
                    tag: "cht_owner",
                    value: "Marketing".to_string(),
                }],
            }],
        }];
        assert_eq!(render("P", &blocks), render("P", &blocks));
    }
}
