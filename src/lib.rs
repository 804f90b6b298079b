//! # perspective-sql
//!
//! Renders a CloudHealth perspective schema as readable, SQL-like
//! WHERE/AND/OR clauses that document how assets are categorized.
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use perspective_sql::prelude::*;
//!
//! let doc: serde_json::Value = serde_json::from_str(&std::fs::read_to_string("schema.json")?)?;
//! for line in perspective_sql::convert(&doc)? {
//!     println!("{}", line);
//! }
//! ```
//!
//! ## Pipeline
//!
//! | Stage      | Module       | Produces                        |
//! |------------|--------------|---------------------------------|
//! | Parse      | `parser`     | `SchemaDocument` (flat entities) |
//! | Index      | `index`      | ref-keyed lookup tables         |
//! | Resolve    | `resolver`   | `ResolvedBlock`s in input order |
//! | Render     | `renderer`   | text lines                      |
//!
//! Fetching the document (`source`) and writing the lines out happen
//! outside this pipeline.

pub mod ast;
pub mod config;
pub mod error;
pub mod index;
pub mod parser;
pub mod renderer;
pub mod resolver;
pub mod source;

pub mod prelude {
    pub use crate::ast::*;
    pub use crate::config::{ApiConfig, Config};
    pub use crate::error::*;
    pub use crate::index::SchemaIndex;
    pub use crate::parser::parse;
    pub use crate::renderer::{ToText, humanize, render};
    pub use crate::resolver::{ResolvedBlock, ResolvedGroup, resolve};
    pub use crate::source::SchemaSource;
}

/// Name printed when the document carries none.
pub const UNKNOWN_PERSPECTIVE: &str = "Unknown";

/// Convert a deserialized schema document into output lines.
///
/// # Example
///
/// ```
/// use serde_json::json;
///
/// let doc = json!([
///     {"type": "GroupBlock", "name": "env", "asset": "AwsAccount",
///      "tag_field": ["env"], "members": ["g1"]},
///     {"type": "DynamicGroup", "ref_id": "g1", "name": "Prod", "val": "prod"}
/// ]);
/// let lines = perspective_sql::convert(&doc).unwrap();
/// assert!(lines.contains(&"        WHERE tag env = 'prod'".to_string()));
/// ```
pub fn convert(doc: &serde_json::Value) -> Result<Vec<String>, error::PerspectiveError> {
    let schema = parser::parse(doc)?;
    let index = index::SchemaIndex::build(&schema);
    let blocks = resolver::resolve(&index);
    let name = schema.name.as_deref().unwrap_or(UNKNOWN_PERSPECTIVE);
    Ok(renderer::render(name, &blocks))
}

/// Like [`convert`], joined into one text block.
pub fn convert_to_string(doc: &serde_json::Value) -> Result<String, error::PerspectiveError> {
    Ok(convert(doc)?.join("\n"))
}
