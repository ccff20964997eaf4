//! The tool dispatcher: named tool calls in, query/editor results out.
//!
//! A flat registry maps every tool name to an argument shape and a handler;
//! there is no transport parsing here and nothing dynamic beyond the name
//! lookup. Argument objects are validated by deserializing into per-tool
//! param structs (unknown fields are rejected); shape violations surface as
//! `invalid_argument` errors before any lock is taken.

use doctree_core::{query, InsertPosition, SectionEditor};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{McpError, McpResult};
use crate::state::ServerState;

/// The names of every tool this dispatcher serves, in listing order.
pub const TOOL_NAMES: [&str; 13] = [
    "get_structure",
    "get_section",
    "get_sections",
    "get_sections_by_level",
    "get_root_files_structure",
    "get_main_chapters",
    "search_content",
    "get_metadata",
    "get_dependencies",
    "validate_structure",
    "refresh_index",
    "update_section",
    "insert_section",
];

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct StructureParams {
    #[serde(default)]
    max_depth: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SectionParams {
    path: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct LevelParams {
    level: usize,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SearchParams {
    query: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct MetadataParams {
    #[serde(default)]
    path: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct UpdateParams {
    path: String,
    content: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct InsertParams {
    parent_path: String,
    title: String,
    content: String,
    #[serde(default)]
    position: InsertPosition,
}

fn parse<T: serde::de::DeserializeOwned>(arguments: Value) -> McpResult<T> {
    serde_json::from_value(arguments).map_err(|e| McpError::InvalidArguments(e.to_string()))
}

fn to_value<T: serde::Serialize>(payload: T) -> McpResult<Value> {
    serde_json::to_value(payload).map_err(|e| McpError::Protocol(e.to_string()))
}

/// Execute one named tool against the shared state.
///
/// # Errors
///
/// `invalid_argument` for unknown tools and schema violations; engine
/// errors pass through with their taxonomy kind intact.
pub async fn dispatch(state: &ServerState, name: &str, arguments: Value) -> McpResult<Value> {
    match name {
        "get_structure" => {
            let params: StructureParams = parse(arguments)?;
            let index = state.index.read().await;
            to_value(query::get_structure(&index, params.max_depth))
        },
        "get_section" => {
            let params: SectionParams = parse(arguments)?;
            let index = state.index.read().await;
            to_value(query::get_section(&index, &params.path)?)
        },
        "get_sections" | "get_sections_by_level" => {
            let params: LevelParams = parse(arguments)?;
            let index = state.index.read().await;
            to_value(query::sections_at_level(&index, params.level)?)
        },
        "get_root_files_structure" => {
            let index = state.index.read().await;
            to_value(query::get_root_files_structure(&index))
        },
        "get_main_chapters" => {
            let index = state.index.read().await;
            to_value(query::get_main_chapters(&index))
        },
        "search_content" => {
            let params: SearchParams = parse(arguments)?;
            let index = state.index.read().await;
            to_value(query::search_content(&index, &params.query)?)
        },
        "get_metadata" => {
            let params: MetadataParams = parse(arguments)?;
            let index = state.index.read().await;
            match params.path {
                Some(path) => to_value(query::section_metadata(&index, &path)?),
                None => to_value(query::project_metadata(&index)),
            }
        },
        "get_dependencies" => {
            let index = state.index.read().await;
            to_value(query::get_dependencies(&index))
        },
        "validate_structure" => {
            let index = state.index.read().await;
            to_value(query::validate_structure(&index))
        },
        "refresh_index" => {
            let mut index = state.index.write().await;
            *index = state.indexer.build()?;
            to_value(query::project_metadata(&index))
        },
        "update_section" => {
            let params: UpdateParams = parse(arguments)?;
            let mut index = state.index.write().await;
            let editor = SectionEditor::with_suppressor(&state.indexer, state.suppressor.as_ref());
            to_value(editor.update_section(&mut index, &params.path, &params.content)?)
        },
        "insert_section" => {
            let params: InsertParams = parse(arguments)?;
            let mut index = state.index.write().await;
            let editor = SectionEditor::with_suppressor(&state.indexer, state.suppressor.as_ref());
            to_value(editor.insert_section(
                &mut index,
                &params.parent_path,
                &params.title,
                &params.content,
                params.position,
            )?)
        },
        other => Err(McpError::UnknownTool(other.to_string())),
    }
}

/// Tool descriptors for `tools/list`: name, description, and the JSON
/// schema of the arguments object.
#[must_use]
pub fn tool_definitions() -> Vec<Value> {
    let path_schema = |description: &str| {
        json!({
            "type": "object",
            "properties": {"path": {"type": "string", "description": description}},
            "required": ["path"],
            "additionalProperties": false
        })
    };
    let level_schema = json!({
        "type": "object",
        "properties": {"level": {"type": "integer", "minimum": 1, "maximum": 6}},
        "required": ["level"],
        "additionalProperties": false
    });
    let empty_schema = json!({"type": "object", "additionalProperties": false});

    vec![
        json!({
            "name": "get_structure",
            "description": "Flattened section hierarchy in source order, optionally pruned by depth",
            "inputSchema": {
                "type": "object",
                "properties": {"max_depth": {"type": "integer", "minimum": 1, "maximum": 6}},
                "additionalProperties": false
            }
        }),
        json!({
            "name": "get_section",
            "description": "Full payload of one section by dotted identifier",
            "inputSchema": path_schema("Dotted section identifier"),
        }),
        json!({
            "name": "get_sections",
            "description": "All sections at a heading level, in source order",
            "inputSchema": level_schema,
        }),
        json!({
            "name": "get_sections_by_level",
            "description": "Alias of get_sections",
            "inputSchema": level_schema,
        }),
        json!({
            "name": "get_root_files_structure",
            "description": "Per-root-file section subtrees; included files are hidden",
            "inputSchema": empty_schema,
        }),
        json!({
            "name": "get_main_chapters",
            "description": "Numbered level-2 chapters plus unnumbered level-1 sections",
            "inputSchema": empty_schema,
        }),
        json!({
            "name": "search_content",
            "description": "Case-insensitive substring search over titles and bodies",
            "inputSchema": {
                "type": "object",
                "properties": {"query": {"type": "string", "minLength": 1}},
                "required": ["query"],
                "additionalProperties": false
            }
        }),
        json!({
            "name": "get_metadata",
            "description": "Metadata for one section, or project totals when no path is given",
            "inputSchema": {
                "type": "object",
                "properties": {"path": {"type": "string"}},
                "additionalProperties": false
            }
        }),
        json!({
            "name": "get_dependencies",
            "description": "Include graph, cross-references, and the orphan check",
            "inputSchema": empty_schema,
        }),
        json!({
            "name": "validate_structure",
            "description": "Invariant self-check plus parser warnings from the last build",
            "inputSchema": empty_schema,
        }),
        json!({
            "name": "refresh_index",
            "description": "Full re-discovery and re-parse; returns the new project metadata",
            "inputSchema": empty_schema,
        }),
        json!({
            "name": "update_section",
            "description": "Replace a section's body in its source file, atomically",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "path": {"type": "string"},
                    "content": {"type": "string"}
                },
                "required": ["path", "content"],
                "additionalProperties": false
            }
        }),
        json!({
            "name": "insert_section",
            "description": "Insert a new child section relative to a parent, atomically",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "parent_path": {"type": "string"},
                    "title": {"type": "string"},
                    "content": {"type": "string"},
                    "position": {"type": "string", "enum": ["before", "after", "append"]}
                },
                "required": ["parent_path", "title", "content"],
                "additionalProperties": false
            }
        }),
    ]
}
