//! Markdown metadata extraction for resource marker files.
//!
//! Marker files (`SKILL.md`, `AGENT.md`, `COMMAND.md`) usually open with YAML
//! frontmatter:
//!
//! ```markdown
//! ---
//! name: react-patterns
//! description: Component patterns for React codebases
//! version: 1.2.0
//! allowed-tools: [Read, Grep]
//! ---
//! # React Patterns
//! ```
//!
//! When the frontmatter is missing or unparseable, the first `# Heading`
//! supplies the name and the first paragraph after it supplies the
//! description. Parsing never fails; a broken preamble only costs metadata.

use gray_matter::Matter;
use gray_matter::engine::YAML;
use serde_yaml::Value;
use tracing::warn;

use crate::constants::MAX_FRONTMATTER_SIZE_BYTES;

/// Metadata extracted from a marker file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceMetadata {
    pub name: Option<String>,
    pub description: Option<String>,
    pub version: Option<String>,
    /// `allowed-tools` (skills)
    pub allowed_tools: Vec<String>,
    /// `model` (agents)
    pub model: Option<String>,
    /// `tools` (agents)
    pub tools: Vec<String>,
    /// `argument-hint` (commands)
    pub argument_hint: Option<String>,
    /// Whether a YAML preamble was found and parsed
    pub has_frontmatter: bool,
}

/// Parse frontmatter from `content`, falling back to heading/paragraph heuristics.
#[must_use]
pub fn parse_metadata(content: &str) -> ResourceMetadata {
    let (data, body) = split_frontmatter(content);

    let mut meta = ResourceMetadata::default();
    if let Some(Value::Mapping(map)) = data {
        meta.has_frontmatter = true;
        let field = |key: &str| map.get(Value::String(key.to_string()));

        meta.name = field("name").and_then(scalar_string);
        meta.description = field("description").and_then(scalar_string);
        meta.version = field("version").and_then(scalar_string);
        meta.model = field("model").and_then(scalar_string);
        meta.argument_hint = field("argument-hint")
            .or_else(|| field("argument_hint"))
            .and_then(scalar_string);
        meta.allowed_tools = field("allowed-tools")
            .or_else(|| field("allowed_tools"))
            .map(string_list)
            .unwrap_or_default();
        meta.tools = field("tools").map(string_list).unwrap_or_default();
    }

    if meta.name.is_none() {
        meta.name = first_heading(&body);
    }
    if meta.description.is_none() {
        meta.description = first_paragraph(&body);
    }
    meta
}

/// Split YAML frontmatter from the body.
///
/// Returns `(None, content)` when there is no preamble, when it exceeds
/// [`MAX_FRONTMATTER_SIZE_BYTES`], or when it is not valid YAML.
#[must_use]
pub fn split_frontmatter(content: &str) -> (Option<Value>, String) {
    if !content.trim_start().starts_with("---") {
        return (None, content.to_string());
    }

    let matter = Matter::<YAML>::new();
    match matter.parse::<Value>(content) {
        Ok(parsed) => {
            if parsed.matter.len() > MAX_FRONTMATTER_SIZE_BYTES {
                warn!(
                    "Ignoring frontmatter larger than {} KB",
                    MAX_FRONTMATTER_SIZE_BYTES / 1024
                );
                return (None, parsed.content);
            }
            (parsed.data, parsed.content)
        }
        Err(e) => {
            warn!("Unable to parse YAML frontmatter, using document heuristics: {e}");
            (None, strip_preamble(content))
        }
    }
}

/// Drop a `---` delimited preamble without parsing it.
fn strip_preamble(content: &str) -> String {
    let trimmed = content.trim_start();
    let Some(rest) = trimmed.strip_prefix("---") else {
        return content.to_string();
    };
    match rest.find("\n---") {
        Some(end) => {
            let after = &rest[end + 4..];
            after.strip_prefix('\n').or_else(|| after.strip_prefix("\r\n")).unwrap_or(after).to_string()
        }
        None => content.to_string(),
    }
}

fn scalar_string(value: &Value) -> Option<String> {
    let s = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    (!s.is_empty()).then_some(s)
}

/// Accept both `[A, B]` and `"A, B"`.
fn string_list(value: &Value) -> Vec<String> {
    match value {
        Value::Sequence(items) => items.iter().filter_map(scalar_string).collect(),
        Value::String(s) => s
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

/// Text of the first `# ` heading.
#[must_use]
pub fn first_heading(body: &str) -> Option<String> {
    body.lines()
        .find_map(|line| line.trim_start().strip_prefix("# "))
        .map(|h| h.trim().to_string())
        .filter(|h| !h.is_empty())
}

/// First block of non-heading lines, joined with spaces.
#[must_use]
pub fn first_paragraph(body: &str) -> Option<String> {
    let mut in_paragraph = false;
    let mut in_fence = false;
    let mut paragraph = String::new();

    for line in body.lines() {
        let trimmed = line.trim();

        if trimmed.starts_with("```") {
            if in_paragraph {
                break;
            }
            in_fence = !in_fence;
            continue;
        }
        if in_fence || trimmed.starts_with('#') || (trimmed.is_empty() && !in_paragraph) {
            continue;
        }

        if !trimmed.is_empty() {
            in_paragraph = true;
            if !paragraph.is_empty() {
                paragraph.push(' ');
            }
            paragraph.push_str(trimmed);
        } else {
            break;
        }
    }

    (!paragraph.is_empty()).then_some(paragraph)
}
