//! Core data model: nodes, edges, framework metadata, index runs and repo-map entries.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::IndexError;

/// Kind of a chunk. `File` and `Text` cover whole files; the rest are symbols.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    File,
    Text,
    Function,
    Method,
    Class,
    Struct,
    Enum,
    Trait,
    Interface,
    TypeAlias,
    Impl,
    Module,
    Constant,
    RouteHandler,
}

impl NodeKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Text => "text",
            Self::Function => "function",
            Self::Method => "method",
            Self::Class => "class",
            Self::Struct => "struct",
            Self::Enum => "enum",
            Self::Trait => "trait",
            Self::Interface => "interface",
            Self::TypeAlias => "type_alias",
            Self::Impl => "impl",
            Self::Module => "module",
            Self::Constant => "constant",
            Self::RouteHandler => "route_handler",
        }
    }

    /// Whether this node spans a whole file rather than a symbol.
    #[must_use]
    pub fn is_whole_file(self) -> bool {
        matches!(self, Self::File | Self::Text)
    }

    /// Kinds that can be the target of a `uses_type` reference.
    #[must_use]
    pub fn defines_type(self) -> bool {
        matches!(
            self,
            Self::Class | Self::Struct | Self::Enum | Self::Trait | Self::Interface | Self::TypeAlias
        )
    }

    /// Kinds that can be the target of a `calls` reference.
    #[must_use]
    pub fn is_callable(self) -> bool {
        matches!(
            self,
            Self::Function | Self::Method | Self::RouteHandler | Self::Class | Self::Struct
        )
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeKind {
    type Err = IndexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "file" => Self::File,
            "text" => Self::Text,
            "function" => Self::Function,
            "method" => Self::Method,
            "class" => Self::Class,
            "struct" => Self::Struct,
            "enum" => Self::Enum,
            "trait" => Self::Trait,
            "interface" => Self::Interface,
            "type_alias" => Self::TypeAlias,
            "impl" => Self::Impl,
            "module" => Self::Module,
            "constant" => Self::Constant,
            "route_handler" => Self::RouteHandler,
            other => return Err(IndexError::Other(format!("unknown node kind: {other}"))),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relationship {
    Contains,
    Calls,
    UsesType,
    Imports,
}

impl Relationship {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Contains => "contains",
            Self::Calls => "calls",
            Self::UsesType => "uses_type",
            Self::Imports => "imports",
        }
    }
}

impl fmt::Display for Relationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Relationship {
    type Err = IndexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "contains" => Self::Contains,
            "calls" => Self::Calls,
            "uses_type" => Self::UsesType,
            "imports" => Self::Imports,
            other => return Err(IndexError::Other(format!("unknown relationship: {other}"))),
        })
    }
}

/// Placeholder target for an unresolved reference to a symbol by name.
#[must_use]
pub fn symbol_ref(name: &str) -> String {
    format!("symbol:{name}")
}

/// Placeholder target for an import specifier.
#[must_use]
pub fn module_ref(specifier: &str) -> String {
    format!("module:{specifier}")
}

/// Next.js app-router segment kind, derived from the file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SegmentKind {
    Page,
    Layout,
    Route,
    Loading,
    Error,
    NotFound,
    Template,
    Default,
    Middleware,
    Other,
}

/// Framework routing metadata attached to file and route-handler nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameworkMeta {
    pub framework: String,
    pub route_path: Option<String>,
    pub segment: SegmentKind,
    pub is_client: bool,
    pub is_server: bool,
    pub runtime: Option<String>,
}

/// A chunk of a source file: the whole file or one symbol in it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeNode {
    pub id: String,
    pub kind: NodeKind,
    pub name: String,
    pub filepath: String,
    /// 1-based, inclusive.
    pub start_line: usize,
    /// 1-based, inclusive.
    pub end_line: usize,
    pub content: String,
    pub properties: serde_json::Map<String, serde_json::Value>,
    pub framework: Option<FrameworkMeta>,
    pub import_deps: Vec<String>,
    pub file_hash: String,
    pub repo_id: String,
}

impl CodeNode {
    /// Deterministic id from path and line range.
    #[must_use]
    pub fn make_id(filepath: &str, start_line: usize, end_line: usize) -> String {
        format!("{filepath}:{start_line}-{end_line}")
    }

    #[must_use]
    pub fn language(&self) -> Option<&str> {
        self.properties.get("language").and_then(|v| v.as_str())
    }

    #[must_use]
    pub fn signature(&self) -> &str {
        self.properties
            .get("signature")
            .and_then(|v| v.as_str())
            .unwrap_or_else(|| self.content.lines().next().unwrap_or_default().trim())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub source_id: String,
    pub target_id: String,
    pub relationship: Relationship,
    pub properties: serde_json::Map<String, serde_json::Value>,
}

impl Edge {
    #[must_use]
    pub fn new(source_id: impl Into<String>, target_id: impl Into<String>, relationship: Relationship) -> Self {
        Self {
            source_id: source_id.into(),
            target_id: target_id.into(),
            relationship,
            properties: serde_json::Map::new(),
        }
    }

    #[must_use]
    pub fn with_property(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.properties.insert(key.to_owned(), value.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Pending,
    Success,
    Failed,
}

impl RunStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }
}

impl FromStr for RunStatus {
    type Err = IndexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "success" => Ok(Self::Success),
            "failed" => Ok(Self::Failed),
            other => Err(IndexError::Other(format!("unknown run status: {other}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexRun {
    pub id: i64,
    pub repo_root: String,
    pub config_hash: String,
    pub created_at: String,
    pub status: RunStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Dir,
    File,
    Symbol,
}

impl EntryKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Dir => "dir",
            Self::File => "file",
            Self::Symbol => "symbol",
        }
    }
}

impl FromStr for EntryKind {
    type Err = IndexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dir" => Ok(Self::Dir),
            "file" => Ok(Self::File),
            "symbol" => Ok(Self::Symbol),
            other => Err(IndexError::Other(format!("unknown entry kind: {other}"))),
        }
    }
}

/// One row of a persisted repo map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepoMapEntry {
    pub kind: EntryKind,
    pub path: String,
    pub symbol_name: Option<String>,
    pub signature: Option<String>,
    pub start_line: Option<usize>,
    pub end_line: Option<usize>,
    pub importance: f32,
    pub summary: Option<String>,
}
