//! Ontology mapping documents.
//!
//! The ontology is produced outside this crate (typically by a language model
//! prompted with the schema extract) and consumed here. It maps tables to node
//! classes and relationship files to edge types:
//!
//! ```json
//! {
//!   "nodes": [
//!     {"class": "Customer", "table": "customers", "csv_file": "customers.csv",
//!      "properties": [{"column": "id", "property": "nodeId", "type": "integer", "is_key": true}]}
//!   ],
//!   "edges": [
//!     {"relationship": "PLACED", "from_node": "Customer", "to_node": "Order",
//!      "csv_file": "fk_orders_customer_id_to_customers_id.csv"}
//!   ]
//! }
//! ```
//!
//! Generator output is often wrapped in a Markdown code fence; [`Ontology::parse`]
//! strips it. Labels, relationship types and property names end up in graph
//! statements, so they must be plain identifiers or the document is rejected.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for ontology operations.
pub type OntologyResult<T> = Result<T, OntologyError>;

/// Errors that make an ontology unusable.
#[derive(Debug, Error)]
pub enum OntologyError {
    #[error("failed to read ontology {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid ontology JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid {kind} '{name}': must match [A-Za-z_][A-Za-z0-9_]*")]
    InvalidIdentifier { kind: &'static str, name: String },
}

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern"));

/// Whether `name` can be used unquoted as a label, type or property.
pub fn is_identifier(name: &str) -> bool {
    IDENTIFIER.is_match(name)
}

/// One column-to-property mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyMapping {
    /// Source column in the table flat file.
    pub column: String,
    /// Graph property name.
    pub property: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,
    /// Marks the key property used for uniqueness and edge matching.
    #[serde(default)]
    pub is_key: bool,
}

/// A node class backed by one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeClass {
    /// Node label.
    #[serde(rename = "class")]
    pub label: String,
    pub table: String,
    pub csv_file: String,
    #[serde(default)]
    pub properties: Vec<PropertyMapping>,
}

impl NodeClass {
    /// The key property. When several are flagged, the first wins.
    pub fn key_property(&self) -> Option<&PropertyMapping> {
        self.properties.iter().find(|p| p.is_key)
    }

    /// Name of the key property.
    pub fn key_name(&self) -> Option<&str> {
        self.key_property().map(|p| p.property.as_str())
    }

    /// Constraint name used for the key's uniqueness constraint.
    pub fn constraint_name(&self) -> Option<String> {
        self.key_name()
            .map(|key| format!("constraint_{}_{}", self.label, key))
    }
}

/// An edge type backed by one relationship flat file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeType {
    /// Relationship type.
    pub relationship: String,
    /// Source node class label.
    pub from_node: String,
    /// Target node class label.
    pub to_node: String,
    pub csv_file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_table: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_table: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub via_column: Option<String>,
    /// `foreign_key` or `implicit`, informational.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

/// Non-fatal problems found in a loaded ontology.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OntologyWarning {
    NoKeyProperty { class: String },
    MultipleKeyProperties { class: String, used: String },
    DuplicateClass { class: String },
    UnknownNodeClass { relationship: String, class: String },
}

impl std::fmt::Display for OntologyWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoKeyProperty { class } => {
                write!(f, "node class {class} has no key property")
            }
            Self::MultipleKeyProperties { class, used } => {
                write!(f, "node class {class} has several key properties; using {used}")
            }
            Self::DuplicateClass { class } => {
                write!(f, "node class {class} is declared more than once")
            }
            Self::UnknownNodeClass {
                relationship,
                class,
            } => write!(f, "edge {relationship} references unknown node class {class}"),
        }
    }
}

/// A complete ontology mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ontology {
    #[serde(default)]
    pub nodes: Vec<NodeClass>,
    #[serde(default)]
    pub edges: Vec<EdgeType>,
    /// Directory that relative `csv_file` paths resolve against.
    #[serde(skip)]
    base_dir: Option<PathBuf>,
}

impl Ontology {
    /// Parse an ontology document, tolerating a surrounding code fence.
    pub fn parse(text: &str) -> OntologyResult<Self> {
        let ontology: Self = serde_json::from_str(strip_code_fence(text))?;
        ontology.check_identifiers()?;
        Ok(ontology)
    }

    /// Read an ontology file. Relative flat-file paths resolve against the
    /// file's directory.
    pub fn load(path: impl AsRef<Path>) -> OntologyResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| OntologyError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut ontology = Self::parse(&text)?;
        ontology.base_dir = path.parent().map(Path::to_path_buf);
        Ok(ontology)
    }

    /// Override the directory flat files resolve against.
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    pub fn base_dir(&self) -> Option<&Path> {
        self.base_dir.as_deref()
    }

    /// Location of a flat file referenced by the ontology.
    pub fn resolve(&self, csv_file: &str) -> PathBuf {
        let path = Path::new(csv_file);
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }

    /// Find a node class by label.
    pub fn node(&self, label: &str) -> Option<&NodeClass> {
        self.nodes.iter().find(|n| n.label == label)
    }

    /// Structural problems that do not prevent loading.
    pub fn warnings(&self) -> Vec<OntologyWarning> {
        let mut warnings = Vec::new();
        let mut seen = HashSet::new();

        for node in &self.nodes {
            if !seen.insert(node.label.as_str()) {
                warnings.push(OntologyWarning::DuplicateClass {
                    class: node.label.clone(),
                });
            }
            let keys: Vec<&PropertyMapping> = node.properties.iter().filter(|p| p.is_key).collect();
            match keys.as_slice() {
                [] => warnings.push(OntologyWarning::NoKeyProperty {
                    class: node.label.clone(),
                }),
                [_] => {}
                [first, ..] => warnings.push(OntologyWarning::MultipleKeyProperties {
                    class: node.label.clone(),
                    used: first.property.clone(),
                }),
            }
        }

        for edge in &self.edges {
            for class in [&edge.from_node, &edge.to_node] {
                if !seen.contains(class.as_str()) {
                    warnings.push(OntologyWarning::UnknownNodeClass {
                        relationship: edge.relationship.clone(),
                        class: class.clone(),
                    });
                }
            }
        }
        warnings
    }

    fn check_identifiers(&self) -> OntologyResult<()> {
        let check = |kind: &'static str, name: &str| {
            if is_identifier(name) {
                Ok(())
            } else {
                Err(OntologyError::InvalidIdentifier {
                    kind,
                    name: name.to_string(),
                })
            }
        };

        for node in &self.nodes {
            check("node class", &node.label)?;
            for prop in &node.properties {
                check("property", &prop.property)?;
            }
        }
        for edge in &self.edges {
            check("relationship type", &edge.relationship)?;
            check("node class", &edge.from_node)?;
            check("node class", &edge.to_node)?;
        }
        Ok(())
    }
}

/// Remove a Markdown code fence (```` ```json ```` or ```` ``` ````) around a document.
pub fn strip_code_fence(text: &str) -> &str {
    let mut body = text.trim();
    if let Some(rest) = body.strip_prefix("```json") {
        body = rest;
    } else if let Some(rest) = body.strip_prefix("```") {
        body = rest;
    }
    if let Some(rest) = body.strip_suffix("```") {
        body = rest;
    }
    body.trim()
}
