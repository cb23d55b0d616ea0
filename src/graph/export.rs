//! Cypher dump export: serialize a graph as Cypher statements.
//!
//! ```text
//! GraphSnapshot → export_cypher_dump() → CONSTRAINT / MERGE / CREATE statements
//!   → cypher-shell, Neo4j Browser, or any Cypher-compatible loader
//! ```
//!
//! Nodes carry a temporary `_gid` property while the script runs so edges can
//! find their endpoints; the last statement removes it. Nodes whose label has
//! a uniqueness constraint are written with `MERGE` on the key, so loading the
//! same dump twice does not duplicate them.

use std::collections::HashMap;
use std::io::Write;

use super::{GraphResult, GraphSnapshot, PropertyMap};

/// Write a snapshot as a Cypher script.
pub fn export_cypher_dump(snapshot: &GraphSnapshot, writer: &mut dyn Write) -> GraphResult<()> {
    writeln!(writer, "// graphlift Cypher dump")?;
    writeln!(writer, "// Nodes: {}", snapshot.nodes.len())?;
    writeln!(writer, "// Relationships: {}", snapshot.edges.len())?;
    writeln!(writer)?;

    let mut keys: HashMap<&str, &str> = HashMap::new();
    for c in &snapshot.constraints {
        writeln!(
            writer,
            "CREATE CONSTRAINT {} IF NOT EXISTS FOR (n:{}) REQUIRE n.{} IS UNIQUE;",
            c.name, c.label, c.property
        )?;
        keys.insert(c.label.as_str(), c.property.as_str());
    }
    if !snapshot.constraints.is_empty() {
        writeln!(writer)?;
    }

    for node in &snapshot.nodes {
        let key = keys
            .get(node.label.as_str())
            .and_then(|k| node.properties.get(*k).map(|v| (*k, v)));
        match key {
            Some((k, v)) => {
                let rest: PropertyMap = node
                    .properties
                    .iter()
                    .filter(|(name, _)| name.as_str() != k)
                    .map(|(name, value)| (name.clone(), value.clone()))
                    .collect();
                writeln!(
                    writer,
                    "MERGE (n:{} {{{}: {}}}) SET n += {{{}}}, n._gid = {};",
                    node.label,
                    k,
                    quote(v),
                    format_properties(&rest),
                    node.id
                )?;
            }
            None => {
                let props = format_properties(&node.properties);
                writeln!(
                    writer,
                    "CREATE (:{} {{_gid: {}{}}});",
                    node.label,
                    node.id,
                    if props.is_empty() { String::new() } else { format!(", {props}") }
                )?;
            }
        }
    }

    writeln!(writer)?;
    writeln!(writer, "// Relationships")?;
    for edge in &snapshot.edges {
        writeln!(
            writer,
            "MATCH (a {{_gid: {}}}), (b {{_gid: {}}}) MERGE (a)-[:{}]->(b);",
            edge.from, edge.to, edge.rel_type
        )?;
    }

    writeln!(writer)?;
    writeln!(writer, "MATCH (n) WHERE n._gid IS NOT NULL REMOVE n._gid;")?;
    Ok(())
}

/// Format properties as a Cypher map body (`key: 'value', ...`).
fn format_properties(props: &PropertyMap) -> String {
    props
        .iter()
        .map(|(k, v)| format!("{k}: {}", quote(v)))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Quote a value as a Cypher string literal.
fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}
