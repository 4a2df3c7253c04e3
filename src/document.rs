//! Desired-state documents
//!
//! One TOML file declares one plural resource:
//!
//! ```toml
//! kind = "network_groups"
//! instance = "datacenter"   # defaults to the file stem
//!
//! [items.g1]
//! network_groups = ["g2"]
//! literals = [{ type = "Network", value = "10.0.0.0/8" }]
//!
//! [items.g2]
//! literals = [{ type = "Host", value = "10.1.1.1" }]
//! ```

use anyhow::{Context, Result, bail};
use reconcile::{DesiredState, ResourceKind, kind};
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct RawDocument {
    kind: String,
    instance: Option<String>,
    #[serde(default)]
    items: DesiredState,
}

/// A loaded desired-state document
#[derive(Debug, Clone)]
pub struct Document {
    pub kind: &'static ResourceKind,
    /// Key under which the applied state is persisted
    pub instance: String,
    pub items: DesiredState,
}

impl Document {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self::parse(&content, &stem)
            .with_context(|| format!("Invalid document: {}", path.display()))
    }

    /// Parse document text; `default_instance` is used when none is declared
    pub fn parse(content: &str, default_instance: &str) -> Result<Self> {
        let raw: RawDocument = toml::from_str(content)?;

        let Some(kind) = ResourceKind::by_name(&raw.kind) else {
            let known: Vec<&str> = kind::ALL.iter().map(|k| k.name).collect();
            bail!(
                "Unknown kind '{}' (supported: {})",
                raw.kind,
                known.join(", ")
            );
        };

        let instance = raw
            .instance
            .filter(|i| !i.trim().is_empty())
            .unwrap_or_else(|| default_instance.to_string());
        if instance.is_empty() {
            bail!("Document has no instance name");
        }

        for (name, item) in &raw.items {
            if name.trim().is_empty() {
                bail!("Item names must not be empty");
            }
            for field in kind.reference_fields {
                if let Some(value) = item.get(field.attribute)
                    && !value.is_array()
                {
                    bail!(
                        "{name}: '{}' must be a list of {} names",
                        field.attribute,
                        kind.name
                    );
                }
            }
        }

        Ok(Self {
            kind,
            instance,
            items: raw.items,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    const GROUPS: &str = r#"
kind = "network_groups"

[items.g1]
network_groups = ["g2"]
description = "edge"

[items.g2]
literals = [{ type = "Host", value = "10.1.1.1" }]
"#;

    #[test]
    fn test_parse_network_groups() {
        let doc = Document::parse(GROUPS, "datacenter").unwrap();
        assert_eq!(doc.kind.name, "network_groups");
        assert_eq!(doc.instance, "datacenter");
        assert_eq!(doc.items.len(), 2);
        assert_eq!(doc.items["g1"].get("network_groups"), Some(&json!(["g2"])));
        assert_eq!(
            doc.items["g2"].get("literals"),
            Some(&json!([{ "type": "Host", "value": "10.1.1.1" }]))
        );
    }

    #[test]
    fn test_declared_instance_wins() {
        let doc = Document::parse("kind = \"hosts\"\ninstance = \"lab\"\n", "file").unwrap();
        assert_eq!(doc.instance, "lab");
        assert!(doc.items.is_empty());
    }

    #[test]
    fn test_unknown_kind() {
        let err = Document::parse("kind = \"widgets\"\n", "x").unwrap_err();
        assert!(err.to_string().contains("Unknown kind 'widgets'"));
    }

    #[test]
    fn test_reference_field_must_be_a_list() {
        let text = "kind = \"network_groups\"\n[items.g1]\nnetwork_groups = \"g2\"\n";
        assert!(Document::parse(text, "x").is_err());
    }

    #[test]
    fn test_load_uses_file_stem() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("core-hosts.toml");
        fs::write(&path, "kind = \"hosts\"\n[items.web]\nvalue = \"10.0.0.1\"\n").unwrap();

        let doc = Document::load(&path).unwrap();
        assert_eq!(doc.instance, "core-hosts");
        assert_eq!(doc.items["web"].get("value"), Some(&json!("10.0.0.1")));
    }
}
