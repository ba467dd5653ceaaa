//! Persistence policy and the location of the product's metadata tables.

use serde::{Deserialize, Serialize};

use super::identifier::TableIdentifier;
use super::schema::{FieldKind, LinkOptions, Relationship};

/// Decisions about how logical values are physically stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PersistencePolicy {
    /// Store system fields (created/modified time and user, auto number) as
    /// generated columns over the base columns instead of plain columns.
    #[serde(default)]
    pub generated_system_columns: bool,
}

impl PersistencePolicy {
    /// Whether this field kind is persisted as a generated column.
    pub fn uses_generated_column(&self, kind: &FieldKind) -> bool {
        self.generated_system_columns && kind.system_source_column().is_some()
    }

    /// Whether a junction table for this link gets per-key secondary indexes.
    pub fn junction_secondary_indexes(&self, options: &LinkOptions) -> bool {
        options.relationship == Relationship::ManyMany
    }
}

/// Where the reference ledger and field records live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct MetadataTables {
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(default = "default_reference_table")]
    pub reference_table: String,
    #[serde(default = "default_field_table")]
    pub field_table: String,
}

impl Default for MetadataTables {
    fn default() -> Self {
        Self {
            schema: None,
            reference_table: default_reference_table(),
            field_table: default_field_table(),
        }
    }
}

impl MetadataTables {
    /// Table holding `(id, from_field_id, to_field_id)` dependency edges.
    pub fn reference(&self) -> TableIdentifier {
        TableIdentifier {
            schema: self.schema.clone(),
            table_name: self.reference_table.clone(),
        }
    }

    /// Table holding field records (`id, table_id, type, options, meta, ...`).
    pub fn field(&self) -> TableIdentifier {
        TableIdentifier {
            schema: self.schema.clone(),
            table_name: self.field_table.clone(),
        }
    }
}

fn default_reference_table() -> String {
    "reference".to_string()
}

fn default_field_table() -> String {
    "field".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_columns_only_for_system_kinds() {
        let policy = PersistencePolicy {
            generated_system_columns: true,
        };
        assert!(policy.uses_generated_column(&FieldKind::CreatedTime));
        assert!(policy.uses_generated_column(&FieldKind::AutoNumber));
        assert!(!policy.uses_generated_column(&FieldKind::Number));
        assert!(!PersistencePolicy::default().uses_generated_column(&FieldKind::CreatedTime));
    }

    #[test]
    fn test_metadata_defaults() {
        let tables = MetadataTables::default();
        assert_eq!(tables.reference().to_string(), "reference");
        assert_eq!(tables.field().to_string(), "field");
    }
}
