//! Rules over the product's metadata tables: field `meta` flags and the
//! reference ledger.

use std::collections::BTreeSet;

use sha2::{Digest, Sha256};

use super::context::SchemaRuleContext;
use super::ValidationResult;
use crate::core::policy::MetadataTables;
use crate::core::statement::{SqlParam, Statement};
use crate::error::Result;
use crate::introspect::ReferenceEdge;

/// Deterministic ledger row id, so re-inserting an edge conflicts instead of
/// duplicating it.
pub fn reference_id(from_field_id: &str, to_field_id: &str) -> String {
    let digest = Sha256::digest(format!("{}:{}", from_field_id, to_field_id).as_bytes());
    let hex = format!("{:x}", digest);
    format!("ref{}", &hex[..20])
}

/// Distinct sources in first-seen order, without self references.
fn distinct_sources<'a>(field_id: &str, sources: &'a [String]) -> Vec<&'a str> {
    let mut seen = BTreeSet::new();
    sources
        .iter()
        .map(String::as_str)
        .filter(|s| *s != field_id && seen.insert(*s))
        .collect()
}

pub(super) fn set_meta(
    metadata: &MetadataTables,
    field_id: &str,
    key: &str,
    value: bool,
) -> Result<Vec<Statement>> {
    let sql = format!(
        "UPDATE {} SET meta = (COALESCE(NULLIF(meta, ''), '{{}}')::jsonb || jsonb_build_object($2::text, $3::boolean))::text WHERE id = $1",
        metadata.field().qualified()?
    );
    Ok(vec![Statement::with_params(
        sql,
        vec![field_id.into(), key.into(), value.into()],
    )])
}

pub(super) fn clear_meta(
    metadata: &MetadataTables,
    field_id: &str,
    key: &str,
) -> Result<Vec<Statement>> {
    let sql = format!(
        "UPDATE {} SET meta = (COALESCE(NULLIF(meta, ''), '{{}}')::jsonb - $2::text)::text WHERE id = $1",
        metadata.field().qualified()?
    );
    Ok(vec![Statement::with_params(
        sql,
        vec![field_id.into(), key.into()],
    )])
}

pub(super) async fn validate_meta(
    ctx: &SchemaRuleContext<'_>,
    field_id: &str,
    key: &str,
    value: bool,
) -> Result<ValidationResult> {
    let Some(record) = ctx.introspector.field_record(field_id).await? else {
        return Ok(ValidationResult::missing(format!("field record {}", field_id)));
    };
    let actual = record
        .meta
        .as_ref()
        .and_then(|meta| meta.get(key))
        .and_then(serde_json::Value::as_bool);
    match actual {
        Some(v) if v == value => Ok(ValidationResult::ok()),
        Some(v) => Ok(ValidationResult::extra(format!(
            "meta.{} of field {} is {}, expected {}",
            key, field_id, v, value
        ))),
        None => Ok(ValidationResult::missing(format!(
            "meta.{} of field {}",
            key, field_id
        ))),
    }
}

/// Remove stale incoming edges and insert every expected edge in one
/// statement, mirroring the single `DELETE` of [`delete_references`].
pub(super) fn insert_references(
    metadata: &MetadataTables,
    field_id: &str,
    sources: &[String],
) -> Result<Vec<Statement>> {
    let table = metadata.reference().qualified()?;
    let sources = distinct_sources(field_id, sources);
    let ids = sources.iter().map(|s| reference_id(s, field_id)).collect();

    let sql = format!(
        "WITH pruned AS (DELETE FROM {table} WHERE to_field_id = $1 AND NOT (from_field_id = ANY($2))) \
         INSERT INTO {table} (id, from_field_id, to_field_id) \
         SELECT edge.id, edge.from_field_id, $1::text FROM unnest($3::text[], $2::text[]) AS edge(id, from_field_id) \
         ON CONFLICT DO NOTHING",
        table = table
    );
    Ok(vec![Statement::with_params(
        sql,
        vec![
            field_id.into(),
            SqlParam::TextArray(sources.iter().map(|s| s.to_string()).collect()),
            SqlParam::TextArray(ids),
        ],
    )])
}

/// Removes edges in both directions.
pub(super) fn delete_references(
    metadata: &MetadataTables,
    field_id: &str,
) -> Result<Vec<Statement>> {
    Ok(vec![Statement::with_params(
        format!(
            "DELETE FROM {} WHERE from_field_id = $1 OR to_field_id = $1",
            metadata.reference().qualified()?
        ),
        vec![field_id.into()],
    )])
}

pub(super) async fn validate_references(
    ctx: &SchemaRuleContext<'_>,
    field_id: &str,
    sources: &[String],
) -> Result<ValidationResult> {
    let live = ctx.introspector.reference_edges(field_id).await?;
    let expected: Vec<ReferenceEdge> = distinct_sources(field_id, sources)
        .into_iter()
        .map(|source| ReferenceEdge::new(source, field_id))
        .collect();

    let missing = expected
        .iter()
        .filter(|edge| !live.contains(edge))
        .map(|edge| format!("reference {} -> {}", edge.from_field_id, edge.to_field_id))
        .collect();
    let extra = live
        .iter()
        .filter(|edge| edge.to_field_id == field_id && !expected.contains(edge))
        .map(|edge| format!("reference {} -> {}", edge.from_field_id, edge.to_field_id))
        .collect();
    Ok(ValidationResult::from_findings(missing, extra))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::introspect::{FieldRecord, MemoryIntrospector};

    fn record(meta: Option<serde_json::Value>) -> FieldRecord {
        FieldRecord {
            id: "fldL".into(),
            table_id: "tblA".into(),
            kind: "link".into(),
            is_lookup: false,
            options: serde_json::Value::Null,
            meta,
            deleted: false,
        }
    }

    // =========================================================================
    // Reference ledger
    // =========================================================================

    #[test]
    fn test_reference_id_is_stable() {
        assert_eq!(reference_id("fldA", "fldB"), reference_id("fldA", "fldB"));
        assert_ne!(reference_id("fldA", "fldB"), reference_id("fldB", "fldA"));
        assert_eq!(reference_id("fldA", "fldB").len(), 23);
    }

    #[test]
    fn test_insert_references_dedupes_and_prunes() {
        let metadata = MetadataTables::default();
        let sources = vec!["fldA".to_string(), "fldB".into(), "fldA".into(), "fldF".into()];
        let stmts = insert_references(&metadata, "fldF", &sources).unwrap();

        assert_eq!(stmts.len(), 1);
        let stmt = &stmts[0];
        assert!(stmt.sql.starts_with(
            "WITH pruned AS (DELETE FROM \"reference\" WHERE to_field_id = $1 AND NOT (from_field_id = ANY($2)))"
        ));
        assert!(stmt.sql.contains("INSERT INTO \"reference\" (id, from_field_id, to_field_id)"));
        assert!(stmt.sql.ends_with("ON CONFLICT DO NOTHING"));
        assert_eq!(stmt.params[0], SqlParam::Text("fldF".into()));
        assert_eq!(
            stmt.params[1],
            SqlParam::TextArray(vec!["fldA".into(), "fldB".into()])
        );
        assert_eq!(
            stmt.params[2],
            SqlParam::TextArray(vec![reference_id("fldA", "fldF"), reference_id("fldB", "fldF")])
        );
    }

    #[test]
    fn test_insert_references_without_sources_only_prunes() {
        let stmts = insert_references(&MetadataTables::default(), "fldF", &[]).unwrap();
        assert_eq!(stmts.len(), 1);
        assert_eq!(stmts[0].params[1], SqlParam::TextArray(Vec::new()));
        assert_eq!(stmts[0].params[2], SqlParam::TextArray(Vec::new()));
    }

    #[test]
    fn test_delete_references_covers_both_directions() {
        let stmts = delete_references(&MetadataTables::default(), "fldF").unwrap();
        assert_eq!(stmts.len(), 1);
        assert!(stmts[0].sql.contains("from_field_id = $1 OR to_field_id = $1"));
    }

    #[tokio::test]
    async fn test_validate_references_reports_missing_and_stale() {
        let catalog = MemoryIntrospector::new();
        let metadata = MetadataTables::default();
        let ctx = SchemaRuleContext::new(&catalog, &metadata);
        let sources = vec!["fldA".to_string(), "fldB".into()];

        catalog.add_reference(ReferenceEdge::new("fldA", "fldF"));
        catalog.add_reference(ReferenceEdge::new("fldOld", "fldF"));
        catalog.add_reference(ReferenceEdge::new("fldF", "fldDownstream"));

        let result = validate_references(&ctx, "fldF", &sources).await.unwrap();
        assert!(!result.valid);
        assert_eq!(result.missing, vec!["reference fldB -> fldF".to_string()]);
        assert_eq!(result.extra, vec!["reference fldOld -> fldF".to_string()]);
    }

    // =========================================================================
    // Field meta
    // =========================================================================

    #[test]
    fn test_meta_statements_target_field_table() {
        let metadata = MetadataTables {
            schema: Some("meta".into()),
            ..MetadataTables::default()
        };
        let up = set_meta(&metadata, "fldL", "hasOrderColumn", true).unwrap();
        assert!(up[0].sql.starts_with("UPDATE \"meta\".\"field\" SET meta ="));
        assert_eq!(up[0].params.len(), 3);
        let down = clear_meta(&metadata, "fldL", "hasOrderColumn").unwrap();
        assert!(down[0].sql.contains("- $2::text"));
    }

    #[tokio::test]
    async fn test_validate_meta() {
        let catalog = MemoryIntrospector::new();
        let metadata = MetadataTables::default();
        let ctx = SchemaRuleContext::new(&catalog, &metadata);

        let result = validate_meta(&ctx, "fldL", "hasOrderColumn", true).await.unwrap();
        assert_eq!(result.missing, vec!["field record fldL".to_string()]);

        catalog.put_field(record(None));
        let result = validate_meta(&ctx, "fldL", "hasOrderColumn", true).await.unwrap();
        assert_eq!(result.missing, vec!["meta.hasOrderColumn of field fldL".to_string()]);

        catalog.put_field(record(Some(serde_json::json!({"hasOrderColumn": true}))));
        assert!(validate_meta(&ctx, "fldL", "hasOrderColumn", true).await.unwrap().valid);
    }
}
