//! Two-way link consistency.
//!
//! A two-way link and its symmetric counterpart must point at each other and at
//! each other's tables. This rule has no DDL; it only reads field records.

use serde_json::Value;

use super::context::SchemaRuleContext;
use super::ValidationResult;
use crate::error::Result;
use crate::introspect::FieldRecord;

fn option_str<'a>(record: &'a FieldRecord, key: &str) -> Option<&'a str> {
    record.options.get(key).and_then(Value::as_str)
}

pub(super) async fn validate(
    ctx: &SchemaRuleContext<'_>,
    field_id: &str,
    table_id: &str,
    foreign_table_id: &str,
    symmetric_field_id: &str,
) -> Result<ValidationResult> {
    let record = ctx
        .introspector
        .field_record(symmetric_field_id)
        .await?
        .filter(|r| !r.deleted);
    let Some(record) = record else {
        return Ok(ValidationResult::missing(format!(
            "symmetric field {} of {}",
            symmetric_field_id, field_id
        )));
    };

    if record.kind != "link" || record.is_lookup {
        return Ok(ValidationResult::extra(format!(
            "symmetric field {} is a {}{} field, expected a link",
            symmetric_field_id,
            if record.is_lookup { "lookup " } else { "" },
            record.kind
        )));
    }

    let mut missing = Vec::new();
    let mut extra = Vec::new();
    match option_str(&record, "symmetricFieldId") {
        None => missing.push(format!(
            "back-reference from {} to {}",
            symmetric_field_id, field_id
        )),
        Some(back) if back != field_id => extra.push(format!(
            "symmetric field {} is shared: it points back to {}, not {}",
            symmetric_field_id, back, field_id
        )),
        Some(_) => {}
    }
    if record.table_id != foreign_table_id {
        extra.push(format!(
            "symmetric field {} lives in table {}, expected {}",
            symmetric_field_id, record.table_id, foreign_table_id
        ));
    }
    match option_str(&record, "foreignTableId") {
        Some(t) if t == table_id => {}
        other => extra.push(format!(
            "symmetric field {} links to table {}, expected {}",
            symmetric_field_id,
            other.unwrap_or("<none>"),
            table_id
        )),
    }
    Ok(ValidationResult::from_findings(missing, extra))
}
