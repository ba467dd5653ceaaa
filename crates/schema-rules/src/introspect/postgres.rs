//! PostgreSQL catalog introspection.

use async_trait::async_trait;
use tracing::debug;

use super::{
    ColumnInfo, ConstraintInfo, ConstraintKind, FieldRecord, IndexInfo, ReferenceEdge,
    SchemaIntrospector,
};
use crate::core::identifier::TableIdentifier;
use crate::core::policy::MetadataTables;
use crate::core::statement::Statement;
use crate::core::traits::Executor;
use crate::error::{Result, SchemaError};

const COLUMN_SQL: &str = r#"
    SELECT pg_catalog.format_type(a.atttypid, a.atttypmod) AS data_type,
           NOT a.attnotnull AS is_nullable,
           a.attgenerated = 's' AS is_generated,
           pg_catalog.pg_get_expr(d.adbin, d.adrelid) AS generation_expression
    FROM pg_catalog.pg_attribute a
    JOIN pg_catalog.pg_class c ON c.oid = a.attrelid
    JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
    LEFT JOIN pg_catalog.pg_attrdef d ON d.adrelid = a.attrelid AND d.adnum = a.attnum
    WHERE n.nspname = $1 AND c.relname = $2 AND a.attname = $3
      AND a.attnum > 0 AND NOT a.attisdropped
"#;

const INDEX_SQL: &str = r#"
    SELECT ix.indisunique AS is_unique,
           ARRAY(
               SELECT att.attname::text
               FROM unnest(ix.indkey::int2[]) WITH ORDINALITY AS k(attnum, ord)
               JOIN pg_catalog.pg_attribute att
                 ON att.attrelid = t.oid AND att.attnum = k.attnum
               ORDER BY k.ord
           ) AS columns
    FROM pg_catalog.pg_index ix
    JOIN pg_catalog.pg_class i ON i.oid = ix.indexrelid
    JOIN pg_catalog.pg_class t ON t.oid = ix.indrelid
    JOIN pg_catalog.pg_namespace n ON n.oid = t.relnamespace
    WHERE n.nspname = $1 AND t.relname = $2 AND i.relname = $3
"#;

const CONSTRAINT_SQL: &str = r#"
    SELECT con.contype::text AS kind,
           ARRAY(
               SELECT att.attname::text
               FROM unnest(con.conkey) WITH ORDINALITY AS k(attnum, ord)
               JOIN pg_catalog.pg_attribute att
                 ON att.attrelid = con.conrelid AND att.attnum = k.attnum
               ORDER BY k.ord
           ) AS columns,
           rn.nspname::text AS ref_schema,
           rt.relname::text AS ref_table,
           ARRAY(
               SELECT att.attname::text
               FROM unnest(con.confkey) WITH ORDINALITY AS k(attnum, ord)
               JOIN pg_catalog.pg_attribute att
                 ON att.attrelid = con.confrelid AND att.attnum = k.attnum
               ORDER BY k.ord
           ) AS ref_columns
    FROM pg_catalog.pg_constraint con
    JOIN pg_catalog.pg_class t ON t.oid = con.conrelid
    JOIN pg_catalog.pg_namespace n ON n.oid = t.relnamespace
    LEFT JOIN pg_catalog.pg_class rt ON rt.oid = con.confrelid
    LEFT JOIN pg_catalog.pg_namespace rn ON rn.oid = rt.relnamespace
    WHERE n.nspname = $1 AND t.relname = $2 AND con.conname = $3
"#;

/// Catalog introspector over an executor (pool or transaction).
pub struct PgIntrospector<'a> {
    executor: &'a dyn Executor,
    metadata: MetadataTables,
}

impl<'a> PgIntrospector<'a> {
    /// Create an introspector reading through the given executor.
    pub fn new(executor: &'a dyn Executor, metadata: MetadataTables) -> Self {
        Self { executor, metadata }
    }

    fn location(table: &TableIdentifier) -> (String, String) {
        (
            table.schema_or_public().to_string(),
            table.table_name.clone(),
        )
    }

    async fn query(&self, stmt: Statement, context: &str) -> Result<Vec<tokio_postgres::Row>> {
        debug!("Introspecting {}", context);
        self.executor
            .query(&stmt)
            .await
            .map_err(|e| match e {
                SchemaError::Infrastructure { .. } => e,
                other => SchemaError::infrastructure(other, context.to_string()),
            })
    }
}

fn row_error(e: tokio_postgres::Error, context: &str) -> SchemaError {
    SchemaError::infrastructure(e, format!("decoding {}", context))
}

#[async_trait]
impl SchemaIntrospector for PgIntrospector<'_> {
    async fn table_exists(&self, table: &TableIdentifier) -> Result<bool> {
        let (schema, name) = Self::location(table);
        let sql = r#"
            SELECT EXISTS (
                SELECT 1 FROM information_schema.tables
                WHERE table_schema = $1 AND table_name = $2
            )
        "#;
        let context = format!("table {}", table);
        let rows = self
            .query(
                Statement::with_params(sql, vec![schema.into(), name.into()]),
                &context,
            )
            .await?;
        match rows.first() {
            Some(row) => row.try_get::<_, bool>(0).map_err(|e| row_error(e, &context)),
            None => Ok(false),
        }
    }

    async fn column(&self, table: &TableIdentifier, column: &str) -> Result<Option<ColumnInfo>> {
        let (schema, name) = Self::location(table);
        let context = format!("column {}.{}", table, column);
        let rows = self
            .query(
                Statement::with_params(
                    COLUMN_SQL,
                    vec![schema.into(), name.into(), column.into()],
                ),
                &context,
            )
            .await?;
        let Some(row) = rows.first() else {
            return Ok(None);
        };
        Ok(Some(ColumnInfo {
            data_type: row.try_get(0).map_err(|e| row_error(e, &context))?,
            is_nullable: row.try_get(1).map_err(|e| row_error(e, &context))?,
            is_generated: row.try_get(2).map_err(|e| row_error(e, &context))?,
            generation_expression: row.try_get(3).map_err(|e| row_error(e, &context))?,
        }))
    }

    async fn index(&self, table: &TableIdentifier, name: &str) -> Result<Option<IndexInfo>> {
        let (schema, table_name) = Self::location(table);
        let context = format!("index {} on {}", name, table);
        let rows = self
            .query(
                Statement::with_params(
                    INDEX_SQL,
                    vec![schema.into(), table_name.into(), name.into()],
                ),
                &context,
            )
            .await?;
        let Some(row) = rows.first() else {
            return Ok(None);
        };
        Ok(Some(IndexInfo {
            is_unique: row.try_get(0).map_err(|e| row_error(e, &context))?,
            columns: row.try_get(1).map_err(|e| row_error(e, &context))?,
        }))
    }

    async fn constraint(
        &self,
        table: &TableIdentifier,
        name: &str,
    ) -> Result<Option<ConstraintInfo>> {
        let (schema, table_name) = Self::location(table);
        let context = format!("constraint {} on {}", name, table);
        let rows = self
            .query(
                Statement::with_params(
                    CONSTRAINT_SQL,
                    vec![schema.into(), table_name.into(), name.into()],
                ),
                &context,
            )
            .await?;
        let Some(row) = rows.first() else {
            return Ok(None);
        };
        let kind: String = row.try_get(0).map_err(|e| row_error(e, &context))?;
        let ref_schema: Option<String> = row.try_get(2).map_err(|e| row_error(e, &context))?;
        let ref_table: Option<String> = row.try_get(3).map_err(|e| row_error(e, &context))?;
        Ok(Some(ConstraintInfo {
            kind: ConstraintKind::from_code(&kind),
            columns: row.try_get(1).map_err(|e| row_error(e, &context))?,
            referenced_table: ref_table.map(|t| TableIdentifier {
                schema: ref_schema,
                table_name: t,
            }),
            referenced_columns: row.try_get(4).map_err(|e| row_error(e, &context))?,
        }))
    }

    async fn reference_edges(&self, field_id: &str) -> Result<Vec<ReferenceEdge>> {
        let sql = format!(
            "SELECT from_field_id, to_field_id FROM {} WHERE from_field_id = $1 OR to_field_id = $1",
            self.metadata.reference().qualified()?
        );
        let context = format!("reference edges of {}", field_id);
        let rows = self
            .query(Statement::with_params(sql, vec![field_id.into()]), &context)
            .await?;
        rows.iter()
            .map(|row| {
                Ok(ReferenceEdge {
                    from_field_id: row.try_get(0).map_err(|e| row_error(e, &context))?,
                    to_field_id: row.try_get(1).map_err(|e| row_error(e, &context))?,
                })
            })
            .collect()
    }

    async fn field_record(&self, field_id: &str) -> Result<Option<FieldRecord>> {
        let sql = format!(
            "SELECT id, table_id, type, COALESCE(is_lookup, false), options, meta, \
             deleted_time IS NOT NULL FROM {} WHERE id = $1",
            self.metadata.field().qualified()?
        );
        let context = format!("field record {}", field_id);
        let rows = self
            .query(Statement::with_params(sql, vec![field_id.into()]), &context)
            .await?;
        let Some(row) = rows.first() else {
            return Ok(None);
        };
        let options: Option<String> = row.try_get(4).map_err(|e| row_error(e, &context))?;
        let meta: Option<String> = row.try_get(5).map_err(|e| row_error(e, &context))?;
        Ok(Some(FieldRecord {
            id: row.try_get(0).map_err(|e| row_error(e, &context))?,
            table_id: row.try_get(1).map_err(|e| row_error(e, &context))?,
            kind: row.try_get(2).map_err(|e| row_error(e, &context))?,
            is_lookup: row.try_get(3).map_err(|e| row_error(e, &context))?,
            options: parse_json_text(options.as_deref()),
            meta: meta.as_deref().map(|m| parse_json_text(Some(m))),
            deleted: row.try_get(6).map_err(|e| row_error(e, &context))?,
        }))
    }
}

/// Metadata columns hold JSON as text; unparsable content reads as `null`.
fn parse_json_text(text: Option<&str>) -> serde_json::Value {
    text.filter(|t| !t.trim().is_empty())
        .and_then(|t| serde_json::from_str(t).ok())
        .unwrap_or(serde_json::Value::Null)
}
