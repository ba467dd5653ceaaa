//! Table-level schema operations.
//!
//! [`SchemaRepository`] creates, alters and drops the physical schema of logical
//! tables. Every operation builds its rules fresh, resolves them, and executes
//! the resulting statements on [`ExecutionContext::executor`], so a caller
//! transaction always wins over the shared pool. Nothing here commits: the
//! caller owns the unit of work.

mod backfill;
mod mutation;

pub use backfill::{ComputedFieldBackfill, NoOpBackfill};
pub use mutation::{added_fields, plan_mutations, MutationPlan, TableMutation};

use std::sync::Arc;

use tracing::{debug, info};

use crate::core::identifier::db_field_name_for;
use crate::core::policy::{MetadataTables, PersistencePolicy};
use crate::core::schema::{
    Field, Table, AUTO_NUMBER_COLUMN, CREATED_BY_COLUMN, CREATED_TIME_COLUMN, ID_COLUMN,
    LAST_MODIFIED_BY_COLUMN, LAST_MODIFIED_TIME_COLUMN, VERSION_COLUMN,
};
use crate::core::statement::Statement;
use crate::core::traits::ExecutionContext;
use crate::ddl::{self, ColumnDef};
use crate::drivers::RecordingExecutor;
use crate::error::Result;
use crate::factory::RuleFactory;
use crate::introspect::PgIntrospector;
use crate::resolver;
use crate::rules::{ApplyMode, SchemaRule, SchemaRuleContext};

/// Fill in a missing physical column name from the field id.
pub(crate) fn ensure_db_field_name(field: &mut Field) -> Result<()> {
    if field.db_field_name.is_none() {
        field.db_field_name = Some(db_field_name_for(&field.id)?);
    }
    Ok(())
}

/// Copy of `table` with every field's physical name filled in.
pub fn assign_db_field_names(table: &Table) -> Result<Table> {
    let mut table = table.clone();
    for field in &mut table.fields {
        ensure_db_field_name(field)?;
    }
    Ok(table)
}

/// Columns every table gets before any field is applied.
pub fn base_columns() -> Vec<ColumnDef> {
    vec![
        ColumnDef::new(ID_COLUMN, "text NOT NULL UNIQUE"),
        ColumnDef::new(AUTO_NUMBER_COLUMN, "serial PRIMARY KEY"),
        ColumnDef::new(CREATED_TIME_COLUMN, "timestamp with time zone NOT NULL DEFAULT now()"),
        ColumnDef::new(LAST_MODIFIED_TIME_COLUMN, "timestamp with time zone"),
        ColumnDef::new(CREATED_BY_COLUMN, "text NOT NULL"),
        ColumnDef::new(LAST_MODIFIED_BY_COLUMN, "text"),
        ColumnDef::new(VERSION_COLUMN, "integer NOT NULL"),
    ]
}

/// Creates, alters and drops physical tables.
pub struct SchemaRepository {
    policy: PersistencePolicy,
    metadata: MetadataTables,
    backfill: Arc<dyn ComputedFieldBackfill>,
}

impl SchemaRepository {
    pub fn new(
        policy: PersistencePolicy,
        metadata: MetadataTables,
        backfill: Arc<dyn ComputedFieldBackfill>,
    ) -> Self {
        Self {
            policy,
            metadata,
            backfill,
        }
    }

    /// Statements that create `table`, plus the table with every field named.
    ///
    /// Pure; [`insert`](Self::insert) executes the same statements.
    pub fn plan_insert(&self, table: &Table) -> Result<(Table, Vec<Statement>)> {
        let table = assign_db_field_names(table)?;
        let host = table.identifier()?;

        let mut stmts = Vec::new();
        if let Some(schema) = &host.schema {
            stmts.push(ddl::create_schema(schema)?);
        }
        stmts.push(ddl::create_table(&host, &base_columns())?);

        let rules = RuleFactory::new(&self.policy).table_rules(&table)?;
        stmts.extend(self.offline(ApplyMode::CreateTable, |ctx| resolver::up_all(&rules, ctx))?);
        Ok((table, stmts))
    }

    /// Statements that create every table, then re-apply cross-table keys.
    pub fn plan_insert_many(&self, tables: &[Table]) -> Result<(Vec<Table>, Vec<Statement>)> {
        let mut named = Vec::with_capacity(tables.len());
        let mut stmts = Vec::new();
        for table in tables {
            let (table, table_stmts) = self.plan_insert(table)?;
            named.push(table);
            stmts.extend(table_stmts);
        }
        stmts.extend(self.deferred_statements(&named)?);
        Ok((named, stmts))
    }

    /// Statements for `mutations` and the table they leave behind.
    pub fn plan_update(&self, table: &Table, mutations: &[TableMutation]) -> Result<MutationPlan> {
        let mut factory = RuleFactory::new(&self.policy);
        self.offline(ApplyMode::AlterTable, |ctx| {
            plan_mutations(&mut factory, ctx, table, mutations)
        })
    }

    /// Statements that drop `table`.
    pub fn plan_delete(&self, table: &Table) -> Result<Vec<Statement>> {
        Ok(vec![ddl::drop_table(&table.identifier()?)?])
    }

    /// Create the physical table and every field's schema.
    ///
    /// Fields without a physical name get one derived from their id; the
    /// returned table carries the assigned names.
    pub async fn insert(&self, ctx: &ExecutionContext<'_>, table: &Table) -> Result<Table> {
        let (table, stmts) = self.plan_insert(table)?;
        info!(
            "Creating table {} ({}) with {} fields",
            table.id,
            table.db_table_name,
            table.fields.len()
        );
        ctx.executor().execute_all(&stmts).await?;
        Ok(table)
    }

    /// Create several tables that may link to each other.
    ///
    /// Keys pointing at a table created later in the batch are skipped by
    /// their guards on the first pass and created by a second pass over the
    /// deferrable rules once every table exists.
    pub async fn insert_many(&self, ctx: &ExecutionContext<'_>, tables: &[Table]) -> Result<Vec<Table>> {
        let mut created = Vec::with_capacity(tables.len());
        for table in tables {
            created.push(self.insert(ctx, table).await?);
        }

        let deferred = self.deferred_statements(&created)?;
        debug!("Re-applying {} deferred statements", deferred.len());
        ctx.executor().execute_all(&deferred).await?;

        info!("Created {} tables", created.len());
        Ok(created)
    }

    /// Apply field mutations to an existing table.
    ///
    /// After the statements execute, the backfill runs once with every added
    /// field, and not at all when nothing was added.
    pub async fn update(
        &self,
        ctx: &ExecutionContext<'_>,
        table: &Table,
        mutations: &[TableMutation],
    ) -> Result<Table> {
        let plan = self.plan_update(table, mutations)?;

        info!(
            "Updating table {}: {} mutations, {} statements",
            table.id,
            mutations.len(),
            plan.statements.len()
        );
        ctx.executor().execute_all(&plan.statements).await?;

        let added = added_fields(mutations, &plan.table);
        if !added.is_empty() {
            debug!(
                "Backfilling {} added fields on {} ({})",
                added.len(),
                table.id,
                self.backfill.kind()
            );
            self.backfill.backfill_many(ctx, &plan.table, &added).await?;
        }
        Ok(plan.table)
    }

    /// Drop the physical table.
    pub async fn delete(&self, ctx: &ExecutionContext<'_>, table: &Table) -> Result<()> {
        let stmts = self.plan_delete(table)?;
        info!("Dropping table {} ({})", table.id, table.db_table_name);
        ctx.executor().execute_all(&stmts).await
    }

    fn deferred_statements(&self, tables: &[Table]) -> Result<Vec<Statement>> {
        let mut factory = RuleFactory::new(&self.policy);
        let mut deferrable: Vec<SchemaRule> = Vec::new();
        for table in tables {
            deferrable.extend(
                factory
                    .table_rules(table)?
                    .into_iter()
                    .filter(SchemaRule::is_deferrable),
            );
        }
        self.offline(ApplyMode::AlterTable, |ctx| resolver::up_all(&deferrable, ctx))
    }

    /// Run `f` with a rule context whose catalog is never reached.
    ///
    /// `up`/`down` are pure, so planning needs no connection.
    fn offline<T>(
        &self,
        mode: ApplyMode,
        f: impl FnOnce(&SchemaRuleContext<'_>) -> Result<T>,
    ) -> Result<T> {
        let detached = RecordingExecutor::new();
        let catalog = PgIntrospector::new(&detached, self.metadata.clone());
        f(&SchemaRuleContext::new(&catalog, &self.metadata).with_mode(mode))
    }
}
