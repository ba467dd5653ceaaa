//! Live schema checking.
//!
//! [`SchemaChecker`] compares a table's expected rules with the live catalog
//! and reports progress as a lazy [`Stream`] of [`SchemaCheckResult`]s. For
//! each field it first announces every rule as `pending`, then walks the rules
//! in dependency order emitting `running` followed by a terminal status.
//!
//! Nothing is queried until the consumer polls for the next item, so dropping
//! the stream early stops all catalog access. Rules whose dependencies failed
//! are not validated at all:
//!
//! - required rules report `error` and count as failed for their dependents
//! - optional rules report `warn` and count as satisfied

mod types;

pub use types::{CheckStatus, CheckSummary, SchemaCheckResult};

use std::collections::{HashMap, HashSet, VecDeque};
use std::panic::AssertUnwindSafe;

use futures::stream::{self, BoxStream, StreamExt};
use futures::FutureExt;
use tracing::{debug, warn};

use crate::core::policy::{MetadataTables, PersistencePolicy};
use crate::core::schema::{Field, Table};
use crate::factory::RuleFactory;
use crate::introspect::SchemaIntrospector;
use crate::resolver;
use crate::rules::{SchemaRule, SchemaRuleContext};

/// Message reported for rules skipped because a dependency failed.
pub const SKIPPED_MESSAGE: &str = "Skipped: dependencies not satisfied";

/// Checks tables against the live catalog.
#[derive(Clone, Copy)]
pub struct SchemaChecker<'a> {
    introspector: &'a dyn SchemaIntrospector,
    metadata: &'a MetadataTables,
    policy: &'a PersistencePolicy,
}

impl<'a> SchemaChecker<'a> {
    pub fn new(
        introspector: &'a dyn SchemaIntrospector,
        metadata: &'a MetadataTables,
        policy: &'a PersistencePolicy,
    ) -> Self {
        Self {
            introspector,
            metadata,
            policy,
        }
    }

    /// Check every field of the table.
    pub fn check_table(&self, table: &'a Table) -> BoxStream<'a, SchemaCheckResult> {
        let fields = table.fields.iter().collect();
        self.stream(table, fields)
    }

    /// Check a single field by id; an unknown id yields one error result.
    pub fn check_field(&self, table: &'a Table, field_id: &str) -> BoxStream<'a, SchemaCheckResult> {
        match table.field(field_id) {
            Some(field) => self.stream(table, vec![field]),
            None => {
                let result = field_failure(
                    table,
                    field_id,
                    "lookup",
                    format!("Field {} not found in table {}", field_id, table.id),
                );
                stream::iter(vec![result]).boxed()
            }
        }
    }

    fn stream(&self, table: &'a Table, fields: Vec<&'a Field>) -> BoxStream<'a, SchemaCheckResult> {
        let state = CheckState {
            checker: *self,
            table,
            fields: fields.into(),
            factory: RuleFactory::new(self.policy),
            queued: VecDeque::new(),
            current: None,
        };
        stream::unfold(state, |mut state| async move {
            let item = state.next_result().await?;
            Some((item, state))
        })
        .boxed()
    }

    fn rule_context(&self) -> SchemaRuleContext<'a> {
        SchemaRuleContext::new(self.introspector, self.metadata)
    }
}

/// Walk over one field's resolved rules.
struct FieldRun {
    rules: Vec<SchemaRule>,
    depths: HashMap<String, usize>,
    /// Rule id → satisfied, for rules already decided.
    satisfied: HashMap<String, bool>,
    next: usize,
    announced_running: bool,
}

struct CheckState<'a> {
    checker: SchemaChecker<'a>,
    table: &'a Table,
    fields: VecDeque<&'a Field>,
    factory: RuleFactory<'a>,
    queued: VecDeque<SchemaCheckResult>,
    current: Option<FieldRun>,
}

impl<'a> CheckState<'a> {
    async fn next_result(&mut self) -> Option<SchemaCheckResult> {
        loop {
            if let Some(result) = self.queued.pop_front() {
                return Some(result);
            }
            if let Some(run) = self.current.as_mut() {
                if run.next < run.rules.len() {
                    return Some(step(self.checker, self.table, run).await);
                }
                self.current = None;
                continue;
            }
            let field = self.fields.pop_front()?;
            self.start_field(field);
        }
    }

    /// Build and order the field's rules, queueing a `pending` result for each.
    fn start_field(&mut self, field: &Field) {
        let rules = match self.factory.field_rules(self.table, field) {
            Ok(rules) => rules,
            Err(e) => {
                warn!("Cannot build rules for field {}: {}", field.id, e);
                self.queued
                    .push_back(field_failure(self.table, &field.id, "rules", e.to_string()));
                return;
            }
        };
        let ordered: Vec<SchemaRule> = match resolver::resolve(&rules) {
            Ok(ordered) => ordered.into_iter().cloned().collect(),
            Err(e) => {
                warn!("Cannot order rules for field {}: {}", field.id, e);
                self.queued.push_back(field_failure(
                    self.table,
                    &field.id,
                    "dependencies",
                    e.to_string(),
                ));
                return;
            }
        };
        debug!("Checking {} rules for field {}", ordered.len(), field.id);

        let depths = rule_depths(&ordered);
        for rule in &ordered {
            let depth = depths.get(&rule.id).copied().unwrap_or(0);
            self.queued
                .push_back(rule_result(self.table, rule, depth, CheckStatus::Pending));
        }
        self.current = Some(FieldRun {
            rules: ordered,
            depths,
            satisfied: HashMap::new(),
            next: 0,
            announced_running: false,
        });
    }
}

/// Advance a field run by one result.
async fn step(checker: SchemaChecker<'_>, table: &Table, run: &mut FieldRun) -> SchemaCheckResult {
    let rule = &run.rules[run.next];
    let depth = run.depths.get(&rule.id).copied().unwrap_or(0);

    let blocked = rule
        .dependencies
        .iter()
        .any(|dep| run.satisfied.get(dep) == Some(&false));
    if blocked {
        let status = if rule.required {
            CheckStatus::Error
        } else {
            CheckStatus::Warn
        };
        let mut result = rule_result(table, rule, depth, status);
        result.message = Some(SKIPPED_MESSAGE.to_string());
        run.satisfied.insert(rule.id.clone(), !rule.required);
        run.next += 1;
        return result;
    }

    if !run.announced_running {
        run.announced_running = true;
        return rule_result(table, rule, depth, CheckStatus::Running);
    }

    let ctx = checker.rule_context();
    let outcome = AssertUnwindSafe(rule.is_valid(&ctx)).catch_unwind().await;
    let mut result = rule_result(table, rule, depth, CheckStatus::Success);
    let satisfied = match outcome {
        Ok(Ok(validation)) => {
            let satisfied = validation.valid || !rule.required;
            if !validation.valid {
                result.status = if rule.required {
                    CheckStatus::Error
                } else {
                    CheckStatus::Warn
                };
                result.message = Some(validation.describe());
            }
            result.missing = validation.missing;
            result.extra = validation.extra;
            satisfied
        }
        Ok(Err(e)) => {
            result.status = CheckStatus::Error;
            result.message = Some(e.to_string());
            false
        }
        Err(panic) => {
            result.status = CheckStatus::Error;
            result.message = Some(format!("Validation panicked: {}", panic_message(&*panic)));
            false
        }
    };
    debug!("Rule {} finished with {}", rule.id, result.status);

    run.satisfied.insert(rule.id.clone(), satisfied);
    run.next += 1;
    run.announced_running = false;
    result
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn rule_result(
    table: &Table,
    rule: &SchemaRule,
    depth: usize,
    status: CheckStatus,
) -> SchemaCheckResult {
    SchemaCheckResult {
        id: rule.id.clone(),
        table_id: table.id.clone(),
        field_id: rule.field_id.clone(),
        description: rule.description.clone(),
        status,
        message: None,
        missing: Vec::new(),
        extra: Vec::new(),
        dependencies: rule.dependencies.clone(),
        required: rule.required,
        depth,
    }
}

fn field_failure(table: &Table, field_id: &str, stage: &str, message: String) -> SchemaCheckResult {
    SchemaCheckResult {
        id: format!("{}:{}", field_id, stage),
        table_id: table.id.clone(),
        field_id: field_id.to_string(),
        description: format!("Field {} {}", field_id, stage),
        status: CheckStatus::Error,
        message: Some(message),
        missing: Vec::new(),
        extra: Vec::new(),
        dependencies: Vec::new(),
        required: true,
        depth: 0,
    }
}

/// Longest in-batch dependency chain above each rule (0 for roots).
pub fn rule_depths(rules: &[SchemaRule]) -> HashMap<String, usize> {
    let by_id: HashMap<&str, &SchemaRule> = rules.iter().map(|r| (r.id.as_str(), r)).collect();
    let mut depths = HashMap::new();
    for rule in rules {
        let mut visiting = HashSet::new();
        depth_of(rule, &by_id, &mut depths, &mut visiting);
    }
    depths
}

fn depth_of<'r>(
    rule: &'r SchemaRule,
    by_id: &HashMap<&str, &'r SchemaRule>,
    depths: &mut HashMap<String, usize>,
    visiting: &mut HashSet<&'r str>,
) -> usize {
    if let Some(&depth) = depths.get(&rule.id) {
        return depth;
    }
    if !visiting.insert(rule.id.as_str()) {
        return 0;
    }
    let depth = rule
        .dependencies
        .iter()
        .filter_map(|dep| by_id.get(dep.as_str()).copied())
        .map(|parent| depth_of(parent, by_id, depths, visiting) + 1)
        .max()
        .unwrap_or(0);
    visiting.remove(rule.id.as_str());
    depths.insert(rule.id.clone(), depth);
    depth
}
