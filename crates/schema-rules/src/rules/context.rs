//! Context handed to every rule operation.

use crate::core::policy::MetadataTables;
use crate::introspect::SchemaIntrospector;

/// Whether statements are generated for a table being created or for an
/// existing table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ApplyMode {
    /// The host table is created in the same batch; nothing to replace.
    CreateTable,
    /// The table already exists and may hold data.
    #[default]
    AlterTable,
}

/// Everything a rule needs besides its own payload.
///
/// Rules are stateless descriptors: the context is built per logical operation
/// and never stored.
#[derive(Clone, Copy)]
pub struct SchemaRuleContext<'a> {
    pub introspector: &'a dyn SchemaIntrospector,
    pub metadata: &'a MetadataTables,
    pub mode: ApplyMode,
}

impl<'a> SchemaRuleContext<'a> {
    pub fn new(introspector: &'a dyn SchemaIntrospector, metadata: &'a MetadataTables) -> Self {
        Self {
            introspector,
            metadata,
            mode: ApplyMode::default(),
        }
    }

    pub fn with_mode(mut self, mode: ApplyMode) -> Self {
        self.mode = mode;
        self
    }
}
