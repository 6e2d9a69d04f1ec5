//! Process-wide context table, one entry per operation class.

use shared_types::OperationClass;

use super::context::RequestContext;

/// Owns one `RequestContext` per `OperationClass`.
///
/// Every entry is created with the table and lives until the table is
/// dropped; lookup is an array index.
#[derive(Debug)]
pub struct ContextTable {
    contexts: [RequestContext; OperationClass::COUNT],
}

impl ContextTable {
    pub fn new(max_result_bytes: usize) -> Self {
        Self {
            contexts: OperationClass::ALL.map(|class| RequestContext::new(class, max_result_bytes)),
        }
    }

    pub fn get(&self, class: OperationClass) -> &RequestContext {
        &self.contexts[class.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = &RequestContext> {
        self.contexts.iter()
    }
}
