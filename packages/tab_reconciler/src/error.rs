use crate::host::TabId;

/// Failures reported by the host browser for a single tab operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TabError {
    /// The tab no longer exists. Closing treats this as success.
    #[error("tab not found: {0}")]
    NotFound(TabId),

    /// The browser could not be reached at all.
    #[error("browser unavailable: {0}")]
    Unavailable(String),

    /// The browser answered but refused the operation.
    #[error("browser rejected {operation}: {reason}")]
    Rejected { operation: String, reason: String },
}

impl TabError {
    pub fn rejected(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Rejected {
            operation: operation.into(),
            reason: reason.into(),
        }
    }
}

/// Failures that abort a whole reconciliation cycle.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("failed to query open tabs: {0}")]
    Snapshot(#[source] TabError),
}

/// Registry persistence failures. Never fatal; logged and retried on the next
/// mutation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("registry io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("registry encoding error: {0}")]
    Encoding(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// `mark_opened` is a create, not an upsert.
    #[error("channel {0} already has a managed tab")]
    AlreadyManaged(crate::login::Login),
}
