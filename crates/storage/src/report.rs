//! Creation report for delivery collection.

use serde::Serialize;

/// One component/plugin/strategy combination that failed to collect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreationFailure {
    /// Component path from the top level
    pub component: Vec<String>,

    /// Plugin name
    pub plugin: String,

    /// Strategy that was run
    pub strategy: String,

    /// Failure message, also stored inline in the delivery information
    pub message: String,
}

/// Outcome of collecting a delivery across the tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CreationReport {
    /// Delivery name
    pub delivery: String,

    /// Number of entries collected, failures included
    pub collected: usize,

    /// Entries whose plugin reported an error
    pub failures: Vec<CreationFailure>,
}

impl CreationReport {
    /// Empty report for a delivery.
    pub fn new(delivery: impl Into<String>) -> Self {
        Self {
            delivery: delivery.into(),
            ..Default::default()
        }
    }

    /// Whether every plugin succeeded.
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

impl std::fmt::Display for CreationReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} entries collected, {} failed",
            self.collected,
            self.failures.len()
        )?;
        for failure in &self.failures {
            write!(
                f,
                "\n  {} [{}/{}]: {}",
                failure.component.join("/"),
                failure.plugin,
                failure.strategy,
                failure.message
            )?;
        }
        Ok(())
    }
}
