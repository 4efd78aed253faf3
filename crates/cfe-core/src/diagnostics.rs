//! Diagnostics infrastructure for tracking issues during network validation
//! and scenario preparation.
//!
//! Collects warnings and errors with a category and an optional entity
//! reference (e.g. "Bus DE0", "Generator DE0 solar"), so callers can report
//! everything wrong with a network in one pass instead of failing on the
//! first problem.

use serde::Serialize;

/// Severity level for diagnostic issues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Unusual but operation continued (e.g., defaulted value)
    Warning,
    /// Could not complete element/operation
    Error,
}

/// A single diagnostic issue encountered during an operation
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticIssue {
    pub severity: Severity,
    /// Category for grouping (e.g., "structure", "series", "capacity")
    pub category: String,
    pub message: String,
    /// Optional entity reference (e.g., "Bus DE0")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,
}

impl std::fmt::Display for DiagnosticIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let severity = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(f, "[{}:{}] {}", severity, self.category, self.message)?;
        if let Some(entity) = &self.entity {
            write!(f, " ({})", entity)?;
        }
        Ok(())
    }
}

/// Collection of diagnostic issues for an operation
#[derive(Debug, Clone, Default, Serialize)]
pub struct Diagnostics {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<DiagnosticIssue>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_warning(&mut self, category: impl Into<String>, message: impl Into<String>) {
        self.issues.push(DiagnosticIssue {
            severity: Severity::Warning,
            category: category.into(),
            message: message.into(),
            entity: None,
        });
    }

    pub fn add_error(&mut self, category: impl Into<String>, message: impl Into<String>) {
        self.issues.push(DiagnosticIssue {
            severity: Severity::Error,
            category: category.into(),
            message: message.into(),
            entity: None,
        });
    }

    pub fn add_error_with_entity(
        &mut self,
        category: impl Into<String>,
        message: impl Into<String>,
        entity: impl Into<String>,
    ) {
        self.issues.push(DiagnosticIssue {
            severity: Severity::Error,
            category: category.into(),
            message: message.into(),
            entity: Some(entity.into()),
        });
    }

    pub fn warnings(&self) -> impl Iterator<Item = &DiagnosticIssue> {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Warning)
    }

    pub fn errors(&self) -> impl Iterator<Item = &DiagnosticIssue> {
        self.issues.iter().filter(|i| i.severity == Severity::Error)
    }

    pub fn warning_count(&self) -> usize {
        self.warnings().count()
    }

    pub fn error_count(&self) -> usize {
        self.errors().count()
    }

    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }
}

impl std::fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for issue in &self.issues {
            writeln!(f, "{}", issue)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collects_by_severity() {
        let mut diag = Diagnostics::new();
        diag.add_warning("structure", "network has no storage units");
        diag.add_error("series", "load series shorter than snapshots");
        diag.add_error_with_entity("reference", "link endpoint missing", "Link DE0 Imports");

        assert_eq!(diag.warning_count(), 1);
        assert_eq!(diag.error_count(), 2);
        assert!(diag.has_errors());
    }

    #[test]
    fn test_display_includes_entity() {
        let mut diag = Diagnostics::new();
        diag.add_error_with_entity("reference", "bus missing", "Bus X");
        let text = diag.to_string();
        assert!(text.contains("[error:reference]"));
        assert!(text.contains("(Bus X)"));
    }
}
