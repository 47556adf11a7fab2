//! Structured Feedback Module
//!
//! Machine-readable output of a `check` run:
//! - JSON error reports with fix hints
//! - Analysis statistics

use serde::{Deserialize, Serialize};

use crate::utils::Error;

// ==================== Structured Error Report ====================

/// A structured report of one compiler error
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorReport {
    /// Error code (e.g., "E0100")
    pub code: String,

    /// Error severity
    pub severity: Severity,

    /// Human-readable message
    pub message: String,

    /// Location information
    pub location: Option<Location>,

    /// Suggested fixes
    pub suggestions: Vec<Suggestion>,
}

/// Every diagnostic the analyzer reports is an error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub file: String,
    pub line: u32,
    pub column: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    /// Description of the fix
    pub message: String,

    /// Confidence in this suggestion (0.0 - 1.0)
    pub confidence: f64,
}

impl Suggestion {
    fn new(message: impl Into<String>, confidence: f64) -> Self {
        Self {
            message: message.into(),
            confidence,
        }
    }
}

impl ErrorReport {
    /// Create an error report from a compiler error
    pub fn from_error(error: &Error, file_name: &str) -> Self {
        let location = error.position().filter(|p| !p.is_synthetic()).map(|p| Location {
            file: file_name.to_string(),
            line: p.line,
            column: p.column,
        });

        Self {
            code: error.code().to_string(),
            severity: Severity::Error,
            message: error.to_string(),
            location,
            suggestions: suggestions_for(error),
        }
    }
}

/// Fix hints for the errors where a likely fix is known
fn suggestions_for(error: &Error) -> Vec<Suggestion> {
    match error {
        Error::SymbolAlreadyDefined { name, .. } => vec![
            Suggestion::new(format!("Rename one of the declarations of '{}'", name), 0.8),
            Suggestion::new("Parameters and locals cannot shadow outer symbols", 0.5),
        ],
        Error::NonExistentSymbol { name, .. } => vec![
            Suggestion::new(format!("Declare '{}' before using it", name), 0.7),
            Suggestion::new("Import the module that exports it", 0.4),
        ],
        Error::NotAType { name, .. } => vec![Suggestion::new(
            format!("Declare a type with 'type {} is ...'", name),
            0.6,
        )],
        Error::IncompatibleTypes { to, .. } => vec![Suggestion::new(
            format!("Provide a value of type '{}'", to),
            0.6,
        )],
        Error::WrongIfConditionType { .. } => vec![Suggestion::new(
            "Use a comparison to obtain a 'bool' condition",
            0.7,
        )],
        Error::DeclarationWithoutType { name, .. } => vec![Suggestion::new(
            format!("Add a type ('{}: int') or an initializer", name),
            0.9,
        )],
        Error::RecursiveSymbolReference { name, .. } => vec![Suggestion::new(
            format!("Do not use '{}' inside its own definition", name),
            0.8,
        )],
        Error::NonConstActorInstance { .. } => vec![Suggestion::new("Declare the instance with 'const'", 0.9)],
        Error::MisplacedActorInstance { .. } => vec![Suggestion::new(
            "Create actor instances as 'const' members of another actor",
            0.8,
        )],
        Error::UnspecifiedConnectOutput { .. } => vec![Suggestion::new(
            "Name the output to connect to: 'input member.output (...)'",
            0.8,
        )],
        _ => Vec::new(),
    }
}

// ==================== Check Feedback ====================

/// Result of checking one module
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckFeedback {
    /// Analysis status
    pub success: bool,

    /// Module name
    pub module: String,

    /// All errors
    pub diagnostics: Vec<ErrorReport>,

    /// Analysis statistics
    pub stats: CheckStats,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckStats {
    /// Number of source files
    pub file_count: usize,

    /// Nodes in the analyzed tree arena
    pub node_count: usize,

    /// Types created by the analysis
    pub type_count: usize,

    /// Total time
    pub total_time_ms: u64,
}

impl CheckFeedback {
    pub fn success(module: String, stats: CheckStats) -> Self {
        Self {
            success: true,
            module,
            diagnostics: vec![],
            stats,
        }
    }

    /// `file_of` names the file each error was found in
    pub fn failure(module: String, errors: &[Error], file_of: impl Fn(&Error) -> String, stats: CheckStats) -> Self {
        Self {
            success: false,
            module,
            diagnostics: errors.iter().map(|e| ErrorReport::from_error(e, &file_of(e))).collect(),
            stats,
        }
    }

    /// Output as JSON
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::Position;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_report_from_error() {
        let err = Error::SymbolAlreadyDefined {
            name: "a".to_string(),
            pos: Position::new(3, 9),
        };
        let report = ErrorReport::from_error(&err, "main.fil");

        assert_eq!(report.code, "E0100");
        assert_eq!(report.severity, Severity::Error);
        assert_eq!(report.message, "Symbol 'a' already defined");
        assert_eq!(
            report.location,
            Some(Location {
                file: "main.fil".to_string(),
                line: 3,
                column: 9
            })
        );
        assert_eq!(report.suggestions.len(), 2);
    }

    #[test]
    fn test_errors_without_position_have_no_location() {
        let report = ErrorReport::from_error(&Error::ModuleError("cycle".to_string()), "main.fil");
        assert_eq!(report.location, None);
        assert!(report.suggestions.is_empty());
    }

    #[test]
    fn test_feedback_json() {
        let errors = vec![
            Error::ReturnOutsideFunction { pos: Position::new(1, 1) },
            Error::ReturnOutsideFunction { pos: Position::in_source(1, 4, 2) },
        ];
        let file_of = |e: &Error| match e.position() {
            Some(pos) if pos.source == 1 => "b.fil".to_string(),
            _ => "a.fil".to_string(),
        };
        let feedback = CheckFeedback::failure("main".to_string(), &errors, file_of, CheckStats::default());
        let json: serde_json::Value = serde_json::from_str(&feedback.to_json()).unwrap();

        assert_eq!(json["success"], false);
        assert_eq!(json["diagnostics"][0]["code"], "E0301");
        assert_eq!(json["diagnostics"][0]["severity"], "Error");
        assert_eq!(json["diagnostics"][0]["location"]["line"], 1);
        assert_eq!(json["diagnostics"][0]["location"]["file"], "a.fil");
        assert_eq!(json["diagnostics"][1]["location"]["file"], "b.fil");
    }
}
