//! Static-analysis findings as consumed by the fix cycle.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::PayloadError;

/// Analyzer confidence for a finding. Only these three levels are trusted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::Low => "LOW",
            Confidence::Medium => "MEDIUM",
            Confidence::High => "HIGH",
        }
    }
}

impl FromStr for Confidence {
    type Err = PayloadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LOW" => Ok(Confidence::Low),
            "MEDIUM" => Ok(Confidence::Medium),
            "HIGH" => Ok(Confidence::High),
            other => Err(PayloadError::UnknownConfidence {
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One issue reported by the analyzer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Finding {
    /// Path of the affected file, relative to the workspace root.
    pub file_path: String,

    /// Line number (1-indexed).
    pub line_number: u32,

    /// Human-readable description of the issue.
    pub description: String,

    /// Source excerpt the analyzer attached to the finding.
    #[serde(default)]
    pub code_excerpt: String,

    pub confidence: Confidence,

    /// Documentation link for the issue class.
    #[serde(default)]
    pub reference_url: String,

    /// Weakness identifier (e.g. CWE number), when the analyzer reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weakness_id: Option<String>,
}

/// Identity of a finding: `(file_path, line_number, description)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FindingKey {
    pub file_path: String,
    pub line_number: u32,
    pub description: String,
}

impl Finding {
    /// Create a finding with the required fields; optional fields start empty.
    pub fn new(
        file_path: impl Into<String>,
        line_number: u32,
        description: impl Into<String>,
        confidence: Confidence,
    ) -> Self {
        Self {
            file_path: file_path.into(),
            line_number,
            description: description.into(),
            code_excerpt: String::new(),
            confidence,
            reference_url: String::new(),
            weakness_id: None,
        }
    }

    pub fn with_excerpt(mut self, code: impl Into<String>) -> Self {
        self.code_excerpt = code.into();
        self
    }

    pub fn with_reference(mut self, url: impl Into<String>) -> Self {
        self.reference_url = url.into();
        self
    }

    pub fn with_weakness(mut self, id: impl Into<String>) -> Self {
        self.weakness_id = Some(id.into());
        self
    }

    pub fn key(&self) -> FindingKey {
        FindingKey {
            file_path: self.file_path.clone(),
            line_number: self.line_number,
            description: self.description.clone(),
        }
    }

    /// Reject findings that are missing required fields.
    pub fn validate(&self) -> Result<(), PayloadError> {
        if self.file_path.trim().is_empty() {
            return Err(PayloadError::MissingField { field: "file_path" });
        }
        if self.description.trim().is_empty() {
            return Err(PayloadError::MissingField {
                field: "description",
            });
        }
        if self.line_number == 0 {
            return Err(PayloadError::InvalidLineNumber);
        }
        Ok(())
    }

    /// The report handed to the suggestion oracle.
    pub fn vulnerability_report(&self) -> String {
        format!(
            "Vulnerability: {}\nLocation: {} (near line {})",
            self.description, self.file_path, self.line_number
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_parses_only_known_levels() {
        assert_eq!("LOW".parse::<Confidence>().unwrap(), Confidence::Low);
        assert_eq!("HIGH".parse::<Confidence>().unwrap(), Confidence::High);
        assert!("high".parse::<Confidence>().is_err());
        assert!("UNDEFINED".parse::<Confidence>().is_err());
    }

    #[test]
    fn test_finding_serde_uppercase_confidence() {
        let finding = Finding::new("app.py", 10, "SQL Injection", Confidence::High);
        let json = serde_json::to_value(&finding).unwrap();
        assert_eq!(json["confidence"], "HIGH");
        assert!(json.get("weakness_id").is_none());

        let back: Finding = serde_json::from_value(json).unwrap();
        assert_eq!(back, finding);
    }

    #[test]
    fn test_finding_rejects_unknown_confidence() {
        let raw = serde_json::json!({
            "file_path": "app.py",
            "line_number": 3,
            "description": "x",
            "confidence": "CRITICAL",
        });
        assert!(serde_json::from_value::<Finding>(raw).is_err());
    }

    #[test]
    fn test_validate_required_fields() {
        assert!(Finding::new("a.py", 1, "issue", Confidence::Low)
            .validate()
            .is_ok());
        assert!(matches!(
            Finding::new("", 1, "issue", Confidence::Low).validate(),
            Err(PayloadError::MissingField { field: "file_path" })
        ));
        assert!(matches!(
            Finding::new("a.py", 0, "issue", Confidence::Low).validate(),
            Err(PayloadError::InvalidLineNumber)
        ));
    }

    #[test]
    fn test_identity_ignores_non_key_fields() {
        let a = Finding::new("a.py", 4, "B608", Confidence::Low);
        let b = Finding::new("a.py", 4, "B608", Confidence::High).with_excerpt("x = 1");
        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn test_vulnerability_report_format() {
        let finding = Finding::new("app.py", 10, "SQL Injection", Confidence::High);
        assert_eq!(
            finding.vulnerability_report(),
            "Vulnerability: SQL Injection\nLocation: app.py (near line 10)"
        );
    }
}
