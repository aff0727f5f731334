//! Parsing the triage decision out of model output.

use serde::Deserialize;

use crate::error::{CoreError, Result};

/// The decision contract: `{action, reason, metrics_reviewed}`.
#[derive(Debug, Clone, Deserialize)]
pub struct TriageDecision {
    pub action: String,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub metrics_reviewed: Vec<String>,
}

/// Locates the outermost `{ … }` span in arbitrary model output. Models
/// wrap JSON in prose and code fences often enough that strict parsing of
/// the whole content is a losing game.
pub fn extract_json(content: &str) -> Option<&str> {
    let start = content.find('{')?;
    let end = content.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&content[start..=end])
}

/// Parses a decision; malformed output fails with
/// [`CoreError::DecisionMalformed`] and is surfaced to the caller.
pub fn parse_decision(content: &str) -> Result<TriageDecision> {
    let span = extract_json(content).ok_or_else(|| {
        CoreError::DecisionMalformed(format!("no JSON object in decision output: {content:.120}"))
    })?;
    serde_json::from_str(span)
        .map_err(|e| CoreError::DecisionMalformed(format!("decision JSON: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_json_from_noisy_output() {
        let content = "Sure! Here is my triage call:\n```json\n{\"action\":\"skip\",\"reason\":\"ok\",\"metrics_reviewed\":[]}\n```\nLet me know.";
        let decision = parse_decision(content).unwrap();
        assert_eq!(decision.action, "skip");
        assert_eq!(decision.reason, "ok");
        assert!(decision.metrics_reviewed.is_empty());
    }

    #[test]
    fn outermost_braces_win() {
        let content = r#"{"action":"flag","reason":"nested {braces} inside","metrics_reviewed":["avg_fps"]}"#;
        let decision = parse_decision(content).unwrap();
        assert_eq!(decision.action, "flag");
        assert_eq!(decision.metrics_reviewed, vec!["avg_fps"]);
    }

    #[test]
    fn missing_object_is_malformed() {
        let err = parse_decision("I think everything is fine.").unwrap_err();
        assert!(matches!(err, CoreError::DecisionMalformed(_)));
    }

    #[test]
    fn invalid_json_is_malformed() {
        let err = parse_decision("{action: skip}").unwrap_err();
        assert!(matches!(err, CoreError::DecisionMalformed(_)));
    }
}
