use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::flow::FlowState;
use super::tier::Tier;
use crate::llm::provider::TokenUsage;

/// Vulnerability scan reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VulnerabilityScanResponse {
    pub security_score: u8,

    pub vulnerabilities: Vec<String>,

    pub suggested_fixes: Vec<String>,

    pub tier_applied: Tier,
}

/// Contract type identification and testing suggestions reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractTypeTestResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identified_language: Option<String>,

    pub contract_overview: String,

    pub suggested_testing_areas: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub general_notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisMetadata {
    pub model: String,

    pub template: String,

    pub tier: Tier,

    pub usage: TokenUsage,

    pub elapsed_ms: u64,

    pub completed_at: DateTime<Utc>,

    pub flow: Vec<FlowState>,
}

/// A validated reply together with how it was obtained.
///
/// `response` is exactly what the service returned once it passed validation.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisOutcome<T> {
    pub response: T,

    pub metadata: AnalysisMetadata,
}

impl VulnerabilityScanResponse {
    pub fn is_clean(&self) -> bool {
        self.vulnerabilities.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_response_wire_names() {
        let response = VulnerabilityScanResponse {
            security_score: 80,
            vulnerabilities: vec![],
            suggested_fixes: vec![],
            tier_applied: Tier::Pro,
        };

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "securityScore": 80,
                "vulnerabilities": [],
                "suggestedFixes": [],
                "tierApplied": "pro"
            })
        );
        assert!(response.is_clean());
    }

    #[test]
    fn test_type_test_response_omits_absent_optionals() {
        let response = ContractTypeTestResponse {
            identified_language: None,
            contract_overview: "A simple token".to_string(),
            suggested_testing_areas: vec!["Access Control".to_string()],
            general_notes: None,
        };

        let json = serde_json::to_value(&response).unwrap();
        assert!(json.get("identifiedLanguage").is_none());
        assert!(json.get("generalNotes").is_none());
        assert_eq!(json["contractOverview"], "A simple token");
    }
}
