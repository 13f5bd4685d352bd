use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use super::error::InputValidationError;
use super::tier::Tier;

/// Which structured reply a request asks the external service for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisKind {
    VulnerabilityScan,
    ContractTypeTest,
}

impl fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::VulnerabilityScan => write!(f, "vulnerability scan"),
            Self::ContractTypeTest => write!(f, "contract type and test suggestions"),
        }
    }
}

/// A validated analysis request.
///
/// Only [`RequestBuilder::build`] creates one, so the source text is never
/// blank and the tier is always resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    source_text: String,
    tier: Tier,
}

impl AnalysisRequest {
    pub fn source_text(&self) -> &str {
        &self.source_text
    }

    pub fn tier(&self) -> Tier {
        self.tier
    }
}

#[derive(Debug, Clone, Default)]
pub struct RequestBuilder {
    source_text: String,
    tier_marker: Option<String>,
    tier_ceiling: Option<Tier>,
}

impl RequestBuilder {
    pub fn new(source_text: impl Into<String>) -> Self {
        Self {
            source_text: source_text.into(),
            tier_marker: None,
            tier_ceiling: None,
        }
    }

    /// Raw tier marker as supplied by the caller, e.g. a form value.
    pub fn with_tier_marker(mut self, marker: impl Into<String>) -> Self {
        self.tier_marker = Some(marker.into());
        self
    }

    pub fn with_optional_tier_marker(mut self, marker: Option<String>) -> Self {
        self.tier_marker = marker;
        self
    }

    pub fn with_tier(mut self, tier: Tier) -> Self {
        self.tier_marker = Some(tier.as_str().to_string());
        self
    }

    /// Highest tier the caller is entitled to; requests above it are lowered.
    pub fn with_tier_ceiling(mut self, ceiling: Option<Tier>) -> Self {
        self.tier_ceiling = ceiling;
        self
    }

    pub fn build(self) -> Result<AnalysisRequest, InputValidationError> {
        if self.source_text.trim().is_empty() {
            return Err(InputValidationError::EmptySource);
        }

        let requested = match self.tier_marker.as_deref() {
            Some(marker) => marker.parse::<Tier>()?,
            None => Tier::default(),
        };

        let tier = match self.tier_ceiling {
            Some(ceiling) => requested.capped_at(ceiling),
            None => requested,
        };

        if tier != requested {
            debug!("Requested tier {} lowered to entitled tier {}", requested, tier);
        }

        Ok(AnalysisRequest {
            source_text: self.source_text,
            tier,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_keeps_text_and_tier() {
        for tier in Tier::ALL {
            let request = RequestBuilder::new("contract C {}")
                .with_tier(tier)
                .build()
                .unwrap();
            assert_eq!(request.source_text(), "contract C {}");
            assert_eq!(request.tier(), tier);
        }
    }

    #[test]
    fn test_tier_defaults_to_free() {
        let request = RequestBuilder::new("contract C {}").build().unwrap();
        assert_eq!(request.tier(), Tier::Free);
    }

    #[test]
    fn test_source_text_is_not_trimmed() {
        let source = "\n  contract C {}\n";
        let request = RequestBuilder::new(source).build().unwrap();
        assert_eq!(request.source_text(), source);
    }

    #[test]
    fn test_blank_source_rejected() {
        for source in ["", " ", "\n\t  \r\n"] {
            let err = RequestBuilder::new(source)
                .with_tier(Tier::Pro)
                .build()
                .unwrap_err();
            assert_eq!(err, InputValidationError::EmptySource);
        }
    }

    #[test]
    fn test_blank_source_reported_before_bad_tier() {
        let err = RequestBuilder::new("")
            .with_tier_marker("gold")
            .build()
            .unwrap_err();
        assert_eq!(err, InputValidationError::EmptySource);
    }

    #[test]
    fn test_invalid_tier_marker_rejected() {
        let err = RequestBuilder::new("contract C {}")
            .with_tier_marker("gold")
            .build()
            .unwrap_err();
        assert_eq!(err, InputValidationError::InvalidTier("gold".to_string()));
    }

    #[test]
    fn test_tier_ceiling_lowers_request() {
        let request = RequestBuilder::new("contract C {}")
            .with_tier_marker("enterprise")
            .with_tier_ceiling(Some(Tier::Pro))
            .build()
            .unwrap();
        assert_eq!(request.tier(), Tier::Pro);
    }

    #[test]
    fn test_serializes_camel_case() {
        let request = RequestBuilder::new("contract C {}")
            .with_tier(Tier::Pro)
            .build()
            .unwrap();
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["sourceText"], "contract C {}");
        assert_eq!(json["tier"], "pro");
    }
}
