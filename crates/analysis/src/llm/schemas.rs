//! Declared output schemas for the structured replies
//!
//! A schema is plain data: field name, whether it is required, and the JSON
//! type it must carry. The same description drives both the instructions sent
//! to the model and the check applied to what comes back, so the two cannot
//! drift apart.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::core::{
    error::ServiceResponseError,
    request::{AnalysisKind, AnalysisRequest},
    response::{ContractTypeTestResponse, VulnerabilityScanResponse},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    StringList,
    Integer { min: i64, max: i64 },
    OneOf(&'static [&'static str]),
}

impl FieldKind {
    fn describe(&self) -> String {
        match self {
            FieldKind::String => "string".to_string(),
            FieldKind::StringList => "array of strings".to_string(),
            FieldKind::Integer { min, max } => format!("integer {}-{}", min, max),
            FieldKind::OneOf(values) => format!("one of {}", values.join("|")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub required: bool,
    pub kind: FieldKind,
    pub description: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseSchema {
    pub name: &'static str,
    pub fields: &'static [FieldSpec],
}

pub static VULNERABILITY_SCAN_SCHEMA: ResponseSchema = ResponseSchema {
    name: "vulnerability_scan",
    fields: &[
        FieldSpec {
            name: "securityScore",
            required: true,
            kind: FieldKind::Integer { min: 0, max: 100 },
            description: "Overall security score, 100 meaning no issues found",
        },
        FieldSpec {
            name: "vulnerabilities",
            required: true,
            kind: FieldKind::StringList,
            description: "One entry per vulnerability found; empty array when none",
        },
        FieldSpec {
            name: "suggestedFixes",
            required: true,
            kind: FieldKind::StringList,
            description: "One entry per suggested fix; empty array when none",
        },
        FieldSpec {
            name: "tierApplied",
            required: true,
            kind: FieldKind::OneOf(&["free", "pro", "enterprise"]),
            description: "The analysis tier stated in these instructions",
        },
    ],
};

pub static CONTRACT_TYPE_TEST_SCHEMA: ResponseSchema = ResponseSchema {
    name: "contract_type_test",
    fields: &[
        FieldSpec {
            name: "identifiedLanguage",
            required: false,
            kind: FieldKind::String,
            description: "Programming language of the contract, or \"Unknown\"",
        },
        FieldSpec {
            name: "contractOverview",
            required: true,
            kind: FieldKind::String,
            description: "Brief overview of the contract's apparent purpose",
        },
        FieldSpec {
            name: "suggestedTestingAreas",
            required: true,
            kind: FieldKind::StringList,
            description: "High-level testing areas for this kind of contract",
        },
        FieldSpec {
            name: "generalNotes",
            required: false,
            kind: FieldKind::String,
            description: "Other testing considerations, including test-suite pitfalls",
        },
    ],
};

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl ResponseSchema {
    pub fn required_fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().filter(|f| f.required).map(|f| f.name)
    }

    /// Checks every declared field of `value`; optional fields may be absent or null.
    pub fn validate(&self, value: &Value) -> Result<(), ServiceResponseError> {
        let object = value
            .as_object()
            .ok_or_else(|| ServiceResponseError::WrongType {
                field: "$".to_string(),
                expected: "object".to_string(),
                found: json_type_name(value).to_string(),
            })?;

        for field in self.fields {
            let found = match object.get(field.name) {
                None | Some(Value::Null) if !field.required => continue,
                Some(found) => found,
                None => {
                    return Err(ServiceResponseError::MissingField(field.name.to_string()));
                }
            };
            Self::check_field(field, found)?;
        }

        Ok(())
    }

    fn check_field(field: &FieldSpec, found: &Value) -> Result<(), ServiceResponseError> {
        let wrong_type = |name: String, found: &Value| ServiceResponseError::WrongType {
            field: name,
            expected: field.kind.describe(),
            found: json_type_name(found).to_string(),
        };

        match field.kind {
            FieldKind::String => {
                if !found.is_string() {
                    return Err(wrong_type(field.name.to_string(), found));
                }
            }
            FieldKind::StringList => {
                let items = found
                    .as_array()
                    .ok_or_else(|| wrong_type(field.name.to_string(), found))?;
                if let Some((index, item)) = items.iter().enumerate().find(|(_, v)| !v.is_string())
                {
                    return Err(wrong_type(format!("{}[{}]", field.name, index), item));
                }
            }
            FieldKind::Integer { min, max } => {
                let number = found
                    .as_i64()
                    .ok_or_else(|| wrong_type(field.name.to_string(), found))?;
                if number < min || number > max {
                    return Err(ServiceResponseError::OutOfRange {
                        field: field.name.to_string(),
                        value: number,
                        min,
                        max,
                    });
                }
            }
            FieldKind::OneOf(values) => {
                let text = found
                    .as_str()
                    .ok_or_else(|| wrong_type(field.name.to_string(), found))?;
                if !values.contains(&text) {
                    return Err(ServiceResponseError::WrongType {
                        field: field.name.to_string(),
                        expected: field.kind.describe(),
                        found: format!("\"{}\"", text),
                    });
                }
            }
        }

        Ok(())
    }

    /// JSON-shaped description of the schema for inclusion in prompts.
    pub fn describe(&self) -> String {
        let lines: Vec<String> = self
            .fields
            .iter()
            .map(|field| {
                let presence = if field.required { "required" } else { "optional" };
                let text = format!(
                    "{} ({}): {}",
                    field.kind.describe(),
                    presence,
                    field.description
                );
                format!(
                    "  \"{}\": {}",
                    field.name,
                    serde_json::to_string(&text).unwrap_or_else(|_| format!("\"{}\"", text))
                )
            })
            .collect();

        format!("{{\n{}\n}}", lines.join(",\n"))
    }
}

/// A structured reply the analysis client knows how to ask for and check.
pub trait ResponseVariant: DeserializeOwned + Serialize + Send + 'static {
    const KIND: AnalysisKind;

    fn schema() -> &'static ResponseSchema;

    /// Consistency checks against the request that produced the reply.
    fn check_against(&self, _request: &AnalysisRequest) -> Result<(), ServiceResponseError> {
        Ok(())
    }
}

impl ResponseVariant for VulnerabilityScanResponse {
    const KIND: AnalysisKind = AnalysisKind::VulnerabilityScan;

    fn schema() -> &'static ResponseSchema {
        &VULNERABILITY_SCAN_SCHEMA
    }

    fn check_against(&self, request: &AnalysisRequest) -> Result<(), ServiceResponseError> {
        if self.tier_applied != request.tier() {
            return Err(ServiceResponseError::TierMismatch {
                requested: request.tier().to_string(),
                applied: self.tier_applied.to_string(),
            });
        }
        Ok(())
    }
}

impl ResponseVariant for ContractTypeTestResponse {
    const KIND: AnalysisKind = AnalysisKind::ContractTypeTest;

    fn schema() -> &'static ResponseSchema {
        &CONTRACT_TYPE_TEST_SCHEMA
    }
}
