use std::collections::HashMap;

use super::schemas::{ResponseSchema, CONTRACT_TYPE_TEST_SCHEMA, VULNERABILITY_SCAN_SCHEMA};
use crate::core::{
    request::{AnalysisKind, AnalysisRequest},
    tier::Tier,
};

#[derive(Debug, Clone)]
pub struct PromptTemplate {
    pub name: String,
    pub system_prompt: String,
    pub user_prompt_template: String,
    pub focus_areas: Vec<String>,
}

impl PromptTemplate {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            system_prompt: String::new(),
            user_prompt_template: String::new(),
            focus_areas: Vec::new(),
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_user_template(mut self, template: impl Into<String>) -> Self {
        self.user_prompt_template = template.into();
        self
    }

    pub fn with_focus_areas(mut self, areas: Vec<String>) -> Self {
        self.focus_areas = areas;
        self
    }
}

/// Instructions ready to send to the external service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPrompt {
    pub template_name: String,
    pub system_prompt: String,
    pub user_prompt: String,
}

/// Renders the fixed instruction templates.
///
/// Rendering is a pure function of the request: no clock, no randomness, no
/// state carried between calls.
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptBuilder;

impl PromptBuilder {
    pub fn new() -> Self {
        Self
    }

    pub fn template(&self, kind: AnalysisKind, tier: Tier) -> PromptTemplate {
        match kind {
            AnalysisKind::VulnerabilityScan => Self::vulnerability_scan_template(tier),
            AnalysisKind::ContractTypeTest => Self::contract_type_test_template(),
        }
    }

    pub fn render(&self, kind: AnalysisKind, request: &AnalysisRequest) -> RenderedPrompt {
        let template = self.template(kind, request.tier());
        let schema: &ResponseSchema = match kind {
            AnalysisKind::VulnerabilityScan => &VULNERABILITY_SCAN_SCHEMA,
            AnalysisKind::ContractTypeTest => &CONTRACT_TYPE_TEST_SCHEMA,
        };

        let mut variables = HashMap::new();
        variables.insert("source_text".to_string(), request.source_text().to_string());
        variables.insert("tier".to_string(), request.tier().to_string());
        variables.insert(
            "depth_instructions".to_string(),
            Self::depth_instructions(request.tier()).to_string(),
        );
        variables.insert(
            "focus_areas".to_string(),
            Self::bullet_list(&template.focus_areas),
        );
        variables.insert("json_schema".to_string(), schema.describe());
        variables.insert(
            "required_fields".to_string(),
            schema
                .required_fields()
                .map(|name| format!("- \"{}\"", name))
                .collect::<Vec<_>>()
                .join("\n"),
        );

        RenderedPrompt {
            template_name: template.name.clone(),
            system_prompt: Self::substitute_variables(&template.system_prompt, &variables),
            user_prompt: Self::substitute_variables(&template.user_prompt_template, &variables),
        }
    }

    /// Replaces `{name}` placeholders in a single left-to-right pass.
    ///
    /// Inserted values are never rescanned, so source text that happens to
    /// contain `{tier}` or `{json_schema}` is passed through literally.
    /// Unknown placeholders are left as they are.
    fn substitute_variables(template: &str, variables: &HashMap<String, String>) -> String {
        let mut result = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(open) = rest.find('{') {
            result.push_str(&rest[..open]);
            let after = &rest[open + 1..];

            let value = after
                .find('}')
                .and_then(|close| variables.get(&after[..close]).map(|v| (close, v)));

            match value {
                Some((close, value)) => {
                    result.push_str(value);
                    rest = &after[close + 1..];
                }
                None => {
                    result.push('{');
                    rest = after;
                }
            }
        }

        result.push_str(rest);
        result
    }

    fn bullet_list(items: &[String]) -> String {
        items
            .iter()
            .map(|item| format!("- {}", item))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn depth_instructions(tier: Tier) -> &'static str {
        match tier {
            Tier::Free => FREE_DEPTH_INSTRUCTIONS,
            Tier::Pro => PRO_DEPTH_INSTRUCTIONS,
            Tier::Enterprise => ENTERPRISE_DEPTH_INSTRUCTIONS,
        }
    }

    fn vulnerability_scan_template(tier: Tier) -> PromptTemplate {
        PromptTemplate::new(format!("vulnerability_scan_{}", tier))
            .with_system_prompt(VULNERABILITY_SCAN_SYSTEM_PROMPT)
            .with_user_template(VULNERABILITY_SCAN_USER_TEMPLATE)
            .with_focus_areas(
                tier.vulnerability_categories()
                    .into_iter()
                    .map(String::from)
                    .collect(),
            )
    }

    fn contract_type_test_template() -> PromptTemplate {
        PromptTemplate::new("contract_type_test")
            .with_system_prompt(CONTRACT_TYPE_TEST_SYSTEM_PROMPT)
            .with_user_template(CONTRACT_TYPE_TEST_USER_TEMPLATE)
            .with_focus_areas(
                TEST_SUITE_PITFALLS
                    .iter()
                    .map(|pitfall| pitfall.to_string())
                    .collect(),
            )
    }
}

const VULNERABILITY_SCAN_SYSTEM_PROMPT: &str = r#"You are an expert smart contract security auditor.

YOUR ROLE:
- Identify security vulnerabilities in the contract code you are given
- Only report issues you can point to in the code
- Suggest practical fixes for every vulnerability you report
- Score the overall security of the contract from 0 (critically unsafe) to 100 (no issues found)

You always answer with a single JSON object and nothing else."#;

const VULNERABILITY_SCAN_USER_TEMPLATE: &str = r#"Analyze the following smart contract code for security vulnerabilities.

ANALYSIS TIER: {tier}
{depth_instructions}

VULNERABILITY CATEGORIES TO CHECK:
{focus_areas}

SMART CONTRACT CODE:
```
{source_text}
```

Return a single JSON object matching this exact schema:
{json_schema}

REQUIRED FIELDS (every one MUST be present in your reply):
{required_fields}

Set "tierApplied" to "{tier}".
When nothing is found, return empty arrays for "vulnerabilities" and "suggestedFixes"; never omit them.
Respond with the JSON object only."#;

const FREE_DEPTH_INSTRUCTIONS: &str = r#"STANDARD ANALYSIS:
- Describe each vulnerability in one concise sentence naming the issue and the affected function.
- Give one concise fix per vulnerability."#;

const PRO_DEPTH_INSTRUCTIONS: &str = r#"DETAILED ANALYSIS:
- For each vulnerability, state its severity (Critical, High, Medium, Low).
- Include a short explanation of why the code is vulnerable.
- Give a concrete fix per vulnerability that references the affected function."#;

const ENTERPRISE_DEPTH_INSTRUCTIONS: &str = r#"IN-DEPTH ANALYSIS:
- For each vulnerability, state its severity (Critical, High, Medium, Low).
- Include a short explanation of why the code is vulnerable, naming the root cause.
- Describe a realistic exploit scenario for each vulnerability.
- Give code-level remediation guidance for each fix, naming the pattern or library to use.
- Note deviations from established token and access-control standards that weaken security."#;

const CONTRACT_TYPE_TEST_SYSTEM_PROMPT: &str = r#"You are an expert smart contract auditor and testing specialist.

You always answer with a single JSON object and nothing else."#;

const CONTRACT_TYPE_TEST_USER_TEMPLATE: &str = r#"Analyze the smart contract code below. Your goal is to:
1. Identify the programming language of the contract (e.g., Solidity, Vyper, Rust, Move). If unsure, use "Unknown".
2. Give a brief overview of what the contract appears to do, based on its structure, function names and comments.
3. Suggest 3-5 high-level testing areas that matter for this kind of contract (e.g., Access Control, State Transitions, Event Verification, Gas Efficiency, Upgradeability, Security Vulnerabilities common to the language).
4. Add general notes on anything specific to testing this contract.

Your suggestions must also help the user build test suites that cannot be subverted. Address these pitfalls where relevant:
{focus_areas}

For example: "For Access Control, verify role-based permissions under impersonation scenarios and check for unintended state changes from unrelated functions."

SMART CONTRACT CODE:
```
{source_text}
```

Return a single JSON object matching this exact schema:
{json_schema}

REQUIRED FIELDS (every one MUST be present in your reply):
{required_fields}

Always populate "identifiedLanguage" as well, using "Unknown" when unsure.
Respond with the JSON object only."#;

const TEST_SUITE_PITFALLS: &[&str] = &[
    "Test injection: the contract is modified or recompiled with hidden logic that only exists to pass tests",
    "Role misconfiguration: tests assume roles such as owner or admin that can be bypassed, e.g. by impersonating them (vm.prank in Foundry)",
    "Hidden state drift: state a test relies on is changed by logic outside the function under test",
    "False-positive test logic: assertions pass because they check trivial conditions, not because the contract is correct",
    "Missing negative cases: invalid inputs and failure paths are never exercised",
    "Function mutation drift: signatures or behavior change without matching test updates",
    "Selector shadowing: functions share names with different parameters, so tests exercise the wrong overload",
    "Gas-bomb passes: malicious logic passes functional tests but consumes excessive gas in production",
];
