//! BlockArmor analysis - tiered smart-contract analysis over external models
//!
//! This crate builds validated analysis requests, renders them into tiered
//! instructions, sends them to an external text-generation service, and checks
//! the structured reply before returning it.

pub mod core;
pub mod llm;

pub use crate::core::{
    AnalysisError, AnalysisKind, AnalysisOutcome, AnalysisRequest, ContractTypeTestResponse,
    FlowState, RequestBuilder, Tier, VulnerabilityScanResponse,
};

pub use crate::llm::{AnalysisClient, ClientSettings, LLMConfig, LLMProvider, ProviderFactory};
