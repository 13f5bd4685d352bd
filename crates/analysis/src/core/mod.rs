//! Core types of the tiered analysis flow
//!
//! A request is built and validated before anything leaves the process, travels
//! through the `llm` layer as a rendered prompt, and comes back as one of the
//! typed responses defined here. The flow trace records the stages a call went
//! through, and the error taxonomy keeps bad input, unreachable services and
//! bad replies apart.

pub mod error;
pub mod flow;
pub mod request;
pub mod response;
pub mod tier;

pub use error::{AnalysisError, InputValidationError, ServiceResponseError, TransportError};
pub use flow::{FlowState, FlowTrace};
pub use request::{AnalysisKind, AnalysisRequest, RequestBuilder};
pub use response::{
    AnalysisMetadata, AnalysisOutcome, ContractTypeTestResponse, VulnerabilityScanResponse,
};
pub use tier::Tier;
