//! Command implementations for the BlockArmor CLI
//!
//! `scan` runs a tiered vulnerability scan, `test-plan` asks for contract type
//! identification and testing suggestions, and `config` writes or inspects the
//! provider configuration both of them share.

pub mod common;
pub mod config;
pub mod scan;
pub mod test_plan;
