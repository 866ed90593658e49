//! Core signing engine for deterministic multi-chain deployments.
//!
//! For a single chain id, the engine resolves the chain's configuration for
//! each proxy kind, builds the EIP-712 deployment request, has it signed by
//! the configured account and merges the signature into that kind's store.

pub mod builder;
pub mod engine;
pub mod payloads;

pub use builder::{BuilderError, DeployerFactories, EngineBuilder};
pub use engine::{EngineError, FlowError, FlowOutcome, Miss, RunReport, RunState, SigningEngine};
pub use payloads::PayloadError;
