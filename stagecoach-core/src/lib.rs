//! Stagecoach Core
//!
//! Core types and the pipeline compiler for the Stagecoach CI service.
//!
//! This crate contains:
//! - Domain types: the parsed pipeline model, webhook events, run envelopes
//! - DSL decoding of `.tekton_ci.yaml` files into the pipeline model
//! - The expression evaluator used by rules and task parameters
//! - The compiler that turns a pipeline into a dependency-linked run
//! - Run definitions: ready-made run specs gated by a filter expression

pub mod compiler;
pub mod domain;
pub mod dsl;
pub mod expr;
pub mod hook;
pub mod spec;

pub use compiler::{CompileError, Configuration, Source, compile};
pub use domain::pipeline::Pipeline;
pub use domain::run::PipelineRun;
pub use expr::{ExprError, ExpressionContext, Value};
pub use hook::Hook;
pub use spec::{PipelineDefinition, SpecError};
