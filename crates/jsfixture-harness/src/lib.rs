//! # jsfixture-harness
//!
//! Runs JavaScript conformance fixtures: files of code interleaved with
//! `/* OUTPUT ... */` comments holding the console output the code must
//! produce.
//!
//! ```text
//! fixture text -> fixture::parse_blocks -> sandbox::Sandbox::run
//!              -> compare::Comparator::compare -> report::Aggregator
//! ```
//!
//! The JavaScript evaluator is supplied by the caller through
//! [`sandbox::EngineFactory`]; values it logs are built from
//! [`jsfixture_core`] types so rendering is the same for every engine.

#![warn(clippy::all)]

pub mod compare;
pub mod config;
pub mod error;
pub mod fixture;
pub mod report;
pub mod runner;
pub mod sandbox;

pub use compare::{Comparator, ComparisonResult, LineDiff, Outcome};
pub use config::{BlockFilter, FixedOverride, HarnessConfig, TimeZoneConfig};
pub use error::{HarnessError, ParseError, Result};
pub use fixture::{OutputMode, SourceFile, TestBlock, parse_blocks};
pub use report::{Aggregator, BlockFailure, FileReport, SuiteReport};
pub use runner::{FileRun, FixtureRunner};
pub use sandbox::{
    CapturedLine, ConsoleLevel, Engine, EngineFactory, Execution, ExecutionStatus, Host, LineKind,
    Sandbox, ScriptError, TimerId,
};
