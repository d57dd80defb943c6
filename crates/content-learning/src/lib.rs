//! Learning loop: canonical pattern analysis, failure-avoidance guidance,
//! A/B experiment evaluation, and the feedback cycle tying them to skill
//! confidence (§4.9, §4.10, §10.1-10.3).

mod experiment_runner;
mod failure_patterns;
mod feedback_loop;
mod pattern_analyzer;

pub use experiment_runner::{ExperimentRunner, WinnerOutcome};
pub use failure_patterns::{FailureAnalysisReport, FailurePatternTracker};
pub use feedback_loop::{CycleSummary, FeedbackLoop};
pub use pattern_analyzer::{Pattern, PatternAnalyzer, PatternKind, TrendDirection};
