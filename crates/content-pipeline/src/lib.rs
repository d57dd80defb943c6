//! Discovery scoring, creation, and the quality/risk gate that decides what
//! a human ever sees. Scout → Analyst → Creator → QualityGate/RiskAssessor
//! → ApprovalQueue, in that order (§4.5, §4.6, §4.7).

mod analyst;
mod approval_queue;
mod creator;
mod quality_gate;
mod risk_assessor;
mod scout;

pub use analyst::{Analyst, AnalystReport};
pub use approval_queue::ApprovalQueue;
pub use creator::{AvoidGuidanceSource, Creator, CreatorReport};
pub use quality_gate::{QualityGate, QualityReport, QUALITY_AUTO_REJECT_THRESHOLD, QUALITY_WARNING_THRESHOLD};
pub use risk_assessor::{RiskAssessment, RiskAssessor};
pub use scout::{Scout, ScoutReport, SourceOutcome};
