//! Cost-based graceful degradation (§4.11). Every loop's eligibility and the
//! scout cycle's creation limit/video policy derive from one mode value,
//! which itself derives from one ratio: today's spend over the daily cap.

/// Fraction of `daily_cost_limit` at which each mode takes over. Ordered
/// ascending; `for_cost_ratio` picks the highest threshold the ratio clears.
const REDUCED_AT: f64 = 0.70;
const MINIMAL_AT: f64 = 0.85;
const PAUSED_AT: f64 = 0.95;

const REDUCED_CREATION_LIMIT: usize = 3;
const FULL_CREATION_LIMIT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationMode {
    /// All agents running, video generation enabled.
    Full,
    /// Content creation capped at 3/cycle, video generation skipped.
    Reduced,
    /// Scout, tracker, and feedback only — no content creation.
    Minimal,
    /// Nothing runs; loops keep ticking but every task is skipped.
    Paused,
}

impl OperationMode {
    pub fn for_cost_ratio(ratio: f64) -> Self {
        if ratio >= PAUSED_AT {
            OperationMode::Paused
        } else if ratio >= MINIMAL_AT {
            OperationMode::Minimal
        } else if ratio >= REDUCED_AT {
            OperationMode::Reduced
        } else {
            OperationMode::Full
        }
    }

    /// Whether the named loop ("scout", "tracker", "engagement", "feedback",
    /// "review") is allowed to run this tick under the current mode.
    pub fn should_run(&self, loop_name: &str) -> bool {
        match self {
            OperationMode::Paused => false,
            OperationMode::Minimal => matches!(loop_name, "scout" | "tracker" | "feedback"),
            OperationMode::Reduced => loop_name != "engagement",
            OperationMode::Full => true,
        }
    }

    /// Whether the scout cycle should run the Creator step at all.
    pub fn creation_allowed(&self) -> bool {
        !matches!(self, OperationMode::Minimal | OperationMode::Paused)
    }

    pub fn creation_limit(&self) -> usize {
        if matches!(self, OperationMode::Reduced) {
            REDUCED_CREATION_LIMIT
        } else {
            FULL_CREATION_LIMIT
        }
    }

    pub fn skip_video(&self) -> bool {
        matches!(self, OperationMode::Reduced)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationMode::Full => "full",
            OperationMode::Reduced => "reduced",
            OperationMode::Minimal => "minimal",
            OperationMode::Paused => "paused",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            OperationMode::Full => "All agents running, full features enabled",
            OperationMode::Reduced => "Limited creation (3/cycle), video generation skipped",
            OperationMode::Minimal => "Scout + tracker only, no content creation",
            OperationMode::Paused => "All operations paused, waiting for cost reset",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thresholds_match_worked_example() {
        assert_eq!(OperationMode::for_cost_ratio(0.0), OperationMode::Full);
        assert_eq!(OperationMode::for_cost_ratio(0.69), OperationMode::Full);
        assert_eq!(OperationMode::for_cost_ratio(0.70), OperationMode::Reduced);
        assert_eq!(OperationMode::for_cost_ratio(0.84), OperationMode::Reduced);
        assert_eq!(OperationMode::for_cost_ratio(0.85), OperationMode::Minimal);
        assert_eq!(OperationMode::for_cost_ratio(0.94), OperationMode::Minimal);
        assert_eq!(OperationMode::for_cost_ratio(0.95), OperationMode::Paused);
        assert_eq!(OperationMode::for_cost_ratio(2.0), OperationMode::Paused);
    }

    #[test]
    fn reduced_skips_only_engagement() {
        let mode = OperationMode::Reduced;
        assert!(mode.should_run("scout"));
        assert!(mode.should_run("tracker"));
        assert!(mode.should_run("feedback"));
        assert!(mode.should_run("review"));
        assert!(!mode.should_run("engagement"));
    }

    #[test]
    fn minimal_runs_only_scout_tracker_feedback() {
        let mode = OperationMode::Minimal;
        assert!(mode.should_run("scout"));
        assert!(mode.should_run("tracker"));
        assert!(mode.should_run("feedback"));
        assert!(!mode.should_run("engagement"));
        assert!(!mode.should_run("review"));
    }

    #[test]
    fn paused_runs_nothing() {
        let mode = OperationMode::Paused;
        for name in ["scout", "tracker", "engagement", "feedback", "review"] {
            assert!(!mode.should_run(name));
        }
    }
}
