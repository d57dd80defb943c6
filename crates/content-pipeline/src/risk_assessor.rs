use once_cell::sync::Lazy;
use regex::Regex;

use content_core::types::RiskLevel;

const HIGH_RISK_KEYWORDS: &[&str] = &[
    "lawsuit",
    "sue",
    "illegal",
    "fraud",
    "scam",
    "discriminat",
    "harassment",
    "racist",
    "sexist",
    "defamation",
    "libel",
];

const MEDIUM_RISK_KEYWORDS: &[&str] = &[
    "controversial",
    "political",
    "religion",
    "layoff",
    "fired",
    "bankruptcy",
    "scandal",
    "boycott",
    "backlash",
    "outrage",
];

const COMPETITOR_MENTIONS: &[&str] = &["openai", "anthropic", "google", "meta", "microsoft"];

static CLAIM_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?i)\bguarantee(d|s)?\b").unwrap(),
        Regex::new(r"(?i)\b(100|hundred)\s*%\b").unwrap(),
        Regex::new(r"(?i)\bproven\s+to\b").unwrap(),
    ]
});

const HIGH_RISK_WEIGHT: f64 = 0.30;
const MEDIUM_RISK_WEIGHT: f64 = 0.10;
const CLAIM_WEIGHT: f64 = 0.15;
const COMPETITOR_WEIGHT: f64 = 0.05;

const HIGH_BUCKET: f64 = 0.60;
const MEDIUM_BUCKET: f64 = 0.25;

#[derive(Debug, Clone, Default)]
pub struct RiskAssessment {
    pub score: f64,
    pub level: RiskLevel,
    pub flags: Vec<String>,
}

/// Keyword and pattern scoring over a creation's title and body. No LLM
/// involved — this is a fast, deterministic gate that runs on every
/// candidate before it reaches a human (§4.7).
pub struct RiskAssessor;

impl RiskAssessor {
    pub fn assess(body: &str, title: &str) -> RiskAssessment {
        let haystack = format!("{title} {body}").to_lowercase();
        let mut score = 0.0;
        let mut flags = Vec::new();

        for kw in HIGH_RISK_KEYWORDS {
            if haystack.contains(kw) {
                score += HIGH_RISK_WEIGHT;
                flags.push(format!("high_risk_keyword:{kw}"));
            }
        }
        for kw in MEDIUM_RISK_KEYWORDS {
            if haystack.contains(kw) {
                score += MEDIUM_RISK_WEIGHT;
                flags.push(format!("medium_risk_keyword:{kw}"));
            }
        }
        for (idx, pattern) in CLAIM_PATTERNS.iter().enumerate() {
            if pattern.is_match(&haystack) {
                score += CLAIM_WEIGHT;
                flags.push(format!("unverified_claim:{idx}"));
            }
        }
        for competitor in COMPETITOR_MENTIONS {
            if haystack.contains(competitor) {
                score += COMPETITOR_WEIGHT;
                flags.push(format!("competitor_mention:{competitor}"));
            }
        }

        score = score.min(1.0);
        let level = if score >= HIGH_BUCKET {
            RiskLevel::High
        } else if score >= MEDIUM_BUCKET {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        };

        RiskAssessment { score, level, flags }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_body_is_low_risk() {
        let a = RiskAssessor::assess("calm, grounded analysis of the release", "Notes on the release");
        assert_eq!(a.level, RiskLevel::Low);
        assert!(a.flags.is_empty());
    }

    #[test]
    fn lawsuit_and_claim_push_to_high() {
        let a = RiskAssessor::assess(
            "This is a lawsuit waiting to happen, and it's guaranteed to work 100%.",
            "Big news",
        );
        assert_eq!(a.level, RiskLevel::High);
        assert!(a.score >= HIGH_BUCKET);
    }

    #[test]
    fn single_medium_keyword_stays_medium_or_lower() {
        let a = RiskAssessor::assess("the layoff news rattled the industry", "Layoffs");
        assert!(a.score <= HIGH_BUCKET);
        assert!(a.flags.iter().any(|f| f.starts_with("medium_risk_keyword")));
    }

    #[test]
    fn score_never_exceeds_one() {
        let body = HIGH_RISK_KEYWORDS.join(" ") + " " + &MEDIUM_RISK_KEYWORDS.join(" ");
        let a = RiskAssessor::assess(&body, "openai anthropic google meta microsoft");
        assert!(a.score <= 1.0);
    }
}
