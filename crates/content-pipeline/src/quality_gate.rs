use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

pub const QUALITY_AUTO_REJECT_THRESHOLD: f64 = 0.4;
pub const QUALITY_WARNING_THRESHOLD: f64 = 0.6;

const PLACEHOLDER_SCORE: f64 = 0.1;

static PLACEHOLDER_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"\[.*?\]").unwrap(),
        Regex::new(r"\{.*?\}").unwrap(),
        Regex::new(r"(?i)\bTODO\b").unwrap(),
        Regex::new(r"(?i)\bPLACEHOLDER\b").unwrap(),
    ]
});

static SENTENCE_SPLIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.!?]+\s+").unwrap());
static EXCLAMATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"!").unwrap());
static EMOJI: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[\u{1F300}-\u{1FAFF}\u{2600}-\u{27BF}]").unwrap()
});

struct PlatformProfile {
    min_length: usize,
    ideal_length: (usize, usize),
    max_length: usize,
    requires_paragraphs: bool,
    ideal_sentence_length: (usize, usize),
    banned_words: &'static [&'static str],
    hook_max_length: usize,
    max_exclamations: usize,
    max_emojis: usize,
    requires_sections: bool,
    requires_pacing: bool,
    weight_group: WeightGroup,
}

#[derive(Clone, Copy)]
enum WeightGroup {
    Default,
    HookHeavy,
    StructureHeavy,
}

fn profile(platform: &str) -> PlatformProfile {
    match platform {
        "twitter" => PlatformProfile {
            min_length: 20,
            ideal_length: (60, 240),
            max_length: 280,
            requires_paragraphs: false,
            ideal_sentence_length: (5, 20),
            banned_words: &["buy now", "limited time", "act fast"],
            hook_max_length: 80,
            max_exclamations: 1,
            max_emojis: 2,
            requires_sections: false,
            requires_pacing: false,
            weight_group: WeightGroup::HookHeavy,
        },
        "tiktok" => PlatformProfile {
            min_length: 30,
            ideal_length: (80, 300),
            max_length: 500,
            requires_paragraphs: false,
            ideal_sentence_length: (4, 15),
            banned_words: &["buy now", "limited time", "act fast", "don't miss out"],
            hook_max_length: 60,
            max_exclamations: 2,
            max_emojis: 4,
            requires_sections: false,
            requires_pacing: true,
            weight_group: WeightGroup::HookHeavy,
        },
        "medium" => PlatformProfile {
            min_length: 800,
            ideal_length: (1200, 3000),
            max_length: 6000,
            requires_paragraphs: true,
            ideal_sentence_length: (10, 30),
            banned_words: &["buy now", "limited time", "act fast", "guaranteed"],
            hook_max_length: 200,
            max_exclamations: 3,
            max_emojis: 2,
            requires_sections: true,
            requires_pacing: false,
            weight_group: WeightGroup::StructureHeavy,
        },
        "youtube" => PlatformProfile {
            min_length: 150,
            ideal_length: (300, 1200),
            max_length: 5000,
            requires_paragraphs: true,
            ideal_sentence_length: (8, 25),
            banned_words: &["buy now", "limited time", "act fast"],
            hook_max_length: 120,
            max_exclamations: 3,
            max_emojis: 3,
            requires_sections: false,
            requires_pacing: true,
            weight_group: WeightGroup::Default,
        },
        // linkedin and anything unrecognized fall back to the linkedin profile.
        _ => PlatformProfile {
            min_length: 150,
            ideal_length: (400, 1500),
            max_length: 3000,
            requires_paragraphs: true,
            ideal_sentence_length: (8, 25),
            banned_words: &["buy now", "limited time", "act fast", "guaranteed"],
            hook_max_length: 150,
            max_exclamations: 2,
            max_emojis: 2,
            requires_sections: false,
            requires_pacing: false,
            weight_group: WeightGroup::Default,
        },
    }
}

fn weights(group: WeightGroup) -> BTreeMap<&'static str, f64> {
    let mut m = BTreeMap::new();
    match group {
        WeightGroup::HookHeavy => {
            m.insert("length", 0.10);
            m.insert("readability", 0.15);
            m.insert("structure", 0.10);
            m.insert("title", 0.10);
            m.insert("substance", 0.25);
            m.insert("hook", 0.30);
        }
        WeightGroup::StructureHeavy => {
            m.insert("length", 0.15);
            m.insert("readability", 0.15);
            m.insert("structure", 0.25);
            m.insert("title", 0.10);
            m.insert("substance", 0.25);
            m.insert("hook", 0.10);
        }
        WeightGroup::Default => {
            m.insert("length", 0.15);
            m.insert("readability", 0.20);
            m.insert("structure", 0.15);
            m.insert("title", 0.15);
            m.insert("substance", 0.20);
            m.insert("hook", 0.15);
        }
    }
    m
}

#[derive(Debug, Clone, Default)]
pub struct QualityReport {
    pub score: f64,
    pub warning: bool,
    pub auto_reject: bool,
    pub issues: Vec<String>,
    pub sub_scores: BTreeMap<String, f64>,
}

/// Platform-aware content quality scoring (§4.7). Mirrors the routing split
/// used upstream: a hard placeholder-text reject short-circuits everything
/// else, otherwise six weighted sub-scores combine into one number.
pub struct QualityGate;

impl QualityGate {
    pub fn check(title: &str, body: &str, platform: &str) -> QualityReport {
        let mut issues = Vec::new();

        if PLACEHOLDER_PATTERNS.iter().any(|p| p.is_match(body) || p.is_match(title)) {
            issues.push("placeholder_text_detected".to_string());
            return QualityReport {
                score: PLACEHOLDER_SCORE,
                warning: true,
                auto_reject: true,
                issues,
                sub_scores: BTreeMap::new(),
            };
        }

        let profile = profile(platform);
        let mut sub_scores = BTreeMap::new();

        let length_score = score_length(body, &profile, &mut issues);
        let readability_score = score_readability(body, &profile, &mut issues);
        let structure_score = score_structure(body, &profile, &mut issues);
        let title_score = score_title(title, &profile, &mut issues);
        let substance_score = score_substance(body, &profile, &mut issues);
        let hook_score = score_hook(body, &profile, &mut issues);

        sub_scores.insert("length".to_string(), length_score);
        sub_scores.insert("readability".to_string(), readability_score);
        sub_scores.insert("structure".to_string(), structure_score);
        sub_scores.insert("title".to_string(), title_score);
        sub_scores.insert("substance".to_string(), substance_score);
        sub_scores.insert("hook".to_string(), hook_score);

        let w = weights(profile.weight_group);
        let score = w["length"] * length_score
            + w["readability"] * readability_score
            + w["structure"] * structure_score
            + w["title"] * title_score
            + w["substance"] * substance_score
            + w["hook"] * hook_score;
        let score = score.clamp(0.0, 1.0);

        QualityReport {
            score,
            warning: score < QUALITY_WARNING_THRESHOLD,
            auto_reject: score < QUALITY_AUTO_REJECT_THRESHOLD,
            issues,
            sub_scores,
        }
    }
}

fn score_length(body: &str, profile: &PlatformProfile, issues: &mut Vec<String>) -> f64 {
    let len = body.chars().count();
    if len < profile.min_length {
        issues.push(format!("body too short ({len} < {})", profile.min_length));
        return (len as f64 / profile.min_length as f64).clamp(0.0, 0.5);
    }
    if len > profile.max_length {
        issues.push(format!("body too long ({len} > {})", profile.max_length));
        return 0.4;
    }
    let (lo, hi) = profile.ideal_length;
    if len >= lo && len <= hi {
        1.0
    } else if len < lo {
        0.6 + 0.4 * (len as f64 - profile.min_length as f64) / (lo as f64 - profile.min_length as f64).max(1.0)
    } else {
        0.6 + 0.4 * (profile.max_length as f64 - len as f64) / (profile.max_length as f64 - hi as f64).max(1.0)
    }
}

fn score_readability(body: &str, profile: &PlatformProfile, issues: &mut Vec<String>) -> f64 {
    let sentences: Vec<&str> = SENTENCE_SPLIT.split(body).filter(|s| !s.trim().is_empty()).collect();
    if sentences.is_empty() {
        issues.push("no sentences detected".to_string());
        return 0.3;
    }
    let avg_words = sentences
        .iter()
        .map(|s| s.split_whitespace().count())
        .sum::<usize>() as f64
        / sentences.len() as f64;
    let (lo, hi) = profile.ideal_sentence_length;
    if avg_words >= lo as f64 && avg_words <= hi as f64 {
        1.0
    } else if avg_words < lo as f64 {
        issues.push("sentences unusually short".to_string());
        0.6
    } else {
        issues.push("sentences unusually long".to_string());
        0.5
    }
}

fn score_structure(body: &str, profile: &PlatformProfile, issues: &mut Vec<String>) -> f64 {
    let paragraphs = body.split("\n\n").filter(|p| !p.trim().is_empty()).count();
    let mut score = if profile.requires_paragraphs {
        if paragraphs >= 2 {
            1.0
        } else {
            issues.push("expected multiple paragraphs".to_string());
            0.5
        }
    } else {
        1.0
    };
    if profile.requires_sections {
        let has_headers = body.lines().any(|l| l.trim_start().starts_with('#'));
        if !has_headers {
            issues.push("expected section headers".to_string());
            score *= 0.6;
        }
    }
    if profile.requires_pacing {
        let has_breaks = body.contains('\n');
        if !has_breaks {
            issues.push("expected pacing breaks between beats".to_string());
            score *= 0.8;
        }
    }
    score
}

fn score_title(title: &str, profile: &PlatformProfile, issues: &mut Vec<String>) -> f64 {
    if title.trim().is_empty() {
        issues.push("missing title".to_string());
        return 0.0;
    }
    let len = title.chars().count();
    if len > profile.hook_max_length * 2 {
        issues.push("title excessively long".to_string());
        return 0.5;
    }
    1.0
}

fn score_substance(body: &str, profile: &PlatformProfile, issues: &mut Vec<String>) -> f64 {
    let lower = body.to_lowercase();
    let mut score = 1.0;
    for banned in profile.banned_words {
        if lower.contains(banned) {
            issues.push(format!("banned phrase: {banned}"));
            score -= 0.2;
        }
    }
    score.max(0.0)
}

fn score_hook(body: &str, profile: &PlatformProfile, issues: &mut Vec<String>) -> f64 {
    let first_line = body.lines().next().unwrap_or("");
    let mut score = 1.0;

    let exclamations = EXCLAMATION.find_iter(body).count();
    if exclamations > profile.max_exclamations {
        issues.push(format!("too many exclamation marks ({exclamations})"));
        score -= 0.2;
    }
    let emojis = EMOJI.find_iter(body).count();
    if emojis > profile.max_emojis {
        issues.push(format!("too many emoji ({emojis})"));
        score -= 0.2;
    }
    if first_line.chars().count() > profile.hook_max_length {
        issues.push("opening line too long to hook a reader".to_string());
        score -= 0.2;
    }
    score.max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_text_is_auto_rejected() {
        let report = QualityGate::check("My Title", "This is a [PLACEHOLDER] body.", "linkedin");
        assert!(report.auto_reject);
        assert_eq!(report.score, PLACEHOLDER_SCORE);
    }

    #[test]
    fn well_formed_linkedin_post_passes() {
        let body = "The release shipped on schedule.\n\nTeams coordinated across three time zones without a single blocked merge. The retro surfaced one process gap worth fixing next quarter. Nothing dramatic, just steady execution that held up under load.";
        let report = QualityGate::check("Shipping without drama", body, "linkedin");
        assert!(!report.auto_reject);
    }

    #[test]
    fn short_twitter_post_is_penalized_on_length() {
        let report = QualityGate::check("hi", "too short", "twitter");
        assert!(report.sub_scores["length"] < 1.0);
    }
}
