use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

use content_core::types::{Creation, MetricInterval};
use content_core::CoreResult;
use content_pipeline::AvoidGuidanceSource;
use content_store::Store;

const FAILURE_ENGAGEMENT_THRESHOLD: f64 = 0.02;
const MIN_SAMPLES_FOR_PATTERN: usize = 3;
const HOOK_PATTERN_RATE: f64 = 0.3;
const LENGTH_PATTERN_RATE: f64 = 0.25;
const TIMING_PATTERN_RATE: f64 = 0.3;
const TIMING_PATTERN_MIN_COUNT: u32 = 2;
const SKILL_PATTERN_MIN_TOTAL: u32 = 2;
const FORMAT_PATTERN_MIN_COUNT: u32 = 3;

#[derive(Debug, Clone, Default)]
pub struct FailureAnalysisReport {
    pub failure_count: usize,
    pub patterns_by_category: BTreeMap<String, usize>,
}

struct NamedPattern {
    description: String,
    rate: f64,
}

/// Learns recurring features of low-engagement content and caches
/// "avoid" guidance the Creator injects into its prompts, keyed by
/// `(platform, format)` (§4.9 step 4). Implements content-pipeline's
/// `AvoidGuidanceSource` so Creator stays unaware of how the guidance
/// is produced.
pub struct FailurePatternTracker {
    cache: DashMap<(String, String), String>,
}

impl FailurePatternTracker {
    pub fn new() -> Self {
        Self { cache: DashMap::new() }
    }

    pub fn analyze_failures(&self, store: &Store, now: DateTime<Utc>, lookback_days: i64) -> CoreResult<FailureAnalysisReport> {
        let cutoff = now - Duration::days(lookback_days);

        let mut failures: Vec<Creation> = Vec::new();
        for publication in store.all_publications()? {
            if publication.published_at < cutoff {
                continue;
            }
            let metrics = store.metrics_by_publication(publication.id)?;
            let Some(h24) = metrics.into_iter().find(|m| m.interval == MetricInterval::H24) else {
                continue;
            };
            if h24.snapshot.engagement_rate >= FAILURE_ENGAGEMENT_THRESHOLD {
                continue;
            }
            if let Some(creation) = store.get_creation(publication.creation_id)? {
                failures.push(creation);
            }
        }

        if failures.len() < MIN_SAMPLES_FOR_PATTERN {
            tracing::info!(count = failures.len(), "not enough failures to establish patterns");
            return Ok(FailureAnalysisReport {
                failure_count: failures.len(),
                patterns_by_category: BTreeMap::new(),
            });
        }

        let hooks = Self::analyze_hooks(&failures);
        let lengths = Self::analyze_lengths(&failures);
        let timings = Self::analyze_timings(&failures);
        let skills = Self::analyze_skills(&failures);
        let formats = Self::analyze_formats(&failures);

        self.cache.clear();
        let mut combos: Vec<(String, String)> = failures.iter().map(|c| (c.platform.clone(), c.format.clone())).collect();
        combos.sort();
        combos.dedup();
        for (platform, format) in combos {
            let text = Self::render_guidance(&platform, &format, &hooks, &lengths, &timings, &skills, &formats);
            if !text.is_empty() {
                self.cache.insert((platform, format), text);
            }
        }

        let mut patterns_by_category = BTreeMap::new();
        patterns_by_category.insert("hook_patterns".to_string(), hooks.len());
        patterns_by_category.insert("length_patterns".to_string(), lengths.values().map(|v| v.len()).sum());
        patterns_by_category.insert("timing_patterns".to_string(), timings.values().map(|v| v.len()).sum());
        patterns_by_category.insert("skill_patterns".to_string(), skills.len());
        patterns_by_category.insert("format_patterns".to_string(), formats.len());

        tracing::info!(failures = failures.len(), ?patterns_by_category, "failure pattern analysis complete");

        Ok(FailureAnalysisReport {
            failure_count: failures.len(),
            patterns_by_category,
        })
    }

    fn analyze_hooks(failures: &[Creation]) -> Vec<NamedPattern> {
        let mut issues: BTreeMap<&'static str, u32> = BTreeMap::new();
        let total = failures.len() as f64;

        for creation in failures {
            let first_line = creation.body.lines().next().unwrap_or("").trim();
            if first_line.chars().count() < 20 {
                *issues.entry("too_short_hook").or_default() += 1;
            }
            if first_line.ends_with('!') {
                *issues.entry("exclamation_hook").or_default() += 1;
            }
            if first_line.starts_with("I ") || first_line.starts_with("We ") || first_line.starts_with("Our ") {
                *issues.entry("self_focused_hook").or_default() += 1;
            }
            if first_line.split('.').next().map(|s| s.chars().next().map(|c| c.is_ascii_digit()).unwrap_or(false)).unwrap_or(false) {
                *issues.entry("numbered_list_start").or_default() += 1;
            }
            if !first_line.contains('?') && first_line.chars().count() > 50 {
                *issues.entry("long_statement_no_question").or_default() += 1;
            }
            let lower = first_line.to_lowercase();
            if ["excited", "thrilled", "amazing", "incredible"].iter().any(|w| lower.contains(w)) {
                *issues.entry("hyperbolic_hook").or_default() += 1;
            }
        }

        let mut patterns: Vec<NamedPattern> = issues
            .into_iter()
            .filter_map(|(issue, count)| {
                let rate = count as f64 / total;
                if rate < HOOK_PATTERN_RATE {
                    return None;
                }
                let description = match issue {
                    "too_short_hook" => "Very short opening lines (<20 chars)",
                    "exclamation_hook" => "Opening lines ending with exclamation marks",
                    "self_focused_hook" => "Self-focused openings (I/We/Our)",
                    "numbered_list_start" => "Starting with numbered list format",
                    "long_statement_no_question" => "Long declarative statements without questions",
                    "hyperbolic_hook" => "Hyperbolic language (excited, amazing, incredible)",
                    other => other,
                };
                Some(NamedPattern { description: description.to_string(), rate })
            })
            .collect();
        patterns.sort_by(|a, b| b.rate.partial_cmp(&a.rate).unwrap());
        patterns
    }

    fn analyze_lengths(failures: &[Creation]) -> BTreeMap<String, Vec<NamedPattern>> {
        let mut by_platform: BTreeMap<String, BTreeMap<&'static str, u32>> = BTreeMap::new();
        let mut totals: BTreeMap<String, u32> = BTreeMap::new();

        for creation in failures {
            *totals.entry(creation.platform.clone()).or_default() += 1;
            let len = creation.body.chars().count();
            let issues = by_platform.entry(creation.platform.clone()).or_default();
            match creation.platform.as_str() {
                "linkedin" => {
                    if len < 100 {
                        *issues.entry("too_short").or_default() += 1;
                    } else if len > 2500 {
                        *issues.entry("too_long").or_default() += 1;
                    }
                }
                "twitter" => {
                    if len > 250 {
                        *issues.entry("too_long").or_default() += 1;
                    }
                }
                "youtube" | "tiktok" => {
                    if len < 50 {
                        *issues.entry("too_short").or_default() += 1;
                    }
                }
                _ => {}
            }
        }

        let mut result = BTreeMap::new();
        for (platform, issues) in by_platform {
            let total = *totals.get(&platform).unwrap_or(&1) as f64;
            let patterns: Vec<NamedPattern> = issues
                .into_iter()
                .filter_map(|(issue, count)| {
                    let rate = count as f64 / total;
                    if rate < LENGTH_PATTERN_RATE {
                        return None;
                    }
                    Some(NamedPattern {
                        description: format!("Content {} for {platform}", issue.replace('_', " ")),
                        rate,
                    })
                })
                .collect();
            if !patterns.is_empty() {
                result.insert(platform, patterns);
            }
        }
        result
    }

    fn analyze_timings(failures: &[Creation]) -> BTreeMap<String, Vec<NamedPattern>> {
        let mut by_platform: BTreeMap<String, BTreeMap<String, u32>> = BTreeMap::new();
        let mut totals: BTreeMap<String, u32> = BTreeMap::new();

        for creation in failures {
            let Some(published_at) = creation.approved_at else {
                continue;
            };
            *totals.entry(creation.platform.clone()).or_default() += 1;
            let bucket = by_platform.entry(creation.platform.clone()).or_default();

            use chrono::{Datelike, Timelike};
            let day = published_at.weekday();
            *bucket.entry(format!("day_{day}")).or_default() += 1;

            let hour = published_at.hour();
            if hour < 6 {
                *bucket.entry("late_night".to_string()).or_default() += 1;
            } else if hour > 20 {
                *bucket.entry("evening".to_string()).or_default() += 1;
            } else if (12..=13).contains(&hour) {
                *bucket.entry("lunch_hour".to_string()).or_default() += 1;
            }
        }

        let mut result = BTreeMap::new();
        for (platform, bucket) in by_platform {
            let total = *totals.get(&platform).unwrap_or(&1) as f64;
            let patterns: Vec<NamedPattern> = bucket
                .into_iter()
                .filter_map(|(key, count)| {
                    let rate = count as f64 / total;
                    if rate < TIMING_PATTERN_RATE || count < TIMING_PATTERN_MIN_COUNT {
                        return None;
                    }
                    let description = if let Some(day) = key.strip_prefix("day_") {
                        format!("Posts on {day} tend to underperform")
                    } else {
                        match key.as_str() {
                            "late_night" => "Late night posts (before 6am)".to_string(),
                            "evening" => "Late evening posts (after 8pm)".to_string(),
                            "lunch_hour" => "Lunch hour posts (12-1pm)".to_string(),
                            other => other.to_string(),
                        }
                    };
                    Some(NamedPattern { description, rate })
                })
                .collect();
            if !patterns.is_empty() {
                result.insert(platform, patterns);
            }
        }
        result
    }

    /// `rate` here is a raw occurrence count among failures, not a fraction:
    /// the denominator (uses across all outcomes, not just failed ones) isn't
    /// available from this failure-only sample.
    fn analyze_skills(failures: &[Creation]) -> Vec<NamedPattern> {
        let mut counts: BTreeMap<String, u32> = BTreeMap::new();
        for creation in failures {
            for skill in &creation.skills_used {
                *counts.entry(skill.clone()).or_default() += 1;
            }
        }
        let mut patterns: Vec<NamedPattern> = counts
            .into_iter()
            .filter(|(_, total)| *total >= SKILL_PATTERN_MIN_TOTAL)
            .map(|(skill, total)| NamedPattern {
                description: format!("Skill '{skill}' appears in {total} failed creations"),
                rate: total as f64,
            })
            .collect();
        patterns.sort_by(|a, b| b.rate.partial_cmp(&a.rate).unwrap());
        patterns
    }

    fn analyze_formats(failures: &[Creation]) -> BTreeMap<(String, String), u32> {
        let mut counts: BTreeMap<(String, String), u32> = BTreeMap::new();
        for creation in failures {
            *counts.entry((creation.platform.clone(), creation.format.clone())).or_default() += 1;
        }
        counts.into_iter().filter(|(_, count)| *count >= FORMAT_PATTERN_MIN_COUNT).collect()
    }

    fn render_guidance(
        platform: &str,
        format: &str,
        hooks: &[NamedPattern],
        lengths: &BTreeMap<String, Vec<NamedPattern>>,
        timings: &BTreeMap<String, Vec<NamedPattern>>,
        skills: &[NamedPattern],
        formats: &BTreeMap<(String, String), u32>,
    ) -> String {
        let mut lines = vec!["## CAUTION: Patterns to AVOID (from failed content)".to_string()];

        if !hooks.is_empty() {
            lines.push("### Hook Patterns to Avoid".to_string());
            for pattern in hooks.iter().take(5) {
                lines.push(format!("- {} (failure rate: {:.0}%)", pattern.description, pattern.rate * 100.0));
            }
        }

        if let Some(platform_lengths) = lengths.get(platform) {
            lines.push(format!("### Length Issues on {platform}"));
            for pattern in platform_lengths {
                lines.push(format!("- {}", pattern.description));
            }
        }

        if let Some(platform_timings) = timings.get(platform) {
            lines.push(format!("### Bad Posting Times for {platform}"));
            for pattern in platform_timings.iter().take(3) {
                lines.push(format!("- {}", pattern.description));
            }
        }

        let underperforming_skills: Vec<&NamedPattern> = skills.iter().filter(|s| s.rate >= 2.0).take(3).collect();
        if !underperforming_skills.is_empty() {
            lines.push("### Skill Patterns to Use Cautiously".to_string());
            for pattern in underperforming_skills {
                lines.push(format!("- {}", pattern.description));
            }
        }

        if let Some(count) = formats.get(&(platform.to_string(), format.to_string())) {
            lines.push(format!("### Format Fit\n- {format} on {platform} has {count} recent failures"));
        }

        if lines.len() <= 1 {
            return String::new();
        }
        lines.join("\n")
    }
}

impl Default for FailurePatternTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl AvoidGuidanceSource for FailurePatternTracker {
    fn avoid_guidance(&self, platform: &str, format: &str) -> Option<String> {
        self.cache.get(&(platform.to_string(), format.to_string())).map(|entry| entry.value().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use content_core::types::{ApprovalStatus, DeferredVideo, DiscoveryItem, MediaAsset, Metric, Publication};

    fn store() -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        (dir, store)
    }

    fn failed_creation(platform: &str) -> Creation {
        Creation {
            id: 0,
            discovery_id: 0,
            platform: platform.to_string(),
            format: "post".into(),
            title: "t".into(),
            body: "I am so excited about this incredible launch!".into(),
            media_urls: vec![MediaAsset::Image { url: "x".into() }],
            skills_used: vec![],
            risk_score: Some(0.1),
            risk_flags: vec![],
            quality_score: Some(0.8),
            quality_issues: vec![],
            variant_group: None,
            variant_label: None,
            approval_status: ApprovalStatus::AutoApproved,
            video: DeferredVideo::default(),
            created_at: Utc::now(),
            approved_at: Some(Utc::now()),
        }
    }

    fn publish_with_low_engagement(store: &Store, creation_id: u64, platform: &str, now: DateTime<Utc>) {
        let publication = Publication {
            id: 0,
            creation_id,
            platform: platform.to_string(),
            platform_post_id: "p".into(),
            platform_url: None,
            arbitrage_window_minutes: None,
            published_at: now,
        };
        let publication_id = store.insert_publication(publication).unwrap();
        store
            .insert_metric(Metric {
                id: 0,
                publication_id,
                interval: MetricInterval::H24,
                snapshot: content_core::types::EngagementSnapshot {
                    engagement_rate: 0.005,
                    ..Default::default()
                },
                collected_at: now,
            })
            .unwrap();
    }

    #[test]
    fn fewer_than_three_failures_produces_no_patterns() {
        let (_dir, store) = store();
        let now = Utc::now();
        let creation_id = store.insert_creation(failed_creation("linkedin")).unwrap();
        publish_with_low_engagement(&store, creation_id, "linkedin", now);

        let tracker = FailurePatternTracker::new();
        let report = tracker.analyze_failures(&store, now, 14).unwrap();
        assert_eq!(report.failure_count, 1);
        assert!(report.patterns_by_category.is_empty());
        assert!(tracker.avoid_guidance("linkedin", "post").is_none());
    }

    #[test]
    fn hyperbolic_hook_surfaces_once_sample_threshold_met() {
        let (_dir, store) = store();
        let now = Utc::now();
        for _ in 0..4 {
            let discovery = store
                .insert_discovery_if_new(DiscoveryItem {
                    source: "hackernews".into(),
                    source_id: uuid::Uuid::new_v4().to_string(),
                    title: "x".into(),
                    url: "https://x".into(),
                    raw_score: 1.0,
                    raw_data: serde_json::json!({}),
                    discovered_at: now,
                })
                .unwrap()
                .0;
            let mut creation = failed_creation("linkedin");
            creation.discovery_id = discovery;
            let creation_id = store.insert_creation(creation).unwrap();
            publish_with_low_engagement(&store, creation_id, "linkedin", now);
        }

        let tracker = FailurePatternTracker::new();
        let report = tracker.analyze_failures(&store, now, 14).unwrap();
        assert_eq!(report.failure_count, 4);
        assert!(report.patterns_by_category.get("hook_patterns").copied().unwrap_or(0) > 0);
        let guidance = tracker.avoid_guidance("linkedin", "post").unwrap();
        assert!(guidance.contains("Hyperbolic"));
    }
}
