//! Flag evaluation over the polled flag data.
//!
//! Evaluation order: off switch, prerequisites, individual targets, rules in
//! order, then the fallthrough. Rules and the fallthrough serve either a fixed
//! variation or a percentage rollout bucketed on a SHA-1 of the flag key,
//! salt and user key.

use super::{EvaluationReason, LdUser};
use crate::providers::traits::{ProviderError, ProviderResult};
use chrono::DateTime;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use sha1::{Digest, Sha1};
use std::collections::HashMap;

/// Largest value of the 15 hex digits taken from the hash
const BUCKET_SCALE: f64 = 0x0FFF_FFFF_FFFF_FFFF_u64 as f64;
/// Rollout weights are expressed in thousandths of a percent
const WEIGHT_SCALE: f64 = 100_000.0;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct Target {
    values: Vec<String>,
    variation: usize,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct VariationOrRollout {
    variation: Option<usize>,
    rollout: Option<Rollout>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct Rollout {
    #[serde(default)]
    variations: Vec<WeightedVariation>,
    bucket_by: Option<String>,
    seed: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub(super) struct WeightedVariation {
    variation: usize,
    #[serde(default)]
    weight: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct Clause {
    attribute: String,
    op: String,
    #[serde(default)]
    values: Vec<Value>,
    #[serde(default)]
    negate: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct Rule {
    #[serde(default)]
    clauses: Vec<Clause>,
    #[serde(flatten)]
    serve: VariationOrRollout,
}

#[derive(Debug, Clone, Deserialize)]
pub(super) struct Prerequisite {
    key: String,
    variation: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct FlagModel {
    #[serde(default)]
    pub version: u64,
    on: bool,
    off_variation: Option<usize>,
    #[serde(default)]
    fallthrough: VariationOrRollout,
    #[serde(default)]
    targets: Vec<Target>,
    #[serde(default)]
    rules: Vec<Rule>,
    #[serde(default)]
    prerequisites: Vec<Prerequisite>,
    #[serde(default)]
    salt: String,
    #[serde(default)]
    pub variations: Vec<Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct SegmentRule {
    #[serde(default)]
    clauses: Vec<Clause>,
    weight: Option<u32>,
    bucket_by: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(super) struct SegmentModel {
    #[serde(default)]
    included: Vec<String>,
    #[serde(default)]
    excluded: Vec<String>,
    #[serde(default)]
    rules: Vec<SegmentRule>,
    #[serde(default)]
    salt: String,
}

/// Everything `GET /sdk/latest-all` returns that evaluation needs
#[derive(Debug, Clone, Default, Deserialize)]
pub(super) struct FlagData {
    #[serde(default)]
    pub flags: HashMap<String, FlagModel>,
    #[serde(default)]
    pub segments: HashMap<String, SegmentModel>,
}

pub(super) type Evaluated = (Option<usize>, EvaluationReason);

impl FlagData {
    /// Evaluate `flag`, stored under `key`, for `user`
    pub(super) fn evaluate(&self, key: &str, flag: &FlagModel, user: &LdUser) -> ProviderResult<Evaluated> {
        let mut visiting = Vec::new();
        self.evaluate_flag(key, flag, user, &mut visiting)
    }

    fn evaluate_flag(
        &self,
        key: &str,
        flag: &FlagModel,
        user: &LdUser,
        visiting: &mut Vec<String>,
    ) -> ProviderResult<Evaluated> {
        if !flag.on {
            return Ok((flag.off_variation, EvaluationReason::Off));
        }

        if !flag.prerequisites.is_empty() {
            if visiting.iter().any(|k| k == key) {
                return Err(malformed(key, "prerequisite cycle"));
            }
            visiting.push(key.to_string());
            let failed = self.failed_prerequisite(flag, user, visiting);
            visiting.pop();
            if let Some(prerequisite_key) = failed? {
                return Ok((flag.off_variation, EvaluationReason::PrerequisiteFailed { prerequisite_key }));
            }
        }

        if let Some(target) = flag
            .targets
            .iter()
            .find(|target| target.values.iter().any(|value| *value == user.key))
        {
            return Ok((Some(target.variation), EvaluationReason::TargetMatch));
        }

        for (rule_index, rule) in flag.rules.iter().enumerate() {
            if rule.clauses.iter().all(|clause| self.clause_matches(clause, user)) {
                let index = serve(&rule.serve, key, flag, user)?;
                return Ok((Some(index), EvaluationReason::RuleMatch { rule_index }));
            }
        }

        let index = serve(&flag.fallthrough, key, flag, user)?;
        Ok((Some(index), EvaluationReason::Fallthrough))
    }

    /// Key of the first prerequisite that is off or serves the wrong variation
    fn failed_prerequisite(
        &self,
        flag: &FlagModel,
        user: &LdUser,
        visiting: &mut Vec<String>,
    ) -> ProviderResult<Option<String>> {
        for prerequisite in &flag.prerequisites {
            let satisfied = match self.flags.get(&prerequisite.key) {
                Some(required) if required.on => {
                    let (index, _) = self.evaluate_flag(&prerequisite.key, required, user, visiting)?;
                    index == Some(prerequisite.variation)
                }
                _ => false,
            };
            if !satisfied {
                return Ok(Some(prerequisite.key.clone()));
            }
        }
        Ok(None)
    }

    fn clause_matches(&self, clause: &Clause, user: &LdUser) -> bool {
        if clause.op != "segmentMatch" {
            return user_clause_matches(clause, user);
        }
        let matched = clause
            .values
            .iter()
            .filter_map(Value::as_str)
            .any(|segment_key| {
                self.segments
                    .get(segment_key)
                    .is_some_and(|segment| segment.contains(segment_key, user))
            });
        matched != clause.negate
    }
}

impl SegmentModel {
    /// Segment rules only see user attributes; nested segment references never match.
    fn contains(&self, segment_key: &str, user: &LdUser) -> bool {
        if self.included.iter().any(|k| *k == user.key) {
            return true;
        }
        if self.excluded.iter().any(|k| *k == user.key) {
            return false;
        }
        self.rules.iter().any(|rule| {
            if !rule.clauses.iter().all(|clause| user_clause_matches(clause, user)) {
                return false;
            }
            match rule.weight {
                None => true,
                Some(weight) => {
                    let prefix = format!("{}.{}", segment_key, self.salt);
                    bucket(user, rule.bucket_by.as_deref(), &prefix) < f64::from(weight) / WEIGHT_SCALE
                }
            }
        })
    }
}

fn serve(serve: &VariationOrRollout, key: &str, flag: &FlagModel, user: &LdUser) -> ProviderResult<usize> {
    match (serve.variation, &serve.rollout) {
        (Some(index), _) => Ok(index),
        (None, Some(rollout)) => rollout
            .variation_for(key, &flag.salt, user)
            .ok_or_else(|| malformed(key, "rollout has no variations")),
        (None, None) => Err(malformed(key, "no variation or rollout")),
    }
}

impl Rollout {
    fn variation_for(&self, key: &str, salt: &str, user: &LdUser) -> Option<usize> {
        let prefix = match self.seed {
            Some(seed) => seed.to_string(),
            None => format!("{}.{}", key, salt),
        };
        let bucket = bucket(user, self.bucket_by.as_deref(), &prefix);

        let mut upper = 0.0;
        for weighted in &self.variations {
            upper += f64::from(weighted.weight) / WEIGHT_SCALE;
            if bucket < upper {
                return Some(weighted.variation);
            }
        }
        // Weights short of 100% leave the top of the range to the last variation
        self.variations.last().map(|weighted| weighted.variation)
    }
}

/// Position of `user` in `[0, 1)` for a rollout keyed by `prefix`
fn bucket(user: &LdUser, bucket_by: Option<&str>, prefix: &str) -> f64 {
    let id = match user.attribute(bucket_by.unwrap_or("key")).as_deref() {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) if n.is_i64() || n.is_u64() => n.to_string(),
        _ => return 0.0,
    };

    let digest = Sha1::digest(format!("{}.{}", prefix, id).as_bytes());
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    (u64::from_be_bytes(head) >> 4) as f64 / BUCKET_SCALE
}

fn user_clause_matches(clause: &Clause, user: &LdUser) -> bool {
    let Some(actual) = user.attribute(&clause.attribute) else {
        return false;
    };
    let matched = match &*actual {
        Value::Array(items) => items
            .iter()
            .any(|item| clause.values.iter().any(|expected| operator_matches(&clause.op, item, expected))),
        single => clause
            .values
            .iter()
            .any(|expected| operator_matches(&clause.op, single, expected)),
    };
    matched != clause.negate
}

fn operator_matches(op: &str, actual: &Value, expected: &Value) -> bool {
    match op {
        "in" => actual == expected,
        "startsWith" => strings(actual, expected).is_some_and(|(a, e)| a.starts_with(e)),
        "endsWith" => strings(actual, expected).is_some_and(|(a, e)| a.ends_with(e)),
        "contains" => strings(actual, expected).is_some_and(|(a, e)| a.contains(e)),
        "matches" => strings(actual, expected)
            .is_some_and(|(a, pattern)| Regex::new(pattern).is_ok_and(|re| re.is_match(a))),
        "lessThan" => numbers(actual, expected).is_some_and(|(a, e)| a < e),
        "lessThanOrEqual" => numbers(actual, expected).is_some_and(|(a, e)| a <= e),
        "greaterThan" => numbers(actual, expected).is_some_and(|(a, e)| a > e),
        "greaterThanOrEqual" => numbers(actual, expected).is_some_and(|(a, e)| a >= e),
        "before" => times(actual, expected).is_some_and(|(a, e)| a < e),
        "after" => times(actual, expected).is_some_and(|(a, e)| a > e),
        "semVerEqual" => versions(actual, expected).is_some_and(|(a, e)| a == e),
        "semVerLessThan" => versions(actual, expected).is_some_and(|(a, e)| a < e),
        "semVerGreaterThan" => versions(actual, expected).is_some_and(|(a, e)| a > e),
        _ => false,
    }
}

fn strings<'a>(actual: &'a Value, expected: &'a Value) -> Option<(&'a str, &'a str)> {
    Some((actual.as_str()?, expected.as_str()?))
}

fn numbers(actual: &Value, expected: &Value) -> Option<(f64, f64)> {
    Some((actual.as_f64()?, expected.as_f64()?))
}

/// Millisecond timestamps or RFC 3339 strings
fn times(actual: &Value, expected: &Value) -> Option<(f64, f64)> {
    fn millis(value: &Value) -> Option<f64> {
        match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|t| t.timestamp_millis() as f64),
            _ => None,
        }
    }
    Some((millis(actual)?, millis(expected)?))
}

fn versions(actual: &Value, expected: &Value) -> Option<(semver::Version, semver::Version)> {
    let (a, e) = strings(actual, expected)?;
    Some((parse_version(a)?, parse_version(e)?))
}

/// Accepts `1` and `1.2` as `1.0.0` and `1.2.0`
fn parse_version(raw: &str) -> Option<semver::Version> {
    if let Ok(version) = semver::Version::parse(raw) {
        return Some(version);
    }
    let split = raw.find(['-', '+']).unwrap_or(raw.len());
    let (core, rest) = raw.split_at(split);
    let padding = match core.matches('.').count() {
        0 => ".0.0",
        1 => ".0",
        _ => return None,
    };
    semver::Version::parse(&format!("{}{}{}", core, padding, rest)).ok()
}

fn malformed(key: &str, reason: &str) -> ProviderError {
    ProviderError::MalformedFlag {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}
