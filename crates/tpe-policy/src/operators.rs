// operators.rs — Comparison operator semantics.
//
// `compare(actual, op, expected)` is the single place operator semantics live:
//
// - equals / not_equals: exact equality; numbers numerically, never across shapes
// - greater/less (+ or_equal): numeric for numbers, lexical for strings
// - contains / not_contains: substring for strings; membership when either
//   side is a list
// - starts_with / ends_with: strings only
// - matches_regex: `expected` is a regex source tested against `actual`
// - in_list / not_in_list: `expected` must be a list; membership test
//
// Shapes an operator cannot handle are errors, not `false`; the evaluator
// turns them into a deny.
//
// Compiled regexes are kept in a process-wide cache keyed by source, so a
// pattern is compiled once rather than on every request.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{LazyLock, PoisonError, RwLock};

use regex::{Regex, RegexBuilder};

use crate::condition::{ComparisonOperator, MatchValue};
use crate::error::EvaluationError;

/// Compiled-size cap for `matches_regex` patterns.
const REGEX_SIZE_LIMIT: usize = 1 << 20;

/// Distinct patterns held before the cache is flushed.
const REGEX_CACHE_CAPACITY: usize = 512;

static REGEX_CACHE: LazyLock<RwLock<HashMap<String, Regex>>> =
    LazyLock::new(|| RwLock::new(HashMap::new()));

pub fn compare(
    actual: &MatchValue,
    operator: ComparisonOperator,
    expected: &MatchValue,
) -> Result<bool, EvaluationError> {
    use crate::condition::ComparisonOperator::*;

    match operator {
        Equals => Ok(values_equal(actual, expected)),
        NotEquals => Ok(!values_equal(actual, expected)),
        GreaterThan => Ok(ordering(actual, operator, expected)? == Ordering::Greater),
        GreaterThanOrEqual => Ok(ordering(actual, operator, expected)? != Ordering::Less),
        LessThan => Ok(ordering(actual, operator, expected)? == Ordering::Less),
        LessThanOrEqual => Ok(ordering(actual, operator, expected)? != Ordering::Greater),
        Contains => contains(actual, operator, expected),
        NotContains => contains(actual, operator, expected).map(|found| !found),
        StartsWith => match (actual, expected) {
            (MatchValue::Text(a), MatchValue::Text(e)) => Ok(a.starts_with(e.as_str())),
            _ => Err(mismatch(operator, actual, expected)),
        },
        EndsWith => match (actual, expected) {
            (MatchValue::Text(a), MatchValue::Text(e)) => Ok(a.ends_with(e.as_str())),
            _ => Err(mismatch(operator, actual, expected)),
        },
        MatchesRegex => {
            let pattern = match expected {
                MatchValue::Text(p) => p,
                _ => return Err(mismatch(operator, actual, expected)),
            };
            let haystack = match actual {
                MatchValue::Text(s) => s.clone(),
                MatchValue::Number(n) => n.to_string(),
                _ => return Err(mismatch(operator, actual, expected)),
            };
            Ok(cached_regex(pattern)?.is_match(&haystack))
        }
        InList => membership(actual, operator, expected),
        NotInList => membership(actual, operator, expected).map(|found| !found),
    }
}

/// Compile a `matches_regex` pattern with the engine's size bound.
pub fn compile_regex(pattern: &str) -> Result<Regex, EvaluationError> {
    RegexBuilder::new(pattern)
        .size_limit(REGEX_SIZE_LIMIT)
        .build()
        .map_err(|e| EvaluationError::InvalidRegex {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })
}

/// `compile_regex` through the shared cache. Failed compilations are not cached.
fn cached_regex(pattern: &str) -> Result<Regex, EvaluationError> {
    if let Some(re) = REGEX_CACHE
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(pattern)
    {
        return Ok(re.clone());
    }
    let re = compile_regex(pattern)?;
    let mut cache = REGEX_CACHE.write().unwrap_or_else(PoisonError::into_inner);
    if cache.len() >= REGEX_CACHE_CAPACITY {
        cache.clear();
    }
    cache.insert(pattern.to_string(), re.clone());
    Ok(re)
}

fn values_equal(actual: &MatchValue, expected: &MatchValue) -> bool {
    match (actual, expected) {
        (MatchValue::Number(a), MatchValue::Number(e)) => a == e,
        (MatchValue::Text(a), MatchValue::Text(e)) => a == e,
        (MatchValue::Flag(a), MatchValue::Flag(e)) => a == e,
        (MatchValue::List(a), MatchValue::List(e)) => {
            a.len() == e.len() && a.iter().zip(e).all(|(x, y)| values_equal(x, y))
        }
        _ => false,
    }
}

fn ordering(
    actual: &MatchValue,
    operator: ComparisonOperator,
    expected: &MatchValue,
) -> Result<Ordering, EvaluationError> {
    match (actual, expected) {
        (MatchValue::Number(a), MatchValue::Number(e)) => a
            .partial_cmp(e)
            .ok_or_else(|| mismatch(operator, actual, expected)),
        (MatchValue::Text(a), MatchValue::Text(e)) => Ok(a.cmp(e)),
        _ => Err(mismatch(operator, actual, expected)),
    }
}

fn contains(
    actual: &MatchValue,
    operator: ComparisonOperator,
    expected: &MatchValue,
) -> Result<bool, EvaluationError> {
    match (actual, expected) {
        (_, MatchValue::List(items)) => Ok(items.iter().any(|item| values_equal(actual, item))),
        (MatchValue::List(items), _) => Ok(items.iter().any(|item| values_equal(item, expected))),
        (MatchValue::Text(a), MatchValue::Text(e)) => Ok(a.contains(e.as_str())),
        _ => Err(mismatch(operator, actual, expected)),
    }
}

fn membership(
    actual: &MatchValue,
    operator: ComparisonOperator,
    expected: &MatchValue,
) -> Result<bool, EvaluationError> {
    match expected {
        MatchValue::List(items) => Ok(items.iter().any(|item| values_equal(actual, item))),
        _ => Err(mismatch(operator, actual, expected)),
    }
}

fn mismatch(
    operator: ComparisonOperator,
    actual: &MatchValue,
    expected: &MatchValue,
) -> EvaluationError {
    EvaluationError::OperatorMismatch {
        operator,
        actual: actual.shape().to_string(),
        expected: expected.shape().to_string(),
    }
}
