//! Validation and normalization of judge responses.
//!
//! `order` is always the submitting players in join order; it defines both the
//! expected key set and every tie-break.

use super::{JudgeError, JudgeResult};
use crate::types::ConnectionId;
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Total every successful judgment is scaled to
pub const SCORE_TOTAL: u64 = 100;

pub const PLACEHOLDER_COMMENT: &str = "The judge had no comment.";

/// Scores and comments pulled out of a well-formed judge response
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedVerdict {
    pub scores: HashMap<ConnectionId, u32>,
    pub comments: HashMap<ConnectionId, String>,
}

/// Parse a raw judge reply. Invalid scores reject the whole reply; invalid
/// comments only fall back to placeholders.
pub fn parse_verdict(text: &str, order: &[ConnectionId]) -> JudgeResult<ParsedVerdict> {
    let value: Value = serde_json::from_str(strip_code_fence(text))
        .map_err(|e| JudgeError::ParseError(e.to_string()))?;
    let object = value
        .as_object()
        .ok_or_else(|| JudgeError::ParseError("response is not a JSON object".to_string()))?;

    let scores = validate_scores(object.get("scores"), order)?;
    let comments = match validate_comments(object.get("comments"), order) {
        Ok(comments) => comments,
        Err(e) => {
            tracing::warn!("Judge comments rejected ({}), using placeholders", e);
            placeholder_comments(order)
        }
    };

    Ok(ParsedVerdict { scores, comments })
}

/// Models like to wrap JSON in Markdown fences even when told not to
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

fn expect_player_map<'a>(
    value: Option<&'a Value>,
    field: &str,
    order: &[ConnectionId],
) -> JudgeResult<&'a Map<String, Value>> {
    let map = value
        .and_then(Value::as_object)
        .ok_or_else(|| JudgeError::InvalidResponse(format!("`{}` is missing or not an object", field)))?;

    if map.len() != order.len() {
        return Err(JudgeError::InvalidResponse(format!(
            "`{}` has {} entries, expected {}",
            field,
            map.len(),
            order.len()
        )));
    }
    if let Some(missing) = order.iter().find(|id| !map.contains_key(id.as_str())) {
        return Err(JudgeError::InvalidResponse(format!(
            "`{}` has no entry for player {}",
            field, missing
        )));
    }

    Ok(map)
}

/// Exactly one non-negative integer per submitting player
pub fn validate_scores(
    value: Option<&Value>,
    order: &[ConnectionId],
) -> JudgeResult<HashMap<ConnectionId, u32>> {
    let map = expect_player_map(value, "scores", order)?;

    order
        .iter()
        .map(|id| {
            let score = map[id.as_str()]
                .as_u64()
                .and_then(|n| u32::try_from(n).ok())
                .ok_or_else(|| {
                    JudgeError::InvalidResponse(format!(
                        "score for {} is not a non-negative integer: {}",
                        id, map[id.as_str()]
                    ))
                })?;
            Ok((id.clone(), score))
        })
        .collect()
}

/// Exactly one non-empty string per submitting player
pub fn validate_comments(
    value: Option<&Value>,
    order: &[ConnectionId],
) -> JudgeResult<HashMap<ConnectionId, String>> {
    let map = expect_player_map(value, "comments", order)?;

    order
        .iter()
        .map(|id| match map[id.as_str()].as_str().map(str::trim) {
            Some(comment) if !comment.is_empty() => Ok((id.clone(), comment.to_string())),
            _ => Err(JudgeError::InvalidResponse(format!(
                "comment for {} is not a non-empty string",
                id
            ))),
        })
        .collect()
}

pub fn placeholder_comments(order: &[ConnectionId]) -> HashMap<ConnectionId, String> {
    order
        .iter()
        .map(|id| (id.clone(), PLACEHOLDER_COMMENT.to_string()))
        .collect()
}

/// First player in `order` holding the highest score
fn top_scorer<'a>(scores: &HashMap<ConnectionId, u32>, order: &'a [ConnectionId]) -> Option<&'a ConnectionId> {
    let mut best: Option<(&ConnectionId, u32)> = None;
    for id in order {
        let score = scores.get(id).copied().unwrap_or(0);
        match best {
            Some((_, top)) if score <= top => {}
            _ => best = Some((id, score)),
        }
    }
    best.map(|(id, _)| id)
}

/// Rescale scores so they sum to exactly 100.
///
/// Each score becomes `round(score * 100 / total)`. Rounding drift is then
/// settled one point at a time, highest normalized score first (join order
/// on ties), never taking a score below zero. Scores that already sum to 100
/// are left alone, and an all-zero set stays all zero.
pub fn normalize_scores(scores: &mut HashMap<ConnectionId, u32>, order: &[ConnectionId]) {
    let total: u64 = order
        .iter()
        .map(|id| u64::from(scores.get(id).copied().unwrap_or(0)))
        .sum();
    if total == 0 || total == SCORE_TOTAL {
        return;
    }

    for id in order {
        let raw = u64::from(scores.get(id).copied().unwrap_or(0));
        // Integer round-half-up of raw * 100 / total
        let scaled = (raw * SCORE_TOTAL * 2 + total) / (total * 2);
        scores.insert(id.clone(), scaled as u32);
    }

    let sum: i64 = order
        .iter()
        .map(|id| i64::from(scores.get(id).copied().unwrap_or(0)))
        .sum();
    settle_drift(scores, order, SCORE_TOTAL as i64 - sum);
}

fn settle_drift(scores: &mut HashMap<ConnectionId, u32>, order: &[ConnectionId], mut drift: i64) {
    // Stable sort keeps join order among equal scores
    let mut ranked: Vec<&ConnectionId> = order.iter().collect();
    ranked.sort_by_key(|id| std::cmp::Reverse(scores.get(*id).copied().unwrap_or(0)));

    while drift != 0 {
        let mut moved = false;
        for id in &ranked {
            if drift == 0 {
                break;
            }
            let score = scores.entry((*id).clone()).or_insert(0);
            if drift > 0 {
                *score += 1;
                drift -= 1;
                moved = true;
            } else if *score > 0 {
                *score -= 1;
                drift += 1;
                moved = true;
            }
        }
        if !moved {
            break;
        }
    }
}

/// Player with the strictly highest score, ties going to the earlier player
/// in `order`. No winner when every score is zero.
pub fn select_winner(scores: &HashMap<ConnectionId, u32>, order: &[ConnectionId]) -> Option<ConnectionId> {
    top_scorer(scores, order)
        .filter(|id| scores.get(*id).copied().unwrap_or(0) > 0)
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(names: &[&str]) -> Vec<ConnectionId> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn score_map(pairs: &[(&str, u32)]) -> HashMap<ConnectionId, u32> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_normalize_scales_short_total() {
        let order = ids(&["a", "b", "c"]);
        let mut scores = score_map(&[("a", 50), ("b", 30), ("c", 10)]);
        normalize_scores(&mut scores, &order);

        assert_eq!(scores, score_map(&[("a", 56), ("b", 33), ("c", 11)]));
        assert_eq!(scores.values().sum::<u32>(), 100);
    }

    #[test]
    fn test_normalize_leaves_exact_total_untouched() {
        let order = ids(&["a", "b", "c"]);
        let original = score_map(&[("a", 70), ("b", 20), ("c", 10)]);
        let mut scores = original.clone();
        normalize_scores(&mut scores, &order);
        assert_eq!(scores, original);
    }

    #[test]
    fn test_normalize_all_zero_stays_zero() {
        let order = ids(&["a", "b"]);
        let mut scores = score_map(&[("a", 0), ("b", 0)]);
        normalize_scores(&mut scores, &order);
        assert_eq!(scores, score_map(&[("a", 0), ("b", 0)]));
    }

    #[test]
    fn test_normalize_drift_goes_to_first_top_scorer() {
        // 33 + 33 + 33 = 99, so the first of the tied leaders absorbs +1
        let order = ids(&["a", "b", "c"]);
        let mut scores = score_map(&[("a", 1), ("b", 1), ("c", 1)]);
        normalize_scores(&mut scores, &order);
        assert_eq!(scores, score_map(&[("a", 34), ("b", 33), ("c", 33)]));

        // Order decides, not key names
        let order = ids(&["c", "b", "a"]);
        let mut scores = score_map(&[("a", 1), ("b", 1), ("c", 1)]);
        normalize_scores(&mut scores, &order);
        assert_eq!(scores["c"], 34);
    }

    #[test]
    fn test_normalize_negative_drift() {
        // 200 total: 16.5 -> 17, 16.5 -> 17, 67; sum 101 so the leader gives one back
        let order = ids(&["a", "b", "c"]);
        let mut scores = score_map(&[("a", 33), ("b", 33), ("c", 134)]);
        normalize_scores(&mut scores, &order);
        assert_eq!(scores.values().sum::<u32>(), 100);
        assert_eq!(scores["c"], 66);
    }

    #[test]
    fn test_normalize_large_totals() {
        let order = ids(&["a", "b", "c", "d"]);
        let mut scores = score_map(&[("a", 999), ("b", 1), ("c", 0), ("d", 500)]);
        normalize_scores(&mut scores, &order);
        assert_eq!(scores.values().sum::<u32>(), 100);
        assert_eq!(scores["c"], 0);
    }

    #[test]
    fn test_normalize_large_equal_room() {
        // 40 x 2.5 rounds up to 40 x 3 = 120; the first 20 players give one back each
        let order: Vec<ConnectionId> = (0..40).map(|i| format!("p{:02}", i)).collect();
        let mut scores: HashMap<ConnectionId, u32> = order.iter().map(|id| (id.clone(), 1)).collect();
        normalize_scores(&mut scores, &order);

        assert_eq!(scores.values().sum::<u32>(), 100);
        assert!(order[..20].iter().all(|id| scores[id] == 2));
        assert!(order[20..].iter().all(|id| scores[id] == 3));
    }

    #[test]
    fn test_normalize_many_small_scores_never_negative() {
        // One leader and 60 players at 1: most round up, the leader cannot absorb it alone
        let mut order = ids(&["lead"]);
        order.extend((0..60).map(|i| format!("p{}", i)));
        let mut scores: HashMap<ConnectionId, u32> = order.iter().map(|id| (id.clone(), 1)).collect();
        scores.insert("lead".to_string(), 2);
        normalize_scores(&mut scores, &order);

        assert_eq!(scores.values().sum::<u32>(), 100);
        assert_eq!(scores.len(), order.len());
    }

    #[test]
    fn test_select_winner() {
        let order = ids(&["a", "b", "c"]);
        assert_eq!(
            select_winner(&score_map(&[("a", 20), ("b", 50), ("c", 30)]), &order),
            Some("b".to_string())
        );
        // Tie: earlier in join order wins
        assert_eq!(
            select_winner(&score_map(&[("a", 10), ("b", 45), ("c", 45)]), &order),
            Some("b".to_string())
        );
        assert_eq!(select_winner(&score_map(&[("a", 0), ("b", 0), ("c", 0)]), &order), None);
        assert_eq!(select_winner(&HashMap::new(), &[]), None);
    }

    #[test]
    fn test_parse_valid_verdict() {
        let order = ids(&["a", "b"]);
        let verdict = parse_verdict(
            r#"{"scores": {"a": 60, "b": 40}, "comments": {"a": "Great cat", "b": " Wobbly "}}"#,
            &order,
        )
        .unwrap();
        assert_eq!(verdict.scores, score_map(&[("a", 60), ("b", 40)]));
        assert_eq!(verdict.comments["b"], "Wobbly");
    }

    #[test]
    fn test_parse_strips_code_fence() {
        let order = ids(&["a"]);
        let text = "```json\n{\"scores\": {\"a\": 100}, \"comments\": {\"a\": \"ok\"}}\n```";
        let verdict = parse_verdict(text, &order).unwrap();
        assert_eq!(verdict.scores["a"], 100);
    }

    #[test]
    fn test_parse_rejects_bad_scores() {
        let order = ids(&["a", "b"]);
        let cases = [
            "not json",
            "[1, 2]",
            r#"{"comments": {"a": "x", "b": "y"}}"#,
            r#"{"scores": {"a": 50}}"#,
            r#"{"scores": {"a": 50, "b": 50, "c": 0}}"#,
            r#"{"scores": {"a": 50, "z": 50}}"#,
            r#"{"scores": {"a": -5, "b": 50}}"#,
            r#"{"scores": {"a": 50.5, "b": 49.5}}"#,
            r#"{"scores": {"a": "50", "b": 50}}"#,
        ];
        for case in cases {
            assert!(parse_verdict(case, &order).is_err(), "should reject: {}", case);
        }
    }

    #[test]
    fn test_bad_comments_do_not_invalidate_scores() {
        let order = ids(&["a", "b"]);
        let verdict = parse_verdict(
            r#"{"scores": {"a": 70, "b": 30}, "comments": {"a": "Nice", "b": ""}}"#,
            &order,
        )
        .unwrap();
        assert_eq!(verdict.scores, score_map(&[("a", 70), ("b", 30)]));
        assert_eq!(verdict.comments, placeholder_comments(&order));

        let verdict = parse_verdict(r#"{"scores": {"a": 70, "b": 30}}"#, &order).unwrap();
        assert_eq!(verdict.comments["a"], PLACEHOLDER_COMMENT);
    }
}
