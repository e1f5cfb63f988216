//! Canonicalization of forced-alignment fragment trees.

use super::WordTiming;
use crate::engine::aeneas::SyncMap;
use serde_json::Value;
use tracing::debug;

/// Flatten a sync map into the canonical word sequence, in fragment order.
///
/// Skip rules, applied per fragment:
/// - HEAD/TAIL sentinels mark non-speech regions, not words;
/// - a fragment with no lines has nothing to say;
/// - a fragment whose begin or end does not parse as a number is dropped
///   on its own — malformed timing data never aborts the run.
///
/// Lines are joined with a single space and trimmed. The upstream
/// convention is one word per line, so the join is usually a no-op; a
/// multi-line fragment degrades to a multi-word text instead of erroring.
pub fn flatten_fragments(map: &SyncMap) -> Vec<WordTiming> {
    let mut timings = Vec::new();

    for fragment in &map.fragments {
        if fragment.is_sentinel() {
            continue;
        }
        if fragment.lines.is_empty() {
            continue;
        }

        let text = fragment.lines.join(" ").trim().to_string();

        let (Some(start), Some(end)) = (
            seconds(fragment.begin.as_ref()),
            seconds(fragment.end.as_ref()),
        ) else {
            debug!(
                "Dropping fragment {:?}: begin/end did not parse as seconds",
                fragment.id
            );
            continue;
        };

        timings.push(WordTiming { text, start, end });
    }

    timings
}

/// Interpret a sync-map time value as seconds.
///
/// aeneas emits decimal strings; numbers are accepted too so that other
/// sync-map producers work unchanged. Anything else is a per-unit drop.
fn seconds(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::aeneas::parse_sync_map;

    fn sync_map(raw: &str) -> SyncMap {
        parse_sync_map(raw).unwrap()
    }

    #[test]
    fn test_sentinels_are_skipped() {
        let map = sync_map(
            r#"{"fragments": [
                {"id": "HEAD", "lines": [], "begin": "0.000", "end": "0.120"},
                {"id": "f1", "lines": ["Once"], "begin": "0.0", "end": "0.32"},
                {"id": "f2", "lines": ["upon"], "begin": "0.32", "end": "0.58"},
                {"id": "TAIL", "lines": [], "begin": "0.580", "end": "1.000"}
            ]}"#,
        );

        let timings = flatten_fragments(&map);
        assert_eq!(
            timings,
            vec![
                WordTiming {
                    text: "Once".to_string(),
                    start: 0.0,
                    end: 0.32
                },
                WordTiming {
                    text: "upon".to_string(),
                    start: 0.32,
                    end: 0.58
                },
            ]
        );
    }

    #[test]
    fn test_empty_lines_are_skipped() {
        let map = sync_map(
            r#"{"fragments": [
                {"id": "f1", "lines": [], "begin": "0.0", "end": "0.5"},
                {"id": "f2", "lines": ["word"], "begin": "0.5", "end": "1.0"}
            ]}"#,
        );

        let timings = flatten_fragments(&map);
        assert_eq!(timings.len(), 1);
        assert_eq!(timings[0].text, "word");
    }

    #[test]
    fn test_unparsable_times_drop_only_that_fragment() {
        let map = sync_map(
            r#"{"fragments": [
                {"id": "f1", "lines": ["good"], "begin": "0.0", "end": "0.3"},
                {"id": "f2", "lines": ["bad"], "begin": "not-a-number", "end": "0.6"},
                {"id": "f3", "lines": ["missing"], "end": "0.9"},
                {"id": "f4", "lines": ["also good"], "begin": "0.6", "end": "0.9"}
            ]}"#,
        );

        let timings = flatten_fragments(&map);
        assert_eq!(timings.len(), 2);
        assert_eq!(timings[0].text, "good");
        assert_eq!(timings[1].text, "also good");
    }

    #[test]
    fn test_multi_line_fragment_joins_and_trims() {
        let map = sync_map(
            r#"{"fragments": [
                {"id": "f1", "lines": [" Once ", "upon"], "begin": "0", "end": "1"}
            ]}"#,
        );

        let timings = flatten_fragments(&map);
        assert_eq!(timings[0].text, "Once  upon");
    }

    #[test]
    fn test_numeric_times_are_accepted() {
        let map = sync_map(
            r#"{"fragments": [
                {"id": "f1", "lines": ["word"], "begin": 1.25, "end": 2.5}
            ]}"#,
        );

        let timings = flatten_fragments(&map);
        assert_eq!(timings[0].start, 1.25);
        assert_eq!(timings[0].end, 2.5);
    }

    #[test]
    fn test_empty_tree_yields_empty_sequence() {
        assert!(flatten_fragments(&SyncMap::default()).is_empty());
    }

    #[test]
    fn test_output_length_property() {
        // length = fragments - sentinels - empty-lines - unparsable
        let map = sync_map(
            r#"{"fragments": [
                {"id": "HEAD", "lines": []},
                {"id": "f1", "lines": ["a"], "begin": "0.0", "end": "0.1"},
                {"id": "f2", "lines": []},
                {"id": "f3", "lines": ["b"], "begin": "x", "end": "0.3"},
                {"id": "f4", "lines": ["c"], "begin": "0.3", "end": "0.4"},
                {"id": "TAIL", "lines": []}
            ]}"#,
        );

        assert_eq!(flatten_fragments(&map).len(), 6 - 2 - 1 - 1);
    }

    #[test]
    fn test_idempotent_over_same_tree() {
        let map = sync_map(
            r#"{"fragments": [
                {"id": "f1", "lines": ["word"], "begin": "0.1", "end": "0.2"}
            ]}"#,
        );

        assert_eq!(flatten_fragments(&map), flatten_fragments(&map));
    }
}
