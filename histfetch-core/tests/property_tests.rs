//! Property tests for range chunking, chunk merging and series keys.
//!
//! Uses proptest to verify:
//! 1. Chunk coverage: chunks tile the range with no gaps or overlaps
//! 2. Chunk bounds: no chunk is longer than the configured span
//! 3. Merge ordering: merged rows have strictly increasing dates
//! 4. Key format: `identifier_field` splits back into its parts

use chrono::{NaiveDate, TimeDelta};
use histfetch_core::data::chunker::merge_chunks;
use histfetch_core::data::{plan_chunks, DateRange, HistoryRow, SeriesKey};
use proptest::prelude::*;

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_date() -> impl Strategy<Value = NaiveDate> {
    // 1990-01-01 plus up to ~35 years.
    (0i64..12_800).prop_map(|offset| {
        NaiveDate::from_ymd_opt(1990, 1, 1).unwrap() + TimeDelta::days(offset)
    })
}

fn arb_range() -> impl Strategy<Value = DateRange> {
    (arb_date(), 0i64..5_000)
        .prop_map(|(start, len)| DateRange::new(start, start + TimeDelta::days(len)))
}

fn arb_chunks() -> impl Strategy<Value = Vec<Vec<HistoryRow>>> {
    prop::collection::vec(
        prop::collection::vec(
            (arb_date(), -1000.0..1000.0_f64)
                .prop_map(|(date, close)| HistoryRow::new(date).with("close", close)),
            0..30,
        ),
        0..6,
    )
}

// ── 1. Chunk Coverage ────────────────────────────────────────────────

proptest! {
    /// First chunk starts at the range start, last ends at the range end,
    /// and each chunk starts the day after the previous one ends.
    #[test]
    fn chunks_tile_the_range(range in arb_range(), span in 1i64..1_000) {
        let chunks = plan_chunks(range, span);
        prop_assert!(!chunks.is_empty());
        prop_assert_eq!(chunks[0].start, range.start);
        prop_assert_eq!(chunks[chunks.len() - 1].end, range.end);

        for pair in chunks.windows(2) {
            prop_assert_eq!(pair[1].start, pair[0].end + TimeDelta::days(1));
        }
    }

    /// An inverted range produces nothing to fetch.
    #[test]
    fn inverted_range_has_no_chunks(start in arb_date(), back in 1i64..1_000, span in 1i64..1_000) {
        let range = DateRange::new(start, start - TimeDelta::days(back));
        prop_assert!(plan_chunks(range, span).is_empty());
    }
}

// ── 2. Chunk Bounds ──────────────────────────────────────────────────

proptest! {
    #[test]
    fn chunks_respect_span(range in arb_range(), span in 1i64..1_000) {
        for chunk in plan_chunks(range, span) {
            prop_assert!(chunk.start <= chunk.end);
            prop_assert!(chunk.days() <= span);
        }
    }
}

// ── 3. Merge Ordering ────────────────────────────────────────────────

proptest! {
    /// Every input date survives exactly once, in ascending order.
    #[test]
    fn merge_is_sorted_and_deduplicated(chunks in arb_chunks()) {
        let mut expected: Vec<NaiveDate> =
            chunks.iter().flatten().map(|row| row.date).collect();
        expected.sort();
        expected.dedup();

        let merged = merge_chunks(chunks);
        let dates: Vec<NaiveDate> = merged.iter().map(|row| row.date).collect();
        prop_assert_eq!(dates, expected);
    }

    /// On duplicate dates the row from the earliest chunk wins.
    #[test]
    fn merge_keeps_first_occurrence(chunks in arb_chunks()) {
        let merged = merge_chunks(chunks.clone());
        for row in &merged {
            let first = chunks
                .iter()
                .flatten()
                .find(|r| r.date == row.date)
                .unwrap();
            prop_assert_eq!(row.get("close"), first.get("close"));
        }
    }
}

// ── 4. Key Format ────────────────────────────────────────────────────

proptest! {
    #[test]
    fn key_splits_back_when_identifier_has_no_underscore(
        identifier in "[A-Z][A-Z0-9.^-]{0,8}",
        field in "[a-z][a-z_]{0,10}",
    ) {
        let key = SeriesKey::new(identifier.as_str(), field.as_str());
        let text = key.to_string();
        prop_assert_eq!(&text, &format!("{identifier}_{field}"));

        let parsed = SeriesKey::parse(&text).unwrap();
        prop_assert_eq!(parsed.identifier(), identifier.as_str());
        prop_assert_eq!(parsed.field(), field.as_str());
    }
}
