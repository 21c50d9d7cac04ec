//! Property-based tests for gap detection and payload assembly.
//!
//! Properties:
//! - gaps are ordered, pairwise disjoint, and never overlap a tracked interval
//! - no gap is shorter than the minimum activity duration
//! - every uncovered stretch long enough to matter is reported exactly once
//! - AFK samples never reach an assembled request
//! - the token estimate never decreases as the context grows

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;
use serde_json::json;
use timegap_core::activity::CapturedEvent;
use timegap_core::tracking::TrackedEntry;
use timegap_core::window::TimeWindow;
use timegap_reconcile::{
    GapDetector, PayloadAssembler, PromptTemplate, TokenEstimate, normalize,
};

fn base() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 8, 8, 0, 0).unwrap()
}

/// A window laid out as alternating uncovered/tracked stretches.
#[derive(Debug, Clone)]
struct Layout {
    /// (uncovered seconds, tracked seconds) pairs from the window start.
    segments: Vec<(i64, i64)>,
    trailing: i64,
    reversed: bool,
}

impl Layout {
    fn window(&self) -> TimeWindow {
        let total: i64 = self.segments.iter().map(|(g, b)| g + b).sum::<i64>() + self.trailing;
        TimeWindow::new(base(), base() + Duration::seconds(total)).unwrap()
    }

    fn entries(&self) -> Vec<TrackedEntry> {
        let mut cursor = base();
        let mut entries = Vec::new();
        for (uncovered, tracked) in &self.segments {
            cursor += Duration::seconds(*uncovered);
            let end = cursor + Duration::seconds(*tracked);
            entries.push(TrackedEntry::new(cursor, end));
            cursor = end;
        }
        if self.reversed {
            entries.reverse();
        }
        entries
    }

    /// The exact uncovered stretches, before tolerance or minimum apply.
    fn uncovered(&self) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
        let mut cursor = base();
        let mut out = Vec::new();
        for (uncovered, tracked) in &self.segments {
            if *uncovered > 0 {
                out.push((cursor, cursor + Duration::seconds(*uncovered)));
            }
            cursor += Duration::seconds(uncovered + tracked);
        }
        if self.trailing > 0 {
            out.push((cursor, cursor + Duration::seconds(self.trailing)));
        }
        out
    }
}

fn arb_layout() -> impl Strategy<Value = Layout> {
    (
        prop::collection::vec((0i64..3600, 1i64..3600), 0..8),
        1i64..3600,
        any::<bool>(),
    )
        .prop_map(|(segments, trailing, reversed)| Layout {
            segments,
            trailing,
            reversed,
        })
}

fn arb_detector() -> impl Strategy<Value = GapDetector> {
    (
        prop_oneof![Just(60i64), Just(300), Just(600)],
        prop_oneof![Just(0i64), Just(30), Just(60), Just(120)],
    )
        .prop_map(|(min, tol)| GapDetector::new(Duration::seconds(min), Duration::seconds(tol)))
}

proptest! {
    #[test]
    fn gaps_are_ordered_and_disjoint_from_tracked_time(
        layout in arb_layout(),
        detector in arb_detector(),
    ) {
        let entries = layout.entries();
        let gaps = detector.uncovered(&layout.window(), &entries).unwrap();

        for pair in gaps.windows(2) {
            prop_assert!(pair[0].end() <= pair[1].start());
        }
        for gap in &gaps {
            prop_assert!(gap.duration() >= detector.min_duration());
            for entry in &entries {
                prop_assert!(!gap.overlaps(entry.start, entry.end));
            }
        }
    }

    #[test]
    fn significant_uncovered_time_is_reported_exactly(
        layout in arb_layout(),
        detector in arb_detector(),
        tol in prop_oneof![Just(0i64), Just(30), Just(60), Just(120)],
    ) {
        let tolerance = Duration::seconds(tol);
        let detector = GapDetector::new(detector.min_duration(), tolerance);
        let gaps: Vec<_> = detector
            .uncovered(&layout.window(), &layout.entries())
            .unwrap()
            .into_iter()
            .map(|g| (g.start(), g.end()))
            .collect();

        let expected: Vec<_> = layout
            .uncovered()
            .into_iter()
            .filter(|(s, e)| *e - *s >= tolerance && *e - *s >= detector.min_duration())
            .collect();

        prop_assert_eq!(gaps, expected);
    }

    #[test]
    fn afk_samples_never_reach_a_request(
        layout in arb_layout(),
        kinds in prop::collection::vec((0usize..3, 0i64..7200, 0u32..900), 0..40),
    ) {
        let events: Vec<CapturedEvent> = kinds
            .iter()
            .map(|(kind, offset, secs)| {
                let (bucket, bucket_type, data) = match kind {
                    0 => ("aw-watcher-window_host", "currentwindow", json!({"app": "code", "title": "lib.rs"})),
                    1 => ("aw-watcher-window_host", "currentwindow", json!({"app": "loginwindow", "title": ""})),
                    _ => ("aw-watcher-afk_host", "afkstatus", json!({"status": "afk"})),
                };
                CapturedEvent {
                    bucket_id: bucket.into(),
                    bucket_type: bucket_type.into(),
                    id: None,
                    timestamp: (base() + Duration::seconds(*offset)).to_rfc3339(),
                    duration: f64::from(*secs),
                    data: data.as_object().cloned().unwrap_or_default(),
                }
            })
            .collect();

        let samples = normalize(&events);
        let detector = GapDetector::new(Duration::seconds(60), Duration::seconds(60));
        let gaps = detector.detect(&layout.window(), &layout.entries(), &samples).unwrap();
        let assembler = PayloadAssembler::new(Duration::seconds(60));

        for gap in &gaps {
            let request = assembler.assemble(gap, "");
            for sample in &request.samples {
                prop_assert!(!sample.is_afk);
                prop_assert_eq!(sample.app.as_str(), "code");
                prop_assert!(sample.timestamp >= gap.start());
                prop_assert!(sample.end() <= gap.end());
            }
        }
    }

    #[test]
    fn token_estimate_is_monotonic_in_context(
        context in "[a-zA-Z0-9 ,.]{0,300}",
        extra in "[a-zA-Z0-9,.]{1,50}",
    ) {
        let gap = timegap_core::window::Gap {
            span: TimeWindow::new(base(), base() + Duration::hours(1)).unwrap(),
            samples: Vec::new(),
        };
        let assembler = PayloadAssembler::new(Duration::minutes(5));
        let template = PromptTemplate::builtin();

        let shorter = TokenEstimate::for_request(&template, &assembler.assemble(&gap, &context));
        let longer = TokenEstimate::for_request(
            &template,
            &assembler.assemble(&gap, &format!("{context}{extra}")),
        );
        prop_assert!(longer.tokens() >= shorter.tokens());

        let mut incremental = shorter;
        incremental.push_str(&extra);
        prop_assert!(incremental.tokens() >= shorter.tokens());
    }
}
