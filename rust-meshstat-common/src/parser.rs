//! The decode path: frame in, `(source, residual)` out, statistics on the side.
//!
//! [`TelemetryParser`] owns the statistics tracker and a handle to the
//! telemetry sink. Both are injected by the caller so that tests, or several
//! independent collectors in one process, each get their own state.

use bytes::Bytes;
use log::{debug, info, warn};

use crate::asn::{self, decode_probe_asn};
use crate::error::Error;
use crate::frame::{self, DecodedFrame, LatencyProbe};
use crate::settings::{DecoderSettings, PublishSettings};
use crate::sink::{ProbeReport, Publication, TelemetrySink};
use crate::stats::{ProbeSample, StatsTracker};
use crate::types::{Address, EventType};

/// What the decoder hands back for every frame.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedData {
    pub event_type: EventType,
    /// Previous mesh hop.
    pub source: Address,
    /// Payload after the fixed header fields, unmodified.
    pub residual: Bytes,
    /// Report built from a latency probe, when the frame carried one.
    pub report: Option<ProbeReport>,
}

/// Frame decoder with an attached statistics tracker and telemetry sink.
///
/// Not internally synchronized: `parse_input` takes `&mut self`.
#[derive(Debug)]
pub struct TelemetryParser<T, S> {
    decoder: DecoderSettings,
    publish: PublishSettings,
    tracker: T,
    sink: S,
}

impl<T: StatsTracker, S: TelemetrySink> TelemetryParser<T, S> {
    /// Create a parser, rejecting unusable decoder settings.
    pub fn new(decoder: DecoderSettings, publish: PublishSettings, tracker: T, sink: S) -> Result<Self, Error> {
        decoder.validate()?;
        Ok(Self {
            decoder,
            publish,
            tracker,
            sink,
        })
    }

    /// Decode one frame.
    ///
    /// When the residual ends in a latency probe the node's statistics and the
    /// network rollup are updated and a report is published. Publication
    /// errors are logged, not returned; the decoded data is returned either way.
    pub fn parse_input(&mut self, frame: impl Into<Bytes>) -> Result<ParsedData, Error> {
        let decoded = frame::decode_frame(frame.into(), &self.decoder)?;

        let report = match frame::extract_probe(&decoded.residual, &self.decoder)? {
            Some(probe) => Some(self.handle_probe(&decoded, probe)),
            None => None,
        };

        Ok(ParsedData {
            event_type: EventType::Data,
            source: decoded.source,
            residual: decoded.residual,
            report,
        })
    }

    fn handle_probe(&mut self, decoded: &DecodedFrame, probe: LatencyProbe) -> ProbeReport {
        // Both stamps are read in probe layout so the two words line up.
        let arrival = decode_probe_asn(&decoded.asn_bytes);
        let slots = asn::difference(probe.asn, arrival);
        if asn::is_rollover(slots) {
            debug!("ASN epoch changed between {:?} and {:?}", probe.asn, arrival);
        }
        let latency_ms = slots as f64 * self.decoder.slot_duration_ms;

        let sample = ProbeSample {
            node_id: probe.node_id.clone(),
            counter: probe.counter,
            num_cells_used: probe.num_cells_used,
            latency_ms,
        };
        self.tracker.record(sample);
        let rollup = self.tracker.rollup();

        let report = ProbeReport {
            token: self.publish.token,
            avg_cells_usage: rollup.avg_cells_usage,
            avg_latency: rollup.avg_latency,
            avg_pdr: rollup.avg_pdr,
            l3_source: probe.node_id,
        };
        info!("{:?}", report);

        let published = Publication::json(self.publish.topic.as_str(), self.publish.qos, &report)
            .and_then(|publication| self.sink.publish(publication));
        if let Err(e) = published {
            warn!("Failed to publish report for node {}: {}", report.l3_source, e);
        }

        report
    }

    pub fn tracker(&self) -> &T {
        &self.tracker
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn decoder_settings(&self) -> &DecoderSettings {
        &self.decoder
    }

    /// Give back the tracker and sink.
    pub fn into_parts(self) -> (T, S) {
        (self.tracker, self.sink)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::tests::{frame_with_residual, probe_residual, BASE_FRAME};
    use crate::sink::QoS;
    use crate::stats::NodeStatsTracker;
    use std::cell::RefCell;

    #[derive(Default)]
    struct RecordingSink {
        published: RefCell<Vec<Publication>>,
        fail: bool,
    }

    impl TelemetrySink for RecordingSink {
        fn publish(&self, publication: Publication) -> Result<(), Error> {
            if self.fail {
                return Err(Error::Sink("broker unreachable".into()));
            }
            self.published.borrow_mut().push(publication);
            Ok(())
        }
    }

    fn parser(sink: RecordingSink) -> TelemetryParser<NodeStatsTracker, RecordingSink> {
        TelemetryParser::new(
            DecoderSettings::default(),
            PublishSettings::default(),
            NodeStatsTracker::default(),
            sink,
        )
        .unwrap()
    }

    #[test]
    fn test_plain_frame_no_stats() {
        let mut parser = parser(RecordingSink::default());
        let frame = frame_with_residual(&[1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(frame.len(), 30);

        let parsed = parser.parse_input(frame.clone()).unwrap();
        assert_eq!(parsed.event_type, EventType::Data);
        assert_eq!(parsed.source.octets(), BASE_FRAME[15..23]);
        assert_eq!(parsed.residual.as_ref(), &frame[23..]);
        assert!(parsed.report.is_none());

        assert!(parser.tracker().is_empty());
        assert!(parser.sink().published.borrow().is_empty());
    }

    #[test]
    fn test_probe_frame_records_and_publishes_once() {
        let mut parser = parser(RecordingSink::default());
        // header ASN in probe layout: word_a = 0x0010; probe stamped at 0x0004
        let residual = probe_residual(0x0a, 0x1f, 12, [0x04, 0x00, 0x00, 0x00, 0x00], 7);
        let mut frame = frame_with_residual(&residual);
        frame[2..7].copy_from_slice(&[0x10, 0x00, 0x00, 0x00, 0x00]);
        assert!(frame.len() >= 61);

        let parsed = parser.parse_input(frame.clone()).unwrap();
        assert_eq!(parsed.residual.as_ref(), &frame[23..]);

        let report = parsed.report.expect("probe report");
        assert_eq!(report.token, 123);
        assert_eq!(report.l3_source, "a1f");
        assert_eq!(report.avg_latency, 12.0 * 20.0);
        assert_eq!(report.avg_cells_usage, 12.0 / 64.0);
        assert_eq!(report.avg_pdr, 1.0);

        let stats = parser.tracker().node("a1f").unwrap();
        assert_eq!(stats.samples(), 1);
        assert_eq!(stats.counters(), &[7]);

        let published = parser.sink().published.borrow();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].topic, "opentestbed/uinject/arrived");
        assert_eq!(published[0].qos, QoS::ExactlyOnce);
        let value = published[0].payload_json().unwrap();
        assert_eq!(value["l3_source"], "a1f");
        assert_eq!(value["avg_cellsUsage"], 12.0 / 64.0);
    }

    #[test]
    fn test_rollup_across_nodes() {
        let mut parser = parser(RecordingSink::default());

        // node "11": counters 1 and 4 -> pdr 0.5
        for counter in [1, 4] {
            let residual = probe_residual(0x1, 0x1, 0, [0; 5], counter);
            parser.parse_input(frame_with_residual(&residual)).unwrap();
        }
        // node "22": single counter -> pdr 1.0
        let residual = probe_residual(0x2, 0x2, 0, [0; 5], 9);
        let parsed = parser.parse_input(frame_with_residual(&residual)).unwrap();

        assert_eq!(parsed.report.unwrap().avg_pdr, 0.75);
        assert_eq!(parser.sink().published.borrow().len(), 3);
    }

    #[test]
    fn test_rollover_latency_is_sentinel() {
        let mut parser = parser(RecordingSink::default());
        let residual = probe_residual(0x1, 0x2, 0, [0, 0, 0, 0, 0x01], 1);
        let parsed = parser.parse_input(frame_with_residual(&residual)).unwrap();

        assert_eq!(parsed.report.unwrap().avg_latency, 0xFFFF_FFFFu32 as f64 * 20.0);
    }

    #[test]
    fn test_publish_failure_still_returns_data() {
        let mut parser = parser(RecordingSink {
            fail: true,
            ..Default::default()
        });
        let residual = probe_residual(0x1, 0x2, 3, [0; 5], 1);
        let parsed = parser.parse_input(frame_with_residual(&residual)).unwrap();

        assert!(parsed.report.is_some());
        assert_eq!(parser.tracker().len(), 1);
    }

    #[test]
    fn test_errors_propagate() {
        let mut parser = parser(RecordingSink::default());

        assert!(matches!(
            parser.parse_input(vec![0x01u8]),
            Err(Error::TooShort { len: 1, min: 2 })
        ));
        assert!(matches!(
            parser.parse_input(vec![0u8; 10]),
            Err(Error::FieldOutOfRange { .. })
        ));
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let decoder = DecoderSettings {
            slot_duration_ms: 0.0,
            ..Default::default()
        };
        let result = TelemetryParser::new(
            decoder,
            PublishSettings::default(),
            NodeStatsTracker::default(),
            RecordingSink::default(),
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_threshold_too_small_for_probe_fields_rejected() {
        let decoder = DecoderSettings {
            probe_min_residual: 8,
            ..Default::default()
        };
        let result = TelemetryParser::new(
            decoder,
            PublishSettings::default(),
            NodeStatsTracker::default(),
            RecordingSink::default(),
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
