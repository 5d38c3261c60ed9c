//! Serializes each cycle's detections and fans them out to subscribers.
//!
//! Payload shape:
//! `{"boxes":[{"label":"person","value":0.87000,"x":10,"y":20,"width":30,"height":40}]}`

use std::io::{self, Write};
use std::sync::Arc;

use tracing::{trace, warn};

use crate::inference::DetectionRegion;

/// Fan-out channel to all live subscribers. Delivery is best effort.
pub trait Broadcaster: Send + Sync {
    fn subscriber_count(&self) -> usize;

    fn broadcast(&self, payload: String);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Nobody was connected; no payload was built.
    Skipped,
    /// One payload carrying `boxes` entries was handed to the broadcaster.
    Sent { boxes: usize },
}

/// Write the payload for `regions` into `out`, dropping zero-confidence
/// placeholders and non-finite scores. Returns the number of boxes written.
pub fn write_payload<W: Write>(out: &mut W, regions: &[DetectionRegion]) -> io::Result<usize> {
    out.write_all(br#"{"boxes":["#)?;
    let mut written = 0;
    let shown = regions
        .iter()
        .filter(|r| r.value != 0.0 && r.value.is_finite());
    for region in shown {
        if written > 0 {
            out.write_all(b",")?;
        }
        out.write_all(br#"{"label":"#)?;
        serde_json::to_writer(&mut *out, &*region.label)?;
        write!(
            out,
            r#","value":{:.5},"x":{},"y":{},"width":{},"height":{}}}"#,
            region.value, region.x, region.y, region.width, region.height
        )?;
        written += 1;
    }
    out.write_all(b"]}")?;
    Ok(written)
}

/// Result Publisher. Each payload is handed off by value, so every
/// published cycle allocates one buffer, sized from the previous payload so
/// it never regrows while being written.
pub struct ResultPublisher {
    hub: Arc<dyn Broadcaster>,
    capacity_hint: usize,
}

impl ResultPublisher {
    pub fn new(hub: Arc<dyn Broadcaster>) -> Self {
        Self {
            hub,
            capacity_hint: 256,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.hub.subscriber_count()
    }

    pub fn publish(&mut self, regions: &[DetectionRegion]) -> PublishOutcome {
        if self.hub.subscriber_count() == 0 {
            return PublishOutcome::Skipped;
        }

        let mut buf = Vec::with_capacity(self.capacity_hint);
        let boxes = match write_payload(&mut buf, regions) {
            Ok(boxes) => boxes,
            Err(err) => {
                warn!(error = %err, "failed to serialize detections");
                return PublishOutcome::Skipped;
            }
        };
        self.capacity_hint = self.capacity_hint.max(buf.len());
        match String::from_utf8(buf) {
            Ok(payload) => {
                trace!(boxes, bytes = payload.len(), "broadcasting detections");
                self.hub.broadcast(payload);
                PublishOutcome::Sent { boxes }
            }
            Err(err) => {
                warn!(error = %err, "detection payload is not UTF-8");
                PublishOutcome::Skipped
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::borrow::Cow;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn region(label: &'static str, value: f32, x: u32, y: u32, w: u32, h: u32) -> DetectionRegion {
        DetectionRegion {
            label: Cow::Borrowed(label),
            value,
            x,
            y,
            width: w,
            height: h,
        }
    }

    fn payload(regions: &[DetectionRegion]) -> String {
        let mut out = Vec::new();
        write_payload(&mut out, regions).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[derive(Default)]
    struct Recorder {
        subscribers: AtomicUsize,
        sent: Mutex<Vec<String>>,
    }

    impl Broadcaster for Recorder {
        fn subscriber_count(&self) -> usize {
            self.subscribers.load(Ordering::SeqCst)
        }

        fn broadcast(&self, payload: String) {
            self.sent.lock().unwrap().push(payload);
        }
    }

    #[test]
    fn placeholder_regions_are_dropped() {
        let regions = [
            region("person", 0.87, 10, 20, 30, 40),
            region("bg", 0.0, 0, 0, 0, 0),
        ];
        assert_eq!(
            payload(&regions),
            r#"{"boxes":[{"label":"person","value":0.87000,"x":10,"y":20,"width":30,"height":40}]}"#
        );
    }

    #[test]
    fn all_zero_results_give_empty_list() {
        let regions = [region("a", 0.0, 1, 1, 1, 1), region("b", 0.0, 2, 2, 2, 2)];
        assert_eq!(payload(&regions), r#"{"boxes":[]}"#);
        assert_eq!(payload(&[]), r#"{"boxes":[]}"#);
    }

    #[test]
    fn keeps_engine_order_and_escapes_labels() {
        let regions = [
            region("cup", 0.5, 1, 2, 3, 4),
            region(r#"say "hi""#, 0.123456, 5, 6, 7, 8),
        ];
        let text = payload(&regions);
        assert_eq!(
            text,
            r#"{"boxes":[{"label":"cup","value":0.50000,"x":1,"y":2,"width":3,"height":4},{"label":"say \"hi\"","value":0.12346,"x":5,"y":6,"width":7,"height":8}]}"#
        );
        let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed["boxes"][1]["label"], r#"say "hi""#);
    }

    #[test]
    fn no_subscribers_means_no_payload() {
        let hub = Arc::new(Recorder::default());
        let mut publisher = ResultPublisher::new(hub.clone());

        let outcome = publisher.publish(&[region("person", 0.9, 0, 0, 1, 1)]);

        assert_eq!(outcome, PublishOutcome::Skipped);
        assert!(hub.sent.lock().unwrap().is_empty());
    }

    #[test]
    fn one_payload_per_cycle_with_subscribers() {
        let hub = Arc::new(Recorder::default());
        hub.subscribers.store(3, Ordering::SeqCst);
        let mut publisher = ResultPublisher::new(hub.clone());

        let first = publisher.publish(&[region("person", 0.25, 1, 2, 3, 4)]);
        let second = publisher.publish(&[]);

        assert_eq!(first, PublishOutcome::Sent { boxes: 1 });
        assert_eq!(second, PublishOutcome::Sent { boxes: 0 });
        let sent = hub.sent.lock().unwrap();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1], r#"{"boxes":[]}"#);
    }

    #[test]
    fn non_finite_scores_are_dropped() {
        let regions = [
            region("nan", f32::NAN, 1, 1, 1, 1),
            region("inf", f32::INFINITY, 2, 2, 2, 2),
            region("neg", f32::NEG_INFINITY, 3, 3, 3, 3),
            region("cat", 0.75, 4, 4, 4, 4),
        ];
        let text = payload(&regions);
        assert_eq!(
            text,
            r#"{"boxes":[{"label":"cat","value":0.75000,"x":4,"y":4,"width":4,"height":4}]}"#
        );
        assert!(serde_json::from_str::<serde_json::Value>(&text).is_ok());
    }

    #[test]
    fn payload_buffer_is_sized_from_the_largest_so_far() {
        let hub = Arc::new(Recorder::default());
        hub.subscribers.store(1, Ordering::SeqCst);
        let mut publisher = ResultPublisher::new(hub.clone());
        let many: Vec<_> = (0..20).map(|i| region("person", 0.5, i, i, 10, 10)).collect();

        publisher.publish(&many);
        let long = hub.sent.lock().unwrap()[0].len();
        assert!(long > 256);
        assert_eq!(publisher.capacity_hint, long);

        publisher.publish(&[]);
        assert_eq!(publisher.capacity_hint, long);
        assert_eq!(hub.sent.lock().unwrap()[1], r#"{"boxes":[]}"#);
    }
}
