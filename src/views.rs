use std::collections::HashSet;

use serde::Serialize;

use crate::configuration::RequestParams;

/// A recorded instant at which an offer was confirmed visible on screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackedView {
    /// Offer identifier.
    pub uuid: String,
    /// Seconds since epoch.
    pub view_time: i64,
    /// `true` until the view has been picked up by a flush.
    #[serde(skip)]
    pub is_new: bool,
}

/// Pending views of the current session.
///
/// Offer identifiers are unique within the buffer. Flushed views stay in the buffer (no longer
/// new) until the next [`ViewBuffer::reset`], so an offer is reported at most once per session.
#[derive(Debug, Default)]
pub(crate) struct ViewBuffer {
    views: Vec<TrackedView>,
    seen: HashSet<String>,
}

impl ViewBuffer {
    pub fn new() -> ViewBuffer {
        ViewBuffer::default()
    }

    /// Record a view of `uuid`. Returns `false` if the offer was already tracked in this session.
    pub fn track(&mut self, uuid: &str, view_time: i64) -> bool {
        if !self.seen.insert(uuid.to_owned()) {
            return false;
        }

        self.views.push(TrackedView {
            uuid: uuid.to_owned(),
            view_time,
            is_new: true,
        });
        true
    }

    /// Collect all new views and clear their marker.
    pub fn take_new(&mut self) -> Vec<TrackedView> {
        self.views
            .iter_mut()
            .filter(|view| view.is_new)
            .map(|view| {
                view.is_new = false;
                view.clone()
            })
            .collect()
    }

    /// Forget all views, starting a new session.
    pub fn reset(&mut self) {
        self.views.clear();
        self.seen.clear();
    }

    pub fn views(&self) -> &[TrackedView] {
        &self.views
    }
}

/// Body of `POST /views`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct ViewBatch {
    pub offers: Vec<TrackedView>,
    pub params: RequestParams,
    pub request_id: String,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{ViewBatch, ViewBuffer};
    use crate::configuration::RequestParams;

    #[test]
    fn tracking_twice_buffers_once() {
        let mut buffer = ViewBuffer::new();

        assert!(buffer.track("A", 100));
        assert!(!buffer.track("A", 101));

        assert_eq!(buffer.views().len(), 1);
        assert_eq!(buffer.views()[0].view_time, 100);
    }

    #[test]
    fn take_new_clears_marker() {
        let mut buffer = ViewBuffer::new();
        buffer.track("A", 100);
        buffer.track("B", 100);

        let taken = buffer.take_new();

        assert_eq!(taken.len(), 2);
        assert!(buffer.views().iter().all(|view| !view.is_new));
        assert!(buffer.take_new().is_empty());
    }

    #[test]
    fn flushed_views_are_not_tracked_again() {
        let mut buffer = ViewBuffer::new();
        buffer.track("A", 100);
        buffer.take_new();

        assert!(!buffer.track("A", 200));
        assert!(buffer.take_new().is_empty());
    }

    #[test]
    fn views_added_after_take_are_picked_up_next_time() {
        let mut buffer = ViewBuffer::new();
        buffer.track("A", 100);
        let first = buffer.take_new();
        buffer.track("B", 101);
        let second = buffer.take_new();

        assert_eq!(first.iter().map(|v| v.uuid.as_str()).collect::<Vec<_>>(), ["A"]);
        assert_eq!(second.iter().map(|v| v.uuid.as_str()).collect::<Vec<_>>(), ["B"]);
    }

    #[test]
    fn reset_starts_new_session() {
        let mut buffer = ViewBuffer::new();
        buffer.track("A", 100);
        buffer.take_new();

        buffer.reset();

        assert!(buffer.views().is_empty());
        assert!(buffer.track("A", 200));
    }

    #[test]
    fn batch_serializes_to_wire_shape() {
        let mut buffer = ViewBuffer::new();
        buffer.track("A", 1_500_000_000);
        let batch = ViewBatch {
            offers: buffer.take_new(),
            params: RequestParams::new(None, "ios"),
            request_id: "R1".to_owned(),
        };

        assert_eq!(
            serde_json::to_value(&batch).unwrap(),
            json!({
                "offers": [{"uuid": "A", "view_time": 1_500_000_000}],
                "params": {
                    "advertiser_id": "",
                    "country": "",
                    "locale": "",
                    "platform": "ios",
                    "user_id": "",
                },
                "request_id": "R1",
            })
        );
    }
}
