//! Bounds-change subscription for one map view.

use issue_portal_sdk::BoundingBox;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};

type BoundsHandler = Arc<dyn Fn(BoundingBox) + Send + Sync>;

#[derive(Default)]
struct ViewportState {
    bounds: Option<BoundingBox>,
    handler: Option<(u64, BoundsHandler)>,
    next_id: u64,
}

/// Visible area of one map, with at most one bounds-change handler.
///
/// Registering a handler returns a [`ViewportSubscription`]; dropping it
/// unregisters the handler. Registering again replaces the previous handler,
/// and the replaced subscription's drop becomes a no-op.
///
/// ```ignore
/// let viewport = MapViewport::new();
/// let _sub = viewport.on_bounds_change(move |bbox| refresh_issues(bbox));
/// viewport.move_to(BoundingBox::new(46.0, 7.0, 47.0, 8.0));
/// ```
#[derive(Clone, Default)]
pub struct MapViewport {
    state: Arc<Mutex<ViewportState>>,
}

impl MapViewport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler`, replacing any previous one.
    ///
    /// If the bounds are already known the handler is called with them
    /// straight away, like the first `moveend` of a freshly mounted map.
    #[must_use = "dropping the subscription unregisters the handler"]
    pub fn on_bounds_change<F>(&self, handler: F) -> ViewportSubscription
    where
        F: Fn(BoundingBox) + Send + Sync + 'static,
    {
        let handler: BoundsHandler = Arc::new(handler);
        let (id, current) = {
            let mut state = self.state.lock();
            state.next_id += 1;
            let id = state.next_id;
            if state.handler.is_some() {
                tracing::debug!("replacing map bounds handler");
            }
            state.handler = Some((id, Arc::clone(&handler)));
            (id, state.bounds)
        };

        if let Some(bounds) = current {
            handler(bounds);
        }

        ViewportSubscription {
            state: Arc::downgrade(&self.state),
            id,
        }
    }

    /// Record new visible bounds and notify the active handler.
    pub fn move_to(&self, bounds: BoundingBox) {
        let handler = {
            let mut state = self.state.lock();
            state.bounds = Some(bounds);
            state.handler.as_ref().map(|(_, h)| Arc::clone(h))
        };
        if let Some(handler) = handler {
            handler(bounds);
        }
    }

    #[must_use]
    pub fn bounds(&self) -> Option<BoundingBox> {
        self.state.lock().bounds
    }

    #[must_use]
    pub fn has_handler(&self) -> bool {
        self.state.lock().handler.is_some()
    }
}

/// Keeps a bounds handler registered; dropping it unregisters the handler.
pub struct ViewportSubscription {
    state: Weak<Mutex<ViewportState>>,
    id: u64,
}

impl Drop for ViewportSubscription {
    fn drop(&mut self) {
        let Some(state) = self.state.upgrade() else {
            return;
        };
        let mut state = state.lock();
        if state.handler.as_ref().is_some_and(|(id, _)| *id == self.id) {
            state.handler = None;
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn recorder() -> (Arc<Mutex<Vec<BoundingBox>>>, impl Fn(BoundingBox) + Send + Sync + 'static) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, move |bbox| sink.lock().push(bbox))
    }

    fn bbox(n: f64) -> BoundingBox {
        BoundingBox::new(n, n, n + 1.0, n + 1.0)
    }

    #[test]
    fn test_handler_receives_moves() {
        let viewport = MapViewport::new();
        let (seen, handler) = recorder();
        let _sub = viewport.on_bounds_change(handler);

        viewport.move_to(bbox(1.0));
        viewport.move_to(bbox(2.0));

        assert_eq!(*seen.lock(), vec![bbox(1.0), bbox(2.0)]);
    }

    #[test]
    fn test_known_bounds_are_delivered_on_register() {
        let viewport = MapViewport::new();
        viewport.move_to(bbox(5.0));

        let (seen, handler) = recorder();
        let _sub = viewport.on_bounds_change(handler);
        assert_eq!(*seen.lock(), vec![bbox(5.0)]);
    }

    #[test]
    fn test_drop_unregisters() {
        let viewport = MapViewport::new();
        let (seen, handler) = recorder();
        let sub = viewport.on_bounds_change(handler);
        drop(sub);

        assert!(!viewport.has_handler());
        viewport.move_to(bbox(1.0));
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn test_register_replaces_previous_handler() {
        let viewport = MapViewport::new();
        let (first_seen, first) = recorder();
        let (second_seen, second) = recorder();

        let first_sub = viewport.on_bounds_change(first);
        let _second_sub = viewport.on_bounds_change(second);
        viewport.move_to(bbox(1.0));

        assert!(first_seen.lock().is_empty());
        assert_eq!(*second_seen.lock(), vec![bbox(1.0)]);

        drop(first_sub);
        assert!(viewport.has_handler());
        viewport.move_to(bbox(2.0));
        assert_eq!(second_seen.lock().len(), 2);
    }

    #[test]
    fn test_subscription_outliving_viewport() {
        let viewport = MapViewport::new();
        let (_, handler) = recorder();
        let sub = viewport.on_bounds_change(handler);
        drop(viewport);
        drop(sub);
    }
}
