//! Selection state machine.
//!
//! A selection moves `Empty -> Resolving -> Shown`. Resolving waits until
//! the referenced layer's source has loaded; an id that is still missing
//! after that is stale and clears the selection. Every new selection bumps a
//! generation counter so a resolution started for an older selection can
//! never apply its result.

use super::object_id::{ObjectIdCodec, ObjectReference};
use crate::geo::{MapFeature, MapSurface};
use futures_channel::mpsc::{self, UnboundedReceiver, UnboundedSender};
use futures_util::future::LocalBoxFuture;
use futures_util::task::noop_waker_ref;
use futures_util::{FutureExt, Stream, StreamExt};
use std::cell::RefCell;
use std::rc::Rc;
use std::task::{Context, Poll};

/// Monotonic selection counter.
pub type Generation = u64;

#[derive(Debug, Clone, PartialEq)]
pub enum SelectionState {
    Empty,
    Resolving {
        token: String,
        reference: ObjectReference,
    },
    Shown {
        token: String,
        feature: MapFeature,
    },
}

/// Result of looking a reference up on the rendered map.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    /// The style or the layer's source has not finished loading.
    Pending,
    Found(MapFeature),
    /// Everything is loaded and the feature is not there.
    Missing,
}

/// Looks `reference` up on `surface`.
pub fn lookup<S: MapSurface + ?Sized>(
    codec: &ObjectIdCodec,
    reference: &ObjectReference,
    surface: &S,
) -> Lookup {
    let Some(layer) = codec.layer_name(reference) else {
        return Lookup::Missing;
    };
    if !surface.is_style_loaded() {
        return Lookup::Pending;
    }
    if !surface.has_layer(layer) {
        return Lookup::Missing;
    }
    if !surface.is_source_loaded(layer) {
        return Lookup::Pending;
    }
    match surface.query_feature(layer, reference.feature_id) {
        Some(feature) => Lookup::Found(feature),
        None => Lookup::Missing,
    }
}

/// What a single resolution attempt did.
#[derive(Debug, Clone, PartialEq)]
pub enum Progress {
    /// Nothing to resolve.
    Idle,
    Waiting,
    Shown(MapFeature),
    Cleared,
}

pub struct SelectionTracker {
    codec: ObjectIdCodec,
    state: SelectionState,
    generation: Generation,
}

impl SelectionTracker {
    pub fn new(codec: ObjectIdCodec) -> Self {
        Self {
            codec,
            state: SelectionState::Empty,
            generation: 0,
        }
    }

    pub fn state(&self) -> &SelectionState {
        &self.state
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn codec(&self) -> &ObjectIdCodec {
        &self.codec
    }

    /// Token of the current selection, resolved or not.
    pub fn selected_token(&self) -> Option<&str> {
        match &self.state {
            SelectionState::Empty => None,
            SelectionState::Resolving { token, .. } | SelectionState::Shown { token, .. } => {
                Some(token)
            }
        }
    }

    pub fn shown_feature(&self) -> Option<&MapFeature> {
        match &self.state {
            SelectionState::Shown { feature, .. } => Some(feature),
            _ => None,
        }
    }

    /// Starts selecting `token` (from a click or the URL).
    ///
    /// Re-selecting the current token is a no-op. An undecodable token
    /// behaves like `None`.
    pub fn select(&mut self, token: Option<&str>) -> Generation {
        if token.is_some() && token == self.selected_token() {
            return self.generation;
        }

        self.generation += 1;
        self.state = match token {
            None => SelectionState::Empty,
            Some(token) => match self.codec.decode(token) {
                Some(reference) => {
                    log::debug!("Resolving selection {} (generation {})", token, self.generation);
                    SelectionState::Resolving {
                        token: token.to_string(),
                        reference,
                    }
                }
                None => {
                    log::warn!("Dropping undecodable object id {:?}", token);
                    SelectionState::Empty
                }
            },
        };
        self.generation
    }

    /// Clears the selection from any state.
    pub fn deselect(&mut self) -> Generation {
        self.generation += 1;
        if let Some(token) = self.selected_token() {
            log::info!("Deselected {}", token);
        }
        self.state = SelectionState::Empty;
        self.generation
    }

    /// Tries to resolve the pending selection against `surface`.
    ///
    /// Safe to call any number of times; outside `Resolving` it does nothing.
    pub fn attempt<S: MapSurface + ?Sized>(&mut self, surface: &S) -> Progress {
        let SelectionState::Resolving { reference, .. } = &self.state else {
            return Progress::Idle;
        };
        let result = lookup(&self.codec, reference, surface);
        self.apply(result)
    }

    /// Applies a lookup made for `generation`. Stale results are discarded
    /// and reported as `Idle`.
    pub fn complete(&mut self, generation: Generation, result: Lookup) -> Progress {
        if generation != self.generation || !matches!(self.state, SelectionState::Resolving { .. })
        {
            log::debug!(
                "Discarding resolution for generation {} (current {})",
                generation,
                self.generation
            );
            return Progress::Idle;
        }
        self.apply(result)
    }

    fn apply(&mut self, result: Lookup) -> Progress {
        let token = match &self.state {
            SelectionState::Resolving { token, .. } => token.clone(),
            _ => return Progress::Idle,
        };
        match result {
            Lookup::Pending => Progress::Waiting,
            Lookup::Found(feature) => {
                log::info!("Selection {} resolved", token);
                self.state = SelectionState::Shown {
                    token,
                    feature: feature.clone(),
                };
                Progress::Shown(feature)
            }
            Lookup::Missing => {
                log::info!("Selection {} not found after load, clearing", token);
                self.state = SelectionState::Empty;
                Progress::Cleared
            }
        }
    }
}

/// Fan-out of "style/source finished loading" notifications.
///
/// Receivers that were dropped are pruned on the next notify.
#[derive(Default)]
pub struct LoadSignals {
    subscribers: Vec<UnboundedSender<()>>,
}

impl LoadSignals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self) -> UnboundedReceiver<()> {
        let (tx, rx) = mpsc::unbounded();
        self.subscribers.push(tx);
        rx
    }

    pub fn notify(&mut self) {
        self.subscribers.retain(|tx| tx.unbounded_send(()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

/// Outcome of an async resolution.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Shown(MapFeature),
    Cleared,
    /// A newer selection (or a deselect) superseded this one.
    Abandoned,
    /// The load signal source went away before the feature could be found.
    SignalsClosed,
}

/// Resolves the selection made at `generation`, re-attempting after every
/// load signal until it is shown, cleared, or superseded.
pub async fn resolve_when_loaded<S, L>(
    tracker: Rc<RefCell<SelectionTracker>>,
    generation: Generation,
    mut signals: L,
    surface: Rc<RefCell<S>>,
) -> Resolution
where
    S: MapSurface + ?Sized,
    L: Stream<Item = ()> + Unpin,
{
    loop {
        {
            let mut tracker = tracker.borrow_mut();
            if tracker.generation() != generation {
                return Resolution::Abandoned;
            }
            match tracker.attempt(&*surface.borrow()) {
                Progress::Shown(feature) => return Resolution::Shown(feature),
                Progress::Cleared => return Resolution::Cleared,
                Progress::Idle => return Resolution::Abandoned,
                Progress::Waiting => {}
            }
        }

        if signals.next().await.is_none() {
            return Resolution::SignalsClosed;
        }
    }
}

/// A resolution future driven from the UI loop, one poll per frame.
pub struct PendingResolution {
    generation: Generation,
    future: LocalBoxFuture<'static, Resolution>,
}

impl PendingResolution {
    /// Starts resolving the tracker's current selection.
    pub fn start<S>(
        tracker: Rc<RefCell<SelectionTracker>>,
        signals: &mut LoadSignals,
        surface: Rc<RefCell<S>>,
    ) -> Self
    where
        S: MapSurface + 'static,
    {
        let generation = tracker.borrow().generation();
        let receiver = signals.subscribe();
        Self {
            generation,
            future: resolve_when_loaded(tracker, generation, receiver, surface).boxed_local(),
        }
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Polls without blocking; `Some` once the resolution has finished.
    pub fn poll_once(&mut self) -> Option<Resolution> {
        let mut cx = Context::from_waker(noop_waker_ref());
        match self.future.poll_unpin(&mut cx) {
            Poll::Ready(resolution) => Some(resolution),
            Poll::Pending => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::RenderedMap;
    use crate::state::Camera;
    use geo_types::Coord;

    const AMENITY: &str = "label-amenity";

    fn camera() -> Camera {
        Camera {
            latitude: 54.6872,
            longitude: 25.2797,
            zoom: 12.5,
            bearing: 10.0,
            pitch: 0.0,
        }
    }

    fn feature(id: u64) -> MapFeature {
        MapFeature {
            id,
            layer: AMENITY.to_string(),
            position: Coord {
                x: 25.2797,
                y: 54.6872,
            },
            properties: Default::default(),
        }
    }

    fn styled_map() -> RenderedMap {
        let mut map = RenderedMap::new(camera());
        map.load_style(&[AMENITY.to_string(), "label-address".to_string()]);
        map
    }

    fn loaded_map(ids: &[u64]) -> RenderedMap {
        let mut map = styled_map();
        map.set_source_data(AMENITY, Ok(ids.iter().copied().map(feature).collect()));
        map
    }

    fn tracker() -> SelectionTracker {
        SelectionTracker::new(ObjectIdCodec::default())
    }

    #[test]
    fn test_select_enters_resolving() {
        let mut t = tracker();
        assert_eq!(t.state(), &SelectionState::Empty);

        let generation = t.select(Some("p42"));
        assert_eq!(generation, 1);
        assert_eq!(t.selected_token(), Some("p42"));
        assert!(matches!(
            t.state(),
            SelectionState::Resolving { reference, .. } if *reference == ObjectReference::new('p', 42)
        ));
    }

    #[test]
    fn test_select_undecodable_is_empty() {
        let mut t = tracker();
        t.select(Some("zz12"));
        assert_eq!(t.state(), &SelectionState::Empty);
        assert_eq!(t.generation(), 1);
    }

    #[test]
    fn test_reselect_same_token_keeps_generation() {
        let mut t = tracker();
        let first = t.select(Some("p42"));
        assert_eq!(t.select(Some("p42")), first);
        assert!(t.select(Some("p43")) > first);
    }

    #[test]
    fn test_attempt_waits_for_source() {
        let mut t = tracker();
        t.select(Some("p42"));

        let unstyled = RenderedMap::new(camera());
        assert_eq!(t.attempt(&unstyled), Progress::Waiting);

        let styled = styled_map();
        assert_eq!(t.attempt(&styled), Progress::Waiting);
        assert_eq!(t.attempt(&styled), Progress::Waiting);
        assert!(matches!(t.state(), SelectionState::Resolving { .. }));

        let loaded = loaded_map(&[41, 42]);
        assert_eq!(t.attempt(&loaded), Progress::Shown(feature(42)));
        assert_eq!(t.shown_feature(), Some(&feature(42)));

        // Further attempts are no-ops.
        assert_eq!(t.attempt(&loaded), Progress::Idle);
    }

    #[test]
    fn test_stale_reference_clears_after_load() {
        let mut t = tracker();
        t.select(Some("p99"));
        assert_eq!(t.attempt(&loaded_map(&[42])), Progress::Cleared);
        assert_eq!(t.state(), &SelectionState::Empty);
    }

    #[test]
    fn test_layer_missing_from_loaded_style_clears() {
        let mut t = tracker();
        t.select(Some("p42"));
        let mut map = RenderedMap::new(camera());
        map.load_style(&["label-address".to_string()]);
        assert_eq!(t.attempt(&map), Progress::Cleared);
    }

    #[test]
    fn test_deselect_from_shown() {
        let mut t = tracker();
        t.select(Some("p42"));
        t.attempt(&loaded_map(&[42]));
        let before = t.generation();
        assert!(t.deselect() > before);
        assert_eq!(t.state(), &SelectionState::Empty);
        assert_eq!(t.selected_token(), None);
    }

    #[test]
    fn test_complete_discards_stale_generation() {
        let mut t = tracker();
        let old = t.select(Some("p42"));
        t.select(Some("p43"));
        assert_eq!(t.complete(old, Lookup::Found(feature(42))), Progress::Idle);
        assert_eq!(t.selected_token(), Some("p43"));

        let current = t.generation();
        assert_eq!(
            t.complete(current, Lookup::Found(feature(43))),
            Progress::Shown(feature(43))
        );
    }

    #[test]
    fn test_load_signals_prune_dropped_receivers() {
        let mut signals = LoadSignals::new();
        let rx = signals.subscribe();
        let _kept = signals.subscribe();
        assert_eq!(signals.subscriber_count(), 2);
        drop(rx);
        signals.notify();
        assert_eq!(signals.subscriber_count(), 1);
    }

    #[test]
    fn test_resolve_immediately_when_loaded() {
        let tracker = Rc::new(RefCell::new(tracker()));
        let surface = Rc::new(RefCell::new(loaded_map(&[42])));
        let generation = tracker.borrow_mut().select(Some("p42"));
        let (_tx, rx) = mpsc::unbounded::<()>();

        let result = resolve_when_loaded(tracker.clone(), generation, rx, surface)
            .now_or_never()
            .unwrap();
        assert_eq!(result, Resolution::Shown(feature(42)));
    }

    #[test]
    fn test_resolve_after_load_signal() {
        let tracker = Rc::new(RefCell::new(tracker()));
        let surface = Rc::new(RefCell::new(styled_map()));
        let mut signals = LoadSignals::new();
        tracker.borrow_mut().select(Some("p42"));

        let mut pending = PendingResolution::start(tracker.clone(), &mut signals, surface.clone());
        assert_eq!(pending.poll_once(), None);

        // Signals that arrive before the data are harmless.
        signals.notify();
        signals.notify();
        assert_eq!(pending.poll_once(), None);

        surface
            .borrow_mut()
            .set_source_data(AMENITY, Ok(vec![feature(42)]));
        signals.notify();
        assert_eq!(pending.poll_once(), Some(Resolution::Shown(feature(42))));
        assert_eq!(tracker.borrow().shown_feature(), Some(&feature(42)));
    }

    #[test]
    fn test_superseded_resolution_is_abandoned() {
        let tracker = Rc::new(RefCell::new(tracker()));
        let surface = Rc::new(RefCell::new(styled_map()));
        let mut signals = LoadSignals::new();

        tracker.borrow_mut().select(Some("p42"));
        let mut first = PendingResolution::start(tracker.clone(), &mut signals, surface.clone());
        assert_eq!(first.poll_once(), None);

        tracker.borrow_mut().select(Some("p43"));
        let mut second = PendingResolution::start(tracker.clone(), &mut signals, surface.clone());
        assert!(second.generation() > first.generation());
        assert_eq!(second.poll_once(), None);

        surface
            .borrow_mut()
            .set_source_data(AMENITY, Ok(vec![feature(42), feature(43)]));
        signals.notify();

        assert_eq!(first.poll_once(), Some(Resolution::Abandoned));
        assert_eq!(second.poll_once(), Some(Resolution::Shown(feature(43))));
        assert_eq!(tracker.borrow().selected_token(), Some("p43"));
    }

    #[test]
    fn test_resolution_cleared_for_missing_feature() {
        let tracker = Rc::new(RefCell::new(tracker()));
        let surface = Rc::new(RefCell::new(styled_map()));
        let mut signals = LoadSignals::new();
        tracker.borrow_mut().select(Some("p7"));

        let mut pending = PendingResolution::start(tracker.clone(), &mut signals, surface.clone());
        surface
            .borrow_mut()
            .set_source_data(AMENITY, Ok(vec![feature(42)]));
        signals.notify();
        assert_eq!(pending.poll_once(), Some(Resolution::Cleared));
        assert_eq!(tracker.borrow().state(), &SelectionState::Empty);
    }

    #[test]
    fn test_resolution_ends_when_signals_close() {
        let tracker = Rc::new(RefCell::new(tracker()));
        let surface = Rc::new(RefCell::new(styled_map()));
        let mut signals = LoadSignals::new();
        tracker.borrow_mut().select(Some("p42"));

        let mut pending = PendingResolution::start(tracker.clone(), &mut signals, surface);
        assert_eq!(pending.poll_once(), None);
        drop(signals);
        assert_eq!(pending.poll_once(), Some(Resolution::SignalsClosed));
    }
}
