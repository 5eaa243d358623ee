//! Detector facade: owns one recognizer context per gesture type, routes
//! touch events and timer expiries into them, and dispatches gesture events
//! to listeners.

use log::debug;

use crate::config::GestureConfig;
use crate::events::{GestureEvent, GesturePayload, GestureState, GestureType, StateMask, TouchEvent};
use crate::recognizers::Recognizer;
use crate::timer::{TimerHandle, TimerQueue};

pub type GestureCallback = Box<dyn FnMut(&GestureEvent)>;

/// A subscription to one gesture type. The callback runs synchronously during
/// [`Detector::feed_touch`] / [`Detector::run_timers`] for every emission
/// whose state is in `mask`. It receives a borrow of the event and may clone
/// it; it cannot reach back into the detector, so the listener list is never
/// mutated mid-dispatch.
pub struct GestureListener {
    pub gesture: GestureType,
    pub mask: StateMask,
    callback: GestureCallback,
}

impl GestureListener {
    pub fn new(
        gesture: GestureType,
        mask: StateMask,
        callback: impl FnMut(&GestureEvent) + 'static,
    ) -> Self {
        Self {
            gesture,
            mask,
            callback: Box::new(callback),
        }
    }
}

impl std::fmt::Debug for GestureListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GestureListener")
            .field("gesture", &self.gesture)
            .field("mask", &self.mask)
            .finish_non_exhaustive()
    }
}

/// Identity of a registered listener, for later removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerToken(u32);

struct ListenerEntry {
    token: ListenerToken,
    listener: GestureListener,
}

/// Per-gesture-type state block. Active (listeners present) implies the
/// recognizer state is allocated, except for the reserved `LongpressHold`
/// slot which never gets one.
struct GestureContext {
    gesture: GestureType,
    state: Option<GestureState>,
    listeners: Vec<ListenerEntry>,
    recognizer: Option<Recognizer>,
}

impl GestureContext {
    fn new(gesture: GestureType) -> Self {
        Self {
            gesture,
            state: None,
            listeners: Vec::new(),
            recognizer: None,
        }
    }
}

/// Dispatch and timer access handed to a recognizer for the duration of one
/// step. `set_state` delivers to listeners in registration order, then records
/// the new state; a transition to idle (`None`) is recorded without dispatch.
pub(crate) struct Sink<'a> {
    gesture: GestureType,
    state: &'a mut Option<GestureState>,
    listeners: &'a mut Vec<ListenerEntry>,
    timers: &'a mut TimerQueue,
    /// Timestamp carried by emissions from this step.
    pub(crate) timestamp: u32,
}

impl Sink<'_> {
    pub(crate) fn state(&self) -> Option<GestureState> {
        *self.state
    }

    pub(crate) fn set_state(&mut self, state: Option<GestureState>, payload: GesturePayload) {
        if let Some(st) = state {
            let event = GestureEvent {
                gesture: self.gesture,
                state: st,
                timestamp: self.timestamp,
                payload,
            };
            for entry in self.listeners.iter_mut() {
                if entry.listener.mask.matches(st) {
                    (entry.listener.callback)(&event);
                }
            }
        }
        *self.state = state;
    }

    pub(crate) fn schedule_after(&mut self, delay_ms: u32) -> TimerHandle {
        self.timers.schedule_after(self.timestamp, delay_ms, self.gesture)
    }

    pub(crate) fn cancel_timer(&mut self, handle: TimerHandle) {
        self.timers.cancel(handle);
    }
}

/// The recognizer engine. Single-threaded: feed events and run timers from
/// one thread of control; listener callbacks run inline.
pub struct Detector {
    contexts: [GestureContext; GestureType::ALL.len()],
    timers: TimerQueue,
    config: GestureConfig,
    next_token: u32,
}

impl Detector {
    /// All contexts start inactive; nothing is recognized until a listener is
    /// added.
    pub fn new(config: GestureConfig) -> Self {
        Self {
            contexts: GestureType::ALL.map(GestureContext::new),
            timers: TimerQueue::new(),
            config,
            next_token: 0,
        }
    }

    /// Register a listener. The first listener for a gesture type activates
    /// its recognizer: state is zeroed and the recognizer data is allocated.
    pub fn add_listener(&mut self, listener: GestureListener) -> ListenerToken {
        let gesture = listener.gesture;
        let ctx = &mut self.contexts[gesture.index()];
        if ctx.listeners.is_empty() {
            ctx.state = None;
            ctx.recognizer = Recognizer::new(gesture, &self.config);
            debug!("activated {gesture:?} recognizer");
        }
        let token = ListenerToken(self.next_token);
        self.next_token += 1;
        ctx.listeners.push(ListenerEntry { token, listener });
        token
    }

    /// Remove a listener by token. Removing the last listener of a gesture
    /// type shuts its recognizer down: state data is dropped and pending
    /// timers are cancelled. Returns false if the token is unknown.
    pub fn remove_listener(&mut self, token: ListenerToken) -> bool {
        for ctx in &mut self.contexts {
            let before = ctx.listeners.len();
            ctx.listeners.retain(|e| e.token != token);
            if ctx.listeners.len() != before {
                if ctx.listeners.is_empty() {
                    ctx.recognizer = None;
                    self.timers.cancel_gesture(ctx.gesture);
                    debug!("shut down {:?} recognizer", ctx.gesture);
                }
                return true;
            }
        }
        false
    }

    /// Route one touch event to every active recognizer. Recognizers do not
    /// observe each other; ordering across them is unspecified.
    pub fn feed_touch(&mut self, event: &TouchEvent) {
        for i in 0..self.contexts.len() {
            let ctx = &mut self.contexts[i];
            if let Some(mut rec) = ctx.recognizer.take() {
                let mut sink = Sink {
                    gesture: ctx.gesture,
                    state: &mut ctx.state,
                    listeners: &mut ctx.listeners,
                    timers: &mut self.timers,
                    timestamp: event.timestamp,
                };
                rec.feed(&mut sink, event);
                self.contexts[i].recognizer = Some(rec);
            }
        }
    }

    /// Fire every timer due at `now`, in deadline order. Emissions carry the
    /// scheduled deadline as their timestamp, so replays are deterministic.
    pub fn run_timers(&mut self, now: u32) {
        for (handle, gesture, deadline) in self.timers.take_due(now) {
            let ctx = &mut self.contexts[gesture.index()];
            if let Some(mut rec) = ctx.recognizer.take() {
                let mut sink = Sink {
                    gesture: ctx.gesture,
                    state: &mut ctx.state,
                    listeners: &mut ctx.listeners,
                    timers: &mut self.timers,
                    timestamp: deadline,
                };
                rec.on_timer(&mut sink, handle);
                ctx.recognizer = Some(rec);
            }
        }
    }

    /// Drop all in-flight gesture tracking without touching subscriptions.
    /// For hosts whose touch stream was interrupted.
    pub fn reset(&mut self) {
        for ctx in &mut self.contexts {
            if let Some(rec) = ctx.recognizer.as_mut() {
                rec.reset();
                self.timers.cancel_gesture(ctx.gesture);
                ctx.state = None;
            }
        }
    }

    /// Whether a gesture type has any listeners.
    pub fn is_active(&self, gesture: GestureType) -> bool {
        !self.contexts[gesture.index()].listeners.is_empty()
    }

    pub fn listener_count(&self, gesture: GestureType) -> usize {
        self.contexts[gesture.index()].listeners.len()
    }

    /// Current phase of a recognizer; `None` means idle.
    pub fn state(&self, gesture: GestureType) -> Option<GestureState> {
        self.contexts[gesture.index()].state
    }

    /// Earliest pending timer deadline, if any. Hosts sleep until this.
    pub fn next_deadline(&self) -> Option<u32> {
        self.timers.next_deadline()
    }

    pub fn config(&self) -> &GestureConfig {
        &self.config
    }
}

impl Default for Detector {
    fn default() -> Self {
        Self::new(GestureConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn recorder(
        detector: &mut Detector,
        gesture: GestureType,
        mask: StateMask,
    ) -> (ListenerToken, Rc<RefCell<Vec<GestureEvent>>>) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = log.clone();
        let token = detector.add_listener(GestureListener::new(gesture, mask, move |ev| {
            sink.borrow_mut().push(ev.clone());
        }));
        (token, log)
    }

    #[test]
    fn inactive_context_ignores_touches() {
        let mut det = Detector::default();
        det.feed_touch(&TouchEvent::down(1, 10, 10, 0));
        assert_eq!(det.state(GestureType::SingleTap), None);
    }

    #[test]
    fn listener_mask_filters_states() {
        let mut det = Detector::default();
        let (_, ended_only) = recorder(&mut det, GestureType::SingleTap, StateMask::ENDED);
        let (_, all) = recorder(&mut det, GestureType::SingleTap, StateMask::all());

        det.feed_touch(&TouchEvent::down(1, 100, 100, 0));
        det.feed_touch(&TouchEvent::up(1, 100, 100, 50));
        det.run_timers(250);

        let states: Vec<_> = ended_only.borrow().iter().map(|e| e.state).collect();
        assert_eq!(states, vec![GestureState::Ended]);
        let states: Vec<_> = all.borrow().iter().map(|e| e.state).collect();
        assert_eq!(states, vec![GestureState::Begin, GestureState::Ended]);
    }

    #[test]
    fn listeners_dispatch_in_registration_order() {
        let mut det = Detector::default();
        let order = Rc::new(RefCell::new(Vec::new()));
        for tag in ["first", "second", "third"] {
            let order = order.clone();
            det.add_listener(GestureListener::new(
                GestureType::SingleTap,
                StateMask::BEGIN,
                move |_| order.borrow_mut().push(tag),
            ));
        }
        det.feed_touch(&TouchEvent::down(1, 0, 0, 0));
        assert_eq!(*order.borrow(), vec!["first", "second", "third"]);
    }

    #[test]
    fn removing_last_listener_shuts_down_and_cancels_timers() {
        let mut det = Detector::default();
        let (token, log) = recorder(&mut det, GestureType::SingleTap, StateMask::all());

        det.feed_touch(&TouchEvent::down(1, 0, 0, 0));
        assert!(det.next_deadline().is_some());
        assert!(det.remove_listener(token));
        assert!(!det.is_active(GestureType::SingleTap));
        assert_eq!(det.next_deadline(), None);

        // a later touch finds the recognizer gone
        det.feed_touch(&TouchEvent::up(1, 0, 0, 50));
        det.run_timers(1000);
        assert_eq!(log.borrow().len(), 1); // only the initial BEGIN
    }

    #[test]
    fn remove_listener_unknown_token_is_false() {
        let mut det = Detector::default();
        let (token, _) = recorder(&mut det, GestureType::Flick, StateMask::all());
        assert!(det.remove_listener(token));
        assert!(!det.remove_listener(token));
    }

    #[test]
    fn repeated_add_remove_cycles_leave_no_pending_state() {
        let mut det = Detector::default();
        for _ in 0..100 {
            let (token, _) = recorder(&mut det, GestureType::DoubleTap, StateMask::all());
            det.feed_touch(&TouchEvent::down(1, 5, 5, 0));
            assert!(det.remove_listener(token));
            assert_eq!(det.next_deadline(), None);
            assert!(!det.is_active(GestureType::DoubleTap));
        }
    }

    #[test]
    fn reserved_longpress_accepts_listeners_but_never_fires() {
        let mut det = Detector::default();
        let (_, log) = recorder(&mut det, GestureType::LongpressHold, StateMask::all());
        assert!(det.is_active(GestureType::LongpressHold));

        det.feed_touch(&TouchEvent::down(1, 0, 0, 0));
        det.feed_touch(&TouchEvent::up(1, 0, 0, 2000));
        det.run_timers(5000);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn reset_clears_in_flight_tracking() {
        let mut det = Detector::default();
        let (_, log) = recorder(&mut det, GestureType::SingleTap, StateMask::all());

        det.feed_touch(&TouchEvent::down(1, 0, 0, 0));
        det.reset();
        assert_eq!(det.state(GestureType::SingleTap), None);
        assert_eq!(det.next_deadline(), None);

        // a fresh tap after the reset runs a clean attempt
        det.feed_touch(&TouchEvent::down(1, 0, 0, 1000));
        det.feed_touch(&TouchEvent::up(1, 0, 0, 1050));
        det.run_timers(1250);
        let states: Vec<_> = log.borrow().iter().map(|e| e.state).collect();
        assert_eq!(
            states,
            vec![GestureState::Begin, GestureState::Begin, GestureState::Ended]
        );
    }
}
