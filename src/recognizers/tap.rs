//! N-finger single / double / triple tap recognition.
//!
//! A `TapPlace` is where a finger tapped; it outlives the gap between taps of
//! a multi-tap gesture so the next tap can be matched against it. Every Down
//! restarts the variant timeout; the gesture only completes when the timer
//! expires with every place finished and the required tap count reached.

use crate::config::TapThresholds;
use crate::detector::Sink;
use crate::events::{GesturePayload, GestureState, TapPayload, TouchEvent, TouchKind};
use crate::geometry::Point;
use crate::timer::TimerHandle;

#[derive(Debug)]
struct TapPlace {
    /// Position of the first tap; later taps must land within `finger_size`
    /// of it.
    point: Point,
    /// Sums over every down position the place has absorbed, so the payload
    /// centroid averages all of them.
    sum_x: i32,
    sum_y: i32,
    timestamp: u32,
    device: i32,
    taps: i32,
    finished: bool,
}

impl TapPlace {
    fn centroid(&self) -> (i32, i32) {
        (self.sum_x / self.taps, self.sum_y / self.taps)
    }
}

#[derive(Debug)]
pub(crate) struct TapRecognizer {
    timeout_ms: u32,
    finger_size: f64,
    taps_required: i32,
    places: Vec<TapPlace>,
    timer: Option<TimerHandle>,
    payload: TapPayload,
    fingers_down: i32,
    tap_points_set: bool,
    n_taps: i32,
}

impl TapRecognizer {
    fn with_variant(thresholds: &TapThresholds, timeout_ms: u32, taps_required: i32) -> Self {
        Self {
            timeout_ms,
            finger_size: thresholds.finger_size as f64,
            taps_required,
            places: Vec::new(),
            timer: None,
            payload: TapPayload::default(),
            fingers_down: 0,
            tap_points_set: false,
            n_taps: 0,
        }
    }

    pub(crate) fn single(thresholds: &TapThresholds) -> Self {
        Self::with_variant(thresholds, thresholds.single_timeout_ms, 1)
    }

    pub(crate) fn double(thresholds: &TapThresholds) -> Self {
        Self::with_variant(thresholds, thresholds.double_timeout_ms, 2)
    }

    pub(crate) fn triple(thresholds: &TapThresholds) -> Self {
        Self::with_variant(thresholds, thresholds.triple_timeout_ms, 3)
    }

    pub(crate) fn feed(&mut self, sink: &mut Sink<'_>, event: &TouchEvent) {
        match event.kind {
            TouchKind::Down => {
                self.fingers_down += 1;
                if sink.state() == Some(GestureState::Aborted) {
                    self.idle_check(sink);
                    return;
                }
                let place = if self.tap_points_set {
                    self.reuse_place(event)
                } else {
                    Some(self.new_place(event))
                };
                let Some(idx) = place else {
                    // no frozen tap point within finger_size: the gesture
                    // cannot grow from here
                    self.abort(sink);
                    return;
                };
                if let Some(handle) = self.timer.take() {
                    sink.cancel_timer(handle);
                }
                self.timer = Some(sink.schedule_after(self.timeout_ms));
                self.update_payload();
                let state = if self.places.len() == 1 && self.places[idx].taps == 1 {
                    GestureState::Begin
                } else {
                    GestureState::Continued
                };
                sink.set_state(Some(state), GesturePayload::Tap(self.payload));
            }
            TouchKind::Move => {
                if !matches!(
                    sink.state(),
                    Some(GestureState::Begin | GestureState::Continued)
                ) {
                    self.idle_check(sink);
                    return;
                }
                let Some(place) = self.unfinished_for_device(event.device) else {
                    return;
                };
                if place.point.distance(event.pos) > self.finger_size {
                    self.abort(sink);
                }
            }
            TouchKind::Up => {
                self.fingers_down -= 1;
                if sink.state() == Some(GestureState::Aborted) {
                    self.idle_check(sink);
                    return;
                }
                // the first release freezes the tap points; later downs must
                // land on one of them
                if !self.tap_points_set {
                    self.tap_points_set = true;
                }
                let timeout = self.timeout_ms;
                let Some(place) = self.unfinished_for_device_mut(event.device) else {
                    return;
                };
                if event.timestamp.saturating_sub(place.timestamp) > timeout {
                    self.abort(sink);
                } else {
                    place.finished = true;
                }
            }
        }
    }

    /// The variant timeout expired: the attempt either completed or died.
    pub(crate) fn on_timer(&mut self, sink: &mut Sink<'_>, handle: TimerHandle) {
        if self.timer != Some(handle) {
            return;
        }
        self.timer = None;
        let complete = !self.places.is_empty()
            && self.places.iter().all(|p| p.finished)
            && self.n_taps == self.taps_required;
        if complete {
            sink.set_state(Some(GestureState::Ended), GesturePayload::Tap(self.payload));
        } else {
            sink.set_state(Some(GestureState::Aborted), GesturePayload::Tap(self.payload));
            self.idle_check(sink);
        }
        self.clear(sink);
    }

    pub(crate) fn reset(&mut self) {
        self.places.clear();
        self.timer = None;
        self.payload = TapPayload::default();
        self.fingers_down = 0;
        self.tap_points_set = false;
        self.n_taps = 0;
    }

    fn new_place(&mut self, event: &TouchEvent) -> usize {
        self.places.push(TapPlace {
            point: event.pos,
            sum_x: event.pos.x,
            sum_y: event.pos.y,
            timestamp: event.timestamp,
            device: event.device,
            taps: 1,
            finished: false,
        });
        self.places.len() - 1
    }

    /// Match a Down against a finished place within `finger_size` and reopen
    /// it for the next tap.
    fn reuse_place(&mut self, event: &TouchEvent) -> Option<usize> {
        let finger_size = self.finger_size;
        for (idx, place) in self.places.iter_mut().enumerate() {
            if place.finished && place.point.distance(event.pos) < finger_size {
                place.taps += 1;
                place.sum_x += event.pos.x;
                place.sum_y += event.pos.y;
                place.timestamp = event.timestamp;
                place.finished = false;
                place.device = event.device;
                return Some(idx);
            }
        }
        None
    }

    fn unfinished_for_device(&self, device: i32) -> Option<&TapPlace> {
        self.places.iter().find(|p| !p.finished && p.device == device)
    }

    fn unfinished_for_device_mut(&mut self, device: i32) -> Option<&mut TapPlace> {
        self.places
            .iter_mut()
            .find(|p| !p.finished && p.device == device)
    }

    fn update_payload(&mut self) {
        let n = self.places.len() as i32;
        let mut x = 0;
        let mut y = 0;
        for place in &self.places {
            let (cx, cy) = place.centroid();
            x += cx;
            y += cy;
            self.n_taps = self.n_taps.max(place.taps);
        }
        self.payload = TapPayload {
            n_fingers: n,
            n_taps: self.n_taps,
            x: x / n,
            y: y / n,
        };
    }

    fn abort(&mut self, sink: &mut Sink<'_>) {
        sink.set_state(Some(GestureState::Aborted), GesturePayload::Tap(self.payload));
        self.clear(sink);
        self.idle_check(sink);
    }

    /// Once every finger is up, an aborted attempt settles back to idle.
    fn idle_check(&mut self, sink: &mut Sink<'_>) {
        if self.fingers_down == 0 {
            sink.set_state(None, GesturePayload::Tap(self.payload));
        }
    }

    fn clear(&mut self, sink: &mut Sink<'_>) {
        self.places.clear();
        if let Some(handle) = self.timer.take() {
            sink.cancel_timer(handle);
        }
        self.payload = TapPayload::default();
        self.tap_points_set = false;
        self.n_taps = 0;
    }
}
