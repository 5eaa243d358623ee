//! Out-and-back swipe recognition.
//!
//! Each finger runs a four-phase machine: STARTED until it leaves the initial
//! finger-sized circle, FORWARDING while the inflection point advances along
//! the initial heading, RETURNING once the path bends back toward the origin,
//! INVALID when any constraint breaks. The gesture ends successfully only if
//! every finger is in RETURNING when it lifts.

use crate::config::FlickReturnThresholds;
use crate::detector::Sink;
use crate::events::{FlickPayload, GestureDirection, GesturePayload, GestureState, TouchEvent, TouchKind};
use crate::geometry::{Point, Vector};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Started,
    Forwarding,
    Returning,
    Invalid,
}

#[derive(Debug)]
struct ReturnFlick {
    /// Where the finger first came down.
    origin: Point,
    /// Apex of the forward leg, as a float position.
    inflection: Vector,
    flick_dir: Vector,
    return_dir: Vector,
    device: i32,
    /// Timestamp of the finger-down event; the whole gesture must fit within
    /// `max_time_ms` of it.
    timestamp: u32,
    phase: Phase,
    inflection_distance: f64,
    direction: GestureDirection,
}

impl ReturnFlick {
    fn new(event: &TouchEvent) -> Self {
        Self {
            origin: event.pos,
            inflection: Vector::default(),
            flick_dir: Vector::default(),
            return_dir: Vector::default(),
            device: event.device,
            timestamp: event.timestamp,
            phase: Phase::Started,
            inflection_distance: 0.0,
            direction: GestureDirection::Undefined,
        }
    }
}

fn position(p: Point) -> Vector {
    Vector::new(p.x as f64, p.y as f64)
}

fn cardinal(v: Vector) -> GestureDirection {
    if v.x.abs() > v.y.abs() {
        if v.x > 0.0 {
            GestureDirection::Right
        } else {
            GestureDirection::Left
        }
    } else if v.y > 0.0 {
        GestureDirection::Down
    } else {
        GestureDirection::Up
    }
}

fn update_record(record: &mut ReturnFlick, event: &TouchEvent, params: &FlickReturnThresholds) {
    if record.phase == Phase::Invalid {
        return;
    }
    if event.timestamp.saturating_sub(record.timestamp) > params.max_time_ms {
        record.phase = Phase::Invalid;
        return;
    }
    match record.phase {
        Phase::Started => {
            if record.origin.distance(event.pos) > params.finger_size as f64 {
                record.flick_dir = Vector::from_points(record.origin, event.pos).normalized();
                record.phase = Phase::Forwarding;
                record.inflection = position(event.pos);
                record.inflection_distance = 1.0;
                record.direction = cardinal(record.flick_dir);
            }
        }
        Phase::Forwarding => {
            let displacement = Vector::from_points(record.origin, event.pos);
            let off_heading = displacement.angle_between(record.flick_dir);
            let projection = displacement.dot(record.flick_dir);
            // the forward leg has bent once the path leaves the initial
            // heading, or retreats more than a finger from the apex (a
            // collinear return never changes the heading angle)
            let retreated =
                projection < record.inflection_distance - params.finger_size as f64;
            if record.inflection_distance > params.min_forward_length as f64
                && (off_heading > params.forward_tolerance || retreated)
            {
                // decide whether the bend heads back home
                let pos = position(event.pos);
                record.return_dir = Vector::new(
                    pos.x - record.inflection.x,
                    pos.y - record.inflection.y,
                );
                let homeward = Vector::new(
                    record.origin.x as f64 - record.inflection.x,
                    record.origin.y as f64 - record.inflection.y,
                );
                if record.return_dir.angle_between(homeward) > params.inflection_tolerance {
                    record.phase = Phase::Invalid;
                } else {
                    record.phase = Phase::Returning;
                }
            } else {
                // advance the inflection to the farthest projection so far
                if projection > record.inflection_distance {
                    record.inflection = Vector::new(
                        record.origin.x as f64 + projection * record.flick_dir.x,
                        record.origin.y as f64 + projection * record.flick_dir.y,
                    );
                    record.inflection_distance = projection;
                }
            }
        }
        Phase::Returning => {
            let pos = position(event.pos);
            let leg = Vector::new(pos.x - record.inflection.x, pos.y - record.inflection.y);
            if leg.angle_between(record.return_dir) > params.return_tolerance {
                record.phase = Phase::Invalid;
            }
        }
        Phase::Invalid => {}
    }
}

#[derive(Debug)]
pub(crate) struct FlickReturnRecognizer {
    params: FlickReturnThresholds,
    records: Vec<ReturnFlick>,
    payload: FlickPayload,
}

impl FlickReturnRecognizer {
    pub(crate) fn new(thresholds: &FlickReturnThresholds) -> Self {
        Self {
            params: *thresholds,
            records: Vec::new(),
            payload: FlickPayload::default(),
        }
    }

    pub(crate) fn feed(&mut self, sink: &mut Sink<'_>, event: &TouchEvent) {
        match event.kind {
            TouchKind::Down => {
                if self.record_index(event.device).is_some()
                    || sink.state() == Some(GestureState::Aborted)
                {
                    return;
                }
                // a finished gesture leaves ENDED behind; the next touch
                // starts a new one
                let begin = matches!(sink.state(), None | Some(GestureState::Ended));
                self.records.push(ReturnFlick::new(event));
                self.update_payload();
                let state = if begin {
                    GestureState::Begin
                } else {
                    GestureState::Continued
                };
                sink.set_state(Some(state), GesturePayload::Flick(self.payload));
            }
            TouchKind::Move => {
                let Some(idx) = self.record_index(event.device) else {
                    return;
                };
                if sink.state() == Some(GestureState::Aborted) {
                    return;
                }
                let params = self.params;
                update_record(&mut self.records[idx], event, &params);
                self.update_payload();
                if self.records[idx].phase == Phase::Invalid {
                    sink.set_state(
                        Some(GestureState::Aborted),
                        GesturePayload::Flick(self.payload),
                    );
                }
            }
            TouchKind::Up => {
                let Some(idx) = self.record_index(event.device) else {
                    return;
                };
                let record = self.records.remove(idx);
                let mut state = sink.state();
                if record.phase != Phase::Returning && state != Some(GestureState::Aborted) {
                    // one finger never made its return leg: the whole
                    // gesture shares its fate
                    sink.set_state(
                        Some(GestureState::Aborted),
                        GesturePayload::Flick(self.payload),
                    );
                    state = Some(GestureState::Aborted);
                }
                if self.records.is_empty() {
                    if state == Some(GestureState::Aborted) {
                        sink.set_state(None, GesturePayload::Flick(self.payload));
                    } else {
                        sink.set_state(
                            Some(GestureState::Ended),
                            GesturePayload::Flick(self.payload),
                        );
                    }
                }
            }
        }
    }

    pub(crate) fn reset(&mut self) {
        self.records.clear();
        self.payload = FlickPayload::default();
    }

    fn record_index(&self, device: i32) -> Option<usize> {
        self.records.iter().position(|r| r.device == device)
    }

    /// `n_fingers` and the common direction; the line coordinates stay zero
    /// for this recognizer.
    fn update_payload(&mut self) {
        self.payload.n_fingers = self.records.len() as i32;
        let Some(first) = self.records.first() else {
            return;
        };
        let mut direction = first.direction;
        for record in &self.records[1..] {
            if record.direction != direction {
                direction = GestureDirection::Undefined;
                break;
            }
        }
        self.payload.direction = direction;
    }
}
