//! Straight-line N-finger swipe recognition.
//!
//! Each finger contributes a `Line`. A line activates once the finger has
//! travelled `min_length` from its start; after that every move must stay
//! within the angle tolerance of the initial heading, under the maximum
//! length, and inside the time limit.

use crate::config::FlickThresholds;
use crate::detector::Sink;
use crate::events::{FlickPayload, GestureDirection, GesturePayload, GestureState, TouchEvent, TouchKind};
use crate::geometry::{angle_diff, Point};

#[derive(Debug)]
struct Line {
    start: Point,
    end: Point,
    start_time: u32,
    /// 0 until the line activates.
    end_time: u32,
    device: i32,
    angle0: f64,
    current_angle: f64,
    length: f64,
}

impl Line {
    fn new(event: &TouchEvent) -> Self {
        Self {
            start: event.pos,
            end: event.pos,
            start_time: event.timestamp,
            end_time: 0,
            device: event.device,
            angle0: 0.0,
            current_angle: 0.0,
            length: 0.0,
        }
    }

    fn update(&mut self, event: &TouchEvent) {
        self.end = event.pos;
        self.end_time = event.timestamp;
        self.current_angle = self.start.segment_angle(self.end);
        self.length = self.start.distance(self.end);
    }
}

#[derive(Debug)]
pub(crate) struct FlickRecognizer {
    min_length: f64,
    max_length: f64,
    angle_tolerance: f64,
    time_limit_ms: u32,
    lines: Vec<Line>,
    payload: FlickPayload,
}

impl FlickRecognizer {
    pub(crate) fn new(thresholds: &FlickThresholds) -> Self {
        Self {
            min_length: thresholds.min_length as f64,
            max_length: thresholds.max_length as f64,
            angle_tolerance: thresholds.angle_tolerance,
            time_limit_ms: thresholds.time_limit_ms,
            lines: Vec::new(),
            payload: FlickPayload::default(),
        }
    }

    pub(crate) fn feed(&mut self, sink: &mut Sink<'_>, event: &TouchEvent) {
        match event.kind {
            TouchKind::Down => {
                if self.line_index(event.device).is_some() {
                    return;
                }
                self.lines.push(Line::new(event));
                self.update_payload();
                if self.lines.len() == 1 {
                    sink.set_state(Some(GestureState::Begin), GesturePayload::Flick(self.payload));
                }
            }
            TouchKind::Move => {
                let Some(idx) = self.line_index(event.device) else {
                    return;
                };
                if sink.state() == Some(GestureState::Aborted) {
                    return;
                }
                let line = &mut self.lines[idx];
                if line.end_time != 0 {
                    line.update(event);
                    let too_long = line.length > self.max_length;
                    let bent = angle_diff(line.angle0, line.current_angle) > self.angle_tolerance;
                    let too_slow =
                        event.timestamp.saturating_sub(line.start_time) > self.time_limit_ms;
                    self.update_payload();
                    if too_long || bent || too_slow {
                        sink.set_state(
                            Some(GestureState::Aborted),
                            GesturePayload::Flick(self.payload),
                        );
                    } else {
                        sink.set_state(
                            Some(GestureState::Continued),
                            GesturePayload::Flick(self.payload),
                        );
                    }
                } else if line.start.distance(event.pos) > self.min_length {
                    line.update(event);
                    line.angle0 = line.current_angle;
                    self.update_payload();
                    sink.set_state(
                        Some(GestureState::Continued),
                        GesturePayload::Flick(self.payload),
                    );
                }
            }
            TouchKind::Up => {
                let Some(idx) = self.line_index(event.device) else {
                    return;
                };
                self.lines.remove(idx);
                if self.lines.is_empty() {
                    // last payload, not recomputed: it still describes the
                    // contacts that drove the gesture
                    match sink.state() {
                        Some(GestureState::Aborted) => {
                            sink.set_state(None, GesturePayload::Flick(self.payload));
                        }
                        Some(GestureState::Continued) => {
                            sink.set_state(
                                Some(GestureState::Ended),
                                GesturePayload::Flick(self.payload),
                            );
                        }
                        _ => {
                            sink.set_state(
                                Some(GestureState::Aborted),
                                GesturePayload::Flick(self.payload),
                            );
                        }
                    }
                }
            }
        }
    }

    pub(crate) fn reset(&mut self) {
        self.lines.clear();
        self.payload = FlickPayload::default();
    }

    fn line_index(&self, device: i32) -> Option<usize> {
        self.lines.iter().position(|l| l.device == device)
    }

    /// Centroids over all current lines; direction from the mean displacement.
    fn update_payload(&mut self) {
        let n = self.lines.len() as i32;
        if n == 0 {
            return;
        }
        let (mut x1, mut y1, mut x2, mut y2) = (0, 0, 0, 0);
        for line in &self.lines {
            x1 += line.start.x;
            y1 += line.start.y;
            x2 += line.end.x;
            y2 += line.end.y;
        }
        x1 /= n;
        y1 /= n;
        x2 /= n;
        y2 /= n;

        let dx = x2 - x1;
        let dy = y2 - y1;
        let direction = if dx == 0 && dy == 0 {
            GestureDirection::Undefined
        } else if dy.abs() > dx.abs() {
            if dy > 0 {
                GestureDirection::Up
            } else {
                GestureDirection::Down
            }
        } else if dx > 0 {
            GestureDirection::Right
        } else {
            GestureDirection::Left
        };

        self.payload = FlickPayload {
            direction,
            x1,
            y1,
            x2,
            y2,
            n_fingers: n,
        };
    }
}
