//! Per-slot touch tracking and the multitouch device source.
//!
//! Multitouch devices report the MT slot protocol: a current-slot register,
//! tracking ids marking contact begin/end, and absolute positions, all
//! batched up to a SYN_REPORT. The [`Tracker`] folds that back into the
//! discrete per-finger Down / Move / Up events the detector consumes, using
//! the slot index as the finger's device id. [`TouchSource`] owns the open
//! devices admitted by the profile's allow-list and runs one tracker per
//! device, offsetting finger ids so fingers on different hardware never
//! collide.

use std::path::Path;
use std::time::Instant;

use evdev::{AbsoluteAxisCode, Device, EventType, SynchronizationCode};
use log::{debug, warn};

use crate::events::{TouchEvent, TouchKind};
use crate::geometry::Point;

#[derive(Debug, Clone)]
struct SlotState {
    tracking_id: i32, // -1 = no contact
    pos: Point,
    active: bool,
    was_active: bool,
    moved: bool,
}

impl Default for SlotState {
    fn default() -> Self {
        Self {
            tracking_id: -1,
            pos: Point::default(),
            active: false,
            was_active: false,
            moved: false,
        }
    }
}

#[derive(Debug)]
pub struct Tracker {
    slots: Vec<SlotState>,
    cur_slot: usize,
    start: Instant,
}

impl Default for Tracker {
    fn default() -> Self {
        Self::new()
    }
}

impl Tracker {
    pub fn new() -> Self {
        Self::with_epoch(Instant::now())
    }

    /// Trackers sharing one epoch produce timestamps on the same clock, so a
    /// multi-device source can feed a single detector.
    pub fn with_epoch(start: Instant) -> Self {
        Self {
            slots: vec![SlotState::default(); 10],
            cur_slot: 0,
            start,
        }
    }

    pub fn now_ms(&self) -> u32 {
        self.start.elapsed().as_millis() as u32
    }

    pub fn on_slot(&mut self, slot: i32) {
        self.cur_slot = slot.clamp(0, self.slots.len() as i32 - 1) as usize;
    }

    pub fn on_tracking_id(&mut self, tracking_id: i32) {
        let s = &mut self.slots[self.cur_slot];
        if tracking_id < 0 {
            s.tracking_id = -1;
            s.active = false;
        } else {
            s.tracking_id = tracking_id;
            s.active = true;
            s.moved = false;
        }
    }

    pub fn on_pos_x(&mut self, raw: i32) {
        let s = &mut self.slots[self.cur_slot];
        if s.pos.x != raw {
            s.pos.x = raw;
            s.moved = true;
        }
    }

    pub fn on_pos_y(&mut self, raw: i32) {
        let s = &mut self.slots[self.cur_slot];
        if s.pos.y != raw {
            s.pos.y = raw;
            s.moved = true;
        }
    }

    /// Close the frame: diff every slot against its state at the previous
    /// SYN_REPORT and emit the transitions. A contact that began and ended
    /// inside one frame is invisible here, which is fine at evdev rates.
    pub fn on_syn_report(&mut self) -> Vec<TouchEvent> {
        let timestamp = self.now_ms();
        let mut out = Vec::new();
        for (slot, s) in self.slots.iter_mut().enumerate() {
            let kind = match (s.was_active, s.active) {
                (false, true) => Some(TouchKind::Down),
                (true, false) => Some(TouchKind::Up),
                (true, true) if s.moved => Some(TouchKind::Move),
                _ => None,
            };
            if let Some(kind) = kind {
                out.push(TouchEvent {
                    device: slot as i32,
                    pos: s.pos,
                    kind,
                    timestamp,
                });
            }
            s.was_active = s.active;
            s.moved = false;
        }
        out
    }

    pub fn active_count(&self) -> usize {
        self.slots.iter().filter(|s| s.active).count()
    }
}

/// Finger ids from different devices are spread into disjoint ranges.
const FINGER_ID_SPAN: i32 = 16;

fn speaks_slot_protocol(dev: &Device) -> bool {
    dev.supported_events().contains(EventType::ABSOLUTE)
        && dev.supported_absolute_axes().is_some_and(|axes| {
            axes.contains(AbsoluteAxisCode::ABS_MT_SLOT)
                && axes.contains(AbsoluteAxisCode::ABS_MT_POSITION_X)
                && axes.contains(AbsoluteAxisCode::ABS_MT_POSITION_Y)
        })
}

fn admitted(allow: &[String], name: &str, path: &Path) -> bool {
    if allow.is_empty() {
        return true;
    }
    let path = path.display().to_string();
    allow.iter().any(|pat| name.contains(pat) || path.contains(pat))
}

/// Probe /dev/input for slot-protocol devices passing the allow-list and
/// keep their handles open. Each entry is `("name (path)", device)`.
fn scan(allow: &[String]) -> Vec<(String, Device)> {
    let Ok(entries) = std::fs::read_dir("/dev/input") else {
        return Vec::new();
    };
    let mut found = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        let is_event_node = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with("event"));
        if !is_event_node {
            continue;
        }
        let Ok(dev) = Device::open(&path) else {
            continue;
        };
        if !speaks_slot_protocol(&dev) {
            continue;
        }
        let name = dev.name().unwrap_or("unknown").to_string();
        if !admitted(allow, &name, &path) {
            debug!("skipping {name} ({}): not in devices.allow", path.display());
            continue;
        }
        found.push((format!("{name} ({})", path.display()), dev));
    }
    found
}

/// Names of the admissible multitouch devices, for diagnostics.
pub fn enumerate(allow: &[String]) -> Vec<String> {
    scan(allow).into_iter().map(|(label, _)| label).collect()
}

struct SourceDevice {
    label: String,
    handle: Device,
    tracker: Tracker,
    finger_base: i32,
}

/// The open multitouch devices feeding one detector: every device gets its
/// own slot tracker on a shared clock, and its fingers a disjoint id range.
pub struct TouchSource {
    start: Instant,
    devices: Vec<SourceDevice>,
}

impl TouchSource {
    /// Open every admissible device, non-blocking. An empty source is not an
    /// error; callers decide whether to idle or bail.
    pub fn open(allow: &[String]) -> Self {
        let start = Instant::now();
        let mut devices = Vec::new();
        for (label, mut handle) in scan(allow) {
            if let Err(e) = handle.set_nonblocking(true) {
                warn!("skipping {label}: {e}");
                continue;
            }
            devices.push(SourceDevice {
                label,
                handle,
                tracker: Tracker::with_epoch(start),
                finger_base: devices.len() as i32 * FINGER_ID_SPAN,
            });
        }
        Self { start, devices }
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.devices.iter().map(|d| d.label.as_str())
    }

    pub fn now_ms(&self) -> u32 {
        self.start.elapsed().as_millis() as u32
    }

    /// Drain whatever the kernel has queued and fold it into touch events.
    pub fn poll(&mut self) -> Vec<TouchEvent> {
        let mut out = Vec::new();
        for dev in self.devices.iter_mut() {
            let Ok(events) = dev.handle.fetch_events() else {
                continue;
            };
            for ev in events {
                if ev.event_type() == EventType::ABSOLUTE {
                    match ev.code() {
                        c if c == AbsoluteAxisCode::ABS_MT_SLOT.0 => {
                            dev.tracker.on_slot(ev.value());
                        }
                        c if c == AbsoluteAxisCode::ABS_MT_TRACKING_ID.0 => {
                            dev.tracker.on_tracking_id(ev.value());
                        }
                        c if c == AbsoluteAxisCode::ABS_MT_POSITION_X.0 => {
                            dev.tracker.on_pos_x(ev.value());
                        }
                        c if c == AbsoluteAxisCode::ABS_MT_POSITION_Y.0 => {
                            dev.tracker.on_pos_y(ev.value());
                        }
                        _ => {}
                    }
                } else if ev.event_type() == EventType::SYNCHRONIZATION
                    && ev.code() == SynchronizationCode::SYN_REPORT.0
                {
                    for mut touch in dev.tracker.on_syn_report() {
                        touch.device += dev.finger_base;
                        out.push(touch);
                    }
                }
            }
        }
        out
    }
}
