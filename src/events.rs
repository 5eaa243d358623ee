//! Event and payload types exchanged between the touch source, the detector,
//! and listeners.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::geometry::Point;

/// What a single touch report says about one finger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TouchKind {
    Down,
    Move,
    Up,
}

/// One low-level touch report. `device` identifies a finger and stays stable
/// from its Down through every Move to its Up. Timestamps are milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TouchEvent {
    pub device: i32,
    pub pos: Point,
    pub kind: TouchKind,
    pub timestamp: u32,
}

impl TouchEvent {
    pub fn down(device: i32, x: i32, y: i32, timestamp: u32) -> Self {
        Self {
            device,
            pos: Point::new(x, y),
            kind: TouchKind::Down,
            timestamp,
        }
    }

    pub fn moved(device: i32, x: i32, y: i32, timestamp: u32) -> Self {
        Self {
            device,
            pos: Point::new(x, y),
            kind: TouchKind::Move,
            timestamp,
        }
    }

    pub fn up(device: i32, x: i32, y: i32, timestamp: u32) -> Self {
        Self {
            device,
            pos: Point::new(x, y),
            kind: TouchKind::Up,
            timestamp,
        }
    }
}

/// The closed set of gesture types. `LongpressHold` is reserved: listeners may
/// subscribe to it, but no recognizer ever emits it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u32)]
pub enum GestureType {
    LongpressHold = 0,
    SingleTap = 1,
    DoubleTap = 2,
    TripleTap = 3,
    Flick = 4,
    FlickReturn = 5,
}

impl GestureType {
    pub const ALL: [GestureType; 6] = [
        GestureType::LongpressHold,
        GestureType::SingleTap,
        GestureType::DoubleTap,
        GestureType::TripleTap,
        GestureType::Flick,
        GestureType::FlickReturn,
    ];

    pub fn from_u32(value: u32) -> Option<Self> {
        Self::ALL.get(value as usize).copied()
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }

    /// Tap gestures carry a [`TapPayload`] on the wire, the rest a
    /// [`FlickPayload`].
    pub fn carries_tap_payload(self) -> bool {
        matches!(
            self,
            GestureType::LongpressHold
                | GestureType::SingleTap
                | GestureType::DoubleTap
                | GestureType::TripleTap
        )
    }
}

/// The phase a gesture event reports. Exactly one per emission; the values are
/// the wire bits listeners subscribe with through [`StateMask`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u32)]
pub enum GestureState {
    Begin = 1,
    Continued = 2,
    Ended = 4,
    Aborted = 8,
}

impl GestureState {
    pub fn bits(self) -> u32 {
        self as u32
    }

    pub fn from_bits(value: u32) -> Option<Self> {
        match value {
            1 => Some(GestureState::Begin),
            2 => Some(GestureState::Continued),
            4 => Some(GestureState::Ended),
            8 => Some(GestureState::Aborted),
            _ => None,
        }
    }
}

bitflags! {
    /// Which gesture states a listener wants delivered.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct StateMask: u32 {
        const BEGIN = 1;
        const CONTINUED = 2;
        const ENDED = 4;
        const ABORTED = 8;
    }
}

impl StateMask {
    pub fn matches(self, state: GestureState) -> bool {
        self.bits() & state.bits() != 0
    }
}

/// Cardinal direction of a flick, `Undefined` when fingers disagree or no
/// displacement has accumulated yet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u32)]
pub enum GestureDirection {
    #[default]
    Undefined = 0,
    Left = 1,
    Right = 2,
    Up = 3,
    Down = 4,
}

impl GestureDirection {
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(GestureDirection::Undefined),
            1 => Some(GestureDirection::Left),
            2 => Some(GestureDirection::Right),
            3 => Some(GestureDirection::Up),
            4 => Some(GestureDirection::Down),
            _ => None,
        }
    }
}

/// Payload of tap gestures; `x`/`y` is the centroid of the finger-down
/// positions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TapPayload {
    pub n_fingers: i32,
    pub n_taps: i32,
    pub x: i32,
    pub y: i32,
}

/// Payload of flick and return-flick gestures. For return-flicks only
/// `direction` and `n_fingers` are meaningful; the line coordinates stay zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlickPayload {
    pub direction: GestureDirection,
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
    pub n_fingers: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GesturePayload {
    None,
    Tap(TapPayload),
    Flick(FlickPayload),
}

/// A recognized-gesture notification. Value-semantic: listeners that need the
/// event beyond the callback clone it; the recognizer is free to reuse its
/// internal payload buffer afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GestureEvent {
    pub gesture: GestureType,
    pub state: GestureState,
    pub timestamp: u32,
    pub payload: GesturePayload,
}

/// Keyboard/button passthrough event, marshalled by the same wire layer but
/// never produced by the gesture core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceEvent {
    pub kind: u32,
    pub id: i32,
    pub hw_code: u32,
    pub modifiers: u32,
    pub timestamp: u32,
    pub event_string: String,
    pub is_text: bool,
}
