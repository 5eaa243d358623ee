//! Bus wire format for gesture and device events.
//!
//! Gesture events travel as a method call with signature `uuuv`: three
//! unsigned 32-bit fields (`type`, `states`, `timestamp`) followed by a
//! variant whose inner struct depends on the type — `(iiii)` for tap
//! gestures, `(uiiiii)` for flick gestures. Device events use `(uiuuusb)`,
//! with a legacy `uinnisb` form (16-bit hw_code/modifiers) still accepted on
//! the read side. Integers are little-endian; basic types carry the bus's
//! natural alignment (4 for 32-bit values and strings, 2 for 16-bit, 8 for
//! struct starts).

use thiserror::Error;

use crate::events::{
    DeviceEvent, FlickPayload, GestureDirection, GestureEvent, GesturePayload, GestureState,
    GestureType, TapPayload,
};

pub const GESTURE_EVENT_SIGNATURE: &str = "uuuv";
pub const TAP_VARIANT_SIGNATURE: &str = "(iiii)";
pub const FLICK_VARIANT_SIGNATURE: &str = "(uiiiii)";
pub const DEVICE_EVENT_SIGNATURE: &str = "(uiuuusb)";
pub const DEVICE_EVENT_LEGACY_SIGNATURE: &str = "uinnisb";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WireError {
    #[error("unexpected signature {found:?}, expected {expected:?}")]
    SignatureMismatch { expected: &'static str, found: String },
    #[error("unexpected variant signature {found:?}, expected {expected:?}")]
    VariantMismatch { expected: &'static str, found: String },
    #[error("message truncated at offset {0}")]
    Truncated(usize),
    #[error("malformed string data")]
    BadString,
    #[error("unknown gesture type {0}")]
    UnknownGestureType(u32),
    #[error("state field {0:#x} is not a single state flag")]
    BadStateBits(u32),
    #[error("unknown gesture direction {0}")]
    UnknownDirection(u32),
    #[error("bad listener path {0:?}")]
    BadListenerPath(String),
}

/// Little-endian message builder.
#[derive(Debug, Default)]
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    pub fn new() -> Self {
        Self::default()
    }

    fn pad_to(&mut self, align: usize) {
        while self.buf.len() % align != 0 {
            self.buf.push(0);
        }
    }

    pub fn put_u32(&mut self, v: u32) {
        self.pad_to(4);
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn put_i32(&mut self, v: i32) {
        self.pad_to(4);
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn put_i16(&mut self, v: i16) {
        self.pad_to(2);
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn put_bool(&mut self, v: bool) {
        self.put_u32(v as u32);
    }

    /// Length-prefixed, nul-terminated.
    pub fn put_string(&mut self, s: &str) {
        self.pad_to(4);
        self.buf.extend_from_slice(&(s.len() as u32).to_le_bytes());
        self.buf.extend_from_slice(s.as_bytes());
        self.buf.push(0);
    }

    /// One-byte signature length, signature bytes, nul. The contained value
    /// follows with its own alignment.
    pub fn open_variant(&mut self, signature: &str) {
        self.buf.push(signature.len() as u8);
        self.buf.extend_from_slice(signature.as_bytes());
        self.buf.push(0);
    }

    pub fn open_struct(&mut self) {
        self.pad_to(8);
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

/// Little-endian message parser over a borrowed buffer.
#[derive(Debug)]
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn align(&mut self, align: usize) -> Result<(), WireError> {
        let aligned = self.pos.div_ceil(align) * align;
        if aligned > self.data.len() {
            return Err(WireError::Truncated(self.pos));
        }
        self.pos = aligned;
        Ok(())
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], WireError> {
        if self.pos + n > self.data.len() {
            return Err(WireError::Truncated(self.pos));
        }
        let bytes = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    pub fn get_u32(&mut self) -> Result<u32, WireError> {
        self.align(4)?;
        Ok(u32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    pub fn get_i32(&mut self) -> Result<i32, WireError> {
        self.align(4)?;
        Ok(i32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    pub fn get_i16(&mut self) -> Result<i16, WireError> {
        self.align(2)?;
        Ok(i16::from_le_bytes(self.take(2)?.try_into().unwrap()))
    }

    pub fn get_bool(&mut self) -> Result<bool, WireError> {
        Ok(self.get_u32()? != 0)
    }

    pub fn get_string(&mut self) -> Result<String, WireError> {
        let len = self.get_u32()? as usize;
        let bytes = self.take(len)?;
        let nul = self.take(1)?;
        if nul != [0] {
            return Err(WireError::BadString);
        }
        String::from_utf8(bytes.to_vec()).map_err(|_| WireError::BadString)
    }

    pub fn get_variant_signature(&mut self) -> Result<String, WireError> {
        let len = self.take(1)?[0] as usize;
        let sig = self.take(len)?;
        let nul = self.take(1)?;
        if nul != [0] {
            return Err(WireError::BadString);
        }
        String::from_utf8(sig.to_vec()).map_err(|_| WireError::BadString)
    }

    pub fn enter_struct(&mut self) -> Result<(), WireError> {
        self.align(8)
    }
}

/// Body of a `uuuv` gesture method call.
pub fn marshal_gesture_event(event: &GestureEvent) -> Vec<u8> {
    let mut w = Writer::new();
    w.put_u32(event.gesture as u32);
    w.put_u32(event.state.bits());
    w.put_u32(event.timestamp);
    if event.gesture.carries_tap_payload() {
        let tap = match event.payload {
            GesturePayload::Tap(t) => t,
            _ => TapPayload::default(),
        };
        w.open_variant(TAP_VARIANT_SIGNATURE);
        w.open_struct();
        w.put_i32(tap.n_fingers);
        w.put_i32(tap.n_taps);
        w.put_i32(tap.x);
        w.put_i32(tap.y);
    } else {
        let flick = match event.payload {
            GesturePayload::Flick(f) => f,
            _ => FlickPayload::default(),
        };
        w.open_variant(FLICK_VARIANT_SIGNATURE);
        w.open_struct();
        w.put_u32(flick.direction as u32);
        w.put_i32(flick.x1);
        w.put_i32(flick.y1);
        w.put_i32(flick.x2);
        w.put_i32(flick.y2);
        w.put_i32(flick.n_fingers);
    }
    w.into_bytes()
}

pub fn demarshal_gesture_event(signature: &str, body: &[u8]) -> Result<GestureEvent, WireError> {
    if signature != GESTURE_EVENT_SIGNATURE {
        return Err(WireError::SignatureMismatch {
            expected: GESTURE_EVENT_SIGNATURE,
            found: signature.to_string(),
        });
    }
    let mut r = Reader::new(body);
    let raw_type = r.get_u32()?;
    let gesture = GestureType::from_u32(raw_type).ok_or(WireError::UnknownGestureType(raw_type))?;
    let raw_state = r.get_u32()?;
    let state = GestureState::from_bits(raw_state).ok_or(WireError::BadStateBits(raw_state))?;
    let timestamp = r.get_u32()?;

    let sig = r.get_variant_signature()?;
    let payload = if gesture.carries_tap_payload() {
        if sig != TAP_VARIANT_SIGNATURE {
            return Err(WireError::VariantMismatch {
                expected: TAP_VARIANT_SIGNATURE,
                found: sig,
            });
        }
        r.enter_struct()?;
        GesturePayload::Tap(TapPayload {
            n_fingers: r.get_i32()?,
            n_taps: r.get_i32()?,
            x: r.get_i32()?,
            y: r.get_i32()?,
        })
    } else {
        if sig != FLICK_VARIANT_SIGNATURE {
            return Err(WireError::VariantMismatch {
                expected: FLICK_VARIANT_SIGNATURE,
                found: sig,
            });
        }
        r.enter_struct()?;
        let raw_dir = r.get_u32()?;
        GesturePayload::Flick(FlickPayload {
            direction: GestureDirection::from_u32(raw_dir)
                .ok_or(WireError::UnknownDirection(raw_dir))?,
            x1: r.get_i32()?,
            y1: r.get_i32()?,
            x2: r.get_i32()?,
            y2: r.get_i32()?,
            n_fingers: r.get_i32()?,
        })
    };

    Ok(GestureEvent {
        gesture,
        state,
        timestamp,
        payload,
    })
}

/// Body of a device-event struct, modern `(uiuuusb)` layout.
pub fn marshal_device_event(event: &DeviceEvent) -> Vec<u8> {
    let mut w = Writer::new();
    w.open_struct();
    w.put_u32(event.kind);
    w.put_i32(event.id);
    w.put_u32(event.hw_code);
    w.put_u32(event.modifiers);
    w.put_u32(event.timestamp);
    w.put_string(&event.event_string);
    w.put_bool(event.is_text);
    w.into_bytes()
}

/// Parse a device event, falling back to the legacy `uinnisb` layout
/// (16-bit hw_code/modifiers) kept for old senders.
pub fn demarshal_device_event(body: &[u8]) -> Result<DeviceEvent, WireError> {
    match demarshal_device_event_modern(body) {
        Ok(event) => Ok(event),
        Err(_) => demarshal_device_event_legacy(body),
    }
}

fn demarshal_device_event_modern(body: &[u8]) -> Result<DeviceEvent, WireError> {
    let mut r = Reader::new(body);
    r.enter_struct()?;
    Ok(DeviceEvent {
        kind: r.get_u32()?,
        id: r.get_i32()?,
        hw_code: r.get_u32()?,
        modifiers: r.get_u32()?,
        timestamp: r.get_u32()?,
        event_string: r.get_string()?,
        is_text: r.get_bool()?,
    })
}

fn demarshal_device_event_legacy(body: &[u8]) -> Result<DeviceEvent, WireError> {
    let mut r = Reader::new(body);
    r.enter_struct()?;
    let kind = r.get_u32()?;
    let id = r.get_i32()?;
    let hw_code = r.get_i16()? as u32;
    let modifiers = r.get_i16()? as u32;
    let timestamp = r.get_i32()? as u32;
    Ok(DeviceEvent {
        kind,
        id,
        hw_code,
        modifiers,
        timestamp,
        event_string: r.get_string()?,
        is_text: r.get_bool()?,
    })
}

/// Method reply body: a single boolean.
pub fn marshal_reply(value: bool) -> Vec<u8> {
    let mut w = Writer::new();
    w.put_bool(value);
    w.into_bytes()
}

pub fn demarshal_reply(body: &[u8]) -> Result<bool, WireError> {
    Reader::new(body).get_bool()
}
