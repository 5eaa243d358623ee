//! Remote gesture listeners.
//!
//! A listener that receives gestures over the bus is addressable by a small
//! integer id embedded in its object path. The registry allocates ids,
//! routes incoming method calls back to listener instances, and applies the
//! drop-with-warning policy for malformed messages. Ids are scoped to one
//! registry instance, not to the process.

use log::warn;

use crate::detector::GestureCallback;
use crate::events::GestureEvent;
use crate::wire::{self, WireError};

pub const LISTENER_PATH_PREFIX: &str = "/org/a11y/atspi/gesture/listeners/";

/// Parse a listener id out of its object path.
pub fn parse_listener_path(path: &str) -> Result<u32, WireError> {
    path.strip_prefix(LISTENER_PATH_PREFIX)
        .and_then(|id| id.parse().ok())
        .ok_or_else(|| WireError::BadListenerPath(path.to_string()))
}

/// One bus-addressable listener: a stable id plus the callbacks to run when a
/// gesture event arrives for it.
pub struct RemoteListener {
    id: u32,
    callbacks: Vec<GestureCallback>,
}

impl RemoteListener {
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn path(&self) -> String {
        format!("{LISTENER_PATH_PREFIX}{}", self.id)
    }

    pub fn add_callback(&mut self, callback: impl FnMut(&GestureEvent) + 'static) {
        self.callbacks.push(Box::new(callback));
    }

    pub fn notify(&mut self, event: &GestureEvent) {
        for callback in &mut self.callbacks {
            callback(event);
        }
    }
}

impl std::fmt::Debug for RemoteListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteListener")
            .field("id", &self.id)
            .field("callbacks", &self.callbacks.len())
            .finish()
    }
}

/// Owns the remote listeners of one connection and their id space.
#[derive(Debug, Default)]
pub struct ListenerRegistry {
    next_id: u32,
    listeners: Vec<RemoteListener>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next free id, skipping any still in use, and register a
    /// listener under it.
    pub fn create_listener(&mut self) -> u32 {
        loop {
            let id = self.next_id;
            self.next_id = self.next_id.wrapping_add(1);
            if !self.listeners.iter().any(|l| l.id == id) {
                self.listeners.push(RemoteListener {
                    id,
                    callbacks: Vec::new(),
                });
                return id;
            }
        }
    }

    pub fn get_mut(&mut self, id: u32) -> Option<&mut RemoteListener> {
        self.listeners.iter_mut().find(|l| l.id == id)
    }

    pub fn remove(&mut self, id: u32) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|l| l.id != id);
        self.listeners.len() != before
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Handle one incoming gesture method call. Malformed messages are
    /// dropped with a warning; the returned value is the boolean carried by
    /// the method reply, which is `false` in every case, as documented.
    pub fn handle_message(&mut self, path: &str, signature: &str, body: &[u8]) -> bool {
        if signature != wire::GESTURE_EVENT_SIGNATURE {
            warn!(
                "unknown signature for a gesture event: expected {:?}, got {signature:?}",
                wire::GESTURE_EVENT_SIGNATURE
            );
            return false;
        }
        let id = match parse_listener_path(path) {
            Ok(id) => id,
            Err(err) => {
                warn!("{err}");
                return false;
            }
        };
        let Some(listener) = self.get_mut(id) else {
            return false;
        };
        match wire::demarshal_gesture_event(signature, body) {
            Ok(event) => listener.notify(&event),
            Err(err) => warn!("dropping gesture event for listener {id}: {err}"),
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{GesturePayload, GestureState, GestureType, TapPayload};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn sample_event() -> GestureEvent {
        GestureEvent {
            gesture: GestureType::SingleTap,
            state: GestureState::Ended,
            timestamp: 250,
            payload: GesturePayload::Tap(TapPayload {
                n_fingers: 1,
                n_taps: 1,
                x: 100,
                y: 100,
            }),
        }
    }

    #[test]
    fn paths_format_and_parse() {
        let mut reg = ListenerRegistry::new();
        let id = reg.create_listener();
        let path = reg.get_mut(id).unwrap().path();
        assert_eq!(path, format!("/org/a11y/atspi/gesture/listeners/{id}"));
        assert_eq!(parse_listener_path(&path), Ok(id));
    }

    #[test]
    fn bad_paths_do_not_parse() {
        for path in [
            "/org/a11y/atspi/gesture/listeners/",
            "/org/a11y/atspi/gesture/listeners/x7",
            "/org/a11y/atspi/gesture/listeners/7x",
            "/somewhere/else/3",
        ] {
            assert!(parse_listener_path(path).is_err(), "{path}");
        }
    }

    #[test]
    fn ids_are_monotonic_and_skip_in_use() {
        let mut reg = ListenerRegistry::new();
        let a = reg.create_listener();
        let b = reg.create_listener();
        let c = reg.create_listener();
        assert_eq!((a, b, c), (0, 1, 2));

        // wrap the counter; 0 and 2 are still taken and must be skipped
        reg.remove(b);
        reg.next_id = u32::MAX;
        let d = reg.create_listener();
        assert_eq!(d, u32::MAX);
        let e = reg.create_listener();
        assert_eq!(e, 1);
    }

    #[test]
    fn message_dispatches_to_the_addressed_listener() {
        let mut reg = ListenerRegistry::new();
        let id_a = reg.create_listener();
        let id_b = reg.create_listener();

        let seen = Rc::new(RefCell::new(Vec::new()));
        for id in [id_a, id_b] {
            let seen = seen.clone();
            reg.get_mut(id).unwrap().add_callback(move |ev| {
                seen.borrow_mut().push((id, ev.clone()));
            });
        }

        let event = sample_event();
        let body = wire::marshal_gesture_event(&event);
        let path = format!("{LISTENER_PATH_PREFIX}{id_b}");
        let reply = reg.handle_message(&path, wire::GESTURE_EVENT_SIGNATURE, &body);

        assert!(!reply);
        let seen = seen.borrow();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0], (id_b, event));
    }

    #[test]
    fn malformed_messages_are_dropped_but_replied() {
        let mut reg = ListenerRegistry::new();
        let id = reg.create_listener();
        let called = Rc::new(RefCell::new(0));
        let counter = called.clone();
        reg.get_mut(id)
            .unwrap()
            .add_callback(move |_| *counter.borrow_mut() += 1);

        let body = wire::marshal_gesture_event(&sample_event());
        let path = format!("{LISTENER_PATH_PREFIX}{id}");

        // wrong signature
        assert!(!reg.handle_message(&path, "uuu", &body));
        // unparseable path
        assert!(!reg.handle_message("/org/a11y/atspi/gesture/listeners/abc", "uuuv", &body));
        // unknown listener
        assert!(!reg.handle_message(&format!("{LISTENER_PATH_PREFIX}999"), "uuuv", &body));
        // truncated body
        assert!(!reg.handle_message(&path, "uuuv", &body[..5]));

        assert_eq!(*called.borrow(), 0);

        // and a well-formed message still gets through (reply stays false)
        assert!(!reg.handle_message(&path, "uuuv", &body));
        assert_eq!(*called.borrow(), 1);
    }
}
