#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use gestured::detector::{Detector, GestureListener};
use gestured::events::{
    FlickPayload, GestureEvent, GesturePayload, GestureState, GestureType, StateMask, TapPayload,
};

pub type EventLog = Rc<RefCell<Vec<GestureEvent>>>;

/// Subscribe a recording listener and hand back its log.
pub fn recorder(detector: &mut Detector, gesture: GestureType, mask: StateMask) -> EventLog {
    let log: EventLog = Rc::new(RefCell::new(Vec::new()));
    let sink = log.clone();
    detector.add_listener(GestureListener::new(gesture, mask, move |ev| {
        sink.borrow_mut().push(ev.clone());
    }));
    log
}

pub fn states(log: &EventLog) -> Vec<GestureState> {
    log.borrow().iter().map(|e| e.state).collect()
}

pub fn tap_payloads(log: &EventLog) -> Vec<TapPayload> {
    log.borrow()
        .iter()
        .map(|e| match e.payload {
            GesturePayload::Tap(t) => t,
            ref other => panic!("expected tap payload, got {other:?}"),
        })
        .collect()
}

pub fn flick_payloads(log: &EventLog) -> Vec<FlickPayload> {
    log.borrow()
        .iter()
        .map(|e| match e.payload {
            GesturePayload::Flick(f) => f,
            ref other => panic!("expected flick payload, got {other:?}"),
        })
        .collect()
}
