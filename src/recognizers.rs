//! The per-gesture state machines.
//!
//! Each recognizer tracks its own per-finger records and reports transitions
//! through the detector's dispatch sink. They are independent: one touch
//! stream drives all of them, and none observes another's state.

mod flick;
mod flick_return;
mod tap;

pub(crate) use flick::FlickRecognizer;
pub(crate) use flick_return::FlickReturnRecognizer;
pub(crate) use tap::TapRecognizer;

use crate::config::GestureConfig;
use crate::detector::Sink;
use crate::events::{GestureType, TouchEvent};
use crate::timer::TimerHandle;

/// Recognizer state for one active context. The variant is fixed by the
/// gesture type at activation; `GestureType::LongpressHold` is reserved and
/// has none.
pub(crate) enum Recognizer {
    Tap(TapRecognizer),
    Flick(FlickRecognizer),
    FlickReturn(FlickReturnRecognizer),
}

impl Recognizer {
    pub(crate) fn new(gesture: GestureType, config: &GestureConfig) -> Option<Self> {
        match gesture {
            GestureType::LongpressHold => None,
            GestureType::SingleTap => Some(Recognizer::Tap(TapRecognizer::single(&config.tap))),
            GestureType::DoubleTap => Some(Recognizer::Tap(TapRecognizer::double(&config.tap))),
            GestureType::TripleTap => Some(Recognizer::Tap(TapRecognizer::triple(&config.tap))),
            GestureType::Flick => Some(Recognizer::Flick(FlickRecognizer::new(&config.flick))),
            GestureType::FlickReturn => Some(Recognizer::FlickReturn(FlickReturnRecognizer::new(
                &config.flick_return,
            ))),
        }
    }

    pub(crate) fn feed(&mut self, sink: &mut Sink<'_>, event: &TouchEvent) {
        match self {
            Recognizer::Tap(r) => r.feed(sink, event),
            Recognizer::Flick(r) => r.feed(sink, event),
            Recognizer::FlickReturn(r) => r.feed(sink, event),
        }
    }

    pub(crate) fn on_timer(&mut self, sink: &mut Sink<'_>, handle: TimerHandle) {
        match self {
            Recognizer::Tap(r) => r.on_timer(sink, handle),
            // only tap recognizers schedule timers
            Recognizer::Flick(_) | Recognizer::FlickReturn(_) => {}
        }
    }

    pub(crate) fn reset(&mut self) {
        match self {
            Recognizer::Tap(r) => r.reset(),
            Recognizer::Flick(r) => r.reset(),
            Recognizer::FlickReturn(r) => r.reset(),
        }
    }
}
