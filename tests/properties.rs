//! Invariant checks over generated touch sequences.

mod common;

use std::collections::BTreeSet;

use common::{recorder, states, EventLog};
use gestured::detector::{Detector, GestureListener};
use gestured::events::{
    GesturePayload, GestureState, GestureType, StateMask, TouchEvent, TouchKind,
};

const RECOGNIZED: [GestureType; 5] = [
    GestureType::SingleTap,
    GestureType::DoubleTap,
    GestureType::TripleTap,
    GestureType::Flick,
    GestureType::FlickReturn,
];

/// Tiny deterministic generator, enough to vary the traces between runs of
/// the loop without pulling in a dependency.
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        self.0 >> 33
    }

    fn below(&mut self, bound: u64) -> u64 {
        self.next() % bound
    }
}

/// A well-formed trace: every device goes down before it moves or lifts, and
/// everything lifts by the end.
fn generate_trace(seed: u64, len: usize) -> Vec<TouchEvent> {
    let mut rng = Lcg(seed);
    let mut events = Vec::new();
    let mut t: u32 = 0;
    let mut down: BTreeSet<i32> = BTreeSet::new();
    let mut pos = [(0i32, 0i32); 3];

    for _ in 0..len {
        t += 10 + rng.below(190) as u32;
        let choice = rng.below(10);
        if choice < 3 && down.len() < 3 {
            // a new finger lands
            let dev = (0..3).find(|d| !down.contains(d)).unwrap();
            let p = (rng.below(800) as i32, rng.below(800) as i32);
            pos[dev as usize] = p;
            down.insert(dev);
            events.push(TouchEvent::down(dev, p.0, p.1, t));
        } else if choice < 8 && !down.is_empty() {
            // an existing finger moves
            let devs: Vec<_> = down.iter().copied().collect();
            let dev = devs[rng.below(devs.len() as u64) as usize];
            let (x, y) = pos[dev as usize];
            let p = (
                x + rng.below(400) as i32 - 200,
                y + rng.below(400) as i32 - 200,
            );
            pos[dev as usize] = p;
            events.push(TouchEvent::moved(dev, p.0, p.1, t));
        } else if !down.is_empty() {
            // a finger lifts
            let devs: Vec<_> = down.iter().copied().collect();
            let dev = devs[rng.below(devs.len() as u64) as usize];
            down.remove(&dev);
            let (x, y) = pos[dev as usize];
            events.push(TouchEvent::up(dev, x, y, t));
        }
    }
    // everything lifts in the end
    for dev in down {
        t += 10 + rng.below(100) as u32;
        let (x, y) = pos[dev as usize];
        events.push(TouchEvent::up(dev, x, y, t));
    }
    events
}

fn drive(detector: &mut Detector, trace: &[TouchEvent]) {
    for event in trace {
        detector.run_timers(event.timestamp);
        detector.feed_touch(event);
    }
    while let Some(deadline) = detector.next_deadline() {
        detector.run_timers(deadline);
    }
}

/// Every emitted state sequence must walk
/// idle -> BEGIN -> CONTINUED* -> (ENDED | ABORTED) -> idle.
fn assert_valid_path(gesture: GestureType, states: &[GestureState]) {
    let mut prev: Option<GestureState> = None;
    for &st in states {
        let ok = match (prev, st) {
            (None, GestureState::Begin) => true,
            (Some(GestureState::Begin | GestureState::Continued), _) => {
                st != GestureState::Begin
            }
            (Some(GestureState::Ended | GestureState::Aborted), GestureState::Begin) => true,
            _ => false,
        };
        assert!(ok, "{gesture:?}: invalid transition {prev:?} -> {st:?} in {states:?}");
        prev = Some(st);
    }
}

#[test]
fn generated_traces_keep_the_state_machines_sound() {
    for seed in 0..40u64 {
        let trace = generate_trace(seed * 7 + 1, 60);
        let mut det = Detector::default();
        let logs: Vec<(GestureType, EventLog)> = RECOGNIZED
            .iter()
            .map(|&g| (g, recorder(&mut det, g, StateMask::all())))
            .collect();
        let filtered = recorder(
            &mut det,
            GestureType::SingleTap,
            StateMask::ENDED | StateMask::ABORTED,
        );

        drive(&mut det, &trace);

        // P1: with every finger lifted and all timers drained, nothing is
        // still mid-gesture
        for &g in &RECOGNIZED {
            let st = det.state(g);
            assert!(
                !matches!(st, Some(GestureState::Begin | GestureState::Continued)),
                "{g:?} left mid-gesture ({st:?}) by seed {seed}"
            );
        }

        // P4: every log walks the allowed path
        for (g, log) in &logs {
            assert_valid_path(*g, &states(log));
        }

        // P2: the masked listener only saw subscribed states
        for st in states(&filtered) {
            assert!(
                matches!(st, GestureState::Ended | GestureState::Aborted),
                "masked listener saw {st:?}"
            );
        }
    }
}

#[test]
fn payload_finger_counts_track_held_devices() {
    // P3 on single-round multi-finger traces: while a gesture is being
    // built up, every BEGIN/CONTINUED payload reports exactly the devices
    // currently held down.
    let traces: Vec<Vec<TouchEvent>> = vec![
        // two-finger tap
        vec![
            TouchEvent::down(0, 100, 100, 0),
            TouchEvent::down(1, 200, 100, 20),
            TouchEvent::up(0, 100, 100, 60),
            TouchEvent::up(1, 200, 100, 70),
        ],
        // three-finger swipe right
        vec![
            TouchEvent::down(0, 0, 0, 0),
            TouchEvent::down(1, 0, 100, 5),
            TouchEvent::down(2, 0, 200, 10),
            TouchEvent::moved(0, 80, 0, 40),
            TouchEvent::moved(1, 80, 100, 45),
            TouchEvent::moved(2, 80, 200, 50),
            TouchEvent::up(0, 80, 0, 80),
            TouchEvent::up(1, 80, 100, 85),
            TouchEvent::up(2, 80, 200, 90),
        ],
    ];

    for trace in traces {
        for gesture in [GestureType::SingleTap, GestureType::Flick] {
            let mut det = Detector::default();
            let log = recorder(&mut det, gesture, StateMask::BEGIN | StateMask::CONTINUED);

            let mut held = 0i32;
            let mut seen = 0usize;
            for event in &trace {
                match event.kind {
                    TouchKind::Down => held += 1,
                    TouchKind::Up => held -= 1,
                    TouchKind::Move => {}
                }
                det.run_timers(event.timestamp);
                det.feed_touch(event);
                let log = log.borrow();
                for emitted in &log[seen..] {
                    let n_fingers = match emitted.payload {
                        GesturePayload::Tap(t) => t.n_fingers,
                        GesturePayload::Flick(f) => f.n_fingers,
                        GesturePayload::None => panic!("payload missing"),
                    };
                    assert_eq!(
                        n_fingers, held,
                        "{gesture:?} {:?} reported {n_fingers} fingers with {held} held",
                        emitted.state
                    );
                }
                seen = log.len();
            }
        }
    }
}

#[test]
fn repeated_subscription_churn_with_traffic_is_clean() {
    // P5: activation/shutdown cycles under real traffic leave nothing behind
    let trace = generate_trace(99, 40);
    let mut det = Detector::default();
    for round in 0..50 {
        let extra: Vec<_> = RECOGNIZED
            .iter()
            .map(|&g| {
                det.add_listener(GestureListener::new(g, StateMask::all(), |_| {}))
            })
            .collect();
        let main: Vec<_> = RECOGNIZED
            .iter()
            .map(|&g| {
                det.add_listener(GestureListener::new(g, StateMask::all(), |_| {}))
            })
            .collect();

        for (i, event) in trace.iter().enumerate() {
            // dropping one of two listeners mid-trace keeps the context live
            if i == trace.len() / 2 {
                for &token in &extra {
                    assert!(det.remove_listener(token));
                }
            }
            det.run_timers(event.timestamp);
            det.feed_touch(event);
        }

        // dropping the last listener must cancel everything pending
        for &token in &main {
            assert!(det.remove_listener(token));
        }
        assert_eq!(det.next_deadline(), None, "round {round}");
        for &g in &RECOGNIZED {
            assert!(!det.is_active(g), "round {round}");
        }
    }
}
