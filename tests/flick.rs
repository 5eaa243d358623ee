//! Flick recognizer behavior driven through the public detector API.

mod common;

use common::{flick_payloads, recorder, states};
use gestured::detector::Detector;
use gestured::events::{GestureDirection, GestureState, GestureType, StateMask, TouchEvent};

#[test]
fn straight_swipe_right_completes() {
    let mut det = Detector::default();
    let log = recorder(&mut det, GestureType::Flick, StateMask::all());

    det.feed_touch(&TouchEvent::down(1, 0, 0, 0));
    det.feed_touch(&TouchEvent::moved(1, 50, 1, 50));
    det.feed_touch(&TouchEvent::moved(1, 100, 2, 80));
    det.feed_touch(&TouchEvent::up(1, 100, 2, 90));

    assert_eq!(
        states(&log),
        vec![
            GestureState::Begin,
            GestureState::Continued,
            GestureState::Continued,
            GestureState::Ended
        ]
    );
    let payloads = flick_payloads(&log);
    // before activation there is no displacement yet
    assert_eq!(payloads[0].direction, GestureDirection::Undefined);
    // activation happens once the line is at least 40 long
    assert_eq!(payloads[1].direction, GestureDirection::Right);
    assert_eq!((payloads[1].x1, payloads[1].y1), (0, 0));
    assert_eq!((payloads[1].x2, payloads[1].y2), (50, 1));
    let ended = payloads.last().unwrap();
    assert_eq!(ended.direction, GestureDirection::Right);
    assert_eq!((ended.x2, ended.y2), (100, 2));
    assert_eq!(ended.n_fingers, 1);
    assert_eq!(det.state(GestureType::Flick), Some(GestureState::Ended));
}

#[test]
fn cardinal_directions_follow_the_mean_displacement() {
    for (dx, dy, expected) in [
        (100, 3, GestureDirection::Right),
        (-100, 3, GestureDirection::Left),
        (3, 100, GestureDirection::Up),
        (3, -100, GestureDirection::Down),
    ] {
        let mut det = Detector::default();
        let log = recorder(&mut det, GestureType::Flick, StateMask::ENDED);
        det.feed_touch(&TouchEvent::down(1, 500, 500, 0));
        det.feed_touch(&TouchEvent::moved(1, 500 + dx, 500 + dy, 60));
        det.feed_touch(&TouchEvent::up(1, 500 + dx, 500 + dy, 80));
        let payloads = flick_payloads(&log);
        assert_eq!(payloads.len(), 1, "{dx},{dy}");
        assert_eq!(payloads[0].direction, expected, "{dx},{dy}");
    }
}

#[test]
fn slow_line_aborts_after_time_limit() {
    let mut det = Detector::default();
    let log = recorder(&mut det, GestureType::Flick, StateMask::all());

    det.feed_touch(&TouchEvent::down(1, 0, 0, 0));
    det.feed_touch(&TouchEvent::moved(1, 50, 0, 50));
    det.feed_touch(&TouchEvent::moved(1, 100, 0, 200));

    assert_eq!(
        states(&log),
        vec![
            GestureState::Begin,
            GestureState::Continued,
            GestureState::Aborted
        ]
    );

    det.feed_touch(&TouchEvent::up(1, 100, 0, 210));
    assert_eq!(states(&log).len(), 3);
    assert_eq!(det.state(GestureType::Flick), None);
}

#[test]
fn bent_line_aborts() {
    let mut det = Detector::default();
    let log = recorder(&mut det, GestureType::Flick, StateMask::all());

    det.feed_touch(&TouchEvent::down(1, 0, 0, 0));
    det.feed_touch(&TouchEvent::moved(1, 100, 0, 30));
    // 45 degrees off the initial heading
    det.feed_touch(&TouchEvent::moved(1, 100, 100, 60));

    assert_eq!(
        states(&log),
        vec![
            GestureState::Begin,
            GestureState::Continued,
            GestureState::Aborted
        ]
    );
}

#[test]
fn overlong_line_aborts() {
    let mut det = Detector::default();
    let log = recorder(&mut det, GestureType::Flick, StateMask::all());

    det.feed_touch(&TouchEvent::down(1, 0, 0, 0));
    det.feed_touch(&TouchEvent::moved(1, 100, 0, 30));
    det.feed_touch(&TouchEvent::moved(1, 900, 0, 60));

    assert_eq!(
        states(&log),
        vec![
            GestureState::Begin,
            GestureState::Continued,
            GestureState::Aborted
        ]
    );
}

#[test]
fn lift_without_activation_aborts() {
    let mut det = Detector::default();
    let log = recorder(&mut det, GestureType::Flick, StateMask::all());

    det.feed_touch(&TouchEvent::down(1, 0, 0, 0));
    det.feed_touch(&TouchEvent::moved(1, 10, 0, 30));
    det.feed_touch(&TouchEvent::up(1, 10, 0, 50));

    assert_eq!(
        states(&log),
        vec![GestureState::Begin, GestureState::Aborted]
    );
}

#[test]
fn two_finger_swipe_tracks_both_lines() {
    let mut det = Detector::default();
    let log = recorder(&mut det, GestureType::Flick, StateMask::all());

    det.feed_touch(&TouchEvent::down(1, 0, 0, 0));
    det.feed_touch(&TouchEvent::down(2, 0, 100, 5));
    det.feed_touch(&TouchEvent::moved(1, 60, 0, 40));
    det.feed_touch(&TouchEvent::moved(2, 60, 100, 45));
    det.feed_touch(&TouchEvent::up(1, 60, 0, 80));
    det.feed_touch(&TouchEvent::up(2, 60, 100, 85));

    assert_eq!(
        states(&log),
        vec![
            GestureState::Begin,
            GestureState::Continued,
            GestureState::Continued,
            GestureState::Ended
        ]
    );
    let ended = *flick_payloads(&log).last().unwrap();
    assert_eq!(ended.n_fingers, 2);
    assert_eq!(ended.direction, GestureDirection::Right);
    assert_eq!((ended.x1, ended.y1), (0, 50));
    assert_eq!((ended.x2, ended.y2), (60, 50));
}

#[test]
fn moves_for_unknown_devices_are_ignored() {
    let mut det = Detector::default();
    let log = recorder(&mut det, GestureType::Flick, StateMask::all());

    det.feed_touch(&TouchEvent::moved(9, 100, 100, 10));
    det.feed_touch(&TouchEvent::up(9, 100, 100, 20));
    assert!(log.borrow().is_empty());
    assert_eq!(det.state(GestureType::Flick), None);
}
