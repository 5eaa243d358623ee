use anyhow::Result;
use log::{info, warn};
use std::sync::Mutex;
use std::sync::mpsc::Sender;
use std::{sync::Arc, thread, time::Duration};

use super::server::DaemonEvent;
use crate::config::GestureConfig;
use crate::detector::{Detector, GestureListener};
use crate::events::{GestureType, StateMask};
use crate::tracker::TouchSource;

/// Shared, hot-reloadable thresholds. The generation counter tells the
/// pipeline when to rebuild its detector.
#[derive(Debug)]
pub struct ConfigCell {
    inner: Mutex<(GestureConfig, u64)>,
}

impl ConfigCell {
    pub fn new(config: GestureConfig) -> Self {
        Self {
            inner: Mutex::new((config, 0)),
        }
    }

    pub fn store(&self, config: GestureConfig) {
        let mut guard = self.inner.lock().unwrap();
        guard.0 = config;
        guard.1 += 1;
    }

    pub fn load(&self) -> (GestureConfig, u64) {
        *self.inner.lock().unwrap()
    }
}

const RECOGNIZED: [GestureType; 5] = [
    GestureType::SingleTap,
    GestureType::DoubleTap,
    GestureType::TripleTap,
    GestureType::Flick,
    GestureType::FlickReturn,
];

fn build_detector(config: GestureConfig, tx_evt: &Sender<DaemonEvent>) -> Detector {
    let mut detector = Detector::new(config);
    for gesture in RECOGNIZED {
        let tx = tx_evt.clone();
        detector.add_listener(GestureListener::new(gesture, StateMask::all(), move |ev| {
            let _ = tx.send(DaemonEvent::Gesture(ev.clone()));
        }));
    }
    detector
}

pub fn run_pipeline(
    config: Arc<ConfigCell>,
    device_allow: Vec<String>,
    tx_evt: Sender<DaemonEvent>,
) -> Result<()> {
    let mut source = TouchSource::open(&device_allow);
    if source.is_empty() {
        warn!("no multitouch devices admitted; pipeline idle");
        loop {
            thread::sleep(Duration::from_secs(1));
        }
    }
    for label in source.labels() {
        info!("pipeline: reading {label}");
    }

    let (mut thresholds, mut generation) = config.load();
    let mut detector = build_detector(thresholds, &tx_evt);

    loop {
        // pick up hot-reloaded thresholds between frames
        let (new_thresholds, new_generation) = config.load();
        if new_generation != generation {
            generation = new_generation;
            thresholds = new_thresholds;
            detector = build_detector(thresholds, &tx_evt);
            info!("pipeline: thresholds reloaded");
        }

        let frame = source.poll();
        let any_event = !frame.is_empty();
        for touch in frame {
            detector.run_timers(touch.timestamp);
            detector.feed_touch(&touch);
        }

        // tap timeouts expire on the wall clock even when fingers are still
        detector.run_timers(source.now_ms());

        if !any_event {
            thread::sleep(Duration::from_millis(4));
        }
    }
}
