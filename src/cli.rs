use anyhow::{Result, anyhow};
use log::warn;
use pico_args::Arguments;
use std::io::BufRead;
use std::{env, process::Command};

use crate::config::{GestureConfig, ProfileStore};
use crate::detector::{Detector, GestureListener};
use crate::events::{GestureType, StateMask, TouchEvent};
use crate::ipc;

pub fn run() -> Result<()> {
    let mut pargs = Arguments::from_env();

    // Hidden daemon mode (spawned by `start`)
    if pargs.contains("--daemon") {
        return ipc::run_daemon();
    }

    // No args -> general help
    if env::args().len() == 1 {
        print_help();
        return Ok(());
    }

    if pargs.contains("-h") || pargs.contains("--help") {
        print_help();
        return Ok(());
    }

    // First free arg is the subcommand
    let subcmd: Option<String> = pargs.free_from_str().ok();

    match subcmd.as_deref() {
        Some("help") => {
            let topic: Option<String> = pargs.free_from_str().ok();
            if let Some(t) = topic {
                print_subcmd_help(&t);
            } else {
                print_help();
            }
            Ok(())
        }

        Some("start") => {
            let exe = std::env::current_exe()?;
            let child = Command::new(exe).arg("--daemon").spawn()?;
            println!("gestured: started daemon (pid={})", child.id());
            Ok(())
        }

        Some("stop") => {
            let r = ipc::client_request(serde_json::json!({"op":"shutdown"}))?;
            print_response(&r);
            Ok(())
        }

        Some("status") => {
            let r = ipc::client_request(serde_json::json!({"op":"status"}))?;
            print_response(&r);
            Ok(())
        }

        Some("reload") => {
            let r = ipc::client_request(serde_json::json!({"op":"reload"}))?;
            print_response(&r);
            Ok(())
        }

        Some("use") => {
            let name: String = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: gestured use <profile_name>"))?;
            let r = ipc::client_request(serde_json::json!({"op":"use","profile":name}))?;
            print_response(&r);
            Ok(())
        }

        Some("list") => {
            let r = ipc::client_request(serde_json::json!({"op":"list"}))?;
            print_response(&r);
            Ok(())
        }

        Some("doctor") => {
            let r = ipc::client_request(serde_json::json!({"op":"doctor"}))?;
            print_response(&r);
            Ok(())
        }

        Some("watch") => {
            let reader = ipc::client_subscribe()?;
            for line in reader.lines() {
                println!("{}", line?);
            }
            Ok(())
        }

        Some("replay") => {
            let path: String = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: gestured replay <trace.json>"))?;
            replay(&path)
        }

        Some(other) => {
            eprintln!("unknown subcommand: {other}\n");
            print_help();
            Ok(())
        }

        None => {
            print_help();
            Ok(())
        }
    }
}

/// Feed a recorded touch trace through a fresh detector and print every
/// emission as a JSON line. Runs offline; no daemon needed.
fn replay(path: &str) -> Result<()> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read {path}: {e}"))?;
    let mut events: Vec<TouchEvent> =
        serde_json::from_str(&text).map_err(|e| anyhow!("failed to parse {path}: {e}"))?;
    events.sort_by_key(|e| e.timestamp);

    let config = match ProfileStore::load_or_install_default() {
        Ok(store) => store.profile.gestures,
        Err(e) => {
            warn!("using built-in thresholds: {e}");
            GestureConfig::default()
        }
    };

    let mut detector = Detector::new(config);
    for gesture in [
        GestureType::SingleTap,
        GestureType::DoubleTap,
        GestureType::TripleTap,
        GestureType::Flick,
        GestureType::FlickReturn,
    ] {
        detector.add_listener(GestureListener::new(gesture, StateMask::all(), |ev| {
            if let Ok(line) = serde_json::to_string(ev) {
                println!("{line}");
            }
        }));
    }

    for event in &events {
        detector.run_timers(event.timestamp);
        detector.feed_touch(event);
    }
    // drain pending timeouts so trailing taps settle
    while let Some(deadline) = detector.next_deadline() {
        detector.run_timers(deadline);
    }
    Ok(())
}

fn print_help() {
    println!(
        r#"gestured — touch gesture recognition daemon

USAGE:
  gestured help [command]        Show general or command-specific help
  gestured start                 Start the daemon
  gestured stop                  Stop the daemon
  gestured status                Show daemon state
  gestured reload                Reload active profile
  gestured use <name>            Switch active profile
  gestured list                  List profiles
  gestured doctor                Diagnose permissions/devices
  gestured watch                 Stream recognized gestures as JSON lines
  gestured replay <trace.json>   Replay a recorded touch trace offline

TIPS:
  - Profiles: ~/.config/gestured/profiles
  - Active profile pointer: ~/.config/gestured/active
  - Traces are JSON arrays of touch events:
    [{{"device":1,"pos":{{"x":100,"y":100}},"kind":"down","timestamp":0}}, ...]
"#
    );
}

fn print_subcmd_help(cmd: &str) {
    match cmd {
        "start" => println!("usage: gestured start\nStarts the background daemon."),
        "stop" => println!("usage: gestured stop\nStops the running daemon."),
        "status" => println!(
            "usage: gestured status\nShows enabled flag, active profile, devices, socket."
        ),
        "reload" => println!(
            "usage: gestured reload\nReloads the current profile; keeps last good on error."
        ),
        "use" => {
            println!("usage: gestured use <name>\nSwitches active profile to <name> and reloads.")
        }
        "list" => {
            println!("usage: gestured list\nLists available profiles; shows the active one.")
        }
        "doctor" => println!(
            "usage: gestured doctor\nChecks permissions and lists detected multitouch devices."
        ),
        "watch" => println!(
            "usage: gestured watch\nSubscribes to the running daemon and prints one JSON line per gesture event."
        ),
        "replay" => println!(
            "usage: gestured replay <trace.json>\nFeeds a recorded touch trace through the recognizers offline."
        ),
        _ => {
            eprintln!("unknown command: {cmd}\n");
            print_help();
        }
    }
}

fn print_response(v: &serde_json::Value) {
    println!("{}", serde_json::to_string_pretty(v).unwrap_or_default());
}
