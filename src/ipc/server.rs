use anyhow::Result;
use log::{error, info, warn};
use std::{
    io::{BufRead, BufReader, Write},
    os::unix::net::{UnixListener, UnixStream},
    path::PathBuf,
    sync::Arc,
    sync::mpsc::Sender,
    thread,
    time::Duration,
};

use notify::Watcher;

use super::pipeline::{ConfigCell, run_pipeline};
use super::socket_path;
use crate::config::ProfileStore;
use crate::events::GestureEvent;

pub(crate) enum IpcMsg {
    Reload,
    UseProfile(String),
    Subscribe(UnixStream),
    Shutdown,
}

pub enum DaemonEvent {
    Gesture(GestureEvent),
}

pub fn run_daemon() -> Result<()> {
    // socket
    let sock = socket_path();
    if sock.exists() {
        let _ = std::fs::remove_file(&sock);
    }
    let listener = UnixListener::bind(&sock)?;
    info!("daemon: listening on {}", sock.display());

    // state
    let mut state = DaemonState::new()?;
    info!("daemon: active profile '{}'", state.store.active_name);

    // channels
    let (tx_req, rx_req) = std::sync::mpsc::channel::<IpcMsg>();
    let (tx_evt, rx_evt) = std::sync::mpsc::channel::<DaemonEvent>();

    // SIGINT/SIGTERM → orderly shutdown
    {
        let tx = tx_req.clone();
        let mut signals = signal_hook::iterator::Signals::new([
            signal_hook::consts::SIGINT,
            signal_hook::consts::SIGTERM,
        ])?;
        thread::spawn(move || {
            if signals.forever().next().is_some() {
                let _ = tx.send(IpcMsg::Shutdown);
            }
        });
    }

    // edits under the profiles dir reload the active profile
    let _watcher = watch_profiles(state.store.profiles_dir.clone(), tx_req.clone());

    // gesture pipeline thread
    let config = Arc::new(ConfigCell::new(state.store.profile.gestures));
    {
        let config = config.clone();
        let device_allow = state.store.profile.devices.allow.clone();
        let tx_evt = tx_evt.clone();
        thread::spawn(move || {
            if let Err(e) = run_pipeline(config, device_allow, tx_evt) {
                error!("gesture pipeline failed: {e}");
            }
        });
    }

    let mut subscribers: Vec<UnixStream> = Vec::new();

    // accept loop
    listener.set_nonblocking(true)?;
    loop {
        if let Ok((stream, _)) = listener.accept() {
            let tx = tx_req.clone();
            let snapshot = state.clone_shallow();
            thread::spawn(move || {
                if let Err(e) = handle_client(stream, snapshot, tx) {
                    error!("ipc client error: {e}");
                }
            });
        }

        while let Ok(evt) = rx_evt.try_recv() {
            match evt {
                DaemonEvent::Gesture(event) => {
                    info!(
                        "gesture: {:?} {:?} @{}",
                        event.gesture, event.state, event.timestamp
                    );
                    if let Ok(line) = serde_json::to_string(&event) {
                        subscribers.retain_mut(|s| writeln!(s, "{line}").is_ok());
                    }
                }
            }
        }

        while let Ok(msg) = rx_req.try_recv() {
            match msg {
                IpcMsg::Reload => {
                    if let Err(e) = state.store.reload() {
                        error!("reload failed: {e}");
                    } else {
                        config.store(state.store.profile.gestures);
                        info!("profile reloaded");
                    }
                }
                IpcMsg::UseProfile(name) => {
                    if let Err(e) = state.store.set_active(&name) {
                        error!("use profile failed: {e}");
                    } else {
                        config.store(state.store.profile.gestures);
                        info!("switched active profile to {}", state.store.active_name);
                    }
                }
                IpcMsg::Subscribe(stream) => {
                    subscribers.push(stream);
                }
                IpcMsg::Shutdown => {
                    info!("daemon: shutting down");
                    let _ = std::fs::remove_file(&sock);
                    return Ok(());
                }
            }
        }

        thread::sleep(Duration::from_millis(5));
    }
}

fn watch_profiles(dir: PathBuf, tx: Sender<IpcMsg>) -> Option<notify::RecommendedWatcher> {
    let mut watcher =
        notify::recommended_watcher(move |res: Result<notify::Event, notify::Error>| {
            if res.is_ok() {
                let _ = tx.send(IpcMsg::Reload);
            }
        })
        .ok()?;
    if let Err(e) = watcher.watch(&dir, notify::RecursiveMode::NonRecursive) {
        warn!("profile watcher disabled: {e}");
        return None;
    }
    Some(watcher)
}

fn handle_client(mut stream: UnixStream, st: DaemonState, tx_req: Sender<IpcMsg>) -> Result<()> {
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut line = String::new();
    reader.read_line(&mut line)?;
    if line.trim().is_empty() {
        return Ok(());
    }
    let req: serde_json::Value = serde_json::from_str(&line)?;
    let op = req.get("op").and_then(|v| v.as_str()).unwrap_or("");

    let resp = match op {
        "status" => serde_json::json!({"ok": true, "data": {
            "enabled": st.enabled,
            "active_profile": st.store.active_name,
            "socket": socket_path(),
            "devices": st.store.detected_devices,
        }}),
        "reload" => {
            let _ = tx_req.send(IpcMsg::Reload);
            serde_json::json!({"ok": true, "data": {"active_profile": st.store.active_name}})
        }
        "use" => {
            let name = req.get("profile").and_then(|v| v.as_str()).unwrap_or("");
            let _ = tx_req.send(IpcMsg::UseProfile(name.to_string()));
            serde_json::json!({"ok": true, "data": {"active_profile": name}})
        }
        "list" => {
            let list = st.store.list_profiles();
            serde_json::json!({"ok": true, "data": {"profiles": list, "active": st.store.active_name}})
        }
        "doctor" => {
            let report = st.store.doctor_report();
            serde_json::json!({"ok": true, "data": report})
        }
        "watch" => {
            // acknowledge, then hand the stream over for gesture broadcast
            write!(stream, "{}\n", serde_json::json!({"ok": true, "data": "subscribed"}))?;
            let _ = tx_req.send(IpcMsg::Subscribe(stream));
            return Ok(());
        }
        "shutdown" => {
            let _ = tx_req.send(IpcMsg::Shutdown);
            serde_json::json!({"ok": true, "data": "shutting down"})
        }
        _ => serde_json::json!({"ok": false, "error": format!("unknown op: {op}")}),
    };

    write!(stream, "{}\n", resp)?;
    Ok(())
}

struct DaemonState {
    pub enabled: bool,
    pub store: ProfileStore,
}

impl DaemonState {
    fn new() -> Result<Self> {
        let store = ProfileStore::load_or_install_default()?;
        Ok(Self {
            enabled: true,
            store,
        })
    }
    fn clone_shallow(&self) -> Self {
        Self {
            enabled: self.enabled,
            store: self.store.clone(),
        }
    }
}

// client helpers

pub fn client_request(req: serde_json::Value) -> Result<serde_json::Value> {
    let sock = socket_path();
    if !sock.exists() {
        return Err(anyhow::anyhow!(
            "gestured daemon is not running (socket missing at {})",
            sock.display()
        ));
    }
    let mut stream = UnixStream::connect(sock)?;
    let line = serde_json::to_string(&req)? + "\n";
    stream.write_all(line.as_bytes())?;
    let mut reader = BufReader::new(stream);
    let mut resp = String::new();
    reader.read_line(&mut resp)?;
    let v: serde_json::Value = serde_json::from_str(&resp)?;
    Ok(v)
}

/// Subscribe to the gesture stream; returns a reader over JSON lines, one per
/// recognized gesture event.
pub fn client_subscribe() -> Result<BufReader<UnixStream>> {
    let sock = socket_path();
    if !sock.exists() {
        return Err(anyhow::anyhow!(
            "gestured daemon is not running (socket missing at {})",
            sock.display()
        ));
    }
    let mut stream = UnixStream::connect(sock)?;
    stream.write_all(b"{\"op\":\"watch\"}\n")?;
    let mut reader = BufReader::new(stream);
    let mut ack = String::new();
    reader.read_line(&mut ack)?;
    Ok(reader)
}
