use anyhow::{Result, anyhow};
use directories::UserDirs;
use log::info;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    io::Write,
    path::PathBuf,
};

use crate::tracker;

/// Tap recognizer thresholds. Timeouts are per variant; `finger_size` is the
/// radius within which a later down counts as the same spot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TapThresholds {
    pub single_timeout_ms: u32,
    pub double_timeout_ms: u32,
    pub triple_timeout_ms: u32,
    pub finger_size: u32,
}

impl Default for TapThresholds {
    fn default() -> Self {
        Self {
            single_timeout_ms: 250,
            double_timeout_ms: 350,
            triple_timeout_ms: 850,
            finger_size: 80,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlickThresholds {
    pub min_length: u32,
    pub max_length: u32,
    pub angle_tolerance: f64,
    pub time_limit_ms: u32,
}

impl Default for FlickThresholds {
    fn default() -> Self {
        Self {
            min_length: 40,
            max_length: 800,
            angle_tolerance: 20.0,
            time_limit_ms: 150,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlickReturnThresholds {
    pub max_time_ms: u32,
    pub min_forward_length: u32,
    pub finger_size: u32,
    pub forward_tolerance: f64,
    pub inflection_tolerance: f64,
    pub return_tolerance: f64,
}

impl Default for FlickReturnThresholds {
    fn default() -> Self {
        Self {
            max_time_ms: 600,
            min_forward_length: 90,
            finger_size: 80,
            forward_tolerance: 20.0,
            inflection_tolerance: 80.0,
            return_tolerance: 25.0,
        }
    }
}

/// Everything the detector needs to build its recognizers. Defaults match the
/// service's documented constants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GestureConfig {
    pub tap: TapThresholds,
    pub flick: FlickThresholds,
    pub flick_return: FlickReturnThresholds,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Meta {
    pub name: Option<String>,
}

/// Which multitouch devices the daemon reads. Patterns are matched as
/// substrings of the device name or path; an empty list admits every device.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DeviceFilter {
    pub allow: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Profile {
    pub meta: Meta,
    pub devices: DeviceFilter,
    pub gestures: GestureConfig,
}

#[derive(Debug, Clone)]
pub struct ProfileStore {
    pub active_name: String,
    pub profile: Profile,
    pub config_dir: PathBuf,
    pub profiles_dir: PathBuf,
    pub active_ptr: PathBuf,
    pub detected_devices: Vec<String>,
}

fn home_dir() -> PathBuf {
    UserDirs::new()
        .map(|d| d.home_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

fn config_dir() -> PathBuf {
    home_dir().join(".config").join("gestured")
}

/// Runtime state (the daemon's control socket) lives here. Resolved from the
/// same home lookup as the config directories.
pub fn runtime_dir() -> PathBuf {
    let dir = home_dir().join(".local").join("run");
    let _ = fs::create_dir_all(&dir);
    dir
}

fn profiles_dir() -> PathBuf {
    config_dir().join("profiles")
}

fn active_ptr_path() -> PathBuf {
    config_dir().join("active")
}

fn default_profile_text() -> &'static str {
    include_str!("../profiles/default.toml")
}

impl ProfileStore {
    pub fn load_or_install_default() -> Result<Self> {
        let cfgdir = config_dir();
        let profdir = profiles_dir();
        fs::create_dir_all(&profdir)?;

        let def_path = profdir.join("default.toml");
        if !def_path.exists() {
            fs::write(&def_path, default_profile_text())?;
            info!("installed default profile at {}", def_path.display());
        }

        let active_ptr = active_ptr_path();
        if !active_ptr.exists() {
            let mut f = fs::File::create(&active_ptr)?;
            f.write_all(b"default")?;
        }

        let active_name = fs::read_to_string(&active_ptr)?.trim().to_string();
        let profile = Self::load_profile(&active_name)?;
        let detected_devices = tracker::enumerate(&profile.devices.allow);

        Ok(Self {
            active_name,
            profile,
            config_dir: cfgdir,
            profiles_dir: profdir,
            active_ptr,
            detected_devices,
        })
    }

    pub fn reload(&mut self) -> Result<()> {
        self.profile = Self::load_profile(&self.active_name)?;
        Ok(())
    }

    pub fn set_active(&mut self, name: &str) -> Result<()> {
        let p = self.profiles_dir.join(format!("{name}.toml"));
        if !p.exists() {
            return Err(anyhow!("profile not found: {}", p.display()));
        }
        fs::write(&self.active_ptr, name.as_bytes())?;
        self.active_name = name.to_string();
        self.reload()?;
        Ok(())
    }

    pub fn list_profiles(&self) -> Vec<String> {
        let mut v = Vec::new();
        if let Ok(rd) = fs::read_dir(&self.profiles_dir) {
            for e in rd.flatten() {
                if let Some(ext) = e.path().extension() {
                    if ext == "toml" {
                        if let Some(stem) = e.path().file_stem().and_then(|s| s.to_str()) {
                            v.push(stem.to_string());
                        }
                    }
                }
            }
        }
        v.sort();
        v
    }

    fn load_profile(name: &str) -> Result<Profile> {
        let path = profiles_dir().join(format!("{name}.toml"));
        let txt = fs::read_to_string(&path)
            .map_err(|e| anyhow!("failed to read {}: {e}", path.display()))?;
        let profile: Profile =
            toml::from_str(&txt).map_err(|e| anyhow!("failed to parse {}: {e}", path.display()))?;
        validate_profile(&profile)?;
        Ok(profile)
    }

    pub fn doctor_report(&self) -> serde_json::Value {
        let in_input_group = check_in_input_group();
        let a11y_bus_dir = std::env::var_os("XDG_RUNTIME_DIR")
            .map(|d| PathBuf::from(d).join("at-spi"))
            .filter(|p| p.exists());
        serde_json::json!({
            "user": whoami::username(),
            "input_group_member": in_input_group,
            "a11y_bus_dir": a11y_bus_dir,
            "profiles_dir": self.profiles_dir,
            "active_profile": self.active_name,
            "devices": self.detected_devices,
            "hints": {
                "add_user_to_input_group": "sudo usermod -aG input $USER && newgrp input"
            }
        })
    }
}

pub fn validate_profile(p: &Profile) -> Result<()> {
    for pat in &p.devices.allow {
        if pat.trim().is_empty() {
            return Err(anyhow!("devices.allow entries must not be empty"));
        }
    }
    let g = &p.gestures;
    if g.tap.single_timeout_ms == 0 || g.tap.double_timeout_ms == 0 || g.tap.triple_timeout_ms == 0
    {
        return Err(anyhow!("tap timeouts must be positive durations"));
    }
    if g.tap.finger_size == 0 {
        return Err(anyhow!("tap.finger_size must be positive"));
    }
    if g.flick.min_length == 0 || g.flick.max_length <= g.flick.min_length {
        return Err(anyhow!(
            "flick line lengths must satisfy 0 < min_length < max_length"
        ));
    }
    if g.flick.time_limit_ms == 0 {
        return Err(anyhow!("flick.time_limit_ms must be positive"));
    }
    if !(0.0..=180.0).contains(&g.flick.angle_tolerance) {
        return Err(anyhow!("flick.angle_tolerance must be within [0, 180] degrees"));
    }
    if g.flick_return.max_time_ms == 0 {
        return Err(anyhow!("flick_return.max_time_ms must be positive"));
    }
    if g.flick_return.min_forward_length == 0 || g.flick_return.finger_size == 0 {
        return Err(anyhow!("flick_return lengths must be positive"));
    }
    for (name, tol) in [
        ("forward_tolerance", g.flick_return.forward_tolerance),
        ("inflection_tolerance", g.flick_return.inflection_tolerance),
        ("return_tolerance", g.flick_return.return_tolerance),
    ] {
        if !(0.0..=180.0).contains(&tol) {
            return Err(anyhow!(
                "flick_return.{name} must be within [0, 180] degrees"
            ));
        }
    }
    Ok(())
}

fn check_in_input_group() -> bool {
    if let Ok(s) = fs::read_to_string("/etc/group") {
        let user = whoami::username();
        for line in s.lines() {
            if line.starts_with("input:") {
                if line
                    .split(':')
                    .nth(3)
                    .unwrap_or("")
                    .split(',')
                    .any(|u| u == user)
                {
                    return true;
                }
            }
        }
    }
    false
}
