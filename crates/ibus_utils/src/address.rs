use std::env;
use std::fs;
use std::io;
use std::path::PathBuf;

use log::warn;
use thiserror::Error;
use zbus::Address;

#[derive(Debug, Error)]
pub enum AddressError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("invalid bus address: {0}")]
    Bus(#[from] zbus::Error),
    #[error("cannot parse DISPLAY value {0:?}")]
    Display(String),
    #[error("no IBUS_ADDRESS entry in {0:?}")]
    Missing(PathBuf),
    #[error("neither XDG_CONFIG_HOME nor HOME is set")]
    NoConfigDir,
}

/// Locate the address of the running ibus-daemon.
///
/// `IBUS_ADDRESS` wins; otherwise the address file the daemon writes for the
/// current display is read.
pub fn get_ibus_address() -> Result<Address, AddressError> {
    if let Ok(address) = env::var("IBUS_ADDRESS") {
        if !address.is_empty() {
            return Ok(address.as_str().try_into()?);
        }
    }

    let path = get_socket_path()?;
    let data = fs::read_to_string(&path)?;
    let address = address_from_file(&data).ok_or(AddressError::Missing(path))?;
    Ok(address.try_into()?)
}

/// The last `IBUS_ADDRESS=` line of an ibus address file.
fn address_from_file(data: &str) -> Option<&str> {
    data.lines()
        .filter_map(|line| line.strip_prefix("IBUS_ADDRESS="))
        .filter(|addr| !addr.is_empty())
        .last()
}

fn get_socket_path() -> Result<PathBuf, AddressError> {
    if let Ok(path) = env::var("IBUS_ADDRESS_FILE") {
        if !path.is_empty() {
            return Ok(PathBuf::from(path));
        }
    }

    let wayland_display = env::var("WAYLAND_DISPLAY").ok().filter(|v| !v.is_empty());
    let display = env::var("DISPLAY").ok().filter(|v| !v.is_empty());
    let (hostname, display_number) = match (&wayland_display, &display) {
        (Some(wayland), _) => ("unix", wayland.as_str()),
        (None, Some(display)) => {
            let (hostname, number) = parse_display_string(display)
                .ok_or_else(|| AddressError::Display(display.clone()))?;
            (if hostname.is_empty() { "unix" } else { hostname }, number)
        }
        (None, None) => {
            warn!("DISPLAY is empty! We use default DISPLAY (:0.0)");
            ("unix", "0")
        }
    };

    let machine_id = get_machine_id()?;
    Ok(get_user_config_dir()?.join(format!(
        "ibus/bus/{}-{}-{}",
        machine_id, hostname, display_number
    )))
}

/// Parse a string of the format "{hostname}:{displaynumber}[.{screennumber}]".
fn parse_display_string(s: &str) -> Option<(&str, &str)> {
    let (hostname, display_screen) = s.split_once(':')?;
    let display_number = match display_screen.split_once('.') {
        Some((number, _screen)) => number,
        None => display_screen,
    };
    if display_number.is_empty() {
        return None;
    }
    Some((hostname, display_number))
}

fn get_machine_id() -> io::Result<String> {
    let id = match fs::read_to_string("/var/lib/dbus/machine-id") {
        Ok(id) => id,
        Err(_) => fs::read_to_string("/etc/machine-id")?,
    };
    Ok(id.trim().to_owned())
}

fn get_user_config_dir() -> Result<PathBuf, AddressError> {
    match env::var("XDG_CONFIG_HOME") {
        Ok(val) if !val.is_empty() => Ok(PathBuf::from(val)),
        _ => env::var("HOME")
            .map(|home| PathBuf::from(home).join(".config"))
            .map_err(|_| AddressError::NoConfigDir),
    }
}
