//! Registry access for a bottle, delegated to Wine's `reg` command. The
//! registry itself stays Wine's business; this module only builds command
//! lines and picks values out of `reg query` output.

use anyhow::anyhow;
use log::debug;

use crate::bottle::Bottle;
use crate::error::ConvergeError;
use crate::wine::WineRunner;

pub const CURRENT_VERSION_KEY: &str = r"HKLM\Software\Microsoft\Windows NT\CurrentVersion";
const MAC_DRIVER_KEY: &str = r"HKCU\Software\Wine\Mac Driver";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryType {
    String,
    Dword,
    Binary,
    MultiString,
}

impl RegistryType {
    #[must_use]
    pub fn wire_name(self) -> &'static str {
        match self {
            Self::String => "REG_SZ",
            Self::Dword => "REG_DWORD",
            Self::Binary => "REG_BINARY",
            Self::MultiString => "REG_MULTI_SZ",
        }
    }
}

impl std::str::FromStr for RegistryType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "string" | "REG_SZ" => Ok(Self::String),
            "dword" | "REG_DWORD" => Ok(Self::Dword),
            "binary" | "REG_BINARY" => Ok(Self::Binary),
            "multi-string" | "REG_MULTI_SZ" => Ok(Self::MultiString),
            _ => Err(anyhow!("unknown registry value type")),
        }
    }
}

/// Reads a registry value, `None` when the query output carries no value of
/// the expected type.
pub fn value(
    runner: &WineRunner,
    bottle: &Bottle,
    key: &str,
    name: &str,
    value_type: RegistryType,
) -> Result<Option<String>, ConvergeError> {
    let output = runner.run(["reg", "query", key, "-v", name], Some(bottle))?;
    debug!("registry query output: {output}");
    Ok(parse_query_output(&output, value_type))
}

pub fn set_value(
    runner: &WineRunner,
    bottle: &Bottle,
    key: &str,
    name: &str,
    value: &str,
    value_type: RegistryType,
) -> Result<(), ConvergeError> {
    runner.run(
        [
            "reg",
            "add",
            key,
            "-v",
            name,
            "-t",
            value_type.wire_name(),
            "-d",
            value,
            "-f",
        ],
        Some(bottle),
    )?;
    Ok(())
}

// The value is the last whitespace-separated token of the first line carrying
// the expected type name, so values containing whitespace come back truncated
// to their final word.
fn parse_query_output(output: &str, value_type: RegistryType) -> Option<String> {
    let line = output
        .lines()
        .find(|line| line.contains(value_type.wire_name()))?;
    line.split_whitespace().last().map(str::to_owned)
}

/// Windows versions a bottle can report to its programs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowsVersion {
    Windows10,
    Windows81,
    Windows8,
    Windows7,
    WindowsVista,
    WindowsXp,
    Windows2000,
}

impl WindowsVersion {
    #[must_use]
    pub fn version(self) -> &'static str {
        match self {
            Self::Windows10 => "10.0",
            Self::Windows81 => "6.3",
            Self::Windows8 => "6.2",
            Self::Windows7 => "6.1",
            Self::WindowsVista => "6.0",
            Self::WindowsXp => "5.1",
            Self::Windows2000 => "5.0",
        }
    }
}

impl std::str::FromStr for WindowsVersion {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "10" | "11" => Ok(Self::Windows10),
            "8.1" => Ok(Self::Windows81),
            "8" => Ok(Self::Windows8),
            "7" => Ok(Self::Windows7),
            "vista" => Ok(Self::WindowsVista),
            "xp" => Ok(Self::WindowsXp),
            "2000" => Ok(Self::Windows2000),
            _ => Err(anyhow!("unknown windows version")),
        }
    }
}

/// Writes the version triple programs read from `CurrentVersion`.
pub fn set_windows_version(
    runner: &WineRunner,
    bottle: &Bottle,
    version: WindowsVersion,
) -> Result<(), ConvergeError> {
    let v = version.version();
    let (major, minor) = v.split_once('.').unwrap_or((v, ""));

    set_value(
        runner,
        bottle,
        CURRENT_VERSION_KEY,
        "CurrentVersion",
        v,
        RegistryType::String,
    )?;
    set_value(
        runner,
        bottle,
        CURRENT_VERSION_KEY,
        "CurrentMajorVersionNumber",
        major,
        RegistryType::Dword,
    )?;
    set_value(
        runner,
        bottle,
        CURRENT_VERSION_KEY,
        "CurrentMinorVersionNumber",
        minor,
        RegistryType::Dword,
    )
}

pub fn windows_version(
    runner: &WineRunner,
    bottle: &Bottle,
) -> Result<Option<String>, ConvergeError> {
    value(
        runner,
        bottle,
        CURRENT_VERSION_KEY,
        "CurrentVersion",
        RegistryType::String,
    )
}

pub fn set_build_number(
    runner: &WineRunner,
    bottle: &Bottle,
    build: &str,
) -> Result<(), ConvergeError> {
    set_value(
        runner,
        bottle,
        CURRENT_VERSION_KEY,
        "CurrentBuild",
        build,
        RegistryType::String,
    )?;
    set_value(
        runner,
        bottle,
        CURRENT_VERSION_KEY,
        "CurrentBuildNumber",
        build,
        RegistryType::String,
    )
}

pub fn retina_mode(runner: &WineRunner, bottle: &Bottle) -> Result<bool, ConvergeError> {
    let mode = value(
        runner,
        bottle,
        MAC_DRIVER_KEY,
        "RetinaMode",
        RegistryType::String,
    )?;
    Ok(mode.as_deref() == Some("y"))
}

pub fn set_retina_mode(
    runner: &WineRunner,
    bottle: &Bottle,
    enabled: bool,
) -> Result<(), ConvergeError> {
    set_value(
        runner,
        bottle,
        MAC_DRIVER_KEY,
        "RetinaMode",
        if enabled { "y" } else { "n" },
        RegistryType::String,
    )
}
