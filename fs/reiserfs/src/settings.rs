// Copyright 2024 Kevin Ludwig
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Driver settings: a small nested `name value... { ... }` grammar, one
//! parameter per line, `#` starting a line comment (spec. §6). Per-volume
//! overrides live in a `volume <name> { ... }` block; everything outside
//! one is global.

use crate::error::{Error, Result};

const MAX_VOLUME_NAME_LEN: usize = 256;
const DEFAULT_VOLUME_NAME: &str = "ReiserFS untitled";
const DEFAULT_HIDE_ESOTERIC: bool = true;

#[derive(Clone, Debug, Default)]
pub struct Parameter {
    pub name: String,
    pub values: Vec<String>,
    pub parameters: Vec<Parameter>,
}

pub fn parse(input: &str) -> Result<Vec<Parameter>> {
    let mut lines = input
        .lines()
        .map(|line| line.split('#').next().unwrap_or("").trim())
        .filter(|line| !line.is_empty())
        .peekable();
    parse_block(&mut lines)
}

fn parse_block<'a, I: Iterator<Item = &'a str>>(lines: &mut core::iter::Peekable<I>) -> Result<Vec<Parameter>> {
    let mut params = Vec::new();
    while let Some(&line) = lines.peek() {
        if line == "}" {
            lines.next();
            return Ok(params);
        }
        lines.next();
        let mut tokens: Vec<&str> = line.split_whitespace().collect();
        let opens_block = tokens.last() == Some(&"{");
        if opens_block {
            tokens.pop();
        }
        let Some((&name, values)) = tokens.split_first() else {
            return Err(Error::BadValue);
        };
        let parameters = if opens_block { parse_block(lines)? } else { Vec::new() };
        params.push(Parameter {
            name: name.to_string(),
            values: values.iter().map(|v| v.to_string()).collect(),
            parameters,
        });
    }
    Ok(params)
}

fn last_matching<'a>(params: &'a [Parameter], name: &str) -> Option<&'a Parameter> {
    params.iter().rev().find(|p| p.name == name)
}

fn string_value(params: &[Parameter], name: &str) -> Option<String> {
    last_matching(params, name).and_then(|p| p.values.first().cloned())
}

fn bool_value(params: &[Parameter], name: &str, default: bool) -> bool {
    match last_matching(params, name) {
        None => default,
        Some(p) => match p.values.first().map(String::as_str) {
            Some("1" | "true" | "yes" | "on" | "enable" | "enabled") => true,
            Some("0" | "false" | "no" | "off" | "disable" | "disabled") => false,
            _ => default,
        },
    }
}

/// Parsed, validated settings for a single mount. Mirrors the source's
/// `Settings` class: a default volume label, an optional per-volume
/// override, whether "esoteric" entries (`.reiserfs_priv` and the like) are
/// hidden from listings, and the explicit extra hide list.
#[derive(Clone, Debug)]
pub struct Settings {
    default_volume_name: Option<String>,
    volume_name: Option<String>,
    hide_esoteric: bool,
    hidden_entries: Vec<String>,
}

impl Default for Settings {
    fn default() -> Settings {
        Settings {
            default_volume_name: None,
            volume_name: None,
            hide_esoteric: DEFAULT_HIDE_ESOTERIC,
            hidden_entries: Vec::new(),
        }
    }
}

impl Settings {
    /// Builds settings from the top-level parameter list, applying the
    /// `volume` block whose single value matches `selected_volume_name` (if
    /// any volume block matches -- the source also supports matching by
    /// device offset and size, not meaningful without a real device and
    /// dropped here).
    pub fn from_parameters(top: &[Parameter], selected_volume_name: Option<&str>) -> Settings {
        let mut settings = Settings {
            default_volume_name: string_value(top, "default_volume_name"),
            hide_esoteric: bool_value(top, "hide_esoteric_entries", DEFAULT_HIDE_ESOTERIC),
            ..Settings::default()
        };

        let volume = selected_volume_name.and_then(|wanted| {
            top.iter()
                .filter(|p| p.name == "volume")
                .find(|p| p.values.first().map(String::as_str) == Some(wanted))
        });

        if let Some(volume) = volume {
            settings.volume_name = string_value(&volume.parameters, "name");
            settings.hide_esoteric = bool_value(&volume.parameters, "hide_esoteric_entries", settings.hide_esoteric);
            settings.hidden_entries = volume
                .parameters
                .iter()
                .filter(|p| p.name == "hide_entries")
                .flat_map(|p| p.values.iter().cloned())
                .filter(|name| check_entry_name(name))
                .collect();
        }

        settings.default_volume_name = settings.default_volume_name.as_deref().map(check_volume_name).filter(|s| !s.is_empty());
        settings.volume_name = settings.volume_name.as_deref().map(check_volume_name).filter(|s| !s.is_empty());
        settings
    }

    pub fn default_volume_name(&self) -> &str {
        self.default_volume_name.as_deref().unwrap_or(DEFAULT_VOLUME_NAME)
    }

    pub fn volume_name(&self) -> &str {
        self.volume_name.as_deref().unwrap_or_else(|| self.default_volume_name())
    }

    pub fn hide_esoteric(&self) -> bool {
        self.hide_esoteric
    }

    /// Names configured to be hidden, as raw configuration strings. These
    /// are resolved to `VNodeId`s once at mount time (spec. §4.7, "Negative
    /// entries") -- nothing compares against these strings directly.
    pub fn hidden_entries(&self) -> &[String] {
        &self.hidden_entries
    }
}

fn check_volume_name(name: &str) -> String {
    let truncated: String = name.chars().take(MAX_VOLUME_NAME_LEN - 1).collect();
    if truncated.contains('/') {
        String::new()
    } else {
        truncated
    }
}

fn check_entry_name(name: &str) -> bool {
    !name.is_empty()
}
