// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Access restrictions
//!
//! A garden administrator can declare access restrictions in the garden
//! configuration. When a targeted shoot carries a matching restriction the
//! user is shown a boxed notice and, for explicit shoot targeting, has to
//! confirm before the target is persisted.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{self, BufRead, Write};
use std::sync::Mutex;

use crate::garden::Shoot;

/// Shoots created before access restrictions existed carry this key
const LEGACY_EU_ACCESS: &str = "seed.gardener.cloud/eu-access";
const EU_ACCESS_ONLY: &str = "eu-access-only";

const MIN_WIDTH: usize = 76;
const PROMPT: &str = "Do you want to continue? [y/N]: ";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessRestriction {
    pub key: String,
    #[serde(default)]
    pub msg: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<AccessRestrictionOption>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessRestrictionOption {
    pub key: String,
    #[serde(default)]
    pub notify_if: bool,
    #[serde(default)]
    pub msg: String,
}

fn effective_key(key: &str) -> &str {
    if key == LEGACY_EU_ACCESS {
        EU_ACCESS_ONLY
    } else {
        key
    }
}

impl AccessRestriction {
    /// The notice this restriction produces for `shoot`, if it applies
    fn check(&self, shoot: &Shoot) -> Option<AccessRestrictionMessage> {
        let key = effective_key(&self.key);
        let declared = shoot
            .spec
            .access_restrictions
            .iter()
            .find(|r| r.name == key)?;

        let items = self
            .options
            .iter()
            .filter(|option| {
                // Only the literals "true" and "false" count, anything else never notifies
                declared
                    .options
                    .get(&option.key)
                    .and_then(|raw| raw.parse::<bool>().ok())
                    == Some(option.notify_if)
            })
            .map(|option| option.msg.clone())
            .collect();

        Some(AccessRestrictionMessage {
            header: self.msg.clone(),
            items,
        })
    }
}

/// Evaluate the configured restrictions against a shoot
pub fn check_access_restrictions(
    restrictions: &[AccessRestriction],
    shoot: &Shoot,
) -> AccessRestrictionMessages {
    if shoot.spec.access_restrictions.is_empty() {
        return AccessRestrictionMessages::default();
    }
    AccessRestrictionMessages(restrictions.iter().filter_map(|r| r.check(shoot)).collect())
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessRestrictionMessage {
    pub header: String,
    pub items: Vec<String>,
}

impl AccessRestrictionMessage {
    pub fn new(header: impl Into<String>, items: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            header: header.into(),
            items: items.into_iter().map(Into::into).collect(),
        }
    }

    fn width(&self) -> usize {
        let items = self
            .items
            .iter()
            .flat_map(|item| item.lines())
            .map(|line| line.chars().count())
            .max()
            .unwrap_or(0)
            + 2;
        let header = self
            .header
            .lines()
            .map(|line| line.chars().count())
            .max()
            .unwrap_or(0);
        items.max(header)
    }
}

#[derive(Debug, Clone, Copy)]
enum Row {
    Header,
    Body,
    Footer,
}

impl Row {
    fn print(self, text: &str, width: usize) -> String {
        let (start, end) = match self {
            Row::Header => ("┌─", "─┐"),
            Row::Body => ("│ ", " │"),
            Row::Footer => ("└─", "─┘"),
        };
        let continued = text.starts_with("* ");

        let mut lines = Vec::new();
        for (i, line) in text.split('\n').enumerate() {
            let line = if continued && i > 0 {
                format!("  {line}")
            } else {
                line.to_string()
            };
            let padded = match self {
                Row::Body => format!("{line:<width$}"),
                Row::Header | Row::Footer => {
                    let fill = width.saturating_sub(line.chars().count());
                    format!("{line}{}", "─".repeat(fill))
                }
            };
            lines.push(format!("{start}{padded}{end}"));
        }
        lines.join("\n")
    }
}

/// Ordered notices produced for one shoot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessRestrictionMessages(pub Vec<AccessRestrictionMessage>);

impl AccessRestrictionMessages {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AccessRestrictionMessage> {
        self.0.iter()
    }

    /// Draw the notices as a box
    pub fn render(&self, w: &mut dyn Write) -> io::Result<()> {
        let title = if self.0.len() > 1 {
            " Access Restrictions "
        } else {
            " Access Restriction "
        };
        let width = self
            .0
            .iter()
            .map(AccessRestrictionMessage::width)
            .fold(MIN_WIDTH.max(title.chars().count()), usize::max);

        writeln!(w, "{}", Row::Header.print(title, width))?;
        for message in &self.0 {
            writeln!(w, "{}", Row::Body.print(&message.header, width))?;
            for item in &message.items {
                writeln!(w, "{}", Row::Body.print(&format!("* {item}"), width))?;
            }
        }
        writeln!(w, "{}", Row::Footer.print("", width))
    }

    /// Ask until the user answers; end of input counts as "no"
    pub fn confirm(&self, r: &mut dyn BufRead, w: &mut dyn Write) -> io::Result<bool> {
        loop {
            write!(w, "{PROMPT}")?;
            w.flush()?;

            let mut answer = String::new();
            r.read_line(&mut answer)?;
            match answer.trim().to_lowercase().as_str() {
                "y" | "yes" => return Ok(true),
                "" | "n" | "no" => return Ok(false),
                _ => continue,
            }
        }
    }
}

impl fmt::Display for AccessRestrictionMessages {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut buf = Vec::new();
        self.render(&mut buf).map_err(|_| fmt::Error)?;
        f.write_str(&String::from_utf8_lossy(&buf))
    }
}

/// Decides whether an operation on a restricted shoot may proceed
pub trait AccessRestrictionHandler: Send + Sync {
    /// Returns `true` to continue; an empty list always continues
    fn handle(&self, messages: &AccessRestrictionMessages) -> bool;
}

/// Renders notices to a stream and optionally reads a confirmation
pub struct StreamHandler<R, W> {
    input: Mutex<R>,
    output: Mutex<W>,
    ask_for_confirmation: bool,
}

impl<R, W> StreamHandler<R, W> {
    pub fn new(input: R, output: W, ask_for_confirmation: bool) -> Self {
        Self {
            input: Mutex::new(input),
            output: Mutex::new(output),
            ask_for_confirmation,
        }
    }

    pub fn into_parts(self) -> (R, W) {
        let input = self.input.into_inner().unwrap_or_else(|e| e.into_inner());
        let output = self.output.into_inner().unwrap_or_else(|e| e.into_inner());
        (input, output)
    }
}

impl<R, W> AccessRestrictionHandler for StreamHandler<R, W>
where
    R: BufRead + Send,
    W: Write + Send,
{
    fn handle(&self, messages: &AccessRestrictionMessages) -> bool {
        if messages.is_empty() {
            return true;
        }

        let mut output = self.output.lock().unwrap_or_else(|e| e.into_inner());
        if let Err(e) = messages.render(&mut *output) {
            tracing::warn!(error = %e, "failed to render access restrictions");
            return false;
        }
        if !self.ask_for_confirmation {
            return true;
        }

        let mut input = self.input.lock().unwrap_or_else(|e| e.into_inner());
        messages
            .confirm(&mut *input, &mut *output)
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "failed to read confirmation");
                false
            })
    }
}
