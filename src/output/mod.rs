// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

mod json;
mod yaml;

pub use json::JsonFormatter;
pub use yaml::YamlFormatter;

use anyhow::Result;
use gctl::target::Target;

use crate::cli::OutputFormat;

pub trait OutputFormatter {
    fn format(target: &Target) -> Result<String>;
}

/// Render a target for `target view`
pub fn format_target(target: &Target, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Yaml => YamlFormatter::format(target),
        OutputFormat::Json => JsonFormatter::format(target),
    }
}
