// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

use anyhow::{Context, Result};
use gctl::target::Target;

use super::OutputFormatter;

pub struct JsonFormatter;

impl OutputFormatter for JsonFormatter {
    fn format(target: &Target) -> Result<String> {
        serde_json::to_string_pretty(target).context("failed to encode target as JSON")
    }
}
