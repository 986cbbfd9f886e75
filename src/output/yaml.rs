// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

use anyhow::{Context, Result};
use gctl::target::Target;

use super::OutputFormatter;

pub struct YamlFormatter;

impl OutputFormatter for YamlFormatter {
    fn format(target: &Target) -> Result<String> {
        serde_yaml::to_string(target).context("failed to encode target as YAML")
    }
}
