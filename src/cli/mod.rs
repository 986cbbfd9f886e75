// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

mod args;
mod commands;

pub use args::{Args, OutputFormat};
pub use commands::run;
