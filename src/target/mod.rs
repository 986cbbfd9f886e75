// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

mod history;
mod manager;
mod overrides;
mod pattern;
mod store;
mod value;

pub use history::{HISTORY_FILE, TargetHistory};
pub use manager::TargetManager;
pub use overrides::TargetOverrides;
pub use pattern::{PatternMatch, match_pattern};
pub use store::{SessionTargetStore, TARGET_FILE, TargetLock};
pub use value::Target;
