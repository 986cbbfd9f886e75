// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

mod client;
pub mod models;
mod pool;

#[cfg(test)]
pub(crate) mod fake;

pub use client::{GardenClient, GardenClientProvider, KUBECONFIG_KEY, ShootFilter};
pub use models::{
    AccessRestrictionWithOptions, CloudProfile, Project, SecretBinding, Seed, Shoot,
};
pub use pool::{GardenClientPool, KubeGardenClient};
