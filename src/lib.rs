// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Session-scoped targeting of Gardener landscapes
//!
//! A target names a garden and optionally a project or seed, a shoot and its
//! control plane. It is persisted per terminal session and turned into a
//! client config that tools like kubectl can consume.

pub mod access;
pub mod config;
pub mod context;
pub mod error;
pub mod garden;
pub mod kubeconfig;
pub mod session;
pub mod target;

pub use error::{Error, Result};
