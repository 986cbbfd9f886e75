// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

mod client_config;
mod materializer;

pub use client_config::ClientConfig;
pub use materializer::{KubeconfigMaterializer, STABLE_KUBECONFIG};

#[cfg(test)]
pub(crate) mod tests {
    pub const TWO_CONTEXTS: &str = r#"apiVersion: v1
kind: Config
current-context: first
clusters:
- name: cluster-a
  cluster:
    server: https://a.example.com
- name: cluster-b
  cluster:
    server: https://b.example.com
contexts:
- name: first
  context:
    cluster: cluster-a
    user: user-a
- name: second
  context:
    cluster: cluster-b
    user: user-b
users:
- name: user-a
  user:
    token: token-a
- name: user-b
  user:
    token: token-b
"#;
}
