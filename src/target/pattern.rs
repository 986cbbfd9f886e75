// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Free-form targeting through per-garden regular expressions
//!
//! A garden can list patterns with the named groups `project`, `namespace`
//! and `shoot`. The first pattern (gardens in configuration order, patterns
//! in listed order) that matches the input decides the target.

use regex::Regex;

use crate::config::Config;
use crate::error::{Error, Result};

const PROJECT_NAMESPACE_PREFIX: &str = "garden-";

/// Target fields extracted from a pattern match
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatternMatch {
    pub garden: String,
    pub project: Option<String>,
    pub shoot: Option<String>,
}

/// Resolve `value` against the configured patterns
pub fn match_pattern(config: &Config, value: &str) -> Result<PatternMatch> {
    for garden in &config.gardens {
        for pattern in &garden.patterns {
            let regex = Regex::new(pattern).map_err(|e| {
                Error::config(format!("invalid pattern {pattern:?} of garden {:?}: {e}", garden.name))
            })?;
            if let Some(mut found) = match_one(&regex, value) {
                tracing::debug!(garden = %garden.name, %pattern, %value, "pattern matched");
                found.garden = garden.name.clone();
                return Ok(found);
            }
        }
    }
    Err(Error::PatternNoMatch(value.to_string()))
}

fn match_one(regex: &Regex, value: &str) -> Option<PatternMatch> {
    let captures = regex.captures(value)?;
    let group = |name: &str| {
        captures
            .name(name)
            .map(|m| m.as_str().to_string())
            .filter(|s| !s.is_empty())
    };

    let project = match (group("project"), group("namespace")) {
        (Some(project), _) => Some(project),
        (None, Some(namespace)) => {
            let project = namespace.strip_prefix(PROJECT_NAMESPACE_PREFIX)?;
            if project.is_empty() {
                return None;
            }
            Some(project.to_string())
        }
        (None, None) => None,
    };

    Some(PatternMatch {
        garden: String::new(),
        project,
        shoot: group("shoot"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rstest::rstest;

    const CONFIG: &str = r#"
gardens:
  - name: g1
    context: g1
    patterns:
      - "^shoot--(?P<project>.+)--(?P<shoot>.+)$"
      - "^https://dashboard\\.g1\\.example\\.com/namespace/(?P<namespace>[^/]+)/shoots/(?P<shoot>[^/]+)$"
  - name: g2
    context: g2
    patterns:
      - "^(?P<namespace>[^/]+)/(?P<shoot>[^/]+)$"
      - "^g2:(?P<project>[^/]+)/(?P<shoot>[^/]+)$"
  - name: g3
    context: g3
    patterns:
      - "^(?P<project>[^/]+)/(?P<shoot>[^/]+)$"
"#;

    fn config() -> Config {
        Config::parse(CONFIG).unwrap()
    }

    fn found(garden: &str, project: Option<&str>, shoot: Option<&str>) -> PatternMatch {
        PatternMatch {
            garden: garden.to_string(),
            project: project.map(str::to_string),
            shoot: shoot.map(str::to_string),
        }
    }

    #[rstest]
    #[case::project_capture("shoot--p1--s1", found("g1", Some("p1"), Some("s1")))]
    #[case::namespace_capture(
        "https://dashboard.g1.example.com/namespace/garden-p2/shoots/s2",
        found("g1", Some("p2"), Some("s2"))
    )]
    #[case::later_garden("g2:p3/s3", found("g2", Some("p3"), Some("s3")))]
    #[case::namespace_in_second_garden("garden-p4/s4", found("g2", Some("p4"), Some("s4")))]
    fn test_match(#[case] value: &str, #[case] expected: PatternMatch) {
        assert_eq!(match_pattern(&config(), value).unwrap(), expected);
    }

    #[test]
    fn test_namespace_without_prefix_is_rejected() {
        // g2's namespace pattern rejects "p5", so g3 gets to match it as a project
        let result = match_pattern(&config(), "p5/s5").unwrap();
        assert_eq!(result, found("g3", Some("p5"), Some("s5")));
    }

    #[test]
    fn test_bare_prefix_is_rejected() {
        let result = match_pattern(&config(), "garden-/s").unwrap();
        assert_eq!(result, found("g3", Some("garden-"), Some("s")));
    }

    #[test]
    fn test_project_wins_over_namespace() {
        let config = Config::parse(
            r#"gardens: [{name: g, context: c, patterns: ["^(?P<project>[a-z]+)\\.(?P<namespace>[a-z-]+)$"]}]"#,
        )
        .unwrap();
        let result = match_pattern(&config, "alpha.garden-beta").unwrap();
        assert_eq!(result, found("g", Some("alpha"), None));
    }

    #[test]
    fn test_no_match() {
        assert_matches!(
            match_pattern(&config(), "nothing to see"),
            Err(Error::PatternNoMatch(v)) if v == "nothing to see"
        );
    }
}
