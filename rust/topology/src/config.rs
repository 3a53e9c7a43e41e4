// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Complex configuration, with optional environment overrides.

use crate::stroke::{SamplingQuality, SnapMode};

/// Defaults applied by a [`Complex`](crate::Complex) and its operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComplexConfig {
    /// Sampling quality given to newly created edges.
    pub default_sampling_quality: SamplingQuality,
    /// How edges are deformed when snapped onto their end vertices.
    pub snap_mode: SnapMode,
    /// Whether the convenience delete entry points also remove vertices
    /// left without any incident cell.
    pub delete_isolated_vertices: bool,
}

impl Default for ComplexConfig {
    fn default() -> Self {
        Self {
            default_sampling_quality: SamplingQuality::Medium,
            snap_mode: SnapMode::LinearInArclength,
            delete_isolated_vertices: false,
        }
    }
}

impl ComplexConfig {
    /// Load configuration from environment variables.
    ///
    /// `VAC_SAMPLING_QUALITY` (disabled, low, medium, high), `VAC_SNAP_MODE`
    /// (arclength, parameter) and `VAC_DELETE_ISOLATED_VERTICES` (a boolean).
    /// Unset or invalid values keep their default.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            default_sampling_quality: parse_var(
                &lookup,
                "VAC_SAMPLING_QUALITY",
                SamplingQuality::parse,
                defaults.default_sampling_quality,
            ),
            snap_mode: parse_var(&lookup, "VAC_SNAP_MODE", SnapMode::parse, defaults.snap_mode),
            delete_isolated_vertices: parse_var(
                &lookup,
                "VAC_DELETE_ISOLATED_VERTICES",
                parse_bool,
                defaults.delete_isolated_vertices,
            ),
        }
    }
}

fn parse_var<T: Copy + std::fmt::Debug>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    parse: impl Fn(&str) -> Option<T>,
    default: T,
) -> T {
    match lookup(name) {
        None => default,
        Some(raw) => parse(&raw).unwrap_or_else(|| {
            tracing::warn!(variable = name, value = %raw, ?default, "invalid configuration value");
            default
        }),
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
