//! Localized text resolution with fallback.
//!
//! # Responsibility
//! - Resolve locale-keyed text maps deterministically with fallback.
//! - Report per-locale completeness of localized fields.
//! - Define the supported-locale boundary used by model validation.
//!
//! # Invariants
//! - Resolution is pure: same inputs always yield the same output.
//! - Blank entries are treated as absent for resolution and completeness.
//! - The default locale is always part of the supported set.

use std::collections::{BTreeMap, BTreeSet};

/// Locale code to text map used for task names and descriptions.
///
/// `BTreeMap` keeps iteration order stable, which cache fingerprinting
/// and event payload serialization rely on.
pub type LocalizedText = BTreeMap<String, String>;

/// Default locale every task name must resolve in.
pub const DEFAULT_LOCALE: &str = "en";

const DEFAULT_SUPPORTED_LOCALES: &[&str] = &["de", "en", "es", "fr", "ja", "zh"];

/// Resolves one localized field with fallback.
///
/// Returns the requested locale's text when present and non-blank, else
/// the fallback locale's text under the same rule, else `None`.
pub fn resolve<'a>(
    fields: &'a LocalizedText,
    requested_locale: &str,
    fallback_locale: &str,
) -> Option<&'a str> {
    non_blank(fields, requested_locale).or_else(|| non_blank(fields, fallback_locale))
}

fn non_blank<'a>(fields: &'a LocalizedText, locale: &str) -> Option<&'a str> {
    fields
        .get(locale)
        .map(String::as_str)
        .filter(|value| !value.trim().is_empty())
}

/// Per-locale completeness report for one localized field.
#[derive(Debug, Clone, PartialEq)]
pub struct LocaleCompleteness {
    /// Presence flag per supported locale.
    pub per_locale: BTreeMap<String, bool>,
    /// Percentage of supported locales with non-blank content.
    pub overall_percent: f64,
}

/// Reports which supported locales have non-blank content.
pub fn completeness<'a>(
    fields: &LocalizedText,
    supported_locales: impl IntoIterator<Item = &'a str>,
) -> LocaleCompleteness {
    let mut per_locale = BTreeMap::new();
    let mut filled = 0usize;
    for locale in supported_locales {
        let present = non_blank(fields, locale).is_some();
        if present {
            filled += 1;
        }
        per_locale.insert(locale.to_string(), present);
    }

    let overall_percent = if per_locale.is_empty() {
        0.0
    } else {
        filled as f64 * 100.0 / per_locale.len() as f64
    };

    LocaleCompleteness {
        per_locale,
        overall_percent,
    }
}

/// Supported-locale configuration injected into validation and services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocaleConfig {
    default_locale: String,
    supported: BTreeSet<String>,
}

impl LocaleConfig {
    /// Creates a config from a default locale and supported codes.
    ///
    /// The default locale is added to the supported set when missing.
    pub fn new<'a>(
        default_locale: &str,
        supported: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        let mut set: BTreeSet<String> = supported.into_iter().map(str::to_string).collect();
        set.insert(default_locale.to_string());
        Self {
            default_locale: default_locale.to_string(),
            supported: set,
        }
    }

    pub fn default_locale(&self) -> &str {
        &self.default_locale
    }

    pub fn is_supported(&self, locale: &str) -> bool {
        self.supported.contains(locale)
    }

    /// Supported locale codes in stable order.
    pub fn supported_locales(&self) -> impl Iterator<Item = &str> {
        self.supported.iter().map(String::as_str)
    }

    /// Resolves a field map against this config's default locale.
    pub fn resolve<'a>(&self, fields: &'a LocalizedText, requested_locale: &str) -> Option<&'a str> {
        resolve(fields, requested_locale, &self.default_locale)
    }

    /// Completeness of a field map over this config's supported set.
    pub fn completeness(&self, fields: &LocalizedText) -> LocaleCompleteness {
        completeness(fields, self.supported_locales())
    }
}

impl Default for LocaleConfig {
    fn default() -> Self {
        Self::new(DEFAULT_LOCALE, DEFAULT_SUPPORTED_LOCALES.iter().copied())
    }
}
