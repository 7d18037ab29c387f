//! Internal/external content selection.
//!
//! Documentation builds are either internal or public. Pages carry content
//! variants per audience and show the one matching the build.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Build flag that marks an internal build.
pub const INTERNAL_FLAG: &str = "FB_INTERNAL";

/// Content selection error.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ContentError {
    #[error("No content variants given; expected internal and/or external")]
    NoVariants,
}

/// Audience a documentation build is produced for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Audience {
    Internal,
    External,
}

impl Audience {
    /// Audience of the current build, read from [`INTERNAL_FLAG`].
    ///
    /// An unset or unreadable flag means an external build.
    #[must_use]
    pub fn detect() -> Self {
        match std::env::var(INTERNAL_FLAG) {
            Ok(value) => Self::from_flag(&value),
            Err(std::env::VarError::NotPresent) => Self::External,
            Err(e) => {
                tracing::warn!("{INTERNAL_FLAG} couldn't be read, assuming external build: {e}");
                Self::External
            }
        }
    }

    fn from_flag(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" => Self::Internal,
            _ => Self::External,
        }
    }

    /// Whether this is an internal build.
    #[must_use]
    pub const fn is_internal(self) -> bool {
        matches!(self, Self::Internal)
    }

    /// `content` in internal builds, nothing otherwise.
    pub fn internal_only<T>(self, content: T) -> Option<T> {
        self.is_internal().then_some(content)
    }

    /// `content` in external builds, nothing otherwise.
    pub fn external_only<T>(self, content: T) -> Option<T> {
        (!self.is_internal()).then_some(content)
    }
}

/// Per-audience variants of a piece of content.
///
/// Keys other than `internal` and `external` are rejected when deserializing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContentVariants<T> {
    pub internal: Option<T>,
    pub external: Option<T>,
}

impl<T> ContentVariants<T> {
    /// Content shown only in internal builds.
    #[must_use]
    pub const fn internal_only(content: T) -> Self {
        Self {
            internal: Some(content),
            external: None,
        }
    }

    /// Content shown only in external builds.
    #[must_use]
    pub const fn external_only(content: T) -> Self {
        Self {
            internal: None,
            external: Some(content),
        }
    }

    /// Distinct content for each audience.
    #[must_use]
    pub const fn both(internal: T, external: T) -> Self {
        Self {
            internal: Some(internal),
            external: Some(external),
        }
    }

    /// Pick the variant for `audience`.
    ///
    /// `Ok(None)` means nothing is shown to that audience.
    ///
    /// # Errors
    /// Returns `NoVariants` if neither variant is present.
    pub fn select(self, audience: Audience) -> Result<Option<T>, ContentError> {
        if self.internal.is_none() && self.external.is_none() {
            return Err(ContentError::NoVariants);
        }
        Ok(match audience {
            Audience::Internal => self.internal,
            Audience::External => self.external,
        })
    }

    /// Like [`ContentVariants::select`] for lazily built variants.
    ///
    /// Only the selected variant is built.
    ///
    /// # Errors
    /// Returns `NoVariants` if neither variant is present.
    pub fn select_with<U>(self, audience: Audience) -> Result<Option<U>, ContentError>
    where
        T: FnOnce() -> U,
    {
        Ok(self.select(audience)?.map(|build| build()))
    }
}
