//! Type-safe target descriptors for fontdeb
//!
//! This module replaces stringly-typed build targets with proper Rust types
//! that provide compile-time validation and exhaustive matching.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use strum::{Display, EnumIter, EnumString};

use crate::error::FontdebError;

/// Debian/Ubuntu CPU architecture name as reported by `dpkg --print-architecture`.
///
/// Carries the static mapping to the archive base URI: the two mainline
/// architectures live on `archive.ubuntu.com`, everything else is served from
/// the ports mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DebArch {
    #[strum(serialize = "amd64")]
    Amd64,
    #[strum(serialize = "i386")]
    I386,
    #[strum(serialize = "s390x")]
    S390x,
    #[strum(serialize = "arm64")]
    Arm64,
    #[strum(serialize = "armhf")]
    Armhf,
    #[strum(serialize = "ppc64el")]
    Ppc64el,
}

impl DebArch {
    /// Archive base URI for this architecture.
    pub fn base_uri(&self) -> &'static str {
        if self.is_ports() {
            "http://ports.ubuntu.com/ubuntu-ports"
        } else {
            "http://archive.ubuntu.com/ubuntu"
        }
    }

    /// Whether this architecture is served from the ports mirror.
    pub fn is_ports(&self) -> bool {
        !matches!(self, Self::Amd64 | Self::I386)
    }
}

/// Validated Ubuntu release codename (e.g. `xenial`, `focal`).
///
/// Codenames are single lowercase ASCII words; anything else is rejected
/// before a subprocess ever sees it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Release(String);

impl Release {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The security pocket for this release (`<codename>-security`).
    pub fn security_suite(&self) -> String {
        format!("{}-security", self.0)
    }
}

impl fmt::Display for Release {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Release {
    type Err = FontdebError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let codename = s.trim();
        if codename.is_empty() {
            return Err(FontdebError::validation("release codename must not be empty"));
        }
        if !codename.chars().all(|c| c.is_ascii_lowercase()) {
            return Err(FontdebError::validation(format!(
                "release codename must be lowercase ASCII letters, got '{}'",
                s
            )));
        }
        Ok(Release(codename.to_string()))
    }
}
