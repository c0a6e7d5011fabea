//! Java Language Levels
//!
//! Java and Kotlin compatibility levels are spelled in a variety of ways in
//! Android build files: `1.8`, `17`, `VERSION_17`, or fully qualified as
//! `JavaVersion.VERSION_1_8`. This module folds all of them into the feature
//! release number, which orders naturally.

/// Java Version
///
/// A Java language level identified by its feature release number. Levels up
/// to 10 are displayed with the legacy `1.` prefix, matching what Gradle
/// prints for `JavaVersion.toString()`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JavaVersion(u16);

impl JavaVersion {
    /// Create a version from its feature release number. Returns `None` for
    /// release `0`, which never existed.
    pub fn new(release: u16) -> Option<Self> {
        if release == 0 {
            None
        } else {
            Some(Self(release))
        }
    }

    /// Return the feature release number.
    pub fn release(&self) -> u16 {
        self.0
    }

    /// Render as Kotlin JVM target
    ///
    /// Kotlin's `JvmTarget` only keeps the `1.` prefix up to release 8, and
    /// spells 9 and 10 without it, unlike Gradle's `JavaVersion`.
    pub fn to_jvm_target(&self) -> String {
        if self.0 <= 8 {
            format!("1.{}", self.0)
        } else {
            self.0.to_string()
        }
    }
}

/// Serialize a version as Kotlin JVM target, see
/// [`JavaVersion::to_jvm_target()`].
pub fn serialize_jvm_target<S: serde::Serializer>(
    v: &JavaVersion,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&v.to_jvm_target())
}

impl std::fmt::Display for JavaVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0 <= 10 {
            write!(f, "1.{}", self.0)
        } else {
            write!(f, "{}", self.0)
        }
    }
}

// Parse Java versions from strings
//
// Accepts the plain release (`17`), the legacy dotted form (`1.8`), and the
// Gradle enum names with or without the `JavaVersion.` qualifier. The enum
// names use `_` where the dotted form uses `.`.
impl std::str::FromStr for JavaVersion {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let s = s.strip_prefix("JavaVersion.").unwrap_or(s);
        let s = s.strip_prefix("VERSION_").map_or_else(
            || s.to_string(),
            |v| v.replace('_', "."),
        );

        let release = match s.strip_prefix("1.") {
            Some(v) => v,
            None => s.as_str(),
        };

        if release.is_empty() || !release.chars().all(|v| v.is_ascii_digit()) {
            return Err(());
        }

        release.parse::<u16>()
            .ok()
            .and_then(Self::new)
            .ok_or(())
    }
}

impl serde::Serialize for JavaVersion {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
