//! Signing Configurations
//!
//! Build types name the signing configuration used for their artifacts. The
//! `debug` configuration is always available, since the Android build tools
//! generate a debug keystore on demand. Any other name must be declared in
//! the descriptor, together with the keystore parameters. The descriptor can
//! override the `debug` configuration by declaring it explicitly.
//!
//! Keystore passwords are best supplied as symbolic references, so they stay
//! out of the descriptor and are injected by the environment instead.

use crate::symbol::Value;

/// Name of the implicitly available signing configuration.
pub const DEBUG: &str = "debug";

/// Signing Configuration Reference
///
/// This enum names a signing configuration. It implements `FromStr` to allow
/// creation from string representation. Use `as_str()` to get the name back.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SigningRef {
    /// The implicit debug configuration.
    Debug,
    /// A configuration declared in the descriptor.
    Named(String),
}

impl SigningRef {
    /// Get string representation
    ///
    /// Return the name of the referenced configuration. This is guaranteed to
    /// be parsable by the `FromStr` implementation.
    pub fn as_str(&self) -> &str {
        match self {
            SigningRef::Debug => DEBUG,
            SigningRef::Named(v) => v.as_str(),
        }
    }
}

impl std::fmt::Display for SigningRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// Parse signing references from strings
//
// Names follow the identifier rules of the descriptor: alphanumeric plus
// `-`, `_`, non-empty. Gradle also accepts `signingConfigs.getByName("x")`
// style lookups, but the descriptor only ever carries the bare name.
impl std::str::FromStr for SigningRef {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == DEBUG {
            Ok(Self::Debug)
        } else if crate::descriptor::is_identifier(s) {
            Ok(Self::Named(s.to_string()))
        } else {
            Err(())
        }
    }
}

impl serde::Serialize for SigningRef {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Declared Signing Configuration
///
/// Keystore parameters of a named signing configuration, as declared in the
/// descriptor. Every field may refer to the environment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SigningConfig {
    pub store_file: Value<String>,
    pub store_password: Option<Value<String>>,
    pub key_alias: Value<String>,
    pub key_password: Option<Value<String>>,
}

/// Resolved Signing Configuration
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedSigningConfig {
    pub store_file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_password: Option<String>,
    pub key_alias: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_password: Option<String>,
}

impl From<&ResolvedSigningConfig> for SigningConfig {
    fn from(v: &ResolvedSigningConfig) -> Self {
        Self {
            store_file: Value::Literal(v.store_file.clone()),
            store_password: v.store_password.clone().map(Value::Literal),
            key_alias: Value::Literal(v.key_alias.clone()),
            key_password: v.key_password.clone().map(Value::Literal),
        }
    }
}

/// Check a signing reference
///
/// Verify that `reference`, used by the build type `build_type`, names a
/// configuration that is available: either `debug`, or one of the declared
/// configurations.
pub fn check_reference<V>(
    build_type: &str,
    reference: &SigningRef,
    declared: &std::collections::BTreeMap<String, V>,
) -> Result<(), crate::error::ConfigurationError> {
    match reference {
        SigningRef::Debug => Ok(()),
        SigningRef::Named(name) if declared.contains_key(name) => Ok(()),
        SigningRef::Named(name) => Err(
            crate::error::ConfigurationError::UnknownSigningConfig {
                build_type: build_type.to_string(),
                name: name.clone(),
            }
        ),
    }
}
