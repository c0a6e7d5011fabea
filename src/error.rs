//! Configuration Errors
//!
//! Every failure of descriptor parsing, environment loading, or resolution
//! is reported as a `ConfigurationError`. None of them are recoverable
//! locally; they are surfaced to the invoking build tool as is.

/// Configuration Error
///
/// This is the exhaustive list of reasons a descriptor cannot be turned into
/// a resolved record. See each variant for details.
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    /// Reading the file at the given path failed.
    #[error("cannot read {path:?}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The content is not syntactically valid TOML, or does not match the
    /// expected structure.
    #[error("malformed descriptor: {0}")]
    Syntax(#[from] toml::de::Error),

    /// The descriptor declares a format version this implementation does
    /// not understand.
    #[error("unsupported descriptor version {0}")]
    UnsupportedVersion(u32),

    /// Specified key required but missing in the descriptor.
    #[error("missing required key `{0}`")]
    MissingKey(&'static str),

    /// A field carries a value that is not acceptable for it.
    #[error("invalid value for `{field}`: {message}")]
    InvalidValue { field: String, message: String },

    /// A symbolic reference is not bound in the environment.
    #[error("unresolved symbol `{symbol}` referenced by `{field}`")]
    UnresolvedSymbol { field: String, symbol: String },

    /// The declared language compatibility levels contradict each other.
    #[error("inconsistent compatibility: target {target_level} is lower than source {source_level}")]
    InconsistentCompatibility {
        source_level: crate::java::JavaVersion,
        target_level: crate::java::JavaVersion,
    },

    /// Kotlin and Java target different bytecode levels.
    #[error("inconsistent jvm target: kotlin targets {jvm_target}, java targets {target}")]
    InconsistentJvmTarget {
        jvm_target: crate::java::JavaVersion,
        target: crate::java::JavaVersion,
    },

    /// A build type refers to a signing configuration that is not declared.
    #[error("build type `{build_type}` references unknown signing config `{name}`")]
    UnknownSigningConfig { build_type: String, name: String },
}

impl ConfigurationError {
    /// Create an `InvalidValue` error for the given field.
    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ConfigurationError>;
