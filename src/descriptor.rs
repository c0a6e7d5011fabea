//! Build Descriptor
//!
//! This is a rust implementation of the build descriptor format. A descriptor
//! captures the parameters of an Android application module: the Gradle
//! plugins it applies, its SDK levels, its Java and Kotlin language levels,
//! and its build types with their signing configurations. Any scalar can
//! either be given literally, or refer to a symbol provided by the host
//! toolchain (see [`crate::symbol`]).
//!
//! Parsing happens in two steps. The TOML content is first deserialized into
//! the loose `Raw*` types, which only check syntactic correctness. The raw
//! content is then verified and converted into a `Descriptor`, which carries
//! typed values and is guaranteed to be semantically valid, apart from its
//! unresolved references.

use crate::error::ConfigurationError;
use crate::java::JavaVersion;
use crate::signing::{SigningConfig, SigningRef};
use crate::symbol::Value;

/// Raw Scalar
///
/// Scalars that can be either numbers or strings in the descriptor. The SDK
/// levels are naturally written as integers, but references are strings.
#[derive(serde::Deserialize)]
#[serde(untagged)]
pub enum RawScalar {
    Integer(i64),
    String(String),
}

impl RawScalar {
    fn into_text(self) -> String {
        match self {
            RawScalar::Integer(v) => v.to_string(),
            RawScalar::String(v) => v,
        }
    }
}

/// Raw Compile Options Table
///
/// Java language levels of the module, as used by `compileOptions`.
#[derive(serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RawCompileOptions {
    pub source_compatibility: Option<RawScalar>,
    pub target_compatibility: Option<RawScalar>,
}

/// Raw Kotlin Options Table
#[derive(serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RawKotlinOptions {
    pub jvm_target: Option<RawScalar>,
}

/// Raw Build Type Table
#[derive(serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RawBuildType {
    /// Name of the signing configuration, or a reference to it.
    pub signing_config: Option<String>,
    /// Whether code shrinking is enabled.
    pub minify_enabled: Option<bool>,
}

/// Raw Signing Configuration Table
#[derive(serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RawSigningConfig {
    pub store_file: Option<String>,
    pub store_password: Option<String>,
    pub key_alias: Option<String>,
    pub key_password: Option<String>,
}

/// Raw Android Table
///
/// Sub-type of `Raw` defining the Android module options. The options in
/// this table are one-to-one mappings of their equivalents in the Android
/// Gradle plugin DSL.
#[derive(serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RawAndroid {
    pub namespace: Option<String>,
    pub application_id: Option<String>,

    pub compile_sdk: Option<RawScalar>,
    pub ndk_version: Option<String>,
    pub min_sdk: Option<RawScalar>,
    pub target_sdk: Option<RawScalar>,

    pub version_code: Option<RawScalar>,
    pub version_name: Option<String>,

    pub compile_options: Option<RawCompileOptions>,
    pub kotlin_options: Option<RawKotlinOptions>,

    #[serde(default)]
    pub build_types: std::collections::BTreeMap<String, RawBuildType>,
    #[serde(default)]
    pub signing_configs: std::collections::BTreeMap<String, RawSigningConfig>,
}

/// Raw Flutter Table
#[derive(serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RawFlutter {
    /// Path to the Flutter project root relative from the module.
    pub source: Option<String>,
}

/// Raw Descriptor Content
///
/// This type contains the raw descriptor content as parsed by `toml` and
/// converted into rust types via `serde`.
///
/// Note that content of the type is not verified other than for syntactic
/// correctness required by the given types. Semantic correctness needs to
/// be verified by the caller.
#[derive(serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Raw {
    /// Version of the descriptor format. Only version `1` is currently
    /// supported.
    pub version: u32,

    /// Gradle plugins applied to the module, in order.
    #[serde(default)]
    pub plugins: Vec<String>,
    /// Android table specifying the module configuration.
    pub android: Option<RawAndroid>,
    /// Flutter table specifying the Flutter project integration.
    pub flutter: Option<RawFlutter>,
}

impl Raw {
    /// Parse raw content from string
    ///
    /// Only syntactic correctness is verified.
    pub fn parse_str(content: &str) -> Result<Self, ConfigurationError> {
        Ok(toml::from_str(content)?)
    }
}

/// Build Type
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BuildType {
    pub signing_config: Option<Value<SigningRef>>,
    pub minify_enabled: Option<bool>,
}

/// Build Descriptor
///
/// This type represents a valid and verified descriptor. All literals have
/// been converted into their field types and checked for validity. Symbolic
/// references are retained as is and are resolved against an environment by
/// [`crate::resolve::resolve()`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Descriptor {
    /// Java package of the generated `R` and `BuildConfig` classes.
    pub namespace: String,
    /// Application ID; defaults to the namespace if not given.
    pub application_id: Value<String>,

    pub compile_sdk: Value<u32>,
    pub ndk_version: Option<Value<String>>,
    pub min_sdk: Option<Value<u32>>,
    pub target_sdk: Option<Value<u32>>,

    pub version_code: Option<Value<u32>>,
    pub version_name: Option<Value<String>>,

    pub source_compatibility: Option<Value<JavaVersion>>,
    pub target_compatibility: Option<Value<JavaVersion>>,
    pub jvm_target: Option<Value<JavaVersion>>,

    /// Gradle plugin IDs, in application order.
    pub plugins: Vec<String>,
    pub build_types: std::collections::BTreeMap<String, BuildType>,
    pub signing_configs: std::collections::BTreeMap<String, SigningConfig>,

    pub flutter_source: Option<String>,
}

/// Check whether a string is a valid identifier
///
/// This verifies that the given string consists of only alphanumeric
/// characters plus `-`, `_`. Empty identifiers are rejected.
///
/// Any unicode alpha/numeric character is allowed.
pub fn is_identifier(s: &str) -> bool {
    !s.is_empty() && s.chars().all(
        |v| v.is_alphanumeric() || v == '-' || v == '_'
    )
}

/// Check whether a string contains no quotes or escapes
///
/// This verifies that a string does not contain quotes or backslashes, nor
/// any control characters.
///
/// We use this as a simple way to guarantee that the strings can be
/// interpolated into a wide range of configuration languages. Preferably,
/// we would escape them properly in each target language, but that has not
/// been done, yet.
pub fn is_quotable(s: &str) -> bool {
    s.chars().all(
        |v| !v.is_control()
            && v != '\\'
            && v != '\''
            && v != '"'
    )
}

/// Check whether a string is a Java package name
///
/// Package names are dot-separated Java identifiers. At least `segments`
/// segments are required; Android requires two for application IDs.
pub fn is_package_name(s: &str, segments: usize) -> bool {
    let mut n = 0;

    let valid = s.split('.').all(|segment| {
        let mut chars = segment.chars();
        n += 1;

        matches!(chars.next(), Some(v) if v.is_ascii_alphabetic() || v == '_')
            && chars.all(|v| v.is_ascii_alphanumeric() || v == '_')
    });

    valid && n >= segments
}

// Check whether a string is a Gradle plugin ID
//
// Plugin IDs are dot-separated, where each segment is non-empty and consists
// of alphanumerics plus `-`, `_`. Legacy IDs like `kotlin-android` have a
// single segment.
fn is_plugin_id(s: &str) -> bool {
    !s.is_empty() && s.split('.').all(
        |segment| !segment.is_empty() && segment.chars().all(
            |v| v.is_ascii_alphanumeric() || v == '-' || v == '_'
        )
    )
}

// Parse an optional scalar field
fn parse_scalar<T: crate::symbol::Literal>(
    field: &str,
    raw: Option<RawScalar>,
) -> Result<Option<Value<T>>, ConfigurationError> {
    raw.map(|v| Value::parse(field, &v.into_text())).transpose()
}

// Parse an optional string field
fn parse_string<T: crate::symbol::Literal>(
    field: &str,
    raw: Option<String>,
) -> Result<Option<Value<T>>, ConfigurationError> {
    raw.map(|v| Value::parse(field, &v)).transpose()
}

impl Descriptor {
    // Parse a signing configuration table
    //
    // Store file and key alias are required, passwords are optional since
    // keystores can be unprotected.
    fn parse_signing_config(
        name: &str,
        raw: RawSigningConfig,
    ) -> Result<SigningConfig, ConfigurationError> {
        let prefix = format!("android.signing-configs.{}", name);
        let field = |key: &str| format!("{}.{}", prefix, key);

        let store_file = raw.store_file.ok_or_else(
            || ConfigurationError::invalid(&field("store-file"), "required key is missing")
        )?;
        let key_alias = raw.key_alias.ok_or_else(
            || ConfigurationError::invalid(&field("key-alias"), "required key is missing")
        )?;

        Ok(
            SigningConfig {
                store_file: Value::parse(&field("store-file"), &store_file)?,
                store_password: parse_string(&field("store-password"), raw.store_password)?,
                key_alias: Value::parse(&field("key-alias"), &key_alias)?,
                key_password: parse_string(&field("key-password"), raw.key_password)?,
            }
        )
    }

    /// Parse descriptor from raw
    ///
    /// Take a raw representation of the descriptor and perform post-parsing
    /// validation, ensuring the final descriptor will not contain invalid
    /// entries.
    pub fn parse_raw(raw: Raw) -> Result<Self, ConfigurationError> {
        // We only support version '1'. Any other version number is explicitly
        // defined to be incompatible, so fail parsing.
        //
        // Note that we do support unknown-fields. Hence, it is valid to add
        // more fields to version '1' without breaking backwards compatibility.
        // However, they will be silently ignored by older implementations.
        if raw.version != 1 {
            return Err(ConfigurationError::UnsupportedVersion(raw.version));
        }

        // Plugins are applied in order, and applying a plugin twice is
        // refused by Gradle. Refuse it early.
        let mut seen = std::collections::BTreeSet::new();
        for plugin in raw.plugins.iter() {
            if !is_plugin_id(plugin) {
                return Err(ConfigurationError::invalid(
                    "plugins",
                    format!("'{}' is not a plugin id", plugin),
                ));
            }
            if !seen.insert(plugin.as_str()) {
                return Err(ConfigurationError::invalid(
                    "plugins",
                    format!("plugin '{}' is applied twice", plugin),
                ));
            }
        }

        let android = raw.android.ok_or(ConfigurationError::MissingKey("android"))?;

        // The namespace is used verbatim as Java package, so it is never a
        // reference.
        let namespace = android.namespace.ok_or(
            ConfigurationError::MissingKey("android.namespace")
        )?;
        if !is_package_name(&namespace, 1) {
            return Err(ConfigurationError::invalid(
                "android.namespace",
                format!("'{}' is not a java package name", namespace),
            ));
        }

        let application_id = match android.application_id {
            Some(v) => Value::parse("android.application-id", &v)?,
            None => Value::Literal(namespace.clone()),
        };
        if let Value::Literal(v) = &application_id {
            if !is_package_name(v, 2) {
                return Err(ConfigurationError::invalid(
                    "android.application-id",
                    format!("'{}' is not an application id", v),
                ));
            }
        }

        let compile_sdk = parse_scalar("android.compile-sdk", android.compile_sdk)?
            .ok_or(ConfigurationError::MissingKey("android.compile-sdk"))?;

        let (source_compatibility, target_compatibility) = match android.compile_options {
            Some(v) => (
                parse_scalar(
                    "android.compile-options.source-compatibility",
                    v.source_compatibility,
                )?,
                parse_scalar(
                    "android.compile-options.target-compatibility",
                    v.target_compatibility,
                )?,
            ),
            None => (None, None),
        };

        let jvm_target = match android.kotlin_options {
            Some(v) => parse_scalar("android.kotlin-options.jvm-target", v.jvm_target)?,
            None => None,
        };

        let mut signing_configs = std::collections::BTreeMap::new();
        for (name, v) in android.signing_configs {
            if !is_identifier(&name) {
                return Err(ConfigurationError::invalid(
                    "android.signing-configs",
                    format!("'{}' is not an identifier", name),
                ));
            }
            let config = Self::parse_signing_config(&name, v)?;
            signing_configs.insert(name, config);
        }

        // Literal signing references can be checked right away. References
        // to symbols are checked once resolved.
        let mut build_types = std::collections::BTreeMap::new();
        for (name, v) in android.build_types {
            if !is_identifier(&name) {
                return Err(ConfigurationError::invalid(
                    "android.build-types",
                    format!("'{}' is not an identifier", name),
                ));
            }

            let signing_config: Option<Value<SigningRef>> = parse_string(
                &format!("android.build-types.{}.signing-config", name),
                v.signing_config,
            )?;
            if let Some(Value::Literal(reference)) = &signing_config {
                crate::signing::check_reference(&name, reference, &signing_configs)?;
            }

            build_types.insert(
                name,
                BuildType {
                    signing_config,
                    minify_enabled: v.minify_enabled,
                },
            );
        }

        let flutter_source = match raw.flutter.and_then(|v| v.source) {
            Some(v) if !is_quotable(&v) || v.is_empty() => {
                return Err(ConfigurationError::invalid(
                    "flutter.source",
                    format!("'{}' is not a usable path", v),
                ));
            },
            v => v,
        };

        Ok(
            Self {
                namespace: namespace,
                application_id: application_id,
                compile_sdk: compile_sdk,
                ndk_version: parse_string("android.ndk-version", android.ndk_version)?,
                min_sdk: parse_scalar("android.min-sdk", android.min_sdk)?,
                target_sdk: parse_scalar("android.target-sdk", android.target_sdk)?,
                version_code: parse_scalar("android.version-code", android.version_code)?,
                version_name: parse_string("android.version-name", android.version_name)?,
                source_compatibility: source_compatibility,
                target_compatibility: target_compatibility,
                jvm_target: jvm_target,
                plugins: raw.plugins,
                build_types: build_types,
                signing_configs: signing_configs,
                flutter_source: flutter_source,
            }
        )
    }

    /// Parse descriptor from string
    ///
    /// Parse the given string as a literal descriptor in TOML representation.
    /// Content is verified and invalid descriptors are refused.
    pub fn parse_str(content: &str) -> Result<Self, ConfigurationError> {
        Raw::parse_str(content).and_then(Self::parse_raw)
    }

    /// Parse descriptor from file-system
    ///
    /// Open the specified file and parse it as a descriptor. The content is
    /// verified and invalid descriptors are refused. The file is completely
    /// parsed into memory and then closed again before the function returns.
    pub fn parse_path(path: &std::path::Path) -> Result<Self, ConfigurationError> {
        let content = std::fs::read_to_string(path).map_err(
            |v| ConfigurationError::Io {
                path: path.to_path_buf(),
                source: v,
            },
        )?;

        tracing::info!(path = %path.display(), "loading descriptor");
        Self::parse_str(&content)
    }

    /// List symbolic references
    ///
    /// Return all symbolic references of the descriptor together with the
    /// field that carries them, in resolution order.
    pub fn symbols(&self) -> Vec<(String, &str)> {
        let mut acc = Vec::new();

        fn push<'a, T>(
            acc: &mut Vec<(String, &'a str)>,
            field: &str,
            value: Option<&'a Value<T>>,
        ) {
            if let Some(symbol) = value.and_then(Value::symbol) {
                acc.push((field.to_string(), symbol));
            }
        }

        push(&mut acc, "android.application-id", Some(&self.application_id));
        push(&mut acc, "android.compile-sdk", Some(&self.compile_sdk));
        push(&mut acc, "android.ndk-version", self.ndk_version.as_ref());
        push(&mut acc, "android.min-sdk", self.min_sdk.as_ref());
        push(&mut acc, "android.target-sdk", self.target_sdk.as_ref());
        push(&mut acc, "android.version-code", self.version_code.as_ref());
        push(&mut acc, "android.version-name", self.version_name.as_ref());
        push(
            &mut acc,
            "android.compile-options.source-compatibility",
            self.source_compatibility.as_ref(),
        );
        push(
            &mut acc,
            "android.compile-options.target-compatibility",
            self.target_compatibility.as_ref(),
        );
        push(&mut acc, "android.kotlin-options.jvm-target", self.jvm_target.as_ref());

        for (name, v) in self.signing_configs.iter() {
            let prefix = format!("android.signing-configs.{}", name);
            push(&mut acc, &format!("{}.store-file", prefix), Some(&v.store_file));
            push(&mut acc, &format!("{}.store-password", prefix), v.store_password.as_ref());
            push(&mut acc, &format!("{}.key-alias", prefix), Some(&v.key_alias));
            push(&mut acc, &format!("{}.key-password", prefix), v.key_password.as_ref());
        }

        for (name, v) in self.build_types.iter() {
            push(
                &mut acc,
                &format!("android.build-types.{}.signing-config", name),
                v.signing_config.as_ref(),
            );
        }

        acc
    }

    /// Check whether all references are resolved
    pub fn is_resolved(&self) -> bool {
        self.symbols().is_empty()
    }
}
