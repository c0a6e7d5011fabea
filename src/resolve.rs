//! Descriptor Resolution
//!
//! Resolution turns a `Descriptor` into a `Resolved` record by looking up
//! every symbolic reference in an `Environment`. This is a single linear pass
//! over the descriptor fields. The first failure aborts resolution; there is
//! nothing to retry or recover.
//!
//! Beyond looking up symbols, resolution verifies everything that could not
//! be verified at parse time because it depends on the environment:
//!
//!  * Values bound in the environment must convert into the type of the
//!    field that references them.
//!
//!  * The Java source level must not exceed the target level, and the Kotlin
//!    JVM target must match the Java target level. Missing levels default to
//!    the declared ones.
//!
//!  * Build types must reference available signing configurations.
//!
//! A resolved record converts back into a descriptor without references.
//! Resolving that descriptor again yields the same record, with any
//! environment.

use crate::descriptor::Descriptor;
use crate::environment::Environment;
use crate::error::ConfigurationError;
use crate::java::JavaVersion;
use crate::signing::{ResolvedSigningConfig, SigningConfig, SigningRef};
use crate::symbol::{Literal, Value};

/// Resolved Language Levels
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Compatibility {
    pub source: JavaVersion,
    pub target: JavaVersion,
    #[serde(serialize_with = "crate::java::serialize_jvm_target")]
    pub jvm_target: JavaVersion,
}

/// Resolved Build Type
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedBuildType {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signing_config: Option<SigningRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minify_enabled: Option<bool>,
}

/// Resolved Descriptor
///
/// The outcome of resolution, with every reference replaced by its value.
/// This is the record handed to the external build executor. It is created
/// once per build invocation and not modified afterwards.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Resolved {
    pub namespace: String,
    pub application_id: String,

    pub compile_sdk: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ndk_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_sdk: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_sdk: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version_code: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub compatibility: Option<Compatibility>,

    pub plugins: Vec<String>,
    pub build_types: std::collections::BTreeMap<String, ResolvedBuildType>,
    pub signing_configs: std::collections::BTreeMap<String, ResolvedSigningConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub flutter_source: Option<String>,
}

impl From<&Resolved> for Descriptor {
    fn from(v: &Resolved) -> Self {
        let compatibility = v.compatibility.as_ref();

        Self {
            namespace: v.namespace.clone(),
            application_id: Value::Literal(v.application_id.clone()),
            compile_sdk: Value::Literal(v.compile_sdk),
            ndk_version: v.ndk_version.clone().map(Value::Literal),
            min_sdk: v.min_sdk.map(Value::Literal),
            target_sdk: v.target_sdk.map(Value::Literal),
            version_code: v.version_code.map(Value::Literal),
            version_name: v.version_name.clone().map(Value::Literal),
            source_compatibility: compatibility.map(|c| Value::Literal(c.source)),
            target_compatibility: compatibility.map(|c| Value::Literal(c.target)),
            jvm_target: compatibility.map(|c| Value::Literal(c.jvm_target)),
            plugins: v.plugins.clone(),
            build_types: v.build_types.iter().map(
                |(name, b)| (
                    name.clone(),
                    crate::descriptor::BuildType {
                        signing_config: b.signing_config.clone().map(Value::Literal),
                        minify_enabled: b.minify_enabled,
                    },
                )
            ).collect(),
            signing_configs: v.signing_configs.iter().map(
                |(name, s)| (name.clone(), SigningConfig::from(s))
            ).collect(),
            flutter_source: v.flutter_source.clone(),
        }
    }
}

// Symbol lookup over a borrowed environment.
struct Resolver<'env> {
    env: &'env Environment,
}

impl<'env> Resolver<'env> {
    // Resolve a single value
    //
    // Literals are taken as is. References are looked up and converted into
    // the field type. Bound values are not logged, since some of them are
    // keystore passwords.
    fn value<T: Literal + Clone>(
        &self,
        field: &str,
        value: &Value<T>,
    ) -> Result<T, ConfigurationError> {
        let symbol = match value {
            Value::Literal(v) => return Ok(v.clone()),
            Value::Symbol(v) => v.as_str(),
        };

        let Some(bound) = self.env.get(symbol) else {
            return Err(ConfigurationError::UnresolvedSymbol {
                field: field.to_string(),
                symbol: symbol.to_string(),
            });
        };

        tracing::debug!(field, symbol, "resolved symbol");

        T::parse_literal(bound).ok_or_else(
            || ConfigurationError::invalid(
                field,
                format!("symbol `{}` is not bound to {}", symbol, T::EXPECTED),
            )
        )
    }

    fn optional<T: Literal + Clone>(
        &self,
        field: &str,
        value: Option<&Value<T>>,
    ) -> Result<Option<T>, ConfigurationError> {
        value.map(|v| self.value(field, v)).transpose()
    }

    fn signing_config(
        &self,
        name: &str,
        config: &SigningConfig,
    ) -> Result<ResolvedSigningConfig, ConfigurationError> {
        let field = |key: &str| format!("android.signing-configs.{}.{}", name, key);

        Ok(
            ResolvedSigningConfig {
                store_file: self.value(&field("store-file"), &config.store_file)?,
                store_password: self.optional(
                    &field("store-password"),
                    config.store_password.as_ref(),
                )?,
                key_alias: self.value(&field("key-alias"), &config.key_alias)?,
                key_password: self.optional(
                    &field("key-password"),
                    config.key_password.as_ref(),
                )?,
            }
        )
    }
}

// Ensure a level is strictly positive
//
// SDK levels and version codes start at 1. Zero parses as integer, but is
// refused by the Android tools.
fn positive(field: &str, value: Option<u32>) -> Result<Option<u32>, ConfigurationError> {
    match value {
        Some(0) => Err(ConfigurationError::invalid(field, "must be greater than zero")),
        v => Ok(v),
    }
}

/// Derive language levels
///
/// Combine the declared Java source and target levels and the Kotlin JVM
/// target into a consistent set. A missing target level defaults to the
/// source level (or the JVM target, if that is all that is given), a missing
/// source level defaults to the target level, and a missing JVM target
/// defaults to the target level. Nothing declared yields `None`.
pub fn compatibility(
    source: Option<JavaVersion>,
    target: Option<JavaVersion>,
    jvm_target: Option<JavaVersion>,
) -> Result<Option<Compatibility>, ConfigurationError> {
    let Some(target) = target.or(source).or(jvm_target) else {
        return Ok(None);
    };
    let source = source.unwrap_or(target);
    let jvm_target = jvm_target.unwrap_or(target);

    if target < source {
        return Err(ConfigurationError::InconsistentCompatibility {
            source_level: source,
            target_level: target,
        });
    }

    if jvm_target != target {
        return Err(ConfigurationError::InconsistentJvmTarget {
            jvm_target: jvm_target,
            target: target,
        });
    }

    Ok(Some(Compatibility { source, target, jvm_target }))
}

/// Resolve a descriptor
///
/// Resolve all references of `descriptor` against `env` and verify the
/// result. Fields are resolved in declaration order, and the first failure
/// is returned. The descriptor is left untouched.
pub fn resolve(
    descriptor: &Descriptor,
    env: &Environment,
) -> Result<Resolved, ConfigurationError> {
    let r = Resolver { env: env };

    let application_id: String = r.value("android.application-id", &descriptor.application_id)?;
    if !crate::descriptor::is_package_name(&application_id, 2) {
        return Err(ConfigurationError::invalid(
            "android.application-id",
            format!("'{}' is not an application id", application_id),
        ));
    }

    let compile_sdk = positive(
        "android.compile-sdk",
        Some(r.value("android.compile-sdk", &descriptor.compile_sdk)?),
    )?.unwrap_or_default();
    let ndk_version = r.optional("android.ndk-version", descriptor.ndk_version.as_ref())?;
    let min_sdk = positive(
        "android.min-sdk",
        r.optional("android.min-sdk", descriptor.min_sdk.as_ref())?,
    )?;
    let target_sdk = positive(
        "android.target-sdk",
        r.optional("android.target-sdk", descriptor.target_sdk.as_ref())?,
    )?;
    let version_code = positive(
        "android.version-code",
        r.optional("android.version-code", descriptor.version_code.as_ref())?,
    )?;
    let version_name = r.optional("android.version-name", descriptor.version_name.as_ref())?;

    let compatibility = compatibility(
        r.optional(
            "android.compile-options.source-compatibility",
            descriptor.source_compatibility.as_ref(),
        )?,
        r.optional(
            "android.compile-options.target-compatibility",
            descriptor.target_compatibility.as_ref(),
        )?,
        r.optional(
            "android.kotlin-options.jvm-target",
            descriptor.jvm_target.as_ref(),
        )?,
    )?;

    let mut signing_configs = std::collections::BTreeMap::new();
    for (name, config) in descriptor.signing_configs.iter() {
        signing_configs.insert(name.clone(), r.signing_config(name, config)?);
    }

    let mut build_types = std::collections::BTreeMap::new();
    for (name, build_type) in descriptor.build_types.iter() {
        let signing_config = r.optional(
            &format!("android.build-types.{}.signing-config", name),
            build_type.signing_config.as_ref(),
        )?;

        if let Some(reference) = &signing_config {
            crate::signing::check_reference(name, reference, &signing_configs)?;

            if name == "release" && *reference == SigningRef::Debug {
                tracing::warn!(
                    build_type = %name,
                    "release build is signed with the debug signing config"
                );
            }
        }

        build_types.insert(
            name.clone(),
            ResolvedBuildType {
                signing_config: signing_config,
                minify_enabled: build_type.minify_enabled,
            },
        );
    }

    Ok(
        Resolved {
            namespace: descriptor.namespace.clone(),
            application_id: application_id,
            compile_sdk: compile_sdk,
            ndk_version: ndk_version,
            min_sdk: min_sdk,
            target_sdk: target_sdk,
            version_code: version_code,
            version_name: version_name,
            compatibility: compatibility,
            plugins: descriptor.plugins.clone(),
            build_types: build_types,
            signing_configs: signing_configs,
            flutter_source: descriptor.flutter_source.clone(),
        }
    )
}
