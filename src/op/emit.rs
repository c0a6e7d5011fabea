//! Resolved Record Emission
//!
//! The `emit` operation renders a resolved descriptor for consumption by the
//! external build executor, and optionally stores it on disk. Three
//! renderings are supported:
//!
//!  * `json`: the resolved record as a JSON object.
//!
//!  * `properties`: a Gradle properties file with one `descriptor.*` key per
//!    field, suitable as `gradle.properties` or for `Properties.load()`.
//!
//!  * `arguments`: one `-Pdescriptor.*=VALUE` Gradle command-line argument
//!    per line, meant to be split at newlines only.
//!
//! Properties files are read as ISO-8859-1 by `Properties.load()`, so the
//! `properties` rendering escapes keys and values the way
//! `Properties.store()` does: non-ASCII characters become `\uXXXX`, and
//! leading blanks of values are protected. Arguments are passed through the
//! command-line verbatim and are not escaped.

use crate::resolve::Resolved;

/// Output Format
///
/// This enum is an enumeration of supported renderings. It implements
/// `FromStr` to allow creation from string representation. Use `as_str()`
/// to get a static string-representation back.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Format {
    Json,
    Properties,
    Arguments,
}

impl Format {
    /// Get string representation
    ///
    /// Return the string representation of the format. This is guaranteed to
    /// be parsable by the `FromStr` implementation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Json => "json",
            Format::Properties => "properties",
            Format::Arguments => "arguments",
        }
    }
}

// Parse formats from strings
//
// This implements `FromStr` to allow using `std::str::parse()` and thus get
// formats from their respective string representation. Note that this uses
// case-insensitive matching.
impl std::str::FromStr for Format {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [Format::Json, Format::Properties, Format::Arguments]
            .into_iter()
            .find(|v| s.eq_ignore_ascii_case(v.as_str()))
            .ok_or(())
    }
}

/// Emit Errors
///
/// This is the exhaustive list of possible errors raised by the emit
/// operation. See each error for details.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Creation of the directory at the specified path failed.
    #[error("cannot create directory {0:?}: {1}")]
    DirectoryCreation(std::path::PathBuf, #[source] std::io::Error),
    /// Updating the file at the specified path failed with the given error.
    #[error("cannot update {0:?}: {1}")]
    FileUpdate(std::path::PathBuf, #[source] std::io::Error),
    /// Serializing the record failed.
    #[error("cannot serialize record: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Flatten a resolved record into properties
///
/// Return the `descriptor.*` key-value pairs of the record, in a stable
/// order. Absent optional fields produce no entry. Plugins are joined with
/// commas, since plugin IDs cannot contain them.
pub fn properties(resolved: &Resolved) -> Vec<(String, String)> {
    let mut acc: Vec<(String, String)> = Vec::new();
    let mut push = |key: &str, value: String| {
        acc.push((format!("descriptor.{}", key), value));
    };

    push("namespace", resolved.namespace.clone());
    push("applicationId", resolved.application_id.clone());
    push("compileSdk", resolved.compile_sdk.to_string());
    if let Some(v) = &resolved.ndk_version {
        push("ndkVersion", v.clone());
    }
    if let Some(v) = resolved.min_sdk {
        push("minSdk", v.to_string());
    }
    if let Some(v) = resolved.target_sdk {
        push("targetSdk", v.to_string());
    }
    if let Some(v) = resolved.version_code {
        push("versionCode", v.to_string());
    }
    if let Some(v) = &resolved.version_name {
        push("versionName", v.clone());
    }
    if let Some(v) = &resolved.compatibility {
        push("sourceCompatibility", v.source.to_string());
        push("targetCompatibility", v.target.to_string());
        push("jvmTarget", v.jvm_target.to_jvm_target());
    }
    push("plugins", resolved.plugins.join(","));

    for (name, v) in resolved.signing_configs.iter() {
        push(&format!("signingConfigs.{}.storeFile", name), v.store_file.clone());
        if let Some(password) = &v.store_password {
            push(&format!("signingConfigs.{}.storePassword", name), password.clone());
        }
        push(&format!("signingConfigs.{}.keyAlias", name), v.key_alias.clone());
        if let Some(password) = &v.key_password {
            push(&format!("signingConfigs.{}.keyPassword", name), password.clone());
        }
    }

    for (name, v) in resolved.build_types.iter() {
        if let Some(signing) = &v.signing_config {
            push(&format!("buildTypes.{}.signingConfig", name), signing.to_string());
        }
        if let Some(minify) = v.minify_enabled {
            push(&format!("buildTypes.{}.minifyEnabled", name), minify.to_string());
        }
    }

    if let Some(v) = &resolved.flutter_source {
        push("flutter.source", v.clone());
    }

    acc
}

// Escape a key or value for a properties file
//
// Keys additionally escape separators and blanks, since those end the key.
// A leading `#` or `!` of a key would start a comment.
fn escape_property(s: &str, key: bool) -> String {
    let mut acc = String::with_capacity(s.len());

    for (idx, v) in s.chars().enumerate() {
        match v {
            '\\' => acc.push_str("\\\\"),
            '\t' => acc.push_str("\\t"),
            '\n' => acc.push_str("\\n"),
            '\r' => acc.push_str("\\r"),
            '\x0c' => acc.push_str("\\f"),
            ' ' if key || idx == 0 => acc.push_str("\\ "),
            '=' | ':' if key => {
                acc.push('\\');
                acc.push(v);
            },
            '#' | '!' if key && idx == 0 => {
                acc.push('\\');
                acc.push(v);
            },
            v if v < ' ' || v > '~' => {
                let mut units = [0u16; 2];
                for unit in v.encode_utf16(&mut units).iter() {
                    acc.push_str(&format!("\\u{:04X}", unit));
                }
            },
            v => acc.push(v),
        }
    }

    acc
}

/// Render a resolved record
///
/// Produce the textual representation of `resolved` in the given format.
/// The output always ends with a newline.
pub fn render(resolved: &Resolved, format: Format) -> Result<String, Error> {
    let mut out = String::new();

    match format {
        Format::Json => {
            out.push_str(&serde_json::to_string_pretty(resolved)?);
            out.push('\n');
        },
        Format::Properties => {
            out.push_str("# Generated by droid-descriptor\n");
            for (key, value) in properties(resolved) {
                out.push_str(&format!(
                    "{}={}\n",
                    escape_property(&key, true),
                    escape_property(&value, false),
                ));
            }
        },
        Format::Arguments => {
            for (key, value) in properties(resolved) {
                out.push_str(&format!("-P{}={}\n", key, value));
            }
        },
    }

    Ok(out)
}

// Ensure directory exists
//
// Make sure the directory at the given path exists. Create the directory and
// its parent directories if necessary.
fn ensure_dir(path: &std::path::Path) -> Result<(), Error> {
    std::fs::create_dir_all(path)
        .map_err(|v| Error::DirectoryCreation(path.to_path_buf(), v))
}

// Update a file if required
//
// This writes the given content to the specified file, but only if the file
// content does not already match the new content. Build tools track inputs
// by timestamp, so an unchanged record must leave the file untouched.
fn update_file(path: &std::path::Path, content: &str) -> Result<bool, Error> {
    let fail = |v: std::io::Error| Error::FileUpdate(path.to_path_buf(), v);

    match std::fs::read_to_string(path) {
        Ok(old) if old == content => return Ok(false),
        Ok(_) => {},
        Err(v) if v.kind() == std::io::ErrorKind::NotFound => {},
        Err(v) => return Err(fail(v)),
    }

    let mut f = std::fs::File::create(path).map_err(fail)?;
    <std::fs::File as std::io::Write>::write_all(&mut f, content.as_bytes()).map_err(fail)?;

    // Sync the file now to ensure errors are caught properly.
    f.sync_all().map_err(fail)?;

    Ok(true)
}

/// Emit a resolved record
///
/// Render `resolved` in the given format and write it to `path`. Missing
/// parent directories are created. The file is only rewritten if its
/// content changes. Returns whether the file was written.
pub fn emit(
    resolved: &Resolved,
    format: Format,
    path: &std::path::Path,
) -> Result<bool, Error> {
    let content = render(resolved, format)?;

    if let Some(parent) = path.parent().filter(|v| !v.as_os_str().is_empty()) {
        ensure_dir(parent)?;
    }

    let written = update_file(path, &content)?;
    tracing::info!(
        path = %path.display(),
        format = format.as_str(),
        written,
        "emitted resolved descriptor"
    );

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolved() -> Resolved {
        let s = "
            version = 1
            plugins = [\"com.android.application\", \"dev.flutter.flutter-gradle-plugin\"]
            [android]
            namespace = \"com.example.app\"
            compile-sdk = \"${flutter.compileSdkVersion}\"
            min-sdk = 21
            version-name = \"${flutter.versionName}\"
            [android.compile-options]
            target-compatibility = \"17\"
            [android.build-types.release]
            signing-config = \"debug\"
            [flutter]
            source = \"../..\"
        ";
        let d = crate::descriptor::Descriptor::parse_str(s).unwrap();
        let env: crate::environment::Environment = [
            ("flutter.compileSdkVersion", "34"),
            ("flutter.versionName", "1.0.0"),
        ].into_iter().collect();

        crate::resolve::resolve(&d, &env).unwrap()
    }

    // Verify format names
    #[test]
    fn format_names() {
        for f in [Format::Json, Format::Properties, Format::Arguments] {
            assert_eq!(f.as_str().parse::<Format>().unwrap(), f);
        }
        assert_eq!("JSON".parse::<Format>().unwrap(), Format::Json);
        assert!("yaml".parse::<Format>().is_err());
    }

    // Verify the properties rendering
    //
    // Absent fields are skipped, language levels are filled in, and the
    // order is stable.
    #[test]
    fn render_properties() {
        let s = render(&resolved(), Format::Properties).unwrap();

        assert_eq!(
            s,
            concat!(
                "# Generated by droid-descriptor\n",
                "descriptor.namespace=com.example.app\n",
                "descriptor.applicationId=com.example.app\n",
                "descriptor.compileSdk=34\n",
                "descriptor.minSdk=21\n",
                "descriptor.versionName=1.0.0\n",
                "descriptor.sourceCompatibility=17\n",
                "descriptor.targetCompatibility=17\n",
                "descriptor.jvmTarget=17\n",
                "descriptor.plugins=com.android.application,dev.flutter.flutter-gradle-plugin\n",
                "descriptor.buildTypes.release.signingConfig=debug\n",
                "descriptor.flutter.source=../..\n",
            ),
        );
    }

    // Verify properties escapes
    //
    // Non-ASCII characters and leading blanks must survive a round-trip
    // through a properties parser.
    #[test]
    fn render_properties_escapes() {
        let s = "
            version = 1
            [android]
            namespace = \"com.example.app\"
            compile-sdk = 34
            version-name = \" 1.0-\u{e9}\"
            [android.build-types.\"pr\u{fc}fung\"]
            minify-enabled = true
            [flutter]
            source = \"C:/src/my app\"
        ";
        let d = crate::descriptor::Descriptor::parse_str(s).unwrap();
        let r = crate::resolve::resolve(&d, &crate::environment::Environment::new()).unwrap();

        let out = render(&r, Format::Properties).unwrap();
        assert!(out.is_ascii());
        assert!(out.contains("descriptor.versionName=\\ 1.0-\\u00E9\n"));
        assert!(out.contains("descriptor.buildTypes.pr\\u00FCfung.minifyEnabled=true\n"));
        assert!(out.contains("descriptor.flutter.source=C:/src/my app\n"));

        let env = crate::environment::Environment::parse_properties(&out).unwrap();
        let expected = properties(&r);
        assert_eq!(env.len(), expected.len());
        for (key, value) in expected.iter() {
            assert_eq!(env.get(key), Some(value.as_str()));
        }
    }

    // Verify key escapes
    #[test]
    fn escape_keys() {
        assert_eq!(escape_property("a b=c:d", true), "a\\ b\\=c\\:d");
        assert_eq!(escape_property("#a!", true), "\\#a!");
        assert_eq!(escape_property("a=b:c", false), "a=b:c");
        assert_eq!(escape_property("  a b", false), "\\  a b");
        assert_eq!(escape_property("\u{1f600}", false), "\\uD83D\\uDE00");
    }

    // Verify language levels 9 and 10
    //
    // Java levels keep the Gradle spelling, the JVM target uses the Kotlin
    // spelling.
    #[test]
    fn render_jvm_target() {
        let s = "
            version = 1
            [android]
            namespace = \"com.example.app\"
            compile-sdk = 34
            [android.kotlin-options]
            jvm-target = \"9\"
        ";
        let d = crate::descriptor::Descriptor::parse_str(s).unwrap();
        let r = crate::resolve::resolve(&d, &crate::environment::Environment::new()).unwrap();

        let out = render(&r, Format::Properties).unwrap();
        assert!(out.contains("descriptor.targetCompatibility=1.9\n"));
        assert!(out.contains("descriptor.jvmTarget=9\n"));

        let v: serde_json::Value = serde_json::from_str(&render(&r, Format::Json).unwrap()).unwrap();
        assert_eq!(v["compatibility"]["target"], "1.9");
        assert_eq!(v["compatibility"]["jvmTarget"], "9");
    }

    // Verify the argument rendering
    #[test]
    fn render_arguments() {
        let s = render(&resolved(), Format::Arguments).unwrap();
        let mut lines = s.lines();

        assert_eq!(lines.next(), Some("-Pdescriptor.namespace=com.example.app"));
        assert!(s.lines().all(|v| v.starts_with("-Pdescriptor.")));
        assert!(s.contains("-Pdescriptor.compileSdk=34\n"));
    }

    // Verify the JSON rendering
    //
    // The record serializes with camel-case keys and java versions as
    // strings; absent fields are omitted.
    #[test]
    fn render_json() {
        let s = render(&resolved(), Format::Json).unwrap();
        let v: serde_json::Value = serde_json::from_str(&s).unwrap();

        assert_eq!(v["applicationId"], "com.example.app");
        assert_eq!(v["compileSdk"], 34);
        assert_eq!(v["compatibility"]["jvmTarget"], "17");
        assert_eq!(v["buildTypes"]["release"]["signingConfig"], "debug");
        assert!(v.get("targetSdk").is_none());
    }

    // Verify files are only touched on change
    //
    // Emit twice into a fresh directory; the second emission must report
    // that nothing was written. A changed format rewrites the file.
    #[test]
    fn emit_update() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("build").join("descriptor.properties");
        let r = resolved();

        assert!(emit(&r, Format::Properties, &path).unwrap());
        assert!(!emit(&r, Format::Properties, &path).unwrap());
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            render(&r, Format::Properties).unwrap(),
        );

        assert!(emit(&r, Format::Json, &path).unwrap());
    }
}
