//! Resolution Environment
//!
//! The environment maps symbol names to the values the host toolchain
//! provides for them. It is assembled from any number of sources, with later
//! sources overriding earlier ones:
//!
//!  * TOML files, whose nested tables flatten into dot-separated names. A
//!    table `[flutter]` with a key `compileSdkVersion` provides the symbol
//!    `flutter.compileSdkVersion`.
//!
//!  * Java-style properties files, as written by Flutter into
//!    `local.properties` (`flutter.versionCode=1`).
//!
//!  * Single `KEY=VALUE` definitions, usually from the command-line.
//!
//! All values are kept as strings. Conversion into the type of the field
//! that references a symbol happens during resolution.

use crate::error::ConfigurationError;

/// Resolution Environment
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Environment {
    values: std::collections::BTreeMap<String, String>,
}

impl Environment {
    /// Create an empty environment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name` to `value`, replacing any previous binding.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    /// Look up the value bound to `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Number of bound symbols.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no symbol is bound.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over all bindings, ordered by name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Merge another environment into this one
    ///
    /// Bindings of `other` take precedence over existing bindings of the
    /// same name.
    pub fn merge(&mut self, other: Environment) {
        self.values.extend(other.values);
    }

    /// Parse a properties file
    ///
    /// This follows the format of `java.util.Properties`, which Android
    /// Studio and Flutter use to write `local.properties`. Lines starting
    /// with `#` or `!` are comments. The key ends at the first unescaped
    /// `=`, `:` or whitespace, and the separator may be surrounded by
    /// whitespace. A line ending in an odd number of backslashes continues
    /// on the next line. Escapes (`\\`, `\:`, `\t`, `\uXXXX`, ...) are
    /// decoded in keys and values. Lines with an empty key are skipped.
    pub fn parse_properties(content: &str) -> Result<Self, ConfigurationError> {
        let mut env = Self::new();
        let mut lines = content.lines().enumerate();

        while let Some((idx, line)) = lines.next() {
            let mut line = line.trim_start_matches(is_blank);
            if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                continue;
            }

            let mut logical = String::new();
            while is_continued(line) {
                logical.push_str(&line[..line.len() - 1]);
                match lines.next() {
                    Some((_, next)) => line = next.trim_start_matches(is_blank),
                    None => {
                        line = "";
                        break;
                    },
                }
            }
            logical.push_str(line);

            let (key, value) = split_property(&logical);
            let field = format!("line {}", idx + 1);
            let key = unescape(key).map_err(|v| ConfigurationError::invalid(&field, v))?;
            let value = unescape(value).map_err(|v| ConfigurationError::invalid(&field, v))?;

            if key.is_empty() {
                tracing::debug!(line = idx + 1, "skipped property without key");
                continue;
            }

            env.insert(key, value);
        }

        Ok(env)
    }

    // Flatten a TOML table into dot-separated bindings
    //
    // Recurses into sub-tables, prefixing their keys with the table name.
    // Only scalars with an unambiguous string form are accepted.
    fn flatten_toml(
        &mut self,
        prefix: &str,
        table: &toml::Table,
    ) -> Result<(), ConfigurationError> {
        for (key, value) in table.iter() {
            let name = if prefix.is_empty() {
                key.clone()
            } else {
                format!("{}.{}", prefix, key)
            };

            match value {
                toml::Value::String(v) => self.insert(name, v.as_str()),
                toml::Value::Integer(v) => self.insert(name, v.to_string()),
                toml::Value::Boolean(v) => self.insert(name, v.to_string()),
                toml::Value::Table(v) => self.flatten_toml(&name, v)?,
                toml::Value::Float(_) => {
                    return Err(ConfigurationError::invalid(
                        &name,
                        "floating-point values are ambiguous, quote them",
                    ));
                },
                toml::Value::Array(_) | toml::Value::Datetime(_) => {
                    return Err(ConfigurationError::invalid(
                        &name,
                        "only strings, integers and booleans can be bound",
                    ));
                },
            }
        }

        Ok(())
    }

    /// Parse a TOML environment
    ///
    /// Nested tables flatten into dot-separated symbol names.
    pub fn parse_toml(content: &str) -> Result<Self, ConfigurationError> {
        let table: toml::Table = toml::from_str(content)?;
        let mut env = Self::new();

        env.flatten_toml("", &table)?;
        Ok(env)
    }

    /// Load an environment file
    ///
    /// Files with a `.toml` extension are parsed as TOML, everything else as
    /// properties. The file is read into memory in one go and closed before
    /// parsing starts.
    pub fn load_path(path: &std::path::Path) -> Result<Self, ConfigurationError> {
        let content = std::fs::read_to_string(path).map_err(
            |v| ConfigurationError::Io {
                path: path.to_path_buf(),
                source: v,
            },
        )?;

        let env = match path.extension() {
            Some(v) if v == "toml" => Self::parse_toml(&content)?,
            _ => Self::parse_properties(&content)?,
        };

        tracing::info!(path = %path.display(), symbols = env.len(), "loaded environment");
        Ok(env)
    }

    /// Parse a `KEY=VALUE` definition
    ///
    /// The key must be a valid symbol name. The value is taken verbatim and
    /// may be empty or contain further `=` characters.
    pub fn parse_define(definition: &str) -> Result<(String, String), ConfigurationError> {
        let Some((key, value)) = definition.split_once('=') else {
            return Err(ConfigurationError::invalid(
                "define",
                format!("expected KEY=VALUE, got '{}'", definition),
            ));
        };

        let key = key.trim();
        if !crate::symbol::is_symbol_name(key) {
            return Err(ConfigurationError::invalid(
                "define",
                format!("invalid symbol name '{}'", key),
            ));
        }

        Ok((key.to_string(), value.to_string()))
    }

    /// Apply a `KEY=VALUE` definition to this environment.
    pub fn define(&mut self, definition: &str) -> Result<(), ConfigurationError> {
        let (key, value) = Self::parse_define(definition)?;

        self.insert(key, value);
        Ok(())
    }
}

// Whitespace as understood by properties files.
fn is_blank(v: char) -> bool {
    v == ' ' || v == '\t' || v == '\x0c'
}

// Whether a properties line continues on the next line, that is, it ends in
// an odd number of backslashes.
fn is_continued(line: &str) -> bool {
    line.chars().rev().take_while(|v| *v == '\\').count() % 2 == 1
}

// Split a logical properties line into its raw key and value
//
// Both parts are returned with their escapes still in place.
fn split_property(line: &str) -> (&str, &str) {
    let mut escaped = false;
    let mut end = line.len();

    for (idx, v) in line.char_indices() {
        if escaped {
            escaped = false;
        } else if v == '\\' {
            escaped = true;
        } else if v == '=' || v == ':' || is_blank(v) {
            end = idx;
            break;
        }
    }

    let mut value = line[end..].trim_start_matches(is_blank);
    if let Some(v) = value.strip_prefix(|v: char| v == '=' || v == ':') {
        value = v.trim_start_matches(is_blank);
    }

    (&line[..end], value)
}

// Decode the escapes of a properties key or value
//
// `\uXXXX` escapes encode UTF-16 code units, so characters outside the basic
// plane arrive as surrogate pairs. Unknown escapes stand for the escaped
// character itself.
fn unescape(s: &str) -> Result<String, String> {
    let mut acc = String::with_capacity(s.len());
    let mut units: Vec<u16> = Vec::new();
    let mut chars = s.chars();

    while let Some(v) = chars.next() {
        let v = match v {
            '\\' => match chars.next() {
                Some('u') => {
                    let hex: String = chars.by_ref().take(4).collect();
                    if hex.len() != 4 || !hex.chars().all(|v| v.is_ascii_hexdigit()) {
                        return Err(format!("malformed escape '\\u{}'", hex));
                    }
                    units.push(u16::from_str_radix(&hex, 16).map_err(|v| v.to_string())?);
                    continue;
                },
                Some('t') => '\t',
                Some('n') => '\n',
                Some('r') => '\r',
                Some('f') => '\x0c',
                Some(v) => v,
                None => break,
            },
            v => v,
        };

        decode_units(&mut acc, &mut units)?;
        acc.push(v);
    }

    decode_units(&mut acc, &mut units)?;
    Ok(acc)
}

// Append pending UTF-16 code units to `acc`.
fn decode_units(acc: &mut String, units: &mut Vec<u16>) -> Result<(), String> {
    for v in char::decode_utf16(units.drain(..)) {
        let v = v.map_err(
            |v| format!("unpaired surrogate '\\u{:04x}'", v.unpaired_surrogate()),
        )?;
        acc.push(v);
    }

    Ok(())
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Environment {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut env = Self::new();

        for (k, v) in iter {
            env.insert(k, v);
        }

        env
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Verify properties parsing
    //
    // Parse a `local.properties` as written by Flutter, including comments
    // and both separator styles.
    #[test]
    fn properties_flutter_local() {
        let s = "
            # Generated by the toolchain
            sdk.dir=/opt/android-sdk
            flutter.sdk=/opt/flutter
            ! legacy comment
            flutter.versionName = 1.0.0
            flutter.versionCode: 7
            flutter.buildMode
        ";

        let env = Environment::parse_properties(s).unwrap();

        assert_eq!(env.len(), 5);
        assert_eq!(env.get("sdk.dir"), Some("/opt/android-sdk"));
        assert_eq!(env.get("flutter.versionName"), Some("1.0.0"));
        assert_eq!(env.get("flutter.versionCode"), Some("7"));
        assert_eq!(env.get("flutter.buildMode"), Some(""));
    }

    // Verify separators inside values
    //
    // Only the first separator splits key and value; Windows paths and URLs
    // must survive unharmed.
    #[test]
    fn properties_separator_in_value() {
        let env = Environment::parse_properties("repo.url=https://maven.example.com/a=b\n").unwrap();

        assert_eq!(env.get("repo.url"), Some("https://maven.example.com/a=b"));
    }

    // Verify escapes in properties
    //
    // Android Studio writes `local.properties` through `Properties.store()`,
    // which escapes colons and backslashes of Windows paths, as well as all
    // non-ASCII characters.
    #[test]
    fn properties_escapes() {
        let s = concat!(
            "sdk.dir=C\\:\\\\Android\\\\sdk\n",
            "flutter.sdk=C\\:\\\\src\\\\flutter\n",
            "app.label=Gr\\u00fc\\u00dfe \\ud83d\\ude00\n",
            "key\\ with\\:colon = \\ leading space\n",
            "tabs=a\\tb\n",
        );

        let env = Environment::parse_properties(s).unwrap();

        assert_eq!(env.get("sdk.dir"), Some("C:\\Android\\sdk"));
        assert_eq!(env.get("flutter.sdk"), Some("C:\\src\\flutter"));
        assert_eq!(env.get("app.label"), Some("Gr\u{fc}\u{df}e \u{1f600}"));
        assert_eq!(env.get("key with:colon"), Some(" leading space"));
        assert_eq!(env.get("tabs"), Some("a\tb"));

        assert!(Environment::parse_properties("a=\\u00g1\n").is_err());
        assert!(Environment::parse_properties("a=\\u00\n").is_err());
        assert!(Environment::parse_properties("a=\\ud83d\n").is_err());
    }

    // Verify line continuations
    //
    // An odd number of trailing backslashes joins the next line, with its
    // leading whitespace removed. An even number is an escaped backslash.
    #[test]
    fn properties_continuation() {
        let s = concat!(
            "flutter.plugins=a,\\\n",
            "    b,\\\n",
            "    c\n",
            "path=C\\:\\\\\n",
            "next=1\n",
            "last=end\\",
        );

        let env = Environment::parse_properties(s).unwrap();

        assert_eq!(env.get("flutter.plugins"), Some("a,b,c"));
        assert_eq!(env.get("path"), Some("C:\\"));
        assert_eq!(env.get("next"), Some("1"));
        assert_eq!(env.get("last"), Some("end"));
    }

    // Verify lines without a key are skipped
    #[test]
    fn properties_empty_key() {
        let env = Environment::parse_properties("=value\n: other\n  =\nkey=v\n").unwrap();

        assert_eq!(env.len(), 1);
        assert_eq!(env.get(""), None);
        assert_eq!(env.get("key"), Some("v"));
    }

    // Verify TOML flattening
    #[test]
    fn toml_flatten() {
        let s = "
            sdk = \"/opt/android-sdk\"
            [flutter]
            compileSdkVersion = 34
            versionName = \"1.2.3\"
            [flutter.build]
            release = true
        ";

        let env = Environment::parse_toml(s).unwrap();

        assert_eq!(env.get("sdk"), Some("/opt/android-sdk"));
        assert_eq!(env.get("flutter.compileSdkVersion"), Some("34"));
        assert_eq!(env.get("flutter.versionName"), Some("1.2.3"));
        assert_eq!(env.get("flutter.build.release"), Some("true"));
    }

    // Verify ambiguous TOML values are refused
    #[test]
    fn toml_refuse_ambiguous() {
        assert!(matches!(
            Environment::parse_toml("[flutter]\nversionName = 1.0"),
            Err(ConfigurationError::InvalidValue { field, .. }) if field == "flutter.versionName",
        ));
        assert!(Environment::parse_toml("flutter = [1, 2]").is_err());
        assert!(matches!(
            Environment::parse_toml("flutter = "),
            Err(ConfigurationError::Syntax(_)),
        ));
    }

    // Verify `KEY=VALUE` definitions
    #[test]
    fn define() {
        let mut env = Environment::new();

        env.define("flutter.versionName=2.0.0").unwrap();
        env.define("flutter.flavor=").unwrap();
        env.define("signing.args=a=b").unwrap();

        assert_eq!(env.get("flutter.versionName"), Some("2.0.0"));
        assert_eq!(env.get("flutter.flavor"), Some(""));
        assert_eq!(env.get("signing.args"), Some("a=b"));

        assert!(env.define("flutter.versionName").is_err());
        assert!(env.define("=2.0.0").is_err());
        assert!(env.define("flutter version=2.0.0").is_err());
    }

    // Verify precedence on merge
    //
    // Later sources override earlier ones, but keep bindings they do not
    // mention.
    #[test]
    fn merge_precedence() {
        let mut env: Environment = [
            ("flutter.minSdkVersion", "21"),
            ("flutter.targetSdkVersion", "33"),
        ].into_iter().collect();

        env.merge([("flutter.targetSdkVersion", "34")].into_iter().collect());

        assert_eq!(env.get("flutter.minSdkVersion"), Some("21"));
        assert_eq!(env.get("flutter.targetSdkVersion"), Some("34"));
    }

    // Verify loading from the file-system
    //
    // The file extension selects the parser.
    #[test]
    fn load_path() {
        let dir = tempfile::tempdir().unwrap();

        let toml_path = dir.path().join("flutter.toml");
        std::fs::write(&toml_path, "[flutter]\nminSdkVersion = 21\n").unwrap();
        let env = Environment::load_path(&toml_path).unwrap();
        assert_eq!(env.get("flutter.minSdkVersion"), Some("21"));

        let props_path = dir.path().join("local.properties");
        std::fs::write(&props_path, "flutter.minSdkVersion=23\n").unwrap();
        let env = Environment::load_path(&props_path).unwrap();
        assert_eq!(env.get("flutter.minSdkVersion"), Some("23"));

        assert!(matches!(
            Environment::load_path(&dir.path().join("missing.properties")),
            Err(ConfigurationError::Io { .. }),
        ));
    }
}
