//! Symbolic References
//!
//! Descriptor fields can either carry a literal value, or refer to a value
//! provided by the host toolchain at build time. References are written as a
//! string of the form `${name}`, where `name` is a dot-separated sequence of
//! identifiers (e.g., `${flutter.compileSdkVersion}`). The reference must
//! span the whole value; partial interpolation is not supported.

/// Literal Conversion
///
/// Types that descriptor fields can hold. Literals written in the descriptor
/// and values bound in the environment both go through `parse_literal()`,
/// so a value is accepted or refused the same way no matter where it comes
/// from.
pub trait Literal: Sized {
    /// Description of the accepted form, used in error messages.
    const EXPECTED: &'static str;

    /// Convert the textual form into a value, or `None` if not acceptable.
    fn parse_literal(s: &str) -> Option<Self>;
}

impl Literal for u32 {
    const EXPECTED: &'static str = "a non-negative integer";

    fn parse_literal(s: &str) -> Option<Self> {
        let s = s.trim();

        if s.is_empty() || !s.chars().all(|v| v.is_ascii_digit()) {
            None
        } else {
            s.parse().ok()
        }
    }
}

// Strings starting with `${` are never literals. In the descriptor they are
// references, and a bound value must not smuggle one into a resolved record.
impl Literal for String {
    const EXPECTED: &'static str = "a plain string without quotes, backslashes, control characters or references";

    fn parse_literal(s: &str) -> Option<Self> {
        if crate::descriptor::is_quotable(s) && !s.starts_with("${") {
            Some(s.to_string())
        } else {
            None
        }
    }
}

impl Literal for crate::java::JavaVersion {
    const EXPECTED: &'static str = "a java version such as '1.8', '17' or 'VERSION_17'";

    fn parse_literal(s: &str) -> Option<Self> {
        s.parse().ok()
    }
}

impl Literal for crate::signing::SigningRef {
    const EXPECTED: &'static str = "the name of a signing config";

    fn parse_literal(s: &str) -> Option<Self> {
        s.trim().parse().ok()
    }
}

/// Descriptor Value
///
/// A descriptor field that is either already known, or still refers to a
/// symbol of the environment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Value<T> {
    Literal(T),
    Symbol(String),
}

impl<T: Literal> Value<T> {
    /// Parse a descriptor field
    ///
    /// Interpret `s`, the textual content of the descriptor field `field`,
    /// either as reference or as literal of type `T`.
    pub fn parse(field: &str, s: &str) -> Result<Self, crate::error::ConfigurationError> {
        match parse_reference(s) {
            Err(message) => Err(crate::error::ConfigurationError::invalid(field, message)),
            Ok(Some(name)) => Ok(Value::Symbol(name.to_string())),
            Ok(None) => T::parse_literal(s)
                .map(Value::Literal)
                .ok_or_else(
                    || crate::error::ConfigurationError::invalid(
                        field,
                        format!("'{}' is not {}", s, T::EXPECTED),
                    )
                ),
        }
    }
}

impl<T> Value<T> {
    /// Return the referenced symbol name, if this is a reference.
    pub fn symbol(&self) -> Option<&str> {
        match self {
            Value::Literal(_) => None,
            Value::Symbol(v) => Some(v.as_str()),
        }
    }

    /// Return the literal, if this is not a reference.
    pub fn literal(&self) -> Option<&T> {
        match self {
            Value::Literal(v) => Some(v),
            Value::Symbol(_) => None,
        }
    }
}

// Check whether a string is a valid symbol segment
//
// Segments are ASCII identifiers. The first character must not be a digit.
// Dashes are allowed after the first character, since Gradle property names
// commonly use them.
fn is_segment(s: &str) -> bool {
    let mut chars = s.chars();

    match chars.next() {
        Some(v) if v.is_ascii_alphabetic() || v == '_' => {},
        _ => return false,
    }

    chars.all(|v| v.is_ascii_alphanumeric() || v == '_' || v == '-')
}

/// Check whether a string is a valid symbol name
///
/// A symbol name is a non-empty, dot-separated sequence of segments. Empty
/// segments (leading, trailing, or doubled dots) are rejected.
pub fn is_symbol_name(s: &str) -> bool {
    !s.is_empty() && s.split('.').all(is_segment)
}

/// Parse a symbolic reference
///
/// Return the symbol name if `s` is written as a reference, `Ok(None)` if it
/// is a plain literal, or an error message if it starts like a reference but
/// is malformed.
pub fn parse_reference(s: &str) -> Result<Option<&str>, String> {
    let Some(rest) = s.strip_prefix("${") else {
        return Ok(None);
    };

    let Some(name) = rest.strip_suffix('}') else {
        return Err(format!("unterminated reference '{}'", s));
    };

    if !is_symbol_name(name) {
        return Err(format!("invalid symbol name '{}'", name));
    }

    Ok(Some(name))
}

/// Format a symbol name as a reference
pub fn reference(name: &str) -> String {
    format!("${{{}}}", name)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Verify symbol name validation
    #[test]
    fn symbol_names() {
        assert!(is_symbol_name("flutter"));
        assert!(is_symbol_name("flutter.compileSdkVersion"));
        assert!(is_symbol_name("env.KEY_PASSWORD"));
        assert!(is_symbol_name("signing.upload-key.alias"));

        assert!(!is_symbol_name(""));
        assert!(!is_symbol_name(".flutter"));
        assert!(!is_symbol_name("flutter."));
        assert!(!is_symbol_name("flutter..ndk"));
        assert!(!is_symbol_name("0flutter"));
        assert!(!is_symbol_name("flutter.ndk version"));
    }

    // Verify reference parsing
    //
    // Plain strings are literals, well-formed references yield their name,
    // and anything that starts like a reference but is malformed is refused.
    #[test]
    fn references() {
        assert_eq!(parse_reference("17").unwrap(), None);
        assert_eq!(parse_reference("1.0.0").unwrap(), None);
        assert_eq!(parse_reference("$HOME").unwrap(), None);
        assert_eq!(
            parse_reference("${flutter.versionName}").unwrap(),
            Some("flutter.versionName"),
        );

        assert!(parse_reference("${flutter.versionName").is_err());
        assert!(parse_reference("${}").is_err());
        assert!(parse_reference("${flutter version}").is_err());
    }

    // Verify typed field parsing
    //
    // References are accepted for any type, literals only if they convert
    // into the field type.
    #[test]
    fn typed_values() {
        assert_eq!(
            Value::<u32>::parse("android.compile-sdk", "34").unwrap(),
            Value::Literal(34),
        );
        assert_eq!(
            Value::<u32>::parse("android.compile-sdk", "${flutter.compileSdkVersion}").unwrap(),
            Value::Symbol("flutter.compileSdkVersion".to_string()),
        );
        assert_eq!(
            Value::<crate::java::JavaVersion>::parse("source", "VERSION_17").unwrap().literal(),
            crate::java::JavaVersion::new(17).as_ref(),
        );

        assert!(Value::<u32>::parse("android.compile-sdk", "-1").is_err());
        assert!(Value::<u32>::parse("android.compile-sdk", "thirty-four").is_err());
        assert!(Value::<String>::parse("android.version-name", "1.0\"beta").is_err());
        assert!(Value::<String>::parse("android.version-name", "${flutter.").is_err());
    }

    // Verify strings shaped like references are never literals
    #[test]
    fn string_literals() {
        assert_eq!(String::parse_literal("1.0.0"), Some("1.0.0".to_string()));
        assert_eq!(String::parse_literal("$HOME"), Some("$HOME".to_string()));
        assert_eq!(String::parse_literal("a${b}"), Some("a${b}".to_string()));

        assert_eq!(String::parse_literal("${flutter.versionName}"), None);
        assert_eq!(String::parse_literal("${flutter.versionName"), None);
        assert_eq!(String::parse_literal("${"), None);
    }

    // Verify formatting yields a parsable reference
    #[test]
    fn reference_formatting() {
        let r = reference("flutter.minSdkVersion");

        assert_eq!(r, "${flutter.minSdkVersion}");
        assert_eq!(parse_reference(&r).unwrap(), Some("flutter.minSdkVersion"));
    }
}
