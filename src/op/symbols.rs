//! Symbol Listing
//!
//! The `symbols` operation lists every symbolic reference of a descriptor
//! along with the value the environment binds to it. It is the diagnostic
//! counterpart of resolution: resolution stops at the first unbound symbol,
//! this operation reports all of them.

/// Symbol Binding
///
/// A symbolic reference of the descriptor and its binding, if any.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Binding<'a> {
    /// Descriptor field carrying the reference.
    pub field: String,
    /// Referenced symbol name.
    pub symbol: &'a str,
    /// Value bound in the environment.
    pub value: Option<&'a str>,
}

impl<'a> Binding<'a> {
    /// Whether the bound value must not be displayed.
    pub fn is_secret(&self) -> bool {
        self.field.ends_with("-password")
    }
}

/// List symbol bindings
///
/// Return the bindings of all symbolic references of `descriptor`, in
/// resolution order.
pub fn symbols<'a>(
    descriptor: &'a crate::descriptor::Descriptor,
    env: &'a crate::environment::Environment,
) -> Vec<Binding<'a>> {
    descriptor.symbols()
        .into_iter()
        .map(
            |(field, symbol)| Binding {
                field: field,
                symbol: symbol,
                value: env.get(symbol),
            }
        )
        .collect()
}

/// Render symbol bindings
///
/// Produce one line per binding: the symbol, the field referencing it, and
/// the bound value. Unbound symbols are marked as such, secret values are
/// hidden.
pub fn render(bindings: &[Binding<'_>]) -> String {
    let width = bindings.iter().map(|v| v.symbol.len()).max().unwrap_or(0);
    let mut out = String::new();

    for b in bindings {
        let value = match b.value {
            None => "<unbound>".to_string(),
            Some(_) if b.is_secret() => "<hidden>".to_string(),
            Some(v) => format!("'{}'", v),
        };

        out.push_str(&format!("{:width$}  {}  {}\n", b.symbol, value, b.field, width = width));
    }

    out
}
