//! Android Module Build Descriptors
//!
//! This crate interprets build descriptors of Android application modules.
//! A descriptor declares what the build file of a module would otherwise
//! hard-code: the Gradle plugins it applies, its SDK levels, the Java and
//! Kotlin language levels, and the signing configuration of each build type.
//! Cross-platform toolchains like Flutter own some of these parameters, so
//! the descriptor can refer to them symbolically (`${flutter.minSdkVersion}`)
//! instead of repeating them.
//!
//! The crate does not build anything. It resolves a descriptor against the
//! values provided by the host toolchain, verifies the result, and hands it
//! to an external build executor. Packaging, signing, and toolchain
//! invocation remain the business of the host build tool.
//!
//! Model
//! -----
//!
//! Processing is a single linear pass, performed once per build invocation:
//!
//!  1. The descriptor is parsed from TOML and verified
//!     ([`descriptor::Descriptor`]). All literals are checked at this point.
//!
//!  2. An environment mapping symbol names to values is assembled from
//!     TOML files, `local.properties` style files, and command-line
//!     definitions ([`environment::Environment`]).
//!
//!  3. All references are resolved against the environment
//!     ([`resolve::resolve()`]). An unbound symbol, a value of the wrong
//!     type, or contradicting language levels abort resolution with a
//!     [`error::ConfigurationError`].
//!
//!  4. The resolved record is rendered for the executor, as JSON, Gradle
//!     properties, or Gradle command-line arguments ([`op::emit`]).
//!
//! The resolved record is immutable and contains no references. Resolving it
//! again is a no-op.
//!
//! The `droid-descriptor` command-line tool drives these steps. See its
//! `--help` output for the supported operations.

pub mod descriptor;
pub mod environment;
pub mod error;
pub mod java;
pub mod resolve;
pub mod signing;
pub mod symbol;

/// Descriptor Operations
///
/// The `op` module is a collection of all operations that can be performed via
/// the command-line interface. Each operation is implemented in a submodule
/// and can be used independently.
pub mod op {
    pub mod emit;
    pub mod symbols;
}

pub use descriptor::Descriptor;
pub use environment::Environment;
pub use error::ConfigurationError;
pub use resolve::{resolve, Resolved};
