//! Build Descriptor Tooling
//!
//! This is the entry-point of `droid-descriptor`, a command-line tool to
//! resolve build descriptors of Android application modules. Its main input
//! is the descriptor, usually `descriptor.toml` next to the module, plus any
//! number of environment files and definitions supplied by the host
//! toolchain. The resolved record is written in a format suitable for the
//! external build executor.
//!
//! This CLI is mainly a dispatcher of all the operations available in
//! `droid_descriptor::op::*`. It is a simple clap-based CLI that forwards the
//! arguments to `droid_descriptor` and visualizes the results.

use clap;
use droid_descriptor;

struct Cli {
    cmd: clap::Command,
}

fn arg_format(
    s: &str,
) -> Result<droid_descriptor::op::emit::Format, clap::error::Error> {
    s.parse().map_err(
        |_| {
            clap::error::Error::raw(
                clap::error::ErrorKind::ValueValidation,
                "Invalid output format",
            )
        }
    )
}

fn arg_define(
    s: &str,
) -> Result<(String, String), clap::error::Error> {
    droid_descriptor::Environment::parse_define(s).map_err(
        |v| {
            clap::error::Error::raw(
                clap::error::ErrorKind::ValueValidation,
                v.to_string(),
            )
        }
    )
}

// Install the log subscriber
//
// Logs go to STDERR, so they never mix with rendered records on STDOUT.
// `RUST_LOG` takes precedence over the verbosity flag. A subscriber that is
// already installed is kept.
fn init_tracing(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

impl Cli {
    fn new() -> Self {
        let mut cmd;

        cmd = clap::Command::new("droid-descriptor")
            .propagate_version(true)
            .subcommand_required(true)
            .about("Build Descriptor Tooling")
            .long_about("Resolve build descriptors of Android application modules")
            .version(clap::crate_version!());

        cmd = cmd.arg(
            clap::Arg::new("descriptor")
                .long("descriptor")
                .value_name("PATH")
                .help("Path to the build descriptor relative to the working directory")
                .default_value("./descriptor.toml")
                .global(true)
                .value_parser(clap::value_parser!(std::path::PathBuf))
        );

        cmd = cmd.arg(
            clap::Arg::new("env")
                .long("env")
                .value_name("PATH")
                .help("Environment file to resolve symbols from (TOML or properties)")
                .action(clap::ArgAction::Append)
                .global(true)
                .value_parser(clap::value_parser!(std::path::PathBuf))
        );

        cmd = cmd.arg(
            clap::Arg::new("define")
                .long("define")
                .short('D')
                .value_name("KEY=VALUE")
                .help("Bind a symbol, overriding environment files")
                .action(clap::ArgAction::Append)
                .global(true)
                .value_parser(arg_define)
        );

        cmd = cmd.arg(
            clap::Arg::new("verbose")
                .long("verbose")
                .short('v')
                .help("Log resolution details to STDERR")
                .action(clap::ArgAction::SetTrue)
                .global(true)
        );

        cmd = cmd.subcommand(
            clap::Command::new("resolve")
                .about("Resolve the descriptor and emit the resolved record")
                .arg(
                    clap::Arg::new("format")
                        .long("format")
                        .value_name("FORMAT")
                        .help("Output format: json, properties, or arguments")
                        .default_value("json")
                        .value_parser(arg_format)
                )
                .arg(
                    clap::Arg::new("output")
                        .long("output")
                        .value_name("PATH")
                        .help("Write the record to a file rather than STDOUT")
                        .value_parser(clap::value_parser!(std::path::PathBuf))
                )
        );

        cmd = cmd.subcommand(
            clap::Command::new("symbols")
                .about("List symbolic references and their bindings")
        );

        Self {
            cmd: cmd,
        }
    }

    fn descriptor(
        &self,
        m: &clap::ArgMatches,
    ) -> Result<droid_descriptor::Descriptor, u8> {
        let path = m.get_one::<std::path::PathBuf>("descriptor")
            .expect("Descriptor path lacks a default");

        droid_descriptor::Descriptor::parse_path(path).map_err(
            |v| {
                eprintln!("Cannot parse build descriptor {:?}: {}", path, v);
                1
            }
        )
    }

    // Assemble the environment
    //
    // Files are merged in command-line order, then definitions are applied
    // on top, so definitions always win.
    fn environment(
        &self,
        m: &clap::ArgMatches,
    ) -> Result<droid_descriptor::Environment, u8> {
        let mut env = droid_descriptor::Environment::new();

        for path in m.get_many::<std::path::PathBuf>("env").into_iter().flatten() {
            let v = droid_descriptor::Environment::load_path(path).map_err(
                |v| {
                    eprintln!("Cannot load environment {:?}: {}", path, v);
                    1
                }
            )?;
            env.merge(v);
        }

        for (key, value) in m.get_many::<(String, String)>("define").into_iter().flatten() {
            env.insert(key.as_str(), value.as_str());
        }

        Ok(env)
    }

    fn op_resolve(
        &self,
        m_op: &clap::ArgMatches,
    ) -> Result<(), u8> {
        let descriptor = self.descriptor(m_op)?;
        let env = self.environment(m_op)?;
        let format = *m_op.get_one::<droid_descriptor::op::emit::Format>("format")
            .expect("Format-flag lacks a value");

        let resolved = droid_descriptor::resolve(&descriptor, &env).map_err(
            |v| {
                eprintln!("Cannot resolve build descriptor: {}", v);
                1
            }
        )?;

        let r = match m_op.get_one::<std::path::PathBuf>("output") {
            Some(path) => droid_descriptor::op::emit::emit(&resolved, format, path)
                .map(|_| ()),
            None => droid_descriptor::op::emit::render(&resolved, format)
                .map(|v| print!("{}", v)),
        };

        r.map_err(
            |v| {
                eprintln!("Cannot emit resolved descriptor: {}", v);
                1
            }
        )
    }

    fn op_symbols(
        &self,
        m_op: &clap::ArgMatches,
    ) -> Result<(), u8> {
        let descriptor = self.descriptor(m_op)?;
        let env = self.environment(m_op)?;

        let bindings = droid_descriptor::op::symbols::symbols(&descriptor, &env);
        print!("{}", droid_descriptor::op::symbols::render(&bindings));

        let unbound = bindings.iter().filter(|v| v.value.is_none()).count();
        if unbound > 0 {
            eprintln!("{} of {} symbols are unbound", unbound, bindings.len());
            Err(1)
        } else {
            Ok(())
        }
    }

    fn run<I, T>(mut self, args: I) -> Result<(), u8>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let (m, r);

        r = self.cmd.try_get_matches_from_mut(args);

        match r {
            Ok(v) => m = v,
            Err(e) => {
                return match e.kind() {
                    clap::error::ErrorKind::DisplayHelp |
                    clap::error::ErrorKind::DisplayVersion => {
                        e.print().expect("Cannot write to STDERR");
                        Ok(())
                    },
                    _ => {
                        e.print().expect("Cannot write to STDERR");
                        Err(2)
                    }
                }
            }
        }

        // Global arguments propagate into the subcommand matches, so all
        // operations read them from there.
        let Some((op, m_op)) = m.subcommand() else {
            std::unreachable!();
        };

        init_tracing(m_op.get_flag("verbose"));

        match op {
            "resolve" => self.op_resolve(m_op),
            "symbols" => self.op_symbols(m_op),
            _ => std::unreachable!(),
        }
    }
}

fn main() -> std::process::ExitCode {
    match Cli::new().run(std::env::args_os()) {
        Ok(()) => 0.into(),
        Err(v) => v.into(),
    }
}
