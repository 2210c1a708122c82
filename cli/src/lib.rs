//! Command-line surface of `zpdb`.
//!
//! ```text
//! zpdb print    # entry -> stdout
//! zpdb write    # stdin -> entry
//! zpdb append   # entry + stdin -> entry
//! ```

use std::ffi::OsString;
use std::io;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use zpdb_archive::ZipEntryStore;
use zpdb_core::Command;
use zpdb_core::Completion;
use zpdb_core::ContainerPaths;
use zpdb_core::OpenProbe;
use zpdb_core::ProcessRelauncher;
use zpdb_core::ProtocolOptions;
use zpdb_core::UpdateProtocol;
use zpdb_core::ZpdbError;
use zpdb_utils_self_path::resolve_self_path;

const DEFAULT_EXE_NAME: &str = "zpdb";

/// Raw invocation. Help and version flags are disabled: every token other
/// than a known command is a usage error. Anything after the command is
/// accepted and ignored, but still forwarded when the binary relaunches
/// itself.
#[derive(Debug, Parser)]
#[command(
    name = "zpdb",
    disable_help_flag = true,
    disable_version_flag = true
)]
pub struct Cli {
    /// One of `print`, `write` or `append`.
    #[arg(value_name = "COMMAND", allow_hyphen_values = true)]
    pub command: Option<OsString>,

    #[arg(trailing_var_arg = true, allow_hyphen_values = true, hide = true)]
    pub rest: Vec<OsString>,
}

impl Cli {
    /// The requested command, or `None` when no command was given.
    pub fn parsed_command(&self) -> Option<Result<Command, ZpdbError>> {
        self.command
            .as_ref()
            .map(|token| token.to_string_lossy().parse::<Command>())
    }
}

/// Install a stderr `tracing` subscriber; `RUST_LOG` overrides the default
/// `warn` level. Standard output is left to `print`.
pub fn init_logging() {
    let default_level = "warn";
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(default_level))
                .unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(io::stderr)
        .try_init();
}

/// Usage text listing every command.
pub fn usage(exe_name: &str) -> String {
    let mut text = format!("{exe_name} <command>\n");
    for command in Command::ALL {
        text.push_str(&format!("\t{command} - {}\n", command.description()));
    }
    text
}

/// Parse `args` (including the program name) and run the requested command.
pub fn run_main(args: Vec<OsString>) -> ExitCode {
    let exe_name = args
        .first()
        .map(|arg0| arg0.to_string_lossy().into_owned())
        .unwrap_or_else(|| DEFAULT_EXE_NAME.to_string());

    let command = match Cli::try_parse_from(&args).map(|cli| cli.parsed_command()) {
        Ok(Some(Ok(command))) => command,
        Ok(Some(Err(err))) => {
            eprintln!("{err}");
            return usage_failure(&exe_name);
        }
        Ok(None) => {
            eprintln!("No arguments");
            return usage_failure(&exe_name);
        }
        Err(err) => {
            debug!(kind = ?err.kind(), "argument parsing failed: {err}");
            return usage_failure(&exe_name);
        }
    };

    match run(command, &args) {
        Ok(completion) => {
            debug!(?completion, "invocation finished");
            ExitCode::SUCCESS
        }
        Err(err) => {
            report_error(&err);
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command, args: &[OsString]) -> anyhow::Result<Completion> {
    let (arg0, forwarded) = args.split_first().context("missing program name")?;
    let resolved = resolve_self_path(arg0).context("failed to resolve the running binary")?;

    let options = ProtocolOptions::default();
    let paths = ContainerPaths::from_resolved(resolved, &options.staging_suffix);
    debug!(
        container = %paths.original().display(),
        role = ?paths.role(),
        "resolved container"
    );

    let store = ZipEntryStore::default();
    let probe = OpenProbe;
    let relauncher = ProcessRelauncher;
    let protocol = UpdateProtocol::new(paths, options, &store, &probe, &relauncher);

    let stdin = io::stdin();
    let stdout = io::stdout();
    protocol
        .run(command, forwarded, &mut stdin.lock(), &mut stdout.lock())
        .with_context(|| format!("`{command}` failed"))
}

fn usage_failure(exe_name: &str) -> ExitCode {
    eprint!("{}", usage(exe_name));
    ExitCode::FAILURE
}

fn report_error(err: &anyhow::Error) {
    eprintln!("Error: {err:#}");
    let os_error = err
        .chain()
        .filter_map(|cause| cause.downcast_ref::<io::Error>())
        .find_map(io::Error::raw_os_error);
    if let Some(code) = os_error {
        eprintln!("OS error code: {code}");
        eprintln!("OS error message: {}", io::Error::from_raw_os_error(code));
    }
}
