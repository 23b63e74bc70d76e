use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};
use partmux_partition::AcceptFailurePolicy;

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod decode;
pub mod simulate;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a scripted scenario through one partition over memory rings.
    Simulate(SimulateArgs),
    /// Decode a single raw frame.
    Decode(DecodeArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Simulate(args) => simulate::run(args, format),
        Command::Decode(args) => decode::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum PolicyArg {
    Abort,
    Isolate,
}

impl From<PolicyArg> for AcceptFailurePolicy {
    fn from(policy: PolicyArg) -> Self {
        match policy {
            PolicyArg::Abort => AcceptFailurePolicy::Abort,
            PolicyArg::Isolate => AcceptFailurePolicy::Isolate,
        }
    }
}

#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// JSON scenario script.
    pub script: PathBuf,
    /// Override the script's accept failure policy.
    #[arg(long, value_name = "POLICY")]
    pub accept_failure: Option<PolicyArg>,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// File holding the raw frame bytes.
    pub file: PathBuf,
    /// Byte offset of the frame within the file.
    #[arg(long, default_value = "0")]
    pub offset: usize,
    /// Frame length. Default: the rest of the file.
    #[arg(long)]
    pub length: Option<usize>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}
