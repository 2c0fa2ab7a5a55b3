use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "script-debug",
    version,
    about = "Run and step through Lua scripts under an embedded debugger",
    long_about = None
)]
pub struct Cli {
    /// Increase log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Settings file (defaults to the platform config directory)
    #[arg(long, global = true, env = "SCRIPT_DEBUG_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn verbosity(&self) -> Verbosity {
        if self.quiet {
            return Verbosity::Quiet;
        }
        match self.verbose {
            0 => Verbosity::Normal,
            1 => Verbosity::Verbose,
            2 => Verbosity::Debug,
            _ => Verbosity::Trace,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a script to completion, reporting every pause and fault
    Run(RunArgs),

    /// Step through a script at an interactive prompt
    Debug(DebugArgs),

    /// Print a shell completion script
    Completions(CompletionsArgs),
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Lua source file to execute
    pub file: PathBuf,

    /// Line to report a pause at; repeatable. Execution resumes on its own.
    #[arg(short = 'b', long = "break", value_name = "LINE")]
    pub breakpoints: Vec<u32>,

    /// Milliseconds to wait after each line
    #[arg(long, value_name = "MS")]
    pub delay: Option<u64>,

    /// Extra directory for `require`; repeatable
    #[arg(short = 'I', long = "include", value_name = "DIR")]
    pub search_paths: Vec<PathBuf>,

    /// Also report each executed line (text output only)
    #[arg(long)]
    pub trace_lines: bool,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub output: OutputFormat,
}

#[derive(Args, Debug)]
pub struct DebugArgs {
    /// Lua source file to debug
    pub file: PathBuf,

    /// Initial breakpoint; repeatable
    #[arg(short = 'b', long = "break", value_name = "LINE")]
    pub breakpoints: Vec<u32>,

    /// Milliseconds to wait after each line
    #[arg(long, value_name = "MS")]
    pub delay: Option<u64>,

    /// Extra directory for `require`; repeatable
    #[arg(short = 'I', long = "include", value_name = "DIR")]
    pub search_paths: Vec<PathBuf>,

    /// Stop on the first line instead of running to the first breakpoint
    #[arg(long)]
    pub stop_on_entry: bool,
}

#[derive(Args, Debug)]
pub struct CompletionsArgs {
    #[arg(value_enum)]
    pub shell: clap_complete::Shell,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose,
    Debug,
    Trace,
}

impl Verbosity {
    /// Filter directive for this verbosity, or `configured` when no flag was given.
    pub fn to_log_level<'a>(self, configured: &'a str) -> &'a str {
        match self {
            Verbosity::Quiet => "error",
            Verbosity::Normal => configured,
            Verbosity::Verbose => "info",
            Verbosity::Debug => "debug",
            Verbosity::Trace => "trace",
        }
    }
}
