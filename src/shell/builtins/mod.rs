//! Psh builtins
//!
//! This module includes the implementations of the shell builtin
//! commands. Where possible the commands conform to their standard Bash
//! counterparts.

use std::io::Write;
use std::process::ExitStatus;

use crate::errors::{ErrorKind, Result};
use crate::shell::shell::Shell;
use crate::util::PshExitStatusExt;

use self::exit::Exit;
use self::help::Help;
use self::jobs::{Bg, Jobs};

pub mod prelude {
    pub use std::io::Write;
    pub use std::process::ExitStatus;

    pub use failure::ResultExt;

    pub use crate::errors::{Error, ErrorKind, Result};
    pub use crate::shell::shell::Shell;
    pub use crate::util::PshExitStatusExt;
}

mod exit;
mod help;
mod jobs;

pub const BG_NAME: &str = "bg";
pub const EXIT_NAME: &str = "exit";
pub const HELP_NAME: &str = "help";
pub const JOBS_NAME: &str = "jobs";

/// Represents a psh builtin command such as jobs or exit.
pub trait BuiltinCommand {
    /// The NAME of the command.
    const NAME: &'static str;
    /// The help string to display to the user.
    const HELP: &'static str;
    /// The usage string to display to the user.
    fn usage() -> String {
        Self::HELP.lines().next().unwrap_or(Self::NAME).to_owned()
    }
    /// Runs the command with the given arguments in the `shell`
    /// environment.
    fn run<T: AsRef<str>>(shell: &mut Shell, args: &[T], stdout: &mut dyn Write) -> Result<()>;
}

pub fn is_builtin<T: AsRef<str>>(program: T) -> bool {
    [BG_NAME, EXIT_NAME, HELP_NAME, JOBS_NAME].contains(&program.as_ref())
}

/// precondition: command is a builtin.
/// Returns (`exit_status_code`, `builtin_result`)
pub fn run<S1, S2>(
    shell: &mut Shell,
    program: S1,
    args: &[S2],
    stdout: &mut dyn Write,
) -> (ExitStatus, Result<()>)
where
    S1: AsRef<str>,
    S2: AsRef<str>,
{
    debug_assert!(is_builtin(&program));

    let result = match program.as_ref() {
        BG_NAME => Bg::run(shell, args, stdout),
        EXIT_NAME => Exit::run(shell, args, stdout),
        HELP_NAME => Help::run(shell, args, stdout),
        JOBS_NAME => Jobs::run(shell, args, stdout),
        _ => unreachable!(),
    };

    let exit_status = get_builtin_exit_status(&result);
    (exit_status, result)
}

fn get_builtin_exit_status(result: &Result<()>) -> ExitStatus {
    let status = if let Err(ref e) = *result {
        match *e.kind() {
            ErrorKind::BuiltinCommand { code, .. } => code,
            _ => 1,
        }
    } else {
        0
    };

    ExitStatus::from_status(status)
}
