//! Psh - a small command line shell with POSIX job control.
//!
//! The shell reads one command line per prompt cycle, parses it into a
//! [`core::command::Command`], and runs it as a child process with support
//! for input/output redirection, a single pipe stage, background execution
//! with `&`, and job control (suspend with Ctrl-Z, `bg`, `jobs`).

#![deny(trivial_casts, trivial_numeric_casts, unused_import_braces)]

macro_rules! log_if_err {
    ($result:expr, $($args:tt)*) => {
        if let Err(ref err) = $result {
            log::error!("{}: {}", format_args!($($args)*), err);
        }
    };
}

pub mod errors;
pub mod util;

pub mod core;
mod editor;
pub mod shell;

pub use crate::shell::execute_command::Launched;
pub use crate::shell::shell::{Shell, ShellConfig};
pub use crate::util::PshExitStatusExt;
