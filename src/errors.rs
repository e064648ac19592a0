//! Error module. See the [failure](https://crates.io/crates/failure) crate for details.

use std::fmt;
use std::result;

use failure::{Backtrace, Context, Fail};

pub type Result<T> = result::Result<T, Error>;

#[derive(Debug)]
pub struct Error {
    ctx: Context<ErrorKind>,
}

impl Error {
    pub fn kind(&self) -> &ErrorKind {
        self.ctx.get_context()
    }

    pub(crate) fn line_too_long(length: usize, max: usize) -> Error {
        Error::from(ErrorKind::LineTooLong { length, max })
    }

    pub(crate) fn malformed_command<T: AsRef<str>>(message: T) -> Error {
        Error::from(ErrorKind::MalformedCommand(message.as_ref().to_string()))
    }

    pub(crate) fn builtin_command<T: AsRef<str>>(message: T, code: i32) -> Error {
        Error::from(ErrorKind::BuiltinCommand {
            message: message.as_ref().to_string(),
            code,
        })
    }

    pub(crate) fn command_not_found<T: AsRef<str>>(command: T) -> Error {
        Error::from(ErrorKind::CommandNotFound(command.as_ref().to_string()))
    }

    pub(crate) fn redirect_failed<T: AsRef<str>>(path: T) -> Error {
        Error::from(ErrorKind::RedirectFailed(path.as_ref().to_string()))
    }

    pub(crate) fn no_such_job<T: AsRef<str>>(job: T) -> Error {
        Error::from(ErrorKind::NoSuchJob(job.as_ref().to_string()))
    }
}

impl Fail for Error {
    fn cause(&self) -> Option<&dyn Fail> {
        self.ctx.cause()
    }

    fn backtrace(&self) -> Option<&Backtrace> {
        self.ctx.backtrace()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.ctx.fmt(f)
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    LineTooLong { length: usize, max: usize },
    MalformedCommand(String),
    LaunchFailed,
    CommandNotFound(String),
    RedirectFailed(String),
    NoSuchJob(String),
    BuiltinCommand { message: String, code: i32 },
    Io,
    Nix,
    Readline,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            ErrorKind::LineTooLong { length, max } => {
                write!(f, "input line too long ({} > {} bytes)", length, max)
            }
            ErrorKind::MalformedCommand(ref message) => write!(f, "malformed command: {}", message),
            ErrorKind::LaunchFailed => write!(f, "failed to fork process"),
            ErrorKind::CommandNotFound(ref command) => write!(f, "{}: command not found", command),
            ErrorKind::RedirectFailed(ref path) => write!(f, "cannot open {}", path),
            ErrorKind::NoSuchJob(ref job) => write!(f, "{}: no such job", job),
            ErrorKind::BuiltinCommand { ref message, .. } => write!(f, "{}", message),
            ErrorKind::Io => write!(f, "I/O error occurred"),
            ErrorKind::Nix => write!(f, "system call error occurred"),
            ErrorKind::Readline => write!(f, "readline error occurred"),
        }
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Error {
        Error::from(Context::new(kind))
    }
}

impl From<Context<ErrorKind>> for Error {
    fn from(ctx: Context<ErrorKind>) -> Error {
        Error { ctx }
    }
}
