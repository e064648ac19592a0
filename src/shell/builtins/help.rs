use crate::shell::builtins::{self, BuiltinCommand, prelude::*};
use crate::shell::builtins::exit::Exit;
use crate::shell::builtins::jobs::{Bg, Jobs};

pub struct Help;

impl BuiltinCommand for Help {
    const NAME: &'static str = builtins::HELP_NAME;

    const HELP: &'static str = "\
help: help [command ...]
    Display helpful information about builtin commands. If COMMAND is
    specified, gives detailed help on all commands matching COMMAND,
    otherwise a list of the builtins is printed.";

    fn run<T: AsRef<str>>(_shell: &mut Shell, args: &[T], stdout: &mut dyn Write) -> Result<()> {
        if args.is_empty() {
            print_all_usage_strings(stdout)?;
        } else {
            let mut all_invalid = true;
            for arg in args {
                let msg = match arg.as_ref() {
                    builtins::BG_NAME => Some(Bg::HELP),
                    builtins::EXIT_NAME => Some(Exit::HELP),
                    builtins::HELP_NAME => Some(Help::HELP),
                    builtins::JOBS_NAME => Some(Jobs::HELP),
                    _ => None,
                };
                if let Some(msg) = msg {
                    writeln!(stdout, "{}", msg).context(ErrorKind::Io)?;
                    all_invalid = false;
                }
            }
            if all_invalid {
                let cmd = args.last().map(AsRef::as_ref).unwrap_or_default();
                return Err(Error::builtin_command(
                    format!("help: no help topics match {}", cmd),
                    1,
                ));
            }
        }
        Ok(())
    }
}

fn print_all_usage_strings(stdout: &mut dyn Write) -> Result<()> {
    writeln!(stdout, "{}", Bg::usage()).context(ErrorKind::Io)?;
    writeln!(stdout, "{}", Exit::usage()).context(ErrorKind::Io)?;
    writeln!(stdout, "{}", Help::usage()).context(ErrorKind::Io)?;
    writeln!(stdout, "{}", Jobs::usage()).context(ErrorKind::Io)?;
    Ok(())
}
