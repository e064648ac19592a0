use crate::shell::builtins::{self, prelude::*};

pub struct Exit;

impl builtins::BuiltinCommand for Exit {
    const NAME: &'static str = builtins::EXIT_NAME;

    const HELP: &'static str = "\
exit: exit [n]
    Exit the shell with a status of N. If N is omitted, the exit status
    is that of the last command executed.";

    fn run<T: AsRef<str>>(shell: &mut Shell, args: &[T], _stdout: &mut dyn Write) -> Result<()> {
        let status_code = args
            .first()
            .map(|arg| {
                arg.as_ref().parse::<i32>().unwrap_or_else(|_| {
                    eprintln!("psh: exit: {}: numeric argument required", arg.as_ref());
                    2
                })
            })
            .map(ExitStatus::from_status);
        shell.exit(status_code)
    }
}
