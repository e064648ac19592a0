use crate::core::job::JobId;
use crate::shell::builtins::{self, prelude::*};

pub struct Jobs;

impl builtins::BuiltinCommand for Jobs {
    const NAME: &'static str = builtins::JOBS_NAME;

    const HELP: &'static str = "\
jobs: jobs
    Display status of jobs.

    Lists the background and stopped jobs with their job numbers. A job
    that finished is listed as Done once; after that it no longer
    appears.

    Exit Status:
    Returns success unless an error occurs.";

    fn run<T: AsRef<str>>(shell: &mut Shell, _args: &[T], stdout: &mut dyn Write) -> Result<()> {
        for (id, state, input) in shell.list_jobs() {
            writeln!(stdout, "[{}]\t{}\t\t{}", id, state, input).context(ErrorKind::Io)?;
        }
        Ok(())
    }
}

pub struct Bg;

impl builtins::BuiltinCommand for Bg {
    const NAME: &'static str = builtins::BG_NAME;

    const HELP: &'static str = "\
bg: bg <jobspec>
    Move a job to the background.

    Resume the stopped job identified by JOBSPEC in the background, as
    if it had been started with `&'.

    Exit Status:
    Returns success unless job JOBSPEC is not found or an error occurs.";

    fn run<T: AsRef<str>>(shell: &mut Shell, args: &[T], _stdout: &mut dyn Write) -> Result<()> {
        let jobspec = args
            .first()
            .ok_or_else(|| Error::builtin_command("bg: job spec required", 1))?;
        let id = jobspec
            .as_ref()
            .parse::<u32>()
            .map(JobId)
            .map_err(|e| Error::builtin_command(format!("bg: {}", e), 1))?;
        shell.resume_job(id)?;
        Ok(())
    }
}
