//! Process launching: the fork/exec protocol for foreground and
//! background commands, and the child-side wiring of redirections and
//! the pipe stage.

use std::convert::Infallible;
use std::ffi::CString;
use std::os::unix::io::RawFd;
use std::process::{self, ExitStatus};

use failure::{Fail, ResultExt};
use log::debug;
use nix::errno::Errno;
use nix::fcntl::{self, OFlag};
use nix::libc;
use nix::sys::signal::{self, SigHandler, Signal};
use nix::sys::stat::Mode;
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{self, ForkResult, Pid};

use crate::core::command::Command;
use crate::core::job::{JobId, JobState};
use crate::errors::{Error, ErrorKind, Result};
use crate::shell::job_control::{self, JobManager};
use crate::util::PshExitStatusExt;

/// Exit status of a child whose redirection target could not be opened.
pub const REDIRECT_FAILED_EXIT_STATUS: i32 = 126;
/// Exit status of a child whose program could not be executed.
pub const EXEC_FAILED_EXIT_STATUS: i32 = 127;

/// Outcome of launching an external command.
#[derive(Debug)]
pub enum Launched {
    /// Ran in the foreground and terminated with this status.
    Foreground(ExitStatus),
    /// Placed in the job table and left running.
    Background(JobId, Pid),
    /// The foreground command was stopped and moved into the job table.
    Suspended(JobId),
}

/// Forks exactly once and runs `command` in the child. The foreground
/// path blocks until the child terminates or stops; the background path
/// records the job and returns immediately. A failed fork surfaces as
/// `LaunchFailed` and records nothing.
pub fn launch(command: Command, background: bool, jobs: &mut JobManager) -> Result<Launched> {
    match unsafe { unistd::fork() } {
        Err(err) => Err(err.context(ErrorKind::LaunchFailed).into()),
        Ok(ForkResult::Child) => run_child(&command),
        Ok(ForkResult::Parent { child }) => {
            debug!("forked {} for '{}'", child, command.input());
            if background {
                // Its own process group, so the terminal's stop signal
                // only ever reaches the foreground command.
                log_if_err!(
                    unistd::setpgid(child, child),
                    "failed to set process group for {}",
                    child
                );
                let id = jobs.add_job(command, child, JobState::Running);
                Ok(Launched::Background(id, child))
            } else {
                wait_for_foreground(command, child, jobs)
            }
        }
    }
}

/// Blocks until the foreground child exits or stops. The wait reports
/// stop events, so a suspended command can migrate into the job table
/// here, on the main loop, rather than in signal context.
fn wait_for_foreground(command: Command, child: Pid, jobs: &mut JobManager) -> Result<Launched> {
    job_control::set_foreground_pid(Some(child));
    let outcome = loop {
        match waitpid(child, Some(WaitPidFlag::WUNTRACED)) {
            Ok(WaitStatus::Exited(_, code)) => {
                break Ok(Launched::Foreground(ExitStatus::from_status(code)));
            }
            Ok(WaitStatus::Signaled(_, sig, _)) => {
                break Ok(Launched::Foreground(ExitStatus::from_status(
                    128 + sig as i32,
                )));
            }
            Ok(WaitStatus::Stopped(..)) => {
                let id = jobs.add_job(command, child, JobState::Stopped);
                break Ok(Launched::Suspended(id));
            }
            Ok(status) => debug!("foreground {} reported {:?}", child, status),
            Err(Errno::EINTR) => {}
            Err(err) => break Err(err.context(ErrorKind::Nix).into()),
        }
    };
    job_control::set_foreground_pid(None);
    outcome
}

/// Child branch of the first fork: prepares and replaces the process
/// image, or exits with a status distinguishing what failed. Never
/// returns into the shell's own control flow.
fn run_child(command: &Command) -> ! {
    let error = match execute(command) {
        Err(error) => error,
        Ok(never) => match never {},
    };
    eprintln!("psh: {}", error);
    let code = match error.kind() {
        ErrorKind::RedirectFailed(_) => REDIRECT_FAILED_EXIT_STATUS,
        _ => EXEC_FAILED_EXIT_STATUS,
    };
    process::exit(code);
}

/// Wires up redirections and the pipe stage, then execs. Only returns
/// on failure.
fn execute(command: &Command) -> Result<Infallible> {
    restore_default_signal_handlers();

    if let Some(path) = command.redirect_in() {
        let fd = fcntl::open(path, OFlag::O_RDONLY, Mode::empty())
            .map_err(|_| Error::redirect_failed(path))?;
        replace_fd(fd, libc::STDIN_FILENO)?;
    }
    if let Some(path) = command.redirect_out() {
        let fd = fcntl::open(
            path,
            OFlag::O_WRONLY | OFlag::O_CREAT | OFlag::O_TRUNC,
            Mode::from_bits_truncate(0o644),
        )
        .map_err(|_| Error::redirect_failed(path))?;
        replace_fd(fd, libc::STDOUT_FILENO)?;
    }

    // Redirections were applied before the split, so `<` reaches the
    // left command and `>` the right one; each pipe branch's dup below
    // overrides its inner end.
    let (left, right) = command.pipeline();
    match right {
        Some(right) => execute_pipeline(&left, &right),
        None => execute_program(&left),
    }
}

/// The single pipe stage: one more fork, the child reading from the pipe
/// and execing the right-hand command, the parent writing into it and
/// execing the left-hand one. Both branches close the endpoint they do
/// not use.
fn execute_pipeline(left: &[&str], right: &[&str]) -> Result<Infallible> {
    let (read_end, write_end) = unistd::pipe().context(ErrorKind::Nix)?;
    match unsafe { unistd::fork() }.context(ErrorKind::LaunchFailed)? {
        ForkResult::Child => {
            let _ = unistd::close(write_end);
            replace_fd(read_end, libc::STDIN_FILENO)?;
            execute_program(right)
        }
        ForkResult::Parent { .. } => {
            let _ = unistd::close(read_end);
            replace_fd(write_end, libc::STDOUT_FILENO)?;
            execute_program(left)
        }
    }
}

/// Replaces the process image; only returns if exec fails.
fn execute_program(argv: &[&str]) -> Result<Infallible> {
    let program = *argv
        .first()
        .ok_or_else(|| Error::malformed_command("missing command name"))?;
    let c_program =
        CString::new(program).map_err(|_| Error::command_not_found(program))?;
    let c_argv = argv
        .iter()
        .map(|arg| CString::new(*arg))
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|_| Error::command_not_found(program))?;
    unistd::execvp(&c_program, &c_argv).map_err(|_| Error::command_not_found(program))
}

fn replace_fd(fd: RawFd, target: RawFd) -> Result<()> {
    if fd == target {
        return Ok(());
    }
    unistd::dup2(fd, target).context(ErrorKind::Nix)?;
    unistd::close(fd).context(ErrorKind::Nix)?;
    Ok(())
}

/// The shell routes SIGINT/SIGTSTP through the signal bridge; children
/// must see the default dispositions again before exec.
fn restore_default_signal_handlers() {
    unsafe {
        let _ = signal::signal(Signal::SIGINT, SigHandler::SigDfl);
        let _ = signal::signal(Signal::SIGTSTP, SigHandler::SigDfl);
    }
}
