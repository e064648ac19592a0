//! Jobs: commands that run in the background or were suspended from the
//! foreground, and the one-time status reports they produce.

use std::fmt;

use nix::sys::signal::Signal;
use nix::unistd::Pid;

use crate::core::command::Command;

/// Stable display identifier of a job; 1-based position in the job table.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct JobId(pub u32);

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum JobState {
    Running,
    Stopped,
    Done,
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            JobState::Running => write!(f, "Running"),
            JobState::Stopped => write!(f, "Stopped"),
            JobState::Done => write!(f, "Done"),
        }
    }
}

/// A tracked command. Jobs stay in the table for the life of the session;
/// once `Done` and reported they are skipped by polls and listings.
#[derive(Clone, Debug)]
pub struct Job {
    id: JobId,
    command: Command,
    pid: Pid,
    state: JobState,
    reported: bool,
}

impl Job {
    pub fn new(id: JobId, command: Command, pid: Pid, state: JobState) -> Job {
        Job {
            id,
            command,
            pid,
            state,
            reported: false,
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn input(&self) -> &str {
        self.command.input()
    }

    /// A retired job has terminated and its status line has been printed.
    pub fn is_retired(&self) -> bool {
        self.state == JobState::Done && self.reported
    }

    pub(crate) fn set_state(&mut self, state: JobState) {
        self.state = state;
    }

    /// Marks the job's one-time report as consumed.
    pub(crate) fn mark_reported(&mut self) {
        self.reported = true;
    }

    /// Records a normal exit and produces the job's one status event.
    pub(crate) fn mark_exited(&mut self, code: i32) -> JobEvent {
        self.state = JobState::Done;
        self.reported = true;
        JobEvent {
            id: self.id,
            input: self.command.input().to_string(),
            kind: if code == 0 {
                JobEventKind::Done
            } else {
                JobEventKind::Exit(code)
            },
        }
    }

    /// Records a signal-caused termination and produces the status event.
    pub(crate) fn mark_signaled(&mut self, signal: Signal) -> JobEvent {
        self.state = JobState::Done;
        self.reported = true;
        JobEvent {
            id: self.id,
            input: self.command.input().to_string(),
            kind: JobEventKind::Terminated(signal),
        }
    }

    /// Retires the job without an event, for children that cannot be
    /// waited on anymore.
    pub(crate) fn retire(&mut self) {
        self.state = JobState::Done;
        self.reported = true;
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]\t{}\t\t{}", self.id, self.state, self.input())
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A status change observed for a job; printed by the read loop, at most
/// once per job.
#[derive(Clone, Debug, PartialEq)]
pub struct JobEvent {
    pub id: JobId,
    pub input: String,
    pub kind: JobEventKind,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum JobEventKind {
    /// Exited with status zero.
    Done,
    /// Exited with the contained nonzero status.
    Exit(i32),
    /// Terminated by the contained signal.
    Terminated(Signal),
}

impl fmt::Display for JobEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            JobEventKind::Done => write!(f, "[{}]\tDone\t\t{}", self.id, self.input),
            JobEventKind::Exit(code) => write!(f, "[{}]\tExit\t{}\t{}", self.id, code, self.input),
            JobEventKind::Terminated(_) => {
                write!(f, "[{}]\tTerminated\t{}", self.id, self.input)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_job() -> Job {
        let command = Command::parse("sleep 5 &").unwrap();
        Job::new(JobId(1), command, Pid::from_raw(100), JobState::Running)
    }

    #[test]
    fn job_starts_unreported() {
        let job = test_job();
        assert_eq!(job.state(), JobState::Running);
        assert!(!job.is_retired());
    }

    #[test]
    fn exit_zero_reports_done() {
        let mut job = test_job();
        let event = job.mark_exited(0);
        assert_eq!(event.kind, JobEventKind::Done);
        assert_eq!(format!("{}", event), "[1]\tDone\t\tsleep 5 &");
        assert!(job.is_retired());
    }

    #[test]
    fn nonzero_exit_reports_status() {
        let mut job = test_job();
        let event = job.mark_exited(3);
        assert_eq!(event.kind, JobEventKind::Exit(3));
        assert_eq!(format!("{}", event), "[1]\tExit\t3\tsleep 5 &");
    }

    #[test]
    fn signal_reports_terminated() {
        let mut job = test_job();
        let event = job.mark_signaled(Signal::SIGKILL);
        assert_eq!(event.kind, JobEventKind::Terminated(Signal::SIGKILL));
        assert_eq!(format!("{}", event), "[1]\tTerminated\tsleep 5 &");
    }

    #[test]
    fn suspended_job_lists_as_stopped() {
        let mut job = test_job();
        job.set_state(JobState::Stopped);
        assert_eq!(format!("{}", job), "[1]\tStopped\t\tsleep 5 &");
    }
}
