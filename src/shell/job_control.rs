//! The job table and the signal bridge.
//!
//! The table is the single source of truth for background/suspended
//! commands. It is append-only: entries are only ever marked, never
//! removed, so a job's number stays valid for `jobs` and `bg` for the
//! whole session.
//!
//! The bridge forwards the terminal's stop/interrupt signals to the
//! current foreground process from a dedicated thread. The thread never
//! touches the table; a stopped foreground command migrates into the
//! table on the main loop, once its blocking wait observes the stop.

use std::sync::atomic::{AtomicI32, Ordering};
use std::thread;

use failure::ResultExt;
use log::{debug, warn};
use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;
use signal_hook::consts::signal::{SIGINT, SIGTSTP};
use signal_hook::iterator::Signals;

use crate::core::command::Command;
use crate::core::job::{Job, JobEvent, JobId, JobState};
use crate::errors::{Error, ErrorKind, Result};

/// Pid of the process the shell is waiting on synchronously, or 0.
static FOREGROUND_PID: AtomicI32 = AtomicI32::new(0);

/// Publishes (or clears) the foreground process for the signal bridge.
pub fn set_foreground_pid(pid: Option<Pid>) {
    FOREGROUND_PID.store(pid.map_or(0, Pid::as_raw), Ordering::SeqCst);
}

pub fn foreground_pid() -> Option<Pid> {
    match FOREGROUND_PID.load(Ordering::SeqCst) {
        0 => None,
        raw => Some(Pid::from_raw(raw)),
    }
}

/// Installs the signal bridge. SIGTSTP (Ctrl-Z) and SIGINT (Ctrl-C) are
/// routed to this process and forwarded to the foreground child, if any;
/// with no foreground command the delivery is a no-op. The shell itself
/// is never stopped or interrupted by them.
pub fn initialize_job_control() -> Result<()> {
    let mut signals = Signals::new(&[SIGTSTP, SIGINT]).context(ErrorKind::Io)?;
    thread::Builder::new()
        .name("signal-bridge".to_string())
        .spawn(move || {
            for received in signals.forever() {
                let forwarded = match received {
                    SIGTSTP => Signal::SIGTSTP,
                    SIGINT => Signal::SIGINT,
                    _ => continue,
                };
                match foreground_pid() {
                    Some(pid) => {
                        debug!("forwarding {:?} to foreground process {}", forwarded, pid);
                        log_if_err!(
                            signal::kill(pid, forwarded),
                            "failed to forward {:?} to {}",
                            forwarded,
                            pid
                        );
                    }
                    None => debug!("received {:?} with no foreground process", forwarded),
                }
            }
        })
        .context(ErrorKind::Io)?;
    Ok(())
}

/// Ordered registry of launched jobs.
#[derive(Debug, Default)]
pub struct JobManager {
    jobs: Vec<Job>,
}

impl JobManager {
    /// Appends a job; the returned id is its stable 1-based table index.
    pub fn add_job(&mut self, command: Command, pid: Pid, state: JobState) -> JobId {
        let id = JobId(self.jobs.len() as u32 + 1);
        debug!("adding job [{}] pid {} ({:?})", id, pid, state);
        self.jobs.push(Job::new(id, command, pid, state));
        id
    }

    pub fn job(&self, id: JobId) -> Option<&Job> {
        id.0.checked_sub(1).and_then(|index| self.jobs.get(index as usize))
    }

    /// Checks every unfinished job for termination, without blocking, in
    /// table order. Each newly terminated job yields exactly one event;
    /// emitting the event consumes the job's report, so later polls skip
    /// it entirely.
    pub fn poll_jobs(&mut self) -> Vec<JobEvent> {
        let mut events = Vec::new();
        for job in &mut self.jobs {
            if job.state() == JobState::Done {
                continue;
            }
            match waitpid(job.pid(), Some(WaitPidFlag::WNOHANG)) {
                Ok(WaitStatus::StillAlive) => {}
                Ok(WaitStatus::Exited(_, code)) => events.push(job.mark_exited(code)),
                Ok(WaitStatus::Signaled(_, signal, _)) => events.push(job.mark_signaled(signal)),
                Ok(status) => debug!("job [{}] reported {:?}", job.id(), status),
                Err(Errno::ECHILD) => {
                    // Nothing left to wait on; retire silently instead of
                    // failing the same way on every later poll.
                    warn!("job [{}] pid {} has no waitable child", job.id(), job.pid());
                    job.retire();
                }
                Err(err) => warn!("waitpid failed for job [{}]: {}", job.id(), err),
            }
        }
        events
    }

    /// Table listing for the `jobs` builtin, skipping retired entries.
    /// Listing a `Done` job consumes its one-time report, the same guard
    /// `poll_jobs` uses.
    pub fn list_jobs(&mut self) -> Vec<(JobId, JobState, String)> {
        let mut listing = Vec::new();
        for job in &mut self.jobs {
            if job.is_retired() {
                continue;
            }
            if job.state() == JobState::Done {
                job.mark_reported();
            }
            listing.push((job.id(), job.state(), job.input().to_string()));
        }
        listing
    }

    /// Continues a stopped job (`bg` builtin): sends SIGCONT to its
    /// process and marks it running again. A job number that is out of
    /// range or already finished fails without signaling anything.
    pub fn resume(&mut self, id: JobId) -> Result<()> {
        let job = match id.0.checked_sub(1).and_then(|index| self.jobs.get_mut(index as usize)) {
            Some(job) if job.state() != JobState::Done => job,
            _ => return Err(Error::no_such_job(id.to_string())),
        };
        debug!("continuing job [{}] pid {}", id, job.pid());
        signal::kill(job.pid(), Signal::SIGCONT).context(ErrorKind::Nix)?;
        job.set_state(JobState::Running);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process;
    use std::time::Duration;

    use crate::core::job::JobEventKind;

    fn spawn_and_track(
        manager: &mut JobManager,
        line: &str,
        program: &str,
        args: &[&str],
    ) -> (process::Child, JobId) {
        let child = process::Command::new(program)
            .args(args)
            .spawn()
            .expect("failed to spawn test child");
        let command = Command::parse(line).unwrap();
        let id = manager.add_job(command, Pid::from_raw(child.id() as i32), JobState::Running);
        (child, id)
    }

    fn poll_until_events(manager: &mut JobManager) -> Vec<JobEvent> {
        for _ in 0..500 {
            let events = manager.poll_jobs();
            if !events.is_empty() {
                return events;
            }
            thread::sleep(Duration::from_millis(10));
        }
        panic!("no job event observed within five seconds");
    }

    #[test]
    fn completed_job_is_reported_exactly_once() {
        let mut manager = JobManager::default();
        let (_child, id) = spawn_and_track(&mut manager, "true &", "true", &[]);

        let events = poll_until_events(&mut manager);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id, id);
        assert_eq!(events[0].kind, JobEventKind::Done);
        assert_eq!(events[0].input, "true &");

        // the report is consumed; nothing is ever printed again
        assert!(manager.poll_jobs().is_empty());
        assert!(manager.list_jobs().is_empty());
    }

    #[test]
    fn nonzero_exit_is_reported_with_its_status() {
        let mut manager = JobManager::default();
        let (_child, id) = spawn_and_track(&mut manager, "false &", "false", &[]);

        let events = poll_until_events(&mut manager);
        assert_eq!(events[0].id, id);
        assert_eq!(events[0].kind, JobEventKind::Exit(1));
    }

    #[test]
    fn killed_job_is_reported_as_terminated() {
        let mut manager = JobManager::default();
        let (child, id) = spawn_and_track(&mut manager, "sleep 30 &", "sleep", &["30"]);

        signal::kill(Pid::from_raw(child.id() as i32), Signal::SIGKILL).unwrap();
        let events = poll_until_events(&mut manager);
        assert_eq!(events[0].id, id);
        assert_eq!(events[0].kind, JobEventKind::Terminated(Signal::SIGKILL));
    }

    #[test]
    fn job_ids_stay_stable_after_other_jobs_finish() {
        let mut manager = JobManager::default();
        let (sleeper, first) = spawn_and_track(&mut manager, "sleep 30 &", "sleep", &["30"]);
        let (_true_child, second) = spawn_and_track(&mut manager, "true &", "true", &[]);

        let events = poll_until_events(&mut manager);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id, second);

        let listing = manager.list_jobs();
        assert_eq!(listing.len(), 1);
        assert_eq!(listing[0].0, first);
        assert_eq!(listing[0].1, JobState::Running);

        signal::kill(Pid::from_raw(sleeper.id() as i32), Signal::SIGKILL).unwrap();
        let events = poll_until_events(&mut manager);
        assert_eq!(events[0].id, first);
    }

    #[test]
    fn resume_with_invalid_index_signals_nothing() {
        let mut manager = JobManager::default();
        let err = manager.resume(JobId(4)).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::NoSuchJob(_)));
    }

    #[test]
    fn resume_continues_a_stopped_job() {
        let mut manager = JobManager::default();
        let (child, id) = spawn_and_track(&mut manager, "sleep 30 &", "sleep", &["30"]);
        let pid = Pid::from_raw(child.id() as i32);

        signal::kill(pid, Signal::SIGSTOP).unwrap();
        if let Some(job) = id.0.checked_sub(1).map(|i| &mut manager.jobs[i as usize]) {
            job.set_state(JobState::Stopped);
        }

        manager.resume(id).unwrap();
        assert_eq!(manager.job(id).unwrap().state(), JobState::Running);

        signal::kill(pid, Signal::SIGKILL).unwrap();
        let events = poll_until_events(&mut manager);
        assert_eq!(events[0].kind, JobEventKind::Terminated(Signal::SIGKILL));
    }

    #[test]
    fn foreground_pid_round_trips() {
        set_foreground_pid(Some(Pid::from_raw(42)));
        assert_eq!(foreground_pid(), Some(Pid::from_raw(42)));
        set_foreground_pid(None);
        assert_eq!(foreground_pid(), None);
    }
}
