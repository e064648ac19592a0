//! The shell itself: responsible for the read loop, dispatching builtins
//! and external commands, and reporting job status changes.

use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{self, ExitStatus};

use failure::ResultExt;
use log::{error, info, warn};

use crate::core::command::Command;
use crate::core::job::{JobId, JobState};
use crate::editor::Editor;
use crate::errors::{ErrorKind, Result};
use crate::shell::builtins;
use crate::shell::execute_command::{self, Launched};
use crate::shell::job_control::{self, JobManager};
use crate::util::{self, PshExitStatusExt};

const HISTORY_FILE_NAME: &str = ".psh_history";
const SYNTAX_ERROR_EXIT_STATUS: i32 = 2;

/// Prompt written before every read in interactive mode.
pub static PROMPT: &str = "psh> ";

/// Psh Shell
pub struct Shell {
    editor: Editor,
    history_file: Option<PathBuf>,
    job_manager: JobManager,
    /// Exit status of last command executed.
    last_exit_status: ExitStatus,
    config: ShellConfig,
    /// Is `false` if the shell is running a script or if installing the
    /// signal bridge fails.
    is_interactive: bool,
}

impl Shell {
    /// Constructs a new Shell to manage running jobs and command history.
    pub fn new(config: ShellConfig) -> Result<Shell> {
        let mut shell = Shell {
            editor: Editor::with_capacity(config.command_history_capacity),
            history_file: None,
            job_manager: Default::default(),
            last_exit_status: ExitStatus::from_success(),
            config,
            is_interactive: util::isatty(),
        };

        if shell.is_interactive && config.enable_job_control {
            if let Err(e) = job_control::initialize_job_control() {
                error!("failed to install the signal bridge despite isatty: {}", e);
                shell.is_interactive = false;
            }
        }

        if config.enable_command_history {
            shell.load_history()?;
        }

        info!("psh started up");
        Ok(shell)
    }

    /// True when the shell is attached to a terminal and the signal
    /// bridge is installed.
    pub fn is_interactive(&self) -> bool {
        self.is_interactive
    }

    fn load_history(&mut self) -> Result<()> {
        self.history_file = dirs::home_dir().map(|p| p.join(HISTORY_FILE_NAME));
        match self.history_file {
            Some(ref history_file) => self.editor.load_history(history_file)?,
            None => warn!("unable to get home directory"),
        }
        Ok(())
    }

    /// Reads one line of input.
    /// Returns `None` when end of file is reached.
    fn prompt(&mut self) -> Result<Option<String>> {
        self.editor.readline(PROMPT)
    }

    /// Runs a job from a command string.
    pub fn execute_command_string(&mut self, input: &str) -> Result<()> {
        if input.is_empty() {
            return Ok(());
        }

        let command = match Command::parse(input) {
            Ok(command) => command,
            Err(e) => match *e.kind() {
                ErrorKind::LineTooLong { .. } | ErrorKind::MalformedCommand(_) => {
                    eprintln!("psh: {}", e);
                    self.last_exit_status = ExitStatus::from_status(SYNTAX_ERROR_EXIT_STATUS);
                    return Ok(());
                }
                _ => return Err(e),
            },
        };
        if command.is_empty() {
            return Ok(());
        }

        if self.config.enable_command_history {
            self.editor.add_history_entry(command.input());
        }

        self.execute_command(command)
    }

    /// Runs a psh script from a file.
    pub fn execute_commands_from_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let mut f = File::open(path).context(ErrorKind::Io)?;
        let mut buffer = String::new();
        f.read_to_string(&mut buffer).context(ErrorKind::Io)?;

        for line in buffer.lines() {
            self.execute_command_string(line)?;
        }

        Ok(())
    }

    /// Runs jobs from stdin until EOF is received.
    pub fn execute_from_stdin(&mut self) {
        loop {
            if self.config.enable_job_control {
                // Report background jobs that changed state, once each.
                for event in self.job_manager.poll_jobs() {
                    println!("{}", event);
                }
            }

            let input = match self.prompt() {
                Ok(Some(line)) => line.trim().to_owned(),
                Ok(None) => break,
                e => {
                    log_if_err!(e, "prompt");
                    continue;
                }
            };

            let result = self.execute_command_string(&input);
            if let Err(ref e) = result {
                eprintln!("psh: {}", e);
            }
            log_if_err!(result, "execute_command_string");
        }
    }

    /// Runs a job.
    fn execute_command(&mut self, command: Command) -> Result<()> {
        if let Some(program) = command.program() {
            if builtins::is_builtin(program) {
                return self.execute_builtin(&command);
            }
        }

        // `&` only backgrounds under job control; scripts always wait.
        let background = command.background() && self.config.enable_job_control;
        match execute_command::launch(command, background, &mut self.job_manager)? {
            Launched::Foreground(status) => {
                self.last_exit_status = status;
            }
            Launched::Background(id, pid) => {
                println!("[{}] {}", id, pid);
            }
            Launched::Suspended(id) => {
                if let Some(job) = self.job_manager.job(id) {
                    println!("{}", job);
                }
                self.last_exit_status = ExitStatus::from_failure();
            }
        }
        Ok(())
    }

    fn execute_builtin(&mut self, command: &Command) -> Result<()> {
        let (argv, _) = command.pipeline();
        let program = argv
            .first()
            .cloned()
            .unwrap_or_default();
        let args = &argv[1..];
        let (status, result) = builtins::run(self, program, args, &mut io::stdout());
        self.last_exit_status = status;
        if let Err(e) = result {
            eprintln!("psh: {}", e);
        }
        Ok(())
    }

    /// Returns the shell's jobs, skipping entries that have already been
    /// reported done.
    pub fn list_jobs(&mut self) -> Vec<(JobId, JobState, String)> {
        self.job_manager.list_jobs()
    }

    /// Continues the stopped job with the given number in the background.
    pub fn resume_job(&mut self, id: JobId) -> Result<()> {
        self.job_manager.resume(id)
    }

    /// Exit the shell.
    ///
    /// Valid exit codes are between 0 and 255. Like bash and its
    /// descendents, it automatically converts exit codes to a u8 such that
    /// positive n becomes n & 256 and negative n becomes (256 + n) % 256.
    ///
    /// Exit the shell with a status of n. If n is None, then the exit
    /// status is that of the last command executed.
    pub fn exit(&mut self, n: Option<ExitStatus>) -> ! {
        if self.config.display_messages {
            println!("exit");
        }

        let code = match n {
            Some(n) => n.code().unwrap_or(1),
            None => self.last_exit_status.code().unwrap_or(1),
        };
        let code_like_u8 = if code < 0 {
            (256 + code) % 256
        } else {
            code % 256
        };

        if self.config.enable_command_history {
            if let Some(ref history_file) = self.history_file {
                if let Err(e) = self.editor.save_history(history_file) {
                    error!(
                        "error: failed to save history to file during shutdown: {}",
                        e
                    );
                }
            }
        }

        info!("psh has shut down");
        process::exit(code_like_u8);
    }
}

impl fmt::Debug for Shell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}\n{:?}", self.job_manager, self.editor)
    }
}

/// Policy object to control a Shell's behavior
#[derive(Debug, Copy, Clone)]
pub struct ShellConfig {
    /// Determines if new command entries will be added to the shell's
    /// command history.
    enable_command_history: bool,

    /// Number of entries to store in the shell's command history
    command_history_capacity: usize,

    /// Determines if job control (`&`, Ctrl-Z, bg) is supported.
    enable_job_control: bool,

    /// Determines if some messages (e.g. "exit") should be displayed.
    display_messages: bool,
}

impl ShellConfig {
    /// Creates an interactive shell, e.g. command history, job control
    ///
    /// # Complete List
    /// - Command History is enabled
    /// - Job Control is enabled
    /// - Some additional messages are displayed
    pub fn interactive(command_history_capacity: usize) -> ShellConfig {
        ShellConfig {
            enable_command_history: true,
            command_history_capacity,
            enable_job_control: true,
            display_messages: true,
        }
    }

    /// Creates a noninteractive shell, e.g. no command history, no job
    /// control
    ///
    /// # Complete List
    /// - Command History is disabled. Commands are not saved.
    /// - Job Control is disabled; `&` commands are waited on.
    /// - Fewer messages are displayed
    pub fn noninteractive() -> ShellConfig {
        Default::default()
    }
}

impl Default for ShellConfig {
    fn default() -> ShellConfig {
        ShellConfig {
            enable_command_history: false,
            command_history_capacity: 0,
            enable_job_control: false,
            display_messages: false,
        }
    }
}
