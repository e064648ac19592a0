//! Line editing and history: the input-acquisition side of the shell.
//! The rest of the shell only ever sees one line of text per prompt
//! cycle.

use std::fmt;
use std::io;
use std::path::Path;

use failure::{Fail, ResultExt};
use rustyline::{
    self,
    completion::{Completer, FilenameCompleter, Pair},
    error::ReadlineError,
    highlight::Highlighter,
    hint::Hinter,
    validate::Validator,
    CompletionType, Config, Helper,
};

use crate::errors::{ErrorKind, Result};

struct EditorHelper(FilenameCompleter);

impl Completer for EditorHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        ctx: &rustyline::Context<'_>,
    ) -> ::std::result::Result<(usize, Vec<Pair>), ReadlineError> {
        self.0.complete(line, pos, ctx)
    }
}

impl Hinter for EditorHelper {
    type Hint = String;

    fn hint(&self, _line: &str, _pos: usize, _ctx: &rustyline::Context<'_>) -> Option<Self::Hint> {
        None
    }
}

impl Highlighter for EditorHelper {}

impl Helper for EditorHelper {}

impl Validator for EditorHelper {}

pub struct Editor {
    internal: rustyline::Editor<EditorHelper>,
    history_capacity: usize,
}

impl Editor {
    pub fn with_capacity(history_capacity: usize) -> Editor {
        let config = Config::builder()
            .max_history_size(history_capacity)
            .history_ignore_space(true)
            .completion_type(CompletionType::Circular)
            .build();

        let mut internal = rustyline::Editor::with_config(config);
        internal.set_helper(Some(EditorHelper(FilenameCompleter::new())));

        Editor {
            internal,
            history_capacity,
        }
    }

    /// Reads one line; `None` means end of file (Ctrl-D).
    pub fn readline(&mut self, prompt: &str) -> Result<Option<String>> {
        match self.internal.readline(prompt) {
            Ok(line) => Ok(Some(line)),
            Err(e) => {
                if let ReadlineError::Eof = e {
                    return Ok(None);
                }

                Err(e.context(ErrorKind::Readline).into())
            }
        }
    }

    pub fn load_history<P: AsRef<Path> + ?Sized>(&mut self, path: &P) -> Result<()> {
        match self.internal.load_history(path) {
            Ok(()) => Ok(()),
            Err(e) => {
                if let ReadlineError::Io(ref inner) = e {
                    if inner.kind() == io::ErrorKind::NotFound {
                        return Ok(());
                    }
                }

                Err(e.context(ErrorKind::Readline).into())
            }
        }
    }

    pub fn save_history<P: AsRef<Path> + ?Sized>(&mut self, path: &P) -> Result<()> {
        self.internal
            .save_history(path)
            .context(ErrorKind::Readline)?;
        Ok(())
    }

    pub fn add_history_entry(&mut self, line: &str) {
        self.internal.add_history_entry(line);
    }
}

impl fmt::Debug for Editor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "history len: {}", self.internal.history().len())?;
        write!(f, "history capacity: {}", self.history_capacity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_with_capacity() {
        let editor = Editor::with_capacity(10);
        assert!(editor.internal.history().is_empty());
        assert_eq!(editor.history_capacity, 10);
    }

    #[test]
    fn add_history_entry_duplicate() {
        let mut editor = Editor::with_capacity(2);

        let item = "dup";
        editor.add_history_entry(item);
        assert_eq!(editor.internal.history().len(), 1);

        editor.add_history_entry(item);
        assert_eq!(editor.internal.history().len(), 1);
    }

    #[test]
    fn history_rolls_over_at_capacity() {
        let mut editor = Editor::with_capacity(2);
        editor.add_history_entry("one");
        editor.add_history_entry("two");
        editor.add_history_entry("three");
        assert_eq!(editor.internal.history().len(), 2);
    }
}
