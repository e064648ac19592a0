//! The command model: one parsed input line.
//!
//! A line is a flat sequence of whitespace-separated tokens; each token is
//! either a plain argument or one of the four operators (`>`, `<`, `|`,
//! `&`). Keeping the tokens in a single tagged sequence means there is no
//! parallel-array bookkeeping to get wrong, and the executable pieces
//! (argv, redirect targets, pipeline halves) are derived views over it.

use std::fmt;

use crate::errors::{Error, Result};

/// Longest accepted input line, in bytes. Longer lines fail to parse.
pub const MAX_LINE_LEN: usize = 1024;

/// One of the four operator symbols recognized by the parser.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Operator {
    RedirectOut,
    RedirectIn,
    Pipe,
    Background,
}

impl Operator {
    pub fn symbol(self) -> char {
        match self {
            Operator::RedirectOut => '>',
            Operator::RedirectIn => '<',
            Operator::Pipe => '|',
            Operator::Background => '&',
        }
    }

    fn from_token(token: &str) -> Option<Operator> {
        match token {
            ">" => Some(Operator::RedirectOut),
            "<" => Some(Operator::RedirectIn),
            "|" => Some(Operator::Pipe),
            "&" => Some(Operator::Background),
            _ => None,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// A single token of the command line.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Token {
    Argument(String),
    Operator(Operator),
}

/// A parsed command line.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Command {
    input: String,
    tokens: Vec<Token>,
}

impl Command {
    /// Parses one line of input.
    ///
    /// Splits on whitespace; a token that is exactly one of the four
    /// operator symbols becomes an operator token, everything else an
    /// argument token. The trailing newline is stripped before
    /// tokenizing. Lines longer than [`MAX_LINE_LEN`] fail with
    /// `LineTooLong`, and unsupported operator placement (a repeated
    /// operator, a redirect without a file operand, a one-sided pipe, a
    /// `&` that is not last, or a line starting with an operator) fails
    /// with `MalformedCommand`.
    pub fn parse(line: &str) -> Result<Command> {
        let input = line.trim_end_matches('\n');
        if input.len() > MAX_LINE_LEN {
            return Err(Error::line_too_long(input.len(), MAX_LINE_LEN));
        }

        let tokens = input
            .split_whitespace()
            .map(|token| match Operator::from_token(token) {
                Some(operator) => Token::Operator(operator),
                None => Token::Argument(token.to_string()),
            })
            .collect();

        let command = Command {
            input: input.trim().to_string(),
            tokens,
        };
        command.validate()?;
        Ok(command)
    }

    /// The raw input line, retained for job listings and status reports.
    pub fn input(&self) -> &str {
        &self.input
    }

    /// True for a blank line; the read loop skips these.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// The program name, i.e. the leading argument token.
    pub fn program(&self) -> Option<&str> {
        match self.tokens.first() {
            Some(Token::Argument(argument)) => Some(argument),
            _ => None,
        }
    }

    /// Index of the first (leftmost) occurrence of `operator`.
    pub fn find_operator(&self, operator: Operator) -> Option<usize> {
        self.tokens
            .iter()
            .position(|token| *token == Token::Operator(operator))
    }

    /// True when the line ends with `&`.
    pub fn background(&self) -> bool {
        self.find_operator(Operator::Background).is_some()
    }

    /// The input redirection target, i.e. the argument following `<`.
    pub fn redirect_in(&self) -> Option<&str> {
        self.operand_after(Operator::RedirectIn)
    }

    /// The output redirection target, i.e. the argument following `>`.
    pub fn redirect_out(&self) -> Option<&str> {
        self.operand_after(Operator::RedirectOut)
    }

    /// The argument vectors to execute: everything left of the pipe and,
    /// if a pipe is present, everything right of it. Redirect targets and
    /// operators are not part of either argv.
    pub fn pipeline(&self) -> (Vec<&str>, Option<Vec<&str>>) {
        let pipe = self.find_operator(Operator::Pipe);
        let mut left = Vec::new();
        let mut right = Vec::new();

        for (index, token) in self.tokens.iter().enumerate() {
            if let Token::Argument(argument) = token {
                if self.is_redirect_target(index) {
                    continue;
                }
                match pipe {
                    Some(position) if index > position => right.push(argument.as_str()),
                    _ => left.push(argument.as_str()),
                }
            }
        }

        (left, pipe.map(|_| right))
    }

    fn operand_after(&self, operator: Operator) -> Option<&str> {
        let position = self.find_operator(operator)?;
        match self.tokens.get(position + 1) {
            Some(Token::Argument(argument)) => Some(argument),
            _ => None,
        }
    }

    fn is_redirect_target(&self, index: usize) -> bool {
        match self.tokens.get(index.wrapping_sub(1)) {
            Some(Token::Operator(Operator::RedirectIn))
            | Some(Token::Operator(Operator::RedirectOut)) => true,
            _ => false,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.tokens.is_empty() {
            return Ok(());
        }

        for operator in &[
            Operator::RedirectOut,
            Operator::RedirectIn,
            Operator::Pipe,
            Operator::Background,
        ] {
            let occurrences = self
                .tokens
                .iter()
                .filter(|token| **token == Token::Operator(*operator))
                .count();
            if occurrences > 1 {
                return Err(Error::malformed_command(format!(
                    "'{}' may appear at most once",
                    operator
                )));
            }
        }

        if self.program().is_none() {
            return Err(Error::malformed_command("missing command name"));
        }

        for operator in &[Operator::RedirectIn, Operator::RedirectOut] {
            if self.find_operator(*operator).is_some() && self.operand_after(*operator).is_none() {
                return Err(Error::malformed_command(format!(
                    "'{}' requires a file operand",
                    operator
                )));
            }
        }

        if let Some(position) = self.find_operator(Operator::Pipe) {
            match self.tokens.get(position + 1) {
                Some(Token::Argument(_)) => {}
                _ => {
                    return Err(Error::malformed_command(
                        "'|' requires a command on each side",
                    ));
                }
            }
        }

        if let Some(position) = self.find_operator(Operator::Background) {
            if position != self.tokens.len() - 1 {
                return Err(Error::malformed_command("'&' must be the last token"));
            }
        }

        Ok(())
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;

    #[test]
    fn parse_simple_command() {
        let command = Command::parse("echo bob").unwrap();
        assert_eq!(command.program(), Some("echo"));
        assert_eq!(command.pipeline(), (vec!["echo", "bob"], None));
        assert!(!command.background());
        assert!(command.redirect_in().is_none());
        assert!(command.redirect_out().is_none());
    }

    #[test]
    fn parse_strips_trailing_newline() {
        let command = Command::parse("echo bob\n").unwrap();
        assert_eq!(command.input(), "echo bob");
    }

    #[test]
    fn parse_empty_line() {
        assert!(Command::parse("").unwrap().is_empty());
        assert!(Command::parse("   \n").unwrap().is_empty());
    }

    #[test]
    fn parse_all_operators() {
        let command = Command::parse("grep b < in.txt | sort > out.txt &").unwrap();
        assert_eq!(command.redirect_in(), Some("in.txt"));
        assert_eq!(command.redirect_out(), Some("out.txt"));
        assert!(command.background());
        let (left, right) = command.pipeline();
        assert_eq!(left, vec!["grep", "b"]);
        assert_eq!(right, Some(vec!["sort"]));
    }

    #[test]
    fn find_operator_returns_leftmost() {
        let command = Command::parse("cat < in | wc").unwrap();
        assert_eq!(command.find_operator(Operator::RedirectIn), Some(1));
        assert_eq!(command.find_operator(Operator::Pipe), Some(3));
        assert_eq!(command.find_operator(Operator::Background), None);
    }

    #[test]
    fn operators_are_not_arguments() {
        let command = Command::parse("echo hi > f").unwrap();
        assert_eq!(command.pipeline(), (vec!["echo", "hi"], None));
    }

    #[test]
    fn line_too_long_is_rejected() {
        let line = "x".repeat(MAX_LINE_LEN + 1);
        let err = Command::parse(&line).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::LineTooLong { .. }));
    }

    #[test]
    fn repeated_operator_is_rejected() {
        let err = Command::parse("a | b | c").unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::MalformedCommand(_)));
    }

    #[test]
    fn redirect_without_operand_is_rejected() {
        assert!(Command::parse("echo >").is_err());
        assert!(Command::parse("echo < | wc").is_err());
    }

    #[test]
    fn one_sided_pipe_is_rejected() {
        assert!(Command::parse("echo |").is_err());
        assert!(Command::parse("| wc").is_err());
    }

    #[test]
    fn background_must_be_last() {
        assert!(Command::parse("sleep 1 & echo").is_err());
        assert!(Command::parse("sleep 1 &").is_ok());
    }

    #[test]
    fn leading_operator_is_rejected() {
        let err = Command::parse("< in cat").unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::MalformedCommand(_)));
    }
}
