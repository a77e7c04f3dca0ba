//! Blocking operator prompts
//!
//! Steps that need a human answer ask through [`Prompt`], so tests can
//! supply canned answers and non-interactive runs can refuse outright.

use std::io::{self, BufRead};

use thiserror::Error;

/// Errors raised while prompting
#[derive(Debug, Error)]
pub enum PromptError {
    /// Reading from the terminal failed
    #[error("prompt failed: {0}")]
    Io(#[from] io::Error),

    /// A prompt was attempted without a terminal to answer it
    #[error("cannot ask \"{0}\" in non-interactive mode")]
    NotInteractive(String),
}

/// Source of operator answers
pub trait Prompt {
    /// Free-text input with a default
    fn input(&mut self, message: &str, default: &str) -> Result<String, PromptError>;

    /// Yes/no question
    fn confirm(&mut self, message: &str, default: bool) -> Result<bool, PromptError>;

    /// Hidden input, may be empty
    fn password(&mut self, message: &str) -> Result<String, PromptError>;

    /// Multi-line input terminated by an empty line
    fn multiline(&mut self, message: &str) -> Result<String, PromptError>;
}

/// Refuses every question; used when no terminal may be read
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPrompt;

impl Prompt for NoPrompt {
    fn input(&mut self, message: &str, _default: &str) -> Result<String, PromptError> {
        Err(PromptError::NotInteractive(message.into()))
    }

    fn confirm(&mut self, message: &str, _default: bool) -> Result<bool, PromptError> {
        Err(PromptError::NotInteractive(message.into()))
    }

    fn password(&mut self, message: &str) -> Result<String, PromptError> {
        Err(PromptError::NotInteractive(message.into()))
    }

    fn multiline(&mut self, message: &str) -> Result<String, PromptError> {
        Err(PromptError::NotInteractive(message.into()))
    }
}

/// Read lines until an empty line or end of input
///
/// Lines are joined with `\n`, without a trailing newline.
pub fn read_until_blank(reader: impl BufRead) -> io::Result<String> {
    let mut lines = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.is_empty() {
            break;
        }
        lines.push(line);
    }
    Ok(lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_until_blank_stops_at_empty_line() {
        let input = "ssh-ed25519 AAAA one\nssh-rsa BBBB two\n\nignored\n";
        let text = read_until_blank(input.as_bytes()).unwrap();

        assert_eq!(text, "ssh-ed25519 AAAA one\nssh-rsa BBBB two");
    }

    #[test]
    fn test_read_until_blank_handles_eof() {
        assert_eq!(read_until_blank("key".as_bytes()).unwrap(), "key");
        assert_eq!(read_until_blank("".as_bytes()).unwrap(), "");
    }

    #[test]
    fn test_no_prompt_refuses() {
        let err = NoPrompt.confirm("Continue anyway?", false).unwrap_err();
        assert!(matches!(err, PromptError::NotInteractive(ref m) if m == "Continue anyway?"));
    }
}
