//! Line-oriented operator prompts.

use std::fmt::Display;
use std::io::{self, BufRead, Write};

use user_records_core::EventLog;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Confirmation {
    Yes,
    No,
    All,
}

/// Reads operator answers from `input` and writes prompts and feedback to
/// `output`.
pub struct Prompter<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    pub fn output(&mut self) -> &mut W {
        &mut self.output
    }

    pub fn into_output(self) -> W {
        self.output
    }

    /// Print `prompt` and read one line, without its line terminator.
    ///
    /// Bytes that are not UTF-8 are replaced rather than rejected, so a
    /// garbled line reaches the validator like any other bad answer.
    ///
    /// # Errors
    /// Fails with [`io::ErrorKind::UnexpectedEof`] once input is exhausted, or
    /// with the underlying I/O error.
    pub fn read_line(&mut self, prompt: &str) -> io::Result<String> {
        write!(self.output, "{prompt}")?;
        self.output.flush()?;

        let mut buf = Vec::new();
        if self.input.read_until(b'\n', &mut buf)? == 0 {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "operator input closed"));
        }
        if buf.ends_with(b"\n") {
            buf.pop();
            if buf.ends_with(b"\r") {
                buf.pop();
            }
        }
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    /// Ask for a value until `validate` accepts it.
    ///
    /// There is no retry limit; only closed input ends the loop early.
    ///
    /// # Errors
    /// Propagates [`Prompter::read_line`] failures.
    pub fn collect(
        &mut self,
        prompt: &str,
        validate: impl Fn(&str) -> bool,
        error_message: &str,
        log: &dyn EventLog,
    ) -> io::Result<String> {
        self.collect_with(
            prompt,
            |value| if validate(value) { Ok(()) } else { Err(error_message) },
            log,
        )
    }

    /// Like [`Prompter::collect`], but the rejection text comes from `check`.
    ///
    /// # Errors
    /// Propagates [`Prompter::read_line`] failures.
    pub fn collect_with<E: Display>(
        &mut self,
        prompt: &str,
        check: impl Fn(&str) -> Result<(), E>,
        log: &dyn EventLog,
    ) -> io::Result<String> {
        loop {
            let value = self.read_line(prompt)?;
            match check(&value) {
                Ok(()) => {
                    log.info(&format!("User input '{value}' is valid."));
                    writeln!(self.output, "Input '{value}' is valid.")?;
                    return Ok(value);
                }
                Err(reason) => {
                    let feedback = format!("Invalid input '{value}': {reason}");
                    log.warning(&feedback);
                    writeln!(self.output, "{feedback}")?;
                }
            }
        }
    }

    /// Ask a yes/no question, optionally also accepting `all`.
    ///
    /// # Errors
    /// Propagates [`Prompter::read_line`] failures.
    pub fn confirm(&mut self, question: &str, allow_all: bool) -> io::Result<Confirmation> {
        loop {
            let answer = self.read_line(question)?.trim().to_lowercase();
            match answer.as_str() {
                "y" => return Ok(Confirmation::Yes),
                "n" => return Ok(Confirmation::No),
                "all" if allow_all => return Ok(Confirmation::All),
                _ if allow_all => {
                    writeln!(self.output, "Please enter 'Y' for Yes, 'N' for No or 'All' for Yes to All.")?;
                }
                _ => writeln!(self.output, "Please enter 'Y' for Yes, 'N' for No.")?,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::io::Cursor;

    use user_records_core::LogLevel;

    use super::*;

    #[derive(Default)]
    struct RecordingLog {
        entries: RefCell<Vec<(LogLevel, String)>>,
    }

    impl EventLog for RecordingLog {
        fn append(&self, level: LogLevel, message: &str, _additional_info: Option<&str>) {
            self.entries.borrow_mut().push((level, message.to_string()));
        }
    }

    fn prompter(script: &str) -> Prompter<Cursor<Vec<u8>>, Vec<u8>> {
        Prompter::new(Cursor::new(script.as_bytes().to_vec()), Vec::new())
    }

    fn output_text(prompter: Prompter<Cursor<Vec<u8>>, Vec<u8>>) -> String {
        String::from_utf8_lossy(&prompter.into_output()).into_owned()
    }

    #[test]
    fn read_line_strips_line_terminators_only() -> io::Result<()> {
        let mut prompter = prompter("  padded  \r\nlast");
        assert_eq!(prompter.read_line("> ")?, "  padded  ");
        assert_eq!(prompter.read_line("> ")?, "last");
        let err = prompter.read_line("> ").err().map(|err| err.kind());
        assert_eq!(err, Some(io::ErrorKind::UnexpectedEof));
        Ok(())
    }

    #[test]
    fn collect_reprompts_until_valid() -> io::Result<()> {
        let log = RecordingLog::default();
        let mut prompter = prompter("abc\n-1\n0\n42\n");
        let value = prompter.collect(
            "Enter your age : ",
            |value| value.parse::<u32>().is_ok_and(|age| age > 0),
            "Age must be a positive integer.",
            &log,
        )?;
        assert_eq!(value, "42");

        let output = output_text(prompter);
        assert_eq!(output.matches("Enter your age : ").count(), 4);
        assert!(output.contains("Invalid input 'abc': Age must be a positive integer."));
        assert!(output.contains("Invalid input '0': Age must be a positive integer."));
        assert!(output.ends_with("Input '42' is valid.\n"));

        let entries = log.entries.borrow();
        assert_eq!(entries.len(), 4);
        assert!(entries[..3].iter().all(|(level, _)| *level == LogLevel::Warning));
        assert_eq!(entries[3], (LogLevel::Info, "User input '42' is valid.".to_string()));
        Ok(())
    }

    #[test]
    fn collect_with_reports_the_rejection_reason() -> io::Result<()> {
        let log = RecordingLog::default();
        let mut prompter = prompter("taken\nfree\n");
        let value = prompter.collect_with(
            "id: ",
            |value| if value == "taken" { Err("already in use") } else { Ok(()) },
            &log,
        )?;
        assert_eq!(value, "free");
        assert!(output_text(prompter).contains("Invalid input 'taken': already in use\n"));
        assert_eq!(
            log.entries.borrow()[0],
            (LogLevel::Warning, "Invalid input 'taken': already in use".to_string())
        );
        Ok(())
    }

    #[test]
    fn non_utf8_line_is_rejected_and_prompted_again() -> io::Result<()> {
        let log = RecordingLog::default();
        let mut prompter =
            Prompter::new(Cursor::new(b"J\xffne\nJane\n".to_vec()), Vec::<u8>::new());
        let value = prompter.collect(
            "Enter your First Name : ",
            |value| value.chars().all(char::is_alphabetic),
            "First Name must contain only alphabetic characters.",
            &log,
        )?;
        assert_eq!(value, "Jane");

        let output = output_text(prompter);
        assert_eq!(output.matches("Enter your First Name : ").count(), 2);
        assert!(output.contains("Invalid input 'J\u{fffd}ne'"));
        Ok(())
    }

    #[test]
    fn collect_stops_when_input_closes() {
        let log = RecordingLog::default();
        let mut prompter = prompter("bad\n");
        let result = prompter.collect("id: ", |_| false, "never valid", &log);
        assert_eq!(result.err().map(|err| err.kind()), Some(io::ErrorKind::UnexpectedEof));
    }

    #[test]
    fn confirm_accepts_all_only_when_allowed() -> io::Result<()> {
        let mut prompter = prompter("ALL\nmaybe\nN\n");
        assert_eq!(prompter.confirm("Update? (Y/N): ", false)?, Confirmation::No);
        let output = output_text(prompter);
        assert_eq!(output.matches("Please enter 'Y' for Yes, 'N' for No.").count(), 2);

        let mut prompter = self::prompter("maybe\nAll\n");
        assert_eq!(prompter.confirm("Insert? (Y/N/All): ", true)?, Confirmation::All);
        assert!(output_text(prompter)
            .contains("Please enter 'Y' for Yes, 'N' for No or 'All' for Yes to All."));

        let mut prompter = self::prompter(" y \n");
        assert_eq!(prompter.confirm("Insert? (Y/N/All): ", true)?, Confirmation::Yes);
        Ok(())
    }
}
