use rwflash_lib::{Choice, ChoiceProvider, Error, Result};
use std::io::{self, BufRead, Write};

/// Numbered menu on stdout, answer read from stdin.
///
/// Enter takes the default; end of input cancels. Ctrl-C is handled by the
/// process-wide handler in `interrupt`.
pub struct StdinChoices;

impl ChoiceProvider for StdinChoices {
    fn choose(&mut self, choice: &Choice) -> Result<usize> {
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "\n{}:", choice.title)?;
        for (index, option) in choice.options.iter().enumerate() {
            let marker = if choice.default == Some(index) {
                " (default)"
            } else {
                ""
            };
            writeln!(stdout, "  {}. {}{}", index + 1, option, marker)?;
        }
        match choice.default {
            Some(default) => write!(
                stdout,
                "Please enter number [1-{}, Enter for {}]: ",
                choice.options.len(),
                default + 1
            )?,
            None => write!(stdout, "Please enter number [1-{}]: ", choice.options.len())?,
        }
        stdout.flush()?;
        drop(stdout);

        let mut line = String::new();
        match io::stdin().lock().read_line(&mut line) {
            Ok(0) => Err(Error::Cancelled),
            Ok(_) => parse_selection(&line, choice),
            Err(e) => Err(e.into()),
        }
    }
}

/// Maps a typed answer to a zero based option index.
pub fn parse_selection(input: &str, choice: &Choice) -> Result<usize> {
    let input = input.trim();
    if input.is_empty() {
        return choice
            .default
            .ok_or_else(|| Error::InvalidSelection("a number is required".into()));
    }
    let number: usize = input
        .parse()
        .map_err(|_| Error::InvalidSelection(format!("'{}' is not a number", input)))?;
    match number.checked_sub(1) {
        Some(index) => choice.check(index),
        None => Err(Error::InvalidSelection(format!(
            "0 is outside 1-{}",
            choice.options.len()
        ))),
    }
}
