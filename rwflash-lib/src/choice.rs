//! Interactive decisions the core needs from its caller.
//!
//! The library never reads stdin. Whenever a device family, flash region or
//! erase size has to be picked by a human, it hands a [`Choice`] to a
//! [`ChoiceProvider`] supplied by the front end (or by a test).

use crate::{Error, Result};

/// A numbered list of options with an optional default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Choice {
    pub title: String,
    pub options: Vec<String>,
    /// Index answered when the user just presses Enter.
    pub default: Option<usize>,
}

impl Choice {
    pub fn new(title: impl Into<String>, options: Vec<String>) -> Self {
        Self {
            title: title.into(),
            options,
            default: None,
        }
    }

    pub fn with_default(mut self, index: usize) -> Self {
        self.default = Some(index);
        self
    }

    /// Validates an index returned by a provider.
    pub fn check(&self, index: usize) -> Result<usize> {
        if index < self.options.len() {
            Ok(index)
        } else {
            Err(Error::InvalidSelection(format!(
                "{} is outside 1-{}",
                index + 1,
                self.options.len()
            )))
        }
    }
}

pub trait ChoiceProvider {
    /// Returns the zero based index of the picked option.
    ///
    /// Implementations return [`Error::Cancelled`] when the user backs out.
    fn choose(&mut self, choice: &Choice) -> Result<usize>;
}

/// Answers every prompt with its default, for unattended runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultChoices;

impl ChoiceProvider for DefaultChoices {
    fn choose(&mut self, choice: &Choice) -> Result<usize> {
        choice.default.ok_or_else(|| {
            Error::InvalidSelection(format!("`{}` has no default answer", choice.title))
        })
    }
}
