//! Interactive prompts and console messages.
//!
//! Workflows talk to the user only through `Ui`, so every decision point can
//! be scripted in tests. Validation failures re-prompt inside the prompt and
//! never reach the caller.
use anyhow::{anyhow, Context, Result};
use console::{style, Term};
use std::io::{self, BufRead, Write};

/// Returns `Err(message)` to reject an answer and re-prompt.
pub type Validator<'a> = &'a dyn Fn(&str) -> Result<(), String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Heading,
    Info,
    Success,
    Warn,
    Error,
    /// Low-emphasis diagnostics.
    Detail,
}

pub trait Ui {
    fn confirm(&self, message: &str, default: bool) -> Result<bool>;
    fn input(
        &self,
        message: &str,
        default: Option<&str>,
        validate: Validator<'_>,
    ) -> Result<String>;
    fn password(&self, message: &str, validate: Validator<'_>) -> Result<String>;
    /// Returns the index of the chosen entry.
    fn select(&self, message: &str, choices: &[&str]) -> Result<usize>;
    fn say(&self, tone: Tone, message: &str);
}

pub fn non_empty(label: &'static str) -> impl Fn(&str) -> Result<(), String> {
    move |value: &str| {
        if value.is_empty() {
            Err(format!("{label} is required"))
        } else {
            Ok(())
        }
    }
}

/// Prompts on stdout, reads answers from stdin.
pub struct TerminalUi {
    term: Term,
}

impl TerminalUi {
    pub fn new() -> Self {
        Self {
            term: Term::stdout(),
        }
    }

    fn ask(&self, prompt: &str) -> Result<String> {
        print!("{} {} ", style("?").green().bold(), style(prompt).bold());
        io::stdout().flush().context("flush stdout")?;
        read_answer(&mut io::stdin().lock())
    }

    fn reject(&self, reason: &str) {
        println!("{} {}", style(">>").red(), reason);
    }
}

impl Default for TerminalUi {
    fn default() -> Self {
        Self::new()
    }
}

/// One line with only its terminator removed; the answer is kept verbatim.
fn read_answer(reader: &mut dyn BufRead) -> Result<String> {
    let mut line = String::new();
    let read = reader
        .read_line(&mut line)
        .context("Failed to read user input")?;
    if read == 0 {
        return Err(anyhow!("input closed before an answer was given"));
    }
    let answer = line
        .strip_suffix('\n')
        .map(|rest| rest.strip_suffix('\r').unwrap_or(rest))
        .unwrap_or(line.as_str());
    Ok(answer.to_string())
}

fn parse_confirmation(answer: &str, default: bool) -> Option<bool> {
    match answer.to_lowercase().as_str() {
        "" => Some(default),
        "y" | "yes" => Some(true),
        "n" | "no" => Some(false),
        _ => None,
    }
}

impl Ui for TerminalUi {
    fn confirm(&self, message: &str, default: bool) -> Result<bool> {
        let hint = if default { "(Y/n)" } else { "(y/N)" };
        loop {
            let answer = self.ask(&format!("{message} {hint}"))?;
            match parse_confirmation(answer.trim(), default) {
                Some(value) => return Ok(value),
                None => self.reject("Please enter 'y' for yes or 'n' for no."),
            }
        }
    }

    fn input(
        &self,
        message: &str,
        default: Option<&str>,
        validate: Validator<'_>,
    ) -> Result<String> {
        loop {
            let prompt = match default {
                Some(value) => format!("{message} ({value})"),
                None => message.to_string(),
            };
            let mut answer = self.ask(&prompt)?;
            if answer.is_empty() {
                if let Some(value) = default {
                    answer = value.to_string();
                }
            }
            match validate(&answer) {
                Ok(()) => return Ok(answer),
                Err(reason) => self.reject(&reason),
            }
        }
    }

    fn password(&self, message: &str, validate: Validator<'_>) -> Result<String> {
        loop {
            let answer = if self.term.is_term() {
                print!("{} {} ", style("?").green().bold(), style(message).bold());
                io::stdout().flush().context("flush stdout")?;
                self.term
                    .read_secure_line()
                    .context("Failed to read password")?
            } else {
                self.ask(message)?
            };
            match validate(&answer) {
                Ok(()) => return Ok(answer),
                Err(reason) => self.reject(&reason),
            }
        }
    }

    fn select(&self, message: &str, choices: &[&str]) -> Result<usize> {
        println!("{} {}", style("?").green().bold(), style(message).bold());
        for (index, choice) in choices.iter().enumerate() {
            println!("  {}) {choice}", index + 1);
        }
        loop {
            let answer = self.ask(&format!("Choose 1-{}", choices.len()))?;
            match answer.trim().parse::<usize>() {
                Ok(number) if (1..=choices.len()).contains(&number) => return Ok(number - 1),
                _ => self.reject(&format!(
                    "Please enter a number between 1 and {}.",
                    choices.len()
                )),
            }
        }
    }

    fn say(&self, tone: Tone, message: &str) {
        let line = match tone {
            Tone::Heading => style(message).yellow().bold().to_string(),
            Tone::Info => style(message).blue().to_string(),
            Tone::Success => style(message).green().to_string(),
            Tone::Warn => style(message).yellow().to_string(),
            Tone::Error => style(message).red().to_string(),
            Tone::Detail => style(message).dim().to_string(),
        };
        println!("{line}");
    }
}
