//! Interactive console helpers.
//!
//! The [`Console`] trait decouples the wizard-style commands from real
//! stdin/stdout so tests can script answers, the same way the model client
//! is scripted. Closed input (EOF, interrupt during a read) surfaces as
//! [`Aborted`], which the top-level dispatcher turns into an `Aborted.`
//! message and a failure exit.

use std::io::{BufRead, Write};

use anyhow::{Context, Result};
use thiserror::Error;

/// Input was closed while waiting for an answer.
#[derive(Debug, Error)]
#[error("aborted")]
pub struct Aborted;

/// Interactive question/answer surface.
pub trait Console {
    /// Free-text question. `optional` lets the user skip with Enter.
    fn ask_text(&mut self, question: &str, optional: bool) -> Result<Option<String>>;

    /// Yes/no question with an optional default for a bare Enter.
    fn ask_yes_no(&mut self, question: &str, default: Option<bool>) -> Result<bool>;

    /// Numbered multiple choice; returns the 0-based index.
    fn ask_choice(&mut self, question: &str, options: &[String]) -> Result<usize>;

    /// Bounded integer question with an optional default.
    fn ask_number(
        &mut self,
        question: &str,
        default: Option<i64>,
        min: Option<i64>,
        max: Option<i64>,
    ) -> Result<i64>;
}

/// Real console over stdin/stdout. Invalid input re-asks.
pub struct StdioConsole;

impl StdioConsole {
    fn read_line(&self) -> Result<String> {
        let mut line = String::new();
        let read = std::io::stdin()
            .lock()
            .read_line(&mut line)
            .context("read stdin")?;
        if read == 0 {
            return Err(Aborted.into());
        }
        Ok(line.trim().to_string())
    }

    fn prompt(&self, text: &str) -> Result<String> {
        print!("{text}");
        std::io::stdout().flush().context("flush stdout")?;
        self.read_line()
    }
}

impl Console for StdioConsole {
    fn ask_text(&mut self, question: &str, optional: bool) -> Result<Option<String>> {
        println!();
        println!("{question}");
        if optional {
            println!("(Press Enter to skip)");
        }
        loop {
            let answer = self.prompt("> ")?;
            if answer.is_empty() {
                if optional {
                    return Ok(None);
                }
                println!("An answer is required.");
                continue;
            }
            return Ok(Some(answer));
        }
    }

    fn ask_yes_no(&mut self, question: &str, default: Option<bool>) -> Result<bool> {
        let suffix = match default {
            Some(true) => " [Y/n]: ",
            Some(false) => " [y/N]: ",
            None => " [y/n]: ",
        };
        loop {
            let answer = self.prompt(&format!("{question}{suffix}"))?.to_lowercase();
            match answer.as_str() {
                "y" | "yes" => return Ok(true),
                "n" | "no" => return Ok(false),
                "" if default.is_some() => return Ok(default.unwrap_or(false)),
                _ => println!("Please answer 'y' or 'n'."),
            }
        }
    }

    fn ask_choice(&mut self, question: &str, options: &[String]) -> Result<usize> {
        println!();
        println!("{question}");
        for (i, option) in options.iter().enumerate() {
            println!("  [{}] {option}", i + 1);
        }
        loop {
            let answer = self.prompt("\nYour choice: ")?;
            match answer.parse::<usize>() {
                Ok(choice) if choice >= 1 && choice <= options.len() => return Ok(choice - 1),
                _ => println!("Invalid choice. Please enter 1-{}", options.len()),
            }
        }
    }

    fn ask_number(
        &mut self,
        question: &str,
        default: Option<i64>,
        min: Option<i64>,
        max: Option<i64>,
    ) -> Result<i64> {
        let suffix = default
            .map(|value| format!(" [default: {value}]: "))
            .unwrap_or_else(|| ": ".to_string());
        loop {
            let answer = self.prompt(&format!("{question}{suffix}"))?;
            if answer.is_empty() {
                if let Some(value) = default {
                    return Ok(value);
                }
            }
            let Ok(value) = answer.parse::<i64>() else {
                println!("Please enter a valid number.");
                continue;
            };
            if let Some(min) = min {
                if value < min {
                    println!("Please enter a number >= {min}");
                    continue;
                }
            }
            if let Some(max) = max {
                if value > max {
                    println!("Please enter a number <= {max}");
                    continue;
                }
            }
            return Ok(value);
        }
    }
}
