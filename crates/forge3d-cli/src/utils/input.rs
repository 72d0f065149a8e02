//! User input utilities for interactive command-line prompts.

use std::io::{self, BufRead, Write};
use std::str::FromStr;

use anyhow::{Context, Result};

/// Prompts until the answer parses as one of `allowed`.
///
/// Empty input selects `default`. Returns `None` when stdin is closed.
pub fn prompt_choice<T>(prompt: &str, allowed: &[T], default: T) -> Result<Option<T>>
where
    T: FromStr + PartialEq + Copy + std::fmt::Display,
{
    let options: Vec<String> = allowed.iter().map(ToString::to_string).collect();
    let full = format!("{prompt} [{}] (default {default})", options.join("/"));
    for _ in 0..3 {
        let mut input = String::new();
        print!("{full}: ");
        io::stdout().flush().context("Failed to flush stdout")?;
        let read = io::stdin()
            .lock()
            .read_line(&mut input)
            .context("Failed to read user input")?;
        if read == 0 {
            return Ok(None);
        }
        match parse_choice(&input, allowed, default) {
            Some(choice) => return Ok(Some(choice)),
            None => eprintln!("Please enter one of: {}", options.join(", ")),
        }
    }
    Ok(Some(default))
}

fn parse_choice<T>(input: &str, allowed: &[T], default: T) -> Option<T>
where
    T: FromStr + PartialEq + Copy,
{
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Some(default);
    }
    trimmed.parse::<T>().ok().filter(|c| allowed.contains(c))
}
