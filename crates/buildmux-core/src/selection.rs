//! Profile selection front-end.
//!
//! The menu is derived from the matrix's registered profiles. Input is either a
//! 1-based menu number or a profile id. Unrecognized input is never ignored:
//! the interactive prompt re-asks, the non-interactive resolver returns
//! [`DispatchError::UnrecognizedSelection`].

use std::io::{BufRead, Write};

use crate::error::{DispatchError, Result};
use crate::matrix::TargetMatrix;

const CANCEL_WORDS: [&str; 3] = ["q", "quit", "exit"];

/// Render the numbered profile menu.
pub fn menu(matrix: &TargetMatrix) -> String {
    let mut out = String::from("Choose build profile:\n");
    for (i, profile) in matrix.profiles().enumerate() {
        match profile.description() {
            Some(description) => {
                out.push_str(&format!("  {}: {} ({})\n", i + 1, profile.id(), description))
            }
            None => out.push_str(&format!("  {}: {}\n", i + 1, profile.id())),
        }
        for target in profile.targets() {
            out.push_str(&format!("       {target}\n"));
        }
    }
    out.push_str("  q: quit\n");
    out
}

/// Resolve one line of input to a profile id.
pub fn select_profile(matrix: &TargetMatrix, input: &str) -> Result<String> {
    let choice = input.trim();

    if CANCEL_WORDS.contains(&choice.to_ascii_lowercase().as_str()) {
        return Err(DispatchError::Cancelled {
            completed: 0,
            total: 0,
        });
    }

    if let Ok(n) = choice.parse::<usize>() {
        return n
            .checked_sub(1)
            .and_then(|i| matrix.profiles().nth(i))
            .map(|profile| profile.id().to_string())
            .ok_or_else(|| DispatchError::UnrecognizedSelection(choice.to_string()));
    }

    matrix
        .lookup(choice)
        .map(|profile| profile.id().to_string())
        .map_err(|_| DispatchError::UnrecognizedSelection(choice.to_string()))
}

/// Print the menu and read selections until one resolves.
///
/// Returns [`DispatchError::Cancelled`] on a quit word or end of input.
pub fn prompt_profile<R: BufRead, W: Write>(
    matrix: &TargetMatrix,
    mut input: R,
    mut output: W,
) -> Result<String> {
    write!(output, "{}", menu(matrix))?;

    loop {
        write!(output, "[input]> ")?;
        output.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            writeln!(output)?;
            return Err(DispatchError::Cancelled {
                completed: 0,
                total: 0,
            });
        }

        if line.trim().is_empty() {
            continue;
        }

        match select_profile(matrix, &line) {
            Ok(profile_id) => return Ok(profile_id),
            Err(DispatchError::UnrecognizedSelection(choice)) => {
                writeln!(
                    output,
                    "unrecognized selection {choice:?}; enter 1-{} or a profile id ({})",
                    matrix.len(),
                    matrix.profile_ids().join(", ")
                )?;
            }
            Err(e) => return Err(e),
        }
    }
}
