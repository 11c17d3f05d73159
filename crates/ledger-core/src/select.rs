//! Turning user input into pool picks.

use std::io::{self, BufRead, Write};

use thiserror::Error;

use crate::TransactionPool;

const FINISH: &str = "q";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice {
    /// Zero-based pool index.
    Pick(usize),
    Finish,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("not a transaction number: {0:?}")]
    NotANumber(String),

    #[error("transaction {number} is outside 1..={len}")]
    OutOfRange { number: usize, len: usize },
}

/// Parses one line: `q` finishes, otherwise a 1-based transaction number
/// that must exist in a pool of `pool_len`.
pub fn parse_choice(input: &str, pool_len: usize) -> Result<Choice, SelectionError> {
    let input = input.trim();
    if input == FINISH {
        return Ok(Choice::Finish);
    }
    let number: usize = input
        .parse()
        .map_err(|_| SelectionError::NotANumber(input.to_owned()))?;
    if number == 0 || number > pool_len {
        return Err(SelectionError::OutOfRange {
            number,
            len: pool_len,
        });
    }
    Ok(Choice::Pick(number - 1))
}

/// Lists the pool on `output` and reads picks from `input` until `q` or end
/// of input. Bad lines are reported and asked again; they never end the
/// selection. Returns zero-based indices in the order chosen.
pub fn prompt_selection<R, W>(
    pool: &TransactionPool,
    mut input: R,
    mut output: W,
) -> io::Result<Vec<usize>>
where
    R: BufRead,
    W: Write,
{
    writeln!(output, "Available Transactions in Pool:")?;
    for (i, tx) in pool.iter().enumerate() {
        writeln!(
            output,
            "[{}] Sender: {}, Recipient: {}, Value: {:.6}",
            i + 1,
            tx.sender(),
            tx.recipient(),
            tx.value()
        )?;
    }
    writeln!(
        output,
        "Enter transaction numbers to include in the block (one at a time) or '{FINISH}' to finish:"
    )?;

    let mut picks = Vec::new();
    let mut line = String::new();
    loop {
        write!(output, "Transaction number or '{FINISH}': ")?;
        output.flush()?;
        line.clear();
        if input.read_line(&mut line)? == 0 {
            break;
        }
        match parse_choice(&line, pool.len()) {
            Ok(Choice::Finish) => break,
            Ok(Choice::Pick(index)) => picks.push(index),
            Err(e) => writeln!(
                output,
                "Invalid input ({e}). Please enter a valid transaction number."
            )?,
        }
    }
    writeln!(output)?;
    Ok(picks)
}
