use std::io::{self, BufRead, Write};

use crate::blockchain::Ledger;
use crate::peer::PeerClient;

pub const HELP: &str =
    "Type 'add <data>' to add new data to the ledger, or 'mine' to mine a new block with pending data.";
const ADD_USAGE: &str = "Usage: add <data>";
const UNKNOWN: &str = "Unknown command. Try 'add <data>' or 'mine'.";

#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    Add(String),
    Mine,
}

pub fn parse_command(line: &str) -> Result<Command, &'static str> {
    let mut parts = line.splitn(2, ' ');
    match parts.next() {
        Some("add") => parts
            .next()
            .map(|data| Command::Add(data.to_string()))
            .ok_or(ADD_USAGE),
        Some("mine") => Ok(Command::Mine),
        _ => Err(UNKNOWN),
    }
}

/// Read commands line by line until EOF, reporting each outcome to `out`.
pub fn run_commands(
    ledger: &Ledger,
    peer: Option<&PeerClient>,
    input: impl BufRead,
    mut out: impl Write,
) -> io::Result<()> {
    for line in input.lines() {
        match parse_command(&line?) {
            Ok(Command::Add(data)) => {
                ledger.stage(data);
                writeln!(out, "Data added to pending records.")?;
            }
            Ok(Command::Mine) => match ledger.mine() {
                Ok(block) => {
                    if let Some(peer) = peer {
                        peer.relay_block(&block);
                    }
                    writeln!(out, "New block mined: {} (nonce {})", block.hash, block.nonce)?;
                }
                Err(e) => writeln!(out, "Mining failed: {e}")?,
            },
            Err(usage) => writeln!(out, "{usage}")?,
        }
    }
    Ok(())
}
