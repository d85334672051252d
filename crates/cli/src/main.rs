//! # CLI - StrataKV Inspection Shell
//!
//! A REPL-style shell over a read-only database directory. Reads commands
//! from stdin, runs them against the engine, and prints results to stdout.
//! Designed for both interactive use and scripted testing (pipe commands
//! via stdin).
//!
//! ## Commands
//!
//! ```text
//! GET hexkey         Look up a key given as hex bytes
//! STATS              Print database debug info
//! EXIT / QUIT        Shut down
//! ```
//!
//! Values print as hex; a tombstone prints `(deleted)` and a missing key
//! `(nil)`.
//!
//! ## Configuration
//!
//! ```text
//! STRATA_DB_DIR    Database directory    (default: ".")
//! ```
//!
//! ## Example
//!
//! ```text
//! $ STRATA_DB_DIR=worlds/demo/db cargo run -p cli
//! StrataKV opened worlds/demo/db (12 tables, last_seq=48213)
//! > GET 0000000000000000 76
//! 0a
//! > EXIT
//! bye
//! ```

use anyhow::{Context, Result};
use engine::{Database, GetOutcome};
use std::io::{self, BufRead, Write};

/// Reads a configuration value from the environment, falling back to `default`.
fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parses whitespace-separated hex into bytes, e.g. `"0a ff 10"` or `"0aff10"`.
fn parse_hex(args: &[&str]) -> Result<Vec<u8>> {
    let joined: String = args.concat();
    anyhow::ensure!(
        !joined.is_empty() && joined.len() % 2 == 0,
        "key must be an even number of hex digits"
    );
    (0..joined.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&joined[i..i + 2], 16)
                .with_context(|| format!("bad hex byte {:?}", &joined[i..i + 2]))
        })
        .collect()
}

fn to_hex(raw: &[u8]) -> String {
    raw.iter().map(|b| format!("{b:02x}")).collect()
}

fn main() -> Result<()> {
    let db_dir = env_or("STRATA_DB_DIR", ".");
    let db = Database::open(&db_dir)
        .with_context(|| format!("failed to open database at {db_dir}"))?;

    println!(
        "StrataKV opened {} ({} tables, last_seq={})",
        db_dir,
        db.version().live_file_count(),
        db.version().last_sequence()
    );
    println!("Commands: GET hexkey | STATS | EXIT");
    print!("> ");
    io::stdout().flush().ok();

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        let parts: Vec<&str> = line.split_whitespace().collect();
        if let Some((cmd, args)) = parts.split_first() {
            match cmd.to_uppercase().as_str() {
                "GET" => match parse_hex(args) {
                    Ok(key) => match db.get(&key) {
                        Ok(GetOutcome::Found(value)) => println!("{}", to_hex(&value)),
                        Ok(GetOutcome::Deleted) => println!("(deleted)"),
                        Ok(GetOutcome::NotFound) => println!("(nil)"),
                        Err(e) => println!("ERR read failed: {e}"),
                    },
                    Err(e) => println!("ERR usage: GET hexkey ({e})"),
                },
                "STATS" => println!("{db:#?}"),
                "EXIT" | "QUIT" => {
                    db.close();
                    println!("bye");
                    return Ok(());
                }
                other => println!("ERR unknown command: {other}"),
            }
        }
        print!("> ");
        io::stdout().flush().ok();
    }

    db.close();
    println!("bye");
    Ok(())
}
