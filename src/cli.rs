//! Offline line-mode shell. It owns a private [`Store`] and never touches the network or the
//! coordinator.

use bytes::Bytes;
use std::io::{self, BufRead, Write};

use crate::store::Store;

const PROMPT: &str = "> ";

/// Reads commands from `input` until `EXIT` or end of input, writing results to `output`.
pub fn run<R, W>(mut input: R, mut output: W) -> io::Result<()>
where
    R: BufRead,
    W: Write,
{
    let mut store = Store::new();

    writeln!(output, "Welcome to the solodis shell.")?;
    writeln!(output, "Type HELP for commands.")?;

    let mut buf = Vec::new();
    loop {
        write!(output, "{}", PROMPT)?;
        output.flush()?;

        buf.clear();
        if input.read_until(b'\n', &mut buf)? == 0 {
            break;
        }

        // Invalid UTF-8 is replaced rather than ending the shell.
        let line = String::from_utf8_lossy(&buf);
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if !execute(&mut store, line, &mut output)? {
            break;
        }
    }

    Ok(())
}

/// Runs one shell line. Returns `false` when the shell should exit.
fn execute<W: Write>(store: &mut Store, line: &str, output: &mut W) -> io::Result<bool> {
    // The value is everything after the key, so it may contain spaces.
    let args: Vec<&str> = line.splitn(3, ' ').collect();

    match args[0].to_uppercase().as_str() {
        "SET" => {
            if args.len() < 3 {
                writeln!(output, "Usage: SET <key> <value>")?;
                return Ok(true);
            }

            let key = Bytes::copy_from_slice(args[1].as_bytes());
            let value = Bytes::copy_from_slice(args[2].as_bytes());
            match store.set(key, value) {
                Ok(()) => writeln!(output, "OK")?,
                Err(e) => writeln!(output, "Error: {}", e)?,
            }
        }
        "GET" => {
            if args.len() < 2 {
                writeln!(output, "Usage: GET <key>")?;
                return Ok(true);
            }

            match store.get(args[1].as_bytes()) {
                Some(value) => writeln!(output, "{}", String::from_utf8_lossy(&value))?,
                None => writeln!(output, "(nil)")?,
            }
        }
        "HELP" => {
            writeln!(output, "Available commands:")?;
            writeln!(output, "  SET <key> <value>  - store a value")?;
            writeln!(output, "  GET <key>          - retrieve a value")?;
            writeln!(output, "  EXIT               - exit the program")?;
        }
        "EXIT" => {
            writeln!(output, "Bye")?;
            return Ok(false);
        }
        _ => writeln!(output, "Unknown command. Type HELP for a list of commands.")?,
    }

    Ok(true)
}
