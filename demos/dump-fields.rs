use std::{env, ffi::OsString, io::Write, process};

use csvtok::{NextField, ReaderBuilder};
use eyre::{eyre, Result};

fn run() -> Result<()> {
    let file_path = get_first_arg()?;
    let mut rdr =
        ReaderBuilder::new().skip_header(true).from_path(file_path)?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    while let NextField::Field { data, record_end } = rdr.next_field()? {
        out.write_all(data)?;
        out.write_all(if record_end { b"\n" } else { b"\t" })?;
    }
    Ok(())
}

/// Returns the first positional argument sent to this process. If there are
/// no positional arguments, then this returns an error.
fn get_first_arg() -> Result<OsString> {
    match env::args_os().nth(1) {
        None => Err(eyre!("usage: dump-fields <csv file path>")),
        Some(file_path) => Ok(file_path),
    }
}

fn main() {
    if let Err(err) = run() {
        eprintln!("{:?}", err);
        process::exit(1);
    }
}
