use std::{
    cmp, env,
    ffi::OsString,
    fs::File,
    io::{Seek, SeekFrom},
    process,
};

use csvtok::{NextField, ReaderBuilder};
use eyre::{eyre, Result};

fn run() -> Result<()> {
    let file_path = get_first_arg()?;
    let mut builder = ReaderBuilder::new();
    builder.trim(true);

    // First pass: measure the widest field in every column.
    let mut widths: Vec<usize> = vec![];
    let mut rdr = builder.from_reader(File::open(file_path)?);
    let mut col = 0;
    loop {
        match rdr.next_field()? {
            NextField::Field { data, record_end } => {
                if col == widths.len() {
                    widths.push(0);
                }
                widths[col] = cmp::max(widths[col], data.len());
                col = if record_end { 0 } else { col + 1 };
            }
            NextField::End => break,
        }
    }

    // Second pass: rewind the file and print every field padded to its
    // column width, with a fresh reader over the same handle.
    let mut file = rdr.into_inner();
    file.seek(SeekFrom::Start(0))?;
    let mut rdr = builder.from_reader(file);
    let mut col = 0;
    loop {
        match rdr.next_field()? {
            NextField::Field { data, record_end } => {
                let width = widths.get(col).copied().unwrap_or(0);
                let text = String::from_utf8_lossy(data);
                if record_end {
                    println!("{:<1$}", text, width);
                    col = 0;
                } else {
                    print!("{:<1$}  ", text, width);
                    col += 1;
                }
            }
            NextField::End => break,
        }
    }
    Ok(())
}

/// Returns the first positional argument sent to this process. If there are
/// no positional arguments, then this returns an error.
fn get_first_arg() -> Result<OsString> {
    match env::args_os().nth(1) {
        None => Err(eyre!("usage: align-columns <csv file path>")),
        Some(file_path) => Ok(file_path),
    }
}

fn main() {
    if let Err(err) = run() {
        eprintln!("{:?}", err);
        process::exit(1);
    }
}
