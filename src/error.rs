use std::error;
use std::fmt;
use std::io;
use std::result;

/// A type alias for `Result<T, csvtok::Error>`.
pub type Result<T> = result::Result<T, Error>;

/// An error that can occur while tokenizing CSV data.
///
/// Every error is terminal for the call that produced it: nothing is retried
/// internally, and after an `Io` or `OutOfMemory` error the reader should be
/// discarded. Reaching the end of the input is not an error; it is reported
/// as [`NextField::End`](crate::NextField::End).
#[derive(Debug)]
pub enum Error {
    /// An I/O error that occurred while reading from the underlying source.
    ///
    /// A clean end of input is never reported this way, and interrupted
    /// reads are retried rather than surfaced.
    Io(io::Error),
    /// A field would need to exceed the configured maximum length to be
    /// completed.
    FieldTooLong {
        /// The line on which the offending field starts.
        line: u64,
        /// The configured maximum field length, in bytes.
        max: usize,
    },
    /// Growing the internal buffer failed because the allocator refused the
    /// request.
    OutOfMemory,
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::Io(err)
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            Error::Io(ref err) => Some(err),
            Error::FieldTooLong { .. } => None,
            Error::OutOfMemory => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::Io(ref err) => err.fmt(f),
            Error::FieldTooLong { line, max } => {
                write!(
                    f,
                    "CSV parse error: line {}: \
                     field is longer than the {} byte maximum",
                    line, max
                )
            }
            Error::OutOfMemory => {
                write!(f, "CSV error: out of memory growing the read buffer")
            }
        }
    }
}
