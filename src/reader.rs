use std::cmp;
use std::fmt;
use std::fs::File;
use std::io;
use std::path::Path;

use bstr::ByteSlice;
use memchr::memchr3;

use crate::error::{Error, Result};

/// The size of the internal buffer before its first growth, unless
/// configured otherwise.
const DEFAULT_BUFFER_CAPACITY: usize = 1024;

/// Room kept past `max_field_len` so that a field at the limit can still be
/// completed by a full CRLF terminator in the same buffer.
const MAX_TERMINATOR_LEN: usize = 2;

/// Builds a CSV field reader with various configuration knobs.
///
/// This builder can be used to tweak the field delimiter, header handling,
/// whitespace trimming and field length bounds. Once a [`Reader`] is built,
/// its configuration cannot be changed.
///
/// # Example
///
/// ```
/// use csvtok::{NextField, ReaderBuilder};
///
/// # fn main() -> csvtok::Result<()> {
/// let mut builder = ReaderBuilder::new();
/// builder.delimiter(b';').skip_header(true).trim(true);
///
/// let mut rdr = builder.from_reader(&b"name;age\n alice ;38\n"[..]);
/// match rdr.next_field()? {
///     NextField::Field { data, .. } => assert_eq!(data, b"alice "),
///     NextField::End => unreachable!(),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct ReaderBuilder {
    capacity: usize,
    delimiter: u8,
    skip_header: bool,
    max_field_len: Option<usize>,
    trim: bool,
}

impl Default for ReaderBuilder {
    fn default() -> ReaderBuilder {
        ReaderBuilder {
            capacity: DEFAULT_BUFFER_CAPACITY,
            delimiter: b',',
            skip_header: false,
            max_field_len: None,
            trim: false,
        }
    }
}

impl ReaderBuilder {
    /// Create a new builder with a default configuration.
    pub fn new() -> ReaderBuilder {
        ReaderBuilder::default()
    }

    /// The field delimiter to use when tokenizing CSV.
    ///
    /// The delimiter is a single byte. For example, to read tab-delimited
    /// data, use `b'\t'`. The default is `b','`.
    pub fn delimiter(&mut self, delimiter: u8) -> &mut ReaderBuilder {
        self.delimiter = delimiter;
        self
    }

    /// Whether to consume and discard the first record.
    ///
    /// This is disabled by default. When enabled, every field of the first
    /// record, up to and including its terminator, is consumed before any
    /// field is yielded, no matter how long that record is. An input that
    /// consists of nothing but an unterminated header row is treated as a
    /// skipped header followed by a clean end of input.
    pub fn skip_header(&mut self, yes: bool) -> &mut ReaderBuilder {
        self.skip_header = yes;
        self
    }

    /// An upper bound, in bytes, on the length of a single field.
    ///
    /// The default is `None`, which leaves fields unbounded and lets the
    /// buffer grow as needed. With `Some(max)`, any field longer than `max`
    /// bytes fails with [`Error::FieldTooLong`], and the internal buffer
    /// never grows past `max` plus the width of a record terminator. The
    /// bound applies to a skipped header row as well.
    pub fn max_field_len(&mut self, max: Option<usize>) -> &mut ReaderBuilder {
        self.max_field_len = max;
        self
    }

    /// Whether to strip leading spaces and tabs from each field.
    ///
    /// This is disabled by default. Only the bytes `b' '` and `b'\t'` are
    /// stripped, and only from the front of a field; trailing whitespace is
    /// never touched.
    pub fn trim(&mut self, yes: bool) -> &mut ReaderBuilder {
        self.trim = yes;
        self
    }

    /// The initial capacity of the internal read buffer.
    ///
    /// The buffer is allocated lazily on the first read and doubles as
    /// needed, so this rarely needs tuning. A configured `max_field_len`
    /// clips it.
    pub fn buffer_capacity(&mut self, capacity: usize) -> &mut ReaderBuilder {
        self.capacity = capacity;
        self
    }

    /// Build a reader from this configuration that tokenizes the given byte
    /// source.
    ///
    /// No bytes are read and no memory is allocated until the first call to
    /// [`Reader::next_field`].
    pub fn from_reader<R: io::Read>(&self, rdr: R) -> Reader<R> {
        Reader {
            rdr,
            buf: Vec::new(),
            pos: 0,
            filled: 0,
            delimiter: self.delimiter,
            skip_header: self.skip_header,
            trim: self.trim,
            max_field_len: self.max_field_len,
            capacity: self.capacity,
            read_eof: false,
            eof: false,
            line: 1,
        }
    }

    /// Build a reader from this configuration that tokenizes the file at
    /// the given path.
    pub fn from_path<P: AsRef<Path>>(&self, path: P) -> Result<Reader<File>> {
        Ok(self.from_reader(File::open(path)?))
    }
}

/// The result of reading a single field.
///
/// Field data is a slice borrowed from the reader's internal buffer, so it
/// is only valid until the next call on the same reader. Callers that need
/// to retain a field across calls must copy it out.
#[derive(Clone, Copy, Eq, PartialEq)]
pub enum NextField<'r> {
    /// A single field.
    Field {
        /// The contents of the field. When trimming is enabled, leading
        /// spaces and tabs have already been removed.
        data: &'r [u8],
        /// True when this field is the last one in its record.
        record_end: bool,
    },
    /// The end of the input.
    ///
    /// Once this is returned, every subsequent call returns `End` again
    /// without touching the underlying source.
    End,
}

impl<'r> NextField<'r> {
    /// Returns true if and only if this is the end of the input.
    pub fn is_end(&self) -> bool {
        if let NextField::End = *self {
            true
        } else {
            false
        }
    }
}

impl<'r> fmt::Debug for NextField<'r> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            NextField::Field { data, record_end } => f
                .debug_struct("Field")
                .field("data", &data.as_bstr())
                .field("record_end", &record_end)
                .finish(),
            NextField::End => write!(f, "End"),
        }
    }
}

/// How far the scanner got looking for the next field boundary.
enum Scan {
    /// A delimiter was found after `len` bytes of field data.
    Delim { len: usize },
    /// A record terminator of `width` bytes was found after `len` bytes of
    /// field data.
    Term { len: usize, width: usize },
    /// No boundary yet; `len` bytes are known to be field data. A trailing
    /// `\r` that still needs a byte of lookahead is not counted.
    Partial { len: usize },
}

/// A streaming CSV field reader.
///
/// This reader pulls bytes from any [`io::Read`] source and yields one
/// field at a time as a slice borrowed from its internal buffer. Records
/// are never materialized and field bytes are never copied on the way out.
///
/// The internal buffer holds the field currently being scanned plus
/// whatever the last read pulled in behind it; space occupied by consumed
/// fields is reclaimed by shifting rather than growth, so memory use is
/// bounded by the longest field in flight, not by record or input size.
/// [`ReaderBuilder::max_field_len`] turns that bound into a hard cap.
///
/// # Format
///
/// Fields are separated by a single delimiter byte and records are
/// terminated by `\n`, `\r\n`, or a bare `\r`, with all three accepted in
/// the same input. Records may have varying numbers of fields, and an input
/// that ends without a final terminator still yields its last field. There
/// is no quoting support of any kind: a quote byte is field data like any
/// other.
///
/// # Blocking
///
/// [`next_field`](Reader::next_field) blocks on the underlying source's
/// `read`. There is no asynchronous variant and no cancellation; only the
/// source itself can interrupt a read.
pub struct Reader<R> {
    /// The underlying byte source. The reader never closes or seeks it.
    rdr: R,
    /// Buffered input, sized to the current capacity. Only
    /// `buf[pos..filled]` holds unconsumed bytes. Empty until first use.
    buf: Vec<u8>,
    /// Offset of the first unconsumed byte in `buf`.
    pos: usize,
    /// Number of bytes at the start of `buf` that came from the source.
    filled: usize,
    /// The byte that separates fields within a record.
    delimiter: u8,
    /// True until the first record's terminator has been consumed; fields
    /// are discarded instead of yielded while this is set.
    skip_header: bool,
    /// Strip leading spaces and tabs from yielded fields.
    trim: bool,
    /// Upper bound on the length of a single field.
    max_field_len: Option<usize>,
    /// Configured initial buffer capacity, applied on first use.
    capacity: usize,
    /// Set once the source reports a clean end of input.
    read_eof: bool,
    /// Set once `End` has been returned; the source is never read again.
    eof: bool,
    /// The line number of the record currently being read, starting at 1.
    line: u64,
}

impl<R: io::Read> Reader<R> {
    /// Create a new reader with a default configuration for the given byte
    /// source.
    pub fn from_reader(rdr: R) -> Reader<R> {
        ReaderBuilder::new().from_reader(rdr)
    }
}

impl Reader<File> {
    /// Create a new reader with a default configuration for the file at
    /// the given path.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Reader<File>> {
        ReaderBuilder::new().from_path(path)
    }
}

impl<R: io::Read> Reader<R> {
    /// Read the next field.
    ///
    /// Returns the field's bytes along with whether it closes its record,
    /// or [`NextField::End`] once the input is exhausted. `End` is reported
    /// idempotently: every call after the first `End` returns `End` without
    /// reading from the source.
    ///
    /// The returned slice borrows the reader's internal buffer and is
    /// invalidated by the next call.
    ///
    /// # Example
    ///
    /// ```
    /// use csvtok::{NextField, Reader};
    ///
    /// # fn main() -> csvtok::Result<()> {
    /// let mut rdr = Reader::from_reader(&b"a,bb\nccc"[..]);
    /// let field = |data, record_end| NextField::Field { data, record_end };
    ///
    /// assert_eq!(rdr.next_field()?, field(&b"a"[..], false));
    /// assert_eq!(rdr.next_field()?, field(&b"bb"[..], true));
    /// assert_eq!(rdr.next_field()?, field(&b"ccc"[..], false));
    /// assert_eq!(rdr.next_field()?, NextField::End);
    /// assert_eq!(rdr.next_field()?, NextField::End);
    /// # Ok(())
    /// # }
    /// ```
    pub fn next_field(&mut self) -> Result<NextField<'_>> {
        if self.eof {
            return Ok(NextField::End);
        }
        if self.buf.is_empty() {
            self.alloc()?;
        }
        loop {
            // Reclaim the consumed prefix once the buffer is packed, so
            // memory is bounded by the field in flight rather than the row
            // history.
            if self.filled == self.buf.len() && self.pos > 0 {
                self.buf.copy_within(self.pos..self.filled, 0);
                self.filled -= self.pos;
                self.pos = 0;
            }
            if self.filled < self.buf.len() && !self.read_eof {
                match self.rdr.read(&mut self.buf[self.filled..]) {
                    Ok(0) => self.read_eof = true,
                    Ok(n) => self.filled += n,
                    Err(ref err)
                        if err.kind() == io::ErrorKind::Interrupted => {}
                    Err(err) => return Err(Error::Io(err)),
                }
            }
            match self.scan() {
                Scan::Delim { len } => {
                    self.check_max(len)?;
                    if self.skip_header {
                        self.consume(len + 1);
                        continue;
                    }
                    return Ok(self.field(len, 1, false));
                }
                Scan::Term { len, width } => {
                    self.check_max(len)?;
                    self.line += 1;
                    if self.skip_header {
                        self.skip_header = false;
                        self.consume(len + width);
                        continue;
                    }
                    return Ok(self.field(len, width, true));
                }
                Scan::Partial { len } => {
                    self.check_max(len)?;
                    if self.read_eof {
                        if self.pos == self.filled {
                            self.eof = true;
                            return Ok(NextField::End);
                        }
                        // The trailing run has no terminator and never will;
                        // it is the final field.
                        let tail = self.filled - self.pos;
                        if self.skip_header {
                            self.skip_header = false;
                            self.consume(tail);
                            continue;
                        }
                        return Ok(self.field(tail, 0, false));
                    }
                    if self.filled == self.buf.len() && self.pos == 0 {
                        self.grow()?;
                    }
                }
            }
        }
    }

    /// Returns true once the end of the input has been reported.
    ///
    /// When this returns true, `next_field` always returns
    /// [`NextField::End`].
    pub fn done(&self) -> bool {
        self.eof
    }

    /// Return the line number of the record currently being read.
    ///
    /// Line numbers start at 1 and advance once per consumed record
    /// terminator, so a CRLF counts once.
    pub fn line(&self) -> u64 {
        self.line
    }

    /// Return a reference to the underlying byte source.
    pub fn get_ref(&self) -> &R {
        &self.rdr
    }

    /// Return a mutable reference to the underlying byte source.
    ///
    /// Reading from the source directly will desynchronize the tokenizer.
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.rdr
    }

    /// Unwrap this reader, returning the underlying byte source.
    ///
    /// Any bytes buffered but not yet yielded are lost, so this is best
    /// called once [`done`](Reader::done) returns true, for example to
    /// rewind a file and tokenize it again with a fresh reader.
    pub fn into_inner(self) -> R {
        self.rdr
    }

    /// Look for the next field boundary in the unconsumed bytes.
    fn scan(&self) -> Scan {
        let pending = &self.buf[self.pos..self.filled];
        match memchr3(self.delimiter, b'\n', b'\r', pending) {
            None => Scan::Partial { len: pending.len() },
            Some(i) if pending[i] == self.delimiter => Scan::Delim { len: i },
            Some(i) if pending[i] == b'\n' => Scan::Term { len: i, width: 1 },
            Some(i) => {
                // A bare `\r` only terminates a record once the byte after
                // it is known not to be `\n`, or known not to exist.
                // Deciding early would split a `\r\n` that straddles a
                // refill into two terminators.
                if i + 1 < pending.len() {
                    let width = if pending[i + 1] == b'\n' { 2 } else { 1 };
                    Scan::Term { len: i, width }
                } else if self.read_eof {
                    Scan::Term { len: i, width: 1 }
                } else {
                    Scan::Partial { len: i }
                }
            }
        }
    }

    /// Hand out the field at `buf[pos..pos + len]`, consuming it together
    /// with its `term`-byte boundary.
    fn field(
        &mut self,
        len: usize,
        term: usize,
        record_end: bool,
    ) -> NextField<'_> {
        let mut start = self.pos;
        let end = self.pos + len;
        if self.trim {
            while start < end
                && (self.buf[start] == b' ' || self.buf[start] == b'\t')
            {
                start += 1;
            }
        }
        self.consume(len + term);
        NextField::Field { data: &self.buf[start..end], record_end }
    }

    #[inline]
    fn consume(&mut self, n: usize) {
        self.pos += n;
        if self.pos >= self.filled {
            self.pos = 0;
            self.filled = 0;
        }
    }

    #[inline]
    fn check_max(&self, len: usize) -> Result<()> {
        match self.max_field_len {
            Some(max) if len > max => {
                Err(Error::FieldTooLong { line: self.line, max })
            }
            _ => Ok(()),
        }
    }

    /// Allocate the buffer for the first time.
    fn alloc(&mut self) -> Result<()> {
        let mut cap = cmp::max(1, self.capacity);
        if let Some(max) = self.max_field_len {
            cap = cmp::min(cap, max.saturating_add(MAX_TERMINATOR_LEN));
        }
        self.buf.try_reserve_exact(cap).map_err(|_| Error::OutOfMemory)?;
        self.buf.resize(cap, 0);
        Ok(())
    }

    /// Double the buffer, staying within the configured field length bound.
    fn grow(&mut self) -> Result<()> {
        let cap = self.buf.len();
        let mut new_cap = cap.checked_mul(2).ok_or(Error::OutOfMemory)?;
        if let Some(max) = self.max_field_len {
            new_cap = cmp::min(new_cap, max.saturating_add(MAX_TERMINATOR_LEN));
            if new_cap <= cap {
                return Err(Error::FieldTooLong { line: self.line, max });
            }
        }
        self.buf
            .try_reserve_exact(new_cap - cap)
            .map_err(|_| Error::OutOfMemory)?;
        self.buf.resize(new_cap, 0);
        Ok(())
    }
}
