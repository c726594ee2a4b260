/*!
A streaming CSV field tokenizer.

This crate reads delimiter-separated text from any [`std::io::Read`] source
and yields one field at a time as a byte slice borrowed from its internal
buffer. Rows and files are never materialized, and field bytes are never
copied on the way out: memory use is bounded by the longest field in
flight, and can be capped outright with
[`ReaderBuilder::max_field_len`].

Line endings may be `\n`, `\r\n` or a bare `\r`, freely mixed. There is no
quoting support: a quote byte is field data like any other byte.

# Example

Dump each field of some CSV data, tab-separated, one line per record:

```
use csvtok::{NextField, Reader};

# fn main() -> csvtok::Result<()> {
let mut rdr = Reader::from_reader(&b"city,pop\nBoston,600000\n"[..]);
while let NextField::Field { data, record_end } = rdr.next_field()? {
    let sep = if record_end { "\n" } else { "\t" };
    print!("{}{}", String::from_utf8_lossy(data), sep);
}
# Ok(())
# }
```
*/

#![deny(missing_docs)]

pub use crate::error::{Error, Result};
pub use crate::reader::{NextField, Reader, ReaderBuilder};

mod error;
mod reader;
