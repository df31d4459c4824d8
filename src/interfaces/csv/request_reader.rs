use crate::error::{LoanError, Result};
use crate::interfaces::http::Request;
use std::io::Read;

/// Reads requests from a CSV script with `method, path, body` columns.
///
/// Whitespace around fields is trimmed and the `body` column may be left
/// off for `GET` rows. A quoted body must start right after its comma.
pub struct RequestReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> RequestReader<R> {
    /// Creates a new `RequestReader` from any `Read` source (e.g., File, Stdin).
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily reads and deserializes requests, one per row.
    pub fn requests(self) -> impl Iterator<Item = Result<Request>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(LoanError::from))
    }
}
