use crate::error::Result;
use crate::interfaces::http::{Request, Response};
use std::io::Write;

/// Writes one CSV row per handled request: `method, path, status, body`,
/// where `body` is the compact JSON response.
pub struct ResponseWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> ResponseWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_header(&mut self) -> Result<()> {
        self.writer.write_record(["method", "path", "status", "body"])?;
        Ok(())
    }

    pub fn write_response(&mut self, request: &Request, response: &Response) -> Result<()> {
        self.writer.write_record([
            request.method.to_string(),
            request.path.clone(),
            response.status.to_string(),
            response.body.to_string(),
        ])?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}
