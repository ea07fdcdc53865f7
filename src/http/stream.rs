//! Streaming response reader.

use bytes::Bytes;
use reqwest::StatusCode;
use reqwest::header::HeaderMap;

use super::HttpError;

/// An in-flight response whose body is still open.
///
/// The reader owns the response; the connection stays in use until
/// [`close`](Self::close) is called or the reader is dropped. `close`
/// consumes the reader, so the body is released exactly once and cannot
/// be read afterwards.
#[derive(Debug)]
pub struct StreamReader {
    response: reqwest::Response,
    /// Unread tail of the last chunk when the caller's buffer was smaller.
    pending: Bytes,
}

impl StreamReader {
    pub(crate) fn new(response: reqwest::Response) -> Self {
        Self { response, pending: Bytes::new() }
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.response.status()
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        self.response.headers()
    }

    /// Read up to `buf.len()` bytes of body. Returns 0 at end of body.
    ///
    /// # Errors
    ///
    /// [`HttpError::Read`] if the connection fails mid-body.
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize, HttpError> {
        if buf.is_empty() {
            return Ok(0);
        }
        while self.pending.is_empty() {
            match self.response.chunk().await.map_err(HttpError::Read)? {
                Some(chunk) => self.pending = chunk,
                None => return Ok(0),
            }
        }
        let n = buf.len().min(self.pending.len());
        buf[..n].copy_from_slice(&self.pending.split_to(n));
        Ok(n)
    }

    /// Drain the rest of the body.
    ///
    /// # Errors
    ///
    /// [`HttpError::Read`] if the connection fails mid-body.
    pub async fn read_all(&mut self) -> Result<Vec<u8>, HttpError> {
        let mut out = std::mem::take(&mut self.pending).to_vec();
        while let Some(chunk) = self.response.chunk().await.map_err(HttpError::Read)? {
            out.extend_from_slice(&chunk);
        }
        Ok(out)
    }

    /// Release the body and its connection.
    ///
    /// # Errors
    ///
    /// Never fails with the reqwest backend.
    #[allow(clippy::unnecessary_wraps)]
    pub fn close(self) -> Result<(), HttpError> {
        drop(self.response);
        Ok(())
    }
}
