//! Byte sink shared by the measuring and the writing pass of the serializer.
//!
//! The same rendering code runs twice: once against [`Encoder::measure`] to
//! learn the exact length, once against [`Encoder::new`] over a buffer of that
//! length. Overflow never panics; it is reported by [`Encoder::finish`].

use core::fmt;
use std::io;

use crate::Error;

pub struct Encoder<'a> {
    buf: Option<&'a mut [u8]>,
    len: usize,
}

impl<'a> Encoder<'a> {
    /// Counts bytes without storing them.
    pub fn measure() -> Self {
        Self { buf: None, len: 0 }
    }

    pub fn new(buf: &'a mut [u8]) -> Self {
        Self {
            buf: Some(buf),
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn push(&mut self, bytes: &[u8]) {
        if let Some(buf) = self.buf.as_deref_mut() {
            let end = self.len + bytes.len();
            if end <= buf.len() {
                buf[self.len..end].copy_from_slice(bytes);
            }
        }
        self.len += bytes.len();
    }

    pub fn push_str(&mut self, s: &str) {
        self.push(s.as_bytes())
    }

    /// Writes `s` as a quoted, escaped JSON string.
    pub fn push_json_str(&mut self, s: &str) {
        // the sink itself never fails
        let _ = serde_json::to_writer(&mut *self, s);
    }

    /// Takes precedence over the `fmt::Write` and `io::Write` versions so
    /// `write!` is unambiguous and infallible on an encoder.
    pub fn write_fmt(&mut self, args: fmt::Arguments<'_>) {
        let _ = fmt::Write::write_fmt(self, args);
    }

    /// Total bytes produced, or `BufferTooSmall` when they did not fit.
    pub fn finish(self) -> crate::Result<usize> {
        match self.buf {
            Some(buf) if buf.len() < self.len => Err(Error::BufferTooSmall {
                needed: self.len,
                available: buf.len(),
            }),
            _ => Ok(self.len),
        }
    }
}

impl fmt::Write for Encoder<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.push_str(s);
        Ok(())
    }
}

impl io::Write for Encoder<'_> {
    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        self.push(bytes);
        Ok(bytes.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(enc: &mut Encoder) {
        enc.push_str("{\"name\":");
        enc.push_json_str("Desk \"lamp\"");
        write!(enc, ",\"value\":{}}}", 42);
    }

    #[test]
    fn measure_then_write() {
        let mut measure = Encoder::measure();
        render(&mut measure);
        let len = measure.finish().unwrap();

        let mut buf = vec![0; len];
        let mut enc = Encoder::new(&mut buf);
        render(&mut enc);
        assert_eq!(enc.finish().unwrap(), len);
        assert_eq!(
            core::str::from_utf8(&buf).unwrap(),
            r#"{"name":"Desk \"lamp\"","value":42}"#
        );
    }

    #[test]
    fn overflow_is_reported() {
        let mut buf = [0u8; 4];
        let mut enc = Encoder::new(&mut buf);
        enc.push_str("too long");
        match enc.finish() {
            Err(Error::BufferTooSmall { needed, available }) => {
                assert_eq!((needed, available), (8, 4));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
