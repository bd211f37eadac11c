use std::io::{self, Read};

use bytes::BytesMut;

const CHUNK_SIZE: usize = 8 * 1024;

/// Line-oriented pattern source.
///
/// The whole input is buffered up front; each `next()` splits one line off
/// the front of the buffer. Both `\n` and `\r\n` terminate a line, and a
/// final terminator does not produce an extra empty line.
pub struct LineSource {
    buffer: BytesMut,
}

impl LineSource {
    pub fn from_reader<R: Read>(mut reader: R) -> io::Result<Self> {
        let mut buffer = BytesMut::with_capacity(CHUNK_SIZE);
        let mut chunk = [0u8; CHUNK_SIZE];
        loop {
            let n = match reader.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            };
            buffer.extend_from_slice(&chunk[..n]);
        }
        Ok(Self { buffer })
    }
}

impl Iterator for LineSource {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }

        let line = match self.buffer.iter().position(|b| *b == b'\n') {
            Some(end) => {
                let mut line = self.buffer.split_to(end + 1);
                line.truncate(end);
                line
            }
            None => self.buffer.split(),
        };

        let line = match line.strip_suffix(b"\r") {
            Some(stripped) => stripped,
            None => &line[..],
        };
        // Invalid UTF-8 turns into U+FFFD, which the alphabet rejects.
        Some(String::from_utf8_lossy(line).into_owned())
    }
}
