//! Zlib-stream decompression.
//!
//! With `compress=zlib-stream`, every binary frame the gateway sends is a
//! fragment of one long-lived zlib stream. A record is complete when a
//! fragment ends with the Z_SYNC_FLUSH suffix (`00 00 FF FF`); only then
//! can the buffered bytes be inflated. The inflate context must survive
//! across records, because the stream's dictionary is shared between them.

use flate2::{Decompress, FlushDecompress, Status};
use std::io;

/// Zlib suffix marking the end of a complete record.
pub(crate) const ZLIB_SUFFIX: [u8; 4] = [0x00, 0x00, 0xFF, 0xFF];

/// Shared-context inflater for zlib-stream transport compression.
///
/// One `Inflater` lives for exactly one connection; reconnecting requires
/// a fresh instance because the peer restarts its compression context.
/// Input and output buffers are reused between records to avoid
/// reallocating on every frame.
pub(crate) struct Inflater {
    /// Compressed fragments accumulated since the last complete record.
    buffer: Vec<u8>,
    /// Inflated output of the most recent record.
    output: Vec<u8>,
    /// Low-level zlib state; its dictionary persists across records.
    decompress: Decompress,
}

impl Inflater {
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(8 * 1024),
            output: Vec::with_capacity(32 * 1024),
            // The gateway sends a zlib header at the start of the stream.
            decompress: Decompress::new(true),
        }
    }

    /// Buffer one binary fragment, inflating when it completes a record.
    ///
    /// Returns `Some(bytes)` with the inflated record once the fragment
    /// ends with [`ZLIB_SUFFIX`], or `None` while more fragments are
    /// needed.
    pub fn push(&mut self, fragment: &[u8]) -> io::Result<Option<&[u8]>> {
        self.buffer.extend_from_slice(fragment);

        if !self.buffer.ends_with(&ZLIB_SUFFIX) {
            return Ok(None);
        }

        self.inflate()?;
        self.buffer.clear();
        Ok(Some(&self.output))
    }

    /// Inflate the buffered record into `output`.
    fn inflate(&mut self) -> io::Result<()> {
        self.output.clear();

        let mut consumed = 0;
        while consumed < self.buffer.len() {
            if self.output.len() == self.output.capacity() {
                self.output.reserve(32 * 1024);
            }

            let before_in = self.decompress.total_in();
            let before_out = self.decompress.total_out();

            let status = self
                .decompress
                .decompress_vec(
                    &self.buffer[consumed..],
                    &mut self.output,
                    FlushDecompress::Sync,
                )
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

            consumed += (self.decompress.total_in() - before_in) as usize;
            let produced = self.decompress.total_out() - before_out;

            match status {
                Status::StreamEnd => break,
                Status::Ok | Status::BufError => {
                    // BufError with spare output space means zlib wants
                    // input we do not have: the record was truncated.
                    if produced == 0
                        && status == Status::BufError
                        && self.output.len() < self.output.capacity()
                    {
                        return Err(io::Error::new(
                            io::ErrorKind::UnexpectedEof,
                            "truncated zlib-stream record",
                        ));
                    }
                }
            }
        }

        Ok(())
    }
}

impl Default for Inflater {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::{Compress, Compression, FlushCompress};

    /// Compress one record the way the gateway does: shared context,
    /// terminated with a sync flush.
    fn compress_record(compress: &mut Compress, data: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(data.len() + 256);
        let mut consumed = 0;
        loop {
            if out.len() == out.capacity() {
                out.reserve(256);
            }
            let before_in = compress.total_in();
            compress
                .compress_vec(&data[consumed..], &mut out, FlushCompress::Sync)
                .unwrap();
            consumed += (compress.total_in() - before_in) as usize;
            if consumed == data.len() && out.ends_with(&ZLIB_SUFFIX) {
                return out;
            }
        }
    }

    #[test]
    fn test_single_record_roundtrip() {
        let payload = br#"{"op":10,"d":{"heartbeat_interval":41250}}"#;
        let mut compress = Compress::new(Compression::default(), true);
        let record = compress_record(&mut compress, payload);

        let mut inflater = Inflater::new();
        let out = inflater.push(&record).unwrap().expect("complete record");
        assert_eq!(out, payload);
    }

    #[test]
    fn test_fragmented_record_buffers_until_suffix() {
        let payload = br#"{"op":11,"d":null}"#;
        let mut compress = Compress::new(Compression::default(), true);
        let record = compress_record(&mut compress, payload);

        let mut inflater = Inflater::new();
        let (head, tail) = record.split_at(record.len() / 2);
        assert!(inflater.push(head).unwrap().is_none());
        let out = inflater.push(tail).unwrap().expect("complete record");
        assert_eq!(out, payload);
    }

    #[test]
    fn test_context_persists_across_records() {
        // Later records depend on the shared dictionary; inflating them
        // only works if the inflate state survives between pushes.
        let payloads: [&[u8]; 3] = [
            br#"{"t":"READY","s":1,"op":0,"d":{"session_id":"abc"}}"#,
            br#"{"t":"MESSAGE_CREATE","s":2,"op":0,"d":{"content":"hi"}}"#,
            br#"{"t":"MESSAGE_CREATE","s":3,"op":0,"d":{"content":"hi again"}}"#,
        ];

        let mut compress = Compress::new(Compression::default(), true);
        let mut inflater = Inflater::new();

        for payload in payloads {
            let record = compress_record(&mut compress, payload);
            let out = inflater.push(&record).unwrap().expect("complete record");
            assert_eq!(out, payload);
        }
    }

    #[test]
    fn test_arbitrary_fragmentation_yields_records_in_order() {
        let payloads: [&[u8]; 3] = [
            br#"{"op":10,"d":{"heartbeat_interval":41250}}"#,
            br#"{"t":"READY","s":1,"op":0,"d":{"v":10}}"#,
            br#"{"op":11,"d":null}"#,
        ];

        let mut compress = Compress::new(Compression::default(), true);
        let mut inflater = Inflater::new();
        let mut seen = Vec::new();

        for (i, payload) in payloads.iter().enumerate() {
            // Vary the fragment size per record to exercise the buffering.
            let record = compress_record(&mut compress, payload);
            let chunk = (i % 3) + 1;
            let mut fragments: Vec<&[u8]> = record.chunks(chunk).collect();
            let last = fragments.pop().unwrap();

            for fragment in fragments {
                // Mid-record fragments can only complete the record if a
                // chunk happens to end on the suffix, which cannot happen
                // before the final bytes of the record.
                assert!(inflater.push(fragment).unwrap().is_none());
            }
            if let Some(out) = inflater.push(last).unwrap() {
                seen.push(out.to_vec());
            }
        }

        assert_eq!(seen.len(), payloads.len());
        for (out, payload) in seen.iter().zip(payloads) {
            assert_eq!(out.as_slice(), payload);
        }
    }
}
