//! Record framing for the chat stream.
//!
//! The server emits `data: <json>` records, normally separated by blank
//! lines. A single network read may carry part of a record, exactly one
//! record, or several. `RecordDecoder` buffers raw bytes and hands out
//! whole records regardless of how the reads were cut.

use bytes::Bytes;
use futures_util::stream::{self, Stream, StreamExt};

use crate::client::ClientError;
use crate::messages::{StreamChunk, StreamRecord};

const DATA_PREFIX: &str = "data:";

/// Incremental decoder from byte reads to `StreamRecord`s.
#[derive(Debug, Default)]
pub struct RecordDecoder {
    buffer: Vec<u8>,
}

/// Result of feeding the decoder: the records completed so far and, if
/// decoding hit a malformed record, the error that stopped it. Records
/// before the error are always kept.
#[derive(Debug, Default)]
pub struct Decoded {
    pub records: Vec<StreamRecord>,
    pub error: Option<ClientError>,
}

impl RecordDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one read. Returns every record completed by it, in order.
    ///
    /// Decoding stops at the first malformed line; bytes after it stay
    /// buffered.
    pub fn push(&mut self, chunk: &[u8]) -> Decoded {
        self.buffer.extend_from_slice(chunk);
        let mut decoded = Decoded::default();

        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let error = match std::str::from_utf8(&line) {
                Ok(line) => decode_line(line, &mut decoded.records),
                Err(e) => Some(e.into()),
            };
            if error.is_some() {
                decoded.error = error;
                return decoded;
            }
        }

        // Unterminated tail: take every record that is already complete.
        let consumed = match std::str::from_utf8(&self.buffer) {
            Ok(tail) => {
                let (tail_records, used, _) = parse_records(tail);
                decoded.records.extend(tail_records);
                used
            }
            Err(_) => 0,
        };
        self.buffer.drain(..consumed);
        decoded
    }

    /// Flush at end-of-stream. A leftover that is not a valid record is an error.
    pub fn finish(&mut self) -> Decoded {
        let mut decoded = Decoded::default();
        if self.buffer.is_empty() {
            return decoded;
        }
        let rest = std::mem::take(&mut self.buffer);
        decoded.error = match std::str::from_utf8(&rest) {
            Ok(rest) => decode_line(rest, &mut decoded.records),
            Err(e) => Some(e.into()),
        };
        decoded
    }
}

fn strip_prefix(text: &str) -> &str {
    match text.strip_prefix(DATA_PREFIX) {
        Some(rest) => rest.strip_prefix(' ').unwrap_or(rest),
        None => text,
    }
}

/// Parse back-to-back `data: {json}` records from the start of `text`.
///
/// Returns the records, how many bytes of `text` they covered, and the
/// error that stopped parsing, if any.
fn parse_records(text: &str) -> (Vec<StreamRecord>, usize, Option<serde_json::Error>) {
    let mut records = Vec::new();
    let mut rest = text.trim_start();
    let mut error = None;
    while !rest.is_empty() {
        let payload = strip_prefix(rest);
        let mut values = serde_json::Deserializer::from_str(payload).into_iter::<StreamChunk>();
        match values.next() {
            Some(Ok(chunk)) => {
                records.push(chunk.into());
                rest = payload[values.byte_offset()..].trim_start();
            }
            Some(Err(e)) => {
                error = Some(e);
                break;
            }
            None => break,
        }
    }
    (records, text.len() - rest.len(), error)
}

/// Decode one complete line into `out`. Blank lines and `:` comments yield
/// nothing. Records before a malformed one are still appended.
fn decode_line(line: &str, out: &mut Vec<StreamRecord>) -> Option<ClientError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with(':') {
        return None;
    }
    let (records, used, error) = parse_records(line);
    tracing::debug!(?records, "decoded stream line");
    out.extend(records);
    if let Some(e) = error {
        return Some(e.into());
    }
    if used < line.len() {
        // Leftover that is not a record, e.g. a bare prefix.
        if let Err(e) = StreamRecord::from_json(strip_prefix(&line[used..])) {
            return Some(e.into());
        }
    }
    None
}

/// Adapt an HTTP byte stream into a stream of records.
///
/// Errors are yielded in place; the caller decides whether to stop.
pub fn decode_records<S>(byte_stream: S) -> impl Stream<Item = Result<StreamRecord, ClientError>>
where
    S: Stream<Item = Result<Bytes, reqwest::Error>>,
{
    let byte_stream = Box::pin(byte_stream);
    let pending: std::collections::VecDeque<Result<StreamRecord, ClientError>> =
        Default::default();

    stream::unfold(
        (byte_stream, RecordDecoder::new(), pending, false),
        |(mut byte_stream, mut decoder, mut pending, mut done)| async move {
            loop {
                if let Some(item) = pending.pop_front() {
                    return Some((item, (byte_stream, decoder, pending, done)));
                }
                if done {
                    return None;
                }

                let decoded = match byte_stream.next().await {
                    Some(Ok(bytes)) => decoder.push(&bytes),
                    Some(Err(e)) => Decoded {
                        records: Vec::new(),
                        error: Some(e.into()),
                    },
                    None => {
                        done = true;
                        decoder.finish()
                    }
                };
                pending.extend(decoded.records.into_iter().map(Ok));
                if let Some(e) = decoded.error {
                    done = true;
                    pending.push_back(Err(e));
                }
            }
        },
    )
}
