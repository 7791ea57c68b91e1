//! Incremental decoding of streamed HTTP bodies.
//!
//! Network chunks can split a line, or a UTF-8 sequence, anywhere. The decoders
//! buffer raw bytes and only hand out complete lines until the body ends,
//! when whatever is left over is flushed.

use futures::{future, stream, Stream, StreamExt};

use super::{ChunkStream, ProviderError};

/// Splits a byte stream into lines.
#[derive(Debug, Default)]
pub(crate) struct LineDecoder {
    buf: Vec<u8>,
}

impl LineDecoder {
    /// Feed bytes and return every line completed by them.
    pub(crate) fn feed(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = self.buf.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            lines.push(String::from_utf8_lossy(&line).into_owned());
        }
        lines
    }

    /// Flush a final line that had no terminating newline.
    pub(crate) fn finish(&mut self) -> Option<String> {
        if self.buf.is_empty() {
            return None;
        }
        let mut line = std::mem::take(&mut self.buf);
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Some(String::from_utf8_lossy(&line).into_owned())
    }
}

/// One server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SseEvent {
    pub event: Option<String>,
    pub data: String,
}

/// Server-sent events decoder.
#[derive(Debug, Default)]
pub(crate) struct SseDecoder {
    lines: LineDecoder,
    event: Option<String>,
    data: Vec<String>,
}

impl SseDecoder {
    /// Feed bytes and return every event completed by them.
    pub(crate) fn feed(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        self.lines.feed(bytes).into_iter().filter_map(|line| self.line(&line)).collect()
    }

    /// Flush the event left open when the body ended without a blank line.
    pub(crate) fn finish(&mut self) -> Option<SseEvent> {
        if let Some(line) = self.lines.finish() {
            if let Some(event) = self.line(&line) {
                return Some(event);
            }
        }
        self.dispatch()
    }

    fn line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = line.split_once(':').unwrap_or((line, ""));
        let value = value.strip_prefix(' ').unwrap_or(value);
        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseEvent { event, data })
    }
}

/// Decode an SSE body into text chunks using `parse` for each event.
pub(crate) fn sse_text_stream<S, B, E, F>(body: S, parse: F) -> ChunkStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<ProviderError> + Send + 'static,
    F: Fn(&SseEvent) -> Result<Option<String>, ProviderError> + Send + 'static,
{
    let events = body
        .map(Some)
        .chain(stream::once(future::ready(None)))
        .scan(SseDecoder::default(), |decoder, item| {
            let batch: Vec<Result<SseEvent, ProviderError>> = match item {
                Some(Ok(bytes)) => decoder.feed(bytes.as_ref()).into_iter().map(Ok).collect(),
                Some(Err(e)) => vec![Err(e.into())],
                None => decoder.finish().into_iter().map(Ok).collect(),
            };
            future::ready(Some(stream::iter(batch)))
        })
        .flatten();

    Box::pin(events.filter_map(move |event| {
        future::ready(match event {
            Ok(event) => parse(&event).transpose(),
            Err(e) => Some(Err(e)),
        })
    }))
}

/// Decode a newline-delimited body into text chunks using `parse` for each line.
pub(crate) fn line_text_stream<S, B, E, F>(body: S, parse: F) -> ChunkStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<ProviderError> + Send + 'static,
    F: Fn(&str) -> Result<Option<String>, ProviderError> + Send + 'static,
{
    let lines = body
        .map(Some)
        .chain(stream::once(future::ready(None)))
        .scan(LineDecoder::default(), |decoder, item| {
            let batch: Vec<Result<String, ProviderError>> = match item {
                Some(Ok(bytes)) => decoder.feed(bytes.as_ref()).into_iter().map(Ok).collect(),
                Some(Err(e)) => vec![Err(e.into())],
                None => decoder.finish().into_iter().map(Ok).collect(),
            };
            future::ready(Some(stream::iter(batch)))
        })
        .flatten();

    Box::pin(lines.filter_map(move |line| {
        future::ready(match line {
            Ok(line) if line.trim().is_empty() => None,
            Ok(line) => parse(&line).transpose(),
            Err(e) => Some(Err(e)),
        })
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_decoder_handles_split_lines() {
        let mut decoder = LineDecoder::default();
        assert!(decoder.feed(b"hel").is_empty());
        assert_eq!(decoder.feed(b"lo\r\nwor"), vec!["hello".to_string()]);
        assert_eq!(decoder.feed(b"ld\n\n"), vec!["world".to_string(), String::new()]);
    }

    #[test]
    fn test_line_decoder_handles_split_utf8() {
        let mut decoder = LineDecoder::default();
        let bytes = "café\n".as_bytes();
        assert!(decoder.feed(&bytes[..4]).is_empty());
        assert_eq!(decoder.feed(&bytes[4..]), vec!["café".to_string()]);
    }

    #[test]
    fn test_sse_decoder_events() {
        let mut decoder = SseDecoder::default();
        let events = decoder.feed(b": ping\nevent: delta\ndata: {\"a\":1}\n\ndata: x\ndata: y\n\n");
        assert_eq!(
            events,
            vec![
                SseEvent { event: Some("delta".into()), data: "{\"a\":1}".into() },
                SseEvent { event: None, data: "x\ny".into() },
            ]
        );
    }

    #[tokio::test]
    async fn test_sse_text_stream_across_chunks() {
        let body = stream::iter(vec![
            Ok::<_, ProviderError>(b"data: one\n".to_vec()),
            Ok(b"\nda".to_vec()),
            Ok(b"ta: skip\n\ndata: two\n\n".to_vec()),
        ]);
        let chunks: Vec<String> = sse_text_stream(body, |event| {
            Ok((event.data != "skip").then(|| event.data.clone()))
        })
        .map(|r| r.unwrap())
        .collect()
        .await;

        assert_eq!(chunks, vec!["one".to_string(), "two".to_string()]);
    }

    #[test]
    fn test_decoders_flush_unterminated_input() {
        let mut lines = LineDecoder::default();
        assert!(lines.feed(b"last\r").is_empty());
        assert_eq!(lines.finish(), Some("last".to_string()));
        assert_eq!(lines.finish(), None);

        let mut events = SseDecoder::default();
        assert!(events.feed(b"event: delta\ndata: a\ndata: b").is_empty());
        assert_eq!(events.finish(), Some(SseEvent { event: Some("delta".into()), data: "a\nb".into() }));
        assert_eq!(events.finish(), None);

        let mut comment_only = SseDecoder::default();
        assert!(comment_only.feed(b"event: ping\n: keepalive").is_empty());
        assert_eq!(comment_only.finish(), None);
    }

    #[tokio::test]
    async fn test_final_event_without_blank_line() {
        let body = stream::iter(vec![
            Ok::<_, ProviderError>(b"data: one\n\n".to_vec()),
            Ok(b"data: two\n".to_vec()),
        ]);
        let chunks: Vec<String> = sse_text_stream(body, |event| Ok(Some(event.data.clone())))
            .map(|r| r.unwrap())
            .collect()
            .await;

        assert_eq!(chunks, vec!["one".to_string(), "two".to_string()]);
    }

    #[tokio::test]
    async fn test_final_line_without_newline() {
        let body = stream::iter(vec![
            Ok::<_, ProviderError>(b"{\"n\":1}\n{\"n\"".to_vec()),
            Ok(b":2}".to_vec()),
        ]);
        let lines: Vec<String> = line_text_stream(body, |line| Ok(Some(line.to_string())))
            .map(|r| r.unwrap())
            .collect()
            .await;

        assert_eq!(lines, vec!["{\"n\":1}".to_string(), "{\"n\":2}".to_string()]);
    }

    #[tokio::test]
    async fn test_line_text_stream_propagates_errors() {
        let body = stream::iter(vec![
            Ok(b"a\n".to_vec()),
            Err(ProviderError::Stream("reset".into())),
        ]);
        let items: Vec<Result<String, ProviderError>> =
            line_text_stream(body, |line| Ok(Some(line.to_string()))).collect().await;

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap(), "a");
        assert!(items[1].is_err());
    }
}
