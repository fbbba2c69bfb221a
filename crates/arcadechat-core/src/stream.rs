//! Accumulates a streamed agent reply and re-extracts after every chunk.

use bytes::Bytes;
use futures_util::{Stream, StreamExt};

use crate::decode::Utf8Decoder;
use crate::extract::Extractor;
use crate::state::StructuredPayload;

/// Full replacement state for one assistant message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamUpdate {
    pub message_id: String,
    pub text: String,
    pub structured: Option<StructuredPayload>,
}

/// Buffer for one in-flight assistant message.
///
/// The extractor always sees the whole buffer, since an embedded payload can
/// be split across any number of chunks.
#[derive(Debug)]
pub struct StreamAccumulator {
    message_id: String,
    buffer: String,
    decoder: Utf8Decoder,
    extractor: Extractor,
}

impl StreamAccumulator {
    pub fn new(message_id: &str, extractor: Extractor) -> Self {
        Self {
            message_id: message_id.to_string(),
            buffer: String::new(),
            decoder: Utf8Decoder::new(),
            extractor,
        }
    }

    pub fn push(&mut self, chunk: &[u8]) -> StreamUpdate {
        let text = self.decoder.decode(chunk);
        self.buffer.push_str(&text);
        self.snapshot()
    }

    /// Flush the decoder at end of stream.
    ///
    /// Returns an update only when a dangling partial character changed the
    /// buffer; otherwise the last pushed update is already final.
    pub fn finish(&mut self) -> Option<StreamUpdate> {
        let tail = self.decoder.finish();
        if tail.is_empty() {
            return None;
        }
        self.buffer.push_str(&tail);
        Some(self.snapshot())
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    fn snapshot(&self) -> StreamUpdate {
        let extraction = self.extractor.extract(&self.buffer);
        StreamUpdate {
            message_id: self.message_id.clone(),
            text: extraction.text,
            structured: extraction.structured,
        }
    }
}

/// Drive `stream` to completion, calling `on_update` once per chunk in
/// arrival order.
///
/// A chunk error stops reading and is returned; updates already delivered
/// stay delivered.
pub async fn accumulate<S, E, F>(
    mut stream: S,
    accumulator: &mut StreamAccumulator,
    mut on_update: F,
) -> Result<(), E>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    F: FnMut(StreamUpdate),
{
    let mut chunks = 0usize;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        chunks += 1;
        tracing::trace!(
            message_id = accumulator.message_id(),
            chunk = chunks,
            bytes = chunk.len(),
            "received chunk"
        );
        on_update(accumulator.push(&chunk));
    }
    if let Some(update) = accumulator.finish() {
        on_update(update);
    }
    tracing::debug!(
        message_id = accumulator.message_id(),
        chunks,
        chars = accumulator.buffer().chars().count(),
        "stream finished"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::extract;
    use futures_util::stream;

    fn chunks(parts: &[&str]) -> impl Stream<Item = Result<Bytes, String>> + Unpin {
        let items: Vec<Result<Bytes, String>> = parts
            .iter()
            .map(|p| Ok(Bytes::copy_from_slice(p.as_bytes())))
            .collect();
        stream::iter(items)
    }

    #[tokio::test]
    async fn test_plain_chunks_concatenate_verbatim() {
        let mut acc = StreamAccumulator::new("m1", Extractor::default());
        let mut updates = Vec::new();
        accumulate(chunks(&["Hello", ", ", "world", "!\n"]), &mut acc, |u| {
            updates.push(u)
        })
        .await
        .unwrap();

        assert_eq!(updates.len(), 4);
        assert_eq!(updates[1].text, "Hello, ");
        assert_eq!(updates.last().unwrap().text, "Hello, world!\n");
        assert!(updates.iter().all(|u| u.message_id == "m1" && u.structured.is_none()));
    }

    #[tokio::test]
    async fn test_payload_split_across_chunks() {
        let parts = [
            "Sure, here",
            "'s your link: {\"structuredContent\":",
            "{\"url\":\"https://x\",\"integration\":\"googledrive\"}}",
        ];
        let mut acc = StreamAccumulator::new("m2", Extractor::default());
        let mut updates = Vec::new();
        accumulate(chunks(&parts), &mut acc, |u| updates.push(u))
            .await
            .unwrap();

        assert_eq!(updates[0].text, "Sure, here");
        assert_eq!(updates[1].text, "Sure, here's your link: {\"structuredContent\":");
        assert!(updates[0].structured.is_none());
        assert!(updates[1].structured.is_none());

        let last = updates.last().unwrap();
        assert_eq!(last.text, "Sure, here's your link:");
        assert_eq!(
            last.structured,
            Some(StructuredPayload {
                url: "https://x".to_string(),
                integration: "googledrive".to_string(),
            })
        );

        // Re-running extraction on the final buffer gives the same state
        let again = extract(acc.buffer());
        assert_eq!(again.text, last.text);
        assert_eq!(again.structured, last.structured);
    }

    #[tokio::test]
    async fn test_multibyte_split_between_chunks() {
        let bytes = "¡Olé!".as_bytes();
        let items: Vec<Result<Bytes, String>> = vec![
            Ok(Bytes::copy_from_slice(&bytes[..1])),
            Ok(Bytes::copy_from_slice(&bytes[1..5])),
            Ok(Bytes::copy_from_slice(&bytes[5..])),
        ];
        let mut acc = StreamAccumulator::new("m3", Extractor::default());
        let mut last = None;
        accumulate(stream::iter(items), &mut acc, |u| last = Some(u))
            .await
            .unwrap();
        assert_eq!(last.unwrap().text, "¡Olé!");
    }

    #[tokio::test]
    async fn test_chunk_error_stops_stream() {
        let items: Vec<Result<Bytes, String>> = vec![
            Ok(Bytes::from_static(b"partial")),
            Err("connection reset".to_string()),
            Ok(Bytes::from_static(b"never seen")),
        ];
        let mut acc = StreamAccumulator::new("m4", Extractor::default());
        let mut seen = 0;
        let result = accumulate(stream::iter(items), &mut acc, |_| seen += 1).await;

        assert_eq!(result, Err("connection reset".to_string()));
        assert_eq!(seen, 1);
        assert_eq!(acc.buffer(), "partial");
    }

    #[test]
    fn test_finish_without_pending_bytes_emits_nothing() {
        let mut acc = StreamAccumulator::new("m5", Extractor::default());
        acc.push(b"done");
        assert!(acc.finish().is_none());
    }
}
