use std::fmt;

use eventsource_stream::{Event, Eventsource};
use futures::{
    stream::{self, BoxStream},
    Stream, StreamExt,
};

use crate::error::ChatError;

/// Lazy, finite, non-restartable sequence of text chunks
pub type ChunkStream = BoxStream<'static, Result<String, ChatError>>;

/// What one event means for the chunk stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    Chunk(String),
    Skip,
    Done,
}

/// Provider-specific event decoder
pub type DecodeFn = fn(&Event) -> Result<Decoded, ChatError>;

/// Text chunks decoded from a server-sent-event byte stream
///
/// Framing is done by `eventsource-stream`: comments and blocks without a
/// `data:` line are never dispatched. The result ends at the provider's
/// end marker, at end of input, or right after the first error. Empty
/// chunks and empty events are dropped.
pub fn decode_chunks<S, B, E>(bytes: S, decode: DecodeFn) -> ChunkStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: fmt::Display + Send + 'static,
{
    let events = bytes.eventsource().boxed();
    stream::unfold(Some(events), move |state| async move {
        let mut events = state?;
        loop {
            let item = match events.next().await? {
                Err(err) => Err(ChatError::Stream(err.to_string())),
                // no provider carries a payload in an empty event
                Ok(event) if event.data.is_empty() => continue,
                Ok(event) => match decode(&event) {
                    Ok(Decoded::Chunk(text)) if text.is_empty() => continue,
                    Ok(Decoded::Chunk(text)) => Ok(text),
                    Ok(Decoded::Skip) => continue,
                    Ok(Decoded::Done) => return None,
                    Err(err) => Err(err),
                },
            };
            let rest = if item.is_ok() { Some(events) } else { None };
            return Some((item, rest));
        }
    })
    .boxed()
}
