//! Assembly of one upstream stream into a contiguous PCM buffer.

use bytes::BytesMut;
use futures::{Stream, StreamExt};
use tracing::{debug, trace};

use super::types::AssembledAudio;
use crate::core::audio::{AudioFragment, SampleFormat};
use crate::core::upstream::UpstreamError;

/// Concatenates fragment payloads in arrival order.
///
/// Empty fragments are skipped. The last declared sample format wins; if no
/// fragment declares one, the default streaming format is used.
#[derive(Debug, Default)]
pub struct StreamAccumulator {
    buffer: BytesMut,
    format: Option<SampleFormat>,
    fragments: usize,
}

impl StreamAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, fragment: AudioFragment) {
        if let Some(format) = fragment.format {
            self.format = Some(format);
        }
        if fragment.is_empty() {
            return;
        }

        self.buffer.extend_from_slice(&fragment.data);
        self.fragments += 1;
        trace!(
            fragment_bytes = fragment.data.len(),
            total_bytes = self.buffer.len(),
            "Accumulated audio fragment"
        );
    }

    pub fn fragment_count(&self) -> usize {
        self.fragments
    }

    /// Resolves the buffer, or `None` when the stream carried no audio bytes.
    pub fn finish(self) -> Option<AssembledAudio> {
        if self.buffer.is_empty() {
            return None;
        }
        Some(AssembledAudio {
            payload: self.buffer.freeze(),
            format: self.format.unwrap_or_default(),
        })
    }
}

/// Drains `stream` into an [`AssembledAudio`].
///
/// Returns `Ok(None)` when the stream ends without audio bytes, and the first
/// error the stream yields otherwise (the partial buffer is dropped).
pub async fn accumulate<S>(stream: S) -> Result<Option<AssembledAudio>, UpstreamError>
where
    S: Stream<Item = Result<AudioFragment, UpstreamError>>,
{
    let mut stream = std::pin::pin!(stream);
    let mut accumulator = StreamAccumulator::new();

    while let Some(fragment) = stream.next().await {
        accumulator.push(fragment?);
    }

    debug!(
        fragments = accumulator.fragment_count(),
        "Upstream stream drained"
    );
    Ok(accumulator.finish())
}
