//! Property-based tests for the streaming wire decoding
//!
//! Transport chunking is arbitrary, so decoding must not depend on where
//! the byte stream happens to be split.

use super::openai::fragment_stream;
use super::sse::{SseDecoder, SseFrame};
use super::LlmError;
use futures::StreamExt;
use proptest::prelude::*;

// ============================================================================
// Strategies
// ============================================================================

/// Fragment text including multi-byte characters and JSON-escaped chars
fn arb_fragment() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 .,!?éü✓\"\\\\]{1,20}"
}

fn event_for(fragment: &str) -> String {
    let chunk = serde_json::json!({
        "choices": [{ "index": 0, "delta": { "content": fragment } }]
    });
    format!("data: {chunk}\n\n")
}

fn wire_bytes(fragments: &[String]) -> Vec<u8> {
    let mut wire = String::from(": keep-alive\n\n");
    wire.push_str("data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n");
    for fragment in fragments {
        wire.push_str(&event_for(fragment));
    }
    wire.push_str("data: [DONE]\n\n");
    wire.into_bytes()
}

/// Split `bytes` at the given (sorted, deduplicated) cut points
fn split_at_cuts(bytes: &[u8], cuts: &[usize]) -> Vec<Vec<u8>> {
    let mut points: Vec<usize> = cuts.iter().map(|c| c % (bytes.len() + 1)).collect();
    points.sort_unstable();
    points.dedup();

    let mut chunks = Vec::new();
    let mut start = 0;
    for point in points {
        chunks.push(bytes[start..point].to_vec());
        start = point;
    }
    chunks.push(bytes[start..].to_vec());
    chunks
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn decoder_frames_independent_of_chunking(
        fragments in proptest::collection::vec(arb_fragment(), 0..8),
        cuts in proptest::collection::vec(any::<usize>(), 0..12),
    ) {
        let bytes = wire_bytes(&fragments);

        let mut whole = SseDecoder::new();
        let expected = whole.push(&bytes);

        let mut decoder = SseDecoder::new();
        let mut frames = Vec::new();
        for chunk in split_at_cuts(&bytes, &cuts) {
            frames.extend(decoder.push(&chunk));
        }
        frames.extend(decoder.finish());

        prop_assert_eq!(&frames, &expected);
        prop_assert_eq!(frames.last(), Some(&SseFrame::Done));
    }

    #[test]
    fn fragment_stream_reassembles_text(
        fragments in proptest::collection::vec(arb_fragment(), 0..8),
        cuts in proptest::collection::vec(any::<usize>(), 0..12),
    ) {
        let bytes = wire_bytes(&fragments);
        let chunks: Vec<Result<Vec<u8>, LlmError>> =
            split_at_cuts(&bytes, &cuts).into_iter().map(Ok).collect();

        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        let received: Vec<String> = runtime.block_on(async {
            fragment_stream(futures::stream::iter(chunks))
                .map(Result::unwrap)
                .collect()
                .await
        });

        prop_assert_eq!(received.concat(), fragments.concat());
    }
}
