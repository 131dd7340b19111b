//! Semantic chunking with a sliding token overlap.
//!
//! `semchunk-rs` splits on the largest available boundary first (blank lines, then newlines,
//! then sentence punctuation and whitespace), so paragraphs stay intact whenever they fit the
//! budget. Token counts come from the `cl100k_base` encoding used by the OpenAI embedding
//! models.

use crate::index::types::ChunkingError;
use semchunk_rs::Chunker;
use std::sync::{Arc, OnceLock};
use tiktoken_rs::{CoreBPE, cl100k_base};

/// Token budget per chunk.
pub const CHUNK_SIZE: usize = 1024;
/// Tokens carried over from the previous chunk.
pub const CHUNK_OVERLAP: usize = 200;

const ENCODING: &str = "cl100k_base";

static CL100K: OnceLock<Arc<CoreBPE>> = OnceLock::new();

pub(crate) type TokenCounter = Arc<dyn Fn(&str) -> usize + Send + Sync>;

/// Chunk text into semantic segments of at most `chunk_size` tokens.
///
/// Segments are cut at `chunk_size - overlap` tokens and then prefixed with up to `overlap`
/// tokens from the end of the previous segment. Returns an empty vector when the input text is
/// all whitespace. Tokenization is CPU-bound; async callers should run this on a blocking
/// worker.
pub fn chunk_text(
    text: &str,
    chunk_size: usize,
    overlap: usize,
) -> Result<Vec<String>, ChunkingError> {
    if chunk_size == 0 {
        return Err(ChunkingError::InvalidChunkSize);
    }
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    let token_counter = build_token_counter()?;
    Ok(chunk_text_with_counter(
        text,
        chunk_size,
        overlap,
        token_counter,
    ))
}

fn cl100k() -> Result<Arc<CoreBPE>, ChunkingError> {
    if let Some(encoding) = CL100K.get() {
        return Ok(encoding.clone());
    }
    let encoding = cl100k_base().map_err(|source| ChunkingError::Tokenizer {
        encoding: ENCODING.to_string(),
        source,
    })?;
    Ok(CL100K.get_or_init(|| Arc::new(encoding)).clone())
}

pub(crate) fn build_token_counter() -> Result<TokenCounter, ChunkingError> {
    let encoding = cl100k()?;
    Ok(Arc::new(move |segment: &str| {
        encoding.encode_ordinary(segment).len()
    }))
}

fn chunk_text_with_counter(
    text: &str,
    chunk_size: usize,
    overlap: usize,
    token_counter: TokenCounter,
) -> Vec<String> {
    let overlap = overlap.min(chunk_size.saturating_sub(1));
    let counter_for_chunker = token_counter.clone();
    let chunker = Chunker::new(
        chunk_size - overlap,
        Box::new(move |segment: &str| counter_for_chunker.as_ref()(segment)),
    );
    let base_chunks = chunker.chunk(text);
    apply_overlap(base_chunks, chunk_size, overlap, &token_counter)
}

/// Prefix each chunk with the tail of its predecessor.
///
/// Base chunks leave `overlap` tokens of headroom, so the carried tail survives intact; the
/// final trim only bites when tokens merge across the seam.
fn apply_overlap(
    chunks: Vec<String>,
    chunk_size: usize,
    overlap: usize,
    token_counter: &TokenCounter,
) -> Vec<String> {
    if overlap == 0 {
        return chunks;
    }

    let mut iter = chunks.into_iter();
    let Some(mut previous) = iter.next() else {
        return Vec::new();
    };
    let mut overlapped = vec![previous.clone()];

    for current in iter {
        overlapped.push(build_overlapped_chunk(
            &previous,
            &current,
            overlap,
            chunk_size,
            token_counter,
        ));
        previous = current;
    }

    overlapped
}

fn build_overlapped_chunk(
    previous: &str,
    current: &str,
    overlap: usize,
    chunk_size: usize,
    token_counter: &TokenCounter,
) -> String {
    let tail = trailing_within_budget(previous, overlap, token_counter);
    let mut combined = String::with_capacity(tail.len() + current.len() + 1);

    if !tail.is_empty() {
        combined.push_str(tail);
        if !ends_with_whitespace(tail) && !starts_with_whitespace(current) {
            combined.push(' ');
        }
    }

    combined.push_str(current);
    trailing_within_budget(&combined, chunk_size, token_counter).to_string()
}

/// Longest word-aligned suffix of `text` that fits in `budget` tokens.
///
/// Token counts shrink as the start moves right, so the cut point is found by binary search
/// over word starts.
fn trailing_within_budget<'a>(text: &'a str, budget: usize, token_counter: &TokenCounter) -> &'a str {
    let text = text.trim_start();
    if budget == 0 || text.is_empty() {
        return "";
    }
    if token_counter.as_ref()(text) <= budget {
        return text;
    }

    let starts = word_starts(text);
    let first_fit =
        starts.partition_point(|&start| token_counter.as_ref()(&text[start..]) > budget);
    starts.get(first_fit).map_or("", |&start| &text[start..])
}

/// Byte offsets (after the first) where a word begins.
fn word_starts(text: &str) -> Vec<usize> {
    let mut starts = Vec::new();
    let mut after_whitespace = false;
    for (offset, c) in text.char_indices() {
        let whitespace = c.is_whitespace();
        if after_whitespace && !whitespace {
            starts.push(offset);
        }
        after_whitespace = whitespace;
    }
    starts
}

fn starts_with_whitespace(text: &str) -> bool {
    text.chars().next().is_some_and(char::is_whitespace)
}

fn ends_with_whitespace(text: &str) -> bool {
    text.chars().next_back().is_some_and(char::is_whitespace)
}
