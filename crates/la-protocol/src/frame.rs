//! Streaming frame decoder
//!
//! Turns the raw byte stream coming from the analyzer into tokens and groups
//! the tokens into `\r`-terminated blocks. The decoder keeps no knowledge of
//! commands; matching blocks to commands happens one layer up.

use std::collections::VecDeque;
use std::fmt;

use tracing::{trace, warn};

use crate::response::{classify_token, BlockKind, TokenKind};
use crate::{DELIMITER, TERMINATOR};

/// Longest token the decoder will buffer before discarding it
pub const MAX_TOKEN_LEN: usize = 1024;

/// A terminator-delimited group of tokens
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Block {
    tokens: Vec<String>,
}

impl Block {
    /// Create a block from already split tokens
    pub fn new(tokens: Vec<String>) -> Self {
        Self { tokens }
    }

    /// Tokens in arrival order
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// Consume the block, returning its tokens
    pub fn into_tokens(self) -> Vec<String> {
        self.tokens
    }

    /// True for a bare terminator
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Number of tokens in the block
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Classify the block by its final token
    pub fn kind(&self) -> BlockKind {
        match self.tokens.last() {
            None => BlockKind::Empty,
            Some(last) => match classify_token(last) {
                TokenKind::Acknowledge => BlockKind::Acknowledgment,
                TokenKind::Error(code) => BlockKind::ErrorCode(code),
                TokenKind::Data => BlockKind::DataTokens,
            },
        }
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tokens.join(","))
    }
}

/// Streaming decoder for comma-delimited, `\r`-terminated response blocks
#[derive(Debug, Default)]
pub struct FrameDecoder {
    token: String,
    tokens: Vec<String>,
    ready: VecDeque<Block>,
    overflowed: bool,
}

impl FrameDecoder {
    /// Create a new decoder
    pub fn new() -> Self {
        Self {
            token: String::with_capacity(256),
            tokens: Vec::new(),
            ready: VecDeque::new(),
            overflowed: false,
        }
    }

    /// Push raw bytes from the transport
    pub fn push_bytes(&mut self, data: &[u8]) {
        for &byte in data {
            match byte {
                DELIMITER => self.close_token(),
                TERMINATOR => {
                    if self.overflowed || !self.token.is_empty() || !self.tokens.is_empty() {
                        self.close_token();
                    }
                    let block = Block::new(std::mem::take(&mut self.tokens));
                    trace!("Decoded block: {:?}", block.tokens());
                    self.ready.push_back(block);
                }
                _ if self.overflowed => {}
                _ if self.token.len() >= MAX_TOKEN_LEN => {
                    warn!(
                        "Discarding token longer than {} bytes: {:?}...",
                        MAX_TOKEN_LEN,
                        self.token.chars().take(32).collect::<String>()
                    );
                    self.token.clear();
                    self.overflowed = true;
                }
                _ => self.token.push(char::from(byte)),
            }
        }
    }

    /// Take the oldest completed block, if any
    pub fn next_block(&mut self) -> Option<Block> {
        self.ready.pop_front()
    }

    /// True if bytes of an unterminated block are buffered
    pub fn has_partial(&self) -> bool {
        !self.token.is_empty() || !self.tokens.is_empty() || self.overflowed
    }

    /// Drop all buffered state
    pub fn clear(&mut self) {
        self.token.clear();
        self.tokens.clear();
        self.ready.clear();
        self.overflowed = false;
    }

    fn close_token(&mut self) {
        if self.overflowed {
            self.overflowed = false;
            self.token.clear();
            return;
        }
        self.tokens.push(std::mem::take(&mut self.token));
    }
}

/// Encode a command for transmission
pub fn encode_command(command: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(command.len() + 1);
    out.extend_from_slice(command.as_bytes());
    out.push(TERMINATOR);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn decode_all(decoder: &mut FrameDecoder) -> Vec<Vec<String>> {
        std::iter::from_fn(|| decoder.next_block())
            .map(Block::into_tokens)
            .collect()
    }

    #[test]
    fn test_encoded_command_decodes_to_single_token() {
        let mut decoder = FrameDecoder::new();
        decoder.push_bytes(&encode_command("LINES"));

        let block = decoder.next_block().unwrap();
        assert_eq!(block.tokens(), ["LINES"]);
        assert!(decoder.next_block().is_none());
    }

    #[test]
    fn test_encode_appends_terminator() {
        assert_eq!(encode_command("IDENT"), b"IDENT\r");
        assert_eq!(encode_command(""), b"\r");
    }

    #[test]
    fn test_data_and_ack_in_one_block() {
        let mut decoder = FrameDecoder::new();
        decoder.push_bytes(b"DATA1,DATA2,OK\r");

        let block = decoder.next_block().unwrap();
        assert_eq!(block.tokens(), ["DATA1", "DATA2", "OK"]);
        assert_eq!(block.kind(), BlockKind::Acknowledgment);
    }

    #[test]
    fn test_bare_terminator_is_empty_block() {
        let mut decoder = FrameDecoder::new();
        decoder.push_bytes(b"\r");

        let block = decoder.next_block().unwrap();
        assert!(block.is_empty());
        assert_eq!(block.kind(), BlockKind::Empty);
    }

    #[test]
    fn test_trailing_delimiter_keeps_empty_token() {
        let mut decoder = FrameDecoder::new();
        decoder.push_bytes(b"A,\r");

        assert_eq!(decode_all(&mut decoder), vec![vec!["A".to_string(), String::new()]]);
    }

    #[test]
    fn test_streaming_parse() {
        let mut decoder = FrameDecoder::new();

        decoder.push_bytes(b"LA4800 V2");
        assert!(decoder.next_block().is_none());
        assert!(decoder.has_partial());

        decoder.push_bytes(b".13\rO");
        let block = decoder.next_block().unwrap();
        assert_eq!(block.tokens(), ["LA4800 V2.13"]);
        assert!(decoder.next_block().is_none());

        decoder.push_bytes(b"K\r");
        assert_eq!(decoder.next_block().unwrap().kind(), BlockKind::Acknowledgment);
        assert!(!decoder.has_partial());
    }

    #[test]
    fn test_multiple_blocks() {
        let mut decoder = FrameDecoder::new();
        decoder.push_bytes(b"1,0\rOK\rERROR 07\r");

        let blocks: Vec<_> = std::iter::from_fn(|| decoder.next_block()).collect();
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0].kind(), BlockKind::DataTokens);
        assert_eq!(blocks[1].kind(), BlockKind::Acknowledgment);
        assert_eq!(blocks[2].kind(), BlockKind::ErrorCode(7));
    }

    #[test]
    fn test_oversized_token_is_discarded() {
        let mut decoder = FrameDecoder::new();
        let long = vec![b'X'; MAX_TOKEN_LEN + 10];
        decoder.push_bytes(&long);
        decoder.push_bytes(b",KEEP,OK\r");

        let block = decoder.next_block().unwrap();
        assert_eq!(block.tokens(), ["KEEP", "OK"]);
    }

    #[test]
    fn test_clear_drops_partial_and_ready() {
        let mut decoder = FrameDecoder::new();
        decoder.push_bytes(b"OK\rPART");
        decoder.clear();

        assert!(decoder.next_block().is_none());
        assert!(!decoder.has_partial());
    }

    #[test]
    fn test_block_display_rejoins_tokens() {
        let block = Block::new(vec!["A".into(), "B".into()]);
        assert_eq!(block.to_string(), "A,B");
    }

    proptest! {
        #[test]
        fn chunking_does_not_change_blocks(
            stream in proptest::collection::vec(
                prop_oneof![Just(b'A'), Just(b'7'), Just(b' '), Just(b','), Just(b'\r')],
                0..200,
            ),
            split in 0usize..200,
        ) {
            let mut whole = FrameDecoder::new();
            whole.push_bytes(&stream);

            let split = split.min(stream.len());
            let mut chunked = FrameDecoder::new();
            chunked.push_bytes(&stream[..split]);
            let mut first = decode_all(&mut chunked);
            chunked.push_bytes(&stream[split..]);
            first.extend(decode_all(&mut chunked));

            prop_assert_eq!(decode_all(&mut whole), first);
        }

        #[test]
        fn block_count_matches_terminators(
            stream in proptest::collection::vec(any::<u8>(), 0..300),
        ) {
            let mut decoder = FrameDecoder::new();
            decoder.push_bytes(&stream);
            let terminators = stream.iter().filter(|&&b| b == TERMINATOR).count();
            prop_assert_eq!(decode_all(&mut decoder).len(), terminators);
        }
    }
}
