//! Text analysis shared by indexing and query parsing.
//!
//! The index registers a single analyzer under [`ANALYZER_NAME`]; which
//! pipeline backs that name is a configuration choice, so swapping it
//! never changes the schema or the index store contract. Note that an
//! existing index must be rebuilt after switching, since stored terms
//! were produced by the old pipeline.

use serde::{Deserialize, Serialize};
use tantivy::{
    Index,
    tokenizer::{
        Language,
        LowerCaser,
        RemoveLongFilter,
        SimpleTokenizer,
        Stemmer,
        TextAnalyzer,
        TokenStream,
    },
};

/// Name the analyzer is registered under in the index.
pub const ANALYZER_NAME: &str = "docwatch_words";

/// Tokens longer than this are dropped (base64 blobs, hashes).
const MAX_TOKEN_LEN: usize = 40;

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum AnalyzerKind {
    /// Case-insensitive word tokenization, no stemming.
    #[default]
    Standard,
    /// Word tokenization followed by English stemming.
    English,
}

impl AnalyzerKind {
    pub fn build(self) -> TextAnalyzer {
        let base = TextAnalyzer::builder(SimpleTokenizer::default())
            .filter(RemoveLongFilter::limit(MAX_TOKEN_LEN))
            .filter(LowerCaser);
        match self {
            AnalyzerKind::Standard => base.build(),
            AnalyzerKind::English => {
                base.filter(Stemmer::new(Language::English)).build()
            }
        }
    }
}

pub fn register(index: &Index, kind: AnalyzerKind) {
    index.tokenizers().register(ANALYZER_NAME, kind.build());
}

/// Run `text` through the analyzer and collect the emitted tokens.
pub fn tokenize(kind: AnalyzerKind, text: &str) -> Vec<String> {
    let mut analyzer = kind.build();
    let mut stream = analyzer.token_stream(text);
    let mut tokens = Vec::new();
    while stream.advance() {
        tokens.push(stream.token().text.clone());
    }
    tokens
}
