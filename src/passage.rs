//! Passage sourcing: where the next reference text comes from.
//!
//! Two interchangeable variants sit behind [`PassageSource`]: a remote quote
//! API and an embedded word list. Fetching happens off the event loop (see
//! `runtime::spawn_passage_fetch`); a failure leaves the previous passage in
//! place and surfaces a retry notice, it never takes down the session.

use include_dir::{include_dir, Dir};
use rand::seq::SliceRandom;
use serde::Deserialize;
use std::error::Error;
use std::fmt;
use std::time::Duration;

static WORDLIST_DIR: Dir = include_dir!("src/wordlists");

const HTTP_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug)]
pub enum PassageError {
    /// Request failed or timed out.
    Network(String),
    /// The source answered but the payload was unusable.
    BadResponse(String),
    /// The source produced an empty passage.
    Empty,
}

impl fmt::Display for PassageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PassageError::Network(e) => write!(f, "failed to reach passage source: {}", e),
            PassageError::BadResponse(e) => write!(f, "unusable passage payload: {}", e),
            PassageError::Empty => write!(f, "passage source returned empty text"),
        }
    }
}

impl Error for PassageError {}

/// One outbound call: "give me one passage".
pub trait PassageSource: Send + Sync {
    fn next_passage(&self) -> Result<String, PassageError>;
}

/// Quote API payload; only the text body is of interest.
#[derive(Debug, Deserialize)]
struct Quote {
    content: String,
}

/// Fetches a random quote over HTTP.
pub struct RemoteQuoteSource {
    url: String,
    client: reqwest::blocking::Client,
}

pub const DEFAULT_QUOTE_URL: &str = "https://api.quotable.io/random";

impl RemoteQuoteSource {
    pub fn new(url: impl Into<String>) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            url: url.into(),
            client,
        }
    }
}

impl Default for RemoteQuoteSource {
    fn default() -> Self {
        Self::new(DEFAULT_QUOTE_URL)
    }
}

impl PassageSource for RemoteQuoteSource {
    fn next_passage(&self) -> Result<String, PassageError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| PassageError::Network(e.to_string()))?;

        let quote: Quote = response
            .json()
            .map_err(|e| PassageError::BadResponse(e.to_string()))?;

        if quote.content.trim().is_empty() {
            return Err(PassageError::Empty);
        }
        Ok(quote.content)
    }
}

#[derive(Debug, Deserialize, Clone)]
struct WordList {
    #[allow(dead_code)]
    name: String,
    words: Vec<String>,
}

fn read_wordlist(file_name: &str) -> Result<WordList, PassageError> {
    let file = WORDLIST_DIR
        .get_file(file_name)
        .ok_or_else(|| PassageError::BadResponse(format!("word list {} not found", file_name)))?;

    let contents = file
        .contents_utf8()
        .ok_or_else(|| PassageError::BadResponse(format!("word list {} is not utf-8", file_name)))?;

    serde_json::from_str(contents).map_err(|e| PassageError::BadResponse(e.to_string()))
}

/// Draws N random words from the embedded word list.
pub struct LocalWordListSource {
    words: Vec<String>,
    number_of_words: usize,
}

impl LocalWordListSource {
    pub fn new(number_of_words: usize) -> Result<Self, PassageError> {
        let list = read_wordlist("english.json")?;
        Ok(Self {
            words: list.words,
            number_of_words,
        })
    }
}

impl PassageSource for LocalWordListSource {
    fn next_passage(&self) -> Result<String, PassageError> {
        if self.words.is_empty() || self.number_of_words == 0 {
            return Err(PassageError::Empty);
        }
        let mut rng = rand::thread_rng();
        let picked: Vec<&str> = (0..self.number_of_words)
            .filter_map(|_| self.words.choose(&mut rng).map(|w| w.as_str()))
            .collect();
        Ok(picked.join(" "))
    }
}
