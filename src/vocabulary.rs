//! Feature vocabularies and the selected-features file format.

use crate::error::{Error, Result};
use csv::{QuoteStyle, ReaderBuilder, WriterBuilder};
use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

/// Mapping between feature tokens and dense integer ids.
///
/// Tokens are stored lower-cased. Ids are handed out in insertion order,
/// starting at 0.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Vocabulary {
    ids: HashMap<String, u32>,
    tokens: Vec<String>,
}

impl Vocabulary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from tokens in order; repeated tokens keep their first id.
    pub fn from_tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut vocabulary = Self::new();
        for token in tokens {
            vocabulary.intern(token.as_ref());
        }
        vocabulary
    }

    /// Read a selected-features file: one `index<TAB>token` line per feature.
    ///
    /// The index column is informational only; ids are reassigned densely in
    /// file order. Repeated tokens are skipped. With `retain`, reading stops
    /// once that many features are known.
    pub fn from_tsv<P: AsRef<Path>>(path: P, retain: Option<usize>) -> Result<Self> {
        let file = File::open(&path).map_err(|source| Error::SourceUnreadable {
            path: path.as_ref().to_path_buf(),
            source,
        })?;

        let mut rdr = ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .flexible(true)
            .quoting(false)
            .from_reader(file);

        let mut vocabulary = Self::new();
        let mut skipped = 0usize;
        let mut malformed = 0usize;

        for result in rdr.records() {
            if retain.is_some_and(|n| vocabulary.len() >= n) {
                break;
            }
            let record = result?;
            match record.get(1).map(str::trim).filter(|t| !t.is_empty()) {
                Some(token) => {
                    if !vocabulary.insert_new(token) {
                        skipped += 1;
                    }
                }
                None => malformed += 1,
            }
        }

        tracing::info!(
            features = vocabulary.len(),
            skipped,
            malformed,
            "loaded features from {:?}",
            path.as_ref()
        );
        Ok(vocabulary)
    }

    /// Write `id<TAB>token` lines in id order, readable by
    /// [`Vocabulary::from_tsv`].
    pub fn write_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut wtr = WriterBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .quote_style(QuoteStyle::Never)
            .from_path(&path)?;
        for (id, token) in self.tokens.iter().enumerate() {
            wtr.write_record([id.to_string().as_str(), token.as_str()])?;
        }
        wtr.flush()?;
        tracing::info!(features = self.len(), "wrote features to {:?}", path.as_ref());
        Ok(())
    }

    /// Id of a known token.
    pub fn get(&self, token: &str) -> Option<u32> {
        self.ids.get(&token.to_lowercase()).copied()
    }

    /// Id of `token`, adding it first when unseen.
    pub fn intern(&mut self, token: &str) -> u32 {
        let token = token.to_lowercase();
        if let Some(&id) = self.ids.get(&token) {
            return id;
        }
        let id = self.tokens.len() as u32;
        self.tokens.push(token.clone());
        self.ids.insert(token, id);
        id
    }

    fn insert_new(&mut self, token: &str) -> bool {
        let before = self.len();
        self.intern(token);
        self.len() > before
    }

    pub fn token(&self, id: u32) -> Option<&str> {
        self.tokens.get(id as usize).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}
