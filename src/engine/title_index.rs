use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::corpus::Corpus;

/// Exact, case-sensitive title -> row lookup.
///
/// When titles repeat, the first row wins; later rows keep their place in the
/// matrix but cannot be queried by title.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TitleIndex {
    rows: BTreeMap<String, usize>,
}

impl TitleIndex {
    pub fn build(corpus: &Corpus) -> Self {
        let mut rows = BTreeMap::new();
        let mut duplicates = 0usize;

        for item in corpus.items() {
            if rows.contains_key(&item.title) {
                duplicates += 1;
                continue;
            }
            rows.insert(item.title.clone(), item.id);
        }

        if duplicates > 0 {
            log::debug!("{duplicates} rows share a title with an earlier row");
        }

        Self { rows }
    }

    pub fn resolve(&self, title: &str) -> Option<usize> {
        self.rows.get(title).copied()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn titles(&self) -> impl Iterator<Item = &str> {
        self.rows.keys().map(String::as_str)
    }

    pub fn validate(&self, rows: usize) -> Result<(), String> {
        match self.rows.iter().find(|(_, row)| **row >= rows) {
            Some((title, row)) => Err(format!(
                "title '{title}' points at row {row}, corpus has {rows} rows"
            )),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus(titles: &[&str]) -> Corpus {
        let mut corpus = Corpus::new("title", "description", vec![]);
        for title in titles {
            corpus.push(*title, "", BTreeMap::new());
        }
        corpus
    }

    #[test]
    fn test_resolve_exact_match() {
        let index = TitleIndex::build(&corpus(&["Iron Man", "Up"]));
        assert_eq!(index.resolve("Iron Man"), Some(0));
        assert_eq!(index.resolve("Up"), Some(1));
    }

    #[test]
    fn test_resolve_is_case_sensitive_and_untrimmed() {
        let index = TitleIndex::build(&corpus(&["Iron Man"]));
        assert_eq!(index.resolve("iron man"), None);
        assert_eq!(index.resolve(" Iron Man"), None);
    }

    #[test]
    fn test_duplicate_titles_resolve_to_first_row() {
        let index = TitleIndex::build(&corpus(&["Dune", "Alien", "Dune", "Dune"]));
        assert_eq!(index.resolve("Dune"), Some(0));
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_validate_rows() {
        let index = TitleIndex::build(&corpus(&["A", "B"]));
        assert!(index.validate(2).is_ok());
        assert!(index.validate(1).is_err());
    }
}
