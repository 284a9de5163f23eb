//! The user-authored "soft" blocklist: a comma-separated preference string
//! that is unioned with the stored aggregate every time a post is filtered.

use std::sync::{Arc, Mutex};

/// Split a comma-separated list of names. Order and duplicates are kept;
/// pieces that are empty after trimming are dropped.
pub fn parse(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug)]
struct LastParse {
    text: String,
    names: Arc<Vec<String>>,
}

/// Remembers the last parse, keyed by the raw preference text. Edits to the
/// preference show up as a different key, so nothing has to invalidate it.
#[derive(Debug, Default)]
pub struct SoftBlocklistCache {
    last: Mutex<Option<LastParse>>,
}

impl SoftBlocklistCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, text: &str) -> Arc<Vec<String>> {
        let mut last = self.last.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(cached) = last.as_ref().filter(|cached| cached.text == text) {
            return cached.names.clone();
        }

        let names = Arc::new(parse(text));
        *last = Some(LastParse {
            text: text.to_string(),
            names: names.clone(),
        });
        names
    }
}
