use std::collections::HashSet;

use serde::Serialize;

use crate::enumeration::{plural, write_limited};

const SHOWN_MATCHES: usize = 10;

/// An undirected English/German text pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Translation {
    pub english: String,
    pub german: String,
}

impl Translation {
    pub fn new(english: impl Into<String>, german: impl Into<String>) -> Self {
        Self {
            english: english.into(),
            german: german.into(),
        }
    }

    fn dedup_key(&self) -> (String, String) {
        (self.english.to_lowercase(), self.german.to_lowercase())
    }
}

/// Insertion-ordered set of translations. Pairs that only differ in letter case
/// collapse into the first spelling inserted.
#[derive(Debug, Clone, Default)]
pub struct TranslationSet {
    entries: Vec<Translation>,
    keys: HashSet<(String, String)>,
}

impl TranslationSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` when an equal pair was already present.
    pub fn insert(&mut self, translation: Translation) -> bool {
        if !self.keys.insert(translation.dedup_key()) {
            return false;
        }
        self.entries.push(translation);
        true
    }

    pub fn contains(&self, translation: &Translation) -> bool {
        self.keys.contains(&translation.dedup_key())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Translation> {
        self.entries.iter()
    }

    /// Case-insensitive search over both sides of every pair.
    pub fn search(&self, query: &str) -> TranslationMatches<'_> {
        let needle = query.to_lowercase();
        let mut exact = Vec::new();
        let mut partial = Vec::new();
        for translation in &self.entries {
            let english = translation.english.to_lowercase();
            let german = translation.german.to_lowercase();
            if english == needle || german == needle {
                exact.push(translation);
            }
            if english.contains(&needle) || german.contains(&needle) {
                partial.push(translation);
            }
        }
        sort_for_display(&mut exact);
        sort_for_display(&mut partial);
        TranslationMatches { exact, partial }
    }
}

impl Extend<Translation> for TranslationSet {
    fn extend<I: IntoIterator<Item = Translation>>(&mut self, iter: I) {
        for translation in iter {
            self.insert(translation);
        }
    }
}

impl FromIterator<Translation> for TranslationSet {
    fn from_iter<I: IntoIterator<Item = Translation>>(iter: I) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}

impl<'a> IntoIterator for &'a TranslationSet {
    type Item = &'a Translation;
    type IntoIter = std::slice::Iter<'a, Translation>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Shortest pairs first, measured in characters; ties fall back to the texts themselves.
pub fn sort_for_display(translations: &mut [&Translation]) {
    translations.sort_by_cached_key(|translation| {
        (
            translation.english.chars().count(),
            translation.german.chars().count(),
            translation.english.clone(),
            translation.german.clone(),
        )
    });
}

#[derive(Debug, Clone, Default)]
pub struct TranslationMatches<'a> {
    pub exact: Vec<&'a Translation>,
    pub partial: Vec<&'a Translation>,
}

impl TranslationMatches<'_> {
    /// Partial matches are only worth showing when they add something to the exact ones.
    pub fn has_additional_partial(&self) -> bool {
        self.partial.len() > self.exact.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exact.is_empty() && !self.has_additional_partial()
    }

    /// One message per non-empty result group.
    pub fn to_messages(&self) -> Vec<String> {
        let mut messages = Vec::new();
        if !self.exact.is_empty() {
            messages.push(render_group(&self.exact, "for exactly this term"));
        }
        if self.has_additional_partial() {
            messages.push(render_group(&self.partial, "that partially matched this term"));
        }
        messages
    }
}

fn render_group(translations: &[&Translation], description: &str) -> String {
    let mut message = format!(
        "Found {} {} {description}:\n",
        translations.len(),
        plural(translations.len(), "translation", "translations")
    );
    write_limited(
        &mut message,
        translations,
        SHOWN_MATCHES,
        0,
        |out, translation| {
            out.push_str(&format!("_{}_ : _{}_ \n", translation.english, translation.german));
        },
        |out, skipped| {
            out.push_str(&format!(
                "... _(skipping {skipped} {})_\n",
                plural(skipped, "translation", "translations")
            ));
        },
    );
    message
}
