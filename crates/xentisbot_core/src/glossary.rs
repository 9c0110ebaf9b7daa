use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Result;

use crate::properties::load_properties;
use crate::translation::{Translation, TranslationSet};

/// Pair an English and a German property set by key.
pub fn pair_properties(
    english: &BTreeMap<String, String>,
    german: &BTreeMap<String, String>,
) -> Vec<Translation> {
    english
        .iter()
        .filter_map(|(key, english_text)| {
            german
                .get(key)
                .map(|german_text| Translation::new(english_text, german_text))
        })
        .collect()
}

/// Translations of every configured glossary file pair, in configuration order.
pub fn load_glossaries<'a>(
    pairs: impl IntoIterator<Item = (&'a Path, &'a Path)>,
) -> Result<TranslationSet> {
    let mut set = TranslationSet::new();
    for (source, target) in pairs {
        let english = load_properties(source)?;
        let german = load_properties(target)?;
        set.extend(pair_properties(&english, &german));
    }
    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn properties(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
        entries
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect()
    }

    #[test]
    fn only_shared_keys_pair_up() {
        let english = properties(&[("1", "one"), ("2", "two"), ("9", "nine")]);
        let german = properties(&[("1", "eins"), ("2", "zwei"), ("3", "drei")]);
        assert_eq!(
            pair_properties(&english, &german),
            vec![Translation::new("one", "eins"), Translation::new("two", "zwei")]
        );
    }

    #[test]
    fn glossary_pairs_accumulate() {
        let temp = tempdir().expect("tempdir");
        let write = |name: &str, content: &str| {
            let path = temp.path().join(name);
            fs::write(&path, content).expect("write properties");
            path
        };
        let en1 = write("en1.properties", "1=one\n2=two\n");
        let de1 = write("de1.properties", "1=eins\n2=zwei\n");
        let en2 = write("en2.properties", "3=three\n1=one\n");
        let de2 = write("de2.properties", "3=drei\n1=eins\n");

        let set = load_glossaries([
            (en1.as_path(), de1.as_path()),
            (en2.as_path(), de2.as_path()),
        ])
        .expect("load glossaries");
        assert_eq!(set.len(), 3);
        assert!(set.contains(&Translation::new("three", "drei")));
    }

    #[test]
    fn missing_target_file_fails() {
        let temp = tempdir().expect("tempdir");
        let source = temp.path().join("en.properties");
        fs::write(&source, "1=one\n").expect("write");
        let target = temp.path().join("de.properties");
        let error = load_glossaries([(source.as_path(), target.as_path())]).expect_err("must fail");
        assert!(error.to_string().contains("de.properties"));
    }
}
