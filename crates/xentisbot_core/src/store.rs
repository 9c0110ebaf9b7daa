use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::Serialize;
use tracing::{info, warn};

use crate::glossary::load_glossaries;
use crate::keymigration::KeyForest;
use crate::schema::SchemaCatalog;
use crate::syscode::SysCodeTable;
use crate::translation::TranslationSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlossaryPaths {
    pub source: PathBuf,
    pub target: PathBuf,
}

/// Resolved locations of every data source; `None` means not configured.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourcePaths {
    pub schema: Option<PathBuf>,
    pub key_migration: Option<PathBuf>,
    pub syscodes: Option<PathBuf>,
    pub syssubsets: Option<PathBuf>,
    pub glossaries: Vec<GlossaryPaths>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Schema,
    KeyMigration,
    Syscodes,
    Glossary,
}

impl SourceKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Schema => "schema",
            Self::KeyMigration => "key migration",
            Self::Syscodes => "syscodes",
            Self::Glossary => "glossary",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceFailure {
    pub source: SourceKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreStatus {
    pub tables: usize,
    pub syscodes: usize,
    pub key_nodes: usize,
    pub keymigration_translations: usize,
    pub syscode_translations: usize,
    pub glossary_translations: usize,
    pub total_translations: usize,
    pub failures: Vec<SourceFailure>,
}

impl StoreStatus {
    pub fn to_message(&self) -> String {
        let mut message = format!(
            "{} database tables\n\
             {} syscodes\n\
             {} keymigration translations\n\
             {} syscode translations\n\
             {} properties translations\n\
             {} total translations",
            self.tables,
            self.syscodes,
            self.keymigration_translations,
            self.syscode_translations,
            self.glossary_translations,
            self.total_translations
        );
        for failure in &self.failures {
            message.push_str(&format!(
                "\nFailed to load {}: {}",
                failure.source.label(),
                failure.message
            ));
        }
        message
    }
}

/// In-memory records of every source plus the merged translation index.
///
/// Reloading is all-or-nothing per source: a source that fails to load keeps the
/// records of its previous load, and the other sources are unaffected.
#[derive(Debug, Clone, Default)]
pub struct RecordStore {
    schema: SchemaCatalog,
    keys: KeyForest,
    key_translations: TranslationSet,
    syscodes: SysCodeTable,
    syscode_translations: TranslationSet,
    glossary: TranslationSet,
    translations: TranslationSet,
    failures: Vec<SourceFailure>,
}

impl RecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(paths: &SourcePaths) -> Self {
        let mut store = Self::new();
        store.reload(paths);
        store
    }

    /// Reload every source and rebuild the translation index. Returns the failures
    /// of this reload.
    pub fn reload(&mut self, paths: &SourcePaths) -> &[SourceFailure] {
        let mut failures = Vec::new();

        refresh(
            &mut self.schema,
            SourceKind::Schema,
            paths.schema.as_deref(),
            &mut failures,
            SchemaCatalog::load,
        );

        if refresh(
            &mut self.keys,
            SourceKind::KeyMigration,
            paths.key_migration.as_deref(),
            &mut failures,
            KeyForest::load,
        ) {
            self.key_translations = self.keys.translations();
        }

        let schema = &self.schema;
        let subsets = paths.syssubsets.as_deref();
        let refreshed = match paths.syscodes.as_deref() {
            Some(codes) => refresh(
                &mut self.syscodes,
                SourceKind::Syscodes,
                Some(codes),
                &mut failures,
                |path| load_syscodes(path, subsets, schema),
            ),
            None => {
                let mut table = SysCodeTable::default();
                if !schema.is_empty() {
                    table.add_schema_tables(schema);
                }
                self.syscodes = table;
                true
            }
        };
        if refreshed {
            self.syscode_translations = self.syscodes.translations();
        }

        let glossary_pairs = paths
            .glossaries
            .iter()
            .map(|pair| (pair.source.as_path(), pair.target.as_path()));
        match load_glossaries(glossary_pairs) {
            Ok(glossary) => {
                info!(source = "glossary", translations = glossary.len(), "loaded source");
                self.glossary = glossary;
            }
            Err(error) => record_failure(SourceKind::Glossary, &error, &mut failures),
        }

        self.rebuild_translations();
        self.failures = failures;
        &self.failures
    }

    fn rebuild_translations(&mut self) {
        let mut translations = TranslationSet::new();
        translations.extend(self.key_translations.iter().cloned());
        translations.extend(self.glossary.iter().cloned());
        translations.extend(self.syscode_translations.iter().cloned());
        info!(total = translations.len(), "rebuilt translation index");
        self.translations = translations;
    }

    pub fn schema(&self) -> &SchemaCatalog {
        &self.schema
    }

    pub fn keys(&self) -> &KeyForest {
        &self.keys
    }

    pub fn syscodes(&self) -> &SysCodeTable {
        &self.syscodes
    }

    pub fn translations(&self) -> &TranslationSet {
        &self.translations
    }

    pub fn failures(&self) -> &[SourceFailure] {
        &self.failures
    }

    pub fn status(&self) -> StoreStatus {
        StoreStatus {
            tables: self.schema.len(),
            syscodes: self.syscodes.len(),
            key_nodes: self.keys.len(),
            keymigration_translations: self.key_translations.len(),
            syscode_translations: self.syscode_translations.len(),
            glossary_translations: self.glossary.len(),
            total_translations: self.translations.len(),
            failures: self.failures.clone(),
        }
    }
}

fn load_syscodes(codes: &Path, subsets: Option<&Path>, schema: &SchemaCatalog) -> Result<SysCodeTable> {
    let mut table = SysCodeTable::load_codes(codes)?;
    if let Some(subsets) = subsets {
        table.load_subsets(subsets)?;
    }
    table.add_schema_tables(schema);
    Ok(table)
}

/// Replace `slot` with a fresh load. Unconfigured sources become empty; failed
/// loads leave `slot` untouched. Returns whether `slot` changed.
fn refresh<T, F>(
    slot: &mut T,
    kind: SourceKind,
    path: Option<&Path>,
    failures: &mut Vec<SourceFailure>,
    load: F,
) -> bool
where
    T: Default,
    F: FnOnce(&Path) -> Result<T>,
{
    let Some(path) = path else {
        *slot = T::default();
        return true;
    };
    match load(path) {
        Ok(loaded) => {
            info!(source = kind.label(), path = %path.display(), "loaded source");
            *slot = loaded;
            true
        }
        Err(error) => {
            record_failure(kind, &error, failures);
            false
        }
    }
}

fn record_failure(kind: SourceKind, error: &anyhow::Error, failures: &mut Vec<SourceFailure>) {
    warn!(source = kind.label(), error = %format!("{error:#}"), "failed to load source");
    failures.push(SourceFailure {
        source: kind,
        message: format!("{error:#}"),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::{TempDir, tempdir};

    use crate::translation::Translation;

    const SCHEMA: &str = r#"<Tables>
  <Table name="PORTFOLIO" id="131"><Column name="PORTFOLIO_ID"><Format oracle="RAW" size="8" xentis="id"/></Column></Table>
  <Table name="ADRESSE" id="2" alias="Address"/>
</Tables>"#;

    const KEYS: &str = r#"<root><children id="5">
  <translations text="Löschen" languageCode="DE"/>
  <translations text="Delete" languageCode="EN"/>
</children></root>"#;

    const CODES: &str = "16384;;D;C_Daily;Tägl;Täglich;Dly;Daily\n16385;;W;C_Weekly;Wöchtl;Wöchentlich;Wkly;Weekly\n";

    struct Fixture {
        dir: TempDir,
        paths: SourcePaths,
    }

    fn fixture() -> Fixture {
        let dir = tempdir().expect("tempdir");
        let write = |name: &str, content: &str| {
            let path = dir.path().join(name);
            fs::write(&path, content).expect("write fixture");
            path
        };
        let paths = SourcePaths {
            schema: Some(write("schema.xml", SCHEMA)),
            key_migration: Some(write("keymigration.xml", KEYS)),
            syscodes: Some(write("syscodes.txt", CODES)),
            syssubsets: None,
            glossaries: vec![GlossaryPaths {
                source: write("en.properties", "a=Delete\nb=Portfolio\n"),
                target: write("de.properties", "a=Löschen\nb=Depot\n"),
            }],
        };
        Fixture { dir, paths }
    }

    #[test]
    fn all_sources_feed_the_translation_index() {
        let fixture = fixture();
        let store = RecordStore::load(&fixture.paths);
        assert!(store.failures().is_empty());

        let status = store.status();
        assert_eq!(status.tables, 2);
        assert_eq!(status.key_nodes, 1);
        // two codes, the table group and one syscode per table
        assert_eq!(status.syscodes, 5);
        assert_eq!(status.keymigration_translations, 1);
        assert_eq!(status.glossary_translations, 2);
        assert_eq!(status.syscode_translations, 5);
        // Delete/Löschen is contributed twice and stored once
        assert_eq!(status.total_translations, 7);
        assert!(store.translations().contains(&Translation::new("Portfolio", "Depot")));
    }

    #[test]
    fn failed_source_keeps_previous_records() {
        let fixture = fixture();
        let mut store = RecordStore::load(&fixture.paths);

        let schema_path = fixture.paths.schema.clone().expect("schema path");
        fs::write(&schema_path, "<Tables><Table name=\"X\" id=\"oops\"/></Tables>").expect("write");
        let failures = store.reload(&fixture.paths).to_vec();

        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].source, SourceKind::Schema);
        assert!(failures[0].message.contains("schema.xml"));
        assert_eq!(store.schema().table_id("PORTFOLIO"), Some(131));
        assert_eq!(store.keys().len(), 1);
    }

    #[test]
    fn unconfigured_sources_are_empty_after_reload() {
        let fixture = fixture();
        let mut store = RecordStore::load(&fixture.paths);
        store.reload(&SourcePaths::default());

        let status = store.status();
        assert_eq!(status.tables, 0);
        assert_eq!(status.syscodes, 0);
        assert_eq!(status.total_translations, 0);
        assert!(status.failures.is_empty());
    }

    #[test]
    fn missing_file_is_reported_and_others_still_load() {
        let fixture = fixture();
        let mut paths = fixture.paths.clone();
        paths.key_migration = Some(fixture.dir.path().join("missing.xml"));
        let store = RecordStore::load(&paths);

        assert_eq!(store.failures().len(), 1);
        assert_eq!(store.failures()[0].source, SourceKind::KeyMigration);
        assert_eq!(store.status().tables, 2);
    }

    #[test]
    fn status_message_lists_counts_and_failures() {
        let status = StoreStatus {
            tables: 1,
            syscodes: 2,
            key_nodes: 3,
            keymigration_translations: 4,
            syscode_translations: 5,
            glossary_translations: 6,
            total_translations: 7,
            failures: vec![SourceFailure {
                source: SourceKind::Glossary,
                message: "failed to read de.properties".to_string(),
            }],
        };
        assert_eq!(
            status.to_message(),
            "1 database tables\n2 syscodes\n4 keymigration translations\n5 syscode translations\n\
             6 properties translations\n7 total translations\n\
             Failed to load glossary: failed to read de.properties"
        );
    }
}
