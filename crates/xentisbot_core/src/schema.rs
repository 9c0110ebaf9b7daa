use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DbColumn {
    pub name: String,
    pub oracle_type: String,
    pub xentis_type: String,
    pub size: u32,
    pub nullable: bool,
    pub foreign_key: Option<String>,
    pub references: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DbTable {
    pub name: String,
    pub id: i64,
    pub alias: Option<String>,
    pub code_tab_group: Option<String>,
    pub columns: Vec<DbColumn>,
}

impl DbTable {
    /// Column listing used for the `table` attachment.
    pub fn to_message(&self) -> String {
        let mut message = format!("TABLE {}\n", self.name);
        for column in &self.columns {
            let sized_type = if column.size == 0 {
                column.oracle_type.clone()
            } else {
                format!("{}[{}]", column.oracle_type, column.size)
            };
            let foreign_key = column
                .foreign_key
                .as_deref()
                .map(|target| format!(" => {target}"))
                .unwrap_or_default();
            let references = if column.references.is_empty() {
                String::new()
            } else {
                format!(" -> [{}]", column.references.join(", "))
            };
            message.push_str(&format!(
                "    {:<30} : {:<15} ({}){foreign_key}{references}\n",
                column.name, sized_type, column.xentis_type
            ));
        }
        message
    }
}

/// Tables of one schema export, indexed by name and by numeric id.
#[derive(Debug, Clone, Default)]
pub struct SchemaCatalog {
    tables: BTreeMap<String, DbTable>,
    names_by_id: BTreeMap<i64, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TextTarget {
    ForeignKey,
    Reference,
}

impl SchemaCatalog {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("failed to parse {}", path.display()))
    }

    pub fn parse(xml: &str) -> Result<Self> {
        let mut catalog = Self::default();
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut table: Option<DbTable> = None;
        let mut text_target: Option<TextTarget> = None;

        loop {
            let event = reader
                .read_event()
                .with_context(|| format!("malformed XML near byte {}", reader.buffer_position()))?;
            match event {
                Event::Start(element) => {
                    let name = element.name();
                    match name.as_ref() {
                        b"Table" => table = Some(read_table(&element)?),
                        b"ForeignKey" => text_target = Some(TextTarget::ForeignKey),
                        b"Reference" => text_target = Some(TextTarget::Reference),
                        _ => apply_column_element(&element, table.as_mut())?,
                    }
                }
                Event::Empty(element) => {
                    if element.name().as_ref() == b"Table" {
                        catalog.insert(read_table(&element)?);
                    } else {
                        apply_column_element(&element, table.as_mut())?;
                    }
                }
                Event::Text(text) => {
                    let Some(target) = text_target else { continue };
                    let Some(column) = table.as_mut().and_then(|table| table.columns.last_mut())
                    else {
                        continue;
                    };
                    let text = text.unescape()?.into_owned();
                    match target {
                        TextTarget::ForeignKey => column.foreign_key = Some(text),
                        TextTarget::Reference => column.references.push(text),
                    }
                }
                Event::End(element) => {
                    text_target = None;
                    if element.name().as_ref() == b"Table"
                        && let Some(finished) = table.take()
                    {
                        catalog.insert(finished);
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if let Some(unfinished) = table {
            catalog.insert(unfinished);
        }
        Ok(catalog)
    }

    fn insert(&mut self, table: DbTable) {
        self.names_by_id.insert(table.id, table.name.clone());
        self.tables.insert(table.name.clone(), table);
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn tables(&self) -> impl Iterator<Item = &DbTable> {
        self.tables.values()
    }

    /// Names containing the uppercased fragment, in name order.
    pub fn table_names(&self, partial_name: &str) -> Vec<&str> {
        let fragment = partial_name.to_uppercase();
        self.tables
            .keys()
            .filter(|name| name.contains(&fragment))
            .map(String::as_str)
            .collect()
    }

    pub fn table_name(&self, table_id: i64) -> Option<&str> {
        self.names_by_id.get(&table_id).map(String::as_str)
    }

    pub fn table_id(&self, table_name: &str) -> Option<i64> {
        self.tables.get(&table_name.to_uppercase()).map(|table| table.id)
    }

    pub fn table(&self, table_name: &str) -> Option<&DbTable> {
        self.tables.get(table_name)
    }
}

fn read_table(element: &BytesStart<'_>) -> Result<DbTable> {
    Ok(DbTable {
        name: attribute(element, "name")?.unwrap_or_default(),
        id: numeric_attribute(element, "id")?,
        alias: attribute(element, "alias")?.filter(|value| !value.is_empty()),
        code_tab_group: attribute(element, "codeTabGroup")?.filter(|value| !value.is_empty()),
        columns: Vec::new(),
    })
}

fn apply_column_element(element: &BytesStart<'_>, table: Option<&mut DbTable>) -> Result<()> {
    let Some(table) = table else {
        return Ok(());
    };
    match element.name().as_ref() {
        b"Column" => table.columns.push(DbColumn {
            name: attribute(element, "name")?.unwrap_or_default(),
            nullable: attribute(element, "nullable")?.as_deref() == Some("true"),
            ..DbColumn::default()
        }),
        b"Format" => {
            if let Some(column) = table.columns.last_mut() {
                column.oracle_type = attribute(element, "oracle")?.unwrap_or_default();
                column.xentis_type = attribute(element, "xentis")?.unwrap_or_default();
                column.size = numeric_attribute(element, "size")?;
            }
        }
        _ => {}
    }
    Ok(())
}

pub(crate) fn attribute(element: &BytesStart<'_>, name: &str) -> Result<Option<String>> {
    match element.try_get_attribute(name)? {
        Some(attribute) => Ok(Some(attribute.unescape_value()?.into_owned())),
        None => Ok(None),
    }
}

/// Missing numeric attributes read as zero; present but malformed ones are errors.
pub(crate) fn numeric_attribute<T>(element: &BytesStart<'_>, name: &str) -> Result<T>
where
    T: std::str::FromStr + Default,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match attribute(element, name)? {
        Some(value) => value
            .trim()
            .parse::<T>()
            .with_context(|| format!("invalid numeric attribute {name}=\"{value}\"")),
        None => Ok(T::default()),
    }
}
