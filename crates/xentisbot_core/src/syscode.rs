use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};

use crate::enumeration::{plural, write_limited};
use crate::ids::signed_hex;
use crate::schema::SchemaCatalog;
use crate::translation::{Translation, TranslationSet};

/// Offset added to the numeric ids found in syscode exports.
pub const SYSCODE_BASE: i64 = 0x1051_0000_0000_0000;

const TABLE_GROUP_CODE: &str = "DBTables";
const TABLE_CODE_FLAG: i64 = 0x1000;
const LISTED_HEAD: usize = 10;
const LISTED_TAIL: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SysSubsetEntry {
    pub id: i64,
    pub sort_number: i32,
    pub default_entry: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SysCode {
    pub id: i64,
    pub group_id: i64,
    pub code: String,
    pub name: String,
    pub german_short: String,
    pub german_medium: String,
    pub english_short: String,
    pub english_medium: String,
    pub children: Vec<i64>,
    pub subset_entries: Vec<SysSubsetEntry>,
}

/// All syscodes of one load, keyed by id with a secondary index by name.
/// `order` keeps export order, with schema table syscodes appended last.
#[derive(Debug, Clone, Default)]
pub struct SysCodeTable {
    codes: BTreeMap<i64, SysCode>,
    ids_by_name: HashMap<String, i64>,
    order: Vec<i64>,
}

/// A new group starts on a backwards step or a jump of at least 0x900 that stays
/// below 0x10000. Exports do not mark group boundaries explicitly.
pub fn starts_new_group(id: i64, last_id: i64) -> bool {
    let delta = i128::from(id) - i128::from(last_id);
    delta < 0 || (0x900..0x10000).contains(&delta)
}

impl SysCodeTable {
    pub fn load_codes(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::parse_codes(&content).with_context(|| format!("failed to parse {}", path.display()))
    }

    /// Parse `id;?;code;name;deShort;deMedium;enShort;enMedium` lines.
    pub fn parse_codes(content: &str) -> Result<Self> {
        let mut table = Self::default();
        let mut last_id = i64::MAX;
        let mut group_id = 0;

        for (index, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split(';').collect();
            if fields.len() < 8 {
                bail!(
                    "line {}: expected 8 fields, found {}",
                    index + 1,
                    fields.len()
                );
            }
            let raw_id: i64 = fields[0]
                .trim()
                .parse()
                .with_context(|| format!("line {}: invalid syscode id `{}`", index + 1, fields[0]))?;
            let id = raw_id
                .checked_add(SYSCODE_BASE)
                .with_context(|| format!("line {}: syscode id {raw_id} out of range", index + 1))?;
            if starts_new_group(id, last_id) {
                group_id = id;
            }

            table.insert(SysCode {
                id,
                group_id,
                code: fields[2].to_string(),
                name: fields[3].to_string(),
                german_short: fields[4].to_string(),
                german_medium: fields[5].to_string(),
                english_short: fields[6].to_string(),
                english_medium: fields[7].to_string(),
                children: Vec::new(),
                subset_entries: Vec::new(),
            });
            if let Some(group) = table.codes.get_mut(&group_id) {
                group.children.push(id);
            }
            last_id = id;
        }
        Ok(table)
    }

    pub fn load_subsets(&mut self, path: &Path) -> Result<()> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        self.parse_subsets(&content)
            .with_context(|| format!("failed to parse {}", path.display()))
    }

    /// Attach `subsetName;entryName;sortNumber;default` lines to already parsed
    /// syscodes. Lines naming unknown syscodes are skipped.
    pub fn parse_subsets(&mut self, content: &str) -> Result<()> {
        for (index, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split(';').collect();
            if fields.len() < 4 {
                bail!(
                    "line {}: expected 4 fields, found {}",
                    index + 1,
                    fields.len()
                );
            }
            let sort_number: i32 = fields[2]
                .trim()
                .parse()
                .with_context(|| format!("line {}: invalid sort number `{}`", index + 1, fields[2]))?;
            let default_flag: i32 = fields[3]
                .trim()
                .parse()
                .with_context(|| format!("line {}: invalid default flag `{}`", index + 1, fields[3]))?;

            let (Some(&subset_id), Some(&entry_id)) =
                (self.ids_by_name.get(fields[0]), self.ids_by_name.get(fields[1]))
            else {
                continue;
            };
            if let Some(subset) = self.codes.get_mut(&subset_id) {
                subset.subset_entries.push(SysSubsetEntry {
                    id: entry_id,
                    sort_number,
                    default_entry: default_flag != 0,
                });
            }
        }
        Ok(())
    }

    /// Add one group syscode listing every schema table, plus a syscode per table.
    pub fn add_schema_tables(&mut self, catalog: &SchemaCatalog) {
        let mut group = SysCode {
            id: SYSCODE_BASE,
            group_id: SYSCODE_BASE,
            code: TABLE_GROUP_CODE.to_string(),
            name: format!("C_Grp{TABLE_GROUP_CODE}"),
            german_short: TABLE_GROUP_CODE.to_string(),
            german_medium: TABLE_GROUP_CODE.to_string(),
            english_short: TABLE_GROUP_CODE.to_string(),
            english_medium: TABLE_GROUP_CODE.to_string(),
            children: Vec::new(),
            subset_entries: Vec::new(),
        };

        for table in catalog.tables() {
            let short_name = format!("{:0>4}", table.id);
            let name = table
                .alias
                .clone()
                .unwrap_or_else(|| capitalize(&table.name.to_lowercase()));
            let syscode = SysCode {
                id: table.id + SYSCODE_BASE,
                group_id: SYSCODE_BASE,
                code: signed_hex(table.id + TABLE_CODE_FLAG),
                name: format!("C_{name}"),
                german_short: short_name.clone(),
                german_medium: name.clone(),
                english_short: short_name,
                english_medium: name,
                children: Vec::new(),
                subset_entries: Vec::new(),
            };
            group.children.push(syscode.id);
            self.insert(syscode);
        }
        self.insert(group);
    }

    fn insert(&mut self, syscode: SysCode) {
        let id = syscode.id;
        self.ids_by_name.insert(syscode.name.clone(), id);
        if self.codes.insert(id, syscode).is_none() {
            self.order.push(id);
        }
    }

    fn in_export_order(&self) -> impl Iterator<Item = &SysCode> {
        self.order.iter().filter_map(|id| self.codes.get(id))
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    pub fn get(&self, id: i64) -> Option<&SysCode> {
        self.codes.get(&id)
    }

    /// Syscodes whose code equals `text` or whose name contains it, ignoring case,
    /// in export order.
    pub fn find(&self, text: &str) -> Vec<&SysCode> {
        let needle = text.to_lowercase();
        self.in_export_order()
            .filter(|syscode| {
                syscode.code.to_lowercase() == needle || syscode.name.to_lowercase().contains(&needle)
            })
            .collect()
    }

    /// Medium texts as translations; all-uppercase texts are technical and skipped.
    pub fn translations(&self) -> TranslationSet {
        self.in_export_order()
            .filter(|syscode| {
                !is_all_uppercase(&syscode.english_medium) && !is_all_uppercase(&syscode.german_medium)
            })
            .map(|syscode| Translation::new(&syscode.english_medium, &syscode.german_medium))
            .collect()
    }

    pub fn to_message(&self, syscode: &SysCode) -> String {
        let mut message = format!(
            "Syscode {} = decimal {}\n",
            signed_hex(syscode.id),
            syscode.id
        );
        message.push_str(&format!("\tcode: `{}`\n", syscode.code));
        message.push_str(&format!("\tname: `{}`\n", syscode.name));
        message.push_str(&format!(
            "\tshort translation: _{}_ : _{}_\n",
            syscode.german_short, syscode.english_short
        ));
        message.push_str(&format!(
            "\tmedium translation: _{}_ : _{}_\n",
            syscode.german_medium, syscode.english_medium
        ));
        message.push_str(&format!("\tgroup: {}", signed_hex(syscode.group_id)));
        if let Some(group) = self.get(syscode.group_id) {
            message.push_str(&format!(" `{}`", group.name));
        }
        message.push('\n');

        if !syscode.children.is_empty() {
            self.write_references(&mut message, &syscode.children, "group", ("member", "members"));
        }
        if !syscode.subset_entries.is_empty() {
            let ids: Vec<i64> = syscode.subset_entries.iter().map(|entry| entry.id).collect();
            self.write_references(&mut message, &ids, "subset", ("entry", "entries"));
        }
        message
    }

    fn write_references(&self, message: &mut String, ids: &[i64], kind: &str, noun: (&str, &str)) {
        message.push_str(&format!(
            "\t{} {kind} {} found\n",
            ids.len(),
            plural(ids.len(), noun.0, noun.1)
        ));
        write_limited(
            message,
            ids,
            LISTED_HEAD,
            LISTED_TAIL,
            |out, id| out.push_str(&format!("\t\t{}\n", self.reference(*id))),
            |out, skipped| {
                out.push_str(&format!(
                    "\t\t... _(skipping {skipped} {})_\n",
                    plural(skipped, noun.0, noun.1)
                ));
            },
        );
    }

    fn reference(&self, id: i64) -> String {
        let name = self.get(id).map(|syscode| syscode.name.as_str()).unwrap_or_default();
        format!("{} `{name}`", signed_hex(id))
    }
}

fn is_all_uppercase(text: &str) -> bool {
    !text.chars().any(char::is_lowercase)
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
