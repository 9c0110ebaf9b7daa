use std::collections::BTreeMap;
use std::fmt::Display;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::schema::{attribute, numeric_attribute};
use crate::translation::{Translation, TranslationSet};

const ENGLISH: &str = "EN";
const GERMAN: &str = "DE";

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct KeyTranslation {
    pub language: String,
    /// `None` for the plain label, otherwise a tag such as `TOOLTIP_TRANSLATION`.
    pub kind: Option<String>,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyMapping {
    pub id: i32,
    pub ref_id: i32,
    pub translations: Vec<KeyTranslation>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyNode {
    pub id: i32,
    pub name: Option<String>,
    pub component_type: Option<String>,
    pub parent: Option<i32>,
    pub action_key: i32,
    pub referenced: i32,
    pub children: Vec<i32>,
    pub mappings: Vec<KeyMapping>,
    pub translations: Vec<KeyTranslation>,
}

/// Key nodes of a key-migration export, addressed by id.
#[derive(Debug, Clone, Default)]
pub struct KeyForest {
    nodes: BTreeMap<i32, KeyNode>,
}

/// Open elements while walking the export. The mapping is tracked as an index
/// into the mappings of the node on top of the stack.
#[derive(Debug, Default)]
struct OpenFrames {
    nodes: Vec<i32>,
    mapping: Option<(i32, usize)>,
}

impl KeyForest {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("failed to parse {}", path.display()))
    }

    pub fn parse(xml: &str) -> Result<Self> {
        let mut forest = Self::default();
        let mut frames = OpenFrames::default();
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        loop {
            let event = reader
                .read_event()
                .with_context(|| format!("malformed XML near byte {}", reader.buffer_position()))?;
            match event {
                Event::Start(element) => forest.open(&element, &mut frames)?,
                Event::Empty(element) => {
                    forest.open(&element, &mut frames)?;
                    close(element.name().as_ref(), &mut frames);
                }
                Event::End(element) => close(element.name().as_ref(), &mut frames),
                Event::Eof => break,
                _ => {}
            }
        }
        Ok(forest)
    }

    fn open(&mut self, element: &BytesStart<'_>, frames: &mut OpenFrames) -> Result<()> {
        match element.name().as_ref() {
            b"children" => {
                let parent = frames.nodes.last().copied();
                let node = KeyNode {
                    id: numeric_attribute(element, "id")?,
                    name: attribute(element, "name")?,
                    component_type: attribute(element, "standardComponentType")?,
                    parent,
                    action_key: numeric_attribute(element, "actionKeyNode")?,
                    referenced: numeric_attribute(element, "referencedNode")?,
                    ..KeyNode::default()
                };
                if let Some(parent) = parent.and_then(|id| self.nodes.get_mut(&id)) {
                    parent.children.push(node.id);
                }
                frames.nodes.push(node.id);
                self.nodes.insert(node.id, node);
            }
            b"keyMapping" => {
                let mapping = KeyMapping {
                    id: numeric_attribute(element, "id")?,
                    ref_id: numeric_attribute(element, "refId")?,
                    translations: Vec::new(),
                };
                if let Some(&node_id) = frames.nodes.last()
                    && let Some(node) = self.nodes.get_mut(&node_id)
                {
                    node.mappings.push(mapping);
                    frames.mapping = Some((node_id, node.mappings.len() - 1));
                }
            }
            b"translations" => {
                let translation = KeyTranslation {
                    language: attribute(element, "languageCode")?.unwrap_or_default(),
                    kind: attribute(element, "translationType")?,
                    text: attribute(element, "text")?.unwrap_or_default(),
                };
                if let Some((node_id, index)) = frames.mapping {
                    if let Some(mapping) = self
                        .nodes
                        .get_mut(&node_id)
                        .and_then(|node| node.mappings.get_mut(index))
                    {
                        mapping.translations.push(translation);
                    }
                } else if let Some(node) = frames.nodes.last().and_then(|id| self.nodes.get_mut(id)) {
                    node.translations.push(translation);
                }
            }
            _ => {}
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: i32) -> Option<&KeyNode> {
        self.nodes.get(&id)
    }

    /// EN/DE pairs per node and per mapping, one for each translation type that has both.
    pub fn translations(&self) -> TranslationSet {
        let mut set = TranslationSet::new();
        for node in self.nodes.values() {
            set.extend(paired_translations(&node.translations));
            for mapping in &node.mappings {
                set.extend(paired_translations(&mapping.translations));
            }
        }
        set
    }

    pub fn to_message(&self, node: &KeyNode) -> String {
        let referenced = self.get(node.referenced);
        let mut message = format!("Key {} {}", node.id, italic(node.name.as_deref()));
        message.push_str(&prefix(" type", &italic(node.component_type.as_deref())));
        message.push_str(&prefix(" action ", &non_zero(node.action_key)));
        message.push_str(&prefix(
            " is a ",
            referenced.and_then(|node| node.component_type.as_deref()).unwrap_or_default(),
        ));
        message.push('\n');

        if let Some(parent) = node.parent {
            message.push_str(&format!("    parent {parent}\n"));
        }
        message.push_str(&format!("    children {}\n", bracketed(&node.children)));

        for translation in sorted(&node.translations) {
            message.push_str(&format!("    {}\n", translation_line(translation, false)));
        }

        let mut mappings: Vec<&KeyMapping> = node.mappings.iter().collect();
        mappings.sort_by_key(|mapping| mapping.id);
        for mapping in mappings {
            message.push_str(&format!("    keyMapping {}", mapping.id));
            if let Some(mapped) = self.get(mapping.id) {
                message.push(' ');
                message.push_str(&italic(mapped.name.as_deref()));
            }
            if let Some(target) = self.get(mapping.ref_id) {
                message.push_str(&format!(
                    " references {} {}",
                    target.id,
                    italic(target.name.as_deref())
                ));
                message.push_str(&prefix(" is a ", target.component_type.as_deref().unwrap_or_default()));
            }
            message.push('\n');
            for translation in sorted(&mapping.translations) {
                message.push_str(&format!("        {}\n", translation_line(translation, true)));
            }
        }
        message
    }
}

fn close(name: &[u8], frames: &mut OpenFrames) {
    match name {
        b"children" => {
            frames.nodes.pop();
            frames.mapping = None;
        }
        b"keyMapping" => frames.mapping = None,
        _ => {}
    }
}

fn paired_translations(translations: &[KeyTranslation]) -> Vec<Translation> {
    let mut kinds: Vec<Option<&str>> = Vec::new();
    let mut texts: BTreeMap<(&str, Option<&str>), &str> = BTreeMap::new();
    for translation in translations {
        let kind = translation.kind.as_deref();
        if !kinds.contains(&kind) {
            kinds.push(kind);
        }
        texts.insert((translation.language.as_str(), kind), translation.text.as_str());
    }

    kinds
        .into_iter()
        .filter_map(|kind| {
            let english = texts.get(&(ENGLISH, kind))?;
            let german = texts.get(&(GERMAN, kind))?;
            Some(Translation::new(*english, *german))
        })
        .collect()
}

fn sorted(translations: &[KeyTranslation]) -> Vec<&KeyTranslation> {
    let mut sorted: Vec<&KeyTranslation> = translations.iter().collect();
    sorted.sort_by(|left, right| (&left.language, &left.kind).cmp(&(&right.language, &right.kind)));
    sorted
}

/// Mapping translations are italic; node translations are plain.
fn translation_line(translation: &KeyTranslation, emphasize: bool) -> String {
    let text = if emphasize {
        format!("_{}_", translation.text)
    } else {
        translation.text.clone()
    };
    format!(
        "translation {} {} : {text}",
        translation.language,
        translation.kind.as_deref().unwrap_or_default(),
    )
}

fn italic(value: Option<&str>) -> String {
    match value {
        Some(value) if !value.is_empty() => format!("_{value}_"),
        _ => String::new(),
    }
}

fn non_zero(value: i32) -> String {
    if value == 0 { String::new() } else { value.to_string() }
}

/// Blank values drop the whole clause.
fn prefix(prefix: &str, value: &str) -> String {
    if value.is_empty() {
        String::new()
    } else {
        format!("{prefix} {value}")
    }
}

fn bracketed<T: Display>(values: &[T]) -> String {
    let joined: Vec<String> = values.iter().map(ToString::to_string).collect();
    format!("[{}]", joined.join(", "))
}
