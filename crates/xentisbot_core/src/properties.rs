use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};

/// Load a Java-style `.properties` file.
pub fn load_properties(path: &Path) -> Result<BTreeMap<String, String>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_properties(&content).with_context(|| format!("failed to parse {}", path.display()))
}

/// Parse `.properties` text: `#`/`!` comments, `=`/`:`/whitespace separators,
/// trailing-backslash continuations and `\uXXXX` escapes. Later keys win.
pub fn parse_properties(content: &str) -> Result<BTreeMap<String, String>> {
    let mut output = BTreeMap::new();
    for (line_number, line) in logical_lines(content) {
        let (raw_key, raw_value) = split_key_value(&line);
        let key = unescape(raw_key).with_context(|| format!("line {line_number}: invalid key"))?;
        let value =
            unescape(raw_value).with_context(|| format!("line {line_number}: invalid value"))?;
        output.insert(key, value);
    }
    Ok(output)
}

fn logical_lines(content: &str) -> Vec<(usize, String)> {
    let mut lines = Vec::new();
    let mut current: Option<(usize, String)> = None;

    for (index, natural) in content.lines().enumerate() {
        let trimmed = natural.trim_start();
        let continuing = current.is_some();
        if !continuing && (trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('!'))
        {
            continue;
        }

        let (body, continues) = strip_continuation(trimmed);
        let entry = current.get_or_insert_with(|| (index + 1, String::new()));
        entry.1.push_str(body);
        if !continues && let Some(finished) = current.take() {
            lines.push(finished);
        }
    }
    if let Some(unfinished) = current {
        lines.push(unfinished);
    }
    lines
}

/// A line continues when it ends in an odd number of backslashes.
fn strip_continuation(line: &str) -> (&str, bool) {
    let trailing = line.chars().rev().take_while(|ch| *ch == '\\').count();
    if trailing % 2 == 1 {
        (&line[..line.len() - 1], true)
    } else {
        (line, false)
    }
}

fn split_key_value(line: &str) -> (&str, &str) {
    let mut escaped = false;
    let mut key_end = line.len();
    for (index, ch) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' => escaped = true,
            '=' | ':' => {
                key_end = index;
                break;
            }
            _ if ch.is_whitespace() => {
                key_end = index;
                break;
            }
            _ => {}
        }
    }

    let key = &line[..key_end];
    let mut rest = line[key_end..].trim_start();
    if let Some(stripped) = rest.strip_prefix('=').or_else(|| rest.strip_prefix(':')) {
        rest = stripped.trim_start();
    }
    (key, rest)
}

fn unescape(raw: &str) -> Result<String> {
    let mut output = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            output.push(ch);
            continue;
        }
        match chars.next() {
            Some('t') => output.push('\t'),
            Some('n') => output.push('\n'),
            Some('r') => output.push('\r'),
            Some('f') => output.push('\u{c}'),
            Some('u') => {
                let digits: String = chars.by_ref().take(4).collect();
                if digits.len() != 4 {
                    bail!("malformed \\u escape: \\u{digits}");
                }
                let code = u32::from_str_radix(&digits, 16)
                    .with_context(|| format!("malformed \\u escape: \\u{digits}"))?;
                output.push(char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER));
            }
            Some(other) => output.push(other),
            None => {}
        }
    }
    Ok(output)
}
