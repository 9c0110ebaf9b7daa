use anyhow::{Context, Result};
use regex::Regex;

/// Flush the collected rows once the block grows beyond this many characters.
const FLUSH_THRESHOLD: usize = 3000;

/// Cell classes shown in the listing with their column widths.
const COLUMNS: [(&str, usize, Align); 7] = [
    ("servicename", 7, Align::Left),
    ("schemaname", 30, Align::Left),
    ("size", 6, Align::Right),
    ("impdat", 8, Align::Left),
    ("responsible", 10, Align::Left),
    ("locked", 10, Align::Left),
    ("comment", 30, Align::Left),
];
const NOT_AVAILABLE: &str = "N.A.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Align {
    Left,
    Right,
}

/// Extracts database rows from the HTML status page.
#[derive(Debug, Clone)]
pub struct StatusPageScraper {
    row: Regex,
    cell: Regex,
    class: Regex,
    tag: Regex,
}

impl StatusPageScraper {
    pub fn new() -> Result<Self> {
        Ok(Self {
            row: Regex::new(r"(?is)<tr\b[^>]*>(.*?)</tr\s*>").context("row pattern")?,
            cell: Regex::new(r"(?is)<td\b([^>]*)>(.*?)</td\s*>").context("cell pattern")?,
            class: Regex::new(r#"(?i)\bclass\s*=\s*["']?([^"'\s>]+)"#).context("class pattern")?,
            tag: Regex::new(r"(?s)<[^>]*>").context("tag pattern")?,
        })
    }

    /// One padded line per table row, in page order.
    pub fn rows(&self, html: &str) -> Vec<String> {
        self.row
            .captures_iter(html)
            .filter_map(|row| row.get(1))
            .map(|row| self.render_row(row.as_str()))
            .collect()
    }

    fn render_row(&self, row: &str) -> String {
        let mut line = String::new();
        for cell in self.cell.captures_iter(row) {
            let attributes = cell.get(1).map_or("", |value| value.as_str());
            let Some(class) = self
                .class
                .captures(attributes)
                .and_then(|captures| captures.get(1))
            else {
                continue;
            };
            let Some(&(_, width, align)) = COLUMNS.iter().find(|(name, _, _)| *name == class.as_str())
            else {
                continue;
            };
            let content = cell.get(2).map_or("", |value| value.as_str());
            let text = decode_entities(&self.tag.replace_all(content, ""));
            let text = text.trim();
            if text == NOT_AVAILABLE {
                continue;
            }
            match align {
                Align::Left => line.push_str(&format!("{text:<width$}")),
                Align::Right => line.push_str(&format!("{text:>width$}")),
            }
            line.push(' ');
        }
        line
    }

    /// Code blocks of all rows whose rendered line contains `name`. Empty when
    /// no row matches.
    pub fn matching_blocks(&self, html: &str, name: &str) -> Vec<String> {
        let mut blocks = Vec::new();
        let mut message = String::new();
        let mut chars = 0;
        for line in self.rows(html) {
            if !line.contains(name) {
                continue;
            }
            message.push_str(&line);
            message.push('\n');
            chars += line.chars().count() + 1;
            if chars > FLUSH_THRESHOLD {
                blocks.push(code_block(&message));
                message.clear();
                chars = 0;
            }
        }
        if !message.is_empty() {
            blocks.push(code_block(&message));
        }
        blocks
    }
}

fn code_block(message: &str) -> String {
    format!("```\n{message}\n```")
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><body><table>
<tr><th>Service</th><th>Schema</th></tr>
<tr>
  <td class="servicename">XEN1</td>
  <td class="schemaname">INTUI_MAIN</td>
  <td class="size">120</td>
  <td class="impdat">N.A.</td>
  <td class="responsible"><b>intui</b></td>
  <td class="locked">no</td>
  <td class="comment">R&amp;D copy</td>
  <td class="ignored">x</td>
</tr>
<TR><TD CLASS="servicename">XEN2</TD><TD class='schemaname'>OTHER</TD></TR>
</table></body></html>"#;

    fn scraper() -> StatusPageScraper {
        StatusPageScraper::new().expect("patterns compile")
    }

    #[test]
    fn rows_are_padded_per_column_class() {
        let rows = scraper().rows(PAGE);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0], "");
        assert_eq!(
            rows[1],
            format!(
                "{:<7} {:<30} {:>6} {:<10} {:<10} {:<30} ",
                "XEN1", "INTUI_MAIN", "120", "intui", "no", "R&D copy"
            )
        );
        assert_eq!(rows[2], format!("{:<7} {:<30} ", "XEN2", "OTHER"));
    }

    #[test]
    fn only_matching_rows_are_reported() {
        let blocks = scraper().matching_blocks(PAGE, "OTHER");
        assert_eq!(blocks.len(), 1);
        assert!(blocks[0].starts_with("```\nXEN2"));
        assert!(blocks[0].ends_with("\n\n```"));
        assert!(scraper().matching_blocks(PAGE, "MISSING").is_empty());
    }

    #[test]
    fn large_results_are_flushed_in_blocks() {
        let row = r#"<tr><td class="comment">match</td></tr>"#;
        let page = row.repeat(200);
        let blocks = scraper().matching_blocks(&page, "match");
        assert!(blocks.len() > 1);
        let total: usize = blocks.iter().map(|block| block.matches("match").count()).sum();
        assert_eq!(total, 200);
    }

    #[test]
    fn flush_threshold_counts_characters() {
        // Each row is 32 characters with its newline but 33 bytes.
        let row = r#"<tr><td class="comment">Ölmatch</td></tr>"#;
        let page = row.repeat(100);
        let blocks = scraper().matching_blocks(&page, "match");
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].matches("Ölmatch").count(), 94);
        assert_eq!(blocks[1].matches("Ölmatch").count(), 6);
    }
}
