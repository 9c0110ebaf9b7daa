use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use tracing::{info, warn};

use crate::config::{BotConfig, ServerSettings};
use crate::dbstatus::StatusPageScraper;
use crate::dispatch::{CommandHandler, Mode, Registry, UsageRecorder, UsageStats};
use crate::enumeration::{plural, write_limited};
use crate::external::{PageFetcher, RemoteShell};
use crate::ids::{
    CLASS_PART_DIGITS, ID_DIGITS, XentisId, class_part_table_id, parse_xentis_id, signed_hex,
    table_class_part,
};
use crate::millis::describe_millis;
use crate::numbers::{Base, normalize_literal, parse_in_base, prefixed_base, render_conversion};
use crate::reply::Reply;
use crate::servers::check_server;
use crate::store::{RecordStore, SourcePaths};

const SHOWN_SYSCODES: usize = 10;

/// Settings the command set needs besides the records.
#[derive(Debug, Clone)]
pub struct AssistantSettings {
    pub bot_name: String,
    pub servers: ServerSettings,
    pub db_status_url: Option<String>,
}

impl AssistantSettings {
    pub fn from_config(config: &BotConfig) -> Self {
        Self {
            bot_name: config.bot_name().to_string(),
            servers: config.server_settings(),
            db_status_url: config.db_status_url(),
        }
    }
}

/// State shared by all command handlers. Replies accumulate in an outbox that
/// the caller drains after each message.
pub struct Assistant {
    store: RecordStore,
    sources: SourcePaths,
    settings: AssistantSettings,
    shell: Box<dyn RemoteShell>,
    pages: Box<dyn PageFetcher>,
    scraper: StatusPageScraper,
    usage: UsageStats,
    outbox: Vec<Reply>,
}

impl Assistant {
    pub fn new(
        store: RecordStore,
        sources: SourcePaths,
        settings: AssistantSettings,
        shell: Box<dyn RemoteShell>,
        pages: Box<dyn PageFetcher>,
    ) -> Result<Self> {
        Ok(Self {
            store,
            sources,
            settings,
            shell,
            pages,
            scraper: StatusPageScraper::new()?,
            usage: UsageStats::default(),
            outbox: Vec::new(),
        })
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn usage(&self) -> &UsageStats {
        &self.usage
    }

    pub fn record_user(&mut self, user: &str) {
        self.usage.record_user(user);
    }

    pub fn take_replies(&mut self) -> Vec<Reply> {
        std::mem::take(&mut self.outbox)
    }

    fn say(&mut self, text: impl Into<String>) {
        self.outbox.push(Reply::text(text));
    }

    fn say_help(&mut self) {
        let bot = format!("@{}", self.settings.bot_name);
        let explicit = [
            "help",
            "id 108300000012be3c",
            "classpart 1083",
            "tables zuord",
            "table portfolio",
            "syscode 10510000940000aa",
            "syscode C_InstParam_PseudoVerfall",
            "key 1890",
            "millis -11676096000000",
            "millis 1600-01-01",
            "hex c0defeed",
            "dec 1234567890",
            "xentis intui",
            "translate interest",
        ];
        let heuristic = ["108300000012be3c", "1083", "PORTFOLIO", "interest"];
        let direct = [
            "millis 1600-01-01",
            "xentis intui",
            "108300000012be3c",
            "1083",
            "portfolio",
            "interest",
        ];

        let mut message = String::from(
            "You can ask me questions by giving me a command with an appropriate argument.\n\
             Try it out by asking one of the following lines (just copy and paste into a new message):\n",
        );
        for example in explicit {
            message.push_str(&format!("{bot} {example}\n"));
        }
        message.push_str(
            "\nIf you talk with me without specifying a command, I will try to answer as best as I can \
             (maybe giving multiple answers).\nPlease try one of the following:\n",
        );
        for example in heuristic {
            message.push_str(&format!("{bot} {example}\n"));
        }
        message.push_str(&format!(
            "\nIf you talk with me in a direct chat you do not need to prefix the messages with my name {bot}.\n\
             Please try one of the following:\n"
        ));
        message.push_str(&direct.join("\n"));
        self.say(message);
    }

    fn say_status(&mut self) {
        let status = self.store.status().to_message();
        self.say(status);
    }

    fn say_statistics(&mut self) {
        let (days, hours, minutes, seconds) = split_uptime(self.usage.uptime());
        let mut message = format!(
            "This bot is running since {days} days {hours} hours {minutes} minutes {seconds} seconds.\n"
        );
        for (title, counters) in [
            ("Explicit commands", &self.usage.explicit),
            ("Heuristic commands", &self.usage.heuristic),
            ("User commands", &self.usage.users),
        ] {
            message.push_str(title);
            message.push_str(":\n");
            for (key, count) in counters {
                message.push_str(&format!("    {key} : {count}\n"));
            }
        }
        self.say(message);
    }

    /// Report the table behind the class part of `id`.
    fn analyze_class_part(&mut self, id: &XentisId, mode: Mode) -> bool {
        let Some(class_part) = id.class_part_text() else {
            return false;
        };
        let table_name = class_part_table_id(class_part)
            .and_then(|table_id| self.store.schema().table_name(table_id))
            .map(str::to_string);
        match table_name {
            Some(table_name) => {
                self.say(format!(
                    "The classpart {class_part} indicates a Xentis table `{table_name}`"
                ));
                true
            }
            None => {
                if mode.fail_message() {
                    self.say(format!("`{class_part}` is not a Xentis classpart."));
                }
                false
            }
        }
    }

    fn list_syscodes(&mut self, text: &str, mode: Mode) -> bool {
        let syscodes = self.store.syscodes().find(text);
        if syscodes.is_empty() {
            if mode.fail_message() {
                self.say(format!("No matching Xentis syscodes found for `{text}`."));
            }
            return false;
        }
        let mut message = format!(
            "Found {} {}:\n",
            syscodes.len(),
            plural(syscodes.len(), "syscode", "syscodes")
        );
        for syscode in &syscodes {
            message.push_str(&format!("{} `{}`\n", signed_hex(syscode.id), syscode.name));
        }
        self.say(message);
        true
    }

    fn describe_syscode_id(&mut self, id: i64, mode: Mode) -> bool {
        let table = self.store.syscodes();
        match table.get(id).map(|syscode| table.to_message(syscode)) {
            Some(message) => {
                self.say(message);
                true
            }
            None => {
                if mode.fail_message() {
                    self.say(format!("`{}` is not a valid Xentis syscode.", signed_hex(id)));
                }
                false
            }
        }
    }

    fn describe_syscodes(&mut self, text: &str, mode: Mode) -> bool {
        let table = self.store.syscodes();
        let syscodes = table.find(text);
        if syscodes.is_empty() {
            if mode.fail_message() {
                self.say(format!("No matching Xentis syscodes found for `{text}`."));
            }
            return false;
        }
        let mut message = format!(
            "Found {} {}:\n",
            syscodes.len(),
            plural(syscodes.len(), "syscode", "syscodes")
        );
        write_limited(
            &mut message,
            &syscodes,
            SHOWN_SYSCODES,
            0,
            |out, syscode| {
                out.push_str(&table.to_message(syscode));
                out.push('\n');
            },
            |out, _| out.push_str("..."),
        );
        self.say(message);
        true
    }

    fn list_tables(&mut self, text: &str, mode: Mode) -> bool {
        let mut names = self.store.schema().table_names(text);
        if names.is_empty() {
            if mode.fail_message() {
                self.say("No matching tables found.");
            }
            return false;
        }
        names.sort_unstable();
        let mut message = format!(
            "_Found {} matching {}._\n",
            names.len(),
            plural(names.len(), "table", "tables")
        );
        for name in names {
            message.push_str(name);
            message.push('\n');
        }
        self.say(message);
        true
    }

    fn describe_table(&mut self, text: &str, mode: Mode) -> bool {
        let name = text.to_uppercase();
        let schema = self.store.schema();
        let listing = schema.table(&name).map(|table| table.to_message());
        let table_id = schema.table_id(&name);
        if let Some(content) = listing {
            self.outbox.push(Reply::File {
                name: format!("TABLE_{name}.txt"),
                content,
            });
        }
        match table_id {
            Some(table_id) => {
                self.say(format!(
                    "The classpart of the Xentis table `{name}` is {}",
                    table_class_part(table_id)
                ));
                true
            }
            None => {
                if mode.fail_message() {
                    self.say(format!("`{name}` is not a Xentis table."));
                }
                false
            }
        }
    }

    fn describe_key(&mut self, text: &str, mode: Mode) -> bool {
        let Ok(id) = text.parse::<i32>() else {
            if mode.fail_message() {
                self.say(format!(
                    "`{text}` is not a valid Xentis key id (must be an integer value)."
                ));
            }
            return false;
        };
        let keys = self.store.keys();
        match keys.get(id).map(|node| keys.to_message(node)) {
            Some(message) => {
                self.say(message);
                true
            }
            None => {
                if mode.fail_message() {
                    self.say(format!("No Xentis key node found for id {id}."));
                }
                false
            }
        }
    }

    fn convert_number(&mut self, text: &str, base: Base, fail_message: bool, intro: bool) -> bool {
        let Some(value) = parse_in_base(text, base) else {
            if fail_message {
                self.say(format!(
                    "`{text}` is not a valid number for base `{}`.",
                    base.radix()
                ));
            }
            return false;
        };
        if intro {
            self.say(format!(
                "Interpreting `{text}` as number with base `{}`:",
                base.radix()
            ));
        }
        self.say(render_conversion(value));
        true
    }

    fn check_db_status(&mut self, name: &str) {
        let Some(url) = self.settings.db_status_url.clone() else {
            self.say("No database status page is configured.");
            return;
        };
        match self.pages.fetch(&url) {
            Ok(html) => {
                let blocks = self.scraper.matching_blocks(&html, name);
                if blocks.is_empty() {
                    self.say("No database found.");
                }
                for block in blocks {
                    self.say(block);
                }
            }
            Err(error) => {
                warn!(url = %url, error = %format!("{error:#}"), "database status page unavailable");
                self.say(format!("Failed to read the database status page: {error:#}"));
            }
        }
    }

    fn search_translations(&mut self, text: &str, mode: Mode) -> bool {
        if text.is_empty() {
            if mode.fail_message() {
                self.say("Nothing to translate.");
            }
            return false;
        }
        let messages = self.store.translations().search(text).to_messages();
        if messages.is_empty() {
            if mode.fail_message() {
                self.say("No translations found.");
            }
            return false;
        }
        for message in messages {
            self.say(message);
        }
        true
    }
}

impl UsageRecorder for Assistant {
    fn record_firing(&mut self, command: &'static str, mode: Mode) {
        self.usage.record_firing(command, mode);
    }
}

fn split_uptime(uptime: Duration) -> (u64, u64, u64, u64) {
    let seconds = uptime.as_secs();
    (
        seconds / 86_400,
        seconds % 86_400 / 3_600,
        seconds % 3_600 / 60,
        seconds % 60,
    )
}

/// Every character is an uppercase letter; digits and separators do not count.
fn is_upper_case(text: &str) -> bool {
    text.chars().all(char::is_uppercase)
}

/// All commands in their fixed order. The order decides which explicit command
/// answers first and the order of heuristic answers.
pub fn build_registry() -> Result<Registry<Assistant>> {
    Registry::new(vec![
        CommandHandler::tokens("help", help),
        CommandHandler::tokens("refresh", refresh),
        CommandHandler::tokens("status", status),
        CommandHandler::tokens("statistics", statistics),
        CommandHandler::single_argument("id", id),
        CommandHandler::single_joined_argument("syscodes", syscodes),
        CommandHandler::single_joined_argument("syscode", syscode),
        CommandHandler::single_argument("classpart", classpart),
        CommandHandler::single_argument("tables", tables),
        CommandHandler::single_argument("table", table),
        CommandHandler::single_argument("key", key),
        CommandHandler::single_argument("dec", dec),
        CommandHandler::single_argument("hex", hex),
        CommandHandler::single_argument("bin", bin),
        CommandHandler::single_argument("number", number),
        CommandHandler::tokens("millis", millis),
        CommandHandler::single_argument("image", image),
        CommandHandler::single_argument("xentis", xentis),
        CommandHandler::single_argument("db", db),
        CommandHandler::single_joined_argument("translate", translate),
    ])
}

fn help(assistant: &mut Assistant, _: &[String], mode: Mode) -> bool {
    if mode.is_heuristic() {
        return false;
    }
    assistant.say_help();
    true
}

fn refresh(assistant: &mut Assistant, _: &[String], mode: Mode) -> bool {
    if mode.is_heuristic() {
        return false;
    }
    assistant.say("Refreshing information about Xentis...");
    let failures = assistant.store.reload(&assistant.sources).len();
    info!(failures, "refreshed sources");
    assistant.say_status();
    true
}

fn status(assistant: &mut Assistant, _: &[String], mode: Mode) -> bool {
    if mode.is_heuristic() {
        return false;
    }
    assistant.say_status();
    true
}

fn statistics(assistant: &mut Assistant, _: &[String], mode: Mode) -> bool {
    if mode.is_heuristic() {
        return false;
    }
    assistant.say_statistics();
    true
}

fn id(assistant: &mut Assistant, argument: &str, mode: Mode) -> bool {
    let Some(id) = parse_xentis_id(argument, ID_DIGITS) else {
        if mode.fail_message() {
            assistant.say(format!(
                "`{argument}` is not a valid Xentis id. It must be 16 hex digits."
            ));
        }
        return false;
    };
    assistant.say(format!("This is a Xentis id: {} = decimal {}", id.hex, id.value));
    assistant.analyze_class_part(&id, mode)
}

fn syscodes(assistant: &mut Assistant, text: &str, mode: Mode) -> bool {
    if mode.is_heuristic() {
        return false;
    }
    assistant.list_syscodes(text, mode)
}

fn syscode(assistant: &mut Assistant, text: &str, mode: Mode) -> bool {
    let id = parse_xentis_id(text, ID_DIGITS);
    if mode.is_heuristic() && id.is_none() && !text.starts_with("C_") {
        return false;
    }
    match id {
        Some(id) => assistant.describe_syscode_id(id.value, mode),
        None => assistant.describe_syscodes(text, mode),
    }
}

fn classpart(assistant: &mut Assistant, argument: &str, mode: Mode) -> bool {
    let Some(class_part) = parse_xentis_id(argument, CLASS_PART_DIGITS) else {
        if mode.fail_message() {
            assistant.say(format!(
                "`{argument}` is not a valid Xentis classpart. It must be 4 hex digits."
            ));
        }
        return false;
    };
    assistant.analyze_class_part(&class_part, mode)
}

fn tables(assistant: &mut Assistant, argument: &str, mode: Mode) -> bool {
    if mode.is_heuristic() && !is_upper_case(argument) {
        return false;
    }
    assistant.list_tables(argument, mode)
}

fn table(assistant: &mut Assistant, argument: &str, mode: Mode) -> bool {
    if mode.is_heuristic() && !is_upper_case(argument) {
        return false;
    }
    assistant.describe_table(argument, mode)
}

fn key(assistant: &mut Assistant, argument: &str, mode: Mode) -> bool {
    assistant.describe_key(argument, mode)
}

fn dec(assistant: &mut Assistant, argument: &str, mode: Mode) -> bool {
    explicit_conversion(assistant, argument, mode, Base::Decimal)
}

fn hex(assistant: &mut Assistant, argument: &str, mode: Mode) -> bool {
    explicit_conversion(assistant, argument, mode, Base::Hex)
}

fn bin(assistant: &mut Assistant, argument: &str, mode: Mode) -> bool {
    explicit_conversion(assistant, argument, mode, Base::Binary)
}

fn explicit_conversion(assistant: &mut Assistant, argument: &str, mode: Mode, base: Base) -> bool {
    if mode.is_heuristic() {
        return false;
    }
    assistant.convert_number(&normalize_literal(argument, base), base, true, false)
}

/// Prefixed literals convert in their base only; anything else is tried as
/// decimal, hex and binary, reporting every base that parses.
fn number(assistant: &mut Assistant, argument: &str, mode: Mode) -> bool {
    if let Some(base) = prefixed_base(argument) {
        return assistant.convert_number(
            &normalize_literal(argument, base),
            base,
            mode.fail_message(),
            false,
        );
    }
    let literal = normalize_literal(argument, Base::Decimal);
    let mut converted = false;
    for base in [Base::Decimal, Base::Hex, Base::Binary] {
        converted |= assistant.convert_number(&literal, base, mode.fail_message(), true);
    }
    converted
}

fn millis(assistant: &mut Assistant, arguments: &[String], mode: Mode) -> bool {
    if mode.is_heuristic() {
        return false;
    }
    let message = describe_millis(arguments.first().map(String::as_str), Utc::now());
    assistant.say(message);
    true
}

fn image(assistant: &mut Assistant, argument: &str, mode: Mode) -> bool {
    if mode.is_heuristic() {
        return false;
    }
    assistant.outbox.push(Reply::Image {
        text: format!("Image {argument}"),
        url: argument.to_string(),
    });
    true
}

fn xentis(assistant: &mut Assistant, argument: &str, mode: Mode) -> bool {
    if mode.is_heuristic() {
        return false;
    }
    check_server(
        assistant.shell.as_ref(),
        &assistant.settings.servers,
        argument,
        &mut assistant.outbox,
    );
    true
}

fn db(assistant: &mut Assistant, argument: &str, mode: Mode) -> bool {
    if mode.is_heuristic() {
        return false;
    }
    assistant.check_db_status(argument);
    true
}

fn translate(assistant: &mut Assistant, text: &str, mode: Mode) -> bool {
    assistant.search_translations(text, mode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::ShellOutcome;
    use crate::store::GlossaryPaths;
    use anyhow::bail;
    use std::fs;
    use tempfile::{TempDir, tempdir};

    const SCHEMA: &str = r#"<Tables>
  <Table name="PORTFOLIO" id="131">
    <Column name="PORTFOLIO_ID"><Format oracle="RAW" size="8" xentis="id"/></Column>
  </Table>
  <Table name="ZUORDNUNG" id="83"/>
  <Table name="PF_ZUORD" id="84"/>
</Tables>"#;

    const KEYS: &str = r#"<root><children id="1890" name="Delete">
  <translations text="Löschen" languageCode="DE"/>
  <translations text="Delete" languageCode="EN"/>
</children></root>"#;

    const CODES: &str = "\
32768;;P;C_Period;Periode;Periode;Period;Period
32769;;DAY;C_Period_Daily;Tägl;Täglich;Dly;Daily
";

    struct StubShell;

    impl RemoteShell for StubShell {
        fn run(&self, host: &str, _user: &str, _command: &str) -> Result<ShellOutcome> {
            Ok(ShellOutcome::Output(format!("{host} is up")))
        }
    }

    struct StubPages(Option<String>);

    impl PageFetcher for StubPages {
        fn fetch(&self, url: &str) -> Result<String> {
            match &self.0 {
                Some(html) => Ok(html.clone()),
                None => bail!("HTTP 503 while fetching {url}"),
            }
        }
    }

    struct Fixture {
        _dir: TempDir,
        assistant: Assistant,
        registry: Registry<Assistant>,
    }

    fn fixture_with_pages(pages: StubPages) -> Fixture {
        let dir = tempdir().expect("tempdir");
        let write = |name: &str, content: &str| {
            let path = dir.path().join(name);
            fs::write(&path, content).expect("write fixture");
            path
        };
        let sources = SourcePaths {
            schema: Some(write("schema.xml", SCHEMA)),
            key_migration: Some(write("keymigration.xml", KEYS)),
            syscodes: Some(write("syscodes.txt", CODES)),
            syssubsets: None,
            glossaries: vec![GlossaryPaths {
                source: write("en.properties", "interest=Interest\naccrued=Accrued interest\n"),
                target: write("de.properties", "interest=Zins\naccrued=Marchzins\n"),
            }],
        };
        let settings = AssistantSettings {
            bot_name: "xentisbot".to_string(),
            servers: BotConfig::default().server_settings(),
            db_status_url: Some("http://status.example/db".to_string()),
        };
        let store = RecordStore::load(&sources);
        assert!(store.failures().is_empty(), "{:?}", store.failures());
        let assistant = Assistant::new(store, sources, settings, Box::new(StubShell), Box::new(pages))
            .expect("assistant");
        Fixture {
            _dir: dir,
            assistant,
            registry: build_registry().expect("registry"),
        }
    }

    fn fixture() -> Fixture {
        fixture_with_pages(StubPages(None))
    }

    impl Fixture {
        fn ask(&mut self, text: &str) -> Vec<Reply> {
            let tokens: Vec<String> = text.split_whitespace().map(str::to_string).collect();
            self.registry.resolve(&mut self.assistant, &tokens);
            self.assistant.take_replies()
        }

        fn ask_texts(&mut self, text: &str) -> Vec<String> {
            self.ask(text)
                .into_iter()
                .map(|reply| match reply {
                    Reply::Text(text) => text,
                    other => panic!("unexpected reply {other:?}"),
                })
                .collect()
        }
    }

    #[test]
    fn registry_keeps_the_command_order() {
        let names: Vec<_> = build_registry().expect("registry").names().collect();
        assert_eq!(
            names,
            vec![
                "help", "refresh", "status", "statistics", "id", "syscodes", "syscode",
                "classpart", "tables", "table", "key", "dec", "hex", "bin", "number", "millis",
                "image", "xentis", "db", "translate",
            ]
        );
    }

    #[test]
    fn help_lists_examples_with_the_bot_name() {
        let mut fixture = fixture();
        let replies = fixture.ask_texts("help");
        assert_eq!(replies.len(), 1);
        assert!(replies[0].contains("@xentisbot id 108300000012be3c\n"));
        assert!(replies[0].contains("@xentisbot PORTFOLIO\n"));
        assert!(replies[0].ends_with("portfolio\ninterest"));
    }

    #[test]
    fn explicit_id_reports_the_class_part_table() {
        let mut fixture = fixture();
        assert_eq!(
            fixture.ask_texts("id 108300000012be3c"),
            vec![
                "This is a Xentis id: 108300000012be3c = decimal 1189794726557171260",
                "The classpart 1083 indicates a Xentis table `PORTFOLIO`",
            ]
        );
        assert_eq!(
            fixture.ask_texts("id 12"),
            vec!["`12` is not a valid Xentis id. It must be 16 hex digits."]
        );
    }

    #[test]
    fn bare_id_is_answered_heuristically() {
        let mut fixture = fixture();
        let replies = fixture.ask_texts("108300000012be3c");
        assert_eq!(
            replies[0],
            "This is a Xentis id: 108300000012be3c = decimal 1189794726557171260"
        );
        assert!(fixture.assistant.usage().heuristic.contains_key("id"));
        assert!(fixture.assistant.usage().explicit.is_empty());
    }

    #[test]
    fn classpart_needs_four_hex_digits() {
        let mut fixture = fixture();
        assert_eq!(
            fixture.ask_texts("classpart 1083"),
            vec!["The classpart 1083 indicates a Xentis table `PORTFOLIO`"]
        );
        assert_eq!(
            fixture.ask_texts("classpart 1fff"),
            vec!["`1fff` is not a Xentis classpart."]
        );
        assert_eq!(
            fixture.ask_texts("classpart 10833"),
            vec!["`10833` is not a valid Xentis classpart. It must be 4 hex digits."]
        );
    }

    #[test]
    fn tables_are_searched_by_partial_name() {
        let mut fixture = fixture();
        assert_eq!(
            fixture.ask_texts("tables zuord"),
            vec!["_Found 2 matching tables._\nPF_ZUORD\nZUORDNUNG\n"]
        );
        assert_eq!(fixture.ask_texts("tables nothing"), vec!["No matching tables found."]);
    }

    #[test]
    fn table_sends_the_listing_as_file() {
        let mut fixture = fixture();
        let replies = fixture.ask("table portfolio");
        assert_eq!(replies.len(), 2);
        match &replies[0] {
            Reply::File { name, content } => {
                assert_eq!(name, "TABLE_PORTFOLIO.txt");
                assert!(content.contains("PORTFOLIO_ID"));
            }
            other => panic!("unexpected reply {other:?}"),
        }
        assert_eq!(
            replies[1],
            Reply::text("The classpart of the Xentis table `PORTFOLIO` is 1083")
        );
        assert_eq!(
            fixture.ask_texts("table missing"),
            vec!["`MISSING` is not a Xentis table."]
        );
    }

    #[test]
    fn uppercase_words_trigger_table_lookups() {
        let mut uppercase = fixture();
        let replies = uppercase.ask("PORTFOLIO");
        let usage = uppercase.assistant.usage();
        assert!(usage.heuristic.contains_key("tables"));
        assert!(usage.heuristic.contains_key("table"));
        assert!(replies.iter().any(|reply| matches!(reply, Reply::File { .. })));

        let mut lowercase = fixture();
        lowercase.ask("portfolio");
        assert!(!lowercase.assistant.usage().heuristic.contains_key("table"));
    }

    #[test]
    fn syscodes_are_listed_and_described() {
        let mut fixture = fixture();
        assert_eq!(
            fixture.ask_texts("syscodes period"),
            vec!["Found 2 syscodes:\n1051000000008000 `C_Period`\n1051000000008001 `C_Period_Daily`\n"]
        );
        let replies = fixture.ask_texts("syscode 1051000000008001");
        assert!(replies[0].starts_with("Syscode 1051000000008001 = decimal 1175720977720442881\n"));
        assert!(replies[0].contains("\tgroup: 1051000000008000 `C_Period`\n"));
        assert_eq!(
            fixture.ask_texts("syscode 10510000000080ff"),
            vec!["`10510000000080ff` is not a valid Xentis syscode."]
        );
        assert_eq!(
            fixture.ask_texts("syscode nothing"),
            vec!["No matching Xentis syscodes found for `nothing`."]
        );
    }

    #[test]
    fn syscode_names_are_answered_heuristically() {
        let mut fixture = fixture();
        let replies = fixture.ask_texts("C_Period_Daily");
        assert!(replies.iter().any(|reply| reply.starts_with("Found 1 syscode:\nSyscode ")));
        assert!(fixture.assistant.usage().heuristic.contains_key("syscode"));
    }

    #[test]
    fn key_nodes_are_looked_up_by_integer_id() {
        let mut fixture = fixture();
        let replies = fixture.ask_texts("key 1890");
        assert_eq!(replies.len(), 1);
        assert!(replies[0].starts_with("Key 1890 _Delete_\n"));
        assert_eq!(
            fixture.ask_texts("key abc"),
            vec!["`abc` is not a valid Xentis key id (must be an integer value)."]
        );
        assert_eq!(
            fixture.ask_texts("key 7"),
            vec!["No Xentis key node found for id 7."]
        );
    }

    #[test]
    fn base_conversions() {
        let mut fixture = fixture();
        assert_eq!(
            fixture.ask_texts("hex 0xffL"),
            vec!["Dec: `255`\nHex: `ff`\nBin: `11111111`"]
        );
        assert_eq!(
            fixture.ask_texts("bin 102"),
            vec!["`102` is not a valid number for base `2`."]
        );
        assert_eq!(
            fixture.ask_texts("dec 10"),
            vec!["Dec: `10`\nHex: `a`\nBin: `1010`"]
        );
    }

    #[test]
    fn number_reports_every_base_that_parses() {
        let mut fixture = fixture();
        let replies = fixture.ask_texts("number 10");
        assert_eq!(
            replies,
            vec![
                "Interpreting `10` as number with base `10`:",
                "Dec: `10`\nHex: `a`\nBin: `1010`",
                "Interpreting `10` as number with base `16`:",
                "Dec: `16`\nHex: `10`\nBin: `10000`",
                "Interpreting `10` as number with base `2`:",
                "Dec: `2`\nHex: `2`\nBin: `10`",
            ]
        );
        assert_eq!(
            fixture.ask_texts("number -0x1"),
            vec![format!(
                "Dec (unsigned): `{max}`\nHex (unsigned): `{max:x}`\nBin (unsigned): `{max:b}`\n\
                 Dec (signed): `-1`\nHex (signed): `-1`\nBin (signed): `-1`",
                max = u64::MAX
            )]
        );
    }

    #[test]
    fn millis_and_image_answer_explicitly() {
        let mut fixture = fixture();
        let replies = fixture.ask_texts("millis 1970-01-02");
        assert_eq!(
            replies,
            vec!["The UTC date `1970-01-02` corresponds to `86400000` milliseconds since epoch (1970-01-01)."]
        );
        assert_eq!(
            fixture.ask("image http://img.example/a.png"),
            vec![Reply::Image {
                text: "Image http://img.example/a.png".to_string(),
                url: "http://img.example/a.png".to_string(),
            }]
        );
    }

    #[test]
    fn translate_reports_exact_and_partial_matches() {
        let mut fixture = fixture();
        let replies = fixture.ask_texts("translate interest");
        assert_eq!(
            replies,
            vec![
                "Found 1 translation for exactly this term:\n_Interest_ : _Zins_ \n",
                "Found 2 translations that partially matched this term:\n\
                 _Interest_ : _Zins_ \n_Accrued interest_ : _Marchzins_ \n",
            ]
        );
        assert_eq!(fixture.ask_texts("translate xyz"), vec!["No translations found."]);
    }

    #[test]
    fn unmatched_heuristic_message_stays_silent() {
        let mut fixture = fixture();
        assert!(fixture.ask("qwertz").is_empty());
    }

    #[test]
    fn server_status_uses_the_remote_shell() {
        let mut fixture = fixture();
        let replies = fixture.ask_texts("xentis pdvmapp01");
        assert_eq!(
            replies,
            vec![
                "Checking xentis server pdvmapp01",
                "User `xen` on host `pdvmapp01` responded with:\n```pdvmapp01 is up```",
            ]
        );
    }

    #[test]
    fn db_status_reports_rows_or_fetch_failures() {
        let html = r#"<tr><td class="servicename">XEN1</td><td class="schemaname">INTUI</td></tr>"#;
        let mut fixture = fixture_with_pages(StubPages(Some(html.to_string())));
        let replies = fixture.ask_texts("db INTUI");
        assert_eq!(replies.len(), 1);
        assert!(replies[0].starts_with("```\nXEN1    INTUI"));
        assert_eq!(fixture.ask_texts("db OTHER"), vec!["No database found."]);

        let mut failing = fixture_with_pages(StubPages(None));
        let replies = failing.ask_texts("db INTUI");
        assert!(replies[0].starts_with("Failed to read the database status page: HTTP 503"));
    }

    #[test]
    fn status_and_refresh_report_counts() {
        let mut fixture = fixture();
        let status = fixture.ask_texts("status");
        assert!(status[0].starts_with("3 database tables\n"));
        let refresh = fixture.ask_texts("refresh");
        assert_eq!(refresh[0], "Refreshing information about Xentis...");
        assert_eq!(refresh[1], status[0]);
    }

    #[test]
    fn statistics_lists_counters() {
        let mut fixture = fixture();
        fixture.ask("status");
        fixture.assistant.record_user("alice");
        let replies = fixture.ask_texts("statistics");
        assert!(replies[0].starts_with("This bot is running since 0 days 0 hours"));
        assert!(replies[0].contains("Explicit commands:\n    status : 1\n"));
        assert!(replies[0].ends_with("User commands:\n    alice : 1\n"));
    }

    #[test]
    fn uptime_is_split_into_units() {
        assert_eq!(split_uptime(Duration::from_secs(90_061)), (1, 1, 1, 1));
        assert!(!is_upper_case("PF_ZUORD"));
        assert!(is_upper_case("PORTFOLIO"));
    }
}
