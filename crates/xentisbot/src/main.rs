use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use xentisbot_core::commands::{Assistant, AssistantSettings};
use xentisbot_core::config::{BotConfig, load_config};
use xentisbot_core::external::{HttpPageFetcher, SshRemoteShell};
use xentisbot_core::reply::{DEFAULT_MESSAGE_LIMIT, Reply};
use xentisbot_core::runtime::{
    PathOverrides, ResolutionContext, ResolvedPaths, init_config, inspect_runtime,
    normalize_for_display, resolve_paths,
};
use xentisbot_core::shell::{BotShell, ChatEvent, ShellSettings, Transport};
use xentisbot_core::store::RecordStore;

const DEFAULT_LOG_FILTER: &str = "xentisbot=info,xentisbot_core=info";

#[derive(Debug, Parser)]
#[command(
    name = "xentisbot",
    version,
    about = "Chat assistant for Xentis schema, syscode, key and translation lookups"
)]
struct Cli {
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    #[arg(long, global = true, value_name = "PATH")]
    data_dir: Option<PathBuf>,
    #[arg(long, global = true, help = "Print resolved runtime diagnostics")]
    diagnostics: bool,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Clone)]
struct RuntimeOptions {
    config: Option<PathBuf>,
    data_dir: Option<PathBuf>,
    diagnostics: bool,
}

impl RuntimeOptions {
    fn from_cli(cli: &Cli) -> Self {
        Self {
            config: cli.config.clone(),
            data_dir: cli.data_dir.clone(),
            diagnostics: cli.diagnostics,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Chat on the console; every input line is a direct message")]
    Chat(ChatArgs),
    #[command(about = "Answer a single message and exit")]
    Ask(AskArgs),
    #[command(about = "Load all sources and report record counts")]
    Status(StatusArgs),
    #[command(about = "Write the default configuration file")]
    Init(InitArgs),
}

#[derive(Debug, Args)]
struct ChatArgs {
    #[arg(long, value_name = "NAME", default_value = "console")]
    user: String,
    #[arg(long, value_name = "NAME", default_value = "console")]
    channel: String,
}

#[derive(Debug, Args)]
struct AskArgs {
    #[arg(required = true, value_name = "WORDS")]
    words: Vec<String>,
    #[arg(long, help = "Print the replies as JSON lines")]
    json: bool,
}

#[derive(Debug, Args)]
struct StatusArgs {
    #[arg(long, help = "Print the status as JSON")]
    json: bool,
}

#[derive(Debug, Args)]
struct InitArgs {
    #[arg(long, help = "Overwrite an existing config file")]
    force: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let runtime = RuntimeOptions::from_cli(&cli);
    init_logging();

    match cli.command {
        Some(Commands::Chat(args)) => run_chat(&runtime, args),
        Some(Commands::Ask(args)) => run_ask(&runtime, args),
        Some(Commands::Status(args)) => run_status(&runtime, args),
        Some(Commands::Init(args)) => run_init(&runtime, args),
        None => {
            let mut command = Cli::command();
            command.print_help()?;
            println!();
            Ok(())
        }
    }
}

fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run_init(runtime: &RuntimeOptions, args: InitArgs) -> Result<()> {
    let paths = resolve_runtime_paths(runtime)?;
    let wrote_config = init_config(&paths, args.force)?;

    println!("config_path: {}", normalize_for_display(&paths.config_path));
    println!("wrote_config: {}", format_flag(wrote_config));
    if !wrote_config {
        println!("config exists; use --force to overwrite");
    }
    if runtime.diagnostics {
        println!("\n[diagnostics]\n{}", paths.diagnostics());
    }
    Ok(())
}

fn run_status(runtime: &RuntimeOptions, args: StatusArgs) -> Result<()> {
    let paths = resolve_runtime_paths(runtime)?;
    let runtime_status = inspect_runtime(&paths);
    let config = load_config(&paths.config_path)?;
    let store = RecordStore::load(&config.source_paths(&paths.data_dir));
    let status = store.status();

    if args.json {
        let rendered =
            serde_json::to_string_pretty(&status).context("failed to render status as JSON")?;
        println!("{rendered}");
        return Ok(());
    }

    println!("runtime status");
    println!("config_path: {}", normalize_for_display(&paths.config_path));
    println!("config_exists: {}", format_flag(runtime_status.config_exists));
    println!("data_dir: {}", normalize_for_display(&paths.data_dir));
    println!("data_dir_exists: {}", format_flag(runtime_status.data_dir_exists));
    println!("key_nodes: {}", status.key_nodes);
    println!("{}", status.to_message());
    if !runtime_status.warnings.is_empty() {
        println!("warnings:");
        for warning in &runtime_status.warnings {
            println!("  - {warning}");
        }
    }
    if runtime.diagnostics {
        println!("\n[diagnostics]\n{}", paths.diagnostics());
    }
    Ok(())
}

fn run_ask(runtime: &RuntimeOptions, args: AskArgs) -> Result<()> {
    let (mut shell, _) = start_shell(runtime)?;
    let event = console_event("console", "console", args.words.join(" "));
    let mut transport = ConsoleTransport { json: args.json };
    let resolution = shell.handle(&event, &mut transport);
    if resolution.is_none_or(|resolution| resolution.is_empty()) {
        info!("no command answered the message");
    }
    Ok(())
}

fn run_chat(runtime: &RuntimeOptions, args: ChatArgs) -> Result<()> {
    let (mut shell, config) = start_shell(runtime)?;
    let mut transport = ConsoleTransport::default();
    info!(bot = config.bot_name(), "ready; type `help` for examples");

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line.context("failed to read from stdin")?;
        let event = console_event(&args.user, &args.channel, line);
        shell.handle(&event, &mut transport);
    }
    Ok(())
}

fn start_shell(runtime: &RuntimeOptions) -> Result<(BotShell, BotConfig)> {
    let paths = resolve_runtime_paths(runtime)?;
    if runtime.diagnostics {
        eprintln!("[diagnostics]\n{}", paths.diagnostics());
    }
    for warning in inspect_runtime(&paths).warnings {
        warn!("{warning}");
    }

    let config = load_config(&paths.config_path)?;
    let sources = config.source_paths(&paths.data_dir);
    let store = RecordStore::load(&sources);
    let pages = HttpPageFetcher::new(config.http_timeout(), config.user_agent())?;
    let settings = AssistantSettings::from_config(&config);
    let shell = SshRemoteShell::new(settings.servers.connect_timeout);
    let assistant = Assistant::new(store, sources, settings, Box::new(shell), Box::new(pages))?;
    let bot = BotShell::new(ShellSettings::from_config(&config), assistant)?;
    Ok((bot, config))
}

fn console_event(user: &str, channel: &str, text: String) -> ChatEvent {
    ChatEvent {
        sender_id: user.to_string(),
        sender_name: user.to_string(),
        channel_id: channel.to_string(),
        is_direct: true,
        text,
    }
}

/// Prints replies to stdout.
#[derive(Debug, Default)]
struct ConsoleTransport {
    json: bool,
}

impl ConsoleTransport {
    fn print(&self, out: &mut impl Write, reply: &Reply) -> Result<()> {
        if self.json {
            let line = serde_json::to_string(reply).context("failed to render reply as JSON")?;
            writeln!(out, "{line}")?;
            return Ok(());
        }
        match reply {
            Reply::Text(text) => writeln!(out, "{text}")?,
            Reply::File { name, content } => {
                writeln!(out, "--- {name} ---")?;
                writeln!(out, "{content}")?;
                writeln!(out, "--- end of {name} ---")?;
            }
            Reply::Image { text, url } => writeln!(out, "{text} <{url}>")?,
        }
        Ok(())
    }
}

impl Transport for ConsoleTransport {
    fn send(&mut self, _channel: &str, reply: &Reply) -> Result<()> {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        self.print(&mut out, reply)?;
        out.flush().context("failed to flush stdout")
    }

    fn send_to_user(&mut self, user: &str, reply: &Reply) -> Result<()> {
        let stderr = io::stderr();
        let mut out = stderr.lock();
        write!(out, "[to {user}] ")?;
        self.print(&mut out, reply)
    }

    fn max_message_len(&self) -> usize {
        DEFAULT_MESSAGE_LIMIT
    }
}

fn resolve_runtime_paths(runtime: &RuntimeOptions) -> Result<ResolvedPaths> {
    dotenvy::dotenv().ok();

    let context = ResolutionContext::from_process()?;
    let overrides = PathOverrides {
        config: runtime.config.clone(),
        data_dir: runtime.data_dir.clone(),
    };

    let initial = resolve_paths(&context, &overrides);
    let config_env = env_file_next_to(&initial.config_path);
    if let Some(path) = config_env.filter(|path| path.exists()) {
        let _ = dotenvy::from_path_override(&path);
        return Ok(resolve_paths(&context, &overrides));
    }
    Ok(initial)
}

fn env_file_next_to(config_path: &Path) -> Option<PathBuf> {
    config_path.parent().map(|dir| dir.join(".env"))
}

fn format_flag(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}
