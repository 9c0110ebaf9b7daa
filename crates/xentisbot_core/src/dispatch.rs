use std::collections::{BTreeMap, HashSet};
use std::time::{Duration, Instant};

use anyhow::{Result, bail};
use tracing::debug;

/// How a handler was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// The first token named the handler; the rest are its arguments.
    Explicit,
    /// Speculative attempt with the whole message.
    Heuristic,
}

impl Mode {
    /// Explicit invocations explain their failures, heuristic ones stay silent.
    pub fn fail_message(self) -> bool {
        self == Self::Explicit
    }

    pub fn is_heuristic(self) -> bool {
        self == Self::Heuristic
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Explicit => "explicit",
            Self::Heuristic => "heuristic",
        }
    }
}

pub type TokensCallback<C> = fn(&mut C, &[String], Mode) -> bool;
pub type ArgumentCallback<C> = fn(&mut C, &str, Mode) -> bool;

enum Shape<C> {
    Tokens(TokensCallback<C>),
    SingleArgument(ArgumentCallback<C>),
    SingleJoinedArgument(ArgumentCallback<C>),
}

/// A named command. Callbacks return whether they handled the message.
pub struct CommandHandler<C> {
    name: &'static str,
    shape: Shape<C>,
}

impl<C> CommandHandler<C> {
    /// Receives every remaining token.
    pub fn tokens(name: &'static str, callback: TokensCallback<C>) -> Self {
        Self {
            name,
            shape: Shape::Tokens(callback),
        }
    }

    /// Receives the first remaining token; does not apply without one.
    pub fn single_argument(name: &'static str, callback: ArgumentCallback<C>) -> Self {
        Self {
            name,
            shape: Shape::SingleArgument(callback),
        }
    }

    /// Receives the remaining tokens joined by single spaces; does not apply without any.
    pub fn single_joined_argument(name: &'static str, callback: ArgumentCallback<C>) -> Self {
        Self {
            name,
            shape: Shape::SingleJoinedArgument(callback),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Explicit mode only applies when the first token is the handler name and
    /// passes the tokens after it; heuristic mode passes all tokens.
    pub fn execute(&self, context: &mut C, tokens: &[String], mode: Mode) -> bool {
        let arguments = match mode {
            Mode::Explicit => match tokens.split_first() {
                Some((first, rest)) if first == self.name => rest,
                _ => return false,
            },
            Mode::Heuristic => tokens,
        };

        match self.shape {
            Shape::Tokens(callback) => callback(context, arguments, mode),
            Shape::SingleArgument(callback) => match arguments.first() {
                Some(argument) => callback(context, argument, mode),
                None => false,
            },
            Shape::SingleJoinedArgument(callback) => {
                if arguments.is_empty() {
                    false
                } else {
                    callback(context, &arguments.join(" "), mode)
                }
            }
        }
    }
}

/// Receives one call per handler that fired.
pub trait UsageRecorder {
    fn record_firing(&mut self, command: &'static str, mode: Mode);
}

/// Which handlers fired for one message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    pub explicit: Option<&'static str>,
    pub heuristic: Vec<&'static str>,
}

impl Resolution {
    pub fn is_empty(&self) -> bool {
        self.explicit.is_none() && self.heuristic.is_empty()
    }
}

/// Handlers in their fixed registration order.
pub struct Registry<C> {
    handlers: Vec<CommandHandler<C>>,
}

impl<C: UsageRecorder> Registry<C> {
    pub fn new(handlers: Vec<CommandHandler<C>>) -> Result<Self> {
        let mut seen = HashSet::new();
        for handler in &handlers {
            if !seen.insert(handler.name) {
                bail!("duplicate command name `{}`", handler.name);
            }
        }
        Ok(Self { handlers })
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.handlers.iter().map(CommandHandler::name)
    }

    /// Explicit pass first, stopping at the first handler that fires. Only when
    /// none fires, every handler gets a heuristic attempt.
    pub fn resolve(&self, context: &mut C, tokens: &[String]) -> Resolution {
        let mut resolution = Resolution::default();
        if tokens.is_empty() {
            return resolution;
        }

        for handler in &self.handlers {
            if handler.execute(context, tokens, Mode::Explicit) {
                debug!(command = handler.name, mode = "explicit", "command fired");
                context.record_firing(handler.name, Mode::Explicit);
                resolution.explicit = Some(handler.name);
                return resolution;
            }
        }

        for handler in &self.handlers {
            if handler.execute(context, tokens, Mode::Heuristic) {
                debug!(command = handler.name, mode = "heuristic", "command fired");
                context.record_firing(handler.name, Mode::Heuristic);
                resolution.heuristic.push(handler.name);
            }
        }
        resolution
    }
}

/// Usage counters kept for the `statistics` command.
#[derive(Debug, Clone)]
pub struct UsageStats {
    started: Instant,
    pub explicit: BTreeMap<String, u64>,
    pub heuristic: BTreeMap<String, u64>,
    pub users: BTreeMap<String, u64>,
}

impl Default for UsageStats {
    fn default() -> Self {
        Self {
            started: Instant::now(),
            explicit: BTreeMap::new(),
            heuristic: BTreeMap::new(),
            users: BTreeMap::new(),
        }
    }
}

impl UsageStats {
    pub fn record_user(&mut self, user: &str) {
        *self.users.entry(user.to_string()).or_default() += 1;
    }

    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }
}

impl UsageRecorder for UsageStats {
    fn record_firing(&mut self, command: &'static str, mode: Mode) {
        let counters = match mode {
            Mode::Explicit => &mut self.explicit,
            Mode::Heuristic => &mut self.heuristic,
        };
        *counters.entry(command.to_string()).or_default() += 1;
    }
}
