//! Command grammar for the interactive prompt and script files.
//!
//! Command keywords are case-insensitive; method names and arguments are
//! passed through verbatim. Argument text stays raw here so the session's
//! marshaling layer decides what is JSON and what is a string literal.

use crate::tokenize::tokenize;

// ── Grammar ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Dial a hub server. Without a URL the configured default is used.
    Connect { url: Option<String> },
    /// Subscribe to a method, naming its parameters for display.
    Listen { method: String, labels: Vec<String> },
    /// Remove a subscription.
    StopListen { method: String },
    /// Fire-and-forget invocation.
    Send { method: String, arguments: Vec<String> },
    /// Correlated invocation; waits for the completion.
    Invoke { method: String, arguments: Vec<String> },
    /// Show the command list, or detail for one command.
    Help { topic: Option<String> },
    /// Close now, or after the given number of dispatched invocations.
    Quit { after_count: u64 },
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("unknown command {0:?}; type 'help' for the command list")]
    Unknown(String),

    #[error("usage: {usage}")]
    BadUsage { usage: &'static str },

    #[error("invalid count {0:?}; expected a non-negative integer")]
    BadCount(String),
}

// ── Parsing ───────────────────────────────────────────────────────────────────

/// Parses one input line. Blank lines parse to `None`.
pub fn parse(line: &str) -> Result<Option<Command>, CommandError> {
    let words = tokenize(line);
    let Some((keyword, rest)) = words.split_first() else {
        return Ok(None);
    };
    let command = match keyword.to_ascii_lowercase().as_str() {
        "connect" => match rest {
            [] => Command::Connect { url: None },
            [url] => Command::Connect {
                url: Some(url.clone()),
            },
            _ => return Err(usage("connect")),
        },
        "listen" => match rest.split_first() {
            Some((method, labels)) => Command::Listen {
                method: method.clone(),
                labels: labels.to_vec(),
            },
            None => return Err(usage("listen")),
        },
        "stoplisten" => match rest {
            [method] => Command::StopListen {
                method: method.clone(),
            },
            _ => return Err(usage("stoplisten")),
        },
        "send" => match rest.split_first() {
            Some((method, arguments)) => Command::Send {
                method: method.clone(),
                arguments: arguments.to_vec(),
            },
            None => return Err(usage("send")),
        },
        "invoke" => match rest.split_first() {
            Some((method, arguments)) => Command::Invoke {
                method: method.clone(),
                arguments: arguments.to_vec(),
            },
            None => return Err(usage("invoke")),
        },
        "help" => match rest {
            [] => Command::Help { topic: None },
            [topic] => Command::Help {
                topic: Some(topic.clone()),
            },
            _ => return Err(usage("help")),
        },
        "quit" | "exit" => match rest {
            [] => Command::Quit { after_count: 0 },
            [count] => Command::Quit {
                after_count: count
                    .parse()
                    .map_err(|_| CommandError::BadCount(count.clone()))?,
            },
            _ => return Err(usage("quit")),
        },
        _ => return Err(CommandError::Unknown(keyword.clone())),
    };
    Ok(Some(command))
}

fn usage(name: &str) -> CommandError {
    let usage = HELP
        .iter()
        .find(|entry| entry.name == name)
        .map(|entry| entry.usage)
        .unwrap_or("help");
    CommandError::BadUsage { usage }
}

// ── Help ──────────────────────────────────────────────────────────────────────

pub struct HelpEntry {
    pub name: &'static str,
    pub usage: &'static str,
    pub description: &'static str,
    pub example: &'static str,
}

pub const HELP: [HelpEntry; 7] = [
    HelpEntry {
        name: "connect",
        usage: "connect [url]",
        description: "Dial a hub server and perform the handshake. Without a \
                      URL the configured default server is used. http(s) \
                      addresses are rewritten to ws(s). Once the session has \
                      closed (quit, a server close, or exhausted retries) \
                      hubtap exits; run it again for a fresh session.",
        example: "connect http://localhost:5000/chathub",
    },
    HelpEntry {
        name: "listen",
        usage: "listen <method> [label...]",
        description: "Print inbound invocations of <method>. The labels name \
                      its parameters in order and double as the expected \
                      argument count; calls that do not match are rerouted to \
                      the catch-all and printed there.",
        example: "listen ReportStatus status code",
    },
    HelpEntry {
        name: "stoplisten",
        usage: "stoplisten <method>",
        description: "Stop printing invocations of <method>.",
        example: "stoplisten ReportStatus",
    },
    HelpEntry {
        name: "send",
        usage: "send <method> [arg...]",
        description: "Invoke a server method without waiting for a result. \
                      Arguments starting with '{' are sent as JSON documents; \
                      anything else is sent as a string. Single quotes group \
                      words into one argument.",
        example: "send Broadcast 'hello everyone'",
    },
    HelpEntry {
        name: "invoke",
        usage: "invoke <method> [arg...]",
        description: "Invoke a server method and print its result. Argument \
                      rules match 'send'.",
        example: "invoke Add '{\"a\":3,\"b\":4}'",
    },
    HelpEntry {
        name: "help",
        usage: "help [command]",
        description: "Show the command list, or detailed help for one command.",
        example: "help invoke",
    },
    HelpEntry {
        name: "quit",
        usage: "quit [afterCount]",
        description: "Close the session and exit. With a count, keep running \
                      until that many further inbound invocations have been \
                      printed, then close.",
        example: "quit 2",
    },
];

/// Renders the command list, or detailed help for `topic`.
pub fn help_text(topic: Option<&str>) -> String {
    match topic {
        Some(name) => {
            let lowered = name.to_ascii_lowercase();
            match HELP.iter().find(|entry| entry.name == lowered) {
                Some(entry) => format!(
                    "{}\n  {}\n  example: {}",
                    entry.usage, entry.description, entry.example
                ),
                None => format!("no help for {name:?}\n\n{}", help_text(None)),
            }
        }
        None => {
            let mut text = String::from("commands:\n");
            for entry in &HELP {
                text.push_str(&format!("  {:28} {}\n", entry.usage, first_sentence(entry.description)));
            }
            text.push_str("type 'help <command>' for details");
            text
        }
    }
}

fn first_sentence(text: &str) -> &str {
    match text.find('.') {
        Some(pos) => &text[..=pos],
        None => text,
    }
}
