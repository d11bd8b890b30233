//! Script playback and the interactive prompt.
//!
//! [`run`] owns the whole front-end lifecycle:
//!
//! ```text
//! run()
//!  └─ HubSession::new()        -- session + lifecycle event channel
//!  └─ default catch-all listen -- unmatched traffic prints from the start
//!  └─ script playback          -- --script lines; '#' and blanks skipped
//!  └─ prompt loop
//!       ├─ stdin line    -> parse -> execute
//!       └─ SessionEvent  -> status line; Closed ends the loop
//! ```
//!
//! Output discipline: received payloads and invoke results go to stdout;
//! status lines, command errors, and log output go to stderr. Piped stdout
//! therefore carries payload JSON only.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::mpsc;
use tracing::debug;

use hubtap_client::{
    marshal_arguments, ConnectionState, HubSession, SessionConfig, SessionEvent,
    SubscriptionCallback,
};
use hubtap_core::CATCH_ALL_TARGET;

use crate::commands::{self, Command, CommandError};
use crate::render;

/// Everything [`run`] needs, resolved from CLI flags and the config file.
#[derive(Debug)]
pub struct RunOptions {
    pub session: SessionConfig,
    /// URL used by `connect` without an argument.
    pub default_url: Option<String>,
    /// Suppress status lines on stderr.
    pub quiet: bool,
    /// Arm the quit counter before any input runs. Zero means no auto-exit.
    pub exit_after: Option<u64>,
    /// Command file replayed before the prompt opens.
    pub script: Option<PathBuf>,
}

/// Runs the script (if any), then the prompt, until the session closes.
pub async fn run(options: RunOptions) -> anyhow::Result<()> {
    let (session, mut events) = HubSession::new(options.session);
    let app = App {
        session,
        default_url: options.default_url,
        quiet: options.quiet,
    };

    // Watching methods nobody subscribed to is the tool's main job, so the
    // rerouting target gets a printer before any traffic can arrive.
    app.session.listen(
        CATCH_ALL_TARGET,
        vec!["envelope".to_owned()],
        subscription_printer(CATCH_ALL_TARGET.to_owned(), vec!["envelope".to_owned()]),
    );

    if let Some(count) = options.exit_after {
        if count > 0 {
            app.session.quit(count).await;
        }
    }

    app.status("hubtap ready; type 'help' for commands");

    if let Some(path) = &options.script {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read script {}", path.display()))?;
        for line in playable_lines(&content) {
            debug!(line, "script line");
            app.execute_line(line).await;
            if app.session.state() == ConnectionState::Closed {
                break;
            }
        }
    }

    let mut stdin_lines = spawn_stdin_reader();
    let mut stdin_open = true;
    loop {
        tokio::select! {
            // lifecycle events drain before new input
            biased;

            event = events.recv() => match event {
                Some(SessionEvent::Reconnecting { reason }) => {
                    app.status(&format!("trying to reconnect: {reason}"));
                }
                Some(SessionEvent::Reconnected) => app.status("reconnected"),
                Some(SessionEvent::Closed { error }) => {
                    match error {
                        Some(reason) => app.status(&format!("connection closed: {reason}")),
                        None => app.status("session closed"),
                    }
                    break;
                }
                None => break,
            },

            line = stdin_lines.recv(), if stdin_open => match line {
                Some(line) => app.execute_line(&line).await,
                None => {
                    // stdin EOF: close and let the Closed event end the loop
                    stdin_open = false;
                    app.session.quit(0).await;
                }
            },
        }
    }

    Ok(())
}

/// Script lines worth executing: trimmed, non-blank, not `#` comments.
fn playable_lines(content: &str) -> impl Iterator<Item = &str> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
}

/// Forwards stdin lines over a channel from a plain OS thread.
///
/// `tokio::io::stdin` performs a blocking read that cannot be cancelled and
/// would hold runtime shutdown until the user presses enter. A detached
/// thread simply dies with the process.
fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

/// Builds the callback that prints received invocations for one method.
fn subscription_printer(method: String, labels: Vec<String>) -> SubscriptionCallback {
    Box::new(move |arguments| {
        println!("{}", render::render_invocation(&method, &labels, arguments));
    })
}

// ── Command execution ─────────────────────────────────────────────────────────

struct App {
    session: Arc<HubSession>,
    default_url: Option<String>,
    quiet: bool,
}

impl App {
    /// Status lines go to stderr and honor `--quiet`. Command errors and
    /// payload output never pass through here.
    fn status(&self, text: &str) {
        if !self.quiet {
            eprintln!("{text}");
        }
    }

    async fn execute_line(&self, line: &str) {
        match commands::parse(line) {
            Ok(Some(command)) => self.execute(command).await,
            Ok(None) => {}
            Err(error) => {
                eprintln!("{error}");
                if matches!(error, CommandError::Unknown(_)) {
                    eprintln!("{}", commands::help_text(None));
                }
            }
        }
    }

    async fn execute(&self, command: Command) {
        match command {
            Command::Connect { url } => self.connect(url).await,
            Command::Listen { method, labels } => self.listen(method, labels),
            Command::StopListen { method } => self.stop_listen(&method),
            Command::Send { method, arguments } => self.send(&method, &arguments).await,
            Command::Invoke { method, arguments } => self.invoke(&method, &arguments).await,
            Command::Help { topic } => println!("{}", commands::help_text(topic.as_deref())),
            Command::Quit { after_count } => self.quit(after_count).await,
        }
    }

    async fn connect(&self, url: Option<String>) {
        let Some(address) = url.or_else(|| self.default_url.clone()) else {
            eprintln!("connect: no URL given and none configured; usage: connect <url>");
            return;
        };
        match self.session.connect(&address).await {
            Ok(()) => self.status(&format!("connected to {address}")),
            Err(error) => eprintln!("connect failed: {error}"),
        }
    }

    fn listen(&self, method: String, labels: Vec<String>) {
        let printer = subscription_printer(method.clone(), labels.clone());
        self.session.listen(&method, labels, printer);
        self.status(&format!("listening on {method}"));
    }

    fn stop_listen(&self, method: &str) {
        if self.session.stop_listen(method) {
            self.status(&format!("stopped listening on {method}"));
        } else {
            eprintln!("no subscription on {method}");
        }
    }

    async fn send(&self, method: &str, raw_arguments: &[String]) {
        let arguments = match marshal_arguments(raw_arguments) {
            Ok(values) => values,
            Err(error) => {
                eprintln!("bad argument: {error}");
                return;
            }
        };
        match self.session.send(method, arguments).await {
            Ok(()) => self.status(&format!("message for {method} sent")),
            Err(error) => eprintln!("send failed: {error}"),
        }
    }

    async fn invoke(&self, method: &str, raw_arguments: &[String]) {
        let arguments = match marshal_arguments(raw_arguments) {
            Ok(values) => values,
            Err(error) => {
                eprintln!("bad argument: {error}");
                return;
            }
        };
        match self.session.invoke(method, arguments).await {
            Ok(Some(result)) => println!("{}", render::render_value(&result)),
            Ok(None) => self.status(&format!("{method} completed with no result")),
            Err(error) => eprintln!("invoke failed: {error}"),
        }
    }

    async fn quit(&self, after_count: u64) {
        if after_count > 0 {
            self.status(&format!(
                "closing after {after_count} more received invocations"
            ));
        }
        self.session.quit(after_count).await;
    }
}
