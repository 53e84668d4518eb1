//! Interactive lookup terminal.
//!
//! Every input line is treated as a user ID, except for `:`-prefixed
//! meta-commands. Results are stamped with the local wall-clock time.

use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cli::render;
use crate::error::Result;
use crate::ingest::Ingestor;
use crate::lookup::LookupService;
use crate::store::RecordStore;

/// Prompt written before each input line.
pub const PROMPT: &str = "idq> ";

const HELP: &str = "\
Type a user ID to look it up, or one of:
  :stats    show data set statistics
  :sample   show sample user IDs
  :reload   re-read the data files
  :help     show this help
  :quit     leave the terminal
";

/// One parsed line of terminal input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalInput<'a> {
    /// Blank line.
    Empty,
    /// A user ID to look up.
    Lookup(&'a str),
    /// `:stats`
    Stats,
    /// `:sample`
    Sample,
    /// `:reload`
    Reload,
    /// `:help`
    Help,
    /// `:quit`, `:q` or `:exit`
    Quit,
    /// Any other `:`-prefixed word.
    Unknown(&'a str),
}

impl<'a> TerminalInput<'a> {
    /// Parse a raw input line.
    #[must_use]
    pub fn parse(line: &'a str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Self::Empty;
        }
        match line.strip_prefix(':') {
            None => Self::Lookup(line),
            Some(command) => match command.trim().to_ascii_lowercase().as_str() {
                "stats" => Self::Stats,
                "sample" => Self::Sample,
                "reload" => Self::Reload,
                "help" | "h" | "?" => Self::Help,
                "quit" | "q" | "exit" => Self::Quit,
                _ => Self::Unknown(line),
            },
        }
    }
}

/// An interactive session over a lookup service.
#[derive(Debug, Clone)]
pub struct Terminal {
    service: LookupService,
    ingestor: Ingestor,
}

impl Terminal {
    /// Create a session. `ingestor` is used by `:reload`.
    #[must_use]
    pub fn new(service: LookupService, ingestor: Ingestor) -> Self {
        Self { service, ingestor }
    }

    /// Execute one input, returning the text to print or `None` to quit.
    ///
    /// A failed `:reload` is reported in the output and keeps the current
    /// snapshot.
    pub async fn execute(&self, input: TerminalInput<'_>) -> Option<String> {
        let output = match input {
            TerminalInput::Empty => String::new(),
            TerminalInput::Lookup(id) => {
                let response = self.service.respond(id);
                debug!(user_id = %response.user_id, found = response.found, "terminal lookup");
                render::lookup(&response, Some(&render::timestamp()))
            }
            TerminalInput::Stats => format!(
                "[{}] stats\n{}",
                render::timestamp(),
                render::stats(&self.service.stats())
            ),
            TerminalInput::Sample => format!(
                "[{}] sample\n{}",
                render::timestamp(),
                render::sample(&self.service.default_sample())
            ),
            TerminalInput::Reload => match self.ingestor.refresh(self.service.store()).await {
                Ok(report) => {
                    format!("[{}] reload\n{}", render::timestamp(), render::report(&report))
                }
                Err(e) => {
                    warn!(error = %e, "reload failed");
                    format!("[{}] reload failed: {e}\n", render::timestamp())
                }
            },
            TerminalInput::Help => HELP.to_string(),
            TerminalInput::Quit => return None,
            TerminalInput::Unknown(command) => {
                format!("unknown command {command}, type :help for a list\n")
            }
        };
        Some(output)
    }

    /// Run the read-eval-print loop until `:quit` or end of input.
    ///
    /// # Errors
    ///
    /// Returns an error if reading input or writing output fails.
    pub async fn run<R, W>(&self, input: R, mut output: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = input.lines();
        loop {
            output.write_all(PROMPT.as_bytes()).await?;
            output.flush().await?;

            let Some(line) = lines.next_line().await? else {
                output.write_all(b"\n").await?;
                break;
            };
            match self.execute(TerminalInput::parse(&line)).await {
                Some(text) => output.write_all(text.as_bytes()).await?,
                None => break,
            }
        }
        output.flush().await?;
        Ok(())
    }
}

/// Spawn a task that refreshes `store` from `ingestor` every `every`.
///
/// The first pass happens one interval after spawning. Failures are logged
/// and the loop keeps going. Abort the returned handle to stop it.
pub fn spawn_refresh(ingestor: Ingestor, store: RecordStore, every: Duration) -> JoinHandle<()> {
    info!(interval_secs = every.as_secs(), "background refresh enabled");
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match ingestor.refresh(&store).await {
                Ok(report) => debug!(users = report.unique_users, "background refresh done"),
                Err(e) => warn!(error = %e, "background refresh failed"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::LookupConfig;
    use crate::ingest::snapshot_from_lines;
    use crate::source::{RecordSource, TextSource};

    /// A source whose read task panics, failing the whole ingestion pass.
    #[derive(Debug)]
    struct PanickingSource;

    #[async_trait::async_trait]
    impl RecordSource for PanickingSource {
        fn name(&self) -> &str {
            "panicking"
        }

        async fn read_text(&self) -> Result<String> {
            panic!("source exploded")
        }
    }

    const LINE_42: &str = "('42','dGVzdEBleGFtcGxlLmNvbQ==',1,2,3,4,5,6,'10.0.0.1'),";

    fn terminal(initial: &[&str], reload_text: &str) -> Terminal {
        let store = RecordStore::new(snapshot_from_lines(initial.iter().copied()));
        let service = LookupService::new(store, LookupConfig::default());
        let source: Arc<dyn RecordSource> = Arc::new(TextSource::new("mem", reload_text));
        Terminal::new(service, Ingestor::new(vec![source]))
    }

    async fn run_script(terminal: &Terminal, script: &str) -> String {
        let mut output = Vec::new();
        terminal.run(script.as_bytes(), &mut output).await.unwrap();
        String::from_utf8(output).unwrap()
    }

    #[test]
    fn test_parse_input() {
        assert_eq!(TerminalInput::parse("   "), TerminalInput::Empty);
        assert_eq!(TerminalInput::parse(" 42 \n"), TerminalInput::Lookup("42"));
        assert_eq!(TerminalInput::parse(":stats"), TerminalInput::Stats);
        assert_eq!(TerminalInput::parse(":SAMPLE"), TerminalInput::Sample);
        assert_eq!(TerminalInput::parse(":reload"), TerminalInput::Reload);
        assert_eq!(TerminalInput::parse(":?"), TerminalInput::Help);
        assert_eq!(TerminalInput::parse(":q"), TerminalInput::Quit);
        assert_eq!(TerminalInput::parse(":nope"), TerminalInput::Unknown(":nope"));
    }

    #[tokio::test]
    async fn test_lookup_is_stamped() {
        let term = terminal(&[LINE_42], "");
        let text = term.execute(TerminalInput::Lookup("42")).await.unwrap();
        assert!(text.starts_with('['));
        assert!(text.contains("] 42\n"));
        assert!(text.contains("test@example.com"));
    }

    #[tokio::test]
    async fn test_quit_stops() {
        let term = terminal(&[], "");
        assert!(term.execute(TerminalInput::Quit).await.is_none());
    }

    #[tokio::test]
    async fn test_reload_swaps_snapshot() {
        let term = terminal(&[LINE_42], "('77','',1,2,3,4,5,6,'null')");
        let text = term.execute(TerminalInput::Reload).await.unwrap();
        assert!(text.contains("] reload\n"));

        assert!(term.service.lookup("77").is_found());
        assert!(!term.service.lookup("42").is_found());
    }

    #[tokio::test]
    async fn test_run_script() {
        let term = terminal(&[LINE_42], "");
        let output = run_script(&term, "42\n:sample\n4\n:quit\n99\n").await;

        assert!(output.starts_with(PROMPT));
        assert!(output.contains("test@example.com"));
        assert!(output.contains("] sample\n42\n"));
        assert!(output.contains("similar: 42"));
        // Input after :quit is ignored.
        assert!(!output.contains("] 99"));
    }

    #[tokio::test]
    async fn test_failed_reload_keeps_session_alive() {
        let store = RecordStore::new(snapshot_from_lines([LINE_42]));
        let service = LookupService::new(store, LookupConfig::default());
        let source: Arc<dyn RecordSource> = Arc::new(PanickingSource);
        let term = Terminal::new(service, Ingestor::new(vec![source]));

        let output = run_script(&term, ":reload\n42\n").await;

        assert!(output.contains("] reload failed: "));
        assert!(output.contains("test@example.com"));
        assert!(term.service.lookup("42").is_found());
    }

    #[tokio::test]
    async fn test_run_ends_at_eof() {
        let term = terminal(&[], "");
        let output = run_script(&term, ":help\n").await;
        assert!(output.contains(":reload"));
        assert!(output.ends_with('\n'));
    }

    #[tokio::test]
    async fn test_spawn_refresh_swaps_after_interval() {
        let store = RecordStore::empty();
        let source: Arc<dyn RecordSource> =
            Arc::new(TextSource::new("mem", "('5','',1,2,3,4,5,6,'null')"));
        let handle = spawn_refresh(
            Ingestor::new(vec![source]),
            store.clone(),
            Duration::from_millis(20),
        );

        for _ in 0..100 {
            if store.load().contains("5") {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        handle.abort();
        assert!(store.load().contains("5"));
    }
}
