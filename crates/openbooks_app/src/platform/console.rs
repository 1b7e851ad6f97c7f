//! Line commands and plain-text rendering for the console client.

use std::fmt::Write as _;

use chrono::DateTime;
use openbooks_core::{
    ActiveSearchView, Appearance, AppViewModel, ConnectionState, LibraryBook, Notification,
    SearchStatus,
};

pub(crate) const HELP: &str = "\
Commands:
  search <query>   search the IRC indexers
  download <row>   request a book from the active results
  show <n>         display history entry n (0 clears)
  history          list recent searches
  delete [n]       remove history entry n, or the oldest
  library          list books already downloaded by the server
  servers          list IRC servers offering books
  status           show the connection state
  help             show this text
  quit             save and exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Command {
    Search(String),
    Download(usize),
    Show(usize),
    History,
    Delete(Option<usize>),
    Library,
    Servers,
    Status,
    Help,
    Quit,
}

/// Parse one input line. Blank lines yield `Ok(None)`.
pub(crate) fn parse(line: &str) -> Result<Option<Command>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let command = match word.to_ascii_lowercase().as_str() {
        "search" | "s" if !rest.is_empty() => Command::Search(rest.to_string()),
        "search" | "s" => return Err("usage: search <query>".into()),
        "download" | "d" => Command::Download(row_number(rest, "download <row>")?),
        "show" => Command::Show(number(rest, "show <n>")?),
        "history" | "h" => Command::History,
        "delete" if rest.is_empty() => Command::Delete(None),
        "delete" => Command::Delete(Some(row_number(rest, "delete [n]")?)),
        "library" => Command::Library,
        "servers" => Command::Servers,
        "status" => Command::Status,
        "help" | "?" => Command::Help,
        "quit" | "exit" | "q" => Command::Quit,
        other => return Err(format!("unknown command {other:?}; try help")),
    };
    Ok(Some(command))
}

fn number(text: &str, usage: &str) -> Result<usize, String> {
    text.parse().map_err(|_| format!("usage: {usage}"))
}

fn row_number(text: &str, usage: &str) -> Result<usize, String> {
    match number(text, usage)? {
        0 => Err(format!("usage: {usage} (rows start at 1)")),
        n => Ok(n),
    }
}

pub(crate) fn render_notification(notification: &Notification) -> String {
    let tag = match notification.appearance {
        Appearance::Notify => "info",
        Appearance::Success => "ok",
        Appearance::Warning => "warn",
        Appearance::Danger => "error",
    };
    match &notification.detail {
        Some(detail) => format!("[{tag}] {}: {detail}", notification.title),
        None => format!("[{tag}] {}", notification.title),
    }
}

pub(crate) fn render_connection(state: ConnectionState) -> String {
    match state {
        ConnectionState::Disconnected => "disconnected".to_string(),
        ConnectionState::Connecting { attempt: 0 } => "connecting".to_string(),
        ConnectionState::Connecting { attempt } => format!("reconnecting (attempt {attempt})"),
        ConnectionState::Connected => "connected".to_string(),
        ConnectionState::Backoff { attempt, delay_ms } => {
            format!("retrying in {delay_ms} ms (attempt {attempt})")
        }
        ConnectionState::GaveUp { attempts } => {
            format!("offline, gave up after {attempts} attempts")
        }
    }
}

pub(crate) fn render_status(view: &AppViewModel) -> String {
    let mut out = format!("Connection: {}", render_connection(view.connection));
    if let Some(username) = &view.username {
        let _ = write!(out, "\nIRC username: {username}");
    }
    let _ = write!(
        out,
        "\nHistory: {} entries, {} downloads in flight",
        view.history.len(),
        view.in_flight.len()
    );
    out
}

pub(crate) fn render_history(view: &AppViewModel) -> String {
    if view.history.is_empty() {
        return "No searches yet.".to_string();
    }
    let mut out = String::new();
    for (index, row) in view.history.iter().enumerate() {
        let marker = if row.active { '*' } else { ' ' };
        let status = match row.status {
            SearchStatus::Pending => "pending".to_string(),
            SearchStatus::Complete { books, errors } => format!("{books} books, {errors} unparsed"),
        };
        let _ = writeln!(
            out,
            "{marker}{:>3}  {}  {:<30}  {status}",
            index + 1,
            format_timestamp(row.timestamp),
            row.query
        );
    }
    out.truncate(out.trim_end().len());
    out
}

pub(crate) fn render_results(active: &ActiveSearchView) -> String {
    let mut out = format!("Results for {:?}", active.query);
    if active.pending {
        out.push_str(" (waiting for the server)");
        return out;
    }
    if active.books.is_empty() {
        out.push_str(": nothing found");
    }
    for (index, row) in active.books.iter().enumerate() {
        let marker = if row.downloading { '~' } else { ' ' };
        let book = &row.book;
        let _ = write!(
            out,
            "\n{marker}{:>3}  {} - {}  [{} {}]  {}",
            index + 1,
            book.author,
            book.title,
            book.format,
            book.size,
            book.server
        );
    }
    if !active.errors.is_empty() {
        let _ = write!(out, "\n{} lines could not be parsed:", active.errors.len());
        for error in &active.errors {
            let _ = write!(out, "\n     {} ({})", error.line, error.error);
        }
    }
    out
}

pub(crate) fn render_library(library: Option<&[LibraryBook]>) -> String {
    match library {
        None => "Library not loaded yet.".to_string(),
        Some([]) => "Library is empty.".to_string(),
        Some(books) => books
            .iter()
            .map(|book| format!("  {}  ({})", book.name, book.download_link))
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

pub(crate) fn render_servers(servers: &[String]) -> String {
    if servers.is_empty() {
        "No servers known yet.".to_string()
    } else {
        format!("Servers: {}", servers.join(", "))
    }
}

fn format_timestamp(millis: i64) -> String {
    DateTime::from_timestamp_millis(millis)
        .map(|time| time.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| millis.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use openbooks_core::{BookDetail, BookRowView, HistoryRowView, ParseError};
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_commands_and_arguments() {
        assert_eq!(parse("   "), Ok(None));
        assert_eq!(
            parse("search  the left hand of darkness "),
            Ok(Some(Command::Search("the left hand of darkness".into())))
        );
        assert_eq!(parse("download 3"), Ok(Some(Command::Download(3))));
        assert_eq!(parse("show 0"), Ok(Some(Command::Show(0))));
        assert_eq!(parse("delete"), Ok(Some(Command::Delete(None))));
        assert_eq!(parse("delete 2"), Ok(Some(Command::Delete(Some(2)))));
        assert_eq!(parse("QUIT"), Ok(Some(Command::Quit)));
    }

    #[test]
    fn rejects_bad_input() {
        assert!(parse("search").is_err());
        assert!(parse("download zero").is_err());
        assert!(parse("download 0").is_err());
        assert!(parse("frobnicate").is_err());
    }

    #[test]
    fn notification_includes_detail_when_present() {
        let plain = Notification::new(Appearance::Warning, "Slow down");
        assert_eq!(render_notification(&plain), "[warn] Slow down");
        let detailed = plain.with_detail("rate limited");
        assert_eq!(render_notification(&detailed), "[warn] Slow down: rate limited");
    }

    #[test]
    fn results_mark_in_flight_rows() {
        let book = BookDetail {
            server: "irc.irchighway.net".into(),
            author: "Ursula K. Le Guin".into(),
            title: "The Dispossessed".into(),
            format: "epub".into(),
            size: "700KB".into(),
            full: "!Oatmeal Ursula K. Le Guin - The Dispossessed.epub".into(),
        };
        let active = ActiveSearchView {
            timestamp: 1,
            query: "le guin".into(),
            pending: false,
            books: vec![BookRowView {
                book,
                downloading: true,
            }],
            errors: vec![ParseError {
                line: "garbage".into(),
                error: "no author".into(),
            }],
        };
        let text = render_results(&active);
        assert!(text.contains("~  1  Ursula K. Le Guin - The Dispossessed  [epub 700KB]"));
        assert!(text.contains("1 lines could not be parsed"));
    }

    #[test]
    fn history_marks_the_active_row() {
        let view = AppViewModel {
            history: vec![HistoryRowView {
                timestamp: 0,
                query: "dune".into(),
                status: SearchStatus::Pending,
                active: true,
            }],
            ..AppViewModel::default()
        };
        let text = render_history(&view);
        assert!(text.starts_with("*  1  1970-01-01 00:00:00  dune"));
        assert!(text.ends_with("pending"));
    }
}
