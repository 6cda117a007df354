//! Plain-text rendering of the App state.

use std::fmt::{self, Write};

use hangouts_app::App;
use hangouts_proto::{Message, MessageKind};

/// Render `app` as a block of lines.
pub fn render(app: &App) -> Result<String, fmt::Error> {
    let mut out = String::new();

    write!(out, "[{}] {}", app.username(), app.ready_state())?;
    if app.queued() > 0 {
        write!(out, " | {} queued", app.queued())?;
    }
    if let Some(pending) = app.pending() {
        write!(out, " | waiting on {}", pending.username)?;
    }
    writeln!(out)?;

    if let Some(error) = app.error() {
        writeln!(out, "! {error}")?;
    }
    if let Some(status) = app.status_message() {
        writeln!(out, "> {status}")?;
    }

    if !app.unread().is_empty() {
        let unread: Vec<_> =
            app.unread().iter().map(|h| format!("{} ({})", h.username, h.state)).collect();
        writeln!(out, "unread: {}", unread.join(", "))?;
    }

    match app.focused() {
        Some(peer) => {
            let state =
                app.hangout(peer).map_or_else(|| "new".to_string(), |h| h.state.to_string());
            writeln!(out, "-- {peer} [{state}] --")?;
            for message in app.messages(peer) {
                write_message(&mut out, message)?;
            }
        },
        None => {
            for hangout in app.hangouts() {
                let mark = if hangout.read { ' ' } else { '*' };
                writeln!(out, "{mark} {} [{}]", hangout.username, hangout.state)?;
            }
        },
    }

    if !app.search_results().is_empty() {
        let found: Vec<_> = app.search_results().iter().map(|h| h.username.as_str()).collect();
        writeln!(out, "search: {}", found.join(", "))?;
    }

    Ok(out)
}

fn write_message(out: &mut String, message: &Message) -> fmt::Result {
    let status = match message.kind {
        Some(MessageKind::Blocker) => " (not sent, blocked)",
        _ if !message.delivered => " (queued)",
        _ => "",
    };
    writeln!(out, "  {}: {}{status}", message.username, message.text)
}

#[cfg(test)]
mod tests {
    use hangouts_app::AppEvent;
    use hangouts_proto::{Hangout, HangoutState};

    use super::*;

    #[test]
    fn empty_app_shows_status_line_only() {
        let app = App::new("alice");
        insta::assert_snapshot!(render(&app).unwrap(), @"[alice] CLOSED");
    }

    #[test]
    fn unread_and_list() {
        let mut app = App::new("alice");
        let hangout = Hangout::new("bob", "bob@example.com", HangoutState::Inviter, 10);
        let hangouts = vec![hangout.clone()];
        app.handle(AppEvent::Restored { hangouts, unread: vec![hangout], queued: 2 });

        insta::assert_snapshot!(render(&app).unwrap(), @r"
        [alice] CLOSED | 2 queued
        unread: bob (INVITER)
        * bob [INVITER]
        ");
    }
}
