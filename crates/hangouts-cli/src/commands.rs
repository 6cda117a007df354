//! Console command parsing.
//!
//! Lines starting with `/` are commands. Anything else is message text for
//! the open hangout.

use hangouts_client::IssueCommand;
use hangouts_proto::Command;
use thiserror::Error;

/// Help text listing every command.
pub const HELP: &str = "/invite <peer> [email] | /accept <peer> | /decline <peer> | \
                        /block <peer> | /unblock <peer> | /msg <peer> <text> | \
                        /open <peer> | /leave | /dismiss <peer> | /search <query> | \
                        /connect | /quit";

/// One parsed console line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// Connect the transport.
    Connect,
    /// Issue a relationship command or message.
    Command(IssueCommand),
    /// Message text for the open hangout.
    Say(String),
    /// Open the hangout with a peer.
    Open(String),
    /// Close the open hangout.
    Leave,
    /// Drop a peer from the unread list.
    Dismiss(String),
    /// Search hangouts by peer name.
    Search(String),
    /// Show the command list.
    Help,
    /// Quit.
    Quit,
}

/// Why a line could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Nothing to do.
    #[error("empty input")]
    Empty,

    /// Known command with missing arguments.
    #[error("Usage: {0}")]
    Usage(&'static str),

    /// Unknown command.
    #[error("Unknown command /{0}, try /help")]
    Unknown(String),
}

/// Parse one console line.
pub fn parse(line: &str) -> Result<Input, ParseError> {
    let line = line.trim();
    if line.is_empty() {
        return Err(ParseError::Empty);
    }

    let Some(cmd) = line.strip_prefix('/') else {
        return Ok(Input::Say(line.to_string()));
    };

    let (name, rest) = cmd.split_once(char::is_whitespace).unwrap_or((cmd, ""));
    let rest = rest.trim();
    let mut parts = rest.split_whitespace();
    let peer = parts.next();

    match name {
        "connect" => Ok(Input::Connect),
        "leave" | "close" => Ok(Input::Leave),
        "help" | "h" => Ok(Input::Help),
        "quit" | "q" => Ok(Input::Quit),
        "invite" => {
            let peer = peer.ok_or(ParseError::Usage("/invite <peer> [email]"))?;
            let mut command = IssueCommand::new(Command::Invite, peer);
            if let Some(email) = parts.next() {
                command = command.with_email(email);
            }
            Ok(Input::Command(command))
        },
        "accept" => relationship(Command::Accept, peer, "/accept <peer>"),
        "decline" => relationship(Command::Decline, peer, "/decline <peer>"),
        "block" => relationship(Command::Block, peer, "/block <peer>"),
        "unblock" => relationship(Command::Unblock, peer, "/unblock <peer>"),
        "msg" | "m" => {
            const USAGE: &str = "/msg <peer> <text>";
            let peer = peer.ok_or(ParseError::Usage(USAGE))?;
            let text = rest[peer.len()..].trim();
            if text.is_empty() {
                return Err(ParseError::Usage(USAGE));
            }
            Ok(Input::Command(IssueCommand::new(Command::Message, peer).with_message(text)))
        },
        "open" => peer.map(|p| Input::Open(p.to_string())).ok_or(ParseError::Usage("/open <peer>")),
        "dismiss" => {
            peer.map(|p| Input::Dismiss(p.to_string())).ok_or(ParseError::Usage("/dismiss <peer>"))
        },
        "search" => {
            if rest.is_empty() {
                return Err(ParseError::Usage("/search <query>"));
            }
            Ok(Input::Search(rest.to_string()))
        },
        other => Err(ParseError::Unknown(other.to_string())),
    }
}

fn relationship(
    command: Command,
    peer: Option<&str>,
    usage: &'static str,
) -> Result<Input, ParseError> {
    peer.map(|p| Input::Command(IssueCommand::new(command, p))).ok_or(ParseError::Usage(usage))
}
