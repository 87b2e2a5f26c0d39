//! Line-oriented console on stdin/stdout.

use duet_core::{EndReason, Notice, ParticipantId, Role};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use crate::host::HostEvent;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Invite(ParticipantId),
    /// `None` accepts the only pending invite.
    Accept(Option<ParticipantId>),
    Decline(Option<ParticipantId>),
    Leave,
    Roster,
    Status,
    Help,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("unknown command `{0}` (try `help`)")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
}

pub fn parse(line: &str) -> Result<Command, ParseError> {
    let mut words = line.split_whitespace();
    let Some(cmd) = words.next() else {
        return Err(ParseError::Usage("<command> [participant]"));
    };
    let arg = words.next().map(ParticipantId::from);
    if words.next().is_some() {
        return Err(ParseError::Usage("<command> [participant]"));
    }
    let cmd = match (cmd, arg) {
        ("invite", Some(p)) => Command::Invite(p),
        ("invite", None) => return Err(ParseError::Usage("invite <participant>")),
        ("accept", p) => Command::Accept(p),
        ("decline", p) => Command::Decline(p),
        ("leave", None) => Command::Leave,
        ("roster", None) => Command::Roster,
        ("status", None) => Command::Status,
        ("help", None) => Command::Help,
        ("leave" | "roster" | "status" | "help", Some(_)) => {
            return Err(ParseError::Usage("this command takes no argument"))
        }
        (other, _) => return Err(ParseError::Unknown(other.to_owned())),
    };
    Ok(cmd)
}

pub const HELP: &str = "\
invite <participant>   ask someone to start a session
accept [participant]   accept a pending invite
decline [participant]  drop a pending invite
leave                  end the current session
roster                 list reachable participants
status                 show the current session";

/// Read commands from stdin until EOF.
pub async fn run_console(events: mpsc::UnboundedSender<HostEvent>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if line.trim().is_empty() {
            continue;
        }
        match parse(&line) {
            Ok(cmd) => {
                if events.send(HostEvent::Command(cmd)).is_err() {
                    return;
                }
            }
            Err(e) => eprintln!("{e}"),
        }
    }
}

/// One line for the user, or `None` for notices that only matter to logs.
pub fn describe(notice: &Notice) -> Option<String> {
    let line = match notice {
        Notice::RosterChanged => return None,
        Notice::InviteReceived(invite) => format!(
            "{} ({}) invites you; `accept {}` or `decline {}`",
            invite.display_name, invite.sender, invite.sender, invite.sender
        ),
        Notice::InviteAccepted { by } => format!("{by} accepted your invite"),
        Notice::SessionStarted {
            session_id,
            role,
            remote,
        } => {
            let side = match role {
                Role::Initiator => "calling",
                Role::Responder => "answering",
            };
            format!("session {session_id} with {remote}: {side}")
        }
        Notice::Connected { session_id } => format!("session {session_id}: connected"),
        Notice::SessionEnded { session_id, reason } => {
            format!("session {session_id} ended: {}", end_reason(reason))
        }
    };
    Some(line)
}

fn end_reason(reason: &EndReason) -> String {
    match reason {
        EndReason::LocalLeave => "you left".to_owned(),
        EndReason::RemoteLeave => "remote left".to_owned(),
        EndReason::PeerClosed => "connection closed".to_owned(),
        EndReason::PeerError(e) => format!("connection error: {e}"),
        EndReason::MediaDenied(e) => format!("no camera or microphone: {e}"),
    }
}
