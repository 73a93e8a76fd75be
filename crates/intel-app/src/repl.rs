//! Terminal chat loop.

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use intel_chat::{ConversationOrchestrator, Session};
use intel_core::types::EvidenceRecord;
use intel_ui::evidence::render_terminal;

const HELP: &str = "\
Commands:
  /evidence   show the latest evidence table
  /reset      start a new session
  /help       show this help
  /quit       exit
Anything else is sent to the analyst.";

/// One line of user input, classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplInput {
    Quit,
    Reset,
    Evidence,
    Help,
    Empty,
    Message(String),
}

pub fn parse_input(line: &str) -> ReplInput {
    let trimmed = line.trim();
    match trimmed.to_ascii_lowercase().as_str() {
        "" => ReplInput::Empty,
        "/quit" | "/exit" | "/q" => ReplInput::Quit,
        "/reset" => ReplInput::Reset,
        "/evidence" | "/table" => ReplInput::Evidence,
        "/help" | "/?" => ReplInput::Help,
        _ => ReplInput::Message(trimmed.to_string()),
    }
}

/// Text printed after a turn. Fresh evidence is shown even when the turn
/// failed after its tool call had already stored it.
pub fn turn_output(
    reply: Result<String, String>,
    fresh_evidence: Option<&EvidenceRecord>,
) -> String {
    let mut out = match reply {
        Ok(text) => format!("\n{}\n", text),
        Err(message) => format!("error: {}\n", message),
    };
    if let Some(record) = fresh_evidence {
        out.push('\n');
        out.push_str(&render_terminal(Some(record)));
    }
    out
}

/// Read lines from stdin until EOF or `/quit`, running one turn per message.
pub async fn run(orchestrator: &ConversationOrchestrator) -> std::io::Result<()> {
    let mut session = Session::new();
    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    stdout
        .write_all(b"Partner Intelligence. Type /help for commands.\n> ")
        .await?;
    stdout.flush().await?;

    while let Some(line) = lines.next_line().await? {
        let output = match parse_input(&line) {
            ReplInput::Quit => break,
            ReplInput::Empty => String::new(),
            ReplInput::Help => format!("{}\n", HELP),
            ReplInput::Reset => {
                session.reset();
                format!("New session {}\n", session.id())
            }
            ReplInput::Evidence => render_terminal(session.evidence()),
            ReplInput::Message(text) => {
                stdout.write_all(b"... thinking\n").await?;
                stdout.flush().await?;
                let revision = session.evidence_revision();
                let reply = orchestrator
                    .handle_turn(&mut session, &text)
                    .await
                    .map(|outcome| outcome.reply.content)
                    .map_err(|e| e.user_message());
                let fresh = session
                    .evidence()
                    .filter(|_| session.evidence_revision() != revision);
                turn_output(reply, fresh)
            }
        };

        stdout.write_all(output.as_bytes()).await?;
        stdout.write_all(b"\n> ").await?;
        stdout.flush().await?;
    }

    stdout.write_all(b"\n").await?;
    stdout.flush().await
}
