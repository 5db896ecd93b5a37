//! Line-oriented operator console.
//!
//! Stands in for the chat-platform adapter: each line is either an operator
//! command or a simulated platform ban event.

use anyhow::{anyhow, bail, Result};
use banmesh_core::{NodeId, SubjectId};
use banmesh_sync::{BanEvent, OperatorCommand};

pub const HELP: &str = "\
commands:
  sync                              reconcile every node
  unban <subject> [reason...]       lift a ban everywhere
  ban <node> <subject> <reason...>  simulate a ban made on <node>
  bans <node>                       list bans held by <node>
  help                              show this text
  quit                              stop the node";

/// One parsed console line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Operator(OperatorCommand),
    Ban(BanEvent),
    Bans(NodeId),
    Help,
    Quit,
}

/// Parse a console line; blank lines yield `None`
pub fn parse(line: &str) -> Result<Option<ConsoleCommand>> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };

    let command = match verb.to_ascii_lowercase().as_str() {
        "sync" => ConsoleCommand::Operator(OperatorCommand::Sync),
        "unban" => {
            let subject = words.next().ok_or_else(|| anyhow!("usage: unban <subject> [reason]"))?;
            let reason = rest(words);
            ConsoleCommand::Operator(OperatorCommand::Unban {
                subject_id: SubjectId::new(subject),
                reason,
            })
        }
        "ban" => {
            let (Some(node), Some(subject)) = (words.next(), words.next()) else {
                bail!("usage: ban <node> <subject> <reason>");
            };
            ConsoleCommand::Ban(BanEvent {
                node: NodeId::new(node),
                subject: SubjectId::new(subject),
                reason: rest(words),
            })
        }
        "bans" => {
            let node = words.next().ok_or_else(|| anyhow!("usage: bans <node>"))?;
            ConsoleCommand::Bans(NodeId::new(node))
        }
        "help" | "?" => ConsoleCommand::Help,
        "quit" | "exit" => ConsoleCommand::Quit,
        other => bail!("unknown command '{other}', try 'help'"),
    };
    Ok(Some(command))
}

fn rest<'a>(words: impl Iterator<Item = &'a str>) -> Option<String> {
    let text = words.collect::<Vec<_>>().join(" ");
    (!text.is_empty()).then_some(text)
}
