use crate::models::{EntryAction, EntryStatus};

/// One line typed by the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Refresh,
    List,
    Select(String),
    ClearSelection,
    Action(EntryAction),
    Filter(Vec<EntryStatus>),
    AutoRefresh(bool),
    Logout,
    Help,
    Empty,
}

pub const HELP: &str = "\
commands:
  refresh                 fetch the queue now
  list                    show visible entries
  select <id>             select an entry
  clear                   clear the selection
  delete|resume|suspend|abort|restart
                          act on the selected entry
  filter [status...]      show only these statuses (no args clears)
  auto on|off             toggle automatic refresh
  logout | quit           end the session";

pub fn parse(line: &str) -> Result<Command, String> {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Ok(Command::Empty);
    };
    let rest: Vec<&str> = words.collect();

    match head.to_ascii_lowercase().as_str() {
        "refresh" | "r" => Ok(Command::Refresh),
        "list" | "ls" => Ok(Command::List),
        "select" | "sel" => match rest.as_slice() {
            [id] => Ok(Command::Select((*id).to_string())),
            _ => Err("usage: select <id>".to_string()),
        },
        "clear" => Ok(Command::ClearSelection),
        "filter" => rest
            .iter()
            .map(|name| {
                EntryStatus::from_name(name).ok_or_else(|| format!("Unknown status: {name}"))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Command::Filter),
        "auto" => match rest.as_slice() {
            ["on"] => Ok(Command::AutoRefresh(true)),
            ["off"] => Ok(Command::AutoRefresh(false)),
            _ => Err("usage: auto on|off".to_string()),
        },
        "logout" | "quit" | "exit" => Ok(Command::Logout),
        "help" | "?" => Ok(Command::Help),
        other => EntryAction::from_name(other)
            .map(Command::Action)
            .ok_or_else(|| format!("Unknown command: {other} (try 'help')")),
    }
}
