//! Input line parsing.
//!
//! A line is either a key press, routed through the keyboard bus like a
//! browser keydown, or a console command that calls the controller
//! directly. Key lines may carry an `input:` prefix to simulate focus in a
//! text field.

use petri_control::dispatch::{Key, KeyEvent};
use petri_types::SimulationId;

use crate::error::ConsoleError;

/// Prefix marking a key press made while a text field has focus.
const TEXT_FOCUS_PREFIX: &str = "input:";

/// Usage text for `help`.
pub const USAGE: &str = "\
keys:      space | n | right | ctrl+r | ? (prefix with input: to type into a field)
commands:  create [NAME] [TARGET] | load ID | list | speed N | autosave on|off
           target N | save NAME [DESCRIPTION] | remote-reset | dismiss | status
           help | quit";

/// A console command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    /// Create a simulation.
    Create {
        /// Run name; the configured default when absent.
        name: Option<String>,
        /// Target generation.
        target: Option<u64>,
    },
    /// Load an existing simulation.
    Load(SimulationId),
    /// List simulations.
    List,
    /// Change the speed multiplier.
    Speed(i64),
    /// Toggle autosave.
    Autosave(bool),
    /// Change the target generation.
    Target(u64),
    /// Save a named snapshot.
    Save {
        /// Snapshot name.
        name: String,
        /// Free-form description.
        description: Option<String>,
    },
    /// Reset the simulation on the engine.
    RemoteReset,
    /// Clear the current error.
    Dismiss,
    /// Print the status block.
    Status,
    /// Print usage.
    Help,
    /// Leave.
    Quit,
}

/// One parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// Blank line.
    Empty,
    /// A key press for the keyboard bus.
    Key(KeyEvent),
    /// A direct controller command.
    Command(ConsoleCommand),
}

/// Parse one line of console input.
pub fn parse_line(line: &str) -> Result<Input, ConsoleError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(Input::Empty);
    }
    if let Some(rest) = line.strip_prefix(TEXT_FOCUS_PREFIX) {
        let event = parse_key(rest.trim())
            .ok_or_else(|| ConsoleError::usage(format!("unknown key '{}'", rest.trim())))?;
        return Ok(Input::Key(event.in_text_entry()));
    }
    if let Some(event) = parse_key(line) {
        return Ok(Input::Key(event));
    }
    parse_command(line).map(Input::Command)
}

fn parse_key(raw: &str) -> Option<KeyEvent> {
    let lower = raw.to_ascii_lowercase();
    let (ctrl, meta, name) = if let Some(name) = lower.strip_prefix("ctrl+") {
        (true, false, name)
    } else if let Some(name) = lower.strip_prefix("meta+") {
        (false, true, name)
    } else {
        (false, false, lower.as_str())
    };
    let key = match name {
        "space" | "spacebar" => Key::Space,
        "n" | "right" | "arrowright" | "r" | "?" => Key::parse(name),
        _ => return None,
    };
    if (ctrl || meta) && key != Key::R {
        return None;
    }
    let mut event = KeyEvent::new(key);
    if ctrl {
        event = event.with_ctrl();
    }
    if meta {
        event = event.with_meta();
    }
    Some(event)
}

fn parse_command(line: &str) -> Result<ConsoleCommand, ConsoleError> {
    let (word, rest) = line
        .split_once(char::is_whitespace)
        .map_or((line, ""), |(word, rest)| (word, rest.trim()));

    match word.to_ascii_lowercase().as_str() {
        "create" => Ok(parse_create(rest)),
        "load" => required(rest, "load ID").map(|id| ConsoleCommand::Load(SimulationId::new(id))),
        "list" => Ok(ConsoleCommand::List),
        "speed" => required(rest, "speed N")?
            .parse()
            .map(ConsoleCommand::Speed)
            .map_err(|err| ConsoleError::usage(format!("speed: {err}"))),
        "autosave" => match rest.to_ascii_lowercase().as_str() {
            "on" | "true" => Ok(ConsoleCommand::Autosave(true)),
            "off" | "false" => Ok(ConsoleCommand::Autosave(false)),
            _ => Err(ConsoleError::usage("usage: autosave on|off")),
        },
        "target" => required(rest, "target N")?
            .parse()
            .map(ConsoleCommand::Target)
            .map_err(|err| ConsoleError::usage(format!("target: {err}"))),
        "save" => {
            let rest = required(rest, "save NAME [DESCRIPTION]")?;
            let (name, description) = rest
                .split_once(char::is_whitespace)
                .map_or((rest, None), |(name, desc)| (name, Some(desc.trim().to_owned())));
            Ok(ConsoleCommand::Save {
                name: name.to_owned(),
                description,
            })
        }
        "remote-reset" => Ok(ConsoleCommand::RemoteReset),
        "dismiss" => Ok(ConsoleCommand::Dismiss),
        "status" => Ok(ConsoleCommand::Status),
        "help" => Ok(ConsoleCommand::Help),
        "quit" | "exit" => Ok(ConsoleCommand::Quit),
        other => Err(ConsoleError::usage(format!(
            "unknown command '{other}' (try 'help')"
        ))),
    }
}

/// `create [NAME...] [TARGET]`: a trailing integer is the target.
fn parse_create(rest: &str) -> ConsoleCommand {
    let (name, target) = match rest.rsplit_once(char::is_whitespace) {
        Some((name, last)) => match last.parse::<u64>() {
            Ok(target) => (name.trim(), Some(target)),
            Err(_) => (rest, None),
        },
        None => match rest.parse::<u64>() {
            Ok(target) => ("", Some(target)),
            Err(_) => (rest, None),
        },
    };
    ConsoleCommand::Create {
        name: (!name.is_empty()).then(|| name.to_owned()),
        target,
    }
}

fn required<'a>(rest: &'a str, usage: &str) -> Result<&'a str, ConsoleError> {
    if rest.is_empty() {
        Err(ConsoleError::usage(format!("usage: {usage}")))
    } else {
        Ok(rest)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn command(line: &str) -> ConsoleCommand {
        match parse_line(line).unwrap() {
            Input::Command(command) => Some(command),
            Input::Key(_) | Input::Empty => None,
        }
        .unwrap()
    }

    #[test]
    fn key_lines_become_key_events() {
        assert_eq!(parse_line("space").unwrap(), Input::Key(KeyEvent::new(Key::Space)));
        assert_eq!(parse_line("Right").unwrap(), Input::Key(KeyEvent::new(Key::ArrowRight)));
        assert_eq!(
            parse_line("ctrl+r").unwrap(),
            Input::Key(KeyEvent::new(Key::R).with_ctrl())
        );
        assert_eq!(
            parse_line("input: n").unwrap(),
            Input::Key(KeyEvent::new(Key::N).in_text_entry())
        );
    }

    #[test]
    fn modifiers_only_combine_with_r() {
        assert!(parse_line("ctrl+n").is_err());
    }

    #[test]
    fn create_takes_an_optional_trailing_target() {
        assert_eq!(
            command("create Long run name 50"),
            ConsoleCommand::Create {
                name: Some("Long run name".to_owned()),
                target: Some(50),
            }
        );
        assert_eq!(
            command("create 20"),
            ConsoleCommand::Create {
                name: None,
                target: Some(20),
            }
        );
        assert_eq!(
            command("create"),
            ConsoleCommand::Create {
                name: None,
                target: None,
            }
        );
    }

    #[test]
    fn save_splits_name_and_description() {
        assert_eq!(
            command("save checkpoint after the plateau"),
            ConsoleCommand::Save {
                name: "checkpoint".to_owned(),
                description: Some("after the plateau".to_owned()),
            }
        );
    }

    #[test]
    fn speed_keeps_out_of_range_values_for_the_controller() {
        assert_eq!(command("speed 11"), ConsoleCommand::Speed(11));
        assert!(parse_line("speed fast").is_err());
        assert!(parse_line("speed").is_err());
    }

    #[test]
    fn unknown_words_are_usage_errors() {
        assert!(matches!(
            parse_line("launch"),
            Err(ConsoleError::Usage { .. })
        ));
        assert_eq!(parse_line("   ").unwrap(), Input::Empty);
    }
}
