//! Line commands for driving a headless surface from stdin.

use thiserror::Error;

use crate::model::{AspectRatio, Direction};
use crate::protocol::ControlCommand;

#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleInput {
    Control(ControlCommand),
    Scroll(f64),
    Resize(f64),
    Rollback,
    Search(String),
    Status,
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConsoleError {
    #[error("unknown command `{0}`")]
    Unknown(String),
    #[error("`{command}` expects {expected}")]
    BadArgument {
        command: &'static str,
        expected: &'static str,
    },
}

pub const HELP: &str = "commands: play | pause | speed <n> | direction forward|backward | font <px> | \
ratio 16:9|4:3 | flip on|off | load <id>|none | scroll <px> | resize <px> | rollback | \
search <text> | status | quit";

pub fn parse_line(line: &str) -> Result<Option<ConsoleInput>, ConsoleError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let input = match word.to_ascii_lowercase().as_str() {
        "play" => ConsoleInput::Control(ControlCommand::Play),
        "pause" => ConsoleInput::Control(ControlCommand::Pause),
        "speed" => ConsoleInput::Control(ControlCommand::SetSpeed(number("speed", rest)?)),
        "direction" => {
            let direction = match rest {
                "forward" => Direction::Forward,
                "backward" => Direction::Backward,
                _ => return Err(bad("direction", "forward or backward")),
            };
            ConsoleInput::Control(ControlCommand::SetDirection(direction))
        }
        "font" => {
            let size = rest
                .parse::<u32>()
                .map_err(|_| bad("font", "a whole number of pixels"))?;
            ConsoleInput::Control(ControlCommand::SetFontSize(size))
        }
        "ratio" => {
            let ratio = match rest {
                "16:9" => AspectRatio::Widescreen,
                "4:3" => AspectRatio::Standard,
                _ => return Err(bad("ratio", "16:9 or 4:3")),
            };
            ConsoleInput::Control(ControlCommand::SetAspectRatio(ratio))
        }
        "flip" => {
            let flipped = match rest {
                "on" | "true" => true,
                "off" | "false" => false,
                _ => return Err(bad("flip", "on or off")),
            };
            ConsoleInput::Control(ControlCommand::SetFlipped(flipped))
        }
        "load" => match rest {
            "" => return Err(bad("load", "a script id or `none`")),
            "none" => ConsoleInput::Control(ControlCommand::LoadScript(None)),
            id => ConsoleInput::Control(ControlCommand::LoadScript(Some(id.to_string()))),
        },
        "scroll" => ConsoleInput::Scroll(number("scroll", rest)?),
        "resize" => ConsoleInput::Resize(number("resize", rest)?),
        "rollback" => ConsoleInput::Rollback,
        "search" if !rest.is_empty() => ConsoleInput::Search(rest.to_string()),
        "search" => return Err(bad("search", "some text")),
        "status" => ConsoleInput::Status,
        "quit" | "exit" => ConsoleInput::Quit,
        other => return Err(ConsoleError::Unknown(other.to_string())),
    };
    Ok(Some(input))
}

fn number(command: &'static str, raw: &str) -> Result<f64, ConsoleError> {
    raw.parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or_else(|| bad(command, "a number"))
}

fn bad(command: &'static str, expected: &'static str) -> ConsoleError {
    ConsoleError::BadArgument { command, expected }
}
