use std::time::Duration;

use downwatch_core::MonitorError;

pub const HELP: &str = "\
commands:
  interval <ms>   change the check interval (applies from the next wait)
  url <url>       change the monitored url
  start | stop | restart
  infos           print the current state
  quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCommand {
    Interval(Duration),
    Url(String),
    Start,
    Stop,
    Restart,
    Infos,
    Help,
    Quit,
}

/// Parses one line typed on stdin while watching. Blank lines yield `None`.
///
/// Only the shape of the command is checked here; value ranges are left to the
/// monitor so both paths report the same errors.
pub fn parse_command(line: &str) -> Result<Option<ControlCommand>, MonitorError> {
    let mut parts = line.split_whitespace();
    let Some(verb) = parts.next() else {
        return Ok(None);
    };
    let arg = parts.next();
    if let Some(extra) = parts.next() {
        return Err(MonitorError::InvalidArgument(format!(
            "unexpected argument {extra:?}"
        )));
    }

    let verb = verb.to_ascii_lowercase();
    let command = match verb.as_str() {
        "interval" => {
            let raw = arg.ok_or_else(|| {
                MonitorError::MissingArgument("interval needs a value in milliseconds".to_string())
            })?;
            let ms = raw.parse::<u64>().map_err(|_| {
                MonitorError::TypeMismatch(format!("interval {raw:?} is not a whole number"))
            })?;
            return Ok(Some(ControlCommand::Interval(Duration::from_millis(ms))));
        }
        "url" => {
            let url = arg
                .ok_or_else(|| MonitorError::MissingArgument("url needs a value".to_string()))?;
            return Ok(Some(ControlCommand::Url(url.to_string())));
        }
        "start" => ControlCommand::Start,
        "stop" => ControlCommand::Stop,
        "restart" => ControlCommand::Restart,
        "infos" | "info" => ControlCommand::Infos,
        "help" | "?" => ControlCommand::Help,
        "quit" | "exit" => ControlCommand::Quit,
        other => {
            return Err(MonitorError::InvalidArgument(format!(
                "unknown command {other:?}, try `help`"
            )))
        }
    };

    if let Some(arg) = arg {
        return Err(MonitorError::InvalidArgument(format!(
            "{verb} takes no argument, got {arg:?}"
        )));
    }

    Ok(Some(command))
}
