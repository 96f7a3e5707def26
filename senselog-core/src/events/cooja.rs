//! Cooja mote-output line parser.
//!
//! Accepts the two layouts Cooja writes mote output in:
//! - headless log listener: `<time>\tID:<n>\t<message>` with an integer clock
//! - GUI log listener export: `<mm>:<ss>.<mmm>\tID:<n>\t<message>`, converted
//!   to milliseconds (an hour segment `<hh>:<mm>:<ss>.<mmm>` is accepted too)
//!
//! Lines without tabs fall back to whitespace separation. The message is
//! kept verbatim apart from the line terminator.

use thiserror::Error;

use super::{LogEvent, NodeId};

const NODE_PREFIX: &str = "ID:";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("missing {0} field")]
    MissingField(&'static str),

    #[error("invalid time field '{0}'")]
    InvalidTime(String),

    #[error("invalid node field '{0}'")]
    InvalidNode(String),
}

/// Parses one line of mote output. Blank lines yield `Ok(None)`.
pub fn parse_line(line: &str) -> Result<Option<LogEvent>, ParseError> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() {
        return Ok(None);
    }

    let (time, node, message) = if is_tab_separated(line) {
        let mut fields = line.splitn(3, '\t');
        let time = fields.next().ok_or(ParseError::MissingField("time"))?;
        let node = fields.next().ok_or(ParseError::MissingField("node"))?;
        (time.trim(), node.trim(), fields.next().unwrap_or(""))
    } else {
        let (time, rest) = line
            .trim_start()
            .split_once(char::is_whitespace)
            .ok_or(ParseError::MissingField("node"))?;
        let rest = rest.trim_start();
        let (node, message) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
        (time, node, message)
    };

    Ok(Some(LogEvent {
        time: parse_time(time)?,
        source: parse_node(node)?,
        message: message.to_string(),
    }))
}

fn is_tab_separated(line: &str) -> bool {
    line.split_once('\t')
        .is_some_and(|(_, rest)| rest.trim_start().starts_with(NODE_PREFIX))
}

fn parse_node(raw: &str) -> Result<NodeId, ParseError> {
    raw.strip_prefix(NODE_PREFIX)
        .and_then(|id| id.parse::<u32>().ok())
        .map(NodeId)
        .ok_or_else(|| ParseError::InvalidNode(raw.to_string()))
}

fn parse_time(raw: &str) -> Result<u64, ParseError> {
    let invalid = || ParseError::InvalidTime(raw.to_string());

    if !raw.contains(':') {
        return raw.parse().map_err(|_| invalid());
    }

    let mut segments: Vec<&str> = raw.split(':').collect();
    let seconds = segments.pop().ok_or_else(invalid)?;

    let mut minutes: u64 = 0;
    for segment in segments {
        let value: u64 = segment.parse().map_err(|_| invalid())?;
        minutes = minutes
            .checked_mul(60)
            .and_then(|m| m.checked_add(value))
            .ok_or_else(invalid)?;
    }

    let (whole, fraction) = seconds.split_once('.').unwrap_or((seconds, ""));
    let whole: u64 = whole.parse().map_err(|_| invalid())?;
    if !fraction.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    // Millisecond resolution: pad or truncate the fraction to three digits.
    let millis = fraction
        .chars()
        .chain(std::iter::repeat('0'))
        .take(3)
        .fold(0u64, |acc, c| acc * 10 + u64::from(c as u8 - b'0'));

    minutes
        .checked_mul(60)
        .and_then(|s| s.checked_add(whole))
        .and_then(|s| s.checked_mul(1000))
        .and_then(|ms| ms.checked_add(millis))
        .ok_or_else(invalid)
}
