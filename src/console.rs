//! Console command parsing
//!
//! ```text
//! <message>,<address>   send one message
//! msi,<address>         send the canned batch
//! status                print counters and session state
//! exit                  quit
//! ```

use crate::contracts::NodeAddress;
use crate::errors::{DacapError, Result};
use crate::receiver::parse_address;

/// Operator command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Send `message` to `destination`
    Send {
        message: String,
        destination: NodeAddress,
    },
    /// Send the canned batch to `destination`
    Batch { destination: NodeAddress },
    /// Report counters and state
    Status,
    /// Leave the client
    Exit,
}

/// Usage hint printed on bad input
pub const USAGE: &str = "Use: message,<address> or msi,<address> (status, exit)";

/// Parse one console line
///
/// # Errors
/// `InvalidCommand` when the line has no destination or the destination
/// reads as 0.
pub fn parse_command(line: &str) -> Result<Command> {
    let line = line.trim();
    if line.eq_ignore_ascii_case("exit") {
        return Ok(Command::Exit);
    }
    if line.eq_ignore_ascii_case("status") {
        return Ok(Command::Status);
    }

    let mut tokens = line.split(',').filter(|token| !token.is_empty());
    let (Some(word), Some(destination)) = (tokens.next(), tokens.next()) else {
        return Err(DacapError::InvalidCommand(format!(
            "invalid command format. {}",
            USAGE
        )));
    };

    let destination = parse_address(destination);
    if destination == 0 {
        return Err(DacapError::InvalidCommand(
            "invalid destination address".to_string(),
        ));
    }

    if word.eq_ignore_ascii_case("msi") {
        Ok(Command::Batch { destination })
    } else {
        Ok(Command::Send {
            message: word.to_string(),
            destination,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_send() {
        assert_eq!(
            parse_command("hello,5").unwrap(),
            Command::Send { message: "hello".to_string(), destination: 5 }
        );
        assert_eq!(
            parse_command("hello world,12\r\n").unwrap(),
            Command::Send { message: "hello world".to_string(), destination: 12 }
        );
    }

    #[test]
    fn test_parse_batch_and_keywords() {
        assert_eq!(parse_command("MSI,3").unwrap(), Command::Batch { destination: 3 });
        assert_eq!(parse_command("Exit").unwrap(), Command::Exit);
        assert_eq!(parse_command("  status ").unwrap(), Command::Status);
    }

    #[test]
    fn test_parse_skips_empty_tokens() {
        assert_eq!(
            parse_command(",hi,,4,extra").unwrap(),
            Command::Send { message: "hi".to_string(), destination: 4 }
        );
    }

    #[test]
    fn test_parse_rejects_missing_or_zero_destination() {
        assert!(matches!(parse_command("hello"), Err(DacapError::InvalidCommand(_))));
        assert!(matches!(parse_command(""), Err(DacapError::InvalidCommand(_))));
        assert!(matches!(parse_command("hello,abc"), Err(DacapError::InvalidCommand(_))));
        assert!(matches!(parse_command("hello,0"), Err(DacapError::InvalidCommand(_))));
    }

    #[test]
    fn test_parse_negative_destination_left_to_session() {
        // Non-zero, so the console accepts it; the session rejects it
        assert_eq!(
            parse_command("hello,-2").unwrap(),
            Command::Send { message: "hello".to_string(), destination: -2 }
        );
    }
}
