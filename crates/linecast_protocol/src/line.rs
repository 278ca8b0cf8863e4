#![forbid(unsafe_code)]

use thiserror::Error;

/// The literal token that requests an online listing.
pub const WHO_TOKEN: &str = "who";

/// First `|`-segment of a rename request.
pub const RENAME_TOKEN: &str = "rename";

/// Classified inbound line. Borrows from the raw line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inbound<'a> {
	/// `who` — exactly the 3-byte token, nothing else.
	Who,

	/// `rename|<new_name>` — the new name is the second `|`-segment only,
	/// so `rename|a|b` renames to `a`.
	Rename {
		new_name: &'a str,
	},

	/// Anything else non-empty is a chat message.
	Chat(&'a str),
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
	#[error("empty line")]
	Empty,

	#[error("rename requires a non-empty name, e.g. rename|alice")]
	MissingRenameName,
}

/// Classify one inbound line (newline already stripped).
///
/// The `who` match is exact: trailing or leading bytes make it a chat line.
/// A line whose first `|`-segment is `rename` is always a rename request,
/// even when the name segment is missing; that case is rejected rather than
/// falling through to chat.
pub fn parse_line(line: &str) -> Result<Inbound<'_>, ParseError> {
	if line.is_empty() {
		return Err(ParseError::Empty);
	}

	if line == WHO_TOKEN {
		return Ok(Inbound::Who);
	}

	let mut segments = line.split('|');
	if segments.next() == Some(RENAME_TOKEN) {
		let new_name = segments.next().unwrap_or("");
		if new_name.is_empty() {
			return Err(ParseError::MissingRenameName);
		}
		return Ok(Inbound::Rename { new_name });
	}

	Ok(Inbound::Chat(line))
}

/// `[<name>]: <text>` — the broadcast form of a chat line.
pub fn chat_line(name: &str, text: &str) -> String {
	format!("[{name}]: {text}")
}

/// System notice broadcast when a session joins.
pub fn login_notice(id: &str) -> String {
	chat_line(id, "LOGIN(SYSTEM)")
}

/// System notice broadcast when a session leaves or is evicted.
pub fn logout_notice(id: &str) -> String {
	chat_line(id, "LOGOUT(SYSTEM)")
}

/// First line of a `who` reply.
pub fn who_header(online: usize) -> String {
	format!("{online} users are online:")
}

/// One entry of a `who` reply; the caller's own entry is marked.
pub fn who_entry(addr: &str, display_name: &str, myself: bool) -> String {
	if myself {
		format!("{addr}:{display_name}(myself)")
	} else {
		format!("{addr}:{display_name}")
	}
}

/// Local confirmation reply for a successful rename.
pub fn rename_reply(new_name: &str) -> String {
	format!("you have renamed to {new_name}")
}

/// Local error reply for a rename with a missing name segment.
pub fn rename_error_reply() -> String {
	"rename requires a name, e.g. rename|alice".to_string()
}

/// Local notice flushed to a session after lines were dropped because its
/// outbox was full.
pub fn lag_notice(dropped: u64) -> String {
	format!("*** {dropped} line(s) dropped while you were lagging")
}
