#![forbid(unsafe_code)]

pub mod line;

pub use line::{
	Inbound, ParseError, chat_line, lag_notice, login_notice, logout_notice, parse_line, rename_error_reply,
	rename_reply, who_entry, who_header,
};
