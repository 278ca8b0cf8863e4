use linecast_protocol::{
	Inbound, ParseError, chat_line, lag_notice, login_notice, logout_notice, parse_line, rename_reply, who_entry,
	who_header,
};

#[test]
fn who_requires_the_exact_token() {
	assert_eq!(parse_line("who"), Ok(Inbound::Who));

	assert_eq!(parse_line("who "), Ok(Inbound::Chat("who ")));
	assert_eq!(parse_line(" who"), Ok(Inbound::Chat(" who")));
	assert_eq!(parse_line("whoa"), Ok(Inbound::Chat("whoa")));
	assert_eq!(parse_line("Who"), Ok(Inbound::Chat("Who")));
}

#[test]
fn rename_takes_the_second_segment_only() {
	assert_eq!(parse_line("rename|Bob"), Ok(Inbound::Rename { new_name: "Bob" }));

	assert_eq!(parse_line("rename|a|b"), Ok(Inbound::Rename { new_name: "a" }));
}

#[test]
fn rename_without_a_name_is_rejected() {
	assert_eq!(parse_line("rename"), Err(ParseError::MissingRenameName));
	assert_eq!(parse_line("rename|"), Err(ParseError::MissingRenameName));
}

#[test]
fn rename_prefix_must_be_the_first_segment() {
	assert_eq!(parse_line("renamed|x"), Ok(Inbound::Chat("renamed|x")));
	assert_eq!(parse_line(" rename|x"), Ok(Inbound::Chat(" rename|x")));
}

#[test]
fn empty_line_is_not_a_chat_message() {
	assert_eq!(parse_line(""), Err(ParseError::Empty));
}

#[test]
fn pipes_in_chat_text_do_not_confuse_classification() {
	assert_eq!(parse_line("a|b"), Ok(Inbound::Chat("a|b")));
	assert_eq!(parse_line("|rename|x"), Ok(Inbound::Chat("|rename|x")));
}

#[test]
fn chat_line_prefixes_the_sender() {
	assert_eq!(chat_line("alice", "hello"), "[alice]: hello");
	assert_eq!(chat_line("127.0.0.1:9000", ""), "[127.0.0.1:9000]: ");
}

#[test]
fn system_notices_use_the_chat_prefix_form() {
	assert_eq!(login_notice("127.0.0.1:9000"), "[127.0.0.1:9000]: LOGIN(SYSTEM)");
	assert_eq!(logout_notice("127.0.0.1:9000"), "[127.0.0.1:9000]: LOGOUT(SYSTEM)");
}

#[test]
fn who_listing_marks_the_caller() {
	assert_eq!(who_header(2), "2 users are online:");
	assert_eq!(who_entry("127.0.0.1:9000", "alice", false), "127.0.0.1:9000:alice");
	assert_eq!(who_entry("127.0.0.1:9001", "bob", true), "127.0.0.1:9001:bob(myself)");
}

#[test]
fn rename_reply_echoes_the_new_name() {
	assert_eq!(rename_reply("Al"), "you have renamed to Al");
}

#[test]
fn lag_notice_reports_the_drop_count() {
	assert_eq!(lag_notice(3), "*** 3 line(s) dropped while you were lagging");
}
