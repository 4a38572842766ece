use super::*;

#[test]
fn splits_plain_words() {
    let words = tokenise("t1  sel 1\tabc").expect("tokenise");
    assert_eq!(words, vec!["t1", "sel", "1", "abc"]);
}

#[test]
fn single_quotes_are_literal() {
    let words = tokenise(r"t1 ITEM 'a \ b' x").expect("tokenise");
    assert_eq!(words, vec!["t1", "ITEM", r"a \ b", "x"]);
}

#[test]
fn double_quotes_allow_escapes() {
    let words = tokenise(r#"t1 ITEM "say \"hi\"" x"#).expect("tokenise");
    assert_eq!(words, vec!["t1", "ITEM", r#"say "hi""#, "x"]);
}

#[test]
fn empty_quotes_make_an_empty_word() {
    let words = tokenise("t1 ITEM '' x").expect("tokenise");
    assert_eq!(words, vec!["t1", "ITEM", "", "x"]);
}

#[test]
fn tolerates_carriage_return() {
    let message = Message::from_line("t1 dump\r").expect("message");
    assert_eq!(message, Message::new("t1", "dump"));
}

#[test]
fn rejects_unterminated_quotes_and_backslashes() {
    assert_eq!(
        tokenise("t1 sel 'oops"),
        Err(WireError::UnterminatedQuote('\''))
    );
    assert_eq!(tokenise("t1 sel \"oops"), Err(WireError::UnterminatedQuote('"')));
    assert_eq!(tokenise("t1 sel \\"), Err(WireError::TrailingBackslash));
}

#[test]
fn message_needs_tag_and_word() {
    assert_eq!(Message::from_line(""), Err(WireError::TooFewWords(0)));
    assert_eq!(Message::from_line("dump"), Err(WireError::TooFewWords(1)));
}

#[test]
fn pack_quotes_only_when_needed() {
    let message = Message::broadcast("ITEM")
        .arg("0")
        .arg("two words")
        .arg("it's")
        .arg("");
    assert_eq!(message.pack(), r#"! ITEM 0 'two words' "it's" ''"#);
    assert!(message.is_broadcast());
}

#[test]
fn packed_awkward_words_tokenise_back() {
    let message = Message::new("t9", "ITEM")
        .arg(r#"back\slash "and" 'quotes'"#)
        .arg("tab\there");
    let parsed = Message::from_line(&message.pack()).expect("reparse");
    assert_eq!(parsed, message);
}

#[test]
fn line_terminators_in_words_stay_on_one_line() {
    let message = Message::new("t1", "ITEM")
        .arg("0")
        .arg("h")
        .arg("line one\nline two\r");
    let packed = message.pack();
    assert_eq!(packed, r#"t1 ITEM 0 h "line one\nline two\r""#);
    assert!(!packed.contains(&['\n', '\r'][..]));
    assert_eq!(Message::from_line(&packed).expect("reparse"), message);
}

#[test]
fn newline_escapes_apply_only_inside_double_quotes() {
    let words = tokenise(r#"t1 ITEM "a\nb" 'a\nb' a\nb"#).expect("tokenise");
    assert_eq!(words, vec!["t1", "ITEM", "a\nb", r"a\nb", "anb"]);
}
