use shared::{domain::Item, error::ErrorCode, protocol::RequestOrigin};
use tokio::sync::mpsc;

use super::*;

fn line(raw: &str) -> Message {
    Message::from_line(raw).expect("valid line")
}

#[test]
fn parses_each_request_word() {
    assert_eq!(parse_request(&line("t1 dump")), Ok(RequestBody::Dump));
    assert_eq!(parse_request(&line("t1 NEXT")), Ok(RequestBody::Next));
    assert_eq!(
        parse_request(&line("t1 sel 2 abc")),
        Ok(RequestBody::SetSelect {
            index: 2,
            hash: ItemHash::new("abc"),
        })
    );
    assert_eq!(
        parse_request(&line("t1 automode shuffle")),
        Ok(RequestBody::SetAutoMode {
            auto_mode: AutoMode::Shuffle,
        })
    );
}

#[test]
fn rejects_malformed_requests() {
    assert_eq!(
        parse_request(&line("t1 explode")),
        Err(ParseError::UnknownWord("explode".to_string()))
    );
    assert_eq!(
        parse_request(&line("t1 sel 2")),
        Err(ParseError::BadArity {
            word: RQ_SELECT,
            expected: 2,
            actual: 1,
        })
    );
    assert_eq!(
        parse_request(&line("t1 sel -3 abc")),
        Err(ParseError::BadIndex("-3".to_string()))
    );
    assert!(matches!(
        parse_request(&line("t1 automode sideways")),
        Err(ParseError::BadAutoMode(_))
    ));
    assert!(matches!(
        parse_request(&line("t1 dump now")),
        Err(ParseError::BadArity { word: RQ_DUMP, .. })
    ));
}

#[test]
fn parse_error_reply_echoes_tag_with_what() {
    let message = line("t7 explode");
    let error = parse_request(&message).expect_err("unknown");
    let reply = parse_error_reply(&message, &error);
    assert_eq!(reply.tag, "t7");
    assert_eq!(reply.word, RS_ACK);
    assert_eq!(reply.args[0], ErrorCode::What.as_word());
}

#[test]
fn broadcasts_use_broadcast_tag() {
    let selection = Selection {
        index: 1,
        hash: ItemHash::new("h1"),
    };
    let messages = emit_response(&Response::broadcast(ResponseBody::Select(Some(selection))));
    assert_eq!(messages, vec![Message::broadcast(RS_SELECT).arg("1").arg("h1")]);

    let messages = emit_response(&Response::broadcast(ResponseBody::Select(None)));
    assert_eq!(messages[0].pack(), "! SELECT -1 -");

    let messages = emit_response(&Response::broadcast(ResponseBody::AutoMode(AutoMode::Drop)));
    assert_eq!(messages[0].pack(), "! AUTOMODE drop");
}

#[test]
fn unicast_echoes_request_tag() {
    let (reply_tx, _reply_rx) = mpsc::channel(1);
    let origin = RequestOrigin {
        message: Some(line("abc sel 0 x")),
        reply_tx,
    };
    let ok = emit_response(&Response::ok(&origin, "sel"));
    assert_eq!(ok[0].pack(), "abc ACK OK sel");

    let fail = emit_response(&Response::error(&origin, AckError::fail("stale hash")));
    assert_eq!(fail[0].pack(), "abc ACK FAIL 'stale hash'");
}

#[test]
fn dump_expands_to_one_message_per_item() {
    let snapshot = ListSnapshot {
        auto_mode: AutoMode::Next,
        items: vec![
            Item {
                hash: ItemHash::new("h0"),
                payload: "first song".to_string(),
            },
            Item {
                hash: ItemHash::new("h1"),
                payload: "second".to_string(),
            },
        ],
        selection: Some(Selection {
            index: 0,
            hash: ItemHash::new("h0"),
        }),
    };
    let (reply_tx, _reply_rx) = mpsc::channel(1);
    let origin = RequestOrigin {
        message: Some(line("d1 dump")),
        reply_tx,
    };
    let packed: Vec<String> = emit_response(&Response::unicast(&origin, ResponseBody::Dump(snapshot)))
        .iter()
        .map(Message::pack)
        .collect();
    assert_eq!(
        packed,
        vec![
            "d1 AUTOMODE next",
            "d1 COUNT 2",
            "d1 ITEM 0 h0 'first song'",
            "d1 ITEM 1 h1 second",
            "d1 SELECT 0 h0",
        ]
    );
}

#[test]
fn greeting_announces_protocol_and_role() {
    let [ohai, iama] = greeting("1.2.3");
    assert_eq!(ohai.pack(), format!("! OHAI {PROTOCOL_VERSION} 1.2.3"));
    assert_eq!(iama.pack(), "! IAMA list");
}

#[test]
#[cfg(debug_assertions)]
#[should_panic(expected = "no originating message")]
fn unicast_without_originating_message_is_refused() {
    let (reply_tx, _reply_rx) = mpsc::channel(1);
    let origin = RequestOrigin {
        message: None,
        reply_tx,
    };
    emit_response(&Response::ok(&origin, "next"));
}

#[test]
fn multi_line_payloads_render_as_single_lines() {
    let snapshot = ListSnapshot {
        auto_mode: AutoMode::Off,
        items: vec![Item {
            hash: ItemHash::new("h0"),
            payload: "verse\nchorus".to_string(),
        }],
        selection: None,
    };
    let (reply_tx, _reply_rx) = mpsc::channel(1);
    let origin = RequestOrigin {
        message: Some(line("d1 dump")),
        reply_tx,
    };
    let item = &emit_response(&Response::unicast(&origin, ResponseBody::Dump(snapshot)))[2];
    let packed = item.pack();
    assert_eq!(packed, r#"d1 ITEM 0 h0 "verse\nchorus""#);
    assert_eq!(&line(&packed), item);
}
