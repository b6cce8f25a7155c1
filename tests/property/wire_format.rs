//! Property tests for the wire-level invariants the client relies on.
//!
//! 1. A timestamp rendered for the `since` query parses back to itself.
//! 2. Rendered timestamps parse back into the same relative order.
//! 3. Content validation is idempotent and never panics on arbitrary input.
//! 4. A message's `createdAt` survives the JSON boundary.

use guestchat_proto::message::*;
use proptest::prelude::*;

/// Millisecond timestamps between 1970 and 2200.
fn arb_timestamp() -> impl Strategy<Value = Timestamp> {
    (0i64..7_258_118_400_000).prop_map(Timestamp::from_millis)
}

fn arb_sender_type() -> impl Strategy<Value = SenderType> {
    prop_oneof![Just(SenderType::Guest), Just(SenderType::Admin)]
}

fn arb_message() -> impl Strategy<Value = Message> {
    (
        "[a-z0-9-]{1,36}",
        "[^\x00]{1,256}",
        arb_sender_type(),
        "[A-Za-z0-9 -]{3,50}",
        arb_timestamp(),
        any::<bool>(),
    )
        .prop_map(
            |(id, content, sender_type, sender_name, created_at, read)| Message {
                id: MessageId::new(id),
                content,
                sender_type,
                sender_name,
                created_at,
                read,
            },
        )
}

proptest! {
    #[test]
    fn since_parameter_parses_back(ts in arb_timestamp()) {
        let rendered = ts.to_string();
        let parsed = Timestamp::parse(&rendered).unwrap();
        prop_assert_eq!(parsed, ts);
    }

    #[test]
    fn rendered_timestamps_keep_order(a in arb_timestamp(), b in arb_timestamp()) {
        let pa = Timestamp::parse(&a.to_string()).unwrap();
        let pb = Timestamp::parse(&b.to_string()).unwrap();
        prop_assert_eq!(a.cmp(&b), pa.cmp(&pb));
    }

    #[test]
    fn validate_content_is_idempotent(input in "\\PC{0,300}") {
        if let Ok(first) = validate_content(&input) {
            prop_assert_eq!(validate_content(first), Ok(first));
            prop_assert!(!first.is_empty());
            prop_assert_eq!(first.trim(), first);
        }
    }

    #[test]
    fn created_at_survives_json(msg in arb_message()) {
        let json = serde_json::to_string(&msg).unwrap();
        let back: Message = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(back.created_at, msg.created_at);
        prop_assert_eq!(back.sender_type, msg.sender_type);
    }
}
