//! Decoding of upstream frame payloads into action envelopes.

use serde_json::{Map, Value};

use crate::envelope::{ActionDetails, ActionEvent, StreamEnvelope};
use crate::error::DecodeError;

/// Value of the `type` field on upstream messages that carry an event.
const EVENT_MESSAGE_TYPE: &str = "event";

/// Turn a frame's `data` into an action envelope.
///
/// The payload must be a JSON object with `"type": "event"` and an `event`
/// record. Anything else is rejected; callers log and drop it.
pub fn decode_action_event(data: &str) -> Result<StreamEnvelope, DecodeError> {
    let value: Value = serde_json::from_str(data)?;
    let Value::Object(mut object) = value else {
        return Err(DecodeError::NotAnObject);
    };

    let kind = object.get("type").and_then(Value::as_str);
    if kind != Some(EVENT_MESSAGE_TYPE) {
        return Err(DecodeError::NotAnEvent {
            kind: kind.map(str::to_string),
        });
    }

    let event = match object.remove("event") {
        Some(Value::Null) | None => {
            return Err(DecodeError::NotAnEvent {
                kind: Some(EVENT_MESSAGE_TYPE.to_string()),
            });
        }
        Some(raw) => serde_json::from_value::<ActionEvent>(raw)
            .map_err(|e| DecodeError::MalformedEvent(e.to_string()))?,
    };

    let details = ActionDetails {
        message: object
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string),
        ticket: take_present(&mut object, "ticket"),
        draft: take_present(&mut object, "draft"),
        feedback: take_present(&mut object, "feedback"),
    };

    Ok(StreamEnvelope::action(event, details))
}

fn take_present(object: &mut Map<String, Value>, key: &str) -> Option<Value> {
    object.remove(key).filter(|v| !v.is_null())
}
