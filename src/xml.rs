//! XML response bodies to structured values.
//!
//! The mapping is deliberately loose: attributes are dropped, tag names get
//! their first character lower-cased, text-only elements become strings and
//! an element repeated under the same parent becomes an array. A single
//! occurrence is never wrapped, so readers go through [`sequence`].

use quick_xml::events::Event;
use quick_xml::Reader;
use serde_json::{Map, Value as JsonValue};

const BOM: char = '\u{feff}';

struct Frame {
    name: String,
    children: Map<String, JsonValue>,
    text: String,
}

impl Frame {
    fn new(raw_name: &[u8]) -> Result<Self, String> {
        let name = std::str::from_utf8(raw_name)
            .map_err(|err| format!("invalid tag name: {err}"))?;
        Ok(Self {
            name: first_char_lowercase(name),
            children: Map::new(),
            text: String::new(),
        })
    }

    fn into_value(self) -> (String, JsonValue) {
        let value = if self.children.is_empty() {
            JsonValue::String(self.text)
        } else {
            JsonValue::Object(self.children)
        };
        (self.name, value)
    }
}

/// Returns true when `body` is an XML document (optionally BOM-prefixed).
pub fn is_xml_document(body: &str) -> bool {
    body.trim_start_matches(BOM).starts_with("<?xml")
}

/// Parses an XML document into `{ rootName: value }`.
pub fn parse_document(xml: &str) -> Result<JsonValue, String> {
    let mut reader = Reader::from_str(xml.trim_start_matches(BOM));
    reader.trim_text(true);

    let mut stack: Vec<Frame> = Vec::new();
    let mut root: Option<(String, JsonValue)> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|err| format!("at position {}: {err}", reader.buffer_position()))?;

        match event {
            Event::Start(start) => {
                if root.is_some() {
                    return Err("multiple root elements".to_owned());
                }
                stack.push(Frame::new(start.name().as_ref())?);
            }
            Event::Empty(start) => {
                if root.is_some() {
                    return Err("multiple root elements".to_owned());
                }
                let frame = Frame::new(start.name().as_ref())?;
                close_frame(frame, &mut stack, &mut root);
            }
            Event::End(_) => {
                let frame = stack
                    .pop()
                    .ok_or_else(|| "closing tag without opening tag".to_owned())?;
                close_frame(frame, &mut stack, &mut root);
            }
            Event::Text(text) => {
                let text = text.unescape().map_err(|err| err.to_string())?;
                match stack.last_mut() {
                    Some(frame) => frame.text.push_str(&text),
                    None => return Err("text outside of root element".to_owned()),
                }
            }
            Event::CData(data) => {
                let data = data.into_inner();
                let text = std::str::from_utf8(&data).map_err(|err| err.to_string())?;
                if let Some(frame) = stack.last_mut() {
                    frame.text.push_str(text);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(format!("unclosed element '{}'", open.name));
    }
    let (name, value) = root.ok_or_else(|| "document has no root element".to_owned())?;

    let mut document = Map::new();
    document.insert(name, value);
    Ok(JsonValue::Object(document))
}

fn close_frame(frame: Frame, stack: &mut [Frame], root: &mut Option<(String, JsonValue)>) {
    let (name, value) = frame.into_value();
    match stack.last_mut() {
        Some(parent) => append_child(&mut parent.children, name, value),
        None => *root = Some((name, value)),
    }
}

fn append_child(children: &mut Map<String, JsonValue>, name: String, value: JsonValue) {
    match children.get_mut(&name) {
        Some(JsonValue::Array(items)) => items.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = JsonValue::Array(vec![first, value]);
        }
        None => {
            children.insert(name, value);
        }
    }
}

/// Views an element that may occur zero, one or many times as a slice-like
/// sequence.
pub fn sequence(value: Option<&JsonValue>) -> Vec<&JsonValue> {
    match value {
        None | Some(JsonValue::Null) => Vec::new(),
        Some(JsonValue::String(text)) if text.is_empty() => Vec::new(),
        Some(JsonValue::Array(items)) => items.iter().collect(),
        Some(other) => vec![other],
    }
}

/// Returns the text of a leaf element, treating an empty element as absent.
pub fn text(value: Option<&JsonValue>) -> Option<&str> {
    match value {
        Some(JsonValue::String(text)) if !text.is_empty() => Some(text.as_str()),
        _ => None,
    }
}

fn first_char_lowercase(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}
