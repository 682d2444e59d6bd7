//! Tabular XML (historicdata.xml and friends) to a JSON document.
//!
//! Elements become objects keyed by child name; a name seen more than once
//! under the same parent becomes an array in document order. Attributes are
//! string fields. An element carrying attributes or children keeps its text
//! under `text`; a bare leaf element becomes its trimmed text.

use crate::prtg::error::{PrtgError, Result};
use serde_json::{Map, Value};
use xml::reader::{EventReader, XmlEvent};

struct Frame {
    name: String,
    fields: Map<String, Value>,
    text: String,
}

impl Frame {
    fn finish(self) -> (String, Value) {
        let text = self.text.trim();
        if self.fields.is_empty() {
            return (self.name, Value::String(text.to_string()));
        }

        let mut fields = self.fields;
        if !text.is_empty() {
            fields.insert("text".to_string(), Value::String(text.to_string()));
        }
        (self.name, Value::Object(fields))
    }
}

fn insert_child(fields: &mut Map<String, Value>, name: String, value: Value) {
    match fields.get_mut(&name) {
        Some(Value::Array(items)) => items.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
        None => {
            fields.insert(name, value);
        }
    }
}

/// Parses `body` into `{ "<root>": { ... } }`.
pub fn to_document(body: &str) -> Result<Value> {
    let reader = EventReader::from_str(body);
    let mut stack: Vec<Frame> = Vec::new();
    let mut root: Option<(String, Value)> = None;

    for event in reader {
        let event = event.map_err(|e| PrtgError::decode(format!("invalid XML: {}", e)))?;
        match event {
            XmlEvent::StartElement {
                name, attributes, ..
            } => {
                let mut fields = Map::new();
                for attribute in attributes {
                    fields.insert(attribute.name.local_name, Value::String(attribute.value));
                }
                stack.push(Frame {
                    name: name.local_name,
                    fields,
                    text: String::new(),
                });
            }
            XmlEvent::Characters(text) | XmlEvent::CData(text) => {
                if let Some(frame) = stack.last_mut() {
                    frame.text.push_str(&text);
                }
            }
            XmlEvent::EndElement { .. } => {
                let frame = stack
                    .pop()
                    .ok_or_else(|| PrtgError::decode("unbalanced XML element"))?;
                let (name, value) = frame.finish();
                match stack.last_mut() {
                    Some(parent) => insert_child(&mut parent.fields, name, value),
                    None => root = Some((name, value)),
                }
            }
            _ => {}
        }
    }

    let (name, value) = root.ok_or_else(|| PrtgError::decode("XML document has no root element"))?;
    let mut document = Map::new();
    document.insert(name, value);
    Ok(Value::Object(document))
}

/// Returns the value as a list: arrays as-is, anything else as a single element.
pub fn as_list(value: &Value) -> Vec<&Value> {
    match value {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    }
}
