//! Query-protocol XML decoding.
//!
//! EC2 answers in XML. Responses are turned into `serde_json::Value` trees so
//! records can be handled as untyped nested containers:
//!
//! - an element whose children are all `<item>` becomes an array
//! - an element with text only becomes a scalar (`true`/`false` and canonical
//!   integers are typed, everything else stays a string)
//! - identifier elements (`*Id`) always stay strings
//! - an empty element becomes `null`
//! - repeated child names are gathered into an array
//! - element names are PascalCased, with a few renames so records read like
//!   the documented `DescribeInstances` output

use std::collections::HashSet;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde_json::{Map, Number, Value};

use crate::error::InventoryError;

/// Wire element names whose field name is not a plain PascalCase conversion.
///
/// The first entry is the owning list (nearest enclosing element other than
/// `<item>`); `None` applies anywhere. Scoped entries win.
const RENAMES: &[(Option<&str>, &str, &str)] = &[
    (Some("instancesSet"), "groupSet", "SecurityGroups"),
    (Some("instancesSet"), "reason", "StateTransitionReason"),
    (Some("instancesSet"), "ipAddress", "PublicIpAddress"),
    (Some("instancesSet"), "dnsName", "PublicDnsName"),
    (None, "reservationSet", "Reservations"),
    (None, "instancesSet", "Instances"),
    (None, "tagSet", "Tags"),
    (None, "groupSet", "Groups"),
    (None, "networkInterfaceSet", "NetworkInterfaces"),
    (None, "instanceState", "State"),
    (None, "blockDeviceMapping", "BlockDeviceMappings"),
];

/// Decode an XML document into `{ RootName: value }`.
///
/// # Errors
///
/// Returns `InventoryError::Xml` for malformed or truncated documents.
pub fn decode(xml: &str) -> Result<Value, InventoryError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Start(start) => {
                let element = element_name(&start)?;
                let value = read_element(&mut reader, &element, None)?;
                let mut root = Map::new();
                root.insert(field_name(&element), value);
                return Ok(Value::Object(root));
            }
            Event::Empty(start) => {
                let mut root = Map::new();
                root.insert(field_name(&element_name(&start)?), Value::Null);
                return Ok(Value::Object(root));
            }
            Event::Eof => return Err(InventoryError::Xml("no root element".to_string())),
            _ => {}
        }
    }
}

/// Read the content of `element`, whose start tag was just consumed.
///
/// `owner` is the nearest enclosing element that is not an `<item>`.
fn read_element(
    reader: &mut Reader<&[u8]>,
    element: &str,
    owner: Option<&str>,
) -> Result<Value, InventoryError> {
    let child_owner = if element == "item" {
        owner
    } else {
        Some(element)
    };
    let mut children: Vec<(String, Value)> = Vec::new();
    let mut text = String::new();

    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Start(start) => {
                let name = element_name(&start)?;
                let value = read_element(reader, &name, child_owner)?;
                children.push((name, value));
            }
            Event::Empty(start) => children.push((element_name(&start)?, Value::Null)),
            Event::Text(t) => text.push_str(&t.unescape().map_err(xml_error)?),
            Event::CData(c) => text.push_str(&String::from_utf8_lossy(&c.into_inner())),
            Event::End(_) => break,
            Event::Eof => {
                return Err(InventoryError::Xml("unexpected end of document".to_string()))
            }
            _ => {}
        }
    }

    if children.is_empty() {
        return Ok(if text.is_empty() {
            Value::Null
        } else if is_identifier(element) {
            Value::String(text)
        } else {
            scalar(text)
        });
    }
    Ok(assemble(children, child_owner))
}

fn assemble(children: Vec<(String, Value)>, owner: Option<&str>) -> Value {
    if children.iter().all(|(name, _)| name == "item") {
        return Value::Array(children.into_iter().map(|(_, value)| value).collect());
    }

    let mut map = Map::new();
    let mut repeated: HashSet<String> = HashSet::new();
    for (name, value) in children {
        let key = scoped_field_name(owner, &name);
        match map.get_mut(&key) {
            None => {
                map.insert(key, value);
            }
            Some(Value::Array(items)) if repeated.contains(&key) => items.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
                repeated.insert(key);
            }
        }
    }
    Value::Object(map)
}

/// Account, resource and request identifiers, e.g. `ownerId`.
fn is_identifier(element: &str) -> bool {
    element.ends_with("Id")
}

fn scalar(text: String) -> Value {
    match text.as_str() {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }
    if is_canonical_integer(&text) {
        if let Ok(n) = text.parse::<i64>() {
            return Value::Number(Number::from(n));
        }
    }
    Value::String(text)
}

/// `0`, `42`, `-7`; not `007`, `+1`, `-0` or `1e3`.
fn is_canonical_integer(text: &str) -> bool {
    let digits = text.strip_prefix('-').unwrap_or(text);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    if digits.len() > 1 && digits.starts_with('0') {
        return false;
    }
    !(text.starts_with('-') && digits == "0")
}

/// Field name for a wire element name, ignoring where it appears.
pub fn field_name(element: &str) -> String {
    scoped_field_name(None, element)
}

/// Field name for `element` inside the list element `owner`.
pub fn scoped_field_name(owner: Option<&str>, element: &str) -> String {
    let renamed = RENAMES
        .iter()
        .find(|(scope, wire, _)| scope.is_some() && *scope == owner && *wire == element)
        .or_else(|| {
            RENAMES
                .iter()
                .find(|(scope, wire, _)| scope.is_none() && *wire == element)
        });
    if let Some((_, _, field)) = renamed {
        return field.to_string();
    }
    let base = element
        .strip_suffix("Set")
        .filter(|base| !base.is_empty())
        .unwrap_or(element);
    let mut chars = base.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn element_name(start: &BytesStart<'_>) -> Result<String, InventoryError> {
    std::str::from_utf8(start.local_name().as_ref())
        .map(str::to_string)
        .map_err(|e| InventoryError::Xml(e.to_string()))
}

fn xml_error(err: impl std::fmt::Display) -> InventoryError {
    InventoryError::Xml(err.to_string())
}
