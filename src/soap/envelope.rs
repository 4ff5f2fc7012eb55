use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::NsReader;
use serde_json::{Map, Number, Value};
use thiserror::Error;

use super::channel::{Fault, Param};

const SOAP_ENV_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";
const SOAP_ENCODING: &str = "http://schemas.xmlsoap.org/soap/encoding/";
const XSD_NS: &str = "http://www.w3.org/2001/XMLSchema";
const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";

/// Element name used for the members of an encoded sequence.
pub const ITEM: &str = "item";

/// Reasons a response body could not be turned into a payload or fault.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed XML: {0}")]
    Xml(String),
    #[error("response has no SOAP envelope body")]
    MissingBody,
    #[error("SOAP body is empty")]
    EmptyBody,
}

/// Builds the SOAP 1.1 RPC request envelope for `operation`.
///
/// Every parameter is emitted in order, tagged with `xsi:type` set to its
/// declared type tag. The `ns1` prefix is bound to `namespace`, so tags such as
/// `ns1:Report` resolve against the service schema.
pub fn encode_request(namespace: &str, operation: &str, params: &[Param]) -> String {
    let mut body = String::new();
    for param in params {
        write_element(&mut body, param.name, Some(param.type_tag), &param.value);
    }

    format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8"?>"#,
            r#"<SOAP-ENV:Envelope xmlns:SOAP-ENV="{env}" xmlns:xsd="{xsd}" xmlns:xsi="{xsi}" "#,
            r#"xmlns:ns1="{ns}" SOAP-ENV:encodingStyle="{enc}">"#,
            r#"<SOAP-ENV:Body><ns1:{op}>{body}</ns1:{op}></SOAP-ENV:Body></SOAP-ENV:Envelope>"#,
        ),
        env = SOAP_ENV_NS,
        xsd = XSD_NS,
        xsi = XSI_NS,
        ns = escape(namespace),
        enc = SOAP_ENCODING,
        op = operation,
        body = body,
    )
}

fn write_element(out: &mut String, name: &str, type_tag: Option<&str>, value: &Value) {
    let type_attr = type_tag
        .map(|tag| format!(r#" xsi:type="{tag}""#))
        .unwrap_or_default();

    match value {
        Value::Null => out.push_str(&format!(r#"<{name}{type_attr} xsi:nil="true"/>"#)),
        Value::Object(fields) => {
            out.push_str(&format!("<{name}{type_attr}>"));
            for (field, field_value) in fields {
                write_element(out, field, None, field_value);
            }
            out.push_str(&format!("</{name}>"));
        }
        Value::Array(items) => {
            out.push_str(&format!("<{name}{type_attr}>"));
            for item in items {
                write_element(out, ITEM, None, item);
            }
            out.push_str(&format!("</{name}>"));
        }
        Value::String(text) => {
            out.push_str(&format!("<{name}{type_attr}>{}</{name}>", escape(text.as_str())))
        }
        Value::Number(number) => out.push_str(&format!("<{name}{type_attr}>{number}</{name}>")),
        Value::Bool(flag) => out.push_str(&format!("<{name}{type_attr}>{flag}</{name}>")),
    }
}

/// A parsed XML element, with namespaces reduced to local names.
#[derive(Debug, Default)]
struct Element {
    name: String,
    xsi_type: Option<String>,
    nil: bool,
    text: String,
    children: Vec<Element>,
}

impl Element {
    /// Reads the element name plus its `xsi:type` and `xsi:nil` attributes.
    ///
    /// Attributes only count when their prefix resolves to the XSI namespace.
    fn from_start(
        reader: &NsReader<&[u8]>,
        start: &BytesStart<'_>,
    ) -> Result<Self, DecodeError> {
        let mut element = Element {
            name: String::from_utf8_lossy(start.local_name().as_ref()).into_owned(),
            ..Default::default()
        };

        for attribute in start.attributes() {
            let attribute = attribute.map_err(|e| DecodeError::Xml(e.to_string()))?;
            let value = attribute
                .unescape_value()
                .map_err(|e| DecodeError::Xml(e.to_string()))?;
            let (namespace, local_name) = reader.resolve_attribute(attribute.key);
            let is_xsi = matches!(
                namespace,
                ResolveResult::Bound(Namespace(uri)) if uri == XSI_NS.as_bytes()
            );
            if !is_xsi {
                continue;
            }
            match local_name.as_ref() {
                b"type" => element.xsi_type = Some(local_part(&value).to_string()),
                b"nil" => element.nil = matches!(&*value, "true" | "1"),
                _ => {}
            }
        }

        Ok(element)
    }

    fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|child| child.name == name)
    }

    fn child_text(&self, name: &str) -> String {
        self.child(name)
            .map(|child| child.text.clone())
            .unwrap_or_default()
    }
}

fn local_part(qualified: &str) -> &str {
    qualified
        .rsplit_once(':')
        .map_or(qualified, |(_, local)| local)
}

/// Text is kept exactly as sent; whitespace between child elements is
/// collected too but ignored, since only leaves become scalars.
fn parse_tree(xml: &str) -> Result<Element, DecodeError> {
    let mut reader = NsReader::from_str(xml);

    let mut stack: Vec<Element> = Vec::new();
    let mut root = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| DecodeError::Xml(e.to_string()))?;
        match event {
            Event::Start(start) => stack.push(Element::from_start(&reader, &start)?),
            Event::Empty(start) => {
                let element = Element::from_start(&reader, &start)?;
                attach(&mut stack, &mut root, element);
            }
            Event::Text(text) => {
                let text = text.unescape().map_err(|e| DecodeError::Xml(e.to_string()))?;
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&text);
                }
            }
            Event::CData(data) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&String::from_utf8_lossy(&data));
                }
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| DecodeError::Xml("unbalanced end tag".to_string()))?;
                attach(&mut stack, &mut root, element);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(DecodeError::Xml("unexpected end of document".to_string()));
    }
    root.ok_or(DecodeError::MissingBody)
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None => *root = Some(element),
    }
}

/// Converts an element into a value tree.
///
/// Repeated sibling names become arrays; a lone child stays a single value.
fn to_value(element: Element) -> Value {
    if element.nil {
        return Value::Null;
    }
    if element.children.is_empty() {
        return typed_scalar(element.xsi_type.as_deref(), element.text);
    }

    let mut fields = Map::new();
    for child in element.children {
        let name = child.name.clone();
        let value = to_value(child);
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
    Value::Object(fields)
}

fn typed_scalar(xsi_type: Option<&str>, text: String) -> Value {
    let trimmed = text.trim();
    match xsi_type {
        Some(
            "int" | "long" | "short" | "byte" | "integer" | "unsignedInt" | "unsignedLong"
            | "unsignedShort",
        ) => trimmed
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or(Value::String(text)),
        Some("double" | "float" | "decimal") => trimmed
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::String(text)),
        Some("boolean") => match trimmed {
            "true" | "1" => Value::Bool(true),
            "false" | "0" => Value::Bool(false),
            _ => Value::String(text),
        },
        _ => Value::String(text),
    }
}

/// Decodes a SOAP response envelope.
///
/// The outer `Result` reports an undecodable document; the inner one carries
/// the service's answer, either the payload (the first part inside the
/// `<operation>Response` wrapper, `Null` when there is none) or a fault.
pub fn decode_response(xml: &str) -> Result<Result<Value, Fault>, DecodeError> {
    let envelope = parse_tree(xml)?;
    let body = envelope
        .children
        .into_iter()
        .find(|child| child.name == "Body")
        .ok_or(DecodeError::MissingBody)?;
    let first = body.children.into_iter().next().ok_or(DecodeError::EmptyBody)?;

    if first.name == "Fault" {
        return Ok(Err(decode_fault(first)));
    }

    Ok(Ok(first
        .children
        .into_iter()
        .next()
        .map_or(Value::Null, to_value)))
}

fn decode_fault(fault: Element) -> Fault {
    let code = fault.child_text("faultcode");
    let message = fault.child_text("faultstring");
    let detail = match fault.children.into_iter().find(|child| child.name == "detail") {
        Some(detail) if detail.children.is_empty() => detail.text,
        Some(detail) => to_value(detail).to_string(),
        None => String::new(),
    };
    Fault {
        code,
        message,
        detail,
    }
}
