//! SOAP 1.1 envelope encoding and decoding.
//!
//! Requests are written as literal XML: records become nested elements,
//! sequences become repeated `<item>` elements and absent values are left
//! out. Responses are read into a small element tree with `quick-xml` and
//! converted to `serde_json::Value`, using `xsi:type`, `xsi:nil` and array
//! markers to recover numbers, booleans, nulls and sequences.

use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde_json::{Map, Number, Value};

use super::error::{ApiError, Result};

/// Namespace of the MantisConnect procedures.
pub const MANTIS_NAMESPACE: &str = "http://futureware.biz/mantisconnect";

/// Prefix of the `SOAPAction` header value.
pub const SOAP_ACTION_BASE: &str = "http://www.mantisbt.org/bugs/api/soap/mantisconnect.php";

const ENVELOPE_NAMESPACE: &str = "http://schemas.xmlsoap.org/soap/envelope/";

/// Name of the element wrapping each sequence entry.
const ITEM: &str = "item";

/// Build the request envelope for a procedure call.
pub fn build_envelope(procedure: &str, args: &[(&str, Value)]) -> String {
    let mut body = String::new();
    for (name, value) in args {
        write_value(&mut body, name, value);
    }

    format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8"?>"#,
            r#"<soapenv:Envelope xmlns:soapenv="{envelope}" xmlns:man="{namespace}">"#,
            "<soapenv:Header/>",
            "<soapenv:Body><man:{procedure}>{body}</man:{procedure}></soapenv:Body>",
            "</soapenv:Envelope>"
        ),
        envelope = ENVELOPE_NAMESPACE,
        namespace = MANTIS_NAMESPACE,
        procedure = procedure,
        body = body,
    )
}

/// Value of the `SOAPAction` header for a procedure.
pub fn soap_action(procedure: &str) -> String {
    format!("\"{}/{}\"", SOAP_ACTION_BASE, procedure)
}

fn write_value(out: &mut String, name: &str, value: &Value) {
    match value {
        Value::Null => {}
        Value::Bool(b) => write_leaf(out, name, if *b { "true" } else { "false" }),
        Value::Number(n) => write_leaf(out, name, &n.to_string()),
        Value::String(s) => write_leaf(out, name, &escape(s.as_str())),
        Value::Array(items) => {
            out.push_str(&format!("<{}>", name));
            for item in items {
                write_value(out, ITEM, item);
            }
            out.push_str(&format!("</{}>", name));
        }
        Value::Object(fields) => {
            out.push_str(&format!("<{}>", name));
            for (key, field) in fields {
                write_value(out, key, field);
            }
            out.push_str(&format!("</{}>", name));
        }
    }
}

fn write_leaf(out: &mut String, name: &str, text: &str) {
    out.push_str(&format!("<{name}>{text}</{name}>"));
}

/// Decode a response envelope.
///
/// Returns the value of the single result element of the response, `Null`
/// for procedures without a result, or `ApiError::Protocol` when the body
/// carries a SOAP fault.
pub fn parse_response(xml: &str) -> Result<Value> {
    let root = parse_tree(xml)?;

    let body = root
        .child("Envelope")
        .and_then(|envelope| envelope.child("Body"))
        .ok_or_else(|| ApiError::InvalidResponse("missing SOAP envelope body".to_string()))?;

    let payload = body
        .children
        .first()
        .ok_or_else(|| ApiError::InvalidResponse("empty SOAP body".to_string()))?;

    if payload.name == "Fault" {
        let code = payload.child_text("faultcode").unwrap_or_default();
        let message = payload.child_text("faultstring").unwrap_or_default();
        return Err(ApiError::fault(code, message));
    }

    Ok(payload
        .children
        .first()
        .map(Node::to_value)
        .unwrap_or(Value::Null))
}

/// List the operation names declared by a WSDL document.
pub fn wsdl_operations(xml: &str) -> Result<Vec<String>> {
    let mut reader = Reader::from_str(xml);
    let mut operations: Vec<String> = Vec::new();

    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"operation" => {
                let node = Node::from_start(&e)?;
                if let Some(name) = node.attribute("name") {
                    if !operations.iter().any(|known| known == name) {
                        operations.push(name.to_string());
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(operations)
}

/// An element of a parsed document, with namespace prefixes dropped.
#[derive(Debug, Default)]
struct Node {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<Node>,
    text: String,
}

impl Node {
    fn from_start(start: &BytesStart<'_>) -> Result<Self> {
        let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
        let mut attributes = Vec::new();
        for attribute in start.attributes() {
            let attribute = attribute.map_err(xml_error)?;
            let key = String::from_utf8_lossy(attribute.key.local_name().as_ref()).into_owned();
            let value = attribute.unescape_value().map_err(xml_error)?.into_owned();
            attributes.push((key, value));
        }

        Ok(Self {
            name,
            attributes,
            ..Self::default()
        })
    }

    fn child(&self, name: &str) -> Option<&Node> {
        self.children.iter().find(|child| child.name == name)
    }

    fn child_text(&self, name: &str) -> Option<String> {
        self.child(name).map(|child| child.text.trim().to_string())
    }

    fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// The `xsi:type` without its namespace prefix.
    fn xsi_type(&self) -> Option<&str> {
        self.attribute("type")
            .map(|t| t.rsplit(':').next().unwrap_or(t))
    }

    fn is_nil(&self) -> bool {
        matches!(self.attribute("nil"), Some("true") | Some("1"))
    }

    fn is_array(&self) -> bool {
        self.attribute("arrayType").is_some()
            || self.xsi_type().is_some_and(|t| t.ends_with("Array"))
            || (!self.children.is_empty() && self.children.iter().all(|c| c.name == ITEM))
    }

    fn to_value(&self) -> Value {
        if self.is_nil() {
            return Value::Null;
        }

        if self.is_array() {
            return Value::Array(self.children.iter().map(Node::to_value).collect());
        }

        if self.children.is_empty() {
            return self.leaf_value();
        }

        let mut fields = Map::new();
        for child in &self.children {
            let value = child.to_value();
            match fields.get_mut(&child.name) {
                Some(Value::Array(existing)) => existing.push(value),
                Some(existing) => {
                    let first = existing.take();
                    *existing = Value::Array(vec![first, value]);
                }
                None => {
                    fields.insert(child.name.clone(), value);
                }
            }
        }
        Value::Object(fields)
    }

    fn leaf_value(&self) -> Value {
        let text = self.text.trim();
        match self.xsi_type() {
            Some("integer" | "int" | "long" | "short" | "byte" | "nonNegativeInteger"
                | "positiveInteger" | "unsignedInt" | "unsignedLong") => text
                .parse::<i64>()
                .map(Value::from)
                .unwrap_or_else(|_| Value::String(self.text.clone())),
            Some("float" | "double" | "decimal") => text
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number)
                .unwrap_or_else(|| Value::String(self.text.clone())),
            Some("boolean") => match text {
                "true" | "1" => Value::Bool(true),
                "false" | "0" => Value::Bool(false),
                _ => Value::String(self.text.clone()),
            },
            _ => Value::String(self.text.clone()),
        }
    }
}

fn parse_tree(xml: &str) -> Result<Node> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<Node> = vec![Node::default()];

    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Start(e) => stack.push(Node::from_start(&e)?),
            Event::Empty(e) => {
                let node = Node::from_start(&e)?;
                attach(&mut stack, node)?;
            }
            Event::End(_) => {
                let node = stack
                    .pop()
                    .ok_or_else(|| ApiError::InvalidResponse("unbalanced XML".to_string()))?;
                attach(&mut stack, node)?;
            }
            Event::Text(e) => {
                let text = e.unescape().map_err(xml_error)?;
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&text);
                }
            }
            Event::CData(e) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&String::from_utf8_lossy(&e.into_inner()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    match (stack.pop(), stack.is_empty()) {
        (Some(root), true) => Ok(root),
        _ => Err(ApiError::InvalidResponse(
            "truncated XML document".to_string(),
        )),
    }
}

fn attach(stack: &mut [Node], node: Node) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push(node);
            Ok(())
        }
        None => Err(ApiError::InvalidResponse("unbalanced XML".to_string())),
    }
}

fn xml_error(err: impl std::fmt::Display) -> ApiError {
    ApiError::InvalidResponse(format!("Malformed XML: {}", err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn envelope(body: &str) -> String {
        format!(
            concat!(
                r#"<?xml version="1.0" encoding="UTF-8"?>"#,
                r#"<SOAP-ENV:Envelope xmlns:SOAP-ENV="http://schemas.xmlsoap.org/soap/envelope/" "#,
                r#"xmlns:xsd="http://www.w3.org/2001/XMLSchema" "#,
                r#"xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" "#,
                r#"xmlns:SOAP-ENC="http://schemas.xmlsoap.org/soap/encoding/" "#,
                r#"xmlns:ns1="http://futureware.biz/mantisconnect">"#,
                "<SOAP-ENV:Body>{}</SOAP-ENV:Body></SOAP-ENV:Envelope>"
            ),
            body
        )
    }

    #[test]
    fn test_build_envelope_encodes_arguments_in_order() {
        let xml = build_envelope(
            "mc_issue_get",
            &[
                ("username", json!("alice")),
                ("password", json!("p<w>&")),
                ("issue_id", json!(42)),
            ],
        );

        assert!(xml.contains("<man:mc_issue_get><username>alice</username>"));
        assert!(xml.contains("<password>p&lt;w&gt;&amp;</password><issue_id>42</issue_id>"));
        assert!(xml.contains(MANTIS_NAMESPACE));
    }

    #[test]
    fn test_build_envelope_nested_records_and_sequences() {
        let xml = build_envelope(
            "mc_issue_add",
            &[(
                "issue",
                json!({
                    "project": {"name": "Website"},
                    "tags": [{"id": 1}, {"id": 2}],
                    "handler": null
                }),
            )],
        );

        assert!(xml.contains("<project><name>Website</name></project>"));
        assert!(xml.contains("<tags><item><id>1</id></item><item><id>2</id></item></tags>"));
        assert!(!xml.contains("handler"));
    }

    #[test]
    fn test_soap_action_header() {
        assert_eq!(
            soap_action("mc_version"),
            "\"http://www.mantisbt.org/bugs/api/soap/mantisconnect.php/mc_version\""
        );
    }

    #[test]
    fn test_parse_string_result() {
        let xml = envelope(
            r#"<ns1:mc_versionResponse><return xsi:type="xsd:string">1.2.19</return></ns1:mc_versionResponse>"#,
        );
        assert_eq!(parse_response(&xml).unwrap(), json!("1.2.19"));
    }

    #[test]
    fn test_parse_typed_scalars() {
        let xml = envelope(
            r#"<ns1:mc_issue_addResponse><return xsi:type="xsd:integer">17</return></ns1:mc_issue_addResponse>"#,
        );
        assert_eq!(parse_response(&xml).unwrap(), json!(17));

        let xml = envelope(
            r#"<ns1:mc_issue_deleteResponse><return xsi:type="xsd:boolean">true</return></ns1:mc_issue_deleteResponse>"#,
        );
        assert_eq!(parse_response(&xml).unwrap(), json!(true));
    }

    #[test]
    fn test_parse_record_and_array() {
        let xml = envelope(concat!(
            r#"<ns1:mc_enum_statusResponse>"#,
            r#"<return SOAP-ENC:arrayType="ns1:ObjectRef[2]" xsi:type="SOAP-ENC:Array">"#,
            r#"<item xsi:type="ns1:ObjectRef"><id xsi:type="xsd:integer">10</id><name xsi:type="xsd:string">new</name></item>"#,
            r#"<item xsi:type="ns1:ObjectRef"><id xsi:type="xsd:integer">80</id><name xsi:type="xsd:string">resolved</name></item>"#,
            r#"</return></ns1:mc_enum_statusResponse>"#
        ));

        assert_eq!(
            parse_response(&xml).unwrap(),
            json!([{"id": 10, "name": "new"}, {"id": 80, "name": "resolved"}])
        );
    }

    #[test]
    fn test_parse_empty_array_and_nil() {
        let xml = envelope(concat!(
            r#"<ns1:mc_issue_getResponse><return xsi:type="ns1:IssueData">"#,
            r#"<id xsi:type="xsd:integer">5</id>"#,
            r#"<notes SOAP-ENC:arrayType="ns1:IssueNoteData[0]" xsi:type="SOAP-ENC:Array"/>"#,
            r#"<handler xsi:nil="true"/>"#,
            r#"<summary>a &amp; b</summary>"#,
            r#"</return></ns1:mc_issue_getResponse>"#
        ));

        assert_eq!(
            parse_response(&xml).unwrap(),
            json!({"id": 5, "notes": [], "handler": null, "summary": "a & b"})
        );
    }

    #[test]
    fn test_parse_repeated_children_become_sequence() {
        let xml = envelope(concat!(
            r#"<ns1:mc_project_get_categoriesResponse><return>"#,
            r#"<category>General</category><category>UI</category>"#,
            r#"</return></ns1:mc_project_get_categoriesResponse>"#
        ));
        assert_eq!(
            parse_response(&xml).unwrap(),
            json!({"category": ["General", "UI"]})
        );
    }

    #[test]
    fn test_parse_fault() {
        let xml = envelope(concat!(
            "<SOAP-ENV:Fault><faultcode>SOAP-ENV:Client</faultcode>",
            "<faultstring>Access denied</faultstring></SOAP-ENV:Fault>"
        ));

        match parse_response(&xml) {
            Err(ApiError::Protocol { code, message }) => {
                assert_eq!(code, "SOAP-ENV:Client");
                assert_eq!(message, "Access denied");
            }
            other => panic!("Expected protocol fault, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_empty_response_element() {
        let xml = envelope("<ns1:mc_something_voidResponse/>");
        assert_eq!(parse_response(&xml).unwrap(), Value::Null);
    }

    #[test]
    fn test_parse_rejects_non_soap() {
        assert!(matches!(
            parse_response("<html><body>Not found</body></html>"),
            Err(ApiError::InvalidResponse(_))
        ));
        assert!(matches!(
            parse_response("<a><b></a>"),
            Err(ApiError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_wsdl_operations() {
        let wsdl = concat!(
            r#"<definitions xmlns="http://schemas.xmlsoap.org/wsdl/">"#,
            r#"<portType name="MantisConnectPortType">"#,
            r#"<operation name="mc_version"><input/></operation>"#,
            r#"<operation name="mc_login"><input/></operation>"#,
            r#"</portType><binding name="MantisConnectBinding">"#,
            r#"<operation name="mc_version"/>"#,
            r#"</binding></definitions>"#
        );

        assert_eq!(wsdl_operations(wsdl).unwrap(), vec!["mc_version", "mc_login"]);
        assert!(wsdl_operations("<definitions/>").unwrap().is_empty());
    }
}
