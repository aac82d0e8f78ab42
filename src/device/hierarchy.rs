// src/device/hierarchy.rs

//! `uiautomator dump` parsing and page signatures.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader as XmlReader;

use crate::device::{Bounds, Element};
use crate::errors::{BotError, Result};

/// Content hash of a visible page.
///
/// Two captures with the same signature mean a swipe did not move the
/// content, i.e. the scroll boundary was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageSignature([u8; 32]);

impl PageSignature {
    pub fn of_bytes(bytes: &[u8]) -> Self {
        Self(*blake3::hash(bytes).as_bytes())
    }

    /// Hash over the fields that change when content scrolls.
    pub fn of_elements(elements: &[Element]) -> Self {
        let mut hasher = blake3::Hasher::new();
        for e in elements {
            hasher.update(e.text.as_bytes());
            hasher.update(&[0]);
            hasher.update(e.content_desc.as_bytes());
            hasher.update(&[0]);
            hasher.update(e.resource_id.as_bytes());
            hasher.update(&[0]);
            for v in [e.bounds.left, e.bounds.top, e.bounds.right, e.bounds.bottom] {
                hasher.update(&v.to_le_bytes());
            }
        }
        Self(*hasher.finalize().as_bytes())
    }
}

/// Parse a `uiautomator` XML dump into a flat list of elements.
pub fn parse_hierarchy(xml: &[u8]) -> Result<Vec<Element>> {
    let mut reader = XmlReader::from_reader(xml);
    reader.config_mut().trim_text(true);

    let mut out = Vec::new();
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                if e.name().as_ref() == b"node" {
                    out.push(element_from_node(&e)?);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(BotError::DeviceError(format!(
                    "failed parsing hierarchy XML at {}: {}",
                    reader.buffer_position(),
                    e
                )))
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(out)
}

fn element_from_node(node: &BytesStart<'_>) -> Result<Element> {
    let mut element = Element::default();

    for attr in node.attributes() {
        let attr = attr.map_err(|e| {
            BotError::DeviceError(format!("malformed hierarchy attribute: {e}"))
        })?;
        let value = attr
            .unescape_value()
            .map_err(|e| BotError::DeviceError(format!("hierarchy attribute decode: {e}")))?;

        match attr.key.as_ref() {
            b"text" => element.text = value.into_owned(),
            b"content-desc" => element.content_desc = value.into_owned(),
            b"resource-id" => element.resource_id = value.into_owned(),
            b"class" => element.class_name = value.into_owned(),
            b"clickable" => element.clickable = value == "true",
            b"bounds" => {
                if let Some(b) = parse_bounds(&value) {
                    element.bounds = b;
                }
            }
            _ => {}
        }
    }

    Ok(element)
}

/// Parse `"[l,t][r,b]"`.
pub fn parse_bounds(s: &str) -> Option<Bounds> {
    let nums: Vec<i32> = s
        .split(|c| c == '[' || c == ']' || c == ',')
        .filter(|p| !p.is_empty())
        .map(|p| p.trim().parse::<i32>())
        .collect::<std::result::Result<_, _>>()
        .ok()?;

    match nums.as_slice() {
        [l, t, r, b] => Some(Bounds::new(*l, *t, *r, *b)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DUMP: &str = r#"<?xml version='1.0' encoding='UTF-8' standalone='yes' ?>
<hierarchy rotation="0">
  <node index="0" text="" resource-id="" class="android.widget.FrameLayout" content-desc="" clickable="false" bounds="[0,0][504,955]">
    <node index="0" text="发布一条空间说说" resource-id="" class="android.widget.TextView" content-desc="" clickable="false" bounds="[30,400][260,440]" />
    <node index="1" text="已完成" resource-id="" class="android.widget.TextView" content-desc="" clickable="true" bounds="[400,405][470,435]" />
    <node index="2" text="" resource-id="com.tencent.mobileqq:id/conversation_head" class="android.widget.ImageView" content-desc="帐户及设置" clickable="true" bounds="[10,40][70,100]" />
  </node>
</hierarchy>"#;

    #[test]
    fn parses_nested_and_self_closing_nodes() {
        let elements = parse_hierarchy(DUMP.as_bytes()).unwrap();
        assert_eq!(elements.len(), 4);

        assert_eq!(elements[1].text, "发布一条空间说说");
        assert_eq!(elements[1].bounds, Bounds::new(30, 400, 260, 440));

        assert!(elements[2].clickable);
        assert_eq!(elements[3].content_desc, "帐户及设置");
        assert_eq!(
            elements[3].resource_id,
            "com.tencent.mobileqq:id/conversation_head"
        );
    }

    #[test]
    fn unescapes_entities() {
        let xml = r#"<hierarchy><node text="A &amp; B" bounds="[0,0][1,1]"/></hierarchy>"#;
        let elements = parse_hierarchy(xml.as_bytes()).unwrap();
        assert_eq!(elements[0].text, "A & B");
    }

    #[test]
    fn bounds_parsing_rejects_garbage() {
        assert_eq!(parse_bounds("[1,2][3,4]"), Some(Bounds::new(1, 2, 3, 4)));
        assert_eq!(parse_bounds("[1,2][3]"), None);
        assert_eq!(parse_bounds("nope"), None);
    }

    #[test]
    fn signature_changes_with_content() {
        let a = vec![Element::with_text("x", Bounds::new(0, 0, 1, 1))];
        let b = vec![Element::with_text("x", Bounds::new(0, 10, 1, 11))];
        assert_eq!(PageSignature::of_elements(&a), PageSignature::of_elements(&a));
        assert_ne!(PageSignature::of_elements(&a), PageSignature::of_elements(&b));
    }
}
