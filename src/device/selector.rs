// src/device/selector.rs

//! Element selectors.
//!
//! A [`Selector`] is a conjunction of optional criteria. An empty selector
//! matches every element, so constructors always set at least one field.

use std::fmt;

use regex::Regex;

use super::Element;

#[derive(Debug, Clone, Default)]
pub struct Selector {
    text: Option<String>,
    text_contains: Option<String>,
    text_matches: Option<Regex>,
    desc: Option<String>,
    desc_contains: Option<String>,
    resource_id: Option<String>,
    class_name: Option<String>,
}

impl Selector {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn text_contains(text: impl Into<String>) -> Self {
        Self {
            text_contains: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn text_matches(re: Regex) -> Self {
        Self {
            text_matches: Some(re),
            ..Default::default()
        }
    }

    pub fn desc(desc: impl Into<String>) -> Self {
        Self {
            desc: Some(desc.into()),
            ..Default::default()
        }
    }

    pub fn desc_contains(desc: impl Into<String>) -> Self {
        Self {
            desc_contains: Some(desc.into()),
            ..Default::default()
        }
    }

    pub fn resource_id(id: impl Into<String>) -> Self {
        Self {
            resource_id: Some(id.into()),
            ..Default::default()
        }
    }

    pub fn class_name(class: impl Into<String>) -> Self {
        Self {
            class_name: Some(class.into()),
            ..Default::default()
        }
    }

    /// Narrow an existing selector by text substring.
    pub fn and_text_contains(mut self, text: impl Into<String>) -> Self {
        self.text_contains = Some(text.into());
        self
    }

    /// Narrow an existing selector by exact text.
    pub fn and_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn and_class_name(mut self, class: impl Into<String>) -> Self {
        self.class_name = Some(class.into());
        self
    }

    pub fn matches(&self, element: &Element) -> bool {
        if let Some(ref t) = self.text {
            if element.text != *t {
                return false;
            }
        }
        if let Some(ref t) = self.text_contains {
            if !element.text.contains(t.as_str()) {
                return false;
            }
        }
        if let Some(ref re) = self.text_matches {
            if !re.is_match(&element.text) {
                return false;
            }
        }
        if let Some(ref d) = self.desc {
            if element.content_desc != *d {
                return false;
            }
        }
        if let Some(ref d) = self.desc_contains {
            if !element.content_desc.contains(d.as_str()) {
                return false;
            }
        }
        if let Some(ref id) = self.resource_id {
            if element.resource_id != *id {
                return false;
            }
        }
        if let Some(ref c) = self.class_name {
            if element.class_name != *c {
                return false;
            }
        }
        true
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(ref t) = self.text {
            parts.push(format!("text={t:?}"));
        }
        if let Some(ref t) = self.text_contains {
            parts.push(format!("textContains={t:?}"));
        }
        if let Some(ref re) = self.text_matches {
            parts.push(format!("textMatches={:?}", re.as_str()));
        }
        if let Some(ref d) = self.desc {
            parts.push(format!("desc={d:?}"));
        }
        if let Some(ref d) = self.desc_contains {
            parts.push(format!("descContains={d:?}"));
        }
        if let Some(ref id) = self.resource_id {
            parts.push(format!("resourceId={id:?}"));
        }
        if let Some(ref c) = self.class_name {
            parts.push(format!("className={c:?}"));
        }
        write!(f, "{}", parts.join(" "))
    }
}
