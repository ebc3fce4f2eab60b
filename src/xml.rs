//! Minimal XML document model for the service template formats
//!
//! Templates are written with [`XmlBuilder`] and read back into an
//! [`XmlElement`] tree built on a `quick_xml` event reader. Element and
//! attribute names are matched on their local part only.

use crate::template::TemplateSerializationError;
use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::time::Duration;

/// Namespace of the `i:` instance attributes (`i:nil`, `i:type`)
pub(crate) const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";

#[derive(Debug, Clone, Default)]
pub(crate) struct XmlElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlElement>,
    pub text: String,
}

impl XmlElement {
    /// Parse a document and return its root element
    pub fn parse(xml: &str) -> Result<Self, TemplateSerializationError> {
        let mut reader = Reader::from_str(xml);
        let mut stack: Vec<XmlElement> = Vec::new();
        let mut root = None;

        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) => {
                    stack.push(Self::open(&e)?);
                }
                Ok(Event::Empty(e)) => {
                    let element = Self::open(&e)?;
                    Self::attach(&mut stack, &mut root, element)?;
                }
                Ok(Event::End(_)) => {
                    let element = stack.pop().ok_or_else(|| {
                        TemplateSerializationError::MalformedXml("unbalanced end tag".to_string())
                    })?;
                    Self::attach(&mut stack, &mut root, element)?;
                }
                Ok(Event::Text(e)) => {
                    if let Some(current) = stack.last_mut() {
                        let text = e
                            .unescape()
                            .map_err(|e| TemplateSerializationError::MalformedXml(e.to_string()))?;
                        current.text.push_str(&text);
                    }
                }
                Ok(Event::CData(e)) => {
                    if let Some(current) = stack.last_mut() {
                        current
                            .text
                            .push_str(&String::from_utf8_lossy(&e.into_inner()));
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(TemplateSerializationError::MalformedXml(e.to_string())),
                _ => {}
            }
        }

        if !stack.is_empty() {
            return Err(TemplateSerializationError::MalformedXml(
                "unexpected end of document".to_string(),
            ));
        }
        root.ok_or_else(|| TemplateSerializationError::MalformedXml("empty document".to_string()))
    }

    fn open(e: &quick_xml::events::BytesStart<'_>) -> Result<Self, TemplateSerializationError> {
        let mut element = XmlElement {
            name: String::from_utf8_lossy(e.local_name().as_ref()).into_owned(),
            ..Default::default()
        };
        for attr in e.attributes() {
            let attr = attr.map_err(|e| TemplateSerializationError::MalformedXml(e.to_string()))?;
            let value = attr
                .unescape_value()
                .map_err(|e| TemplateSerializationError::MalformedXml(e.to_string()))?;
            element.attributes.push((
                String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned(),
                value.into_owned(),
            ));
        }
        Ok(element)
    }

    fn attach(
        stack: &mut [XmlElement],
        root: &mut Option<XmlElement>,
        element: XmlElement,
    ) -> Result<(), TemplateSerializationError> {
        match stack.last_mut() {
            Some(parent) => parent.children.push(element),
            None if root.is_none() => *root = Some(element),
            None => {
                return Err(TemplateSerializationError::MalformedXml(
                    "multiple root elements".to_string(),
                ))
            }
        }
        Ok(())
    }

    /// Fail unless this element has the expected local name
    pub fn expect_name(&self, name: &str) -> Result<(), TemplateSerializationError> {
        if self.name == name {
            Ok(())
        } else {
            Err(TemplateSerializationError::UnexpectedElement {
                expected: name.to_string(),
                found: self.name.clone(),
            })
        }
    }

    pub fn attribute(&self, local_name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(name, _)| name == local_name)
            .map(|(_, value)| value.as_str())
    }

    /// `i:nil="true"`
    pub fn is_nil(&self) -> bool {
        self.attribute("nil") == Some("true")
    }

    /// Character content exactly as written
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Character content with surrounding whitespace removed, for typed values
    pub fn value(&self) -> &str {
        self.text.trim()
    }

    /// First child with the given name that is not nil
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children
            .iter()
            .find(|child| child.name == name && !child.is_nil())
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> {
        self.children.iter().filter(move |child| child.name == name)
    }

    pub fn require_child(&self, name: &str) -> Result<&XmlElement, TemplateSerializationError> {
        self.child(name)
            .ok_or_else(|| TemplateSerializationError::MissingElement(name.to_string()))
    }

    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name).map(|child| child.text())
    }

    pub fn require_text(&self, name: &str) -> Result<&str, TemplateSerializationError> {
        self.require_child(name).map(|child| child.text())
    }

    pub fn child_value(&self, name: &str) -> Option<&str> {
        self.child(name).map(|child| child.value())
    }

    pub fn require_value(&self, name: &str) -> Result<&str, TemplateSerializationError> {
        self.require_child(name).map(|child| child.value())
    }

    pub fn child_bool(&self, name: &str) -> Result<Option<bool>, TemplateSerializationError> {
        self.child_value(name)
            .map(|text| parse_bool(name, text))
            .transpose()
    }

    pub fn child_u32(&self, name: &str) -> Result<Option<u32>, TemplateSerializationError> {
        self.child_value(name)
            .map(|text| text.parse::<u32>().map_err(|_| invalid_value(name, text)))
            .transpose()
    }

    pub fn child_duration(
        &self,
        name: &str,
    ) -> Result<Option<Duration>, TemplateSerializationError> {
        self.child_value(name)
            .map(|text| parse_duration(name, text))
            .transpose()
    }
}

/// Append-only XML text writer
#[derive(Debug, Default)]
pub(crate) struct XmlBuilder {
    out: String,
}

impl XmlBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&mut self, name: &str, attributes: &[(&str, &str)]) -> &mut Self {
        self.out.push('<');
        self.out.push_str(name);
        self.push_attributes(attributes);
        self.out.push('>');
        self
    }

    pub fn close(&mut self, name: &str) -> &mut Self {
        self.out.push_str("</");
        self.out.push_str(name);
        self.out.push('>');
        self
    }

    pub fn empty(&mut self, name: &str, attributes: &[(&str, &str)]) -> &mut Self {
        self.out.push('<');
        self.out.push_str(name);
        self.push_attributes(attributes);
        self.out.push_str(" />");
        self
    }

    pub fn nil(&mut self, name: &str) -> &mut Self {
        self.empty(name, &[("i:nil", "true")])
    }

    pub fn text(&mut self, name: &str, value: &str) -> &mut Self {
        self.out.push('<');
        self.out.push_str(name);
        self.out.push('>');
        self.out.push_str(&escape(value));
        self.close(name)
    }

    pub fn optional_text(&mut self, name: &str, value: Option<&str>) -> &mut Self {
        match value {
            Some(value) => self.text(name, value),
            None => self,
        }
    }

    pub fn bool(&mut self, name: &str, value: bool) -> &mut Self {
        self.text(name, if value { "true" } else { "false" })
    }

    pub fn finish(self) -> String {
        self.out
    }

    fn push_attributes(&mut self, attributes: &[(&str, &str)]) {
        for (key, value) in attributes {
            self.out.push(' ');
            self.out.push_str(key);
            self.out.push_str("=\"");
            self.out.push_str(&escape(*value));
            self.out.push('"');
        }
    }
}

pub(crate) fn invalid_value(field: &str, value: &str) -> TemplateSerializationError {
    TemplateSerializationError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
    }
}

fn parse_bool(field: &str, text: &str) -> Result<bool, TemplateSerializationError> {
    match text {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        other => Err(invalid_value(field, other)),
    }
}

/// Format a duration as an `xs:duration`, e.g. `P1DT2H3M4S`
pub(crate) fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    let (days, rem) = (total / 86_400, total % 86_400);
    let (hours, rem) = (rem / 3_600, rem % 3_600);
    let (minutes, seconds) = (rem / 60, rem % 60);
    let nanos = duration.subsec_nanos();

    let mut out = String::from("P");
    if days > 0 {
        out.push_str(&format!("{days}D"));
    }
    let has_time = hours > 0 || minutes > 0 || seconds > 0 || nanos > 0 || days == 0;
    if has_time {
        out.push('T');
        if hours > 0 {
            out.push_str(&format!("{hours}H"));
        }
        if minutes > 0 {
            out.push_str(&format!("{minutes}M"));
        }
        if seconds > 0 || nanos > 0 || (hours == 0 && minutes == 0) {
            if nanos > 0 {
                let fraction = format!("{nanos:09}");
                out.push_str(&format!("{seconds}.{}S", fraction.trim_end_matches('0')));
            } else {
                out.push_str(&format!("{seconds}S"));
            }
        }
    }
    out
}

/// Parse the day/time subset of `xs:duration`
///
/// Designators must appear at most once and in `D`, `H`, `M`, `S` order.
pub(crate) fn parse_duration(
    field: &str,
    text: &str,
) -> Result<Duration, TemplateSerializationError> {
    let invalid = || invalid_value(field, text);
    let body = text.strip_prefix('P').ok_or_else(invalid)?;
    let (date_part, time_part) = match body.split_once('T') {
        Some((date, time)) => (date, Some(time)),
        None => (body, None),
    };

    let mut secs: u64 = 0;
    let mut nanos: u32 = 0;
    // Rank of the last designator read: D = 1, H = 2, M = 3, S = 4
    let mut last = 0u8;

    let mut number = String::new();
    for c in date_part.chars() {
        match c {
            '0'..='9' => number.push(c),
            'D' if last == 0 => {
                let days = take_number(&mut number).ok_or_else(invalid)?;
                secs = add_scaled(secs, days, 86_400).ok_or_else(invalid)?;
                last = 1;
            }
            _ => return Err(invalid()),
        }
    }
    if !number.is_empty() {
        return Err(invalid());
    }

    if let Some(time) = time_part {
        if time.is_empty() {
            return Err(invalid());
        }
        for c in time.chars() {
            let (rank, scale) = match c {
                '0'..='9' | '.' => {
                    number.push(c);
                    continue;
                }
                'H' => (2, 3_600),
                'M' => (3, 60),
                'S' => (4, 1),
                _ => return Err(invalid()),
            };
            if rank <= last {
                return Err(invalid());
            }
            last = rank;

            if c == 'S' {
                let (whole, fraction) = match number.split_once('.') {
                    Some((whole, fraction)) => (whole.to_string(), fraction.to_string()),
                    None => (number.clone(), String::new()),
                };
                number.clear();
                let whole = whole.parse::<u64>().map_err(|_| invalid())?;
                secs = secs.checked_add(whole).ok_or_else(invalid)?;
                if !fraction.is_empty() {
                    if fraction.len() > 9 || !fraction.chars().all(|c| c.is_ascii_digit()) {
                        return Err(invalid());
                    }
                    nanos = format!("{fraction:0<9}").parse::<u32>().map_err(|_| invalid())?;
                }
            } else {
                let value = take_number(&mut number).ok_or_else(invalid)?;
                secs = add_scaled(secs, value, scale).ok_or_else(invalid)?;
            }
        }
        if !number.is_empty() {
            return Err(invalid());
        }
    }

    if last == 0 {
        return Err(invalid());
    }
    Ok(Duration::new(secs, nanos))
}

fn take_number(number: &mut String) -> Option<u64> {
    let value = number.parse::<u64>().ok();
    number.clear();
    value
}

fn add_scaled(total: u64, value: u64, scale: u64) -> Option<u64> {
    value.checked_mul(scale)?.checked_add(total)
}
