//! Ordered property documents and their file renderings.

use std::collections::BTreeMap;
use std::io;

use java_properties::{PropertiesError, PropertiesWriter};
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use thiserror::Error;

/// A property document that could not be written out.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to write Hadoop XML: {0}")]
    Xml(#[from] io::Error),

    #[error("failed to write Java properties: {0}")]
    Properties(#[from] PropertiesError),

    #[error("rendered document is not UTF-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),
}

/// Ordered key/value set. Setting an existing key replaces its value in place.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PropertyDocument {
    entries: Vec<(String, String)>,
}

impl PropertyDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a property, replacing the value of an existing key or appending.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Set every entry of an override map, in key order.
    pub fn apply_overrides(&mut self, overrides: &BTreeMap<String, String>) -> &mut Self {
        for (key, value) in overrides {
            self.set(key.as_str(), value.as_str());
        }
        self
    }

    /// Render as a Hadoop `<configuration>` XML document.
    pub fn to_hadoop_xml(&self) -> Result<String, RenderError> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        writer.write_event(Event::Decl(BytesDecl::new("1.0", None, None)))?;
        writer.write_event(Event::Start(BytesStart::new("configuration")))?;
        for (key, value) in self.iter() {
            writer.write_event(Event::Start(BytesStart::new("property")))?;
            write_text_element(&mut writer, "name", key)?;
            write_text_element(&mut writer, "value", value)?;
            writer.write_event(Event::End(BytesEnd::new("property")))?;
        }
        writer.write_event(Event::End(BytesEnd::new("configuration")))?;

        let mut xml = String::from_utf8(writer.into_inner())?;
        xml.push('\n');
        Ok(xml)
    }

    /// Render as a Java `.properties` file.
    pub fn to_java_properties(&self) -> Result<String, RenderError> {
        let mut buffer = Vec::new();
        {
            let mut writer = PropertiesWriter::new(&mut buffer);
            for (key, value) in self.iter() {
                writer.write(key, value)?;
            }
            writer.finish()?;
        }
        Ok(String::from_utf8(buffer)?)
    }
}

fn write_text_element(writer: &mut Writer<Vec<u8>>, tag: &str, text: &str) -> io::Result<()> {
    writer.write_event(Event::Start(BytesStart::new(tag)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(tag)))
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for PropertyDocument {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut doc = PropertyDocument::new();
        for (key, value) in iter {
            doc.set(key, value);
        }
        doc
    }
}

/// Value of `key` in a rendered Hadoop XML document.
#[cfg(test)]
pub(crate) fn hadoop_property(xml: &str, key: &str) -> Option<String> {
    let name = format!("<name>{}</name>", key);
    let after_name = xml.get(xml.find(&name)? + name.len()..)?;
    let start = after_name.find("<value>")? + "<value>".len();
    let end = after_name.find("</value>")?;
    after_name.get(start..end).map(str::to_string)
}
