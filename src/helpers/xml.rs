//! Thin layer over quick-xml shared by the XLSX, ODS and HTML adapters.

use crate::error::Result;
use quick_xml::escape::resolve_xml_entity;
use quick_xml::events::BytesRef;
use quick_xml::events::BytesStart;
use quick_xml::events::BytesText;
use quick_xml::events::Event;
use quick_xml::name::QName;
use quick_xml::Reader;
use std::io::BufRead;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum XmlError {
    #[error("Unknown entity '&{0};'")]
    EntityError(String),

    #[error("Invalid value '{1}' for attribute '{0}'")]
    AttributeValueError(String, String),
}

/// Pull reader with a reusable event buffer.
pub(crate) struct XmlReader<R: BufRead> {
    reader: Reader<R>,
    buffer: Vec<u8>,
}

impl<R: BufRead> XmlReader<R> {
    /// Reader for the XML parts of office documents.
    pub(crate) fn new(source: R) -> XmlReader<R> {
        let mut reader = Reader::from_reader(source);
        let config = reader.config_mut();
        config.check_comments = false;
        config.check_end_names = false;
        config.expand_empty_elements = true;
        config.trim_text(false);
        XmlReader { reader, buffer: Vec::with_capacity(1024) }
    }

    /// Reader tolerant of HTML: unclosed void elements, stray `&` and unmatched end tags.
    pub(crate) fn html(source: R) -> XmlReader<R> {
        let mut xml = XmlReader::new(source);
        let config = xml.reader.config_mut();
        config.allow_unmatched_ends = true;
        config.allow_dangling_amp = true;
        xml
    }

    /// The next event, `None` at end of document.
    pub(crate) fn next(&mut self) -> Result<Option<Event<'_>>> {
        self.buffer.clear();
        match self.reader.read_event_into(&mut self.buffer)? {
            Event::Eof => Ok(None),
            event => Ok(Some(event)),
        }
    }

    /// Skips past the end of the element whose start was just read.
    pub(crate) fn skip_element(&mut self, name: QName) -> Result<()> {
        let name = name.as_ref().to_vec();
        let mut depth = 1usize;
        while let Some(event) = self.next()? {
            match event {
                Event::Start(start) if start.name().as_ref() == name.as_slice() => depth += 1,
                Event::End(end) if end.name().as_ref() == name.as_slice() => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                }
                _ => (),
            }
        }
        Ok(())
    }
}

/// Attribute access on start tags by qualified name.
pub(crate) trait AttributeLookup {
    /// The unescaped value of attribute `name`.
    fn attribute(&self, name: &str) -> Result<Option<String>>;

    /// The value of attribute `name` parsed as `T`.
    fn parse_attribute<T: FromStr>(&self, name: &str) -> Result<Option<T>>;
}

impl AttributeLookup for BytesStart<'_> {
    fn attribute(&self, name: &str) -> Result<Option<String>> {
        match self.try_get_attribute(name)? {
            Some(attribute) => Ok(Some(attribute.unescape_value()?.into_owned())),
            None => Ok(None),
        }
    }

    fn parse_attribute<T: FromStr>(&self, name: &str) -> Result<Option<T>> {
        match self.attribute(name)? {
            Some(value) => match value.trim().parse::<T>() {
                Ok(parsed) => Ok(Some(parsed)),
                Err(_) => Err(XmlError::AttributeValueError(name.to_owned(), value))?,
            },
            None => Ok(None),
        }
    }
}

/// Accumulates character data from text and reference events.
pub(crate) trait TextSink {
    fn push_text(&mut self, text: &BytesText) -> Result<()>;

    /// Resolves a character or predefined entity reference.
    fn push_reference(&mut self, reference: &BytesRef) -> Result<()>;
}

impl TextSink for String {
    fn push_text(&mut self, text: &BytesText) -> Result<()> {
        self.push_str(&text.xml_content()?);
        Ok(())
    }

    fn push_reference(&mut self, reference: &BytesRef) -> Result<()> {
        let raw = reference.xml_content()?;
        if let Some(character) = resolve_char_reference(&raw) {
            self.push(character);
        } else if let Some(entity) = resolve_xml_entity(&raw) {
            self.push_str(entity);
        } else {
            Err(XmlError::EntityError(raw.into_owned()))?
        }
        Ok(())
    }
}

/// Decodes `#65` or `#x41` style references.
pub(crate) fn resolve_char_reference(raw: &str) -> Option<char> {
    let number = raw.strip_prefix('#')?;
    let code = match number.strip_prefix(['x', 'X']) {
        Some(hex) => u32::from_str_radix(hex, 16).ok()?,
        None => number.parse::<u32>().ok()?,
    };
    char::from_u32(code)
}

/// Loops over the events of an [`XmlReader`] until end of document.
#[macro_export]
macro_rules! for_each_xml_event {
    ($reader:expr => { $($arms:tt)* }) => {
        while let Some(event) = $reader.next()? {
            match event {
                $($arms)*
                _ => (),
            }
        }
    };
}
