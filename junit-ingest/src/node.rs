use std::str::Utf8Error;

use indexmap::IndexMap;
use quick_xml::{
    events::{BytesStart, Event},
    Reader,
};
use thiserror::Error;

const SYNTHETIC_ROOT_START: &[u8] = b"<fake-root>";
const SYNTHETIC_ROOT_END: &[u8] = b"</fake-root>";
const CDATA_START: &[u8] = b"<![CDATA[";
const CDATA_END: &[u8] = b"]]>";
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Deepest element nesting accepted by [`parse`], not counting the synthetic
/// root.
pub const MAX_DEPTH: usize = 128;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("malformed xml at byte {position}: {source}")]
    Syntax {
        position: u64,
        #[source]
        source: quick_xml::Error,
    },
    #[error("document is not valid utf-8: {0}")]
    Encoding(#[from] Utf8Error),
    #[error("element `{0}` is never closed")]
    UnclosedElement(String),
    #[error("end tag `{0}` found without start tag")]
    UnexpectedEndTag(String),
    #[error("elements are nested deeper than {0} levels")]
    TooDeep(usize),
}

/// A generic element decoded from a JUnit-dialect document.
///
/// `content` holds the element's text and CDATA exactly as written (entities
/// are not decoded, CDATA markers are kept). It is only populated for
/// elements without child elements.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlNode {
    pub name: String,
    pub attrs: IndexMap<String, String>,
    pub children: Vec<XmlNode>,
    pub content: Vec<u8>,
}

impl XmlNode {
    pub fn new<T: Into<String>>(name: T) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn attr<T: AsRef<str>>(&self, name: T) -> Option<&str> {
        self.attrs.get(name.as_ref()).map(String::as_str)
    }

    fn from_start(e: &BytesStart, position: u64) -> Result<Self, ParseError> {
        let syntax = |source: quick_xml::Error| ParseError::Syntax { position, source };

        let mut node = XmlNode::new(std::str::from_utf8(e.local_name().as_ref())?);

        let mut attributes = e.attributes();
        // duplicated attribute names resolve last-write-wins
        attributes.with_checks(false);
        for attr in attributes {
            let attr = attr.map_err(|err| syntax(err.into()))?;
            let key = std::str::from_utf8(attr.key.local_name().as_ref())?.to_string();
            let value = attr
                .unescape_value()
                .map_err(|err| syntax(err.into()))?
                .into_owned();
            node.attrs.insert(key, value);
        }

        Ok(node)
    }

    fn push_child(&mut self, child: XmlNode) {
        self.children.push(child);
    }

    fn finish(mut self) -> Self {
        if !self.children.is_empty() {
            self.content.clear();
        }
        self
    }
}

/// Wraps `data` in a synthetic root element so that blank input and inputs
/// with several top-level elements are still a single well-formed document.
pub fn reparent<T: AsRef<[u8]>>(data: T) -> Vec<u8> {
    let data = data.as_ref();
    let mut wrapped =
        Vec::with_capacity(SYNTHETIC_ROOT_START.len() + data.len() + SYNTHETIC_ROOT_END.len());
    wrapped.extend_from_slice(SYNTHETIC_ROOT_START);
    wrapped.extend_from_slice(data);
    wrapped.extend_from_slice(SYNTHETIC_ROOT_END);
    wrapped
}

/// Decodes `data` into its top-level elements.
pub fn parse<T: AsRef<[u8]>>(data: T) -> Result<Vec<XmlNode>, ParseError> {
    let data = data.as_ref();
    let wrapped = reparent(data.strip_prefix(UTF8_BOM).unwrap_or(data));
    let mut reader = Reader::from_reader(wrapped.as_slice());
    // leaf content must survive byte-for-byte
    reader.config_mut().trim_text(false);

    let mut builder = TreeBuilder::default();
    let mut buf = Vec::new();
    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|source| ParseError::Syntax {
                position: unwrapped_position(reader.error_position() as u64),
                source,
            })?;
        if let Event::Eof = event {
            break;
        }
        builder.match_event(event, unwrapped_position(reader.buffer_position() as u64))?;
        buf.clear();
    }

    builder.into_nodes()
}

fn unwrapped_position(position: u64) -> u64 {
    position.saturating_sub(SYNTHETIC_ROOT_START.len() as u64)
}

#[derive(Debug, Default)]
struct TreeBuilder {
    open: Vec<XmlNode>,
    root: Option<XmlNode>,
}

impl TreeBuilder {
    fn match_event(&mut self, event: Event, position: u64) -> Result<(), ParseError> {
        match event {
            Event::Start(e) => {
                self.check_depth()?;
                let node = XmlNode::from_start(&e, position)?;
                self.open.push(node);
            }
            Event::Empty(e) => {
                self.check_depth()?;
                let node = XmlNode::from_start(&e, position)?;
                self.close(node)?;
            }
            Event::End(e) => {
                let Some(node) = self.open.pop() else {
                    let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                    return Err(ParseError::UnexpectedEndTag(name));
                };
                self.close(node)?;
            }
            Event::Text(e) => {
                std::str::from_utf8(&e)?;
                if let Some(node) = self.open.last_mut() {
                    node.content.extend_from_slice(&e);
                }
            }
            Event::CData(e) => {
                std::str::from_utf8(&e)?;
                if let Some(node) = self.open.last_mut() {
                    node.content.extend_from_slice(CDATA_START);
                    node.content.extend_from_slice(&e);
                    node.content.extend_from_slice(CDATA_END);
                }
            }
            _ => (),
        };
        Ok(())
    }

    // the synthetic root sits at the bottom of `open`
    fn check_depth(&self) -> Result<(), ParseError> {
        if self.open.len() > MAX_DEPTH {
            return Err(ParseError::TooDeep(MAX_DEPTH));
        }
        Ok(())
    }

    fn close(&mut self, node: XmlNode) -> Result<(), ParseError> {
        let node = node.finish();
        match self.open.last_mut() {
            Some(parent) => parent.push_child(node),
            None if self.root.is_none() => self.root = Some(node),
            None => return Err(ParseError::UnexpectedEndTag(node.name)),
        }
        Ok(())
    }

    fn into_nodes(self) -> Result<Vec<XmlNode>, ParseError> {
        match (self.open.into_iter().next_back(), self.root) {
            (Some(node), _) => Err(ParseError::UnclosedElement(node.name)),
            (None, Some(root)) => Ok(root.children),
            (None, None) => Ok(Vec::new()),
        }
    }
}
