//! Importers for the EU Publications Office vocabularies
//!
//! The file-type and licence authority tables are distributed as flat XML:
//! a root element with one `<record>` child per entry. Both files are small,
//! so they are read into a minimal element tree before being walked.

pub mod licences;
pub mod media_types;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::CatalogError;
use crate::report::Issues;

pub use licences::import_licences;
pub use media_types::import_media_types;

/// Outcome of one vocabulary import
#[derive(Debug, Clone, Default)]
pub struct VocabularyReport {
    pub created: usize,
    pub existing: usize,
    pub skipped_deprecated: usize,
    pub issues: Issues,
}

impl VocabularyReport {
    pub fn skipped(&self) -> usize {
        self.skipped_deprecated + self.issues.len()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlElement {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub text: String,
    pub children: Vec<XmlElement>,
}

impl XmlElement {
    fn from_start(start: &BytesStart) -> Result<Self, CatalogError> {
        let mut attrs = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(quick_xml::Error::from)?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            attrs.push((key, attr.unescape_value()?.into_owned()));
        }
        Ok(Self {
            name: String::from_utf8_lossy(start.local_name().as_ref()).into_owned(),
            attrs,
            ..Default::default()
        })
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Element at a `/`-separated path of child names
    pub fn path(&self, path: &str) -> Option<&XmlElement> {
        path.split('/')
            .try_fold(self, |element, name| element.child(name))
    }

    /// Trimmed text of a child, `None` when absent or empty
    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name).and_then(XmlElement::non_empty_text)
    }

    pub fn path_text(&self, path: &str) -> Option<&str> {
        self.path(path).and_then(XmlElement::non_empty_text)
    }

    fn non_empty_text(&self) -> Option<&str> {
        Some(self.text.trim()).filter(|t| !t.is_empty())
    }
}

/// Parse a document into its root element
pub fn parse_tree(xml: &str) -> Result<XmlElement, CatalogError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root = None;

    loop {
        match reader.read_event()? {
            Event::Start(start) => stack.push(XmlElement::from_start(&start)?),
            Event::Empty(start) => {
                let element = XmlElement::from_start(&start)?;
                close(&mut stack, &mut root, element);
            }
            Event::End(_) => {
                if let Some(element) = stack.pop() {
                    close(&mut stack, &mut root, element);
                }
            }
            Event::Text(text) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&text.unescape()?);
                }
            }
            Event::CData(data) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&String::from_utf8_lossy(&data));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    root.ok_or_else(|| {
        CatalogError::Xml(quick_xml::Error::UnexpectedEof(
            "document has no root element".to_string(),
        ))
    })
}

fn close(stack: &mut Vec<XmlElement>, root: &mut Option<XmlElement>, element: XmlElement) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None => {
            if root.is_none() {
                *root = Some(element);
            }
        }
    }
}
