// A minimal owned XML element tree, built from `quick-xml` events.

use quick_xml::{Reader, events::Event};

use super::ReqIfError;

/// An XML element with its attributes, child elements and text content.
///
/// Namespace prefixes are stripped from element names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(super) struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Element>,
    pub text: String,
}

impl Element {
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// The first child element with the given name.
    pub fn child(&self, name: &str) -> Option<&Self> {
        self.children.iter().find(|child| child.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Self> + 'a {
        self.children.iter().filter(move |child| child.name == name)
    }

    /// Follows a chain of first-child lookups.
    pub fn path(&self, names: &[&str]) -> Option<&Self> {
        names
            .iter()
            .try_fold(self, |element, name| element.child(name))
    }

    /// The text content exactly as written, surrounding whitespace included.
    pub fn text(&self) -> &str {
        &self.text
    }
}

/// Parses a document into its root element.
pub(super) fn parse(xml: &str) -> Result<Element, ReqIfError> {
    let mut reader = Reader::from_str(xml);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event()? {
            Event::Start(start) => stack.push(open(&start)?),
            Event::Empty(start) => {
                let element = open(&start)?;
                close(element, &mut stack, &mut root)?;
            }
            Event::End(end) => {
                let element = stack.pop().ok_or_else(|| {
                    let name = String::from_utf8_lossy(end.name().as_ref()).into_owned();
                    ReqIfError::UnexpectedClose(name)
                })?;
                close(element, &mut stack, &mut root)?;
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

    if let Some(unclosed) = stack.pop() {
        return Err(ReqIfError::Unclosed(unclosed.name));
    }

    root.ok_or(ReqIfError::NoRoot)
}

fn open(start: &quick_xml::events::BytesStart<'_>) -> Result<Element, ReqIfError> {
    let name = std::str::from_utf8(start.local_name().as_ref())?.to_string();

    let mut attributes = Vec::new();
    for attribute in start.attributes() {
        let attribute = attribute?;
        let key = std::str::from_utf8(attribute.key.as_ref())?.to_string();
        let value = attribute.unescape_value()?.into_owned();
        attributes.push((key, value));
    }

    Ok(Element {
        name,
        attributes,
        children: Vec::new(),
        text: String::new(),
    })
}

/// Attaches a finished element to its parent, or makes it the root.
fn close(
    element: Element,
    stack: &mut [Element],
    root: &mut Option<Element>,
) -> Result<(), ReqIfError> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(element);
        return Ok(());
    }

    if root.is_some() {
        return Err(ReqIfError::MultipleRoots(element.name));
    }
    *root = Some(element);
    Ok(())
}
