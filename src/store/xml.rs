// Reading and writing DomStore trees as XML text, through quick-xml.

use quick_xml::{
    events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event},
    Reader, Writer,
};
use std::{fs::read_to_string, path::Path};

use super::{DomStore, ElementId};
use crate::error::OmeError;

impl DomStore {
    /// Parse an XML document. Comments, processing instructions and the declaration are
    /// dropped; text and CDATA content is kept on the enclosing element.
    pub fn parse_str(text: &str) -> Result<DomStore, OmeError> {
        let mut reader = Reader::from_str(text);
        reader.config_mut().trim_text(true);

        let mut store: Option<DomStore> = None;
        let mut open: Vec<ElementId> = Vec::new();
        loop {
            match reader.read_event()? {
                Event::Start(start) => {
                    let el = DomStore::open_element(&mut store, &open, &start)?;
                    open.push(el);
                }
                Event::Empty(start) => {
                    DomStore::open_element(&mut store, &open, &start)?;
                }
                Event::End(_) => {
                    open.pop();
                }
                Event::Text(text) => {
                    let content = text.unescape()?.into_owned();
                    DomStore::push_text(&mut store, &open, &content)?;
                }
                Event::CData(data) => {
                    let content = String::from_utf8_lossy(&data.into_inner()).into_owned();
                    DomStore::push_text(&mut store, &open, &content)?;
                }
                Event::Eof => break,
                _ => {}
            }
        }

        let store = store.ok_or_else(|| OmeError::Xml("document has no root element".to_string()))?;
        tracing::debug!(
            "[DomStore::parse_str] Parsed {} elements under <{}>",
            store.len(),
            store.tag(store.root())?
        );
        Ok(store)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<DomStore, OmeError> {
        tracing::debug!("[DomStore::from_path] Reading {:?}", path.as_ref());
        DomStore::parse_str(&read_to_string(path)?)
    }

    fn open_element(
        store: &mut Option<DomStore>,
        open: &[ElementId],
        start: &BytesStart<'_>,
    ) -> Result<ElementId, OmeError> {
        let tag = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        let el = match (store.as_mut(), open.last()) {
            (None, _) => {
                let created = DomStore::new(tag);
                let root = created.root();
                *store = Some(created);
                root
            }
            (Some(_), None) => {
                return Err(OmeError::Xml(format!(
                    "second root element <{tag}> in document"
                )));
            }
            (Some(dom), Some(parent)) => {
                let el = dom.create_element(tag);
                dom.append_child(*parent, el)?;
                el
            }
        };
        if let Some(dom) = store.as_mut() {
            for attr in start.attributes() {
                let attr = attr?;
                let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
                let value = attr.unescape_value()?.into_owned();
                dom.set_attribute(el, key, value)?;
            }
        }
        Ok(el)
    }

    fn push_text(
        store: &mut Option<DomStore>,
        open: &[ElementId],
        content: &str,
    ) -> Result<(), OmeError> {
        let (Some(dom), Some(el)) = (store.as_mut(), open.last()) else {
            return Ok(());
        };
        let text = match dom.text(*el)? {
            Some(existing) => format!("{existing}{content}"),
            None => content.to_string(),
        };
        dom.set_text(*el, Some(text))
    }

    /// Serialize the attached tree, indented by two spaces.
    pub fn to_xml_string(&self) -> Result<String, OmeError> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(|e| OmeError::Xml(e.to_string()))?;
        self.write_element(&mut writer, self.root())?;
        String::from_utf8(writer.into_inner())
            .map_err(|e| OmeError::Xml(format!("serialized document is not UTF-8: {e}")))
    }

    fn write_element(&self, writer: &mut Writer<Vec<u8>>, el: ElementId) -> Result<(), OmeError> {
        let tag = self.tag(el)?;
        let mut start = BytesStart::new(tag);
        for (key, value) in self.attributes(el)? {
            start.push_attribute((key.as_str(), value.as_str()));
        }
        let children = self.children(el)?;
        let text = self.text(el)?;
        if children.is_empty() && text.is_none() {
            return writer
                .write_event(Event::Empty(start))
                .map_err(|e| OmeError::Xml(e.to_string()));
        }
        writer
            .write_event(Event::Start(start))
            .map_err(|e| OmeError::Xml(e.to_string()))?;
        if let Some(text) = text {
            writer
                .write_event(Event::Text(BytesText::new(text)))
                .map_err(|e| OmeError::Xml(e.to_string()))?;
        }
        for child in children {
            self.write_element(writer, *child)?;
        }
        writer
            .write_event(Event::End(BytesEnd::new(tag)))
            .map_err(|e| OmeError::Xml(e.to_string()))
    }
}
