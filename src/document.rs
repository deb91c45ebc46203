//! Owned XML trees for registry documents.
//!
//! Element and attribute names are stored as lowercase local names, so
//! lookups are case-insensitive and namespace-free (`Pubmed-ID` in a MINiML
//! file is found as `pubmed-id`).

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::domain::{Accession, Registry};
use crate::error::KiraError;

const DOCUMENT_ROOT: &str = "#document";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct XmlNode {
    name: String,
    attributes: Vec<(String, String)>,
    text: String,
    /// Text that follows this element inside its parent, up to the next sibling.
    tail: String,
    children: Vec<XmlNode>,
}

impl XmlNode {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_lowercase(),
            ..Self::default()
        }
    }

    pub fn with_attr(mut self, key: &str, value: &str) -> Self {
        self.attributes.push((key.to_lowercase(), value.to_string()));
        self
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.text.push_str(text);
        self
    }

    pub fn with_child(mut self, child: XmlNode) -> Self {
        self.children.push(child);
        self
    }

    /// Parses a whole document; top-level elements hang under a synthetic root.
    pub fn parse(xml: &str) -> Result<XmlNode, KiraError> {
        let mut reader = Reader::from_str(xml);
        let mut stack = vec![XmlNode::new(DOCUMENT_ROOT)];

        loop {
            match reader.read_event()? {
                Event::Start(start) => stack.push(element_from(&start)?),
                Event::Empty(start) => {
                    let node = element_from(&start)?;
                    attach(&mut stack, node)?;
                }
                Event::End(_) => {
                    if stack.len() < 2 {
                        return Err(KiraError::Xml("unbalanced closing tag".to_string()));
                    }
                    let node = stack
                        .pop()
                        .ok_or_else(|| KiraError::Xml("unbalanced closing tag".to_string()))?;
                    attach(&mut stack, node)?;
                }
                Event::Text(text) => push_text(&mut stack, &text.unescape()?),
                Event::CData(data) => {
                    push_text(&mut stack, &String::from_utf8_lossy(&data.into_inner()))
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if stack.len() != 1 {
            return Err(KiraError::Xml(
                "document ended before all elements were closed".to_string(),
            ));
        }
        stack
            .pop()
            .ok_or_else(|| KiraError::Xml("empty document".to_string()))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        let key = key.to_lowercase();
        self.attributes
            .iter()
            .find(|(name, _)| *name == key)
            .map(|(_, value)| value.as_str())
    }

    pub fn children(&self) -> impl Iterator<Item = &XmlNode> {
        self.children.iter()
    }

    pub fn children_named<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a XmlNode> {
        let name = name.to_lowercase();
        self.children.iter().filter(move |child| child.name == name)
    }

    pub fn child(&self, name: &str) -> Option<&XmlNode> {
        self.children_named(name).next()
    }

    /// First descendant with this name, depth-first in document order.
    pub fn find(&self, name: &str) -> Option<&XmlNode> {
        let name = name.to_lowercase();
        self.find_lowered(&name)
    }

    fn find_lowered(&self, name: &str) -> Option<&XmlNode> {
        for child in &self.children {
            if child.name == name {
                return Some(child);
            }
            if let Some(found) = child.find_lowered(name) {
                return Some(found);
            }
        }
        None
    }

    /// Every descendant with this name, in document order.
    pub fn find_all(&self, name: &str) -> Vec<&XmlNode> {
        let name = name.to_lowercase();
        let mut out = Vec::new();
        self.collect_lowered(&name, &mut out);
        out
    }

    fn collect_lowered<'a>(&'a self, name: &str, out: &mut Vec<&'a XmlNode>) {
        for child in &self.children {
            if child.name == name {
                out.push(child);
            }
            child.collect_lowered(name, out);
        }
    }

    /// Text of this node and all descendants with whitespace runs collapsed.
    pub fn text(&self) -> String {
        let mut raw = String::new();
        self.gather_text(&mut raw);
        raw.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    fn gather_text(&self, out: &mut String) {
        out.push_str(&self.text);
        for child in &self.children {
            out.push(' ');
            child.gather_text(out);
            out.push(' ');
            out.push_str(&child.tail);
        }
    }

    /// Text of the first descendant named `name`, if it has any.
    pub fn find_text(&self, name: &str) -> Option<String> {
        self.find(name)
            .map(XmlNode::text)
            .filter(|text| !text.is_empty())
    }
}

fn element_from(start: &BytesStart<'_>) -> Result<XmlNode, KiraError> {
    let name = String::from_utf8_lossy(start.local_name().as_ref()).to_lowercase();
    let mut node = XmlNode {
        name,
        ..XmlNode::default()
    };
    for attr in start.attributes() {
        let attr = attr.map_err(|err| KiraError::Xml(err.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).to_lowercase();
        let value = attr.unescape_value()?.into_owned();
        node.attributes.push((key, value));
    }
    Ok(node)
}

/// Text after a closed child belongs to that child's tail, keeping document order.
fn push_text(stack: &mut [XmlNode], value: &str) {
    let Some(current) = stack.last_mut() else {
        return;
    };
    match current.children.last_mut() {
        Some(previous) => previous.tail.push_str(value),
        None => current.text.push_str(value),
    }
}

fn attach(stack: &mut [XmlNode], node: XmlNode) -> Result<(), KiraError> {
    let parent = stack
        .last_mut()
        .ok_or_else(|| KiraError::Xml("element outside of document".to_string()))?;
    parent.children.push(node);
    Ok(())
}

/// One raw per-dataset document as delivered by a source adapter.
///
/// `attachments` carries auxiliary documents fetched alongside the main one
/// (ArrayExpress protocol descriptions); GEO documents have none.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub accession: Accession,
    pub root: XmlNode,
    pub attachments: Vec<XmlNode>,
}

impl SourceDocument {
    pub fn new(accession: Accession, root: XmlNode) -> Self {
        Self {
            accession,
            root,
            attachments: Vec::new(),
        }
    }

    pub fn parse(accession: Accession, xml: &str) -> Result<Self, KiraError> {
        let root = XmlNode::parse(xml).map_err(|err| {
            KiraError::malformed(accession.as_str(), format!("unparsable XML: {err}"))
        })?;
        Ok(Self::new(accession, root))
    }

    pub fn registry(&self) -> Registry {
        self.accession.registry()
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    const MINIML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<MINiML xmlns="http://www.ncbi.nlm.nih.gov/geo/info/MINiML">
  <Series iid="GSE1">
    <Title>Lung   macrophages
      in rats</Title>
    <Pubmed-ID>123</Pubmed-ID>
    <Relation type="SRA" target="https://www.ncbi.nlm.nih.gov/sra?term=SRP1" />
  </Series>
  <Sample iid="GSM1"><Channel position="1"><Characteristics tag="cell type">HeLa &amp; co</Characteristics></Channel></Sample>
</MINiML>"#;

    #[test]
    fn parse_lowercases_names_and_collapses_text() {
        let root = XmlNode::parse(MINIML).unwrap();
        let series = root.find("series").unwrap();
        assert_eq!(series.attr("IID"), Some("GSE1"));
        assert_eq!(series.find_text("title").unwrap(), "Lung macrophages in rats");
        assert_eq!(series.find_text("pubmed-id").unwrap(), "123");
        let relation = series.child("relation").unwrap();
        assert_eq!(relation.attr("type"), Some("SRA"));
    }

    #[test]
    fn find_all_walks_descendants() {
        let root = XmlNode::parse(MINIML).unwrap();
        let characteristics = root.find_all("characteristics");
        assert_eq!(characteristics.len(), 1);
        assert_eq!(characteristics[0].text(), "HeLa & co");
    }

    #[test]
    fn mixed_content_keeps_document_order() {
        let root =
            XmlNode::parse("<text>Cells were<br/>sampled <b>hourly</b> today</text>").unwrap();
        let text = root.find("text").unwrap();
        assert_eq!(text.text(), "Cells were sampled hourly today");
        assert_eq!(text.find_text("b").unwrap(), "hourly");
    }

    #[test]
    fn built_tree_answers_lookups() {
        let node = XmlNode::new("Protocol")
            .with_attr("ID", "P-1")
            .with_child(XmlNode::new("type").with_text("growth"));
        assert_eq!(node.attr("id"), Some("P-1"));
        assert_eq!(node.find_text("TYPE").unwrap(), "growth");
    }

    #[test]
    fn unclosed_document_is_an_error() {
        assert_matches!(
            XmlNode::parse("<series><title>x</title>"),
            Err(KiraError::Xml(_))
        );
    }

    #[test]
    fn source_document_reports_accession_on_bad_xml() {
        let acc: Accession = "GSE9".parse().unwrap();
        let err = SourceDocument::parse(acc, "<a></b>").unwrap_err();
        assert_matches!(
            err,
            KiraError::MalformedDocument { ref accession, .. } if accession == "GSE9"
        );
    }
}
