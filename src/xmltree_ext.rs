use std::io::Write;

use xml::namespace::Namespace;
use xml::writer::EmitterConfig;
use xmltree::{Element, XMLNode};

use crate::errors::DavError;
use crate::DavResult;

pub(crate) trait ElementExt {
    /// Builder.
    fn new2<'a, E: Into<&'a str>>(e: E) -> Self;
    /// Builder.
    fn ns<S: Into<String>>(self, prefix: S, namespace: S) -> Self;
    /// Builder.
    fn text<T: Into<String>>(self, t: T) -> Self;
    /// Like parse, but returns DavError.
    fn parse2(data: &[u8]) -> DavResult<Element>;
    /// Add a child element.
    fn push_element(&mut self, e: Element);
    /// Iterator over the children that are Elements.
    fn child_elems_iter<'a>(&'a self) -> Box<dyn Iterator<Item = &'a Element> + 'a>;
    /// Write the element as an XML document.
    fn write_doc<W: Write>(&self, w: W) -> DavResult<()>;
}

impl ElementExt for Element {
    fn new2<'a, N: Into<&'a str>>(n: N) -> Element {
        let v: Vec<&str> = n.into().splitn(2, ':').collect();
        if v.len() == 1 {
            Element::new(v[0])
        } else {
            let mut e = Element::new(v[1]);
            e.prefix = Some(v[0].to_string());
            e
        }
    }

    fn ns<S: Into<String>>(mut self, prefix: S, namespace: S) -> Element {
        let mut ns = self.namespaces.unwrap_or_else(Namespace::empty);
        ns.force_put(prefix.into(), namespace.into());
        self.namespaces = Some(ns);
        self
    }

    fn text<S: Into<String>>(mut self, t: S) -> Element {
        self.children.push(XMLNode::Text(t.into()));
        self
    }

    fn parse2(data: &[u8]) -> DavResult<Element> {
        Element::parse(data).map_err(|e| {
            debug!("xml parse error: {e}");
            DavError::XmlParseError
        })
    }

    fn push_element(&mut self, e: Element) {
        self.children.push(XMLNode::Element(e));
    }

    fn child_elems_iter<'a>(&'a self) -> Box<dyn Iterator<Item = &'a Element> + 'a> {
        Box::new(self.children.iter().filter_map(|n| match n {
            XMLNode::Element(e) => Some(e),
            _ => None,
        }))
    }

    fn write_doc<W: Write>(&self, w: W) -> DavResult<()> {
        let config = EmitterConfig::new()
            .perform_indent(false)
            .write_document_declaration(true)
            .normalize_empty_elements(true);
        self.write_with_config(w, config).map_err(|e| {
            debug!("xml write error: {e}");
            DavError::XmlWriteError
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_prefix() {
        let mut root = Element::new2("D:prop").ns("D", "DAV:");
        root.push_element(Element::new2("D:depth").text("0"));
        let mut buf = Vec::new();
        root.write_doc(&mut buf).unwrap();
        let out = String::from_utf8(buf).unwrap();
        assert!(out.contains("<D:prop xmlns:D=\"DAV:\">"));
        assert!(out.contains("<D:depth>0</D:depth>"));

        let back = Element::parse2(out.as_bytes()).unwrap();
        assert_eq!(back.name, "prop");
        assert_eq!(back.child_elems_iter().count(), 1);
    }

    #[test]
    fn test_parse_error() {
        assert!(matches!(
            Element::parse2(b"<D:lockinfo"),
            Err(DavError::XmlParseError)
        ));
    }
}
