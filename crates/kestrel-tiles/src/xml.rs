//! A minimal pull parser for the XML subset `.tsx` files use.
//!
//! Handles the prolog, elements with attributes, self-closing tags,
//! comments, and the five standard entities. It does not validate
//! nesting; callers match start and end events themselves. Slices
//! borrow from the source where possible, so an attribute value only
//! allocates when it contains an entity.

use std::borrow::Cow;

use crate::error::{TsxError, TsxResult};

#[derive(Debug, Clone, PartialEq)]
pub struct Attribute<'s> {
    pub name: &'s str,
    pub value: Cow<'s, str>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum XmlEvent<'s> {
    StartElement {
        name: &'s str,
        attributes: Vec<Attribute<'s>>,
        self_closing: bool,
    },
    EndElement {
        name: &'s str,
    },
    /// Non-whitespace character data between tags, entities decoded.
    Text(Cow<'s, str>),
}

/// Streaming reader over a `.tsx` document.
pub struct XmlReader<'s> {
    src: &'s str,
    pos: usize,
    line: usize,
    column: usize,
}

impl<'s> XmlReader<'s> {
    pub fn new(src: &'s str) -> Self {
        Self {
            src,
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    /// Current 1-based (line, column) position.
    pub fn position(&self) -> (usize, usize) {
        (self.line, self.column)
    }

    /// An error positioned at the reader's current location.
    pub fn error(&self, message: impl Into<String>) -> TsxError {
        TsxError::new(message, self.line, self.column)
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.src[self.pos..].chars().next()?;
        self.pos += ch.len_utf8();
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn rest(&self) -> &'s str {
        &self.src[self.pos..]
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.advance();
        }
    }

    /// Advance past `terminator`, erroring at EOF.
    fn skip_past(&mut self, terminator: &str, what: &str) -> TsxResult<()> {
        while !self.rest().starts_with(terminator) {
            if self.advance().is_none() {
                return Err(self.error(format!("unterminated {what}")));
            }
        }
        for _ in terminator.chars() {
            self.advance();
        }
        Ok(())
    }

    fn scan_name(&mut self) -> TsxResult<&'s str> {
        let start = self.pos;
        while matches!(
            self.peek(),
            Some(c) if c.is_alphanumeric() || matches!(c, '_' | '-' | ':' | '.')
        ) {
            self.advance();
        }
        if self.pos == start {
            return Err(self.error("expected a name"));
        }
        Ok(&self.src[start..self.pos])
    }

    /// Decode one `&name;` reference, positioned at the `&`.
    fn scan_entity(&mut self) -> TsxResult<char> {
        let (line, column) = self.position();
        self.advance();
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == '#') {
            self.advance();
        }
        let name = &self.src[start..self.pos];
        if self.peek() != Some(';') {
            return Err(TsxError::new(
                format!("unterminated entity '&{name}'"),
                line,
                column,
            ));
        }
        self.advance();
        match name {
            "amp" => Ok('&'),
            "lt" => Ok('<'),
            "gt" => Ok('>'),
            "apos" => Ok('\''),
            "quot" => Ok('"'),
            other => Err(TsxError::new(
                format!("unknown entity '&{other};'"),
                line,
                column,
            )),
        }
    }

    fn scan_quoted(&mut self) -> TsxResult<Cow<'s, str>> {
        let quote = match self.advance() {
            Some(c @ ('"' | '\'')) => c,
            _ => return Err(self.error("expected a quoted attribute value")),
        };
        let start = self.pos;
        let mut owned: Option<String> = None;
        loop {
            match self.peek() {
                None => return Err(self.error("unterminated attribute value")),
                Some(c) if c == quote => break,
                Some('&') => {
                    let mut decoded = owned
                        .take()
                        .unwrap_or_else(|| self.src[start..self.pos].to_owned());
                    decoded.push(self.scan_entity()?);
                    owned = Some(decoded);
                }
                Some(c) => {
                    if let Some(s) = owned.as_mut() {
                        s.push(c);
                    }
                    self.advance();
                }
            }
        }
        let end = self.pos;
        self.advance();
        Ok(match owned {
            Some(s) => Cow::Owned(s),
            None => Cow::Borrowed(&self.src[start..end]),
        })
    }

    /// Character data up to the next tag; `None` if it was all whitespace.
    fn scan_text(&mut self) -> TsxResult<Option<Cow<'s, str>>> {
        let start = self.pos;
        let mut owned: Option<String> = None;
        loop {
            match self.peek() {
                None | Some('<') => break,
                Some('&') => {
                    let mut decoded = owned
                        .take()
                        .unwrap_or_else(|| self.src[start..self.pos].to_owned());
                    decoded.push(self.scan_entity()?);
                    owned = Some(decoded);
                }
                Some(c) => {
                    if let Some(s) = owned.as_mut() {
                        s.push(c);
                    }
                    self.advance();
                }
            }
        }
        let text: Cow<'s, str> = match owned {
            Some(s) => Cow::Owned(s),
            None => Cow::Borrowed(&self.src[start..self.pos]),
        };
        if text.chars().all(char::is_whitespace) {
            Ok(None)
        } else {
            Ok(Some(text))
        }
    }

    fn scan_element(&mut self) -> TsxResult<XmlEvent<'s>> {
        self.advance();
        let name = self.scan_name()?;
        let mut attributes = Vec::new();
        loop {
            self.skip_whitespace();
            match self.peek() {
                None => return Err(self.error(format!("unterminated <{name}>"))),
                Some('>') => {
                    self.advance();
                    return Ok(XmlEvent::StartElement {
                        name,
                        attributes,
                        self_closing: false,
                    });
                }
                Some('/') => {
                    self.advance();
                    if self.peek() != Some('>') {
                        return Err(self.error("expected '>' after '/'"));
                    }
                    self.advance();
                    return Ok(XmlEvent::StartElement {
                        name,
                        attributes,
                        self_closing: true,
                    });
                }
                Some(_) => {
                    let attr_name = self.scan_name()?;
                    self.skip_whitespace();
                    if self.peek() != Some('=') {
                        return Err(
                            self.error(format!("expected '=' after attribute '{attr_name}'"))
                        );
                    }
                    self.advance();
                    self.skip_whitespace();
                    let value = self.scan_quoted()?;
                    attributes.push(Attribute {
                        name: attr_name,
                        value,
                    });
                }
            }
        }
    }

    /// The next event, or `None` at end of input. Prologs, comments, and
    /// doctype declarations are skipped.
    pub fn next_event(&mut self) -> TsxResult<Option<XmlEvent<'s>>> {
        loop {
            match self.peek() {
                None => return Ok(None),
                Some('<') => {
                    let rest = self.rest();
                    if rest.starts_with("<?") {
                        self.skip_past("?>", "prolog")?;
                    } else if rest.starts_with("<!--") {
                        self.skip_past("-->", "comment")?;
                    } else if rest.starts_with("<!") {
                        self.skip_past(">", "declaration")?;
                    } else if rest.starts_with("</") {
                        self.advance();
                        self.advance();
                        let name = self.scan_name()?;
                        self.skip_whitespace();
                        if self.peek() != Some('>') {
                            return Err(self.error(format!("malformed </{name}>")));
                        }
                        self.advance();
                        return Ok(Some(XmlEvent::EndElement { name }));
                    } else {
                        return self.scan_element().map(Some);
                    }
                }
                Some(_) => {
                    if let Some(text) = self.scan_text()? {
                        return Ok(Some(XmlEvent::Text(text)));
                    }
                }
            }
        }
    }

    /// Discard everything up to and including the end of the element
    /// whose non-self-closing start tag was just returned.
    pub fn skip_element(&mut self) -> TsxResult<()> {
        let mut depth = 1usize;
        while depth > 0 {
            match self.next_event()? {
                None => return Err(self.error("unexpected end of file inside an element")),
                Some(XmlEvent::StartElement { self_closing, .. }) if !self_closing => depth += 1,
                Some(XmlEvent::EndElement { .. }) => depth -= 1,
                Some(_) => {}
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn events(src: &str) -> Vec<XmlEvent<'_>> {
        let mut reader = XmlReader::new(src);
        let mut out = Vec::new();
        while let Some(event) = reader.next_event().unwrap() {
            out.push(event);
        }
        out
    }

    #[test]
    fn test_element_with_attributes() {
        let evs = events(r#"<tileset name="dungeon" columns="8"></tileset>"#);
        assert_eq!(evs.len(), 2);
        match &evs[0] {
            XmlEvent::StartElement {
                name,
                attributes,
                self_closing,
            } => {
                assert_eq!(*name, "tileset");
                assert!(!self_closing);
                assert_eq!(attributes[0].name, "name");
                assert_eq!(attributes[0].value, "dungeon");
                assert_eq!(attributes[1].value, "8");
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert_eq!(evs[1], XmlEvent::EndElement { name: "tileset" });
    }

    #[test]
    fn test_self_closing_and_quote_styles() {
        let evs = events(r#"<image source='a.png' width="32"/>"#);
        match &evs[0] {
            XmlEvent::StartElement {
                self_closing,
                attributes,
                ..
            } => {
                assert!(self_closing);
                assert_eq!(attributes[0].value, "a.png");
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_prolog_comment_and_doctype_skipped() {
        let evs = events(
            "<?xml version=\"1.0\"?>\n<!DOCTYPE tileset>\n<!-- a comment -->\n<tileset/>",
        );
        assert_eq!(evs.len(), 1);
    }

    #[test]
    fn test_entities_decode() {
        let evs = events(r#"<property value="&lt;a&gt; &amp; &quot;b&quot; &apos;c&apos;"/>"#);
        match &evs[0] {
            XmlEvent::StartElement { attributes, .. } => {
                assert_eq!(attributes[0].value, r#"<a> & "b" 'c'"#);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_borrowed_value_without_entities() {
        let src = r#"<a v="plain"/>"#;
        let mut reader = XmlReader::new(src);
        match reader.next_event().unwrap() {
            Some(XmlEvent::StartElement { attributes, .. }) => {
                assert!(matches!(attributes[0].value, Cow::Borrowed("plain")));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_text_events_skip_whitespace_runs() {
        let evs = events("<a>\n  \n</a>");
        assert_eq!(evs.len(), 2);
        let evs = events("<a>fish &amp; chips</a>");
        assert_eq!(evs[1], XmlEvent::Text(Cow::Owned("fish & chips".to_owned())));
    }

    #[test]
    fn test_unknown_entity_is_positioned() {
        let mut reader = XmlReader::new("<a>\n<b v=\"x &bogus; y\"/>");
        reader.next_event().unwrap();
        let err = reader.next_event().unwrap_err();
        assert_eq!(err.line, 2);
        assert_eq!(err.column, 9);
        assert!(err.message.contains("bogus"), "{}", err.message);
    }

    #[test]
    fn test_unterminated_tag() {
        let mut reader = XmlReader::new("<tileset name=\"x\"");
        assert!(reader.next_event().is_err());
    }

    #[test]
    fn test_missing_equals() {
        let mut reader = XmlReader::new("<tileset name>");
        let err = reader.next_event().unwrap_err();
        assert!(err.message.contains("name"), "{}", err.message);
    }

    #[test]
    fn test_skip_element_descends_into_children() {
        let src = "<a><b><c/><d>text</d></b><e/></a>";
        let mut reader = XmlReader::new(src);
        reader.next_event().unwrap(); // <a>
        reader.next_event().unwrap(); // <b>
        reader.skip_element().unwrap();
        match reader.next_event().unwrap() {
            Some(XmlEvent::StartElement { name: "e", .. }) => {}
            other => panic!("expected <e>, got {other:?}"),
        }
    }
}
