//! Minimal element tree over quick-xml, with a strict and a tag-soup mode.
//!
//! Strict mode rejects mismatched or unclosed tags. Permissive mode closes
//! elements the way an HTML parser would: a stray end tag closes the nearest
//! open element of that name (or is ignored), and anything still open at end
//! of input is closed implicitly. Element names are always local names, so
//! `<ns:issuer>` and `<issuer>` are the same element.

use quick_xml::Reader;
use quick_xml::events::Event;
use tracing::debug;

use crate::error::MarkupError;

const DOCUMENT_ROOT: &str = "#document";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Mode {
    Strict,
    Permissive,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Element {
    pub name: String,
    pub text: String,
    pub children: Vec<Element>,
}

impl Element {
    fn named(name: String) -> Self {
        Self {
            name,
            ..Default::default()
        }
    }

    /// Trimmed text content, if non-empty.
    pub fn text(&self) -> Option<&str> {
        let t = self.text.trim();
        (!t.is_empty()).then_some(t)
    }

    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    /// First descendant with this name, depth-first in document order.
    pub fn find(&self, name: &str) -> Option<&Element> {
        for child in &self.children {
            if child.name == name {
                return Some(child);
            }
            if let Some(found) = child.find(name) {
                return Some(found);
            }
        }
        None
    }

    /// All descendants with this name, in document order.
    pub fn find_all<'a>(&'a self, name: &str) -> Vec<&'a Element> {
        let mut out = Vec::new();
        self.collect(name, &mut out);
        out
    }

    fn collect<'a>(&'a self, name: &str, out: &mut Vec<&'a Element>) {
        for child in &self.children {
            if child.name == name {
                out.push(child);
            }
            child.collect(name, out);
        }
    }

    /// Follow a path of element names. Each step prefers a direct child and
    /// falls back to any descendant, since filers nest elements inconsistently.
    pub fn lookup(&self, path: &[&str]) -> Option<&Element> {
        let mut node = self;
        for step in path {
            node = node.child(step).or_else(|| node.find(step))?;
        }
        Some(node)
    }

    pub fn text_at(&self, path: &[&str]) -> Option<&str> {
        self.lookup(path)?.text()
    }
}

/// Parse `doc` into a tree rooted at a synthetic document element.
pub(crate) fn parse(doc: &str, mode: Mode) -> Result<Element, MarkupError> {
    let mut reader = Reader::from_str(doc);
    {
        let config = reader.config_mut();
        config.trim_text(true);
        if mode == Mode::Permissive {
            config.check_end_names = false;
            config.allow_unmatched_ends = true;
        }
    }

    let mut stack = vec![Element::named(DOCUMENT_ROOT.to_string())];

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                stack.push(Element::named(local_name(e.local_name().as_ref())));
            }
            Ok(Event::Empty(e)) => {
                let element = Element::named(local_name(e.local_name().as_ref()));
                attach(&mut stack, element);
            }
            Ok(Event::End(e)) => {
                let name = local_name(e.local_name().as_ref());
                close(&mut stack, &name, mode)?;
            }
            Ok(Event::Text(t)) => {
                let text = match t.unescape() {
                    Ok(s) => s.into_owned(),
                    Err(err) if mode == Mode::Strict => {
                        return Err(MarkupError::Xml(err.to_string()));
                    }
                    Err(_) => String::from_utf8_lossy(&t).into_owned(),
                };
                append_text(&mut stack, &text);
            }
            Ok(Event::CData(c)) => {
                append_text(&mut stack, &String::from_utf8_lossy(&c));
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(err) => match mode {
                Mode::Strict => return Err(MarkupError::Xml(err.to_string())),
                Mode::Permissive => {
                    debug!(error = %err, "tag-soup parse stopped early");
                    break;
                }
            },
        }
    }

    if stack.len() > 1 {
        if mode == Mode::Strict {
            return Err(MarkupError::Truncated {
                open: stack.len() - 1,
            });
        }
        while stack.len() > 1 {
            pop_into_parent(&mut stack);
        }
    }

    let root = stack.pop().ok_or(MarkupError::Empty)?;
    if root.children.is_empty() {
        return Err(MarkupError::Empty);
    }
    Ok(root)
}

fn local_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).into_owned()
}

fn attach(stack: &mut [Element], element: Element) {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(element);
    }
}

fn append_text(stack: &mut [Element], text: &str) {
    if let Some(current) = stack.last_mut() {
        if !current.text.is_empty() {
            current.text.push(' ');
        }
        current.text.push_str(text);
    }
}

fn pop_into_parent(stack: &mut Vec<Element>) {
    if stack.len() > 1
        && let Some(done) = stack.pop()
    {
        attach(stack, done);
    }
}

fn close(stack: &mut Vec<Element>, name: &str, mode: Mode) -> Result<(), MarkupError> {
    match mode {
        Mode::Strict => {
            if stack.len() <= 1 || stack.last().map(|e| e.name.as_str()) != Some(name) {
                return Err(MarkupError::Xml(format!("unexpected end tag </{name}>")));
            }
            pop_into_parent(stack);
        }
        Mode::Permissive => {
            // Index 0 is the document root and never closes.
            let Some(pos) = stack.iter().skip(1).rposition(|e| e.name == name) else {
                return Ok(());
            };
            let depth = pos + 1;
            while stack.len() > depth {
                pop_into_parent(stack);
            }
        }
    }
    Ok(())
}
