//! Owned, mutable document tree.

/// A child of an element.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
    Comment(String),
}

impl Node {
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(e) => Some(e),
            _ => None,
        }
    }

    /// True for text nodes holding something other than whitespace.
    pub fn is_significant_text(&self) -> bool {
        matches!(self, Node::Text(t) if !t.trim().is_empty())
    }
}

/// An element with its qualified name (`prefix:local` when prefixed).
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub name: String,
    /// Attributes in document order; keys are unique.
    pub attributes: Vec<(String, String)>,
    /// 1-based source line, 0 for elements built in memory.
    pub line: u32,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            line: 0,
            children: Vec::new(),
        }
    }

    pub fn local_name(&self) -> &str {
        match self.name.rsplit_once(':') {
            Some((_, local)) => local,
            None => &self.name,
        }
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn id(&self) -> Option<&str> {
        self.attr("id")
    }

    /// Replace the value in place, or append the attribute if absent.
    pub fn set_attr(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| k == key) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((key.to_string(), value)),
        }
    }

    pub fn remove_attr(&mut self, key: &str) -> Option<String> {
        let index = self.attributes.iter().position(|(k, _)| k == key)?;
        Some(self.attributes.remove(index).1)
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(Node::as_element)
    }

    /// Concatenation of the direct text children.
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|n| match n {
                Node::Text(t) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Drop every child and leave a single text node.
    pub fn set_text(&mut self, text: impl Into<String>) {
        let text = text.into();
        self.children.clear();
        if !text.is_empty() {
            self.children.push(Node::Text(text));
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub root: Element,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attr_replace_keeps_position() {
        let mut e = Element::new("circle");
        e.set_attr("id", "connector0pin");
        e.set_attr("r", "0");
        e.set_attr("id", "connector1pin");
        e.set_attr("fill", "none");
        let keys: Vec<&str> = e.attributes.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["id", "r", "fill"]);
        assert_eq!(e.remove_attr("r").as_deref(), Some("0"));
        assert_eq!(e.attr("r"), None);
    }

    #[test]
    fn test_local_name_strips_prefix() {
        assert_eq!(Element::new("sodipodi:namedview").local_name(), "namedview");
        assert_eq!(Element::new("svg").local_name(), "svg");
    }
}
