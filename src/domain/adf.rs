//! Atlassian Document Format
//!
//! Jira comments are rich-text documents: a `doc` root holding block nodes
//! (paragraphs) which hold inline `text` nodes with optional marks. Modelled
//! as closed serde-tagged enums so both directions are checked by the type.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentKind {
    #[serde(rename = "doc")]
    Doc,
}

/// Root of a document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub version: u32,
    #[serde(rename = "type")]
    pub kind: DocumentKind,
    pub content: Vec<Node>,
}

impl Document {
    pub fn new(content: Vec<Node>) -> Self {
        Self {
            version: 1,
            kind: DocumentKind::Doc,
            content,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Node {
    Paragraph {
        content: Vec<Node>,
    },
    Text {
        text: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        marks: Vec<Mark>,
    },
}

impl Node {
    pub fn paragraph(content: Vec<Node>) -> Self {
        Self::Paragraph { content }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::Text {
            text: text.into(),
            marks: Vec::new(),
        }
    }

    pub fn emphasis(text: impl Into<String>) -> Self {
        Self::Text {
            text: text.into(),
            marks: vec![Mark::Em],
        }
    }

    pub fn link(text: impl Into<String>, href: impl Into<String>) -> Self {
        Self::Text {
            text: text.into(),
            marks: vec![Mark::Link {
                attrs: LinkAttrs { href: href.into() },
            }],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Mark {
    Em,
    Link { attrs: LinkAttrs },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkAttrs {
    pub href: String,
}

/// Body of `POST /rest/api/3/issue/{ticket}/comment`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub body: Document,
}

impl Comment {
    pub fn new(content: Vec<Node>) -> Self {
        Self {
            body: Document::new(content),
        }
    }
}
