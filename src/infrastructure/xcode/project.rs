//! Xcode project metadata store
//!
//! Reads and writes target build settings in `project.pbxproj` (an OpenStep
//! property list). Only what the release needs is modelled: native targets,
//! their configuration lists and the build settings of each configuration.
//!
//! Edits are applied to the original text by byte span, so everything the
//! store does not touch (comments, ordering, formatting) is preserved.

use std::fs;
use std::ops::Range;
use std::path::{Path, PathBuf};

use crate::error::ProjectError;

pub const MARKETING_VERSION: &str = "MARKETING_VERSION";
pub const CURRENT_PROJECT_VERSION: &str = "CURRENT_PROJECT_VERSION";

const PBXPROJ: &str = "project.pbxproj";

/// A parsed `project.pbxproj`
#[derive(Debug)]
pub struct ProjectFile {
    path: PathBuf,
    contents: String,
    root: Dict,
}

impl ProjectFile {
    /// Open `<name>.xcodeproj` (or a `project.pbxproj` path directly)
    pub fn open(project: &Path) -> Result<Self, ProjectError> {
        let path = if project.extension().and_then(|e| e.to_str()) == Some("pbxproj") {
            project.to_path_buf()
        } else {
            project.join(PBXPROJ)
        };
        let contents = fs::read_to_string(&path)?;
        Self::parse(path, contents)
    }

    pub fn parse(path: PathBuf, contents: String) -> Result<Self, ProjectError> {
        let root = Parser::new(&contents).document()?;
        Ok(Self {
            path,
            contents,
            root,
        })
    }

    pub fn save(&self) -> Result<(), ProjectError> {
        fs::write(&self.path, &self.contents)?;
        Ok(())
    }

    pub fn marketing_version(&self, target: &str, configuration: &str) -> Result<String, ProjectError> {
        let settings = self.build_settings(target, configuration)?;
        settings
            .get(MARKETING_VERSION)
            .and_then(Value::as_scalar)
            .map(|s| s.text.clone())
            .ok_or_else(|| ProjectError::VersionNotFound(target.to_string()))
    }

    pub fn build_number(&self, target: &str, configuration: &str) -> Result<u64, ProjectError> {
        let settings = self.build_settings(target, configuration)?;
        let raw = settings
            .get(CURRENT_PROJECT_VERSION)
            .and_then(Value::as_scalar)
            .ok_or_else(|| ProjectError::BuildNumberNotFound(target.to_string()))?;
        raw.text
            .trim()
            .parse()
            .map_err(|_| ProjectError::BuildNumberNotInteger(raw.text.clone()))
    }

    /// Set `CURRENT_PROJECT_VERSION` in every configuration of `target`
    pub fn set_build_number(&mut self, target: &str, build_number: u64) -> Result<(), ProjectError> {
        let mut edits: Vec<(Range<usize>, String)> = Vec::new();

        for config in self.configurations(target)? {
            let Some(settings) = config.get("buildSettings").and_then(Value::as_dict) else {
                continue;
            };
            match settings.get(CURRENT_PROJECT_VERSION).and_then(Value::as_scalar) {
                Some(existing) => edits.push((existing.span.clone(), build_number.to_string())),
                None => {
                    let line_start = self.contents[..settings.close]
                        .rfind('\n')
                        .map(|i| i + 1)
                        .unwrap_or(settings.close);
                    let indent = &self.contents[line_start..settings.close];
                    if indent.trim().is_empty() {
                        edits.push((
                            line_start..line_start,
                            format!("{}\t{} = {};\n", indent, CURRENT_PROJECT_VERSION, build_number),
                        ));
                    } else {
                        // `buildSettings = { ... };` on a single line
                        edits.push((
                            settings.close..settings.close,
                            format!("{} = {}; ", CURRENT_PROJECT_VERSION, build_number),
                        ));
                    }
                }
            }
        }

        if edits.is_empty() {
            return Err(ProjectError::NoBuildConfigurations(target.to_string()));
        }

        // Back to front so earlier offsets stay valid
        edits.sort_by(|a, b| b.0.start.cmp(&a.0.start));
        let mut contents = self.contents.clone();
        for (range, text) in edits {
            contents.replace_range(range, &text);
        }

        *self = Self::parse(self.path.clone(), contents)?;
        Ok(())
    }

    fn objects(&self) -> Result<&Dict, ProjectError> {
        self.root
            .get("objects")
            .and_then(Value::as_dict)
            .ok_or_else(|| ProjectError::Parse {
                offset: 0,
                message: "missing objects dictionary".to_string(),
            })
    }

    fn object(&self, id: &str) -> Option<&Dict> {
        self.objects().ok()?.get(id).and_then(Value::as_dict)
    }

    fn native_target(&self, target: &str) -> Result<&Dict, ProjectError> {
        self.objects()?
            .entries
            .iter()
            .filter_map(|(_, v)| v.as_dict())
            .find(|obj| obj.str("isa") == Some("PBXNativeTarget") && obj.str("name") == Some(target))
            .ok_or_else(|| ProjectError::TargetNotFound(target.to_string()))
    }

    fn configurations(&self, target: &str) -> Result<Vec<&Dict>, ProjectError> {
        let native = self.native_target(target)?;
        let Some(list) = native
            .str("buildConfigurationList")
            .and_then(|id| self.object(id))
        else {
            return Ok(Vec::new());
        };

        Ok(list
            .get("buildConfigurations")
            .and_then(Value::as_array)
            .map(|ids| {
                ids.iter()
                    .filter_map(Value::as_scalar)
                    .filter_map(|id| self.object(&id.text))
                    .collect()
            })
            .unwrap_or_default())
    }

    fn build_settings(&self, target: &str, configuration: &str) -> Result<&Dict, ProjectError> {
        self.configurations(target)?
            .into_iter()
            .find(|c| c.str("name") == Some(configuration))
            .and_then(|c| c.get("buildSettings").and_then(Value::as_dict))
            .ok_or_else(|| ProjectError::ConfigurationNotFound {
                target: target.to_string(),
                configuration: configuration.to_string(),
            })
    }
}

#[derive(Debug, Clone)]
struct Scalar {
    text: String,
    /// Byte range of the token in the source, quotes included
    span: Range<usize>,
}

#[derive(Debug, Clone)]
enum Value {
    Scalar(Scalar),
    Array(Vec<Value>),
    Dict(Dict),
}

impl Value {
    fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Self::Scalar(s) => Some(s),
            _ => None,
        }
    }

    fn as_array(&self) -> Option<&[Value]> {
        match self {
            Self::Array(a) => Some(a),
            _ => None,
        }
    }

    fn as_dict(&self) -> Option<&Dict> {
        match self {
            Self::Dict(d) => Some(d),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
struct Dict {
    entries: Vec<(String, Value)>,
    /// Offset of the closing `}`
    close: usize,
}

impl Dict {
    fn get(&self, key: &str) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    fn str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_scalar).map(|s| s.text.as_str())
    }
}

struct Parser<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            bytes: src.as_bytes(),
            pos: 0,
        }
    }

    fn document(mut self) -> Result<Dict, ProjectError> {
        let root = match self.value()? {
            Value::Dict(d) => d,
            _ => return Err(self.error("expected root dictionary")),
        };
        if self.peek()?.is_some() {
            return Err(self.error("trailing content after root dictionary"));
        }
        Ok(root)
    }

    fn error(&self, message: &str) -> ProjectError {
        ProjectError::Parse {
            offset: self.pos,
            message: message.to_string(),
        }
    }

    fn skip_trivia(&mut self) -> Result<(), ProjectError> {
        loop {
            while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_whitespace() {
                self.pos += 1;
            }
            let rest = &self.src[self.pos..];
            if rest.starts_with("/*") {
                let end = rest
                    .find("*/")
                    .ok_or_else(|| self.error("unterminated comment"))?;
                self.pos += end + 2;
            } else if rest.starts_with("//") {
                self.pos += rest.find('\n').unwrap_or(rest.len());
            } else {
                return Ok(());
            }
        }
    }

    fn peek(&mut self) -> Result<Option<u8>, ProjectError> {
        self.skip_trivia()?;
        Ok(self.bytes.get(self.pos).copied())
    }

    fn expect(&mut self, c: u8) -> Result<(), ProjectError> {
        if self.peek()? == Some(c) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(&format!("expected '{}'", c as char)))
        }
    }

    fn value(&mut self) -> Result<Value, ProjectError> {
        match self.peek()? {
            Some(b'{') => self.dict().map(Value::Dict),
            Some(b'(') => self.array().map(Value::Array),
            Some(_) => self.scalar().map(Value::Scalar),
            None => Err(self.error("unexpected end of file")),
        }
    }

    fn dict(&mut self) -> Result<Dict, ProjectError> {
        self.expect(b'{')?;
        let mut entries = Vec::new();
        loop {
            if self.peek()? == Some(b'}') {
                let close = self.pos;
                self.pos += 1;
                return Ok(Dict { entries, close });
            }
            let key = self.scalar()?.text;
            self.expect(b'=')?;
            let value = self.value()?;
            self.expect(b';')?;
            entries.push((key, value));
        }
    }

    fn array(&mut self) -> Result<Vec<Value>, ProjectError> {
        self.expect(b'(')?;
        let mut items = Vec::new();
        loop {
            if self.peek()? == Some(b')') {
                self.pos += 1;
                return Ok(items);
            }
            items.push(self.value()?);
            match self.peek()? {
                Some(b',') => self.pos += 1,
                Some(b')') => {}
                _ => return Err(self.error("expected ',' or ')'")),
            }
        }
    }

    fn scalar(&mut self) -> Result<Scalar, ProjectError> {
        match self.peek()? {
            Some(b'"') => self.quoted(),
            Some(_) => self.bare(),
            None => Err(self.error("unexpected end of file")),
        }
    }

    fn bare(&mut self) -> Result<Scalar, ProjectError> {
        let start = self.pos;
        while let Some(&b) = self.bytes.get(self.pos) {
            if b.is_ascii_whitespace() || b"{}()=;,\"".contains(&b) {
                break;
            }
            self.pos += 1;
        }
        if self.pos == start {
            return Err(self.error("expected a string"));
        }
        Ok(Scalar {
            text: self.src[start..self.pos].to_string(),
            span: start..self.pos,
        })
    }

    fn quoted(&mut self) -> Result<Scalar, ProjectError> {
        let start = self.pos;
        self.pos += 1;
        let mut text = String::new();
        let src = self.src;
        let mut chars = src[self.pos..].char_indices();
        while let Some((i, c)) = chars.next() {
            match c {
                '"' => {
                    self.pos += i + 1;
                    return Ok(Scalar {
                        text,
                        span: start..self.pos,
                    });
                }
                '\\' => match chars.next() {
                    Some((_, 'n')) => text.push('\n'),
                    Some((_, 't')) => text.push('\t'),
                    Some((_, 'r')) => text.push('\r'),
                    Some((_, other)) => text.push(other),
                    None => break,
                },
                _ => text.push(c),
            }
        }
        self.pos = start;
        Err(self.error("unterminated string"))
    }
}
