//! Line-oriented VDF (Valve Data Format) reader and writer
//!
//! Handles the text format of Steam's per-user `localconfig.vdf`:
//!
//! ```text
//! "UserLocalConfigStore"
//! {
//!     "Software"
//!     {
//!         "LaunchOptions"		"wrapper %command%"
//!     }
//! }
//! ```
//!
//! Parsing is tolerant: a line that is neither a `"key" "value"` pair nor a
//! brace is taken as the key of the next block, so hand-edited files never
//! fail to load. Duplicate keys in one block are not preserved; the last
//! assignment wins. Values are kept verbatim, escape sequences included.

use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;

use crate::error::{Error, Result};

/// Ordered key → value mapping for one block
pub type Document = IndexMap<String, VdfValue>;

/// A VDF value - either a string or a nested block
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VdfValue {
    Leaf(String),
    Node(Document),
}

impl VdfValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            VdfValue::Leaf(s) => Some(s),
            VdfValue::Node(_) => None,
        }
    }

    pub fn as_node(&self) -> Option<&Document> {
        match self {
            VdfValue::Leaf(_) => None,
            VdfValue::Node(d) => Some(d),
        }
    }

    /// Get a nested value by key
    pub fn get(&self, key: &str) -> Option<&VdfValue> {
        self.as_node()?.get(key)
    }

    /// Get a string value by key
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key)?.as_str()
    }
}

impl From<&str> for VdfValue {
    fn from(s: &str) -> Self {
        VdfValue::Leaf(s.to_string())
    }
}

impl From<String> for VdfValue {
    fn from(s: String) -> Self {
        VdfValue::Leaf(s)
    }
}

impl From<Document> for VdfValue {
    fn from(d: Document) -> Self {
        VdfValue::Node(d)
    }
}

static PAIR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^"([^"]+)"\s+"(.*)"$"#).expect("static regex"));

/// A block still being filled. The root frame has no key.
struct Frame {
    key: Option<String>,
    entries: Document,
}

impl Frame {
    fn root() -> Self {
        Self { key: None, entries: Document::new() }
    }
}

/// Parse VDF text into its root block.
pub fn parse(content: &str) -> Document {
    let mut stack = vec![Frame::root()];
    let mut pending_key: Option<String> = None;

    for raw in content.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with("//") {
            continue;
        }

        match line {
            "{" => stack.push(Frame {
                key: pending_key.clone(),
                entries: Document::new(),
            }),
            "}" => {
                if stack.len() > 1 {
                    close_frame(&mut stack);
                }
            }
            _ => {
                if let Some(caps) = PAIR_RE.captures(line) {
                    let key = caps[1].to_string();
                    let value = caps[2].to_string();
                    if let Some(frame) = stack.last_mut() {
                        frame.entries.insert(key.clone(), VdfValue::Leaf(value));
                    }
                    pending_key = Some(key);
                } else {
                    pending_key = Some(line.trim_matches('"').to_string());
                }
            }
        }
    }

    // Unterminated blocks are kept rather than dropped
    while stack.len() > 1 {
        close_frame(&mut stack);
    }

    stack.pop().map(|root| root.entries).unwrap_or_default()
}

/// Pop the innermost block and attach it to its parent.
fn close_frame(stack: &mut Vec<Frame>) {
    let Some(frame) = stack.pop() else {
        return;
    };
    // A brace with no preceding key opens an anonymous block, which is discarded.
    if let (Some(key), Some(parent)) = (frame.key, stack.last_mut()) {
        parent.entries.insert(key, VdfValue::Node(frame.entries));
    }
}

/// Render a block as VDF text, one tab per nesting level.
pub fn serialize(doc: &Document) -> String {
    let mut out = String::new();
    write_block(&mut out, doc, 0);
    out
}

fn write_block(out: &mut String, doc: &Document, depth: usize) {
    let indent = "\t".repeat(depth);
    for (key, value) in doc {
        match value {
            VdfValue::Node(children) => {
                out.push_str(&format!("{indent}\"{key}\"\n{indent}{{\n"));
                write_block(out, children, depth + 1);
                out.push_str(&format!("{indent}}}\n"));
            }
            VdfValue::Leaf(v) => {
                out.push_str(&format!("{indent}\"{key}\"\t\t\"{v}\"\n"));
            }
        }
    }
}

/// Look up a dotted key such as `A.B.LaunchOptions`.
///
/// Returns `None` if any segment is missing or an intermediate value is a leaf.
pub fn get_path<'a>(doc: &'a Document, dotted_key: &str) -> Option<&'a VdfValue> {
    let mut segments = dotted_key.split('.');
    let mut current = doc.get(segments.next()?)?;
    for segment in segments {
        current = current.get(segment)?;
    }
    Some(current)
}

/// String value at a dotted key, if present and a leaf.
pub fn get_path_str<'a>(doc: &'a Document, dotted_key: &str) -> Option<&'a str> {
    get_path(doc, dotted_key)?.as_str()
}

/// Set a dotted key, creating intermediate blocks as needed.
///
/// Any leaf found where an intermediate block is required is replaced by
/// an empty block.
pub fn set_path(doc: &mut Document, dotted_key: &str, value: impl Into<VdfValue>) {
    let segments: Vec<&str> = dotted_key.split('.').collect();
    let Some((last, parents)) = segments.split_last() else {
        return;
    };

    let mut current = doc;
    for segment in parents {
        let slot = current
            .entry((*segment).to_string())
            .or_insert_with(|| VdfValue::Node(Document::new()));
        if let VdfValue::Leaf(_) = slot {
            *slot = VdfValue::Node(Document::new());
        }
        let VdfValue::Node(children) = slot else {
            return;
        };
        current = children;
    }
    current.insert((*last).to_string(), value.into());
}

pub fn read_file(path: &Path) -> Result<Document> {
    let content = fs::read_to_string(path).map_err(|e| Error::io("reading VDF", path, e))?;
    Ok(parse(&content))
}

pub fn write_file(path: &Path, doc: &Document) -> Result<()> {
    fs::write(path, serialize(doc)).map_err(|e| Error::io("writing VDF", path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOCALCONFIG: &str = r#"
"UserLocalConfigStore"
{
	// comment lines are ignored
	"Software"
	{
		"Valve"
		{
			"Steam"
			{
				"apps"
				{
					"331670"
					{
						"LastPlayed"		"1700000000"
						"LaunchOptions"		""
					}
				}
			}
		}
	}
	"friends"
	{
		"PersonaName"		"someone"
	}
}
"#;

    #[test]
    fn parses_nested_blocks_in_order() {
        let doc = parse(LOCALCONFIG);
        let store = doc.get("UserLocalConfigStore").and_then(VdfValue::as_node).unwrap();
        let keys: Vec<_> = store.keys().cloned().collect();
        assert_eq!(keys, vec!["Software", "friends"]);

        assert_eq!(
            get_path_str(&doc, "UserLocalConfigStore.Software.Valve.Steam.apps.331670.LastPlayed"),
            Some("1700000000")
        );
        assert_eq!(
            get_path_str(&doc, "UserLocalConfigStore.friends.PersonaName"),
            Some("someone")
        );
    }

    #[test]
    fn duplicate_leaf_keys_keep_last_value() {
        let doc = parse("\"root\"\n{\n\"k\"\t\"one\"\n\"k\"\t\"two\"\n}\n");
        assert_eq!(get_path_str(&doc, "root.k"), Some("two"));
        assert_eq!(doc["root"].as_node().unwrap().len(), 1);
    }

    #[test]
    fn malformed_line_becomes_pending_key() {
        let doc = parse("just some words\n{\n\"a\" \"b\"\n}\n");
        assert_eq!(get_path_str(&doc, "just some words.a"), Some("b"));
    }

    #[test]
    fn unbalanced_braces_are_tolerated() {
        let doc = parse("}\n\"outer\"\n{\n\"inner\"\n{\n\"x\"\t\"1\"\n");
        assert_eq!(get_path_str(&doc, "outer.inner.x"), Some("1"));
    }

    #[test]
    fn anonymous_block_is_dropped() {
        let doc = parse("{\n\"x\"\t\"1\"\n}\n\"y\"\t\"2\"\n");
        assert_eq!(doc.len(), 1);
        assert_eq!(get_path_str(&doc, "y"), Some("2"));
    }

    #[test]
    fn serialize_uses_tab_indentation() {
        let mut doc = Document::new();
        set_path(&mut doc, "a.b", "c");
        set_path(&mut doc, "d", "e");
        assert_eq!(
            serialize(&doc),
            "\"a\"\n{\n\t\"b\"\t\t\"c\"\n}\n\"d\"\t\t\"e\"\n"
        );
    }

    #[test]
    fn reparse_preserves_structure() {
        let doc = parse(LOCALCONFIG);
        assert_eq!(parse(&serialize(&doc)), doc);
    }

    #[test]
    fn set_path_replaces_leaf_on_the_way() {
        let mut doc = Document::new();
        set_path(&mut doc, "A", "leaf");
        set_path(&mut doc, "A.B.LaunchOptions", "wrapper %command%");
        assert_eq!(get_path_str(&doc, "A.B.LaunchOptions"), Some("wrapper %command%"));
        assert!(doc["A"].as_node().is_some());
    }

    #[test]
    fn get_path_reports_missing_segments() {
        let doc = parse(LOCALCONFIG);
        assert!(get_path(&doc, "UserLocalConfigStore.Nope").is_none());
        assert!(get_path(&doc, "UserLocalConfigStore.friends.PersonaName.deeper").is_none());
    }

    #[test]
    fn launch_option_survives_round_trip() {
        let mut doc = Document::new();
        set_path(&mut doc, "A.B.LaunchOptions", "wrapper %command%");
        let reparsed = parse(&serialize(&doc));
        assert_eq!(get_path_str(&reparsed, "A.B.LaunchOptions"), Some("wrapper %command%"));
    }

    #[test]
    fn values_keep_escapes_verbatim() {
        let text = "\"k\"\t\t\"C:\\\\Games\\\\mj.exe -launcher %command%\"\n";
        let doc = parse(text);
        assert_eq!(get_path_str(&doc, "k"), Some(r"C:\\Games\\mj.exe -launcher %command%"));
        assert_eq!(serialize(&doc), text);
    }
}
