//! Frontmatter codec (component A): parse/serialize YAML frontmatter and
//! body, enforcing the identity-field ordering invariant on every write.
//!
//! Frontmatter is kept as an **ordered** sequence of key/value pairs rather
//! than a `HashMap` so that unknown local keys round-trip in their original
//! relative order (see §9's "dynamic mappings" design note).

use serde_yaml::Value;

const FRONTMATTER_OPEN: &str = "---\n";

/// A parsed document: its frontmatter (possibly empty) and body text.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub frontmatter: Frontmatter,
    pub body: String,
    /// Whether the raw content actually opened with a frontmatter block.
    /// A document can have an empty `Frontmatter` and still have had one
    /// (e.g. `---\n---\n`), which matters for round-tripping.
    pub had_frontmatter: bool,
}

/// A sync-managed frontmatter key, per §3's fixed ordering list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncManagedKey {
    CastId,
    CastType,
    CastVersion,
    CastVaults,
    CastCodebases,
}

impl SyncManagedKey {
    pub fn classify(key: &str) -> Option<Self> {
        match key {
            "cast-id" => Some(Self::CastId),
            "cast-type" => Some(Self::CastType),
            "cast-version" => Some(Self::CastVersion),
            "cast-vaults" => Some(Self::CastVaults),
            "cast-codebases" => Some(Self::CastCodebases),
            _ => None,
        }
    }

    fn order_rank(self) -> u8 {
        match self {
            Self::CastId => 0,
            Self::CastType => 1,
            Self::CastVersion => 2,
            Self::CastVaults => 3,
            Self::CastCodebases => 4,
        }
    }
}

/// A frontmatter value. Mirrors `serde_yaml::Value`'s shape but keeps
/// mapping entries in an explicit, order-preserving `Vec` rather than
/// relying on the serializer's own map representation.
#[derive(Debug, Clone, PartialEq)]
pub enum FrontmatterValue {
    Scalar(Value),
    Sequence(Vec<FrontmatterValue>),
    Mapping(Vec<(String, FrontmatterValue)>),
}

impl FrontmatterValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Scalar(Value::String(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    fn from_yaml(value: Value) -> Self {
        match value {
            Value::Sequence(items) => {
                Self::Sequence(items.into_iter().map(Self::from_yaml).collect())
            }
            Value::Mapping(map) => Self::Mapping(
                map.into_iter()
                    .filter_map(|(k, v)| {
                        k.as_str()
                            .map(|k| (k.to_string(), Self::from_yaml(v)))
                    })
                    .collect(),
            ),
            other => Self::Scalar(other),
        }
    }

    fn to_yaml(&self) -> Value {
        match self {
            Self::Scalar(v) => v.clone(),
            Self::Sequence(items) => Value::Sequence(items.iter().map(Self::to_yaml).collect()),
            Self::Mapping(entries) => {
                let mut map = serde_yaml::Mapping::new();
                for (k, v) in entries {
                    map.insert(Value::String(k.clone()), v.to_yaml());
                }
                Value::Mapping(map)
            }
        }
    }
}

/// Ordered frontmatter key/value pairs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frontmatter {
    entries: Vec<(String, FrontmatterValue)>,
}

impl Frontmatter {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn get(&self, key: &str) -> Option<&FrontmatterValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn first_key(&self) -> Option<&String> {
        self.entries.first().map(|(k, _)| k)
    }

    pub fn set(&mut self, key: &str, value: FrontmatterValue) {
        if let Some(entry) = self.entries.iter_mut().find(|(k, _)| k == key) {
            entry.1 = value;
        } else {
            self.entries.push((key.to_string(), value));
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<FrontmatterValue> {
        let idx = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(idx).1)
    }

    /// Produces keys in the canonical order: `cast-id`, then remaining
    /// sync-managed keys in the fixed order `cast-type, cast-version,
    /// cast-vaults, cast-codebases`, then local keys in their prior
    /// relative order.
    fn canonical_key_order(&self) -> Vec<String> {
        let mut sync_managed: Vec<(u8, &str)> = Vec::new();
        let mut local: Vec<&str> = Vec::new();

        for (k, _) in &self.entries {
            match SyncManagedKey::classify(k) {
                Some(kind) => sync_managed.push((kind.order_rank(), k.as_str())),
                None => local.push(k.as_str()),
            }
        }
        sync_managed.sort_by_key(|(rank, _)| *rank);

        sync_managed
            .into_iter()
            .map(|(_, k)| k.to_string())
            .chain(local.into_iter().map(|k| k.to_string()))
            .collect()
    }

    pub fn is_canonically_ordered(&self) -> bool {
        let current: Vec<&str> = self.entries.iter().map(|(k, _)| k.as_str()).collect();
        let canonical = self.canonical_key_order();
        current == canonical.iter().map(|k| k.as_str()).collect::<Vec<_>>()
    }

    /// Rewrite `entries` into canonical order in place.
    pub fn reorder_canonically(&mut self) {
        let order = self.canonical_key_order();
        let mut remaining = std::mem::take(&mut self.entries);
        let mut reordered = Vec::with_capacity(remaining.len());
        for key in order {
            if let Some(pos) = remaining.iter().position(|(k, _)| *k == key) {
                reordered.push(remaining.remove(pos));
            }
        }
        self.entries = reordered;
    }

    /// Insert or overwrite `cast-id` and move the frontmatter into
    /// canonical order.
    pub fn inject_cast_id(&mut self, id: crate::identity::DocId) {
        self.set(
            "cast-id",
            FrontmatterValue::Scalar(Value::String(id.to_string())),
        );
        self.reorder_canonically();
    }

    pub fn promote_cast_id_first(&mut self) {
        self.reorder_canonically();
    }

    fn to_yaml_mapping(&self) -> serde_yaml::Mapping {
        let mut map = serde_yaml::Mapping::new();
        for (k, v) in &self.entries {
            map.insert(Value::String(k.clone()), v.to_yaml());
        }
        map
    }
}

fn normalize_line_endings(content: &str) -> String {
    content.replace("\r\n", "\n").replace('\r', "\n")
}

/// Parse markdown content into a [`Document`].
///
/// Recognizes frontmatter only when content begins with `---\n` and a
/// subsequent line equal to `---` closes it. All other shapes (missing
/// opener, missing closer, non-mapping YAML) degrade to "no frontmatter,
/// body is whole file" and return `Ok`. Returns `Err` only when the
/// delimited region is present but is not even syntactically valid YAML.
pub fn parse(content: &str) -> Result<Document, String> {
    let content = normalize_line_endings(content);

    if !content.starts_with(FRONTMATTER_OPEN) {
        return Ok(Document {
            frontmatter: Frontmatter::default(),
            body: content,
            had_frontmatter: false,
        });
    }

    let after_open = &content[FRONTMATTER_OPEN.len()..];
    let (fm_end, body_start) = match find_closing_delimiter(after_open) {
        Some(bounds) => bounds,
        None => {
            return Ok(Document {
                frontmatter: Frontmatter::default(),
                body: content,
                had_frontmatter: false,
            })
        }
    };

    let fm_text = &after_open[..fm_end];
    let body = after_open[body_start..].to_string();

    let value: Value = match serde_yaml::from_str(fm_text) {
        Ok(v) => v,
        Err(e) => return Err(format!("invalid YAML: {e}")),
    };

    match value {
        Value::Null => Ok(Document {
            frontmatter: Frontmatter::default(),
            body,
            had_frontmatter: true,
        }),
        Value::Mapping(map) => {
            let entries = map
                .into_iter()
                .filter_map(|(k, v)| {
                    k.as_str()
                        .map(|k| (k.to_string(), FrontmatterValue::from_yaml(v)))
                })
                .collect();
            Ok(Document {
                frontmatter: Frontmatter { entries },
                body,
                had_frontmatter: true,
            })
        }
        _ => Ok(Document {
            frontmatter: Frontmatter::default(),
            body: content,
            had_frontmatter: false,
        }),
    }
}

/// Find the line consisting solely of `---` that closes the frontmatter
/// block. Returns `(frontmatter_text_end, body_start)` byte offsets into
/// `after_open`, where `frontmatter_text_end` excludes the closing line and
/// `body_start` is the offset right after it (and its trailing newline, if
/// any).
fn find_closing_delimiter(after_open: &str) -> Option<(usize, usize)> {
    let mut pos = 0usize;
    for line in after_open.split_inclusive('\n') {
        let trimmed = line.strip_suffix('\n').unwrap_or(line);
        if trimmed == "---" {
            return Some((pos, pos + line.len()));
        }
        pos += line.len();
    }
    None
}

/// Serialize a document back to markdown text, applying the canonical
/// frontmatter key order (§4.A) regardless of the order it arrived in.
pub fn serialize(document: &Document) -> String {
    if document.frontmatter.is_empty() {
        if document.had_frontmatter {
            return format!("---\n---\n{}", document.body);
        }
        return document.body.clone();
    }

    let mut canonical = document.frontmatter.clone();
    canonical.reorder_canonically();
    let mapping = canonical.to_yaml_mapping();
    let yaml = serde_yaml::to_string(&Value::Mapping(mapping))
        .unwrap_or_default();
    format!("{FRONTMATTER_OPEN}{yaml}---\n{}", document.body)
}
