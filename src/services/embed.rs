//! `embed` query parameter resolution.
//!
//! The raw parameter is split once per request (`EmbedRequest`) and then
//! filtered independently for each resource type being served, against that
//! type's whitelist. Unknown or garbled names are dropped, never rejected.
use std::sync::Arc;

/// Relation names a client may ask to have embedded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Relation {
    Owner,
    Folders,
    Bookmarks,
    Parent,
}

impl Relation {
    pub fn as_str(self) -> &'static str {
        match self {
            Relation::Owner => "owner",
            Relation::Folders => "folders",
            Relation::Bookmarks => "bookmarks",
            Relation::Parent => "parent",
        }
    }

    const ALL: [Relation; 4] = [
        Relation::Owner,
        Relation::Folders,
        Relation::Bookmarks,
        Relation::Parent,
    ];

    fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.as_str() == name)
    }
}

/// Resource types that accept embeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Bookmark,
    Folder,
}

impl ResourceKind {
    /// Add relations here to allow embedding them through `?embed=`.
    pub fn whitelist(self) -> &'static [Relation] {
        match self {
            ResourceKind::Bookmark => &[Relation::Owner, Relation::Folders],
            ResourceKind::Folder => &[Relation::Owner, Relation::Parent, Relation::Bookmarks],
        }
    }

    pub fn allows(self, relation: Relation) -> bool {
        self.whitelist().contains(&relation)
    }
}

/// Validated, ordered, duplicate-free embeds for one resource type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmbedSet(Vec<Relation>);

impl EmbedSet {
    pub fn contains(&self, relation: Relation) -> bool {
        self.0.contains(&relation)
    }

    #[cfg(test)]
    pub fn as_slice(&self) -> &[Relation] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// The request's raw embed names: trimmed, non-empty, first occurrence kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmbedRequest(Arc<[String]>);

impl EmbedRequest {
    pub fn from_query_value(raw: Option<&str>) -> Self {
        let mut names: Vec<String> = Vec::new();
        for name in raw.unwrap_or_default().split(',').map(str::trim) {
            if !name.is_empty() && !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        }
        Self(names.into())
    }

    pub fn names(&self) -> &[String] {
        &self.0
    }

    /// Keep only the names valid for `kind`, in request order.
    pub fn resolve(&self, kind: ResourceKind) -> EmbedSet {
        let mut out: Vec<Relation> = Vec::new();
        for relation in self.0.iter().filter_map(|n| Relation::from_name(n)) {
            if kind.allows(relation) && !out.contains(&relation) {
                out.push(relation);
            }
        }
        EmbedSet(out)
    }
}
