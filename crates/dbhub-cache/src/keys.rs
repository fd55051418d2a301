//! Cache key construction
//!
//! A key is `{namespace}-{audience}-{digest}` where the digest is a SHA-256
//! over a length-prefixed, fixed-order encoding of the request shape.
//! Private keys can only be built with a viewer identity, so two viewers of
//! the same private database never share an entry, and a private entry can
//! never be addressed from the public path because the audience tag differs.

use std::fmt;

use sha2::{Digest, Sha256};

/// What kind of payload an entry holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// Resolved (bucket, object id) for a database version
    Location,
    /// Rendered JSON table view
    TableView,
    /// Rendered CSV export
    CsvExport,
    /// Rendered visualisation data
    VisData,
    /// Rendered database page data
    PageData,
    /// Rendered visualisation page data
    VisPage,
}

impl Namespace {
    pub fn tag(&self) -> &'static str {
        match self {
            Namespace::Location => "loc",
            Namespace::TableView => "tbl",
            Namespace::CsvExport => "csv",
            Namespace::VisData => "visdat",
            Namespace::PageData => "page",
            Namespace::VisPage => "vispage",
        }
    }
}

/// Whether the entry was computed from the public-only view of a database
/// or from the owner's unrestricted view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Audience {
    Public,
    Private,
}

impl Audience {
    pub fn tag(&self) -> &'static str {
        match self {
            Audience::Public => "pub",
            Audience::Private => "priv",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    namespace: Namespace,
    audience: Audience,
    digest: String,
}

impl CacheKey {
    /// Key for a result computed from the public-only view. The viewer is
    /// left out so every non-owner shares the entry; anything that varies
    /// per viewer (such as the row limit) must be added as a parameter.
    pub fn public(namespace: Namespace) -> CacheKeyBuilder {
        CacheKeyBuilder::new(namespace, Audience::Public, "")
    }

    /// Key for a result computed from the owner's unrestricted view
    pub fn private(namespace: Namespace, viewer: &str) -> CacheKeyBuilder {
        CacheKeyBuilder::new(namespace, Audience::Private, viewer)
    }

    pub fn namespace(&self) -> Namespace {
        self.namespace
    }

    pub fn audience(&self) -> Audience {
        self.audience
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{}",
            self.namespace.tag(),
            self.audience.tag(),
            self.digest
        )
    }
}

pub struct CacheKeyBuilder {
    namespace: Namespace,
    audience: Audience,
    viewer: String,
    owner: String,
    database: String,
    version: Option<i32>,
    table: String,
    params: Vec<(String, String)>,
}

impl CacheKeyBuilder {
    fn new(namespace: Namespace, audience: Audience, viewer: &str) -> Self {
        Self {
            namespace,
            audience,
            viewer: viewer.to_string(),
            owner: String::new(),
            database: String::new(),
            version: None,
            table: String::new(),
            params: Vec::new(),
        }
    }

    pub fn owner(mut self, owner: &str) -> Self {
        self.owner = owner.to_string();
        self
    }

    pub fn database(mut self, database: &str) -> Self {
        self.database = database.to_string();
        self
    }

    pub fn version(mut self, version: Option<i32>) -> Self {
        self.version = version;
        self
    }

    pub fn table(mut self, table: &str) -> Self {
        self.table = table.to_string();
        self
    }

    /// Extra request parameter. Parameters are fingerprinted in the order
    /// they are added.
    pub fn param(mut self, name: &str, value: impl ToString) -> Self {
        self.params.push((name.to_string(), value.to_string()));
        self
    }

    pub fn build(self) -> CacheKey {
        let mut hasher = Sha256::new();

        let version = self.version.map(|v| v.to_string()).unwrap_or_default();
        for field in [
            self.viewer.as_str(),
            self.owner.as_str(),
            self.database.as_str(),
            version.as_str(),
            self.table.as_str(),
        ] {
            write_field(&mut hasher, field);
        }

        hasher.update((self.params.len() as u64).to_be_bytes());
        for (name, value) in &self.params {
            write_field(&mut hasher, name);
            write_field(&mut hasher, value);
        }

        CacheKey {
            namespace: self.namespace,
            audience: self.audience,
            digest: hex::encode(hasher.finalize()),
        }
    }
}

// Length prefix keeps ("ab", "c") and ("a", "bc") apart
fn write_field(hasher: &mut Sha256, value: &str) {
    hasher.update((value.len() as u64).to_be_bytes());
    hasher.update(value.as_bytes());
}
