//! Store paths and the closed set of root namespaces.
//!
//! Every document in the store lives under one of five roots:
//!
//! - `profiles/{userUid}` for user profile documents
//! - `public/{messageId}` for the shared message board
//! - `tests/{messageId}` for the message board used by smoke tests
//! - `chats/{fromUid}/{toUid}/{messageId}` for direct messages
//! - `friends/{ownerUid}/{friendUid}` for friend edges
//!
//! Chat and friend keys are directional. `chats/a/b/..` and `chats/b/a/..`
//! are different threads, and a friend edge is not mirrored.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{TypeError, TypeResult};

/// Characters the store refuses inside a single key segment.
const FORBIDDEN_CHARS: &[char] = &['.', '#', '$', '[', ']'];

/// Child field that message queries are ordered by.
pub const MESSAGE_ORDER_KEY: &str = "sentAtEpochMillis";

/// Root namespace of a store path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Namespace {
    Profiles,
    Public,
    Chats,
    Friends,
    Tests,
}

impl Namespace {
    /// All namespaces, in declaration order.
    pub const ALL: [Namespace; 5] = [
        Namespace::Profiles,
        Namespace::Public,
        Namespace::Chats,
        Namespace::Friends,
        Namespace::Tests,
    ];

    /// The bare segment name, e.g. `"chats"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::Profiles => "profiles",
            Namespace::Public => "public",
            Namespace::Chats => "chats",
            Namespace::Friends => "friends",
            Namespace::Tests => "tests",
        }
    }

    /// The root path with a trailing slash, e.g. `"chats/"`.
    pub fn root(&self) -> String {
        format!("{}/", self.as_str())
    }

    /// Parse a namespace tag.
    ///
    /// Surrounding slashes are tolerated so that `"/public/"`, `"public/"`
    /// and `"public"` all name the same root.
    pub fn parse(tag: &str) -> TypeResult<Self> {
        let trimmed = tag.trim().trim_matches('/');
        Namespace::ALL
            .into_iter()
            .find(|ns| ns.as_str() == trimmed)
            .ok_or_else(|| TypeError::UnknownNamespace(tag.to_string()))
    }
}

impl FromStr for Namespace {
    type Err = TypeError;

    fn from_str(s: &str) -> TypeResult<Self> {
        Namespace::parse(s)
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validate a single key segment.
///
/// A segment must be non-empty and must not contain `/`, control characters,
/// or any of `. # $ [ ]`.
pub fn validate_key(key: &str) -> TypeResult<()> {
    if key.is_empty() {
        return Err(TypeError::InvalidKey {
            key: key.to_string(),
            reason: "key must not be empty".into(),
        });
    }
    if key.contains('/') {
        return Err(TypeError::InvalidKey {
            key: key.to_string(),
            reason: "key must not contain '/'".into(),
        });
    }
    if let Some(ch) = key
        .chars()
        .find(|c| FORBIDDEN_CHARS.contains(c) || c.is_control())
    {
        return Err(TypeError::InvalidKey {
            key: key.to_string(),
            reason: format!("contains forbidden character: {ch:?}"),
        });
    }
    Ok(())
}

/// Normalize a caller-supplied path into its canonical slash-joined form.
///
/// Leading, trailing and repeated slashes are dropped, so `"/public/"` and
/// `"public"` normalize to the same string. The namespace is not checked
/// here; reads may target any path.
pub fn normalize_path(path: &str) -> TypeResult<String> {
    let segments: Vec<&str> = path
        .trim()
        .split('/')
        .filter(|s| !s.is_empty())
        .collect();
    if segments.is_empty() {
        return Err(TypeError::EmptyPath);
    }
    for segment in &segments {
        validate_key(segment)?;
    }
    Ok(segments.join("/"))
}

/// A namespace-qualified store path.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DatabasePath {
    namespace: Namespace,
    keys: Vec<String>,
}

impl DatabasePath {
    /// The root of a namespace, with no sub-keys.
    pub fn root(namespace: Namespace) -> Self {
        Self {
            namespace,
            keys: Vec::new(),
        }
    }

    /// Build a path from a namespace and validated sub-keys.
    pub fn new<I, S>(namespace: Namespace, keys: I) -> TypeResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let keys: Vec<String> = keys.into_iter().map(Into::into).collect();
        for key in &keys {
            validate_key(key)?;
        }
        Ok(Self { namespace, keys })
    }

    /// Parse a path whose first segment must be one of the known namespaces.
    pub fn parse(path: &str) -> TypeResult<Self> {
        let normalized = normalize_path(path)?;
        let mut segments = normalized.split('/');
        let head = segments.next().ok_or(TypeError::EmptyPath)?;
        let namespace = Namespace::parse(head)?;
        Self::new(namespace, segments)
    }

    /// `profiles/{userUid}`
    pub fn profile(user_uid: &str) -> TypeResult<Self> {
        Self::new(Namespace::Profiles, [user_uid])
    }

    /// `{namespace}/{messageId}` for board-style namespaces.
    pub fn board_message(namespace: Namespace, message_id: &str) -> TypeResult<Self> {
        Self::new(namespace, [message_id])
    }

    /// `chats/{fromUid}/{toUid}/{messageId}`
    pub fn chat_message(from_uid: &str, to_uid: &str, message_id: &str) -> TypeResult<Self> {
        Self::new(Namespace::Chats, [from_uid, to_uid, message_id])
    }

    /// `chats/{fromUid}/{toUid}`, the thread one sender writes into.
    pub fn chat_thread(from_uid: &str, to_uid: &str) -> TypeResult<Self> {
        Self::new(Namespace::Chats, [from_uid, to_uid])
    }

    /// `friends/{ownerUid}/{friendUid}`
    pub fn friend_edge(owner_uid: &str, friend_uid: &str) -> TypeResult<Self> {
        Self::new(Namespace::Friends, [owner_uid, friend_uid])
    }

    /// `friends/{ownerUid}`, the friend list of one user.
    pub fn friend_list(owner_uid: &str) -> TypeResult<Self> {
        Self::new(Namespace::Friends, [owner_uid])
    }

    pub fn namespace(&self) -> Namespace {
        self.namespace
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Append a validated child key.
    pub fn child(&self, key: &str) -> TypeResult<Self> {
        validate_key(key)?;
        let mut keys = self.keys.clone();
        keys.push(key.to_string());
        Ok(Self {
            namespace: self.namespace,
            keys,
        })
    }
}

impl fmt::Display for DatabasePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.namespace.as_str())?;
        for key in &self.keys {
            write!(f, "/{key}")?;
        }
        Ok(())
    }
}

impl FromStr for DatabasePath {
    type Err = TypeError;

    fn from_str(s: &str) -> TypeResult<Self> {
        DatabasePath::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn namespace_parse_tolerates_slashes() {
        assert_eq!(Namespace::parse("public").unwrap(), Namespace::Public);
        assert_eq!(Namespace::parse("/public/").unwrap(), Namespace::Public);
        assert_eq!(Namespace::parse("tests/").unwrap(), Namespace::Tests);
        assert_eq!(Namespace::parse("chats/").unwrap(), Namespace::Chats);
    }

    #[test]
    fn namespace_parse_rejects_unknown() {
        assert_eq!(
            Namespace::parse("bogus"),
            Err(TypeError::UnknownNamespace("bogus".into()))
        );
        assert!(Namespace::parse("").is_err());
        assert!(Namespace::parse("public/extra").is_err());
    }

    #[test]
    fn namespace_root_has_trailing_slash() {
        assert_eq!(Namespace::Friends.root(), "friends/");
        assert_eq!(Namespace::Profiles.to_string(), "profiles");
    }

    #[test]
    fn normalize_strips_redundant_slashes() {
        assert_eq!(normalize_path("/public/").unwrap(), "public");
        assert_eq!(normalize_path("chats//a/b/").unwrap(), "chats/a/b");
        assert_eq!(normalize_path("  tests ").unwrap(), "tests");
    }

    #[test]
    fn normalize_rejects_empty() {
        assert_eq!(normalize_path(""), Err(TypeError::EmptyPath));
        assert_eq!(normalize_path("   "), Err(TypeError::EmptyPath));
        assert_eq!(normalize_path("///"), Err(TypeError::EmptyPath));
    }

    #[test]
    fn normalize_rejects_forbidden_chars() {
        assert!(normalize_path("public/a.b").is_err());
        assert!(normalize_path("public/a#b").is_err());
        assert!(normalize_path("public/$x").is_err());
        assert!(normalize_path("public/[0]").is_err());
    }

    #[test]
    fn chat_key_layout() {
        let path = DatabasePath::chat_message("alice", "bob", "m1").unwrap();
        assert_eq!(path.to_string(), "chats/alice/bob/m1");
        assert_eq!(path.namespace(), Namespace::Chats);
    }

    #[test]
    fn friend_key_layout() {
        let path = DatabasePath::friend_edge("alice", "bob").unwrap();
        assert_eq!(path.to_string(), "friends/alice/bob");
    }

    #[test]
    fn parse_requires_known_namespace() {
        let path = DatabasePath::parse("/public/m1").unwrap();
        assert_eq!(path.namespace(), Namespace::Public);
        assert_eq!(path.keys(), ["m1".to_string()]);
        assert!(DatabasePath::parse("bogus/m1").is_err());
    }

    #[test]
    fn child_appends_key() {
        let thread = DatabasePath::chat_thread("a", "b").unwrap();
        assert_eq!(thread.child("m9").unwrap().to_string(), "chats/a/b/m9");
        assert!(thread.child("bad/key").is_err());
    }

    #[test]
    fn empty_sub_key_is_rejected() {
        assert!(DatabasePath::profile("").is_err());
        assert!(DatabasePath::friend_edge("a", "").is_err());
    }

    proptest! {
        #[test]
        fn chat_keys_are_directional(
            from in "[a-z0-9]{1,12}",
            to in "[a-z0-9]{1,12}",
            id in "[a-z0-9-]{1,16}",
        ) {
            let forward = DatabasePath::chat_message(&from, &to, &id).unwrap().to_string();
            let backward = DatabasePath::chat_message(&to, &from, &id).unwrap().to_string();
            prop_assert_eq!(&forward, &format!("chats/{from}/{to}/{id}"));
            prop_assert_eq!(from == to, forward == backward);
        }

        #[test]
        fn display_then_parse_is_stable(
            keys in proptest::collection::vec("[A-Za-z0-9_-]{1,8}", 0..4),
        ) {
            let path = DatabasePath::new(Namespace::Public, keys).unwrap();
            let reparsed = DatabasePath::parse(&path.to_string()).unwrap();
            prop_assert_eq!(path, reparsed);
        }
    }
}
