//! Bucket policy analysis.
//!
//! A statement grants public access when its `Effect` is `Allow` and its
//! `Principal` is the wildcard, either `"*"` or a principal map with a `"*"`
//! entry such as `{"AWS": "*"}`.

use std::collections::BTreeMap;

use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    fn as_slice(&self) -> &[T] {
        match self {
            OneOrMany::One(v) => std::slice::from_ref(v),
            OneOrMany::Many(v) => v,
        }
    }
}

#[derive(Debug, Deserialize)]
struct PolicyDocument {
    #[serde(rename = "Statement")]
    statement: OneOrMany<Statement>,
}

#[derive(Debug, Deserialize)]
struct Statement {
    #[serde(rename = "Sid", default)]
    sid: Option<String>,
    #[serde(rename = "Effect")]
    effect: String,
    #[serde(rename = "Principal", default)]
    principal: Option<Principal>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Principal {
    Any(String),
    Typed(BTreeMap<String, OneOrMany<String>>),
}

impl Principal {
    fn is_wildcard(&self) -> bool {
        match self {
            Principal::Any(p) => p == "*",
            Principal::Typed(map) => map
                .values()
                .any(|ids| ids.as_slice().iter().any(|id| id == "*")),
        }
    }
}

impl Statement {
    fn is_public(&self) -> bool {
        self.effect == "Allow" && self.principal.as_ref().is_some_and(Principal::is_wildcard)
    }
}

/// Labels of the statements that allow public access: the `Sid` when present,
/// else `statement[i]`. Empty means the policy keeps the bucket private.
pub fn public_statements(policy: &str) -> Result<Vec<String>, serde_json::Error> {
    let doc: PolicyDocument = serde_json::from_str(policy)?;
    Ok(doc
        .statement
        .as_slice()
        .iter()
        .enumerate()
        .filter(|(_, s)| s.is_public())
        .map(|(i, s)| s.sid.clone().unwrap_or_else(|| format!("statement[{i}]")))
        .collect())
}
