//! Typed authorization object ids.
//!
//! Creator capabilities are written `cap_0x<hex>` and subscriptions
//! `sub_0x<hex>`. The prefix is what lets a builder refuse an id of the
//! wrong kind before anything is serialized.

use std::fmt;
use std::str::FromStr;

use sigil_core::ObjectId;

use crate::error::{ProofError, Result};

const CREATOR_CAP_PREFIX: &str = "cap_";
const SUBSCRIPTION_PREFIX: &str = "sub_";

const CREATOR_KIND: &str = "creator capability";
const SUBSCRIPTION_KIND: &str = "subscription";

fn kind_of(s: &str) -> Option<&'static str> {
    if s.starts_with(CREATOR_CAP_PREFIX) {
        Some(CREATOR_KIND)
    } else if s.starts_with(SUBSCRIPTION_PREFIX) {
        Some(SUBSCRIPTION_KIND)
    } else {
        None
    }
}

fn parse_prefixed(s: &str, prefix: &str, expected: &'static str) -> Result<ObjectId> {
    let s = s.trim();
    if s.is_empty() {
        return Err(ProofError::MissingAuthorizationObject);
    }
    let Some(rest) = s.strip_prefix(prefix) else {
        return Err(match kind_of(s) {
            Some(found) => ProofError::WrongAuthorizationKind { expected, found },
            None => ProofError::InvalidAuthorizationId(format!(
                "{s:?} has no {prefix} prefix"
            )),
        });
    };
    ObjectId::parse(rest).map_err(|e| ProofError::InvalidAuthorizationId(e.to_string()))
}

/// Id of an on-chain creator ownership capability.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CreatorCapId(ObjectId);

impl CreatorCapId {
    pub const fn new(object: ObjectId) -> Self {
        Self(object)
    }

    pub fn parse(s: &str) -> Result<Self> {
        parse_prefixed(s, CREATOR_CAP_PREFIX, CREATOR_KIND).map(Self)
    }

    pub fn object_id(&self) -> &ObjectId {
        &self.0
    }
}

impl fmt::Display for CreatorCapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{CREATOR_CAP_PREFIX}{}", self.0)
    }
}

impl fmt::Debug for CreatorCapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CreatorCapId({})", &self.0.to_hex()[..16])
    }
}

impl FromStr for CreatorCapId {
    type Err = ProofError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Id of an on-chain subscription token.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(ObjectId);

impl SubscriptionId {
    pub const fn new(object: ObjectId) -> Self {
        Self(object)
    }

    pub fn parse(s: &str) -> Result<Self> {
        parse_prefixed(s, SUBSCRIPTION_PREFIX, SUBSCRIPTION_KIND).map(Self)
    }

    pub fn object_id(&self) -> &ObjectId {
        &self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{SUBSCRIPTION_PREFIX}{}", self.0)
    }
}

impl fmt::Debug for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SubscriptionId({})", &self.0.to_hex()[..16])
    }
}

impl FromStr for SubscriptionId {
    type Err = ProofError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Either kind of authorization id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthorizationId {
    Creator(CreatorCapId),
    Subscriber(SubscriptionId),
}

impl AuthorizationId {
    /// Parse an id of either kind, dispatching on its prefix.
    pub fn parse(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        match kind_of(trimmed) {
            Some(CREATOR_KIND) => CreatorCapId::parse(trimmed).map(Self::Creator),
            Some(_) => SubscriptionId::parse(trimmed).map(Self::Subscriber),
            None if trimmed.is_empty() => Err(ProofError::MissingAuthorizationObject),
            None => Err(ProofError::InvalidAuthorizationId(format!(
                "{trimmed:?} is neither a {CREATOR_CAP_PREFIX} nor a {SUBSCRIPTION_PREFIX} id"
            ))),
        }
    }

    pub fn object_id(&self) -> &ObjectId {
        match self {
            Self::Creator(id) => id.object_id(),
            Self::Subscriber(id) => id.object_id(),
        }
    }
}

impl fmt::Display for AuthorizationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Creator(id) => id.fmt(f),
            Self::Subscriber(id) => id.fmt(f),
        }
    }
}
