//! Proptest generators for property-based testing.

use proptest::prelude::*;

use sigil_core::{Keypair, Namespace, ObjectId, ResourceId};
use sigil_envelope::ContentMetadata;
use sigil_proof::{CreatorCapId, SubscriptionId};

/// Generate a random keypair.
pub fn keypair() -> impl Strategy<Value = Keypair> {
    any::<[u8; 32]>().prop_map(|seed| Keypair::from_seed(&seed))
}

pub fn namespace() -> impl Strategy<Value = Namespace> {
    any::<[u8; 32]>().prop_map(Namespace::from_bytes)
}

pub fn resource_id() -> impl Strategy<Value = ResourceId> {
    any::<[u8; 32]>().prop_map(ResourceId::from_bytes)
}

pub fn object_id() -> impl Strategy<Value = ObjectId> {
    any::<[u8; 32]>().prop_map(ObjectId::from_bytes)
}

pub fn creator_cap_id() -> impl Strategy<Value = CreatorCapId> {
    object_id().prop_map(CreatorCapId::new)
}

pub fn subscription_id() -> impl Strategy<Value = SubscriptionId> {
    object_id().prop_map(SubscriptionId::new)
}

/// Generate payload bytes of at most `max_len`.
pub fn payload(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..=max_len)
}

/// Generate upload metadata.
pub fn metadata() -> impl Strategy<Value = ContentMetadata> {
    (
        "[a-z0-9_-]{1,24}\\.(mp4|md|png)",
        prop_oneof![
            Just("video/mp4"),
            Just("text/markdown"),
            Just("image/png"),
        ],
        0i64..=1_700_000_000_000i64,
    )
        .prop_map(|(name, content_type, ts)| ContentMetadata::new(name, content_type, ts))
}
