//! End-to-end upload and decrypt through the Gate's primitive operations.

mod common;

use std::time::Duration;

use sigil::envelope::Scheme;
use sigil::proof::ProofError;
use sigil::{ContentMetadata, EncryptedObject, EnvelopeError, GateConfig, GateError, ResourceId};
use sigil_testkit::{CountingSigner, TestWallet};

use common::{threshold, Harness};

const THIRTY_DAYS: Duration = Duration::from_secs(30 * 24 * 60 * 60);

fn resource() -> ResourceId {
    ResourceId::parse(&format!("abc{}ef", "0".repeat(59))).unwrap()
}

fn two_megabytes() -> Vec<u8> {
    (0..2 * 1024 * 1024).map(|i| (i % 251) as u8).collect()
}

#[tokio::test]
async fn test_subscriber_decrypts_and_stranger_is_denied() {
    let h = Harness::new(1, threshold(1));
    let ns = h.network.namespace;
    let payload = two_megabytes();

    // A uploads.
    let object = h
        .gate
        .upload_encrypted(
            &payload,
            ns,
            resource(),
            ContentMetadata::new("episode.mp4", "video/mp4", 1_700_000_000_000),
        )
        .await;
    assert!(object.is_encrypted());
    let stored = object.to_bytes().unwrap();

    // B holds a subscription.
    let b = TestWallet::new();
    let sub = h.network.subscribe(&b, resource(), THIRTY_DAYS);
    let b_signer = CountingSigner::new(b.clone());
    let b_session = h
        .gate
        .acquire_session(b.address(), ns, 10, &b_signer)
        .await
        .unwrap();
    let b_proof = h
        .gate
        .build_subscriber_proof(&resource(), &sub.to_string())
        .unwrap();

    let plaintext = h.gate.decrypt(&stored, &b_proof, b_session).await.unwrap();
    assert_eq!(plaintext.len(), payload.len());
    assert!(plaintext[..] == payload[..]);

    // C tries B's subscription.
    let c = TestWallet::new();
    let c_signer = CountingSigner::new(c.clone());
    let c_session = h
        .gate
        .acquire_session(c.address(), ns, 10, &c_signer)
        .await
        .unwrap();

    let err = h.gate.decrypt(&stored, &b_proof, c_session).await.unwrap_err();
    assert!(matches!(
        err,
        GateError::Envelope(EnvelopeError::AccessDenied(_))
    ));
    assert!(err.user_message().contains("Subscribe"));
}

#[tokio::test]
async fn test_subscription_for_another_resource_is_denied() {
    let h = Harness::new(2, threshold(2));
    let ns = h.network.namespace;
    let object = h
        .gate
        .upload_encrypted(b"gated", ns, resource(), ContentMetadata::new("a.md", "text/markdown", 0))
        .await;

    let viewer = TestWallet::new();
    let other_resource = h.network.resource(0x77);
    let sub = h.network.subscribe(&viewer, other_resource, THIRTY_DAYS);
    let session = h.network.session(&viewer, 10);
    let proof = h
        .gate
        .build_subscriber_proof(&resource(), &sub.to_string())
        .unwrap();

    let err = h
        .gate
        .decrypt(&object.to_bytes().unwrap(), &proof, session)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        GateError::Envelope(EnvelopeError::AccessDenied(_))
    ));
}

#[tokio::test]
async fn test_creator_round_trip_with_threshold() {
    let h = Harness::new(3, threshold(2));
    let creator = TestWallet::new();
    let cap = h.network.mint_cap(&creator, resource());
    let object = h
        .gate
        .upload_encrypted(
            b"draft essay",
            h.network.namespace,
            resource(),
            ContentMetadata::new("essay.md", "text/markdown", 0),
        )
        .await;
    let EncryptedObject::Ciphertext(sealed) = &object else {
        panic!("expected ciphertext");
    };
    assert_eq!(sealed.shares.len(), 3);

    h.network.servers[0].set_online(false);
    let proof = h.gate.build_creator_proof(&resource(), &cap.to_string()).unwrap();
    let plaintext = h
        .gate
        .decrypt(
            &object.to_bytes().unwrap(),
            &proof,
            h.network.session(&creator, 10),
        )
        .await
        .unwrap();
    assert_eq!(&plaintext[..], b"draft essay");
}

#[tokio::test]
async fn test_disabled_encryption_is_flagged() {
    let h = Harness::new(
        1,
        GateConfig {
            enabled: false,
            ..Default::default()
        },
    );
    let object = h
        .gate
        .upload_encrypted(
            b"not secret",
            h.network.namespace,
            resource(),
            ContentMetadata::new("a.png", "image/png", 0),
        )
        .await;

    assert!(!object.is_encrypted());
    assert_eq!(object.scheme(), Scheme::None);

    let reparsed = EncryptedObject::from_bytes(&object.to_bytes().unwrap()).unwrap();
    assert!(!reparsed.is_encrypted());

    let viewer = TestWallet::new();
    let cap = h.network.mint_cap(&viewer, resource());
    let proof = h.gate.build_creator_proof(&resource(), &cap.to_string()).unwrap();
    let err = h
        .gate
        .decrypt(&object.to_bytes().unwrap(), &proof, h.network.session(&viewer, 10))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        GateError::Envelope(EnvelopeError::MalformedCiphertext(_))
    ));
}

#[tokio::test]
async fn test_unreachable_servers_fall_back_to_plaintext() {
    let h = Harness::new(2, threshold(2));
    h.network.servers[1].set_online(false);

    let object = h
        .gate
        .upload_encrypted(
            b"upload still works",
            h.network.namespace,
            resource(),
            ContentMetadata::new("a.md", "text/markdown", 0),
        )
        .await;
    let EncryptedObject::Plaintext(plain) = object else {
        panic!("expected plaintext fallback");
    };
    assert_eq!(plain.data, b"upload still works");
}

#[tokio::test]
async fn test_wrong_authorization_kind_fails_fast() {
    let h = Harness::new(1, threshold(1));

    let err = h
        .gate
        .build_creator_proof(&resource(), "sub_0x9")
        .unwrap_err();
    assert!(matches!(
        err,
        GateError::Proof(ProofError::WrongAuthorizationKind { .. })
    ));

    let err = h
        .gate
        .build_subscriber_proof(&resource(), "cap_0x9")
        .unwrap_err();
    assert!(matches!(
        err,
        GateError::Proof(ProofError::WrongAuthorizationKind { .. })
    ));

    assert!(matches!(
        h.gate.build_subscriber_proof(&resource(), " "),
        Err(GateError::Proof(ProofError::MissingAuthorizationObject))
    ));
    assert_eq!(h.network.fetches(), 0);
}

#[tokio::test]
async fn test_foreign_bytes_are_malformed() {
    let h = Harness::new(1, threshold(1));
    let viewer = TestWallet::new();
    let cap = h.network.mint_cap(&viewer, resource());
    let proof = h.gate.build_creator_proof(&resource(), &cap.to_string()).unwrap();

    let err = h
        .gate
        .decrypt(b"\x89PNG not ours", &proof, h.network.session(&viewer, 10))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        GateError::Envelope(EnvelopeError::MalformedCiphertext(_))
    ));
    assert_eq!(h.network.fetches(), 0);
}
