//! Envelope benchmarks
//!
//! - Shamir split and combine of a data key
//! - Encrypting a payload against in-process key servers
//! - Decrypting it again through the same servers
//!
//! Run with: cargo bench -p sigil-envelope

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;

use sigil_core::{ContentId, EncryptionKey, Keypair, ManualClock, Namespace, ResourceId};
use sigil_envelope::{
    threshold, ContentMetadata, DecryptionEngine, EncryptionEngine, EnvelopeConfig,
};
use sigil_keyserver::{KeyServer, KeyServerSet, MemoryKeyServer, MemoryLedger};
use sigil_proof::ProofTx;
use sigil_session::PendingSession;

const NAMESPACE: [u8; 32] = [0x5e; 32];
const RESOURCE: [u8; 32] = [0x1d; 32];

fn network(n: usize, ledger: Arc<MemoryLedger>, clock: &ManualClock) -> KeyServerSet {
    KeyServerSet::new(
        (0..n)
            .map(|i| {
                Arc::new(MemoryKeyServer::new(
                    format!("ks-{i}"),
                    ledger.clone(),
                    Arc::new(clock.clone()),
                )) as Arc<dyn KeyServer>
            })
            .collect(),
    )
}

// ============================================================================
// Key splitting
// ============================================================================

fn bench_threshold(c: &mut Criterion) {
    let mut group = c.benchmark_group("threshold");
    let key = EncryptionKey::generate();

    for (t, n) in [(1u8, 1usize), (2, 3), (3, 5)] {
        group.bench_with_input(BenchmarkId::new("split", format!("{t}of{n}")), &n, |b, &n| {
            b.iter(|| threshold::split(black_box(&key), t, n).unwrap())
        });

        let shares = threshold::split(&key, t, n).unwrap();
        group.bench_with_input(
            BenchmarkId::new("combine", format!("{t}of{n}")),
            &shares,
            |b, shares| b.iter(|| threshold::combine(t, black_box(shares)).unwrap()),
        );
    }

    group.finish();
}

// ============================================================================
// Encrypt and decrypt
// ============================================================================

fn bench_round_trip(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let clock = ManualClock::new(1_700_000_000_000);
    let ledger = Arc::new(MemoryLedger::new());
    let servers = network(3, ledger.clone(), &clock);
    let namespace = Namespace::from_bytes(NAMESPACE);
    let resource = ResourceId::from_bytes(RESOURCE);

    let encryptor = EncryptionEngine::new(
        servers.clone(),
        EnvelopeConfig {
            threshold: 2,
            ..Default::default()
        },
    );
    let decryptor = DecryptionEngine::new(servers, Arc::new(clock.clone()), Duration::from_secs(5));

    let creator = Keypair::generate();
    let cap = ledger
        .mint_creator_cap(namespace, creator.address(), resource)
        .unwrap();
    let proof = ProofTx::approve_creator(namespace, &resource, cap);
    let pending = PendingSession::new(creator.address(), namespace, 60, &clock).unwrap();
    let signature = creator.sign_personal_message(&pending.personal_message());
    let session = Arc::new(pending.activate(signature).unwrap());
    let content_id = ContentId::new("bench").unwrap();

    let mut group = c.benchmark_group("envelope");
    for size in [4 * 1024usize, 256 * 1024, 2 * 1024 * 1024] {
        let payload = vec![0x42u8; size];
        let metadata = ContentMetadata::new("bench.bin", "application/octet-stream", 0);
        group.throughput(Throughput::Bytes(size as u64));

        group.bench_with_input(BenchmarkId::new("encrypt", size), &payload, |b, payload| {
            b.iter(|| {
                rt.block_on(encryptor.encrypt(
                    black_box(payload),
                    namespace,
                    resource,
                    metadata.clone(),
                ))
            })
        });

        let object = rt.block_on(encryptor.encrypt(&payload, namespace, resource, metadata.clone()));
        group.bench_with_input(BenchmarkId::new("decrypt", size), &object, |b, object| {
            b.iter(|| {
                rt.block_on(decryptor.decrypt(&content_id, object.clone(), &proof, session.clone()))
                    .unwrap()
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_threshold, bench_round_trip);
criterion_main!(benches);
