// Sealing & review benchmarks for Council Seal.
//
// Covers key wrapping, full proposal sealing at several committee sizes,
// and the reviewer's open path.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use serde_json::json;

use council_seal::crypto::{unwrap_key, wrap_key, CouncilKeypair, SymmetricKey};
use council_seal::proposal::{
    open_envelope, seal_proposal, Address, ProposalAction, ProposalPayload, Recipient,
};

fn payload() -> ProposalPayload {
    ProposalPayload::new(
        &json!({
            "title": "Pause bridge withdrawals",
            "description": "Anomalous outflows from the L2 bridge escrow.",
            "severity": "critical",
        }),
        (0..4u8)
            .map(|i| ProposalAction::new(Address::from_bytes([i; 20]), 0, vec![0xab; 68]))
            .collect(),
    )
    .unwrap()
}

fn committee(size: u8) -> (Vec<Recipient>, Vec<CouncilKeypair>) {
    let keypairs: Vec<_> = (0..size).map(|_| CouncilKeypair::generate()).collect();
    let recipients = keypairs
        .iter()
        .enumerate()
        .map(|(i, kp)| Recipient::with_key(Address::from_bytes([i as u8 + 1; 20]), kp.public_key()))
        .collect();
    (recipients, keypairs)
}

fn bench_wrap(c: &mut Criterion) {
    let member = CouncilKeypair::generate();
    let public = member.public_key();
    let key = SymmetricKey::generate();
    let wrapped = wrap_key(&key, &public, b"member").unwrap();

    c.bench_function("wrap/x25519_aes_gcm", |b| {
        b.iter(|| wrap_key(&key, &public, b"member").unwrap());
    });
    c.bench_function("unwrap/x25519_aes_gcm", |b| {
        b.iter(|| unwrap_key(&wrapped, &member, b"member").unwrap());
    });
}

fn bench_seal(c: &mut Criterion) {
    let mut group = c.benchmark_group("seal_proposal");
    let payload = payload();

    for size in [1u8, 5, 12, 32] {
        let (recipients, _) = committee(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &recipients, |b, recipients| {
            b.iter(|| seal_proposal(&payload, recipients).unwrap());
        });
    }
    group.finish();
}

fn bench_open(c: &mut Criterion) {
    let (recipients, keypairs) = committee(12);
    let sealed = seal_proposal(&payload(), &recipients).unwrap();
    let identity = recipients[11].identity;
    let keypair = &keypairs[11];

    c.bench_function("open_envelope/12_members", |b| {
        b.iter(|| {
            open_envelope(
                sealed.envelope.clone(),
                sealed.commitments,
                &identity,
                keypair,
            )
            .unwrap()
        });
    });
}

criterion_group!(benches, bench_wrap, bench_seal, bench_open);
criterion_main!(benches);
