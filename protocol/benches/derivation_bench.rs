// Derivation, armor and signing benchmarks for Anarchy Auth.
//
// Covers entropy reduction over iris codes and raw images of realistic
// sizes, seed-to-keypair derivation, armoring, and detached signing and
// verification.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use anarchy_auth::armor::{from_armor, to_armor, KeyKind};
use anarchy_auth::biometric::{EyeSide, IrisCode};
use anarchy_auth::crypto::{sign, verify};
use anarchy_auth::derivation::{derive, reduce, reduce_fallback, EntropySeed};
use anarchy_auth::signing::sign_detached;

fn bench_reduce_iris_codes(c: &mut Criterion) {
    // A 2048-bit iris code per eye is typical.
    let codes = vec![
        IrisCode::new(EyeSide::Right, vec![0xa5; 256]),
        IrisCode::new(EyeSide::Left, vec![0x5a; 256]),
    ];

    c.bench_function("entropy/reduce_two_eyes", |b| {
        b.iter(|| reduce(&codes).unwrap());
    });
}

fn bench_reduce_fallback(c: &mut Criterion) {
    let mut group = c.benchmark_group("entropy/reduce_fallback");

    for size in [64 * 1024, 1024 * 1024, 10 * 1024 * 1024] {
        let image = vec![0x42u8; size];
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &image, |b, image| {
            b.iter(|| reduce_fallback(image).unwrap());
        });
    }

    group.finish();
}

fn bench_derive(c: &mut Criterion) {
    c.bench_function("derive/seed_to_keypair", |b| {
        b.iter(|| derive(&EntropySeed::from_bytes([7u8; 32])));
    });
}

fn bench_armor(c: &mut Criterion) {
    let seed = [9u8; 32];
    let armored = to_armor(&seed, KeyKind::Private).unwrap();

    c.bench_function("armor/private_encode", |b| {
        b.iter(|| to_armor(&seed, KeyKind::Private).unwrap());
    });
    c.bench_function("armor/private_decode", |b| {
        b.iter(|| from_armor(&armored).unwrap());
    });
}

fn bench_sign_verify(c: &mut Criterion) {
    let keypair = derive(&EntropySeed::from_bytes([3u8; 32]));
    let message = b"I, the holder of this iris, approve this message.";
    let signature = sign(&keypair, message);
    let public_key = keypair.public_key();

    c.bench_function("ed25519/sign_detached", |b| {
        b.iter(|| sign_detached(&keypair, message));
    });
    c.bench_function("ed25519/verify", |b| {
        b.iter(|| verify(&public_key, message, &signature));
    });
}

criterion_group!(
    benches,
    bench_reduce_iris_codes,
    bench_reduce_fallback,
    bench_derive,
    bench_armor,
    bench_sign_verify,
);
criterion_main!(benches);
