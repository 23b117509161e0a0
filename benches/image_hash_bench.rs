//! Benchmarks for config hashing and signature recovery.
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ethers::types::H256;
use sequence_account::signature::CounterfactualResolver;
use sequence_account::{
    default_contexts, subdigest_of, LocalSigner, SignaturePart, Signer, SignerLeaf, SimpleConfig,
    WalletConfig, WalletSignature,
};

fn config_of(signers: &[LocalSigner], threshold: u16) -> WalletConfig {
    SimpleConfig::new(
        threshold,
        1,
        signers.iter().map(|s| SignerLeaf::new(s.address(), 1)).collect(),
    )
    .into()
}

/// Image hash of flat configs of growing size.
fn bench_image_hash(c: &mut Criterion) {
    let mut group = c.benchmark_group("image_hash");

    for n in [1usize, 8, 64, 256].iter() {
        let signers: Vec<LocalSigner> = (0..*n).map(|_| LocalSigner::random()).collect();
        let config = config_of(&signers, 1);

        group.throughput(Throughput::Elements(*n as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n), &config, |b, config| {
            b.iter(|| black_box(config.image_hash()));
        });
    }

    group.finish();
}

/// Recovery of an n-of-n signature.
fn bench_recover(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().expect("runtime");
    let contexts = default_contexts().expect("contexts");
    let context = &contexts[&2];
    let mut group = c.benchmark_group("recover");

    for n in [1usize, 4, 16].iter() {
        let signers: Vec<LocalSigner> = (0..*n).map(|_| LocalSigner::random()).collect();
        let config = config_of(&signers, *n as u16);
        let wallet = context.address_of(config.image_hash());
        let digest = H256::repeat_byte(0x11);

        let mut signature = WalletSignature::new(wallet, 1, config);
        let subdigest = subdigest_of(wallet, 1, digest);
        for signer in &signers {
            let part: SignaturePart = runtime
                .block_on(signer.sign_digest(subdigest, 1))
                .expect("sign");
            signature.parts.insert(signer.address(), part);
        }

        let resolver = CounterfactualResolver { context };
        group.throughput(Throughput::Elements(*n as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n), &signature, |b, signature| {
            b.iter(|| black_box(signature.verify(digest, &resolver).expect("verify")));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_image_hash, bench_recover);
criterion_main!(benches);
