//! Benchmarks for the wire codec and builder merge
//!
//! - Transaction encode and decode by command count
//! - Two-tier status extraction against a full effects decode
//! - Splicing one transaction into the middle of another

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ledger_tx::codec::{
    decode_effects, decode_transaction, encode_effects, encode_transaction, simple_effects,
    status_of,
};
use ledger_tx::tx_builder::{Argument, TransactionBuilder, TransactionData};
use ledger_tx::types::{Address, Digest, ObjectRef};

fn fee_coin() -> ObjectRef {
    ObjectRef::new(Address::from_u64(0xFEE), 1, Digest::new([1; 32]))
}

/// `splits` split-and-transfer pairs paid from the fee object
fn transfers(splits: usize) -> TransactionData {
    let mut tx = TransactionBuilder::new();
    for i in 0..splits {
        let amount = tx.pure(&(i as u64 + 1)).unwrap();
        let coin = tx.split_coins(Argument::FeeObject, vec![amount]).unwrap();
        let recipient = tx.pure(&Address::from_u64(i as u64)).unwrap();
        tx.transfer_objects(vec![coin], recipient).unwrap();
    }
    tx.set_sender(Address::from_u64(0xA11CE))
        .set_gas_owner(Address::from_u64(0xA11CE))
        .set_gas_price(1_000)
        .set_gas_budget(10_000_000)
        .set_gas_payment(vec![fee_coin()]);
    tx.into_data()
}

fn bench_transaction_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("transaction_codec");
    for splits in [1usize, 16, 128] {
        let data = transfers(splits);
        let bytes = encode_transaction(&data).unwrap();

        group.bench_with_input(BenchmarkId::new("encode", splits), &data, |b, data| {
            b.iter(|| encode_transaction(black_box(data)).unwrap())
        });
        group.bench_with_input(BenchmarkId::new("decode", splits), &bytes, |b, bytes| {
            b.iter(|| decode_transaction(black_box(bytes)).unwrap())
        });
    }
    group.finish();
}

fn bench_status(c: &mut Criterion) {
    let effects = encode_effects(&simple_effects(
        Digest::new([2; 32]),
        fee_coin(),
        Digest::new([3; 32]),
        Address::from_u64(0xA11CE),
        2,
    ));

    let mut group = c.benchmark_group("effects");
    group.bench_function("status_of", |b| b.iter(|| status_of(black_box(&effects)).unwrap()));
    group.bench_function("decode_effects", |b| {
        b.iter(|| decode_effects(black_box(&effects)).unwrap())
    });
    group.finish();
}

fn bench_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge");
    for splits in [4usize, 64] {
        let host = transfers(splits);
        let other = transfers(splits);
        group.bench_with_input(BenchmarkId::new("middle", splits), &splits, |b, &splits| {
            b.iter(|| {
                let mut tx = TransactionBuilder::from_data(host.clone()).unwrap();
                tx.merge(splits, black_box(other.clone())).unwrap();
                tx
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_transaction_codec, bench_status, bench_merge);
criterion_main!(benches);
