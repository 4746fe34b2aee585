//! Pipeline stage benchmarks.
//!
//! Measures join, aggregation and exact-test cost on synthetic enrollment data.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use caremarket::analysis::{analyze_market, MarketConfig};
use caremarket::stats::{exact_test, exact_test_rxc, ContingencyTable};
use caremarket::transform::{group_and_reduce, join_with};
use caremarket::{Dataset, JoinKeys, JoinKind, JoinOptions, Loader, Reducer, Tail, Value};

const STATES: &[&str] = &["AZ", "CA", "FL", "NY", "PA", "TX", "VT", "WA"];

/// Synthetic county-level enrollment rows with a fixed seed.
fn generate_enrollment(rows: usize, contracts: usize) -> Dataset {
    let mut rng = StdRng::seed_from_u64(42);
    let data = (0..rows)
        .map(|_| {
            let contract = rng.gen_range(0..contracts);
            vec![
                Value::from(format!("H{:04}", contract)),
                Value::Integer(rng.gen_range(1..4)),
                Value::from(STATES[rng.gen_range(0..STATES.len())]),
                Value::Integer(rng.gen_range(11..5_000)),
            ]
        })
        .collect();
    Dataset::from_rows(&["Contract Number", "Plan ID", "State", "Enrollment"], data).unwrap()
}

fn generate_contracts(contracts: usize) -> Dataset {
    let data = (0..contracts)
        .flat_map(|c| {
            (1..4).map(move |plan| {
                vec![
                    Value::from(format!("H{:04}", c)),
                    Value::Integer(plan),
                    Value::from(format!("Organization {}", c % 40)),
                ]
            })
        })
        .collect();
    Dataset::from_rows(&["Contract ID", "Plan ID", "Organization Marketing Name"], data).unwrap()
}

fn bench_join(c: &mut Criterion) {
    let mut group = c.benchmark_group("join");
    let contracts = generate_contracts(500);
    let keys = JoinKeys::pairs(["Contract Number", "Plan ID"], ["Contract ID", "Plan ID"]);

    for rows in [1_000, 10_000, 100_000].iter() {
        let enrollment = generate_enrollment(*rows, 500);
        group.throughput(Throughput::Elements(*rows as u64));
        group.bench_with_input(BenchmarkId::new("rows", rows), &enrollment, |b, left| {
            b.iter(|| {
                black_box(
                    join_with(left, &contracts, &keys, &JoinOptions::new(JoinKind::LeftOuter))
                        .unwrap(),
                )
            })
        });
    }

    group.finish();
}

fn bench_group_sum(c: &mut Criterion) {
    let mut group = c.benchmark_group("group_sum");

    for rows in [1_000, 10_000, 100_000].iter() {
        let enrollment = generate_enrollment(*rows, 500);
        group.throughput(Throughput::Elements(*rows as u64));
        group.bench_with_input(BenchmarkId::new("rows", rows), &enrollment, |b, ds| {
            b.iter(|| {
                black_box(
                    group_and_reduce(ds, &["State", "Contract Number"], "Enrollment", Reducer::Sum)
                        .unwrap(),
                )
            })
        });
    }

    group.finish();
}

fn bench_market(c: &mut Criterion) {
    let enrollment = generate_enrollment(50_000, 500);
    let config = MarketConfig {
        firm_column: "Contract Number".to_string(),
        ..MarketConfig::default()
    };
    c.bench_function("market_50k", |b| {
        b.iter(|| black_box(analyze_market(&enrollment, &config).unwrap()))
    });
}

fn bench_load(c: &mut Criterion) {
    let mut text = String::from("Contract Number,Plan ID,State,Enrollment\n");
    let enrollment = generate_enrollment(10_000, 500);
    for row in enrollment.rows() {
        let fields: Vec<String> = row.iter().map(|v| v.to_string()).collect();
        text.push_str(&fields.join(","));
        text.push('\n');
    }

    let mut group = c.benchmark_group("load");
    group.throughput(Throughput::Bytes(text.len() as u64));
    group.bench_function("csv_10k", |b| {
        b.iter(|| black_box(Loader::new().load_str(&text).unwrap()))
    });
    group.finish();
}

fn bench_exact_test(c: &mut Criterion) {
    let mut group = c.benchmark_group("exact_test");

    for n in [100u64, 10_000, 1_000_000].iter() {
        let table = ContingencyTable::two_by_two([[n * 3 / 10, n / 5], [n / 4, n / 4]]);
        group.bench_with_input(BenchmarkId::new("2x2_total", n), &table, |b, t| {
            b.iter(|| black_box(exact_test(t, Tail::TwoSided).unwrap()))
        });
    }

    let table = ContingencyTable::from_counts(
        &["a", "b", "c"],
        &["x", "y", "z"],
        vec![vec![5, 3, 2], vec![2, 6, 1], vec![1, 2, 7]],
    )
    .unwrap();
    group.bench_function("3x3_rxc", |b| {
        b.iter(|| black_box(exact_test_rxc(&table, 1_000_000).unwrap()))
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_join,
    bench_group_sum,
    bench_market,
    bench_load,
    bench_exact_test,
);
criterion_main!(benches);
