use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use reconcile::store::MemoryStore;
use reconcile::sync::SessionConfig;
use reconcile::test_utils::peer::run_sync;
use reconcile::test_utils::schema::{footbl, noprimaryjointbl, schema_of, uniquetbl};
use reconcile::types::Value;
use telemetry::tracing::init_test_tracing;

const SEEDS: [u64; 6] = [1, 7, 42, 1234, 98765, 31337];

fn random_footbl_rows(rng: &mut StdRng, count: usize) -> BTreeMap<(i64, i64), Vec<Value>> {
    let mut rows = BTreeMap::new();
    while rows.len() < count {
        let key = (rng.gen_range(0..500), rng.gen_range(0..3));
        let col3 = if rng.gen_bool(0.1) {
            Value::Null
        } else {
            Value::Text(format!("value {}", rng.gen_range(0..1_000_000)))
        };
        rows.insert(key, vec![Value::Integer(key.0), Value::Integer(key.1), col3]);
    }

    rows
}

/// Deletes, rewrites and adds rows at random.
fn mutate(
    rng: &mut StdRng,
    rows: &BTreeMap<(i64, i64), Vec<Value>>,
) -> BTreeMap<(i64, i64), Vec<Value>> {
    let mut mutated = BTreeMap::new();
    for (key, row) in rows {
        match rng.gen_range(0..10) {
            0 => {}
            1 => {
                let mut row = row.clone();
                row[2] = Value::Text("stale".to_string());
                mutated.insert(*key, row);
            }
            _ => {
                mutated.insert(*key, row.clone());
            }
        }
    }
    for _ in 0..rng.gen_range(0..30) {
        let key = (rng.gen_range(-20..520), 3);
        mutated.insert(
            key,
            vec![Value::Integer(key.0), Value::Integer(key.1), Value::Null],
        );
    }

    mutated
}

fn random_config(rng: &mut StdRng) -> SessionConfig {
    SessionConfig {
        min_block_size: *[1u64, 16, 256].choose(rng).unwrap_or(&1),
        max_block_size: *[512u64, 4096, 256 * 1024].choose(rng).unwrap_or(&512),
        max_buffered_bytes: *[1usize, 200, 1 << 20].choose(rng).unwrap_or(&1),
        max_rows_to_select: rng.gen_range(1..50),
        ..SessionConfig::default()
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn random_tables_converge() {
    init_test_tracing();

    for seed in SEEDS {
        let mut rng = StdRng::seed_from_u64(seed);
        let count = rng.gen_range(0..400);
        let source = random_footbl_rows(&mut rng, count);
        let destination = mutate(&mut rng, &source);
        let config = random_config(&mut rng);

        let from = MemoryStore::new(schema_of(vec![footbl()]));
        let to = MemoryStore::new(schema_of(vec![footbl()]));
        from.insert_values("footbl", source.values().cloned().collect())
            .await
            .unwrap();
        to.insert_values("footbl", destination.values().cloned().collect())
            .await
            .unwrap();

        run_sync(&from, &to, config.clone()).await.unwrap();
        assert_eq!(
            to.rows("footbl").await.unwrap(),
            from.rows("footbl").await.unwrap(),
            "seed {seed} with {config:?}"
        );

        let rerun = run_sync(&from, &to, config).await.unwrap();
        assert_eq!(rerun.rows_changed(), 0, "seed {seed}");
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn shuffled_unique_values_converge() {
    init_test_tracing();

    for seed in SEEDS {
        let mut rng = StdRng::seed_from_u64(seed);
        let count = rng.gen_range(2..120);
        let mut values: Vec<Option<String>> = (0..count)
            .map(|i| (i % 5 != 0).then(|| format!("unique {i}")))
            .collect();
        let source: Vec<Vec<Value>> = values
            .iter()
            .enumerate()
            .map(|(i, value)| unique_row(i as i64, value))
            .collect();
        values.shuffle(&mut rng);
        let destination: Vec<Vec<Value>> = values
            .iter()
            .enumerate()
            .filter(|_| rng.gen_bool(0.9))
            .map(|(i, value)| unique_row(i as i64, value))
            .collect();

        let from = MemoryStore::new(schema_of(vec![uniquetbl()]));
        let to = MemoryStore::new(schema_of(vec![uniquetbl()]));
        from.insert_values("uniquetbl", source.clone()).await.unwrap();
        to.insert_values("uniquetbl", destination).await.unwrap();

        run_sync(&from, &to, random_config(&mut rng)).await.unwrap();

        assert_eq!(to.rows("uniquetbl").await.unwrap(), source, "seed {seed}");
    }
}

fn unique_row(pri: i64, sec: &Option<String>) -> Vec<Value> {
    vec![
        Value::Integer(pri),
        sec.clone().map(Value::Text).unwrap_or(Value::Null),
        Value::Integer(pri * 3),
    ]
}

#[tokio::test(flavor = "multi_thread")]
async fn random_duplicate_counts_converge() {
    init_test_tracing();

    for seed in SEEDS {
        let mut rng = StdRng::seed_from_u64(seed);
        let random_rows = |rng: &mut StdRng| -> Vec<Vec<Value>> {
            (0..rng.gen_range(0..80))
                .map(|_| {
                    let id = rng.gen_range(0..20);
                    vec![Value::Integer(id), Value::Integer(id % 3)]
                })
                .collect()
        };
        let source = random_rows(&mut rng);
        let destination = random_rows(&mut rng);

        let from = MemoryStore::new(schema_of(vec![noprimaryjointbl()]));
        let to = MemoryStore::new(schema_of(vec![noprimaryjointbl()]));
        from.insert_values("noprimaryjointbl", source).await.unwrap();
        to.insert_values("noprimaryjointbl", destination)
            .await
            .unwrap();

        run_sync(&from, &to, random_config(&mut rng)).await.unwrap();

        assert_eq!(
            to.rows("noprimaryjointbl").await.unwrap(),
            from.rows("noprimaryjointbl").await.unwrap(),
            "seed {seed}"
        );
    }
}
