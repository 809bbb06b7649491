use criterion::{black_box, criterion_group, criterion_main, Criterion};
use gm_core::{apply_deltas, diff, AttributeSchema, Deltas, HistoryEntry, HistoryLog, HISTORY_WINDOW};

fn bench_ledger(c: &mut Criterion) {
    let schema = AttributeSchema::default();
    let before = schema.initial_snapshot();
    let mut deltas = Deltas::new();
    deltas.insert("cash".into(), -250);
    deltas.insert("morale".into(), 12);
    deltas.insert("innovation".into(), 30);
    c.bench_function("apply + diff", |b| {
        b.iter(|| {
            let after = apply_deltas(&schema, black_box(&before), black_box(&deltas));
            black_box(diff(&before, &after))
        })
    });
}

fn bench_history_window(c: &mut Criterion) {
    let entries = (0..2_000).map(|i| HistoryEntry::player("player_human", "ceo", format!("directive {i}")));
    let log = HistoryLog::new().append(entries);
    c.bench_function("recent window of 2000 entries", |b| {
        b.iter(|| black_box(log.recent_window(HISTORY_WINDOW)))
    });
}

criterion_group!(benches, bench_ledger, bench_history_window);
criterion_main!(benches);
