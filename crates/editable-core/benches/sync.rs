use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use editable_core::text::{SpanObject, SpannedText, SPAN_COMPOSING, SPAN_EXCLUSIVE_EXCLUSIVE};
use editable_core::DualTextStore;

fn bench_text(len: usize) -> SpannedText {
    let base: String = "the quick brown fox jumps over the lazy dog "
        .chars()
        .cycle()
        .take(len)
        .collect();
    let mut text = SpannedText::from(base);
    for start in (0..len.saturating_sub(8)).step_by(32) {
        text.set_span(SpanObject::marker(), start, start + 8, SPAN_EXCLUSIVE_EXCLUSIVE)
            .unwrap();
    }
    text.set_selection(len / 2, len / 2).unwrap();
    text
}

fn bench_sync_small_edit(c: &mut Criterion) {
    let mut group = c.benchmark_group("sync_small_edit");
    for len in [64, 1024, 16384] {
        let store = DualTextStore::new(false);
        store.reset(&bench_text(len));
        group.bench_with_input(BenchmarkId::from_parameter(len), &len, |b, &len| {
            b.iter(|| {
                let at = len / 2;
                store
                    .engine_replace(at, at, &SpannedText::from("x"))
                    .unwrap();
                store.engine_replace(at, at + 1, &SpannedText::new()).unwrap();
                store.sync(None)
            });
        });
    }
    group.finish();
}

fn bench_sync_composition(c: &mut Criterion) {
    let store = DualTextStore::new(false);
    store.reset(&bench_text(1024));
    let composing = SpanObject::marker();
    c.bench_function("sync_composition_update", |b| {
        b.iter(|| {
            store.client_replace(500, 500, &SpannedText::from("ka")).unwrap();
            store
                .engine_replace(500, 500, &SpannedText::from("か"))
                .unwrap();
            store
                .engine_set_span(composing.clone(), 500, 501, SPAN_COMPOSING | SPAN_EXCLUSIVE_EXCLUSIVE)
                .unwrap();
            store.sync(None);
            store.engine_replace(500, 501, &SpannedText::new()).unwrap();
            store.sync(None)
        });
    });
}

criterion_group!(benches, bench_sync_small_edit, bench_sync_composition);
criterion_main!(benches);
