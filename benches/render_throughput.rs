//! Render throughput benchmarks
//!
//! Measures rendering of a list template with varying row counts through:
//! - the cached compiled renderer
//! - the interpretive renderer
//! - a cold compile (cache cleared before every iteration)
//!
//! Run benchmarks: `cargo bench --bench render_throughput`

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use qweb::{InMemoryTemplateStore, QWeb, RenderOptions, TemplateRef, Values};
use serde_json::json;
use std::hint::black_box;
use std::sync::Arc;

const ROW: &str = r#"<tr t-att-class="'odd' if row_odd else None">
    <td t-esc="row['id']"/>
    <td t-esc="row['name']"/>
    <td t-esc="row['amount']" t-options="{'widget': 'float', 'precision': 2}"/>
    <td><t t-if="row['paid']">paid</t><t t-else="">open</t></td>
</tr>"#;

const TABLE: &str = r#"<table class="report">
    <thead><tr><th>Id</th><th>Name</th><th>Amount</th><th>State</th></tr></thead>
    <tbody><t t-foreach="rows" t-as="row"><t t-call="bench.row"/></t></tbody>
</table>"#;

fn engine() -> QWeb {
    let store = Arc::new(InMemoryTemplateStore::new());
    store.add("bench.row", ROW).expect("add row template");
    store.add("bench.table", TABLE).expect("add table template");
    QWeb::new(store)
}

fn values(count: usize) -> Values {
    let rows: Vec<_> = (0..count)
        .map(|i| {
            json!({
                "id": i,
                "name": format!("Record <{}>", i),
                "amount": i as f64 * 10.25,
                "paid": i % 3 == 0,
            })
        })
        .collect();
    Values::from_json(json!({ "rows": rows }))
}

fn bench_render(c: &mut Criterion) {
    let engine = engine();
    let reference = TemplateRef::from("bench.table");
    let options = RenderOptions::default();
    let mut group = c.benchmark_group("render");

    for count in [1usize, 10, 100, 1000] {
        let input = values(count);
        group.throughput(Throughput::Elements(count as u64));

        group.bench_with_input(BenchmarkId::new("compiled", count), &input, |b, input| {
            b.iter(|| {
                black_box(
                    engine
                        .render(&reference, input.clone(), &options)
                        .expect("render"),
                )
            })
        });

        group.bench_with_input(BenchmarkId::new("interpreted", count), &input, |b, input| {
            b.iter(|| {
                black_box(
                    engine
                        .render_interpreted(&reference, input.clone(), &options, None)
                        .expect("render"),
                )
            })
        });
    }
    group.finish();
}

fn bench_cold_compile(c: &mut Criterion) {
    let engine = engine();
    let reference = TemplateRef::from("bench.table");
    let options = RenderOptions::default();
    let input = values(10);

    c.bench_function("cold_compile_and_render", |b| {
        b.iter(|| {
            engine.clear_cache();
            black_box(
                engine
                    .render(&reference, input.clone(), &options)
                    .expect("render"),
            )
        })
    });
}

criterion_group!(benches, bench_render, bench_cold_compile);
criterion_main!(benches);
