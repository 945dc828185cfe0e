//! Rendering performance benchmarks

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use serde_json::{json, Value};
use tmplr::*;

fn bench_simple_interpolation(c: &mut Criterion) {
    let data = json!({"user": {"name": "Ada", "role": "admin"}});
    let template = "Hello ${user.name}, you are ${user.role === 'admin' ? 'in charge' : 'a guest'}.";

    c.bench_function("simple_interpolation", |b| {
        b.iter(|| render(black_box(template), black_box(&data)))
    });
}

fn bench_large_loop(c: &mut Criterion) {
    let items: Vec<Value> = (0..1000)
        .map(|i| json!({"name": format!("Item {}", i), "price": i as f64 * 1.5, "stock": i % 7}))
        .collect();
    let data = json!({"items": items});
    let template = r#"<for|ix, item| of=items>
${ix}. ${item.name}: <if(item.stock > 0)>${item.price}<else>sold out</if>
</for>"#;

    c.bench_function("large_loop", |b| {
        b.iter(|| render(black_box(template), black_box(&data)))
    });
}

fn bench_parse_once_render_many(c: &mut Criterion) {
    let options = RenderOptions::default();
    let template = Template::parse(
        "<let total=${order.total}>\n<for|line| of=order.lines>${line.sku} x${line.qty}\n</for>\nTotal: ${total}",
        &options,
    )
    .unwrap();
    let data = json!({
        "order": {
            "total": 42.5,
            "lines": [{"sku": "A-1", "qty": 2}, {"sku": "B-7", "qty": 1}, {"sku": "C-3", "qty": 5}]
        }
    });

    c.bench_function("parse_once_render_many", |b| {
        b.iter(|| template.render(black_box(&data), &options).unwrap())
    });
}

fn bench_strict_vs_lenient(c: &mut Criterion) {
    let template = "<if(a === 1)>one<else-if(a === 2)>two<else>many</if> ${b.c.d}";
    let data = json!({"a": 2, "b": {"c": {"d": "deep"}}});

    let mut group = c.benchmark_group("error_modes");
    for (name, options) in [("lenient", RenderOptions::default()), ("strict", RenderOptions::strict())] {
        group.bench_function(name, |b| {
            b.iter(|| render_with_options(black_box(template), black_box(&data), &options).unwrap())
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_simple_interpolation,
    bench_large_loop,
    bench_parse_once_render_many,
    bench_strict_vs_lenient
);
criterion_main!(benches);
