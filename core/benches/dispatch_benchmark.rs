/// Dispatch Performance Benchmarks using Criterion
///
/// Run with: cargo bench --bench dispatch_benchmark
///
/// Benchmarks cover:
/// - Filter dispatch over growing data sources
/// - Chains of several actions
/// - Concurrent dispatch through the async front door
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use serde_json::json;
use std::sync::Arc;
use trellis_core::figure;
use trellis_core::{
    Action, Binding, Component, Control, ControlState, Dashboard, DataFrame, Dispatcher,
    PageSpec, Scalar, Selector, UiEvent,
};

const CONTINENTS: [&str; 5] = ["Africa", "Americas", "Asia", "Europe", "Oceania"];

fn make_frame(rows: usize) -> DataFrame {
    let data = (0..rows)
        .map(|i| {
            vec![
                Scalar::from(format!("country_{}", i % 150)),
                Scalar::from(CONTINENTS[i % CONTINENTS.len()]),
                Scalar::Int(1952 + (i % 12) as i64 * 5),
                Scalar::Float(40.0 + (i % 40) as f64),
                Scalar::Int(1_000_000 + i as i64),
            ]
        })
        .collect();
    DataFrame::from_rows(&["country", "continent", "year", "lifeExp", "pop"], data).unwrap()
}

fn make_dashboard(rows: usize, extra_actions: usize) -> Dashboard {
    let page = PageSpec::new("bench")
        .component(Component::graph(
            "chart",
            "data",
            figure::scatter("lifeExp", "pop").arg("color", "continent"),
        ))
        .component(Component::table("table", "data"))
        .component(Component::card("summary", ""))
        .control(Control::filter("continent", "continent", Selector::dropdown()))
        .control(Control::filter("year", "year", Selector::range_slider()));

    let mut builder = Dashboard::builder().data_frame("data", make_frame(rows)).page(page);
    for i in 0..extra_actions {
        let action = Action::custom(format!("summary_{}", i), |ctx| {
            let rows = ctx.filtered("table")?.num_rows();
            Ok(vec![json!(format!("{} rows", rows))])
        })
        .with_outputs(["summary.children"])
        .unwrap();
        builder = builder.on(Binding::new("continent", "value"), action);
    }
    builder.build().unwrap()
}

/// Benchmark: One filter change over data sources of growing size
fn bench_filter_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch_filter");

    for rows in [1_000, 10_000, 100_000].iter() {
        let executor = make_dashboard(*rows, 0).executor();
        let state = ControlState::new().with("year", json!([1970, 2000]));
        let event = UiEvent::control("continent", json!(["Asia", "Europe"]));

        group.throughput(Throughput::Elements(*rows as u64));
        group.bench_with_input(BenchmarkId::from_parameter(rows), rows, |b, _| {
            b.iter(|| black_box(executor.dispatch(&event, &state).unwrap()));
        });
    }

    group.finish();
}

/// Benchmark: Chain length
fn bench_chain_length(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch_chain_length");

    for actions in [1, 4, 16].iter() {
        let executor = make_dashboard(10_000, *actions).executor();
        let event = UiEvent::control("continent", json!(["Africa"]));

        group.bench_with_input(BenchmarkId::from_parameter(actions), actions, |b, _| {
            b.iter(|| black_box(executor.dispatch(&event, &ControlState::new()).unwrap()));
        });
    }

    group.finish();
}

/// Benchmark: Concurrent submissions through the dispatcher
fn bench_concurrent_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch_concurrent");
    let rt = tokio::runtime::Runtime::new().unwrap();

    for submitters in [1, 4, 16].iter() {
        let dashboard = make_dashboard(10_000, 1);
        let dispatcher = Arc::new(Dispatcher::new(Arc::new(dashboard.executor()), 8));

        group.throughput(Throughput::Elements(*submitters as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(submitters),
            submitters,
            |b, &count| {
                b.iter(|| {
                    rt.block_on(async {
                        let handles: Vec<_> = (0..count)
                            .map(|i| {
                                let dispatcher = Arc::clone(&dispatcher);
                                let continent = CONTINENTS[i % CONTINENTS.len()];
                                tokio::spawn(async move {
                                    dispatcher
                                        .submit(
                                            UiEvent::control("continent", json!([continent])),
                                            ControlState::new(),
                                        )
                                        .await
                                })
                            })
                            .collect();
                        for handle in handles {
                            black_box(handle.await.unwrap().unwrap());
                        }
                    })
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_filter_dispatch,
    bench_chain_length,
    bench_concurrent_dispatch
);
criterion_main!(benches);
