use criterion::{black_box, criterion_group, criterion_main, Criterion};
use klotz::nodes::{Ejector, Filter, Injector, Sine};
use klotz::{low_pass_filter, BiQuad, EngineConfig, Graph, Transform, ValueCell};

/// value -> sine -> low_pass -> output, with constant filter controls.
fn voice() -> Graph {
    let mut g = Graph::new();
    let freq = g.add(Box::new(Injector::new(ValueCell::new(220.0))));
    let cutoff = g.add(Box::new(Injector::new(ValueCell::new(1200.0))));
    let slope = g.add(Box::new(Injector::new(ValueCell::new(1.0))));
    let sine = g.add(Transform::boxed(Sine::new()));
    let lp = g.add(Transform::boxed(Filter::low_pass()));
    let out = g.add(Box::new(Ejector::new(&EngineConfig::default())));

    let edges = [(freq, sine, 0), (sine, lp, 0), (cutoff, lp, 1), (slope, lp, 3), (lp, out, 0)];
    for (from, to, port) in edges {
        g.connect(from, 0, to, port).unwrap();
    }
    g
}

pub fn criterion_benchmark(c: &mut Criterion) {
    c.bench_function("BiQuad.process() x512", |b| {
        let mut filter = BiQuad::new(low_pass_filter(600.0, 6.0, 1.0));
        b.iter(|| {
            for i in 0..512 {
                black_box(filter.process(black_box(i as f32 * 1e-3)).unwrap());
            }
        })
    });

    c.bench_function("Graph.tick() voice", |b| {
        let mut graph = voice();
        b.iter(|| graph.tick().unwrap())
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
