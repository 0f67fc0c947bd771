use criterion::{black_box, criterion_group, criterion_main, Criterion};
use h5yaml_layout::{
    compile, ChunkPolicy, DimensionSpec, Dims, LayoutConfig, MemoryContainer, SchemaDefinition,
    VariableSpec,
};

fn bench_advise(c: &mut Criterion) {
    let policy = ChunkPolicy::default();
    let shapes: [&[u64]; 4] = [&[100], &[0], &[0, 512, 256], &[5000, 1000]];
    c.bench_function("advise_mixed_shapes", |b| {
        b.iter(|| {
            for shape in shapes {
                black_box(policy.advise(black_box(shape), 4));
            }
        })
    });
}

fn bench_compile(c: &mut Criterion) {
    let mut def = SchemaDefinition::new().dimension("time", DimensionSpec::new(0));
    for i in 0..64 {
        def = def
            .dimension(format!("x{i}"), DimensionSpec::new(100 + i).dtype("f4"))
            .variable(
                format!("grp{}/v{i}", i % 8),
                VariableSpec::new("f4", Dims::Axes(vec!["time".into(), format!("x{i}")])),
            );
    }
    let config = LayoutConfig::default();
    c.bench_function("compile_64_variables", |b| {
        b.iter(|| {
            let mut container = MemoryContainer::new();
            compile(black_box(&def), &mut container, &config).unwrap();
            container
        })
    });
}

criterion_group!(benches, bench_advise, bench_compile);
criterion_main!(benches);
