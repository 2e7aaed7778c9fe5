use cfs::config::Options;
use cfs::script::{builtins, compile};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

const PROGRAM: &str = r#"
function norm(v, lo, hi) return clamp((v - lo) / (hi - lo), 0, 1)
function tilt() {
    x = norm(#gyroX#, -90, 90);
    y = norm(#gyroY#, -90, 90);
    return sqrt(x * x + y * y)
}
function main() {
    t = tilt();
    return if (t > 0.5 && #active# == 1 ? t * 100 : atan2d(#gyroY#, #gyroX#))
}
"#;

fn bench_compile(c: &mut Criterion) {
    // bootstrap once outside the timed loops
    builtins::catalog().expect("library");
    let opts = Options::default();

    let mut g = c.benchmark_group("compile");

    g.bench_function("literal", |b| {
        b.iter(|| compile(black_box("function main() return 2 + 3 * 4 ^ 2"), &opts))
    });
    g.bench_function("relational_chain", |b| {
        b.iter(|| {
            compile(
                black_box("function main() return #a# < 1 || #a# >= 2 && #b# != 3"),
                &opts,
            )
        })
    });
    g.bench_function("nested_inlining", |b| {
        b.iter(|| compile(black_box(PROGRAM), &opts))
    });

    g.finish();
}

criterion_group!(benches, bench_compile);
criterion_main!(benches);
