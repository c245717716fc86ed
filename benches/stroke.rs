use criterion::{criterion_group, criterion_main, Criterion};
use digit_sketchpad::sketch::model::STROKE_WIDTH;
use digit_sketchpad::sketch::Canvas;

fn bench_strokes(c: &mut Criterion) {
    let canvas = Canvas::default();
    let path: Vec<(i32, i32)> = (0..200).map(|i| (40 + i, 40 + (i * 7) % 200)).collect();
    c.bench_function("drag_200_segments", |b| {
        b.iter(|| {
            canvas.clear();
            canvas.set_pen_down(path[0]);
            for point in &path[1..] {
                canvas.drag_to(*point, STROKE_WIDTH);
            }
            canvas.set_pen_up();
        })
    });
    c.bench_function("snapshot_280", |b| b.iter(|| canvas.snapshot()));
}

criterion_group!(benches, bench_strokes);
criterion_main!(benches);
