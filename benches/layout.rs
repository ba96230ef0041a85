//! Benchmarks for full-frame declare-and-solve cycles.
//!
//! Run with: cargo bench --bench layout

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use trellis::layout::LayoutDirection;
use trellis::text::TextConfig;
use trellis::{fixed, grow, Color, Declaration, Dimensions, LayoutError, TrellisContext, Vector2};

const PARAGRAPH: &str = "The quick brown fox jumps over the lazy dog while the \
                         layout engine wraps every word into place";

fn measure_fixed_width(text: &str, config: &TextConfig) -> Dimensions {
    Dimensions::new(
        text.len() as f32 * 7.2,
        config.line_height.max(config.font_size) as f32,
    )
}

fn declare_row_of_boxes(ctx: &mut TrellisContext, count: usize) {
    ctx.begin_layout().unwrap();
    ctx.with_element(
        &Declaration::new().layout(|l| {
            l.width(grow!()).height(grow!()).gap(2);
        }),
        |ctx| {
            for _ in 0..count {
                ctx.element(
                    &Declaration::new()
                        .layout(|l| {
                            l.width(fixed!(10.0)).height(fixed!(10.0));
                        })
                        .background_color(Color::rgb(40.0, 40.0, 40.0)),
                )?;
            }
            Ok(())
        },
    )
    .unwrap();
    ctx.end_layout().unwrap();
}

fn declare_nested(ctx: &mut TrellisContext, depth: usize, fan_out: usize) -> Result<(), LayoutError> {
    if depth == 0 {
        return ctx.element(&Declaration::new().layout(|l| {
            l.width(fixed!(4.0)).height(fixed!(4.0));
        }));
    }
    ctx.with_element(
        &Declaration::new().layout(|l| {
            l.width(grow!()).height(grow!()).padding(1).gap(1);
        }),
        |ctx| {
            for _ in 0..fan_out {
                declare_nested(ctx, depth - 1, fan_out)?;
            }
            Ok(())
        },
    )
}

fn declare_text_frame(ctx: &mut TrellisContext, paragraphs: usize) {
    ctx.begin_layout().unwrap();
    ctx.with_element(
        &Declaration::new().layout(|l| {
            l.width(fixed!(320.0))
                .height(grow!())
                .direction(LayoutDirection::TopToBottom)
                .gap(4);
        }),
        |ctx| {
            for _ in 0..paragraphs {
                ctx.text(PARAGRAPH, |t| {
                    t.font_size(16).line_height(20);
                })?;
            }
            Ok(())
        },
    )
    .unwrap();
    ctx.end_layout().unwrap();
}

fn bench_flat_rows(c: &mut Criterion) {
    let mut group = c.benchmark_group("layout/flat_row");
    for count in [64usize, 512, 2048] {
        group.throughput(Throughput::Elements(count as u64));
        let mut ctx: TrellisContext = TrellisContext::new(Dimensions::new(1280.0, 720.0));
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.iter(|| {
                declare_row_of_boxes(&mut ctx, count);
                black_box(ctx.layout_dimensions());
            })
        });
    }
    group.finish();
}

fn bench_nested_tree(c: &mut Criterion) {
    let mut group = c.benchmark_group("layout/nested");
    for depth in [4usize, 6] {
        let elements = (3u64.pow(depth as u32 + 1) - 1) / 2;
        group.throughput(Throughput::Elements(elements));
        let mut ctx: TrellisContext = TrellisContext::new(Dimensions::new(1280.0, 720.0));
        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, &depth| {
            b.iter(|| {
                ctx.begin_layout().unwrap();
                declare_nested(&mut ctx, depth, 3).unwrap();
                black_box(ctx.end_layout().unwrap().len());
            })
        });
    }
    group.finish();
}

fn bench_text_wrap(c: &mut Criterion) {
    let mut group = c.benchmark_group("layout/text");
    for paragraphs in [8usize, 64] {
        group.throughput(Throughput::Elements(paragraphs as u64));
        let mut ctx: TrellisContext = TrellisContext::new(Dimensions::new(1280.0, 720.0));
        ctx.set_measure_text_function(measure_fixed_width);
        group.bench_with_input(
            BenchmarkId::from_parameter(paragraphs),
            &paragraphs,
            |b, &paragraphs| b.iter(|| declare_text_frame(&mut ctx, paragraphs)),
        );
    }
    group.finish();
}

fn bench_pointer_pass(c: &mut Criterion) {
    let mut group = c.benchmark_group("layout/pointer");
    let mut ctx: TrellisContext = TrellisContext::new(Dimensions::new(1280.0, 720.0));
    declare_row_of_boxes(&mut ctx, 512);
    group.bench_function("hit_test_512", |b| {
        b.iter(|| {
            ctx.set_pointer_state(black_box(Vector2::new(640.0, 5.0)), false);
            black_box(ctx.pointer_data());
        })
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_flat_rows,
    bench_nested_tree,
    bench_text_wrap,
    bench_pointer_pass,
);
criterion_main!(benches);
