//! Benchmarks for the visible-width slicer.
//!
//! Run with: cargo bench -p vtslice

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;
use vtslice::{slice, slice_with, SliceOptions};

/// ASCII-only text of various lengths.
fn ascii_text(len: usize) -> String {
    "The quick brown fox jumps over the lazy dog. "
        .chars()
        .cycle()
        .take(len)
        .collect()
}

/// ANSI-colored ASCII: a style toggle every word.
fn colored_text(words: usize) -> String {
    let mut out = String::new();
    for i in 0..words {
        if i % 2 == 0 {
            out.push_str("\x1b[31mred\x1b[39m ");
        } else {
            out.push_str("\x1b[1mbold\x1b[22m ");
        }
    }
    out
}

/// CJK text (two columns per char).
fn cjk_text(len: usize) -> String {
    "\u{4E2D}\u{6587}\u{6D4B}\u{8BD5}\u{6587}\u{672C}"
        .chars()
        .cycle()
        .take(len)
        .collect()
}

/// ZWJ sequences (complex graphemes).
fn zwj_text(count: usize) -> String {
    "\u{1F468}\u{200D}\u{1F469}\u{200D}\u{1F467}".repeat(count)
}

fn bench_ascii_fast_path(c: &mut Criterion) {
    let mut group = c.benchmark_group("ascii_fast_path");
    for len in [64, 1024, 16 * 1024] {
        let text = ascii_text(len);
        group.throughput(Throughput::Bytes(len as u64));
        group.bench_with_input(BenchmarkId::from_parameter(len), &text, |b, text| {
            b.iter(|| slice(black_box(text), 10.0, 50.0));
        });
    }
    group.finish();
}

fn bench_short_slice_of_long_input(c: &mut Criterion) {
    // The scan horizon should keep this O(slice), not O(input).
    let mut group = c.benchmark_group("short_slice_long_input");
    for len in [1024, 64 * 1024] {
        let mut text = String::from("\x1b[0m");
        text.push_str(&ascii_text(len));
        group.bench_with_input(BenchmarkId::from_parameter(len), &text, |b, text| {
            b.iter(|| slice(black_box(text), 0.0, 40.0));
        });
    }
    group.finish();
}

fn bench_streaming_colored(c: &mut Criterion) {
    let mut group = c.benchmark_group("streaming_colored");
    for words in [16, 256] {
        let text = colored_text(words);
        group.throughput(Throughput::Bytes(text.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(words), &text, |b, text| {
            b.iter(|| slice(black_box(text), 4.0, 40.0));
        });
    }
    group.finish();
}

fn bench_cjk(c: &mut Criterion) {
    let mut group = c.benchmark_group("cjk");
    for len in [64, 1024] {
        let text = cjk_text(len);
        group.bench_with_input(BenchmarkId::from_parameter(len), &text, |b, text| {
            b.iter(|| slice(black_box(text), 10.0, 60.0));
        });
    }
    group.finish();
}

fn bench_zwj(c: &mut Criterion) {
    let mut group = c.benchmark_group("zwj_clusters");
    for count in [8, 128] {
        let text = zwj_text(count);
        group.bench_with_input(BenchmarkId::from_parameter(count), &text, |b, text| {
            b.iter(|| slice(black_box(text), 2.0, 20.0));
        });
    }
    group.finish();
}

fn bench_ellipsis(c: &mut Criterion) {
    let text = colored_text(64);
    c.bench_function("ellipsis_speculative", |b| {
        let opts = SliceOptions::new().ellipsis("\u{2026}");
        b.iter(|| slice_with(black_box(&text), 0.0, 60.0, &opts));
    });
}

fn bench_negative_index(c: &mut Criterion) {
    let text = colored_text(64);
    c.bench_function("negative_index_prepass", |b| {
        b.iter(|| slice(black_box(&text), -20.0, f64::INFINITY));
    });
}

criterion_group!(
    benches,
    bench_ascii_fast_path,
    bench_short_slice_of_long_input,
    bench_streaming_colored,
    bench_cjk,
    bench_zwj,
    bench_ellipsis,
    bench_negative_index
);
criterion_main!(benches);
