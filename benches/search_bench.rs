use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use searchy::Grep;
use std::hint::black_box;
use std::io::Write;
use tempfile::NamedTempFile;

/// Log-like corpus: a needle on every 50th line.
fn generate_corpus(lines: usize) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    for i in 0..lines {
        if i % 50 == 0 {
            writeln!(file, "{} worker pool drained, sherlock seen at {}", i, i * 7).unwrap();
        } else {
            writeln!(file, "{} request served in {}us from cache shard {}", i, i * 3, i % 16).unwrap();
        }
    }
    file.flush().unwrap();
    file
}

fn corpus_size(file: &NamedTempFile) -> u64 {
    file.as_file().metadata().unwrap().len()
}

fn bench_literal_search(c: &mut Criterion) {
    let file = generate_corpus(200_000);
    let path = file.path().to_str().unwrap().to_string();

    let mut group = c.benchmark_group("literal_search");
    group.throughput(Throughput::Bytes(corpus_size(&file)));

    for workers in [1, 4, 8] {
        group.bench_with_input(BenchmarkId::new("count", workers), &workers, |b, &workers| {
            let grep = Grep::builder("sherlock", &path)
                .worker_threads(workers)
                .chunk_size(1024 * 1024)
                .build()
                .unwrap();
            b.iter(|| black_box(grep.count().unwrap()));
        });
    }

    group.finish();
}

fn bench_regex_search(c: &mut Criterion) {
    let file = generate_corpus(100_000);
    let path = file.path().to_str().unwrap().to_string();

    let mut group = c.benchmark_group("regex_search");
    group.throughput(Throughput::Bytes(corpus_size(&file)));

    group.bench_function("count", |b| {
        let grep = Grep::builder("sher[lk]ock", &path)
            .worker_threads(4)
            .chunk_size(1024 * 1024)
            .build()
            .unwrap();
        b.iter(|| black_box(grep.count().unwrap()));
    });

    group.finish();
}

fn bench_ignore_case_fold(c: &mut Criterion) {
    let file = generate_corpus(100_000);
    let path = file.path().to_str().unwrap().to_string();

    let mut group = c.benchmark_group("ignore_case");
    group.throughput(Throughput::Bytes(corpus_size(&file)));

    group.bench_function("ascii_fold", |b| {
        let grep = Grep::builder("SHERLOCK", &path)
            .ignore_case(true)
            .worker_threads(4)
            .chunk_size(1024 * 1024)
            .build()
            .unwrap();
        b.iter(|| black_box(grep.count().unwrap()));
    });

    group.finish();
}

fn bench_full_search_with_lines(c: &mut Criterion) {
    let file = generate_corpus(100_000);
    let path = file.path().to_str().unwrap().to_string();

    let mut group = c.benchmark_group("full_search");
    group.throughput(Throughput::Bytes(corpus_size(&file)));

    group.bench_function("line_numbers", |b| {
        let grep = Grep::builder("sherlock", &path)
            .line_number(true)
            .byte_offset(true)
            .worker_threads(4)
            .chunk_size(1024 * 1024)
            .build()
            .unwrap();
        b.iter(|| black_box(grep.search().unwrap()));
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_literal_search,
    bench_regex_search,
    bench_ignore_case_fold,
    bench_full_search_with_lines
);
criterion_main!(benches);
