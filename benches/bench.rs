use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ere_grep::Regex;

const LOG: &str = "\
12:00:01_INFO Service started [MSG:listening on 8080]
12:00:02_WARN Slow request [ID:4711]
12:00:03 [MSG:heartbeat]
12:00:04_ERROR Upstream failed [ID:9]
";

const LOG_PATTERN: &str =
    r"[0-9]{2}:[0-9]{2}:[0-9]{2}(_WARN|_INFO|_ERROR)? ([A-Za-z ]+)?(\[ID:[0-9]+\]|\[MSG:[^\]]+\])?";

fn compile(c: &mut Criterion) {
    c.bench_function("compile log pattern", |b| {
        b.iter(|| Regex::new(black_box(LOG_PATTERN)).unwrap())
    });
}

fn find_all(c: &mut Criterion) {
    let re = Regex::new(LOG_PATTERN).unwrap();
    c.bench_function("find_all log lines", |b| {
        b.iter(|| re.find_all_submatches(black_box(LOG.as_bytes()), None).len())
    });

    let re = Regex::new("ba(.{0,2})na").unwrap();
    let haystack = "anbananaortwobananasbaxana".repeat(64);
    c.bench_function("find_all bananas", |b| {
        b.iter(|| re.find_all_submatches(black_box(haystack.as_bytes()), None).len())
    });
}

fn backtracking(c: &mut Criterion) {
    let re = Regex::new("^(a|ab)(c|bcd)*x$").unwrap();
    let haystack = "abcd".repeat(16);
    c.bench_function("failing backtrack", |b| {
        b.iter(|| re.is_match(black_box(haystack.as_bytes())))
    });
}

criterion_group!(benches, compile, find_all, backtracking);
criterion_main!(benches);
