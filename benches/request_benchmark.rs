use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use mooder::request::Request;
use mooder::url::parse_target;

fn simple_request_parse_benchmark(c: &mut Criterion) {
    let request = b"GET / HTTP/1.1\r\nHost: localhost:14351\r\nUser-Agent: Test\r\n\r\n";

    c.bench_function("simple_request_parse", |b| {
        b.iter(|| {
            let _ = Request::try_from(black_box(&request[..]), 0).unwrap();
        });
    });
}

fn complex_request_parse_benchmark(c: &mut Criterion) {
    let request = b"POST /7 HTTP/1.1\r\n\
                    Host: localhost:14351\r\n\
                    User-Agent: Mozilla/5.0 (Windows NT 10.0; Win64; x64)\r\n\
                    Accept: text/html,application/xhtml+xml\r\n\
                    Accept-Language: en-US,en;q=0.9\r\n\
                    Accept-Encoding: gzip, deflate, br\r\n\
                    Content-Type: application/x-www-form-urlencoded\r\n\
                    Content-Length: 0\r\n\
                    Origin: http://localhost:14351\r\n\
                    \r\n";

    c.bench_function("complex_request_parse", |b| {
        b.iter(|| {
            let request = Request::try_from(black_box(&request[..]), 0).unwrap();
            let _ = request.body_framing();
            let _ = request.accept_encoding();
        });
    });
}

fn target_parse_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("target_parse");

    let targets = [
        ("root", "/"),
        ("static", "/css/style.css"),
        ("traversal", "/../../static/../style.css"),
        ("query", "/?a=1&b=2&c=3&d"),
        ("encoded_query", "/search?q=%E4%BD%A0%E5%A5%BD&lang=zh%2DCN&page=2"),
        ("long", "/very/long/path/to/some/resource/with/many/segments?param1=value1&param2=value2&param3=value3"),
    ];

    for (name, target) in targets.iter() {
        group.bench_with_input(BenchmarkId::from_parameter(name), target, |b, target| {
            b.iter(|| {
                let _ = parse_target(black_box(target)).unwrap();
            });
        });
    }

    group.finish();
}

fn request_parse_batch_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("request_parse_batch");

    for count in [10, 100, 1000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            let request = b"GET /style.css HTTP/1.1\r\nHost: localhost\r\nUser-Agent: Test\r\nAccept-Encoding: gzip\r\n\r\n";

            b.iter(|| {
                for _ in 0..count {
                    let request = Request::try_from(black_box(&request[..]), 0).unwrap();
                    let _ = parse_target(request.target()).unwrap();
                }
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    simple_request_parse_benchmark,
    complex_request_parse_benchmark,
    target_parse_benchmark,
    request_parse_batch_benchmark
);
criterion_main!(benches);
