//! 编解码性能基准

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use rci_protocol::*;

fn bench_collision_behavior(c: &mut Criterion) {
    let request = Request::SetCollisionBehavior(SetCollisionBehaviorRequest::uniform(
        [20.0; 14], [20.0; 12],
    ));
    let bytes = encode_request(&request);

    c.bench_function("encode_set_collision_behavior", |b| {
        b.iter(|| encode_request(black_box(&request)))
    });
    c.bench_function("decode_set_collision_behavior", |b| {
        b.iter(|| decode_request(black_box(&bytes)).unwrap())
    });
}

fn bench_cartesian_limit_response(c: &mut Criterion) {
    let response = Response::GetCartesianLimit(GetCartesianLimitResponse {
        status: GetCartesianLimitStatus::Success,
        limit: CartesianLimit::default(),
    });
    let bytes = encode_response(&response);

    c.bench_function("decode_get_cartesian_limit_response", |b| {
        b.iter(|| decode_response(black_box(&bytes), FunctionId::GetCartesianLimit).unwrap())
    });
}

fn bench_classify(c: &mut Criterion) {
    let raw = RawSafetyFlags::from(0x1_0000_00C0u64);
    c.bench_function("classify_safety_flags", |b| b.iter(|| classify(black_box(raw))));
}

criterion_group!(
    benches,
    bench_collision_behavior,
    bench_cartesian_limit_response,
    bench_classify
);
criterion_main!(benches);
