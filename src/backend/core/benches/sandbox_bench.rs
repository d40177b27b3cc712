//! Benchmarks for the request hot path outside the container itself.
//!
//! Run with: cargo bench

use std::collections::BTreeMap;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use protogen_core::identity::PluginCoordinate;
use prost::Message;
use prost_types::compiler::code_generator_response::File;
use protogen_core::sandbox::protocol::{decode_response, CodeGeneratorResponse};
use protogen_core::sandbox::{ContainerInvocation, SandboxConfig};

/// Benchmark coordinate parsing.
fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("identity_parse");

    for raw in ["acme/go:v1.0.0", "protocolbuffers/python:latest", "a-very-long-group-name/plugin:v123.456.789"] {
        group.bench_with_input(BenchmarkId::from_parameter(raw), raw, |b, raw| {
            b.iter(|| PluginCoordinate::parse(black_box(raw)))
        });
    }
    group.finish();
}

/// Benchmark invocation building with growing env/tmpfs maps.
fn bench_invocation(c: &mut Criterion) {
    let mut group = c.benchmark_group("container_invocation");
    let coordinate = PluginCoordinate::new("acme", "go", "v1.0.0");

    for entries in [0usize, 4, 32].iter() {
        let sandbox = SandboxConfig {
            user: Some("nobody".to_string()),
            read_only: true,
            env: (0..*entries)
                .map(|i| (format!("VAR_{i}"), format!("value-{i}")))
                .collect::<BTreeMap<_, _>>(),
            tmpfs: (0..*entries)
                .map(|i| (format!("/tmp/{i}"), "rw,size=16m".to_string()))
                .collect::<BTreeMap<_, _>>(),
            ..Default::default()
        };

        group.throughput(Throughput::Elements(*entries as u64));
        group.bench_with_input(BenchmarkId::from_parameter(entries), &sandbox, |b, sandbox| {
            b.iter(|| {
                ContainerInvocation::build(
                    "docker",
                    black_box("registry.example.com"),
                    &coordinate,
                    sandbox,
                )
            })
        });
    }
    group.finish();
}

/// Benchmark response validation for growing file lists.
fn bench_framing(c: &mut Criterion) {
    let mut group = c.benchmark_group("protocol_framing");

    for files in [1usize, 50, 500].iter() {
        let bytes = CodeGeneratorResponse {
            file: (0..*files)
                .map(|i| File {
                    name: Some(format!("acme/v1/file_{i}.pb.go")),
                    content: Some("package acme\n".repeat(64)),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        }
        .encode_to_vec();

        group.throughput(Throughput::Bytes(bytes.len() as u64));
        group.bench_with_input(BenchmarkId::new("decode", files), &bytes, |b, bytes| {
            b.iter(|| decode_response(black_box(bytes)))
        });
    }

    let empty: &[u8] = &[];
    group.bench_function("decode_empty", |b| b.iter(|| decode_response(black_box(empty))));
    group.finish();
}

criterion_group!(benches, bench_parse, bench_invocation, bench_framing);
criterion_main!(benches);
