//
// Copyright 2017-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Benchmarks for csvcodec performance

use bytes::BytesMut;
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use tokio_util::codec::{Decoder, Encoder};
use wireline_csvcodec::CsvCodec;

fn bench_decode_record_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_record_sizes");

    for fields in [1usize, 4, 16, 64].iter() {
        let line = vec!["field"; *fields].join(",") + "\n";
        group.throughput(Throughput::Bytes(line.len() as u64));

        group.bench_with_input(BenchmarkId::from_parameter(fields), &line, |b, line| {
            let mut codec = CsvCodec::new();

            b.iter(|| {
                let mut buffer = BytesMut::from(line.as_bytes());
                while codec.decode(black_box(&mut buffer)).unwrap().is_some() {}
            });
        });
    }

    group.finish();
}

fn bench_decode_terminators(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_terminators");

    for (name, terminator) in [("lf", &b"\n"[..]), ("crlf", &b"\r\n"[..]), ("nul", &b"\0"[..])] {
        let mut line = b"alpha,beta,gamma".to_vec();
        line.extend_from_slice(terminator);

        group.bench_function(name, |b| {
            let mut codec = CsvCodec::new();

            b.iter(|| {
                let mut buffer = BytesMut::from(&line[..]);
                while codec.decode(black_box(&mut buffer)).unwrap().is_some() {}
            });
        });
    }

    group.finish();
}

fn bench_decode_chunked(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_chunked");

    group.bench_function("byte_at_a_time", |b| {
        let mut codec = CsvCodec::new();
        let line = b"alpha,beta,gamma\n";

        b.iter(|| {
            for &byte in line.iter() {
                let mut buffer = BytesMut::from(&[byte][..]);
                let _ = codec.decode(black_box(&mut buffer)).unwrap();
            }
        });
    });

    group.finish();
}

fn bench_encode_replies(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_replies");

    for size in [2usize, 64, 1024].iter() {
        let text: String = "A".repeat(*size);
        group.throughput(Throughput::Bytes(*size as u64));

        group.bench_with_input(BenchmarkId::from_parameter(size), &text, |b, text| {
            let mut codec = CsvCodec::new();
            let mut buffer = BytesMut::with_capacity(text.len() + 1);

            b.iter(|| {
                buffer.clear();
                codec.encode(black_box(text.as_str()), &mut buffer).unwrap();
            });
        });
    }

    group.finish();
}

criterion_group!(
    codec_benches,
    bench_decode_record_sizes,
    bench_decode_terminators,
    bench_decode_chunked,
    bench_encode_replies
);

criterion_main!(codec_benches);
