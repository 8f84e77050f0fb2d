use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;

fn payload(len: usize) -> Vec<u8> {
	let mut state = 0x2545_F491_4F6C_DD1Du64;
	(0..len)
		.map(|_| {
			state ^= state << 13;
			state ^= state >> 7;
			state ^= state << 17;
			state as u8
		})
		.collect()
}

fn run_benches(c: &mut Criterion) {
	let large = black_box(payload(8 << 20));
	let small = black_box(payload(4 << 10));

	let mut group = c.benchmark_group("large-file");
	group.sample_size(20);

	group.bench_function("chunked-buffer", |b| {
		b.iter(|| {
			let mut buf = filer::ChunkedBuffer::new(filer::DEFAULT_CHUNK_CAPACITY).unwrap();
			buf.append_from_source(&large[..]).unwrap();
			black_box(buf.linearize().unwrap());
		})
	});

	group.bench_function("vec", |b| {
		b.iter(|| {
			let mut buf = Vec::new();
			std::io::Read::read_to_end(&mut &large[..], &mut buf).unwrap();
			black_box(buf);
		})
	});

	group.bench_function("pack-unpack", |b| {
		b.iter(|| {
			let grid = filer::pack(&large).unwrap();
			black_box(filer::unpack(grid.pixels()).unwrap());
		})
	});

	group.bench_function("png-round-trip", |b| {
		let grid = filer::pack(&large).unwrap();
		b.iter(|| {
			let mut png = Vec::new();
			filer::encode_png(&grid, &mut png).unwrap();
			black_box(filer::decode_png(&png[..]).unwrap());
		})
	});
	group.finish();

	let mut group = c.benchmark_group("small-file");
	group.sample_size(1000);
	group.bench_function("pack-unpack", |b| {
		b.iter(|| {
			let grid = filer::pack(&small).unwrap();
			black_box(filer::unpack(grid.pixels()).unwrap());
		})
	});
	group.bench_function("png-round-trip", |b| {
		let grid = filer::pack(&small).unwrap();
		b.iter(|| {
			let mut png = Vec::new();
			filer::encode_png(&grid, &mut png).unwrap();
			black_box(filer::decode_png(&png[..]).unwrap());
		})
	});
	group.finish();
}

criterion_group!(benches, run_benches);
criterion_main!(benches);
