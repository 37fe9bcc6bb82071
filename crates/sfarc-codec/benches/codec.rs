use sfarc_codec::{decode, encode, CodeTable};

fn make_data(size: usize) -> Vec<u8> {
    // skewed text-like distribution so codes have mixed lengths
    (0..size)
        .map(|i| b"eeeetttaaoinshrdlu  \n"[(i.wrapping_mul(7) ^ (i >> 3)) % 21])
        .collect()
}

#[divan::bench(args = [1024, 65536, 1048576])]
fn bench_build_table(bencher: divan::Bencher, size: usize) {
    let data = make_data(size);
    bencher
        .counter(divan::counter::BytesCount::new(size))
        .bench(|| CodeTable::build(divan::black_box(&data)).unwrap());
}

#[divan::bench(args = [1024, 65536, 1048576])]
fn bench_encode(bencher: divan::Bencher, size: usize) {
    let data = make_data(size);
    let table = CodeTable::build(&data).unwrap();
    bencher
        .counter(divan::counter::BytesCount::new(size))
        .bench(|| encode(divan::black_box(&data), divan::black_box(&table)).unwrap());
}

#[divan::bench(args = [1024, 65536, 1048576])]
fn bench_decode(bencher: divan::Bencher, size: usize) {
    let data = make_data(size);
    let table = CodeTable::build(&data).unwrap();
    let encoded = encode(&data, &table).unwrap();
    bencher
        .counter(divan::counter::BytesCount::new(size))
        .bench(|| {
            decode(
                divan::black_box(&encoded.payload),
                encoded.padding_bits,
                divan::black_box(&table),
            )
            .unwrap()
        });
}

fn main() {
    divan::main();
}
