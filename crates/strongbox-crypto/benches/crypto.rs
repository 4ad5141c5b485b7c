use std::sync::Arc;

use strongbox_crypto::{CipherCombo, FileCodec, Masterkey, NameCipher, SivCipher};

fn make_data(size: usize) -> Vec<u8> {
    (0..size)
        .map(|i| (i.wrapping_mul(7) ^ (i >> 3)) as u8)
        .collect()
}

fn test_masterkey() -> Masterkey {
    Masterkey::from_raw(&[0x55u8; 32], &[0x77u8; 32])
}

fn combo_by_name(name: &str) -> CipherCombo {
    match name {
        "ctrmac" => CipherCombo::SivCtrMac,
        _ => CipherCombo::SivGcm,
    }
}

#[divan::bench(args = ["ctrmac", "gcm"])]
fn bench_encrypt_chunk(bencher: divan::Bencher, combo: &str) {
    let codec = FileCodec::new(Arc::new(test_masterkey()), combo_by_name(combo));
    let header = codec.create_header().unwrap();
    let data = make_data(32 * 1024);
    bencher
        .counter(divan::counter::BytesCount::new(data.len()))
        .bench(|| {
            codec
                .encrypt_chunk(divan::black_box(&data), 0, &header)
                .unwrap()
        });
}

#[divan::bench(args = ["ctrmac", "gcm"])]
fn bench_decrypt_chunk(bencher: divan::Bencher, combo: &str) {
    let codec = FileCodec::new(Arc::new(test_masterkey()), combo_by_name(combo));
    let header = codec.create_header().unwrap();
    let sealed = codec.encrypt_chunk(&make_data(32 * 1024), 0, &header).unwrap();
    bencher
        .counter(divan::counter::BytesCount::new(32 * 1024usize))
        .bench(|| {
            codec
                .decrypt_chunk(divan::black_box(&sealed), 0, &header)
                .unwrap()
        });
}

#[divan::bench(args = [32, 255])]
fn bench_encrypt_file_name(bencher: divan::Bencher, len: usize) {
    let masterkey = test_masterkey();
    let names = NameCipher::new(&masterkey);
    let name = "a".repeat(len);
    bencher.bench(|| {
        names
            .encrypt_file_name(
                divan::black_box(&name),
                "918acfbd-a467-3f77-93f1-f4a44f9cfe9c",
                strongbox_crypto::FileNameEncoding::Base64url,
            )
            .unwrap()
    });
}

#[divan::bench(args = [1024, 65536])]
fn bench_siv_encrypt(bencher: divan::Bencher, size: usize) {
    let siv = SivCipher::new(&[0x55u8; 32], &[0x77u8; 32]);
    let data = make_data(size);
    bencher
        .counter(divan::counter::BytesCount::new(size))
        .bench(|| siv.encrypt(divan::black_box(&data), &[]).unwrap());
}

fn main() {
    divan::main();
}
