use rsdelta::SignatureConfig;
use rsdelta::io::{delta_file, patch_file, signature_file};
use std::io::{Read, Seek, SeekFrom, Write};
use tempfile::NamedTempFile;

#[test]
#[ignore = "multi-GB test is opt-in due runtime and disk requirements"]
fn multi_gb_sparse_file_roundtrip() {
    const SIZE: u64 = 2 * 1024 * 1024 * 1024;
    let mut basis = NamedTempFile::new().unwrap();
    let mut new = NamedTempFile::new().unwrap();
    let sig = NamedTempFile::new().unwrap();
    let delta = NamedTempFile::new().unwrap();
    let output = NamedTempFile::new().unwrap();

    // Sparse 2 GiB files with a few deterministic mutations.
    basis.as_file_mut().set_len(SIZE).unwrap();
    new.as_file_mut().set_len(SIZE).unwrap();

    basis.as_file_mut().seek(SeekFrom::Start(64 * 1024)).unwrap();
    basis.as_file_mut().write_all(b"baseline-block").unwrap();

    new.as_file_mut().seek(SeekFrom::Start(64 * 1024)).unwrap();
    new.as_file_mut().write_all(b"mutated-block!").unwrap();
    new.as_file_mut().seek(SeekFrom::Start(1024 * 1024 * 1024)).unwrap();
    new.as_file_mut().write_all(b"middle-chunk").unwrap();

    let sig_stats = signature_file(basis.path(), sig.path(), None).unwrap();
    assert_eq!(sig_stats.input_size, SIZE);
    assert_eq!(sig_stats.job.block_len, SignatureConfig::recommended(Some(SIZE)).block_len);

    let delta_stats = delta_file(sig.path(), new.path(), delta.path()).unwrap();
    assert!(delta_stats.output_size > 0);
    assert!(delta_stats.job.lit_bytes < 1024 * 1024);

    let patch_stats = patch_file(basis.path(), delta.path(), output.path()).unwrap();
    assert_eq!(patch_stats.output_size, SIZE);

    let mut out_f = std::fs::File::open(output.path()).unwrap();
    let mut new_f = std::fs::File::open(new.path()).unwrap();
    for off in [0u64, 64 * 1024, 1024 * 1024 * 1024, SIZE - 32] {
        out_f.seek(SeekFrom::Start(off)).unwrap();
        new_f.seek(SeekFrom::Start(off)).unwrap();
        let mut ob = [0u8; 32];
        let mut nb = [0u8; 32];
        out_f.read_exact(&mut ob).unwrap();
        new_f.read_exact(&mut nb).unwrap();
        assert_eq!(ob, nb, "mismatch at offset {off}");
    }
}

#[test]
fn edge_case_matrix() {
    let cases: Vec<(&[u8], &[u8])> = vec![
        (b"", b""),
        (b"", b"x"),
        (b"x", b""),
        (b"\0\0\0\0\0", b"\0\0\0\0\0"),
        (b"\0\0\0\0\0", b"\0\0\0\0\x01"),
        (b"abcabcabc", b"cabcabcab"),
    ];

    for block_len in [1u32, 2, 3, 64] {
        for (basis, new) in &cases {
            let config = SignatureConfig::new(block_len, 16);
            let delta = rsdelta::engine::diff(basis, new, config).unwrap();
            let rebuilt = rsdelta::engine::patch(*basis, &delta).unwrap();
            assert_eq!(&rebuilt, new, "block_len={block_len}");
        }
    }
}
