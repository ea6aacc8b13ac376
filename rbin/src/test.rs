use super::*;
use std::io::Cursor;

#[test]
fn text_roundtrip_keeps_entry_header() {
    let text = vec![0x33, 0x02, 0x73, 0x00, 0x7F, 0x00, 0x00, 0x00];
    let mut buffer = Vec::new();

    write_text(&mut buffer, 0x100, &text).unwrap();
    assert_eq!(&buffer[..4], &[0x00, 0x01, 0x00, 0x00]);

    let (entry, read_back) = read_text(&mut Cursor::new(&buffer)).unwrap();
    assert_eq!(entry, 0x100);
    assert_eq!(read_back, text);
}

#[test]
fn write_read_files() {
    let prefix = "rbin_roundtrip";

    let program = Program::copy_from(
        0x40,
        &[30, 27, 34, 50, 91, 83, 49, 5],
        &[34, 1, 231, 60, 4, 2, 255],
    );

    write_artifacts(prefix, &program, &[], &[]).unwrap();

    let read_back = Program::load(
        format!("{}.text.bin", prefix),
        format!("{}.data.bin", prefix),
    )
    .unwrap();

    assert_eq!(program, read_back);

    for suffix in &[".text.bin", ".data.bin", ".text.log", ".data.log"] {
        std::fs::remove_file(format!("{}{}", prefix, suffix)).unwrap();
    }
}

#[test]
fn listing_line_format() {
    let entry = ListingEntry {
        address: 0x100,
        word: 0x0073_02B3,
        source: "add t0, t1, t2".to_string(),
    };
    assert_eq!(
        format_listing_line(&entry),
        "00000100(256) - 007302B3 - 00000000011100110000001010110011 - add t0, t1, t2"
    );
}
