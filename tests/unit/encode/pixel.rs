use image::Rgb;

use super::*;

#[test]
fn rgb332_primaries() {
    assert_eq!(pack_rgb332(255, 0, 0), 0b1110_0000);
    assert_eq!(pack_rgb332(0, 255, 0), 0b0001_1100);
    assert_eq!(pack_rgb332(0, 0, 255), 0b0000_0011);
    assert_eq!(pack_rgb332(255, 255, 255), 0xFF);
    assert_eq!(pack_rgb332(31, 31, 63), 0);
}

#[test]
fn rgb332_unpack_reproduces_truncated_channels() {
    for r in (0..=255u8).step_by(7) {
        for g in (0..=255u8).step_by(11) {
            for b in (0..=255u8).step_by(13) {
                let packed = pack_rgb332(r, g, b);
                assert_eq!(unpack_rgb332(packed), [r & 0xE0, g & 0xE0, b & 0xC0]);
                assert_eq!(pack_rgb332(r, g, b), packed);
            }
        }
    }
}

#[test]
fn rgb565_primaries() {
    assert_eq!(pack_rgb565(255, 0, 0), 0xF800);
    assert_eq!(pack_rgb565(0, 255, 0), 0x07E0);
    assert_eq!(pack_rgb565(0, 0, 255), 0x001F);
    assert_eq!(unpack_rgb565(0xF800), [0xF8, 0, 0]);
    assert_eq!(unpack_rgb565(pack_rgb565(0x12, 0x34, 0x56)), [0x10, 0x34, 0x50]);
}

#[test]
fn rgb565_byte_orders_are_explicit() {
    // Standard red 0xF800: the legacy path swaps to 0x00F8 and stores it low byte first.
    assert_eq!(rgb565_bytes(0xF800, Rgb565Order::SwappedLe), [0xF8, 0x00]);
    assert_eq!(rgb565_bytes(0xF800, Rgb565Order::BigEndian), [0xF8, 0x00]);
    assert_eq!(rgb565_bytes(0xF800, Rgb565Order::LittleEndian), [0x00, 0xF8]);

    for word in [0x0000u16, 0x1234, 0xF800, 0x07E0, 0xFFFF] {
        for order in [
            Rgb565Order::SwappedLe,
            Rgb565Order::BigEndian,
            Rgb565Order::LittleEndian,
        ] {
            assert_eq!(rgb565_from_bytes(rgb565_bytes(word, order), order), word);
        }
    }
}

#[test]
fn output_length_follows_depth() {
    for (w, h) in [(1u32, 1u32), (2, 2), (3, 5), (233, 1)] {
        let frame = RgbImage::from_pixel(w, h, Rgb([1, 2, 3]));
        let px = (w * h) as usize;
        assert_eq!(encode_frame(&frame, PixelFormat::Rgb332).unwrap().len(), px);
        assert_eq!(
            encode_frame(&frame, PixelFormat::Rgb565(Rgb565Order::SwappedLe))
                .unwrap()
                .len(),
            2 * px
        );
    }
}

#[test]
fn encode_is_row_major() {
    let mut frame = RgbImage::new(2, 2);
    frame.put_pixel(0, 0, Rgb([255, 0, 0]));
    frame.put_pixel(1, 0, Rgb([0, 255, 0]));
    frame.put_pixel(0, 1, Rgb([0, 0, 255]));
    frame.put_pixel(1, 1, Rgb([255, 255, 255]));

    let rgb332 = encode_frame(&frame, PixelFormat::Rgb332).unwrap();
    assert_eq!(rgb332, vec![0xE0, 0x1C, 0x03, 0xFF]);

    let be = encode_frame(&frame, PixelFormat::Rgb565(Rgb565Order::BigEndian)).unwrap();
    assert_eq!(be, vec![0xF8, 0x00, 0x07, 0xE0, 0x00, 0x1F, 0xFF, 0xFF]);

    let le = encode_frame(&frame, PixelFormat::Rgb565(Rgb565Order::LittleEndian)).unwrap();
    assert_eq!(le, vec![0x00, 0xF8, 0xE0, 0x07, 0x1F, 0x00, 0xFF, 0xFF]);
}

#[test]
fn encode_is_deterministic() {
    let frame = RgbImage::from_fn(7, 3, |x, y| Rgb([(x * 30) as u8, (y * 80) as u8, 200]));
    let fmt = PixelFormat::Rgb565(Rgb565Order::SwappedLe);
    assert_eq!(encode_frame(&frame, fmt).unwrap(), encode_frame(&frame, fmt).unwrap());
}

#[test]
fn decode_inverts_encode_at_reduced_precision() {
    let rgb = [0x12u8, 0x34, 0x56, 0xFF, 0x80, 0x01];
    let fmt = PixelFormat::Rgb565(Rgb565Order::LittleEndian);
    let data = encode_rgb8(&rgb, fmt).unwrap();
    assert_eq!(
        decode_to_rgb8(&data, fmt).unwrap(),
        vec![0x10, 0x34, 0x50, 0xF8, 0x80, 0x00]
    );
    assert!(decode_to_rgb8(&[0u8; 3], fmt).is_err());
}

#[test]
fn partial_pixels_are_rejected() {
    assert!(encode_rgb8(&[1, 2, 3, 4], PixelFormat::Rgb332).is_err());
}
