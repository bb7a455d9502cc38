use super::*;

#[test]
fn defaults_match_legacy_converter() {
    let cfg = ConvertConfig::default();
    cfg.validate().unwrap();
    assert_eq!((cfg.width, cfg.height), (466, 466));
    assert_eq!(cfg.depth, ColorDepth::Rgb565);
    assert_eq!(cfg.rgb565_order, Rgb565Order::SwappedLe);
    assert_eq!(cfg.mode, OutputMode::PerFile);
    assert_eq!(cfg.stride, 1);
    assert_eq!(cfg.sector_size, 512);
}

#[test]
fn validation_catches_bad_values() {
    let bad = [
        ConvertConfig {
            width: 0,
            ..ConvertConfig::default()
        },
        ConvertConfig {
            stride: 0,
            ..ConvertConfig::default()
        },
        ConvertConfig {
            max_frames: Some(0),
            ..ConvertConfig::default()
        },
        ConvertConfig {
            sector_size: 0,
            ..ConvertConfig::default()
        },
        ConvertConfig {
            pad_records: true,
            mode: OutputMode::PerFile,
            ..ConvertConfig::default()
        },
        ConvertConfig {
            pretouch_records: MAX_PRETOUCH_RECORDS + 1,
            ..ConvertConfig::default()
        },
        ConvertConfig {
            threading: Threading {
                threads: Some(0),
                ..Threading::default()
            },
            ..ConvertConfig::default()
        },
    ];
    for cfg in bad {
        let err = cfg.validate().unwrap_err();
        assert!(
            matches!(err, FramepackError::Config(_)),
            "expected config error for {cfg:?}"
        );
    }
}

#[test]
fn size_argument_accepts_one_or_two_values() {
    let mut cfg = ConvertConfig::default();
    cfg.set_size(&[32]).unwrap();
    assert_eq!((cfg.width, cfg.height), (32, 32));
    cfg.set_size(&[32, 24]).unwrap();
    assert_eq!((cfg.width, cfg.height), (32, 24));
    assert!(cfg.set_size(&[]).is_err());
    assert!(cfg.set_size(&[1, 2, 3]).is_err());
}

#[test]
fn json_config_fills_defaults_and_rejects_unknown_depth() {
    let cfg: ConvertConfig = serde_json::from_str(
        r#"{ "width": 233, "height": 233, "depth": 8, "rotation": -90, "mode": "single-blob" }"#,
    )
    .unwrap();
    assert_eq!(cfg.depth, ColorDepth::Rgb332);
    assert_eq!(cfg.rotation, Rotation::Cw90);
    assert_eq!(cfg.mode, OutputMode::SingleBlob);
    assert_eq!(cfg.stride, 1);

    assert!(serde_json::from_str::<ConvertConfig>(r#"{ "depth": 24 }"#).is_err());
    assert!(serde_json::from_str::<ConvertConfig>(r#"{ "rotation": 45 }"#).is_err());
    assert!(serde_json::from_str::<ConvertConfig>(r#"{ "colour": 8 }"#).is_err());
}

#[test]
fn verify_config_start_offset_uses_sector_size() {
    let cfg = VerifyConfig::new("/dev/null", "frames.bin", 1000);
    assert_eq!(cfg.start_offset(), 2048 * 512);
    cfg.validate().unwrap();

    let bad = VerifyConfig {
        max_mismatches: 0,
        ..cfg
    };
    assert!(bad.validate().is_err());
}
