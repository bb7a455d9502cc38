use image::Rgba;

use super::*;

fn geom(w: u32, h: u32) -> OutputGeometry {
    OutputGeometry::new(w, h).unwrap()
}

#[test]
fn wide_source_scales_to_height_and_crops_width() {
    let plan = plan_cover(400, 100, geom(20, 20)).unwrap();
    assert_eq!(plan.scaled_height, 20);
    assert_eq!(plan.scaled_width, 80);
    assert_eq!(plan.crop_x, 30);
    assert_eq!(plan.crop_y, 0);
}

#[test]
fn tall_source_scales_to_width_and_crops_height() {
    let plan = plan_cover(100, 301, geom(20, 20)).unwrap();
    assert_eq!(plan.scaled_width, 20);
    assert_eq!(plan.scaled_height, 60);
    assert_eq!(plan.crop_x, 0);
    assert_eq!(plan.crop_y, 20);
}

#[test]
fn equal_aspect_takes_width_branch_without_crop() {
    let plan = plan_cover(300, 200, geom(30, 20)).unwrap();
    assert_eq!(
        plan,
        CoverPlan {
            scaled_width: 30,
            scaled_height: 20,
            crop_x: 0,
            crop_y: 0
        }
    );
}

#[test]
fn crop_offsets_stay_centered_for_many_aspects() {
    for (sw, sh) in [(1, 1), (7, 3), (3, 7), (640, 480), (480, 640), (1000, 999), (1, 500)] {
        for (tw, th) in [(1, 1), (20, 20), (32, 24), (24, 32), (233, 233)] {
            let plan = plan_cover(sw, sh, geom(tw, th)).unwrap();
            assert!(plan.scaled_width >= tw && plan.scaled_height >= th);

            let overflow_x = plan.scaled_width - tw;
            let overflow_y = plan.scaled_height - th;
            assert!(overflow_x == 0 || overflow_y == 0, "{sw}x{sh} -> {tw}x{th}");
            for (offset, overflow) in [(plan.crop_x, overflow_x), (plan.crop_y, overflow_y)] {
                assert!(offset <= overflow);
                assert!((overflow - offset).abs_diff(offset) <= 1);
            }
        }
    }
}

#[test]
fn empty_source_is_rejected() {
    assert!(plan_cover(0, 10, geom(4, 4)).is_err());
}

#[test]
fn fit_frame_output_is_exactly_target_size() {
    for (sw, sh) in [(5, 3), (3, 5), (8, 8), (1, 9)] {
        let src = RgbaImage::from_pixel(sw, sh, Rgba([10, 20, 30, 255]));
        for rotation in [Rotation::None, Rotation::Ccw90, Rotation::Half, Rotation::Cw90] {
            let out = fit_frame(&src, geom(4, 2), rotation, ResampleFilter::Nearest).unwrap();
            assert_eq!(out.dimensions(), (4, 2));
        }
    }
}

#[test]
fn rotation_expands_canvas_and_moves_corners() {
    // 2x1: red on the left, blue on the right.
    let mut src = RgbaImage::new(2, 1);
    src.put_pixel(0, 0, Rgba([255, 0, 0, 255]));
    src.put_pixel(1, 0, Rgba([0, 0, 255, 255]));

    let ccw = rotate(&src, Rotation::Ccw90);
    assert_eq!(ccw.dimensions(), (1, 2));
    // Counter-clockwise: the right edge moves to the top.
    assert_eq!(ccw.get_pixel(0, 0), &Rgba([0, 0, 255, 255]));
    assert_eq!(ccw.get_pixel(0, 1), &Rgba([255, 0, 0, 255]));

    let cw = rotate(&src, Rotation::Cw90);
    assert_eq!(cw.dimensions(), (1, 2));
    assert_eq!(cw.get_pixel(0, 0), &Rgba([255, 0, 0, 255]));

    let half = rotate(&src, Rotation::Half);
    assert_eq!(half.get_pixel(0, 0), &Rgba([0, 0, 255, 255]));
}

#[test]
fn center_crop_keeps_the_middle_columns() {
    // 6x2 source, columns 0..6 tagged in the red channel; target 2x2 needs no scaling.
    let mut src = RgbaImage::new(6, 2);
    for (x, _, px) in src.enumerate_pixels_mut() {
        *px = Rgba([x as u8 * 10, 0, 0, 255]);
    }
    let out = fit_frame(&src, geom(2, 2), Rotation::None, ResampleFilter::Nearest).unwrap();
    assert_eq!(out.get_pixel(0, 0)[0], 20);
    assert_eq!(out.get_pixel(1, 0)[0], 30);
}
