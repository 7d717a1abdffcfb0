use std::io::Cursor;

use albedo_cropper::compositor::{
    halving_steps, Canvas, CanvasTarget, Compositor, Placement, ScaleFactor, ScaleMode, SourceImage,
};
use albedo_cropper::ingest::{loader, pipeline, IngestConfig};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};

fn gradient(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x * 255 / width.max(1)) as u8, (y * 255 / height.max(1)) as u8, 128])
    })
}

fn checker(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        if (x / 10 + y / 10) % 2 == 0 {
            Rgb([255, 255, 255])
        } else {
            Rgb([0, 0, 0])
        }
    })
}

fn png_bytes(image: &RgbImage) -> Vec<u8> {
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(image.clone())
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .expect("encode png");
    bytes
}

fn target(width: u32, height: u32) -> CanvasTarget {
    CanvasTarget {
        width,
        height,
        ..CanvasTarget::default()
    }
}

#[test]
fn scenario_a_cover_fit_binds_on_width() {
    let placement = Placement::compute((1024, 768), (480, 320), ScaleMode::CoverFit, None);
    assert!((placement.rect.width - 480.0).abs() < 1e-9);
    assert!((placement.rect.height - 360.0).abs() < 1e-9);
    assert!((placement.rect.y + 20.0).abs() < 1e-9);

    let source = SourceImage::new("a", "png", gradient(1024, 768));
    let compositor = Compositor::default();
    let mut canvas = Canvas::default();
    let output = compositor
        .recompute(&mut canvas, &source, &target(480, 320), None)
        .expect("output");
    assert_eq!((output.normal.width, output.normal.height), (480, 320));
}

#[test]
fn scenario_b_integer_scale_overflows_symmetrically() {
    let placement = Placement::compute(
        (64, 64),
        (480, 320),
        ScaleMode::Integer(ScaleFactor::Manual(8)),
        None,
    );
    assert_eq!(placement.scaled_size(), (512, 512));
    assert!((placement.rect.x + 16.0).abs() < 1e-9);
    assert!((placement.rect.right() - 496.0).abs() < 1e-9);

    let region = placement.visible_region((64, 64), (480, 320)).expect("visible");
    assert_eq!((region.dest_x, region.dest_width), (0, 480));
    assert!((region.source.x - 2.0).abs() < 1e-9);
    assert!((region.source.width - 60.0).abs() < 1e-9);
}

#[test]
fn scenario_c_zero_blur_outputs_are_identical() {
    let source = SourceImage::new("c", "png", gradient(200, 150));
    let compositor = Compositor::default();
    let mut canvas = Canvas::default();
    let output = compositor
        .recompute(&mut canvas, &source, &target(160, 90), None)
        .expect("output");
    assert_eq!(output.normal.bytes, output.blurred.bytes);
}

#[test]
fn scenario_d_thumbnail_of_large_target() {
    let steps = halving_steps((1920, 1152), (192, 115));
    assert!((3..=4).contains(&steps.len()), "steps: {steps:?}");

    let source = SourceImage::new("d", "png", gradient(960, 576));
    let compositor = Compositor::default();
    let mut canvas = Canvas::default();
    let output = compositor
        .recompute(&mut canvas, &source, &target(1920, 1152), None)
        .expect("output");
    assert_eq!((output.thumbnail.width, output.thumbnail.height), (192, 115));
}

#[test]
fn recompose_is_deterministic() {
    let source = SourceImage::new("det", "png", checker(300, 300));
    let mut target = target(240, 160);
    target.blur_amount = 12;

    let compositor = Compositor::default();
    let mut canvas = Canvas::default();
    let first = compositor.compose(&mut canvas, &source, &target, None).expect("first");
    let second = compositor.compose(&mut canvas, &source, &target, None).expect("second");

    assert_eq!(first.normal.bytes, second.normal.bytes);
    assert_eq!(first.blurred.bytes, second.blurred.bytes);
    assert_ne!(first.normal.bytes, first.blurred.bytes);
}

#[test]
fn ingest_then_compose_from_png_bytes() {
    let config = IngestConfig::default();
    let raw = loader::load_from_bytes("holiday.photo.png", png_bytes(&gradient(64, 48)), &config)
        .expect("load");
    assert_eq!(raw.name, "holiday.photo");
    assert_eq!(raw.extension, "png");

    let bitmap = pipeline::decode_normalized(&raw, &config).expect("decode");
    assert_eq!(bitmap.dimensions(), (64, 48));

    let source = SourceImage::new(raw.name.clone(), raw.extension.clone(), bitmap);
    let mut canvas_target = target(480, 320);
    canvas_target.integer_scale = true;
    canvas_target.auto_scale = true;

    let compositor = Compositor::default();
    let mut canvas = Canvas::default();
    let output = compositor
        .recompute(&mut canvas, &source, &canvas_target, None)
        .expect("output");
    assert_eq!((output.normal.width, output.normal.height), (480, 320));

    let variants = output.to_variants();
    assert!(variants.normal.starts_with("data:image/jpeg;base64,"));
    assert!(variants.thumbnail.starts_with("data:image/jpeg;base64,"));
}

#[test]
fn non_image_bytes_are_rejected() {
    let config = IngestConfig::default();
    assert!(loader::load_from_bytes("notes.txt", b"just some text".to_vec(), &config).is_err());
}
