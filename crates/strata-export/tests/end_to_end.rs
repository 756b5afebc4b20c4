//! Integration tests: raw image bytes through the full pipeline to SVG.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use strata_pipeline::{
    PartitionConfig, PartitionStrategy, PipelineError, PreprocessConfig, Rgb, TracerKind,
    VectorizeConfig,
};

fn encode_png(img: &image::RgbaImage) -> Vec<u8> {
    let mut buf = Vec::new();
    let encoder = image::codecs::png::PngEncoder::new(&mut buf);
    image::ImageEncoder::write_image(
        encoder,
        img.as_raw(),
        img.width(),
        img.height(),
        image::ExtendedColorType::Rgba8,
    )
    .unwrap();
    buf
}

/// 100x100 white canvas with a 50x50 pure red square in the middle.
fn red_square_png() -> Vec<u8> {
    encode_png(&image::RgbaImage::from_fn(100, 100, |x, y| {
        if (25..75).contains(&x) && (25..75).contains(&y) {
            image::Rgba([255, 0, 0, 255])
        } else {
            image::Rgba([255, 255, 255, 255])
        }
    }))
}

/// A flat "logo": navy background, yellow bar, green disc.
fn logo_png() -> Vec<u8> {
    encode_png(&image::RgbaImage::from_fn(160, 120, |x, y| {
        let dx = f64::from(x) - 110.0;
        let dy = f64::from(y) - 60.0;
        if dx.hypot(dy) < 30.0 {
            image::Rgba([40, 170, 60, 255])
        } else if (15..60).contains(&x) && (20..100).contains(&y) {
            image::Rgba([240, 200, 20, 255])
        } else {
            image::Rgba([20, 30, 90, 255])
        }
    }))
}

fn assert_single_root(svg: &str) {
    assert!(svg.starts_with("<?xml"));
    assert_eq!(svg.matches("<svg").count(), 1, "exactly one <svg> root");
    assert!(svg.trim_end().ends_with("</svg>") || svg.trim_end().ends_with("/>"));
    assert!(!svg.contains("<image"));
}

#[test]
fn red_square_two_colors() {
    let config = VectorizeConfig {
        colors: 2,
        ..VectorizeConfig::default()
    };
    let doc = strata_pipeline::process(&red_square_png(), &config).expect("pipeline");
    assert_eq!(doc.layers.len(), 2);

    let fills: Vec<Rgb> = doc.layers.iter().map(|l| l.fill).collect();
    let near = |a: Rgb, b: Rgb| a.distance_sq(b) < 300;
    assert!(fills.iter().any(|&f| near(f, Rgb::WHITE)), "{fills:?}");
    assert!(fills.iter().any(|&f| near(f, Rgb::new(255, 0, 0))), "{fills:?}");
    for layer in &doc.layers {
        assert!(!layer.paths.is_empty());
        assert!(layer.paths.iter().all(|p| !p.d.is_empty()));
    }

    let svg = strata_export::run(&red_square_png(), &config).unwrap();
    assert_single_root(&svg);
    assert!(svg.contains(r#"viewBox="0 0 100 100""#));
    assert_eq!(svg.matches("<g").count(), 2);
    assert!(svg.contains("<path"));
}

#[test]
fn red_square_equal_frequency_keeps_red_layer() {
    let config = VectorizeConfig {
        colors: 2,
        partition: PartitionConfig {
            strategy: PartitionStrategy::EqualFrequency,
            ..PartitionConfig::default()
        },
        ..VectorizeConfig::default()
    };
    let svg = strata_export::run(&red_square_png(), &config).unwrap();
    assert_single_root(&svg);
    assert_eq!(svg.matches("<g").count(), 2);
    assert!(svg.contains(r##"fill="#ff0000""##), "{svg}");
    assert!(svg.contains(r##"fill="#ffffff""##), "{svg}");
}

#[test]
fn single_band_is_one_black_group() {
    let config = VectorizeConfig {
        preprocess: PreprocessConfig {
            long_side: 80,
            ..PreprocessConfig::default()
        },
        ..VectorizeConfig::default()
    };
    let svg = strata_export::run(&logo_png(), &config).unwrap();
    assert_single_root(&svg);
    assert!(svg.contains(r#"viewBox="0 0 80 60""#));
    assert_eq!(svg.matches("<g").count(), 1);
    assert!(svg.contains(r##"fill="#000000""##));
    assert!(svg.contains("<rect"));
}

#[test]
fn layer_count_bounded_for_every_strategy_and_tracer() {
    let bytes = logo_png();
    for strategy in PartitionStrategy::ALL {
        for tracer in TracerKind::ALL {
            for colors in 2..=6 {
                let config = VectorizeConfig {
                    colors,
                    tracer,
                    partition: PartitionConfig {
                        strategy,
                        min_band_pixels: 100,
                        ..PartitionConfig::default()
                    },
                    ..VectorizeConfig::default()
                };
                let doc = strata_pipeline::process(&bytes, &config).unwrap();
                assert!(
                    doc.layers.len() <= colors as usize,
                    "{strategy}/{tracer}: {} layers for {colors} colors",
                    doc.layers.len()
                );
                assert!(doc.layers.iter().all(|l| !l.is_empty()));
                assert!(!doc.layers.is_empty());
            }
        }
    }
}

#[test]
fn outline_preview_has_no_fills() {
    let config = VectorizeConfig {
        colors: 3,
        ..VectorizeConfig::default()
    };
    let doc = strata_pipeline::process(&logo_png(), &config).unwrap();
    let svg = strata_export::to_outline_svg(&doc);
    assert_single_root(&svg);
    assert_eq!(
        svg.matches(r#"fill="none""#).count(),
        svg.matches("<g").count()
    );
}

#[test]
fn empty_upload_is_rejected() {
    let err = strata_export::run(&[], &VectorizeConfig::default()).unwrap_err();
    assert!(matches!(err, PipelineError::EmptyInput));
}

#[test]
fn non_image_upload_is_rejected() {
    let err = strata_export::run(b"<html>not an image</html>", &VectorizeConfig::default())
        .unwrap_err();
    assert!(matches!(err, PipelineError::ImageDecode(_)));
}

#[test]
fn invalid_config_is_rejected() {
    let mut config = VectorizeConfig::default();
    config.trace.length_threshold = f64::NAN;
    let err = strata_export::run(&red_square_png(), &config).unwrap_err();
    assert!(matches!(err, PipelineError::InvalidConfig(_)));
}
