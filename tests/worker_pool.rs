use std::io::Cursor;

use mockwarp::{
    Frame, FrameReader, FrameWriter, MockupConfig, MockupPool, MockupRequest, WireSink,
    collect_output, embed_corners, parse_chroma_comment, render_mockup,
};

fn png_bytes(img: image::DynamicImage) -> Vec<u8> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

fn request(comment: Option<&str>) -> MockupRequest {
    let base = png_bytes(image::DynamicImage::ImageRgba8(image::RgbaImage::new(120, 90)));
    let base = match comment {
        Some(c) => embed_corners(&base, &parse_chroma_comment(c).unwrap()).unwrap(),
        None => base,
    };
    let art = png_bytes(image::DynamicImage::ImageRgb8(image::RgbImage::from_fn(
        30,
        20,
        |x, y| image::Rgb([(x * 8) as u8, (y * 12) as u8, 77]),
    )));
    MockupRequest::new(base, art)
}

#[test]
fn pool_output_matches_direct_render() {
    let cfg = MockupConfig {
        threads: Some(3),
        ..MockupConfig::default()
    };
    let req = request(Some("chroma=10,12;105,8;110,80;6,75"));

    let mut direct = Vec::new();
    assert!(render_mockup(&req, &cfg, &mut direct).is_written());

    let pool = MockupPool::new(cfg).unwrap();
    assert_eq!(pool.threads(), 3);
    let pooled = pool.submit(req).collect_output().unwrap().unwrap();
    assert_eq!(pooled, direct);
}

#[test]
fn mixed_batch_reports_each_request_independently() {
    let pool = MockupPool::new(MockupConfig {
        threads: Some(2),
        ..MockupConfig::default()
    })
    .unwrap();

    let mut broken = request(Some("chroma=10,10;100,10;100,80;10,80"));
    broken.artwork = b"not an image".to_vec();

    let streams = pool.submit_all(vec![
        request(Some("chroma=10,10;100,10;100,80;10,80")),
        request(None),
        broken,
        request(Some("chroma=20,20;20,20;20,20;90,70")),
    ]);
    let results: Vec<_> = streams.into_iter().map(|s| s.collect_output()).collect();

    assert!(matches!(&results[0], Ok(Some(bytes)) if !bytes.is_empty()));
    assert!(matches!(&results[1], Ok(None)));
    assert!(results[2].as_ref().unwrap_err().to_string().contains("artwork"));
    assert!(matches!(&results[3], Ok(None)));
}

#[test]
fn frames_cross_a_byte_stream() {
    let req = request(Some("chroma=10,10;100,10;100,80;10,80"));
    let cfg = MockupConfig::default();

    let mut wire = Vec::new();
    let mut writer = FrameWriter::new(WireSink(&mut wire));
    let outcome = render_mockup(&req, &cfg, &mut writer);
    writer.finish(&outcome).unwrap();

    let frames: Vec<Frame> = FrameReader::new(Cursor::new(&wire))
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(frames.last(), Some(&Frame::End));

    let out = collect_output(frames.into_iter().map(Ok)).unwrap().unwrap();
    let img = image::load_from_memory(&out).unwrap();
    assert_eq!((img.width(), img.height()), (120, 90));
}
