//! End-to-end: pixelate a source, chunk the result, deliver the messages out
//! of order through the JSON wire format, and commit on the receiving side.

use painting_pixelator::prelude::*;
use painting_pixelator::{split, FinalizeRecord, Rgba, TransferError, UploadChunk};

fn photo(w: usize, h: usize) -> RawImage {
    let pixels = (0..h)
        .flat_map(|y| {
            (0..w).map(move |x| Rgba::opaque((x * 255 / w) as u8, (y * 255 / h) as u8, ((x ^ y) % 256) as u8))
        })
        .collect();
    RawImage::new(w, h, pixels).unwrap()
}

fn sprite(blocks: usize, cell: usize) -> RawImage {
    let size = blocks * cell;
    let pixels = (0..size * size)
        .map(|i| {
            let (bx, by) = ((i % size) / cell, (i / size) / cell);
            Rgba::opaque((bx * 29) as u8, (by * 61) as u8, ((bx + by) * 13) as u8)
        })
        .collect();
    RawImage::new(size, size, pixels).unwrap()
}

/// Finalize first, then the chunks back to front.
fn scramble(mut messages: Vec<Message>) -> Vec<Message> {
    let finalize = messages.pop().unwrap();
    messages.reverse();
    messages.insert(0, finalize);
    messages
}

fn deliver(receiver: &mut UploadReceiver<MemoryRegistry>, messages: Vec<Message>) -> Option<painting_pixelator::PaintingId> {
    let mut committed = None;
    for message in messages {
        let wire = message.to_json().unwrap();
        if let CommitOutcome::Committed(id) = receiver.handle_json(&wire).unwrap() {
            assert!(committed.is_none(), "committed twice");
            committed = Some(id);
        }
    }
    committed
}

#[test]
fn pixelate_upload_and_commit() {
    let transfer = TransferConfig { max_chunk_size: 4096 };
    let mut session = EditingSession::new(photo(400, 300), "sunset", PixelatorConfig::default());
    let params = session.parameters().clone();
    assert_eq!((params.tiles_wide, params.tiles_high), (4, 3));

    let output = session.output().unwrap().clone();
    assert_eq!((output.width(), output.height()), (128, 96));
    assert!(output.distinct_colors() <= 10);

    let messages = upload_messages(&output, &params, session.name(), &transfer).unwrap();
    // 128 * 96 * 4 bytes in 4 KiB chunks, plus the finalize record
    assert_eq!(messages.len(), 12 + 1);

    let mut receiver = UploadReceiver::new(MemoryRegistry::new(), transfer);
    let id = deliver(&mut receiver, scramble(messages)).expect("upload should commit");
    assert!(receiver.is_idle());

    let painting = receiver.registry().get(&id).unwrap();
    assert_eq!(painting.name, "sunset");
    assert_eq!(painting.tile_resolution, 32);
    assert_eq!(painting.to_image().unwrap(), output);
}

#[test]
fn superseded_upload_never_leaks_into_commit() {
    let transfer = TransferConfig { max_chunk_size: 4096 };
    let pixelator = Pixelator::default();
    let params = PixelatorParameters { tiles_wide: 2, tiles_high: 2, ..Default::default() };
    let first = pixelator.process(&photo(90, 70), &params).unwrap();
    let second = pixelator.process(&photo(70, 90), &params).unwrap();

    let mut receiver = UploadReceiver::new(MemoryRegistry::new(), transfer.clone());

    // half of an upload cut at 2 KiB, then abandoned
    let stale: Vec<Message> = split(bytes::Bytes::from(first.to_rgba_bytes()), 2048)
        .unwrap()
        .into_iter()
        .take(4)
        .map(|c| {
            Message::Upload(UploadChunk {
                tiles_wide: 2,
                tiles_high: 2,
                chunk_bytes: c.bytes,
                chunk_index: c.index,
                total_chunks: c.total,
            })
        })
        .collect();
    assert!(deliver(&mut receiver, stale).is_none());
    assert!(!receiver.is_idle());

    let fresh = upload_messages(&second, &params, "portrait", &transfer).unwrap();
    let id = deliver(&mut receiver, fresh).expect("second upload should commit");
    let painting = receiver.registry().get(&id).unwrap();
    assert_eq!(painting.to_image().unwrap(), second);
}

#[test]
fn hostile_finalize_is_dropped_not_committed() {
    let mut receiver = UploadReceiver::new(MemoryRegistry::new(), TransferConfig::default());
    let chunk = Message::Upload(UploadChunk {
        tiles_wide: 4,
        tiles_high: 4,
        chunk_bytes: bytes::Bytes::from_static(&[9, 9, 9, 9]),
        chunk_index: 0,
        total_chunks: 1,
    });
    receiver.handle_json(&chunk.to_json().unwrap()).unwrap();

    for (tiles, res) in [((16, 16), u32::MAX), ((1, 1), 1), ((4, 4), 16)] {
        let finalize = Message::Finalize(FinalizeRecord {
            name: "hostile".into(),
            tiles_wide: tiles.0,
            tiles_high: tiles.1,
            tile_resolution: res,
        });
        let outcome = receiver.handle_json(&finalize.to_json().unwrap()).unwrap();
        assert!(matches!(
            outcome,
            CommitOutcome::Dropped(
                TransferError::InvalidMetadata { .. } | TransferError::LengthMismatch { .. }
            )
        ));
    }
    assert!(receiver.registry().is_empty());
}

#[test]
fn pixel_art_source_maps_one_cell_per_pixel() {
    let src = sprite(32, 4);
    let mut session = EditingSession::new(src.clone(), "sprite", PixelatorConfig::default());
    session.update(|p| {
        p.pixel_art_mode = true;
        p.tile_resolution = 16;
    });
    assert_eq!(session.cell_size(), 4);
    assert_eq!((session.parameters().tiles_wide, session.parameters().tiles_high), (2, 2));

    let output = session.output().unwrap();
    assert_eq!((output.width(), output.height()), (32, 32));
    for y in 0..32 {
        for x in 0..32 {
            assert_eq!(output.get(x, y), src.get(x * 4, y * 4));
        }
    }
}

#[test]
fn repeated_runs_are_byte_identical() {
    let pixelator = Pixelator::default();
    let src = photo(200, 150);
    let params = PixelatorParameters { tiles_wide: 3, tiles_high: 2, dither_strength: 0.8, ..Default::default() };
    let a = pixelator.process(&src, &params).unwrap();
    let b = pixelator.process(&src, &params).unwrap();
    assert_eq!(a.to_rgba_bytes(), b.to_rgba_bytes());
}

#[cfg(feature = "native")]
#[test]
fn decodes_encoded_output() {
    use std::io::Cursor;

    let params = PixelatorParameters { tile_resolution: 16, ..Default::default() };
    let output = Pixelator::default().process(&photo(64, 64), &params).unwrap();

    let mut png = Vec::new();
    output.to_image().write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png).unwrap();
    assert_eq!(RawImage::decode(&png).unwrap(), output);
    assert!(matches!(RawImage::decode(b"not an image"), Err(PixelatorError::Decode(_))));
}
