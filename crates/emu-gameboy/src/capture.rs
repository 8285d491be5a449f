//! Headless capture: PNG screenshots.

use std::error::Error;
use std::fs;
use std::path::Path;

use crate::frame::FrameBuffer;
use crate::session::{SessionHandle, SessionTable};

/// Save a frame as a PNG file.
///
/// The frame is ARGB32; the encoder gets opaque RGBA bytes.
///
/// # Errors
///
/// Returns an error if the file cannot be created or written.
pub fn save_screenshot(frame: &FrameBuffer, path: &Path) -> Result<(), Box<dyn Error>> {
    let file = fs::File::create(path)?;
    let w = std::io::BufWriter::new(file);
    let mut encoder = png::Encoder::new(w, frame.width(), frame.height());
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder.write_header()?;

    let rgba: Vec<u8> = frame
        .pixels()
        .iter()
        .flat_map(|&pixel| {
            let [_, r, g, b] = pixel.to_be_bytes();
            [r, g, b, 0xFF]
        })
        .collect();

    writer.write_image_data(&rgba)?;
    Ok(())
}

/// Render `num_frames` frames of a session into `dir/frames/NNNNNN.png`.
///
/// # Errors
///
/// Returns an error if a frame fails to render or save.
pub fn record(
    table: &SessionTable,
    handle: SessionHandle,
    dir: &Path,
    num_frames: u32,
) -> Result<(), Box<dyn Error>> {
    let frames_dir = dir.join("frames");
    fs::create_dir_all(&frames_dir)?;

    for _ in 0..num_frames {
        let frame = table.render_frame(handle)?;
        let filename = frames_dir.join(format!("{:06}.png", frame.frame_number()));
        save_screenshot(&frame, &filename)?;
    }

    eprintln!("Captured {num_frames} frames to {}", frames_dir.display());
    Ok(())
}
