//! Raw frames and preprocessed observations
//!
//! The simulator renders `height x width x 3` RGB frames. The agent sees a
//! cropped, channel-first, `[0, 1]`-scaled view of them.

use anyhow::{Result, bail};
use std::ops::Range;

/// Number of colour channels in a frame
pub const CHANNELS: usize = 3;

/// Rows kept by the default crop (drops the dashboard strip)
pub const CROP_ROWS: Range<usize> = 0..84;

/// Columns kept by the default crop
pub const CROP_COLS: Range<usize> = 6..90;

/// An RGB frame in row-major `[height, width, channel]` layout
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    height: usize,
    width: usize,
    pixels: Vec<u8>,
}

impl Frame {
    /// Wrap raw pixels, checking the buffer matches the dimensions
    pub fn new(height: usize, width: usize, pixels: Vec<u8>) -> Result<Self> {
        if pixels.len() != height * width * CHANNELS {
            bail!(
                "frame buffer has {} bytes, expected {}x{}x{} = {}",
                pixels.len(),
                height,
                width,
                CHANNELS,
                height * width * CHANNELS
            );
        }
        Ok(Self { height, width, pixels })
    }

    /// A frame filled with a single colour
    pub fn filled(height: usize, width: usize, rgb: [u8; CHANNELS]) -> Self {
        let pixels = rgb.iter().copied().cycle().take(height * width * CHANNELS).collect();
        Self { height, width, pixels }
    }

    /// Frame height in pixels
    pub fn height(&self) -> usize {
        self.height
    }

    /// Frame width in pixels
    pub fn width(&self) -> usize {
        self.width
    }

    /// Raw interleaved RGB bytes
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Read one pixel
    pub fn pixel(&self, row: usize, col: usize) -> [u8; CHANNELS] {
        let i = (row * self.width + col) * CHANNELS;
        [self.pixels[i], self.pixels[i + 1], self.pixels[i + 2]]
    }

    /// Write one pixel
    pub fn set_pixel(&mut self, row: usize, col: usize, rgb: [u8; CHANNELS]) {
        let i = (row * self.width + col) * CHANNELS;
        self.pixels[i..i + CHANNELS].copy_from_slice(&rgb);
    }
}

/// A preprocessed observation in `[channel, height, width]` layout, values in
/// `[0, 1]`
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    height: usize,
    width: usize,
    data: Vec<f32>,
}

impl Observation {
    /// Wrap channel-first values of a `3 x height x width` observation
    pub fn from_data(height: usize, width: usize, data: Vec<f32>) -> Result<Self> {
        if data.len() != CHANNELS * height * width {
            bail!(
                "observation has {} values, expected {}x{}x{}",
                data.len(),
                CHANNELS,
                height,
                width
            );
        }
        Ok(Self { height, width, data })
    }

    /// Observation shape as `[channels, height, width]`
    pub fn shape(&self) -> [usize; 3] {
        [CHANNELS, self.height, self.width]
    }

    /// Flattened channel-first values
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Number of scalar values
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the observation holds no values
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Crop a frame, move channels to the front and scale to `[0, 1]`
///
/// Keeps `rows x cols` of the raw frame. Fails if the frame is smaller than
/// the crop window.
pub fn preprocess(frame: &Frame, rows: Range<usize>, cols: Range<usize>) -> Result<Observation> {
    if rows.end > frame.height || cols.end > frame.width || rows.is_empty() || cols.is_empty() {
        bail!(
            "crop rows {:?} cols {:?} does not fit a {}x{} frame",
            rows,
            cols,
            frame.height,
            frame.width
        );
    }

    let height = rows.len();
    let width = cols.len();
    let mut data = vec![0.0_f32; CHANNELS * height * width];

    for (r, row) in rows.clone().enumerate() {
        for (c, col) in cols.clone().enumerate() {
            let rgb = frame.pixel(row, col);
            for (ch, &value) in rgb.iter().enumerate() {
                data[(ch * height + r) * width + c] = value as f32 / 255.0;
            }
        }
    }

    Ok(Observation { height, width, data })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient_frame() -> Frame {
        let (h, w) = (96, 96);
        let mut pixels = Vec::with_capacity(h * w * CHANNELS);
        for row in 0..h {
            for col in 0..w {
                pixels.push(row as u8);
                pixels.push(col as u8);
                pixels.push(255);
            }
        }
        Frame::new(h, w, pixels).unwrap()
    }

    #[test]
    fn test_frame_size_check() {
        assert!(Frame::new(2, 2, vec![0; 12]).is_ok());
        assert!(Frame::new(2, 2, vec![0; 11]).is_err());
    }

    #[test]
    fn test_preprocess_shape_and_range() {
        let obs = preprocess(&gradient_frame(), CROP_ROWS, CROP_COLS).unwrap();

        assert_eq!(obs.shape(), [3, 84, 84]);
        assert_eq!(obs.len(), 3 * 84 * 84);
        assert!(obs.data().iter().all(|&v| (0.0..=1.0).contains(&v)));
    }

    #[test]
    fn test_preprocess_crop_offsets_and_channel_order() {
        let obs = preprocess(&gradient_frame(), CROP_ROWS, CROP_COLS).unwrap();
        let plane = 84 * 84;

        // Red encodes the source row, green the source column
        assert_eq!(obs.data()[0], 0.0);
        assert_eq!(obs.data()[plane], 6.0 / 255.0);
        assert_eq!(obs.data()[2 * plane], 1.0);

        // Last pixel of the crop is source (83, 89)
        assert_eq!(obs.data()[plane - 1], 83.0 / 255.0);
        assert_eq!(obs.data()[2 * plane - 1], 89.0 / 255.0);
    }

    #[test]
    fn test_preprocess_extremes() {
        let white = Frame::filled(96, 96, [255, 255, 255]);
        let obs = preprocess(&white, CROP_ROWS, CROP_COLS).unwrap();
        assert!(obs.data().iter().all(|&v| v == 1.0));

        let black = Frame::filled(96, 96, [0, 0, 0]);
        let obs = preprocess(&black, CROP_ROWS, CROP_COLS).unwrap();
        assert!(obs.data().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_preprocess_rejects_small_frame() {
        let small = Frame::filled(80, 96, [0, 0, 0]);
        assert!(preprocess(&small, CROP_ROWS, CROP_COLS).is_err());
    }
}
