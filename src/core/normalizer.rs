// src/core/normalizer.rs
//
// Input decoding and intensity normalization. Accepts raster bytes (PNG/JPEG
// and friends via the image crate) or DICOM pixel data, and produces the two
// canonical grayscale views every downstream analyzer works on.

use std::io::Cursor;

use anyhow::{bail, Context, Result};
use dicom_pixeldata::PixelDecoder;
use image::imageops::FilterType;
use image::GrayImage;
use log::debug;

use crate::detection::DetectionError;

/// Side of the square view fed to the classifier.
pub const CLASSIFY_SIZE: u32 = 224;

/// Side of the square view used for spatial analysis. Even by construction
/// so bilateral splitting never truncates a column.
pub const SPATIAL_SIZE: u32 = 512;

/// Immutable single-channel intensity raster. The unit of work for every
/// analyzer; created once per request and shared read-only.
#[derive(Debug, Clone)]
pub struct RasterImage {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl RasterImage {
    /// Build from raw row-major intensities. Panics if the buffer does not
    /// match the dimensions; callers construct from decoded images only.
    pub fn from_raw(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        assert_eq!(
            pixels.len(),
            (width as usize) * (height as usize),
            "pixel buffer does not match dimensions"
        );
        Self {
            width,
            height,
            pixels,
        }
    }

    pub fn from_gray(image: &GrayImage) -> Self {
        Self::from_raw(image.width(), image.height(), image.as_raw().clone())
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> u8 {
        self.pixels[y as usize * self.width as usize + x as usize]
    }

    pub fn row(&self, y: u32) -> &[u8] {
        let start = y as usize * self.width as usize;
        &self.pixels[start..start + self.width as usize]
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Mean intensity over the half-open rectangle [x0, x1) x [y0, y1).
    pub fn mean_region(&self, x0: u32, y0: u32, x1: u32, y1: u32) -> f32 {
        let (x1, y1) = (x1.min(self.width), y1.min(self.height));
        if x0 >= x1 || y0 >= y1 {
            return 0.0;
        }
        let mut sum = 0u64;
        for y in y0..y1 {
            for &p in &self.row(y)[x0 as usize..x1 as usize] {
                sum += p as u64;
            }
        }
        sum as f32 / ((x1 - x0) as f32 * (y1 - y0) as f32)
    }
}

/// The two derived views of one input image.
#[derive(Debug, Clone)]
pub struct NormalizedViews {
    /// Low-resolution view for the classifier.
    pub classify_view: RasterImage,
    /// Higher-resolution view for the spatial analyzers.
    pub spatial_view: RasterImage,
}

/// Caller-supplied guess at the input encoding, derived from filename or
/// content-type. Only reorders the decode attempts; every path is still
/// tried before giving up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatHint {
    Raster,
    Dicom,
    Unknown,
}

impl FormatHint {
    /// Derive a hint from a filename extension.
    pub fn from_filename(name: &str) -> Self {
        match name.rsplit('.').next().map(|e| e.to_ascii_lowercase()) {
            Some(ext) if matches!(ext.as_str(), "dcm" | "dicom") => FormatHint::Dicom,
            Some(ext) if matches!(ext.as_str(), "png" | "jpg" | "jpeg" | "bmp" | "tif" | "tiff") => {
                FormatHint::Raster
            }
            _ => FormatHint::Unknown,
        }
    }
}

/// Decode input bytes into the canonical view pair.
///
/// The decoders run as an ordered attempt chain: raster first unless the
/// hint says DICOM. Each attempt either yields a grayscale image or a
/// recorded failure reason; only when every attempt fails does the request
/// die with `UnsupportedImageFormat`.
pub fn decode_image(bytes: &[u8], hint: FormatHint) -> Result<NormalizedViews, DetectionError> {
    type Attempt = (&'static str, fn(&[u8]) -> Result<GrayImage>);
    let raster: Attempt = ("raster", decode_raster);
    let dicom: Attempt = ("dicom", decode_dicom);

    let chain = match hint {
        FormatHint::Dicom => [dicom, raster],
        FormatHint::Raster | FormatHint::Unknown => [raster, dicom],
    };

    let mut failures = Vec::with_capacity(chain.len());
    for (name, decode) in chain {
        match decode(bytes) {
            Ok(gray) => {
                debug!(
                    "decoded {} bytes via {} path ({}x{})",
                    bytes.len(),
                    name,
                    gray.width(),
                    gray.height()
                );
                return Ok(build_views(&gray));
            }
            Err(e) => failures.push(format!("{name}: {e:#}")),
        }
    }

    Err(DetectionError::UnsupportedImageFormat {
        attempted: failures.join("; "),
    })
}

fn build_views(gray: &GrayImage) -> NormalizedViews {
    let classify =
        image::imageops::resize(gray, CLASSIFY_SIZE, CLASSIFY_SIZE, FilterType::Triangle);
    let spatial = image::imageops::resize(gray, SPATIAL_SIZE, SPATIAL_SIZE, FilterType::Triangle);
    NormalizedViews {
        classify_view: RasterImage::from_gray(&classify),
        spatial_view: RasterImage::from_gray(&spatial),
    }
}

fn decode_raster(bytes: &[u8]) -> Result<GrayImage> {
    let img = image::load_from_memory(bytes).context("raster decode failed")?;
    Ok(img.to_luma8())
}

fn decode_dicom(bytes: &[u8]) -> Result<GrayImage> {
    // Standard part-10 files carry a 128-byte preamble before the DICM
    // magic; from_reader expects the stream to start at the magic.
    let payload = if bytes.len() > 132 && &bytes[128..132] == b"DICM" {
        &bytes[128..]
    } else {
        bytes
    };

    let obj = dicom_object::from_reader(Cursor::new(payload)).context("not a DICOM data set")?;
    let decoded = obj
        .decode_pixel_data()
        .context("failed to decode DICOM pixel data")?;

    let rows = decoded.rows() as usize;
    let cols = decoded.columns() as usize;
    let samples = decoded.samples_per_pixel() as usize;
    if rows == 0 || cols == 0 {
        bail!("DICOM pixel data has zero extent");
    }
    if samples == 0 {
        bail!("DICOM SamplesPerPixel is zero");
    }

    let values: Vec<f32> = decoded
        .to_vec()
        .context("failed to convert DICOM pixel data")?;
    if values.len() < rows * cols * samples {
        bail!(
            "DICOM pixel buffer too short: {} < {}",
            values.len(),
            rows * cols * samples
        );
    }

    // First frame, first sample of each pixel.
    let frame: Vec<f32> = values[..rows * cols * samples]
        .chunks_exact(samples)
        .map(|px| px[0])
        .collect();

    let pixels = rescale_to_u8(&frame);
    GrayImage::from_raw(cols as u32, rows as u32, pixels)
        .context("DICOM frame does not match its declared dimensions")
}

/// Clip negatives to zero and linearly rescale by the maximum into 0-255.
/// An all-zero (or all-negative) frame stays uniformly black.
fn rescale_to_u8(values: &[f32]) -> Vec<u8> {
    let max = values.iter().cloned().fold(0.0f32, f32::max);
    if max <= 0.0 {
        return vec![0; values.len()];
    }
    values
        .iter()
        .map(|&v| ((v.max(0.0) / max) * 255.0).round().clamp(0.0, 255.0) as u8)
        .collect()
}
