use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use fast_image_resize::{self as fir, images::Image as FirImage, ResizeAlg, ResizeOptions};
use image::codecs::jpeg::JpegEncoder;
use image::metadata::Orientation;
use image::{DynamicImage, ExtendedColorType, ImageFormat, ImageReader, RgbImage};

use crate::error::{Error, Result};

/// JPEG quality used when rewriting a compressed picture.
const JPEG_QUALITY: u8 = 100;

/// Result of [`compress`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressOutcome {
    /// The file was rewritten as JPEG with the given dimensions.
    Compressed { width: u32, height: u32 },
    /// An upright JPEG within bounds; the file was not touched.
    Unchanged { width: u32, height: u32 },
    /// No file at the path.
    Missing,
}

/// Downscale a picture in place so that neither side exceeds `max_dimension`.
///
/// Two passes keep memory bounded by the subsampled size rather than the
/// original resolution:
/// 1. read only the header to get the original dimensions,
/// 2. decode with a power-of-two subsample, then resize exactly to the
///    target with nearest-neighbour sampling.
///
/// The result is written back as a quality 100 JPEG with EXIF orientation
/// applied to the pixels. Pictures already within bounds are rewritten the
/// same way, unresized, unless they are JPEGs needing no rotation.
pub fn compress(path: &Path, max_dimension: u32) -> Result<CompressOutcome> {
    if !path.is_file() {
        log::warn!("Cannot compress {}: file not found", path.display());
        return Ok(CompressOutcome::Missing);
    }

    let reader = ImageReader::open(path)?.with_guessed_format()?;
    let is_jpeg_data = reader.format() == Some(ImageFormat::Jpeg);
    let (width, height) = reader.into_dimensions()?;
    let orientation = read_exif_orientation(path);

    let max_dimension = max_dimension.max(1);
    let (buf, w, h, subsample) = if width.max(height) <= max_dimension {
        if is_jpeg_data && orientation <= 1 {
            return Ok(CompressOutcome::Unchanged { width, height });
        }
        let (buf, w, h) = decode_subsampled(path, is_jpeg_data, 1)?;
        (buf, w, h, 1)
    } else {
        let subsample = power_of_two_floor(width.max(height) / max_dimension);
        let (target_w, target_h) = target_dimensions(width, height, max_dimension);
        let (buf, w, h) = decode_subsampled(path, is_jpeg_data, subsample)?;
        let buf = resize_nearest(buf, w, h, target_w, target_h)?;
        (buf, target_w as usize, target_h as usize, subsample)
    };

    let (buf, out_w, out_h) = apply_orientation_rgb(&buf, w, h, orientation);

    let writer = BufWriter::new(File::create(path)?);
    JpegEncoder::new_with_quality(writer, JPEG_QUALITY).encode(
        &buf,
        out_w as u32,
        out_h as u32,
        ExtendedColorType::Rgb8,
    )?;

    log::debug!(
        "Compressed {} from {width}x{height} to {out_w}x{out_h} (subsample 1/{subsample})",
        path.display()
    );
    Ok(CompressOutcome::Compressed {
        width: out_w as u32,
        height: out_h as u32,
    })
}

/// Longer side becomes `max_dimension`; the shorter side keeps the aspect ratio,
/// rounded down, and never drops below one pixel.
pub fn target_dimensions(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
    let scale = |short: u32, long: u32| -> u32 {
        ((short as u64 * max_dimension as u64) / long.max(1) as u64).max(1) as u32
    };
    if width >= height {
        (max_dimension, scale(height, width))
    } else {
        (scale(width, height), max_dimension)
    }
}

/// Largest power of two not exceeding `n` (1 for 0 and 1).
fn power_of_two_floor(n: u32) -> u32 {
    if n <= 1 {
        1
    } else {
        1 << (31 - n.leading_zeros())
    }
}

/// Decode to packed RGB, reduced by `subsample`. Returns (pixels, width, height).
fn decode_subsampled(path: &Path, jpeg: bool, subsample: u32) -> Result<(Vec<u8>, usize, usize)> {
    #[cfg(feature = "turbojpeg")]
    if jpeg {
        match decode_jpeg_scaled(path, subsample) {
            Ok(decoded) => return Ok(decoded),
            Err(e) => log::debug!("turbojpeg failed on {}: {e}, falling back", path.display()),
        }
    }
    #[cfg(not(feature = "turbojpeg"))]
    let _ = jpeg;

    let rgb = ImageReader::open(path)?
        .with_guessed_format()?
        .decode()?
        .to_rgb8();
    let (w, h) = (rgb.width() as usize, rgb.height() as usize);
    Ok(subsample_rgb(rgb.as_raw(), w, h, subsample as usize))
}

/// Decode a JPEG with libjpeg-turbo DCT scaling. Scaling stops at 1/8; any
/// remaining reduction is done by the exact resize.
#[cfg(feature = "turbojpeg")]
fn decode_jpeg_scaled(path: &Path, subsample: u32) -> Result<(Vec<u8>, usize, usize)> {
    use turbojpeg::ScalingFactor;

    let jpeg_data = std::fs::read(path)?;
    let mut decompressor = turbojpeg::Decompressor::new()?;
    let header = decompressor.read_header(&jpeg_data)?;

    let scaling = match subsample {
        0 | 1 => ScalingFactor::ONE,
        2 => ScalingFactor::ONE_HALF,
        4 => ScalingFactor::ONE_QUARTER,
        _ => ScalingFactor::ONE_EIGHTH,
    };
    decompressor.set_scaling_factor(scaling)?;
    let scaled = header.scaled(scaling);
    let (w, h) = (scaled.width, scaled.height);

    let mut buf = vec![0u8; w * h * 3];
    let output = turbojpeg::Image {
        pixels: buf.as_mut_slice(),
        width: w,
        pitch: w * 3,
        height: h,
        format: turbojpeg::PixelFormat::RGB,
    };
    decompressor.decompress(&jpeg_data, output)?;
    Ok((buf, w, h))
}

/// Keep every `step`-th pixel in both directions.
fn subsample_rgb(buf: &[u8], w: usize, h: usize, step: usize) -> (Vec<u8>, usize, usize) {
    if step <= 1 {
        return (buf.to_vec(), w, h);
    }
    let (new_w, new_h) = ((w / step).max(1), (h / step).max(1));
    let mut out = Vec::with_capacity(new_w * new_h * 3);
    for y in 0..new_h {
        let row = (y * step).min(h - 1) * w;
        for x in 0..new_w {
            let idx = (row + (x * step).min(w - 1)) * 3;
            out.extend_from_slice(&buf[idx..idx + 3]);
        }
    }
    (out, new_w, new_h)
}

fn resize_nearest(buf: Vec<u8>, w: usize, h: usize, target_w: u32, target_h: u32) -> Result<Vec<u8>> {
    if (w as u32, h as u32) == (target_w, target_h) {
        return Ok(buf);
    }
    let src = FirImage::from_vec_u8(w as u32, h as u32, buf, fir::PixelType::U8x3)
        .map_err(|e| Error::Resize(e.to_string()))?;
    let mut dst = FirImage::new(target_w, target_h, fir::PixelType::U8x3);
    let options = ResizeOptions::new().resize_alg(ResizeAlg::Nearest);
    fir::Resizer::new()
        .resize(&src, &mut dst, &options)
        .map_err(|e| Error::Resize(e.to_string()))?;
    Ok(dst.into_vec())
}

/// EXIF orientation (1-8) of the picture, 1 when absent or unreadable.
fn read_exif_orientation(path: &Path) -> u8 {
    File::open(path)
        .ok()
        .and_then(|file| {
            exif::Reader::new()
                .read_from_container(&mut BufReader::new(file))
                .ok()
        })
        .and_then(|data| {
            data.get_field(exif::Tag::Orientation, exif::In::PRIMARY)
                .and_then(|field| field.value.get_uint(0))
        })
        .and_then(|value| u8::try_from(value).ok())
        .unwrap_or(1)
}

/// Rotate or flip packed RGB pixels upright for the given EXIF orientation.
/// Orientations 5-8 swap width and height.
fn apply_orientation_rgb(buf: &[u8], w: usize, h: usize, orientation: u8) -> (Vec<u8>, usize, usize) {
    let upright = Orientation::from_exif(orientation)
        .filter(|o| *o != Orientation::NoTransforms)
        .and_then(|o| {
            let img = RgbImage::from_raw(w as u32, h as u32, buf.to_vec())?;
            let mut img = DynamicImage::ImageRgb8(img);
            img.apply_orientation(o);
            Some(img.into_rgb8())
        });
    match upright {
        Some(img) => {
            let (new_w, new_h) = (img.width() as usize, img.height() as usize);
            (img.into_raw(), new_w, new_h)
        }
        None => (buf.to_vec(), w, h),
    }
}
