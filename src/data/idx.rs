//! IDX binary format (MNIST and derivatives).
//!
//! IDX3 image file:
//! ```text
//! bytes  0-1:   0x00 0x00   (reserved)
//! byte   2:     0x08        (dtype = uint8)
//! byte   3:     0x03        (number of dimensions)
//! bytes  4-15:  N, rows, cols (big-endian u32)
//! bytes 16..:   N * rows * cols pixels, row-major
//! ```
//! IDX1 label file: same header with 1 dimension (`N`), then N class bytes.

use std::fs;
use std::path::Path;

use crate::data::dataset::{Dataset, ImageShape};
use crate::error::{Error, Result};

const IMAGE_MAGIC: [u8; 4] = [0x00, 0x00, 0x08, 0x03];
const LABEL_MAGIC: [u8; 4] = [0x00, 0x00, 0x08, 0x01];

fn be_u32(bytes: &[u8], at: usize) -> usize {
    u32::from_be_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]) as usize
}

fn invalid(msg: String) -> Error {
    Error::InvalidInput(msg)
}

/// Parses an image/label IDX pair into a dataset with pixels scaled to [0, 1].
pub fn parse_idx_pair(image_bytes: &[u8], label_bytes: &[u8], num_classes: usize) -> Result<Dataset> {
    if image_bytes.len() < 16 {
        return Err(invalid(format!(
            "IDX image file too short: expected at least 16 header bytes, got {}",
            image_bytes.len()
        )));
    }
    if image_bytes[..4] != IMAGE_MAGIC {
        return Err(invalid(format!(
            "IDX image file: bad magic {:02X?}, expected {:02X?}",
            &image_bytes[..4], IMAGE_MAGIC
        )));
    }

    let n_items = be_u32(image_bytes, 4);
    let rows = be_u32(image_bytes, 8);
    let cols = be_u32(image_bytes, 12);

    let n_pixels = rows.checked_mul(cols)
        .ok_or_else(|| invalid(format!("IDX image file: {rows}x{cols} overflows")))?;
    let data_len = n_items.checked_mul(n_pixels)
        .ok_or_else(|| invalid(format!("IDX image file: {n_items} items of {n_pixels} pixels overflows")))?;
    if image_bytes.len() < 16 + data_len {
        return Err(invalid(format!(
            "IDX image file too short: header declares {n_items} items of {rows}x{cols} pixels \
             but file is only {} bytes",
            image_bytes.len()
        )));
    }

    if label_bytes.len() < 8 {
        return Err(invalid(format!(
            "IDX label file too short: expected at least 8 header bytes, got {}",
            label_bytes.len()
        )));
    }
    if label_bytes[..4] != LABEL_MAGIC {
        return Err(invalid(format!(
            "IDX label file: bad magic {:02X?}, expected {:02X?}",
            &label_bytes[..4], LABEL_MAGIC
        )));
    }
    let label_count = be_u32(label_bytes, 4);
    if label_count != n_items {
        return Err(invalid(format!(
            "IDX file mismatch: image file declares {n_items} items but label file declares {label_count}"
        )));
    }
    if label_bytes.len() < 8 + n_items {
        return Err(invalid(format!(
            "IDX label file too short: header declares {n_items} labels but file is only {} bytes",
            label_bytes.len()
        )));
    }

    let images = image_bytes[16..16 + data_len]
        .chunks_exact(n_pixels.max(1))
        .map(|chunk| chunk.iter().map(|&px| px as f64 / 255.0).collect())
        .collect();
    let labels = label_bytes[8..8 + n_items].iter().map(|&l| l as usize).collect();

    Dataset::new(ImageShape::new(rows, cols, 1), num_classes, images, labels)
}

/// Reads and parses an IDX image/label file pair from disk.
pub fn load_idx_pair(images: &Path, labels: &Path, num_classes: usize) -> Result<Dataset> {
    let image_bytes = fs::read(images)?;
    let label_bytes = fs::read(labels)?;
    let dataset = parse_idx_pair(&image_bytes, &label_bytes, num_classes)?;
    tracing::info!(
        images = %images.display(),
        examples = dataset.len(),
        shape = %dataset.shape(),
        "Loaded IDX dataset"
    );
    Ok(dataset)
}
