use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use flate2::read::GzDecoder;
use log::info;

use crate::error::{LenetError, Result};
use crate::lenet::{IMG_HEIGHT, IMG_WIDTH, INPUT_SHAPE};
use crate::tensor::Tensor;

const IMAGES_MAGIC: u32 = 0x0000_0803;
const LABELS_MAGIC: u32 = 0x0000_0801;

/// Open a file, transparently decompressing it when the name ends in `.gz`.
fn open(path: &Path) -> Result<Box<dyn Read>> {
    let file = BufReader::new(File::open(path)?);
    let gz = path.extension().is_some_and(|ext| ext == "gz");
    Ok(if gz { Box::new(GzDecoder::new(file)) } else { Box::new(file) })
}

fn read_u32_be<R: Read>(reader: &mut R) -> Result<u32> {
    let mut buf4 = [0u8; 4];
    reader.read_exact(&mut buf4)?;
    Ok(u32::from_be_bytes(buf4))
}

/// Read exactly the `len` payload bytes a header announced, without trusting
/// `len` for the allocation.
fn read_payload<R: Read>(reader: R, len: usize, what: &str) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    reader.take(len as u64).read_to_end(&mut buf)?;
    if buf.len() != len {
        return Err(LenetError::InvalidData(format!(
            "{what}: header declares {len} bytes, file holds {}",
            buf.len()
        )));
    }
    Ok(buf)
}

/// MNIST image dataset.
///
/// Reads the IDX3 image format and hands out individual 28x28 grayscale
/// images as `1 x 1 x 28 x 28` tensors normalized to [0, 1].
pub struct Mnist {
    pixels: Vec<u8>,
    len: usize,
}

impl Mnist {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mnist = Self::from_reader(open(path)?)?;
        info!("loaded {} MNIST images from {}", mnist.len, path.display());
        Ok(mnist)
    }

    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self> {
        let magic = read_u32_be(&mut reader)?;
        if magic != IMAGES_MAGIC {
            return Err(LenetError::InvalidData(format!(
                "expected MNIST image magic {IMAGES_MAGIC:#x}, got {magic:#x}"
            )));
        }
        let len = read_u32_be(&mut reader)? as usize;
        let rows = read_u32_be(&mut reader)? as usize;
        let cols = read_u32_be(&mut reader)? as usize;
        if rows != IMG_HEIGHT || cols != IMG_WIDTH {
            return Err(LenetError::InvalidData(format!(
                "expected {IMG_HEIGHT}x{IMG_WIDTH} images, got {rows}x{cols}"
            )));
        }

        let size = len
            .checked_mul(rows * cols)
            .ok_or_else(|| LenetError::InvalidData(format!("image count {len} is out of range")))?;
        let pixels = read_payload(reader, size, "MNIST images")?;
        Ok(Mnist { pixels, len })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn at(&self, idx: usize) -> Tensor {
        assert!(idx < self.len, "image index {idx} out of bounds ({} images)", self.len);
        let size = IMG_HEIGHT * IMG_WIDTH;
        let mut img = Tensor::zeros(INPUT_SHAPE);
        for (v, &p) in img.as_mut_slice().iter_mut().zip(&self.pixels[idx * size..(idx + 1) * size]) {
            *v = p as f32 / 255.0;
        }
        img
    }

    /// ASCII rendering of one image, `x` for any lit pixel.
    pub fn render(&self, idx: usize) -> String {
        let img = self.at(idx);
        let mut out = String::with_capacity((IMG_WIDTH + 1) * IMG_HEIGHT);
        for h in 0..IMG_HEIGHT {
            for w in 0..IMG_WIDTH {
                out.push(if img.get(0, 0, h, w) > 0.0 { 'x' } else { ' ' });
            }
            out.push('\n');
        }
        out
    }
}

/// MNIST label dataset (IDX1 format).
pub struct MnistLabels {
    labels: Vec<u8>,
}

impl MnistLabels {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let labels = Self::from_reader(open(path)?)?;
        info!("loaded {} MNIST labels from {}", labels.len(), path.display());
        Ok(labels)
    }

    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self> {
        let magic = read_u32_be(&mut reader)?;
        if magic != LABELS_MAGIC {
            return Err(LenetError::InvalidData(format!(
                "expected MNIST label magic {LABELS_MAGIC:#x}, got {magic:#x}"
            )));
        }
        let len = read_u32_be(&mut reader)? as usize;
        let labels = read_payload(reader, len, "MNIST labels")?;
        Ok(MnistLabels { labels })
    }

    pub fn at(&self, idx: usize) -> u8 {
        self.labels[idx]
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}
