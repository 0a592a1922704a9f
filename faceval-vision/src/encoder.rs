use std::path::Path;

use anyhow::{Context, Result};
use image::DynamicImage;
use ndarray::{Array1, Array4};
use ort::{session::Session, value::Value};

/// Face embedding produced by the recognition model
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding {
    pub vector: Array1<f32>,
}

impl Embedding {
    pub fn dim(&self) -> usize {
        self.vector.len()
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.vector.to_vec()
    }
}

/// Channel layout the model was trained with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelOrder {
    Rgb,
    Bgr,
}

#[derive(Debug, Clone)]
pub struct EncoderOptions {
    /// Side length of the square crop fed to the model
    pub input_size: u32,
    pub channel_order: ChannelOrder,
    /// L2-normalise the model output
    pub normalize: bool,
}

impl Default for EncoderOptions {
    // SFace: [1, 3, 112, 112], BGR, values in [0, 255]
    fn default() -> Self {
        Self {
            input_size: 112,
            channel_order: ChannelOrder::Bgr,
            normalize: true,
        }
    }
}

/// Recognition model wrapper: aligned face crop -> embedding
pub struct Encoder {
    pub session: Session,
    pub options: EncoderOptions,
}

impl Encoder {
    pub fn new(session: Session, options: EncoderOptions) -> Self {
        Self { session, options }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        Self::with_options(path, EncoderOptions::default())
    }

    pub fn with_options(path: &Path, options: EncoderOptions) -> Result<Self> {
        let session = crate::model::recog_session(path)?;
        Ok(Self::new(session, options))
    }

    /// Encode an already cropped face image
    pub fn encode(&mut self, face_img: &DynamicImage) -> Result<Embedding> {
        let size = self.options.input_size;
        let input_array = to_input_tensor(face_img, size, self.options.channel_order)?;
        let input_tensor = Value::from_array(input_array)?;

        let outputs = self.session.run(ort::inputs![input_tensor])?;
        let (shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .context("extracting embedding tensor")?;

        // Expecting shape [1, D]
        let embedding_size = if shape.len() == 2 {
            shape[1] as usize
        } else {
            data.len()
        };
        if embedding_size > data.len() {
            anyhow::bail!(
                "model output holds {} values, shape claims {}",
                data.len(),
                embedding_size
            );
        }
        let mut embedding_vec = data[0..embedding_size].to_vec();
        if self.options.normalize {
            embedding_vec = l2_normalize(embedding_vec);
        }

        Ok(Embedding {
            vector: Array1::from_vec(embedding_vec),
        })
    }
}

/// Resize `img` to `size`x`size` and lay it out as a [1, 3, H, W] tensor.
///
/// Values stay in [0, 255].
pub fn to_input_tensor(img: &DynamicImage, size: u32, order: ChannelOrder) -> Result<Array4<f32>> {
    let resized = img.resize_exact(size, size, image::imageops::FilterType::Triangle);
    let rgb = resized.to_rgb8();

    let pixel_count = (size * size) as usize;
    let mut input_data = vec![0.0f32; 3 * pixel_count];

    let (first, rest) = input_data.split_at_mut(pixel_count);
    let (second, third) = rest.split_at_mut(pixel_count);
    let (r_channel, g_channel, b_channel) = match order {
        ChannelOrder::Rgb => (first, second, third),
        ChannelOrder::Bgr => (third, second, first),
    };

    for (i, px) in rgb.as_raw().chunks_exact(3).enumerate() {
        r_channel[i] = px[0] as f32;
        g_channel[i] = px[1] as f32;
        b_channel[i] = px[2] as f32;
    }

    Ok(Array4::from_shape_vec(
        (1, 3, size as usize, size as usize),
        input_data,
    )?)
}

pub fn l2_normalize(v: Vec<f32>) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter().map(|x| x / norm).collect()
    } else {
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn solid(r: u8, g: u8, b: u8) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, Rgb([r, g, b])))
    }

    #[test]
    fn test_tensor_shape() {
        let t = to_input_tensor(&solid(1, 2, 3), 8, ChannelOrder::Rgb).unwrap();
        assert_eq!(t.shape(), &[1, 3, 8, 8]);
    }

    #[test]
    fn test_channel_order() {
        let img = solid(10, 20, 30);

        let rgb = to_input_tensor(&img, 4, ChannelOrder::Rgb).unwrap();
        assert_eq!(rgb[[0, 0, 0, 0]], 10.0);
        assert_eq!(rgb[[0, 1, 0, 0]], 20.0);
        assert_eq!(rgb[[0, 2, 3, 3]], 30.0);

        let bgr = to_input_tensor(&img, 4, ChannelOrder::Bgr).unwrap();
        assert_eq!(bgr[[0, 0, 0, 0]], 30.0);
        assert_eq!(bgr[[0, 1, 0, 0]], 20.0);
        assert_eq!(bgr[[0, 2, 3, 3]], 10.0);
    }

    #[test]
    fn test_l2_normalize() {
        let v = l2_normalize(vec![3.0, 4.0]);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);

        // zero vector passes through
        assert_eq!(l2_normalize(vec![0.0, 0.0]), vec![0.0, 0.0]);
    }
}
