use image::{DynamicImage, RgbImage, imageops::FilterType};

use crate::manifest::{ModelDefinition, PreprocessKind, TensorLayout, VGG_INPUT_SIZE};
use crate::model::Tensor;

/// Shift pixel intensities from [0, 255] into [-0.5, 0.5]. Linear over
/// the whole input range, so out-of-range values extrapolate rather than
/// clamp.
pub fn normalize(values: &[f32]) -> Vec<f32> {
    values.iter().map(|v| -0.5 + v / 255.0).collect()
}

/// RGB to full-range BT.601 YCbCr, rounded to 8 bit. The same matrix PIL
/// applies for its `YCbCr` mode.
pub fn rgb_to_ycbcr(r: u8, g: u8, b: u8) -> (u8, u8, u8) {
    let (r, g, b) = (r as f32, g as f32, b as f32);
    let y = 0.299 * r + 0.587 * g + 0.114 * b;
    let cb = 128.0 - 0.168_736 * r - 0.331_264 * g + 0.5 * b;
    let cr = 128.0 + 0.5 * r - 0.418_688 * g - 0.081_312 * b;
    (quantize(y), quantize(cb), quantize(cr))
}

fn quantize(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

/// Turns decoded camera frames into model input batches. The variant and
/// layout are fixed per process by the model definition.
pub struct Preprocessor {
    kind: PreprocessKind,
    layout: TensorLayout,
    channel_means: [f32; 3],
}

impl Preprocessor {
    pub fn from_definition(definition: &ModelDefinition) -> Self {
        Self {
            kind: definition.preprocess,
            layout: definition.input.layout,
            channel_means: definition.channel_means,
        }
    }

    pub fn run(&self, frame: &DynamicImage) -> Tensor {
        match self.kind {
            PreprocessKind::Vgg => self.run_vgg(frame),
            PreprocessKind::YcbcrNormalize => self.run_ycbcr(frame),
        }
    }

    /// Resize to the fixed vgg input, swap to BGR, remove the per-channel
    /// means. No further scaling.
    fn run_vgg(&self, frame: &DynamicImage) -> Tensor {
        let resized = frame
            .resize_exact(VGG_INPUT_SIZE, VGG_INPUT_SIZE, FilterType::Triangle)
            .to_rgb8();
        self.pack(&resized, |p| {
            [
                p[2] as f32 - self.channel_means[0],
                p[1] as f32 - self.channel_means[1],
                p[0] as f32 - self.channel_means[2],
            ]
        })
    }

    /// Convert to YCbCr at the frame's native size, then normalize. A size
    /// the model disagrees with surfaces later as an inference error.
    fn run_ycbcr(&self, frame: &DynamicImage) -> Tensor {
        let rgb = frame.to_rgb8();
        let mut tensor = self.pack(&rgb, |p| {
            let (y, cb, cr) = rgb_to_ycbcr(p[0], p[1], p[2]);
            [y as f32, cb as f32, cr as f32]
        });
        tensor.data = normalize(&tensor.data);
        tensor
    }

    fn pack(&self, image: &RgbImage, channels: impl Fn(&image::Rgb<u8>) -> [f32; 3]) -> Tensor {
        let (width, height) = (image.width() as usize, image.height() as usize);
        let mut data = vec![0.0; width * height * 3];
        match self.layout {
            TensorLayout::Nhwc => {
                for (x, y, pixel) in image.enumerate_pixels() {
                    let base = (y as usize * width + x as usize) * 3;
                    data[base..base + 3].copy_from_slice(&channels(pixel));
                }
            }
            TensorLayout::Nchw => {
                let plane = width * height;
                for (x, y, pixel) in image.enumerate_pixels() {
                    let idx = y as usize * width + x as usize;
                    let values = channels(pixel);
                    data[idx] = values[0];
                    data[plane + idx] = values[1];
                    data[2 * plane + idx] = values[2];
                }
            }
        }
        let shape = match self.layout {
            TensorLayout::Nhwc => [1, height, width, 3],
            TensorLayout::Nchw => [1, 3, height, width],
        };
        Tensor { shape, data }
    }
}

#[cfg(test)]
mod tests {
    use super::{Preprocessor, normalize, rgb_to_ycbcr};
    use crate::manifest::{
        InputSpec, ModelDefinition, PreprocessKind, TensorLayout, VGG_CHANNEL_MEANS,
    };
    use image::{DynamicImage, Rgb, RgbImage};

    fn definition(preprocess: PreprocessKind, layout: TensorLayout) -> ModelDefinition {
        ModelDefinition {
            name: "test".to_string(),
            preprocess,
            input: InputSpec {
                name: "frame".to_string(),
                width: 224,
                height: 224,
                layout,
            },
            channel_means: VGG_CHANNEL_MEANS,
        }
    }

    #[test]
    fn normalize_maps_the_endpoints() {
        let out = normalize(&[0.0, 127.5, 255.0]);
        assert_eq!(out, vec![-0.5, 0.0, 0.5]);
    }

    #[test]
    fn normalize_keeps_length_and_input() {
        let input = vec![10.0, 20.0, 30.0, 40.0];
        let out = normalize(&input);
        assert_eq!(out.len(), input.len());
        assert_eq!(input, vec![10.0, 20.0, 30.0, 40.0]);
    }

    #[test]
    fn normalize_extrapolates_out_of_range() {
        let out = normalize(&[-255.0, 510.0]);
        assert_eq!(out, vec![-1.5, 1.5]);
    }

    #[test]
    fn ycbcr_matches_known_colors() {
        assert_eq!(rgb_to_ycbcr(255, 255, 255), (255, 128, 128));
        assert_eq!(rgb_to_ycbcr(0, 0, 0), (0, 128, 128));
        assert_eq!(rgb_to_ycbcr(255, 0, 0), (76, 85, 255));
        assert_eq!(rgb_to_ycbcr(0, 255, 0), (150, 44, 21));
    }

    #[test]
    fn ycbcr_variant_keeps_the_native_frame_size() {
        let definition = definition(PreprocessKind::YcbcrNormalize, TensorLayout::Nhwc);
        let preprocessor = Preprocessor::from_definition(&definition);

        let frame = DynamicImage::ImageRgb8(RgbImage::new(8, 4));
        let tensor = preprocessor.run(&frame);
        assert_eq!(tensor.shape, [1, 4, 8, 3]);
        assert_eq!(tensor.data.len(), 4 * 8 * 3);
    }

    #[test]
    fn ycbcr_variant_normalizes_after_conversion() {
        let definition = definition(PreprocessKind::YcbcrNormalize, TensorLayout::Nhwc);
        let preprocessor = Preprocessor::from_definition(&definition);

        // A black frame converts to (0, 128, 128) per pixel.
        let frame = DynamicImage::ImageRgb8(RgbImage::new(1, 1));
        let tensor = preprocessor.run(&frame);
        assert_eq!(tensor.data[0], -0.5 + 0.0 / 255.0);
        assert_eq!(tensor.data[1], -0.5 + 128.0 / 255.0);
        assert_eq!(tensor.data[2], -0.5 + 128.0 / 255.0);
    }

    #[test]
    fn vgg_variant_resizes_and_removes_means_in_bgr_order() {
        let definition = definition(PreprocessKind::Vgg, TensorLayout::Nhwc);
        let preprocessor = Preprocessor::from_definition(&definition);

        let mut image = RgbImage::new(2, 2);
        for pixel in image.pixels_mut() {
            *pixel = Rgb([10, 20, 30]);
        }
        let tensor = preprocessor.run(&DynamicImage::ImageRgb8(image));

        assert_eq!(tensor.shape, [1, 224, 224, 3]);
        let expected = [
            30.0 - VGG_CHANNEL_MEANS[0],
            20.0 - VGG_CHANNEL_MEANS[1],
            10.0 - VGG_CHANNEL_MEANS[2],
        ];
        for (value, want) in tensor.data[0..3].iter().zip(expected) {
            assert!((value - want).abs() < 1e-3);
        }
    }

    #[test]
    fn nchw_layout_packs_by_plane() {
        let definition = definition(PreprocessKind::YcbcrNormalize, TensorLayout::Nchw);
        let preprocessor = Preprocessor::from_definition(&definition);

        let mut image = RgbImage::new(2, 1);
        image.put_pixel(0, 0, Rgb([255, 255, 255]));
        image.put_pixel(1, 0, Rgb([0, 0, 0]));
        let tensor = preprocessor.run(&DynamicImage::ImageRgb8(image));

        assert_eq!(tensor.shape, [1, 3, 1, 2]);
        // Y plane first: white then black, then the Cb and Cr planes.
        assert_eq!(tensor.data[0], 0.5);
        assert_eq!(tensor.data[1], -0.5);
        assert_eq!(tensor.data[2], -0.5 + 128.0 / 255.0);
        assert_eq!(tensor.data[3], -0.5 + 128.0 / 255.0);
    }
}
