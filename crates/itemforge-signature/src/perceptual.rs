use crate::source::SpriteSource;
use bytes::{Buf, BufMut, BytesMut};
use itemforge_client::{decompress_to_rgb, TRANSPARENT_COLOR};
use itemforge_types::{ClientItem, Sprite};
use rustfft::num_complex::Complex;
use rustfft::FftPlanner;
use thiserror::Error;

const TILE: usize = Sprite::DEFAULT_SIZE;
const CHANNELS: u32 = 3;

#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("signature header is malformed")]
    InvalidHeader,
    #[error("signature payload is truncated")]
    Truncated,
}

/// Frequency-block signature of an item's composed sprite canvas.
///
/// Each channel's vector is normalized to sum 1, so the signature depends
/// on the distribution of spectral energy rather than its absolute scale.
#[derive(Debug, Clone, PartialEq)]
pub struct SpriteSignature {
    pub r: Vec<f64>,
    pub g: Vec<f64>,
    pub b: Vec<f64>,
}

impl SpriteSignature {
    pub fn blocks(&self) -> u32 {
        self.r.len() as u32
    }

    /// Wire form: `channels:u32=3, blocks:u32`, then per block three
    /// little-endian f64 values (r, g, b).
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = BytesMut::new();
        buf.put_u32_le(CHANNELS);
        buf.put_u32_le(self.blocks());
        for i in 0..self.r.len() {
            buf.put_f64_le(self.r[i]);
            buf.put_f64_le(self.g[i]);
            buf.put_f64_le(self.b[i]);
        }
        buf.to_vec()
    }

    pub fn decode(data: &[u8]) -> Result<Self, SignatureError> {
        let mut buf = data;
        if buf.remaining() < 8 {
            return Err(SignatureError::InvalidHeader);
        }
        let channels = buf.get_u32_le();
        let blocks = buf.get_u32_le() as usize;
        if channels != CHANNELS {
            return Err(SignatureError::InvalidHeader);
        }
        if buf.remaining() < blocks * 3 * 8 {
            return Err(SignatureError::Truncated);
        }
        let mut signature = SpriteSignature {
            r: Vec::with_capacity(blocks),
            g: Vec::with_capacity(blocks),
            b: Vec::with_capacity(blocks),
        };
        for _ in 0..blocks {
            signature.r.push(buf.get_f64_le());
            signature.g.push(buf.get_f64_le());
            signature.b.push(buf.get_f64_le());
        }
        Ok(signature)
    }

    /// Euclidean distance summed over channels. Zero means identical;
    /// signatures of different shapes compare as maximally different.
    pub fn distance(&self, other: &SpriteSignature) -> f64 {
        if self.blocks() != other.blocks() {
            return 1.0;
        }
        let channel = |a: &[f64], b: &[f64]| {
            a.iter()
                .zip(b)
                .map(|(x, y)| (x - y) * (x - y))
                .sum::<f64>()
                .sqrt()
        };
        channel(&self.r, &other.r) + channel(&self.g, &other.g) + channel(&self.b, &other.b)
    }
}

/// Composes the item's sprites onto a canvas, transforms each color
/// channel into the frequency domain and folds the magnitudes into
/// per-block energies. Canonical block sizes are 1 and 4.
pub fn sprite_signature<S: SpriteSource>(
    item: &ClientItem,
    source: &S,
    block_size: usize,
) -> SpriteSignature {
    let (canvas, dim) = compose_canvas(item, source);
    debug_assert!(dim % block_size == 0);

    let mut channels = [
        vec![0.0f64; dim * dim],
        vec![0.0f64; dim * dim],
        vec![0.0f64; dim * dim],
    ];
    for pixel in 0..dim * dim {
        channels[0][pixel] = f64::from(canvas[pixel * 3]);
        channels[1][pixel] = f64::from(canvas[pixel * 3 + 1]);
        channels[2][pixel] = f64::from(canvas[pixel * 3 + 2]);
    }
    let magnitudes: Vec<Vec<f64>> = channels
        .iter()
        .map(|channel| fft_magnitudes(channel, dim))
        .collect();

    let per_side = dim / block_size;
    let mut signature = SpriteSignature {
        r: Vec::with_capacity(per_side * per_side),
        g: Vec::with_capacity(per_side * per_side),
        b: Vec::with_capacity(per_side * per_side),
    };
    for by in 0..per_side {
        for bx in 0..per_side {
            let mut sums = [0.0f64; 3];
            for y in 0..block_size {
                for x in 0..block_size {
                    let at = (by * block_size + y) * dim + bx * block_size + x;
                    for (c, sum) in sums.iter_mut().enumerate() {
                        *sum += magnitudes[c][at];
                    }
                }
            }
            signature.r.push(sums[0].sqrt());
            signature.g.push(sums[1].sqrt());
            signature.b.push(sums[2].sqrt());
        }
    }
    for channel in [&mut signature.r, &mut signature.g, &mut signature.b] {
        let total: f64 = channel.iter().sum();
        if total > 0.0 {
            for value in channel.iter_mut() {
                *value /= total;
            }
        }
    }
    signature
}

/// Paints the item's sprites onto a 32x32 canvas, or 64x64 for
/// multi-tile items, with the background color key everywhere else.
fn compose_canvas<S: SpriteSource>(item: &ClientItem, source: &S) -> (Vec<u8>, usize) {
    let dim = if item.width > 1 || item.height > 1 {
        TILE * 2
    } else {
        TILE
    };
    let mut canvas = vec![TRANSPARENT_COLOR; dim * dim * 3];

    let width = usize::from(item.width);
    let height = usize::from(item.height);
    for l in 0..usize::from(item.layers) {
        for h in 0..height {
            for w in 0..width {
                let index = w + h * width + l * width * height;
                let Some(&sprite_id) = item.sprite_ids.get(index) else {
                    continue;
                };
                let Some(sprite) = source.sprite(sprite_id) else {
                    continue;
                };
                if !sprite.is_valid() {
                    continue;
                }
                let Ok(rgb) = decompress_to_rgb(sprite) else {
                    continue;
                };
                let (origin_x, origin_y) = if dim == TILE {
                    (0, 0)
                } else {
                    (
                        TILE.saturating_sub(w * TILE),
                        TILE.saturating_sub(h * TILE),
                    )
                };
                for y in 0..TILE {
                    if origin_y + y >= dim {
                        break;
                    }
                    for x in 0..TILE {
                        if origin_x + x >= dim {
                            break;
                        }
                        let src = (y * TILE + x) * 3;
                        let dst = ((origin_y + y) * dim + origin_x + x) * 3;
                        canvas[dst..dst + 3].copy_from_slice(&rgb[src..src + 3]);
                    }
                }
            }
        }
    }
    (canvas, dim)
}

/// 2D forward FFT over one channel, rows then columns, returning the
/// magnitude map.
fn fft_magnitudes(channel: &[f64], dim: usize) -> Vec<f64> {
    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(dim);

    let mut grid: Vec<Complex<f64>> =
        channel.iter().map(|&v| Complex::new(v, 0.0)).collect();
    for row in grid.chunks_exact_mut(dim) {
        fft.process(row);
    }
    let mut column = vec![Complex::new(0.0, 0.0); dim];
    for x in 0..dim {
        for y in 0..dim {
            column[y] = grid[y * dim + x];
        }
        fft.process(&mut column);
        for y in 0..dim {
            grid[y * dim + x] = column[y];
        }
    }
    grid.into_iter().map(|c| c.norm()).collect()
}
