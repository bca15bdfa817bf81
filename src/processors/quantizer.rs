// imgpress/src/processors/quantizer.rs
//! Octree colour quantizer.
//!
//! Colours are inserted one bit-plane per level (RGB or RGBA, so up to 16
//! children per node). Whenever the leaf count exceeds the budget, the most
//! recently created internal node on the deepest populated level is folded
//! into a single leaf. This keeps the tree small enough to quantize large
//! photos in a single pass.

use super::BackendError;
use image::{DynamicImage, ImageBuffer, Pixel, Rgb, Rgba};

const MAX_DEPTH: usize = 8;
const NONE: u32 = u32::MAX;

#[derive(Debug, Clone, Copy)]
struct Node {
    sum: [u64; 4],
    pixels: u64,
    children: [u32; 16],
    is_leaf: bool,
    palette_index: u16,
}

impl Node {
    fn new(is_leaf: bool) -> Self {
        Self {
            sum: [0; 4],
            pixels: 0,
            children: [NONE; 16],
            is_leaf,
            palette_index: 0,
        }
    }
}

struct Octree {
    nodes: Vec<Node>,
    free: Vec<u32>,
    reducible: [Vec<u32>; MAX_DEPTH],
    leaves: usize,
    channels: usize,
}

impl Octree {
    fn new(channels: usize) -> Self {
        let mut tree = Self {
            nodes: Vec::new(),
            free: Vec::new(),
            reducible: Default::default(),
            leaves: 0,
            channels,
        };
        tree.alloc(0);
        tree
    }

    fn alloc(&mut self, level: usize) -> u32 {
        let node = Node::new(level == MAX_DEPTH);
        let idx = match self.free.pop() {
            Some(idx) => {
                self.nodes[idx as usize] = node;
                idx
            }
            None => {
                self.nodes.push(node);
                (self.nodes.len() - 1) as u32
            }
        };
        if level == MAX_DEPTH {
            self.leaves += 1;
        } else {
            self.reducible[level].push(idx);
        }
        idx
    }

    fn child_slot(&self, px: &[u8], level: usize) -> usize {
        let shift = 7 - level;
        let mut slot = 0;
        for (c, value) in px.iter().take(self.channels).enumerate() {
            slot |= (((*value >> shift) & 1) as usize) << c;
        }
        slot
    }

    fn insert(&mut self, px: &[u8]) {
        let mut idx = 0u32;
        let mut level = 0;
        while !self.nodes[idx as usize].is_leaf {
            let slot = self.child_slot(px, level);
            let next = self.nodes[idx as usize].children[slot];
            idx = if next == NONE {
                let child = self.alloc(level + 1);
                self.nodes[idx as usize].children[slot] = child;
                child
            } else {
                next
            };
            level += 1;
        }

        let node = &mut self.nodes[idx as usize];
        for (acc, value) in node.sum.iter_mut().zip(px.iter().take(self.channels)) {
            *acc += *value as u64;
        }
        node.pixels += 1;
    }

    /// Fold one internal node into a leaf. Returns false when nothing is left to fold.
    fn reduce(&mut self) -> bool {
        let Some(level) = (0..MAX_DEPTH).rev().find(|&l| !self.reducible[l].is_empty()) else {
            return false;
        };
        let Some(idx) = self.reducible[level].pop() else {
            return false;
        };

        let children = self.nodes[idx as usize].children;
        let mut merged = 0;
        for child in children.into_iter().filter(|&c| c != NONE) {
            let Node { sum, pixels, .. } = self.nodes[child as usize];
            let node = &mut self.nodes[idx as usize];
            for (acc, value) in node.sum.iter_mut().zip(sum) {
                *acc += value;
            }
            node.pixels += pixels;
            self.free.push(child);
            merged += 1;
        }

        let node = &mut self.nodes[idx as usize];
        node.children = [NONE; 16];
        node.is_leaf = true;
        self.leaves = (self.leaves + 1).saturating_sub(merged);
        true
    }

    /// Assign palette slots to every leaf and return the palette.
    fn build_palette(&mut self) -> Vec<[u8; 4]> {
        let mut palette = Vec::with_capacity(self.leaves);
        let mut stack = vec![0u32];
        while let Some(idx) = stack.pop() {
            let node = self.nodes[idx as usize];
            if node.is_leaf {
                if node.pixels == 0 {
                    continue;
                }
                let mut color = [255u8; 4];
                for (c, sum) in node.sum.iter().take(self.channels).enumerate() {
                    color[c] = ((sum + node.pixels / 2) / node.pixels) as u8;
                }
                self.nodes[idx as usize].palette_index = palette.len() as u16;
                palette.push(color);
            } else {
                stack.extend(node.children.iter().rev().filter(|&&c| c != NONE));
            }
        }
        palette
    }

    fn lookup(&self, px: &[u8], palette: &[[u8; 4]]) -> [u8; 4] {
        let mut idx = 0u32;
        let mut level = 0;
        while !self.nodes[idx as usize].is_leaf {
            let next = self.nodes[idx as usize].children[self.child_slot(px, level)];
            if next == NONE {
                return nearest(px, palette, self.channels);
            }
            idx = next;
            level += 1;
        }
        palette
            .get(self.nodes[idx as usize].palette_index as usize)
            .copied()
            .unwrap_or_else(|| nearest(px, palette, self.channels))
    }
}

fn nearest(px: &[u8], palette: &[[u8; 4]], channels: usize) -> [u8; 4] {
    palette
        .iter()
        .min_by_key(|color| {
            px.iter()
                .zip(color.iter())
                .take(channels)
                .map(|(a, b)| {
                    let d = *a as i32 - *b as i32;
                    (d * d) as u32
                })
                .sum::<u32>()
        })
        .copied()
        .unwrap_or([0, 0, 0, 255])
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Quantizer;

impl Quantizer {
    pub fn new() -> Self {
        Self
    }

    /// Reduce `image` to at most `colors` distinct colours (clamped to 2..=256).
    /// Images with an alpha channel come back as RGBA8, everything else as RGB8.
    pub fn quantize(&self, image: &DynamicImage, colors: u16) -> Result<DynamicImage, BackendError> {
        let budget = colors.clamp(2, 256) as usize;
        log::debug!(
            "Quantizing {}x{} image to {} colors",
            image.width(),
            image.height(),
            budget
        );

        if image.color().has_alpha() {
            Ok(DynamicImage::ImageRgba8(quantize_buffer::<Rgba<u8>>(
                image.to_rgba8(),
                budget,
            )))
        } else {
            Ok(DynamicImage::ImageRgb8(quantize_buffer::<Rgb<u8>>(
                image.to_rgb8(),
                budget,
            )))
        }
    }
}

fn quantize_buffer<P>(mut buffer: ImageBuffer<P, Vec<u8>>, budget: usize) -> ImageBuffer<P, Vec<u8>>
where
    P: Pixel<Subpixel = u8>,
{
    let channels = P::CHANNEL_COUNT as usize;
    let mut tree = Octree::new(channels);
    for pixel in buffer.pixels() {
        tree.insert(pixel.channels());
        while tree.leaves > budget && tree.reduce() {}
    }

    let palette = tree.build_palette();
    for pixel in buffer.pixels_mut() {
        let color = tree.lookup(pixel.channels(), &palette);
        pixel.channels_mut().copy_from_slice(&color[..channels]);
    }
    buffer
}
