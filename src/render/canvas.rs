/// A square-or-rectangular RGBA8 pixel buffer with alpha-over drawing
/// primitives.
///
/// Pixels are straight (non-premultiplied) RGBA, row-major, starting at the
/// top-left corner. The buffer starts fully transparent.
#[derive(Debug, Clone, PartialEq)]
pub struct RgbaCanvas {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl RgbaCanvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width as usize * height as usize * 4],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn into_pixels(self) -> Vec<u8> {
        self.pixels
    }

    /// The RGBA value at `(x, y)`, or `None` outside the canvas
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = self.index(x, y);
        let mut out = [0u8; 4];
        out.copy_from_slice(&self.pixels[idx..idx + 4]);
        Some(out)
    }

    fn index(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * 4
    }

    /// Composite `rgba` over the pixel at `(x, y)`.
    ///
    /// `out_a = src_a + dst_a * (1 - src_a)` and each color channel is the
    /// alpha-weighted mix normalized by `out_a`.
    pub fn blend(&mut self, x: u32, y: u32, rgba: [u8; 4]) {
        if x >= self.width || y >= self.height {
            return;
        }
        let src_a = rgba[3] as f64 / 255.0;
        if src_a <= 0.0 {
            return;
        }
        let idx = self.index(x, y);
        let dst = &mut self.pixels[idx..idx + 4];
        let dst_a = dst[3] as f64 / 255.0;
        let out_a = src_a + dst_a * (1.0 - src_a);
        if out_a <= 0.0 {
            return;
        }

        for channel in 0..3 {
            let mixed =
                (rgba[channel] as f64 * src_a + dst[channel] as f64 * dst_a * (1.0 - src_a)) / out_a;
            dst[channel] = mixed.round().clamp(0.0, 255.0) as u8;
        }
        dst[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
    }

    /// Stamp a filled disc centered on a fractional pixel position
    pub fn draw_disc(&mut self, cx: f64, cy: f64, radius: f64, rgba: [u8; 4]) {
        if self.width == 0 || self.height == 0 {
            return;
        }
        let max_x = (self.width - 1) as f64;
        let max_y = (self.height - 1) as f64;
        let min_x = (cx - radius).floor().max(0.0);
        let max_x = (cx + radius).ceil().min(max_x);
        let min_y = (cy - radius).floor().max(0.0);
        let max_y = (cy + radius).ceil().min(max_y);
        if min_x > max_x || min_y > max_y {
            return;
        }
        let radius_sq = radius * radius;

        for y in min_y as u32..=max_y as u32 {
            for x in min_x as u32..=max_x as u32 {
                let dx = x as f64 - cx;
                let dy = y as f64 - cy;
                if dx * dx + dy * dy <= radius_sq {
                    self.blend(x, y, rgba);
                }
            }
        }
    }

    /// Stroke a thick segment by stamping a disc at every pixel step.
    ///
    /// Radius is `stroke / 2` with a floor of half a pixel.
    pub fn draw_segment(&mut self, from: (f64, f64), to: (f64, f64), stroke: f64, rgba: [u8; 4]) {
        let radius = (stroke / 2.0).max(0.5);
        let dx = to.0 - from.0;
        let dy = to.1 - from.1;
        let steps = dx.abs().max(dy.abs());
        if steps <= 0.0 {
            self.draw_disc(from.0, from.1, radius, rgba);
            return;
        }

        let step_x = dx / steps;
        let step_y = dy / steps;
        let count = steps.floor() as u64;
        for i in 0..=count {
            let t = i as f64;
            self.draw_disc(from.0 + step_x * t, from.1 + step_y * t, radius, rgba);
        }
    }

    /// Scanline polygon fill. Each row samples at its center (`y + 0.5`),
    /// collects edge crossings, sorts them and fills between pairs.
    pub fn fill_polygon(&mut self, points: &[(f64, f64)], rgba: [u8; 4]) {
        if points.len() < 3 || self.width == 0 || self.height == 0 {
            return;
        }
        let (min_y, max_y) = points
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
                (lo.min(p.1), hi.max(p.1))
            });
        let min_y = min_y.floor().max(0.0);
        let max_y = max_y.ceil().min((self.height - 1) as f64);
        if max_y < min_y {
            return;
        }

        let last_x = (self.width - 1) as f64;
        let mut crossings: Vec<f64> = Vec::with_capacity(8);
        for y in min_y as u32..=max_y as u32 {
            let scan_y = y as f64 + 0.5;
            crossings.clear();

            for (i, p1) in points.iter().enumerate() {
                let p2 = points[(i + 1) % points.len()];
                let (y1, y2) = (p1.1, p2.1);
                if (y1 <= scan_y && y2 > scan_y) || (y2 <= scan_y && y1 > scan_y) {
                    let t = (scan_y - y1) / (y2 - y1);
                    crossings.push(p1.0 + t * (p2.0 - p1.0));
                }
            }

            crossings.sort_by(|a, b| a.total_cmp(b));
            for pair in crossings.chunks_exact(2) {
                let from_x = pair[0].floor().max(0.0);
                let to_x = pair[1].ceil().min(last_x);
                if to_x < from_x {
                    continue;
                }
                for x in from_x as u32..=to_x as u32 {
                    self.blend(x, y, rgba);
                }
            }
        }
    }
}
