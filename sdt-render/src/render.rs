use ab_glyph::{Font, FontVec, Glyph, PxScale, ScaleFont, point};
use anyhow::{Context, Result, anyhow};
use bytemuck::{cast_slice, cast_slice_mut};
use sdt_core::TextRole;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tiny_skia::{IntRect, Pixmap};

/// Mid-grey, opaque.
pub const BACKGROUND: [u8; 4] = [128, 128, 128, 255];
const FOREGROUND: [u8; 4] = [255, 255, 255, 255];

/// Text heights as a fraction of the window height.
const STIMULUS_HEIGHT: f32 = 0.1;
const INSTRUCTION_HEIGHT: f32 = 0.03;
/// Instruction lines wrap at this fraction of the window width.
const WRAP_WIDTH: f32 = 0.8;

/// Tried in order when no font path is configured.
pub const FONT_SEARCH_PATHS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

pub fn load_font(path: Option<&Path>) -> Result<FontVec> {
    if let Some(path) = path {
        return read_font(path);
    }
    FONT_SEARCH_PATHS
        .iter()
        .map(Path::new)
        .filter(|p| p.exists())
        .find_map(|p| read_font(p).ok())
        .ok_or_else(|| anyhow!("no usable font found, pass one with --font"))
}

fn read_font(path: &Path) -> Result<FontVec> {
    let bytes = fs::read(path).with_context(|| format!("reading font {}", path.display()))?;
    FontVec::try_from_vec(bytes).map_err(|e| anyhow!("{}: {e}", path.display()))
}

/// Horizontal advance of `text` at `font_size` pixels, kerning included.
pub fn text_width<F: Font>(font: &F, font_size: f32, text: &str) -> f32 {
    let sf = font.as_scaled(PxScale::from(font_size));
    let mut width = 0.0;
    let mut prev = None;
    for ch in text.chars() {
        let id = font.glyph_id(ch);
        if let Some(p) = prev {
            width += sf.kern(p, id);
        }
        width += sf.h_advance(id);
        prev = Some(id);
    }
    width
}

/// Breaks `text` into lines no wider than `max_width`, honouring explicit
/// newlines. A word wider than the limit gets a line of its own.
pub fn wrap_lines(text: &str, max_width: f32, measure: impl Fn(&str) -> f32) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            if current.is_empty() {
                current.push_str(word);
                continue;
            }
            let candidate = format!("{current} {word}");
            if measure(&candidate) <= max_width {
                current = candidate;
            } else {
                lines.push(std::mem::replace(&mut current, word.to_string()));
            }
        }
        lines.push(current);
    }
    lines
}

/// Rasterises one line of text into a premultiplied pixmap one line box
/// high, baseline at the font's ascent. `None` for blank text.
pub fn render_text_pixmap<F: Font>(
    text: &str,
    font_size: f32,
    font: &F,
    color: [u8; 4],
) -> Option<Pixmap> {
    if text.trim().is_empty() {
        return None;
    }
    let scale = PxScale::from(font_size);
    let sf = font.as_scaled(scale);

    let mut pen_x = 0.0f32;
    let mut glyphs = Vec::<Glyph>::new();
    for ch in text.chars() {
        let id = font.glyph_id(ch);
        if let Some(prev) = glyphs.last() {
            pen_x += sf.kern(prev.id, id);
        }
        glyphs.push(Glyph {
            id,
            scale,
            position: point(pen_x, sf.ascent()),
        });
        pen_x += sf.h_advance(id);
    }

    let w = pen_x.ceil().max(1.0) as u32;
    let h = sf.height().ceil().max(1.0) as u32;
    let mut pm = Pixmap::new(w, h)?;
    let stride = w as usize;
    let dst: &mut [[u8; 4]] = cast_slice_mut(pm.data_mut());

    for g in glyphs {
        let Some(out) = font.outline_glyph(g) else {
            continue;
        };
        let b = out.px_bounds();
        out.draw(|x, y, cov| {
            let ix = x as i32 + b.min.x.floor() as i32;
            let iy = y as i32 + b.min.y.floor() as i32;
            if cov <= f32::EPSILON || ix < 0 || iy < 0 || ix >= w as i32 || iy >= h as i32 {
                return;
            }
            let px = &mut dst[iy as usize * stride + ix as usize];
            let a = (cov * color[3] as f32 / 255.0).clamp(0.0, 1.0);
            let inv = 1.0 - a;
            for c in 0..3 {
                px[c] = (color[c] as f32 * a + px[c] as f32 * inv) as u8;
            }
            px[3] = (a * 255.0 + px[3] as f32 * inv) as u8;
        });
    }
    Some(pm)
}

/// Composites premultiplied `src` onto `dst` with its top-left corner at
/// `(x, y)`, clipped to `dst`. Returns the touched region.
pub fn blit_premultiplied(dst: &mut Pixmap, src: &Pixmap, x: i32, y: i32) -> Option<IntRect> {
    let (cw, ch) = (dst.width() as i32, dst.height() as i32);
    let (w, h) = (src.width() as i32, src.height() as i32);
    if x + w <= 0 || y + h <= 0 || x >= cw || y >= ch {
        return None;
    }

    let dst_x = x.max(0);
    let dst_y = y.max(0);
    let src_x = (-x).max(0);
    let src_y = (-y).max(0);
    let copy_w = (w - src_x).min(cw - dst_x) as usize;
    let copy_h = (h - src_y).min(ch - dst_y) as usize;

    let src_px: &[[u8; 4]] = cast_slice(src.data());
    let dst_px: &mut [[u8; 4]] = cast_slice_mut(dst.data_mut());
    for row in 0..copy_h {
        let s0 = (src_y as usize + row) * w as usize + src_x as usize;
        let d0 = (dst_y as usize + row) * cw as usize + dst_x as usize;
        for i in 0..copy_w {
            let s = src_px[s0 + i];
            match s[3] {
                0 => {}
                255 => dst_px[d0 + i] = s,
                sa => {
                    let inv = 255 - sa as u32;
                    let d = &mut dst_px[d0 + i];
                    for c in 0..4 {
                        d[c] = (s[c] as u32 + (d[c] as u32 * inv + 127) / 255) as u8;
                    }
                }
            }
        }
    }
    IntRect::from_xywh(dst_x, dst_y, copy_w as u32, copy_h as u32)
}

/// Full-window backbuffer, opaque at all times.
pub struct Canvas {
    pixmap: Pixmap,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> Result<Self> {
        let pixmap = Pixmap::new(width.max(1), height.max(1))
            .ok_or_else(|| anyhow!("cannot allocate a {width}x{height} canvas"))?;
        let mut canvas = Self { pixmap };
        canvas.clear();
        Ok(canvas)
    }

    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    pub fn clear(&mut self) {
        let px: &mut [[u8; 4]] = cast_slice_mut(self.pixmap.data_mut());
        px.fill(BACKGROUND);
    }

    pub fn pixels(&self) -> &[[u8; 4]] {
        cast_slice(self.pixmap.data())
    }

    pub fn pixmap_mut(&mut self) -> &mut Pixmap {
        &mut self.pixmap
    }

    /// Copies the canvas into an RGBA8 frame of the same size. Since every
    /// pixel is opaque, premultiplied and straight alpha coincide.
    pub fn copy_to(&self, frame: &mut [u8]) {
        let data = self.pixmap.data();
        let n = data.len().min(frame.len());
        frame[..n].copy_from_slice(&data[..n]);
    }
}

/// Draws centred white text on the grey background. Rasterised lines are
/// cached by text and pixel size, so repeated screens cost one blit per line.
pub struct TextRenderer<F: Font = FontVec> {
    font: F,
    canvas: Canvas,
    cache: HashMap<(String, u32), Arc<Pixmap>>,
}

impl<F: Font> TextRenderer<F> {
    pub fn new(font: F, width: u32, height: u32) -> Result<Self> {
        Ok(Self {
            font,
            canvas: Canvas::new(width, height)?,
            cache: HashMap::new(),
        })
    }

    /// Pixel sizes depend on the window height, so the cache is dropped.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        self.canvas = Canvas::new(width, height)?;
        self.cache.clear();
        Ok(())
    }

    pub fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    pub fn cached_lines(&self) -> usize {
        self.cache.len()
    }

    pub fn font_px(&self, role: TextRole) -> f32 {
        let fraction = match role {
            TextRole::Stimulus => STIMULUS_HEIGHT,
            TextRole::Instruction => INSTRUCTION_HEIGHT,
        };
        (self.canvas.height() as f32 * fraction).max(1.0)
    }

    pub fn clear(&mut self) {
        self.canvas.clear();
    }

    /// Replaces the canvas content with `text`. Stimuli are one centred line;
    /// instructions wrap and the block of lines is centred as a whole.
    pub fn draw(&mut self, text: &str, role: TextRole) {
        self.canvas.clear();
        let size = self.font_px(role);
        let lines = match role {
            TextRole::Stimulus => vec![text.to_string()],
            TextRole::Instruction => {
                let max = self.canvas.width() as f32 * WRAP_WIDTH;
                wrap_lines(text, max, |l| text_width(&self.font, size, l))
            }
        };

        let sf = self.font.as_scaled(PxScale::from(size));
        let line_height = sf.height() + sf.line_gap();
        let (cx, cy) = (
            self.canvas.width() as f32 / 2.0,
            self.canvas.height() as f32 / 2.0,
        );
        let top = cy - line_height * lines.len() as f32 / 2.0;

        for (i, line) in lines.iter().enumerate() {
            let Some(pm) = self.line_pixmap(line, size) else {
                continue;
            };
            let x = (cx - pm.width() as f32 / 2.0).floor() as i32;
            let y = (top + line_height * i as f32).floor() as i32;
            blit_premultiplied(self.canvas.pixmap_mut(), &pm, x, y);
        }
    }

    fn line_pixmap(&mut self, line: &str, size: f32) -> Option<Arc<Pixmap>> {
        let key = (line.to_string(), size.to_bits());
        if let Some(p) = self.cache.get(&key) {
            return Some(Arc::clone(p));
        }
        let pm = Arc::new(render_text_pixmap(line, size, &self.font, FOREGROUND)?);
        self.cache.insert(key, Arc::clone(&pm));
        Some(pm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn by_chars(s: &str) -> f32 {
        s.chars().count() as f32
    }

    #[test]
    fn wraps_at_word_boundaries() {
        let lines = wrap_lines("the quick brown fox", 9.0, by_chars);
        assert_eq!(lines, ["the quick", "brown fox"]);
    }

    #[test]
    fn explicit_newlines_are_kept() {
        let lines = wrap_lines("Press space\n\nto begin", 100.0, by_chars);
        assert_eq!(lines, ["Press space", "", "to begin"]);
    }

    #[test]
    fn overlong_word_gets_own_line() {
        let lines = wrap_lines("a extraordinarily b", 5.0, by_chars);
        assert_eq!(lines, ["a", "extraordinarily", "b"]);
    }

    #[test]
    fn canvas_starts_grey() {
        let canvas = Canvas::new(8, 4).unwrap();
        assert!(canvas.pixels().iter().all(|p| *p == BACKGROUND));
        let mut frame = vec![0u8; 8 * 4 * 4];
        canvas.copy_to(&mut frame);
        assert_eq!(&frame[..4], &BACKGROUND);
    }

    #[test]
    fn blit_is_clipped_to_destination() {
        let mut dst = Canvas::new(4, 4).unwrap();
        let mut src = Pixmap::new(4, 4).unwrap();
        let px: &mut [[u8; 4]] = cast_slice_mut(src.data_mut());
        px.fill([255, 0, 0, 255]);

        let rect = blit_premultiplied(dst.pixmap_mut(), &src, -2, -2).unwrap();
        assert_eq!((rect.x(), rect.y(), rect.width(), rect.height()), (0, 0, 2, 2));

        let pixels = dst.pixels();
        assert_eq!(pixels[0], [255, 0, 0, 255]);
        assert_eq!(pixels[5], [255, 0, 0, 255]);
        assert_eq!(pixels[2], BACKGROUND);
        assert_eq!(pixels[2 * 4], BACKGROUND);
    }

    #[test]
    fn blit_outside_is_a_no_op() {
        let mut dst = Canvas::new(4, 4).unwrap();
        let src = Pixmap::new(2, 2).unwrap();
        assert!(blit_premultiplied(dst.pixmap_mut(), &src, 10, 0).is_none());
    }

    #[test]
    fn half_transparent_source_blends() {
        let mut dst = Canvas::new(1, 1).unwrap();
        let mut src = Pixmap::new(1, 1).unwrap();
        let px: &mut [[u8; 4]] = cast_slice_mut(src.data_mut());
        px[0] = [128, 128, 128, 128];
        blit_premultiplied(dst.pixmap_mut(), &src, 0, 0);
        // 128 + 128 * 127 / 255
        assert_eq!(dst.pixels()[0], [192, 192, 192, 255]);
    }

    #[test]
    fn draws_with_a_system_font() {
        let Ok(font) = load_font(None) else {
            return;
        };
        let mut renderer = TextRenderer::new(font, 320, 200).unwrap();

        renderer.draw("", TextRole::Stimulus);
        assert!(renderer.canvas().pixels().iter().all(|p| *p == BACKGROUND));

        renderer.draw("HOUSE", TextRole::Stimulus);
        assert!(renderer.canvas().pixels().iter().any(|p| *p != BACKGROUND));
        assert_eq!(renderer.cached_lines(), 1);

        renderer.draw("HOUSE", TextRole::Stimulus);
        assert_eq!(renderer.cached_lines(), 1);

        renderer.resize(640, 400).unwrap();
        assert_eq!(renderer.cached_lines(), 0);
        assert!((renderer.font_px(TextRole::Stimulus) - 40.0).abs() < 1e-3);
    }
}
