//! Captcha challenges for the login screen: a short random code rendered as a
//! deliberately noisy bitmap. The challenge text is a UI nuisance value, not
//! key material, so it comes from the thread RNG rather than the OS CSPRNG.

use std::io::Cursor;

use image::{ImageFormat, Rgb, RgbImage};
use rand::{thread_rng, Rng};
use thiserror::Error;

/// Number of characters in a challenge.
pub const CHALLENGE_LEN: usize = 5;
/// Characters a challenge can contain. Uppercase-only; verification is
/// case-insensitive so the user can type either case.
const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

const DEFAULT_WIDTH: u32 = 200;
const DEFAULT_HEIGHT: u32 = 80;
const GLYPH_SCALE: i32 = 4;

#[derive(Debug, Error)]
pub enum CaptchaError {
    #[error("png encoding failed: {0}")]
    Encode(String),
}

/// One generated challenge. Holds the expected answer; render as many images
/// of it as needed.
#[derive(Debug, Clone)]
pub struct CaptchaChallenge {
    text: String,
}

impl CaptchaChallenge {
    /// Draws a fresh random challenge.
    pub fn generate() -> Self {
        let mut rng = thread_rng();
        let text = (0..CHALLENGE_LEN)
            .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
            .collect();
        Self { text }
    }

    /// The expected answer, e.g. for server-side checks or CLI display.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Case-insensitive check of a user's answer. Surrounding whitespace is
    /// ignored; an empty answer never matches.
    pub fn verify(&self, input: &str) -> bool {
        let trimmed = input.trim();
        !trimmed.is_empty() && trimmed.eq_ignore_ascii_case(&self.text)
    }

    /// Renders the challenge as a 200x80 PNG.
    pub fn render_png(&self) -> Result<Vec<u8>, CaptchaError> {
        self.render_png_sized(DEFAULT_WIDTH, DEFAULT_HEIGHT)
    }

    /// Renders the challenge at an explicit canvas size: white background,
    /// pixel noise, strike-through lines, sheared glyphs, ellipse outlines
    /// over the text.
    pub fn render_png_sized(&self, width: u32, height: u32) -> Result<Vec<u8>, CaptchaError> {
        let mut rng = thread_rng();
        let mut canvas = RgbImage::from_pixel(width, height, Rgb([255, 255, 255]));

        for _ in 0..100 {
            let x = rng.gen_range(0..width);
            let y = rng.gen_range(0..height);
            canvas.put_pixel(x, y, Rgb([rng.gen(), rng.gen(), rng.gen()]));
        }

        for _ in 0..5 {
            let color = Rgb([rng.gen(), rng.gen(), rng.gen()]);
            draw_line(
                &mut canvas,
                rng.gen_range(0..width) as i32,
                rng.gen_range(0..height) as i32,
                rng.gen_range(0..width) as i32,
                rng.gen_range(0..height) as i32,
                color,
            );
        }

        let ink = Rgb([rng.gen_range(100..200), 0, 0]);
        for (i, ch) in self.text.chars().enumerate() {
            let x = 20 + i as i32 * 30;
            let y = 20 + rng.gen_range(-10..10);
            let shear = rng.gen_range(-3..=3);
            draw_glyph(&mut canvas, ch, x, y, shear, ink);
        }

        for _ in 0..20 {
            let color = Rgb([rng.gen(), rng.gen(), rng.gen()]);
            draw_ellipse(
                &mut canvas,
                rng.gen_range(0..width) as i32,
                rng.gen_range(0..height) as i32,
                rng.gen_range(1..10),
                rng.gen_range(1..10),
                color,
            );
        }

        let mut out = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(canvas)
            .write_to(&mut out, ImageFormat::Png)
            .map_err(|e| CaptchaError::Encode(format!("{e}")))?;
        Ok(out.into_inner())
    }
}

fn plot(canvas: &mut RgbImage, x: i32, y: i32, color: Rgb<u8>) {
    if x >= 0 && y >= 0 && (x as u32) < canvas.width() && (y as u32) < canvas.height() {
        canvas.put_pixel(x as u32, y as u32, color);
    }
}

/// Bresenham line, two pixels thick.
fn draw_line(canvas: &mut RgbImage, x0: i32, y0: i32, x1: i32, y1: i32, color: Rgb<u8>) {
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;
    let (mut x, mut y) = (x0, y0);
    loop {
        plot(canvas, x, y, color);
        plot(canvas, x, y + 1, color);
        if x == x1 && y == y1 {
            break;
        }
        let doubled = 2 * err;
        if doubled >= dy {
            err += dy;
            x += sx;
        }
        if doubled <= dx {
            err += dx;
            y += sy;
        }
    }
}

/// Parametric ellipse outline centered on (cx, cy).
fn draw_ellipse(canvas: &mut RgbImage, cx: i32, cy: i32, rx: i32, ry: i32, color: Rgb<u8>) {
    const STEPS: u32 = 64;
    for step in 0..STEPS {
        let angle = step as f32 / STEPS as f32 * std::f32::consts::TAU;
        let x = cx + (angle.cos() * rx as f32).round() as i32;
        let y = cy + (angle.sin() * ry as f32).round() as i32;
        plot(canvas, x, y, color);
    }
}

/// Stamps one character from the embedded 5x7 font, scaled up and sheared a
/// few pixels across its height so rows do not align between challenges.
fn draw_glyph(canvas: &mut RgbImage, ch: char, origin_x: i32, origin_y: i32, shear: i32, color: Rgb<u8>) {
    let rows = glyph_rows(ch);
    for (row, bits) in rows.iter().enumerate() {
        let row_shift = shear * row as i32 / rows.len() as i32;
        for col in 0..5i32 {
            if bits & (1u8 << (4 - col)) == 0 {
                continue;
            }
            for dy in 0..GLYPH_SCALE {
                for dx in 0..GLYPH_SCALE {
                    plot(
                        canvas,
                        origin_x + col * GLYPH_SCALE + row_shift + dx,
                        origin_y + row as i32 * GLYPH_SCALE + dy,
                        color,
                    );
                }
            }
        }
    }
}

/// 5x7 dot-matrix rows for the challenge alphabet, most significant bit on
/// the left. Characters outside the alphabet render as a solid block.
fn glyph_rows(ch: char) -> [u8; 7] {
    match ch {
        '0' => [0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110],
        '1' => [0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        '2' => [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111],
        '3' => [0b11111, 0b00010, 0b00100, 0b00010, 0b00001, 0b10001, 0b01110],
        '4' => [0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010],
        '5' => [0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110],
        '6' => [0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110],
        '7' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000],
        '8' => [0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110],
        '9' => [0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100],
        'A' => [0b01110, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'B' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10001, 0b10001, 0b11110],
        'C' => [0b01110, 0b10001, 0b10000, 0b10000, 0b10000, 0b10001, 0b01110],
        'D' => [0b11100, 0b10010, 0b10001, 0b10001, 0b10001, 0b10010, 0b11100],
        'E' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b11111],
        'F' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000],
        'G' => [0b01110, 0b10001, 0b10000, 0b10111, 0b10001, 0b10001, 0b01111],
        'H' => [0b10001, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'I' => [0b01110, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        'J' => [0b00111, 0b00010, 0b00010, 0b00010, 0b00010, 0b10010, 0b01100],
        'K' => [0b10001, 0b10010, 0b10100, 0b11000, 0b10100, 0b10010, 0b10001],
        'L' => [0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b11111],
        'M' => [0b10001, 0b11011, 0b10101, 0b10101, 0b10001, 0b10001, 0b10001],
        'N' => [0b10001, 0b10001, 0b11001, 0b10101, 0b10011, 0b10001, 0b10001],
        'O' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'P' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10000, 0b10000, 0b10000],
        'Q' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10101, 0b10010, 0b01101],
        'R' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10100, 0b10010, 0b10001],
        'S' => [0b01111, 0b10000, 0b10000, 0b01110, 0b00001, 0b00001, 0b11110],
        'T' => [0b11111, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100],
        'U' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'V' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01010, 0b00100],
        'W' => [0b10001, 0b10001, 0b10001, 0b10101, 0b10101, 0b10101, 0b01010],
        'X' => [0b10001, 0b10001, 0b01010, 0b00100, 0b01010, 0b10001, 0b10001],
        'Y' => [0b10001, 0b10001, 0b01010, 0b00100, 0b00100, 0b00100, 0b00100],
        'Z' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b10000, 0b11111],
        _ => [0b11111; 7],
    }
}
