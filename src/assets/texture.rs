use image::RgbaImage;
use std::path::Path;
use std::sync::{Arc, OnceLock};
use tracing::{debug, error};

/// Pixels with alpha at or above this value count as a hit
pub const ALPHA_THRESHOLD: u8 = 25;

#[derive(Debug, thiserror::Error)]
pub enum TextureError {
    #[error("Failed to load image: {0}")]
    LoadFailed(#[from] image::ImageError),
    #[error("Failed to read image file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Frame {frame:?} lies outside the {width}x{height} source image")]
    FrameOutOfBounds { frame: Frame, width: u32, height: u32 },
}

/// Region of the source image covered by a texture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HitOptions {
    pub mirror_horizontally: bool,
}

/// Decoded texture with a bit-packed opacity map for pixel-accurate hit tests.
/// Always sampled nearest-neighbour.
#[derive(Debug)]
pub struct HitTexture {
    source: Arc<RgbaImage>,
    frame: Frame,
    resolution: f64,
    hit_map: OnceLock<Vec<u32>>,
}

impl HitTexture {
    pub fn from_image(image: RgbaImage) -> Self {
        let frame = Frame { x: 0, y: 0, width: image.width(), height: image.height() };
        Self::new(Arc::new(image), frame)
    }

    /// Region of a larger sprite sheet
    pub fn from_sprite_sheet(sheet: Arc<RgbaImage>, frame: Frame) -> Result<Self, TextureError> {
        let fits_x = frame.x.checked_add(frame.width).is_some_and(|right| right <= sheet.width());
        let fits_y = frame.y.checked_add(frame.height).is_some_and(|bottom| bottom <= sheet.height());
        if !fits_x || !fits_y {
            return Err(TextureError::FrameOutOfBounds {
                frame,
                width: sheet.width(),
                height: sheet.height(),
            });
        }
        Ok(Self::new(sheet, frame))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TextureError> {
        let image = image::load_from_memory(bytes)?;
        Ok(Self::from_image(image.to_rgba8()))
    }

    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, TextureError> {
        let path = path.as_ref();
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                error!("Failed to load texture: {:?}, error: {}", path, e);
                return Err(e.into());
            }
        };
        let texture = tokio::task::spawn_blocking(move || Self::from_bytes(&bytes))
            .await
            .map_err(|e| TextureError::Io(std::io::Error::other(e)))??;
        debug!("Loaded texture: {:?}", path);
        Ok(texture)
    }

    fn new(source: Arc<RgbaImage>, frame: Frame) -> Self {
        Self {
            source,
            frame,
            resolution: 1.0,
            hit_map: OnceLock::new(),
        }
    }

    pub fn with_resolution(mut self, resolution: f64) -> Self {
        self.resolution = resolution;
        self
    }

    pub fn source(&self) -> &Arc<RgbaImage> {
        &self.source
    }

    pub fn frame(&self) -> Frame {
        self.frame
    }

    pub fn width(&self) -> u32 {
        self.frame.width
    }

    pub fn height(&self) -> u32 {
        self.frame.height
    }

    pub fn resolution(&self) -> f64 {
        self.resolution
    }

    pub fn hit_map(&self) -> &[u32] {
        self.hit_map.get_or_init(|| {
            build_hit_map(self.source.as_raw(), self.source.width(), self.source.height())
        })
    }

    /// Whether the point `(x, y)` lands on an opaque pixel when the texture is
    /// drawn with its top-left corner at `origin`.
    pub fn hits(&self, x: f64, y: f64, origin: Point, options: HitOptions) -> bool {
        let local_x = if options.mirror_horizontally {
            -(x - origin.x)
        } else {
            x - origin.x
        };
        let local_y = y - origin.y;

        let dx = round_half_up(self.frame.x as f64 + local_x * self.resolution);
        let dy = round_half_up(self.frame.y as f64 + local_y * self.resolution);

        let width = self.source.width() as f64;
        let height = self.source.height() as f64;
        if !dx.is_finite() || !dy.is_finite() || dx < 0.0 || dy < 0.0 || dx >= width || dy >= height {
            return false;
        }

        let index = dx as usize + dy as usize * self.source.width() as usize;
        self.hit_map()
            .get(index / 32)
            .is_some_and(|word| word & (1 << (index % 32)) != 0)
    }
}

fn round_half_up(value: f64) -> f64 {
    (value + 0.5).floor()
}

/// Pack one bit per pixel of a row-major RGBA buffer into 32-bit words.
pub fn build_hit_map(rgba: &[u8], width: u32, height: u32) -> Vec<u32> {
    let pixels = width as usize * height as usize;
    let mut hit_map = vec![0u32; pixels.div_ceil(32)];

    for (i, pixel) in rgba.chunks_exact(4).take(pixels).enumerate() {
        if pixel[3] >= ALPHA_THRESHOLD {
            hit_map[i / 32] |= 1 << (i % 32);
        }
    }

    hit_map
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn image_with(width: u32, height: u32, opaque: &[(u32, u32)]) -> RgbaImage {
        let mut image = RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 0]));
        for &(x, y) in opaque {
            image.put_pixel(x, y, Rgba([255, 255, 255, 255]));
        }
        image
    }

    #[test]
    fn test_hit_map_word_count_and_threshold() {
        let mut image = RgbaImage::from_pixel(5, 7, Rgba([0, 0, 0, 0]));
        image.put_pixel(0, 0, Rgba([0, 0, 0, ALPHA_THRESHOLD]));
        image.put_pixel(1, 0, Rgba([0, 0, 0, ALPHA_THRESHOLD - 1]));
        image.put_pixel(2, 6, Rgba([0, 0, 0, 255]));

        let hit_map = build_hit_map(image.as_raw(), 5, 7);

        assert_eq!(hit_map.len(), 2);
        assert_eq!(hit_map[0], 1);
        // pixel (2, 6) has index 32
        assert_eq!(hit_map[1], 1);
    }

    #[test]
    fn test_hits_opaque_and_transparent_pixels() {
        let texture = HitTexture::from_image(image_with(4, 4, &[(1, 2)]));
        let origin = Point::new(10.0, 20.0);

        assert!(texture.hits(11.0, 22.0, origin, HitOptions::default()));
        assert!(!texture.hits(12.0, 22.0, origin, HitOptions::default()));
        assert!(!texture.hits(0.0, 0.0, origin, HitOptions::default()));
        assert!(!texture.hits(100.0, 22.0, origin, HitOptions::default()));
    }

    #[test]
    fn test_non_finite_coordinates_never_hit() {
        let texture = HitTexture::from_image(image_with(4, 4, &[(0, 2)]));
        let origin = Point::default();

        assert!(texture.hits(0.0, 2.0, origin, HitOptions::default()));
        assert!(!texture.hits(f64::NAN, 2.0, origin, HitOptions::default()));
        assert!(!texture.hits(0.0, f64::NAN, origin, HitOptions::default()));
        assert!(!texture.hits(f64::NEG_INFINITY, 2.0, origin, HitOptions::default()));
        assert!(!texture.hits(0.0, 2.0, Point::new(f64::NAN, 0.0), HitOptions::default()));
    }

    #[test]
    fn test_hits_is_stable() {
        let texture = HitTexture::from_image(image_with(8, 8, &[(3, 3), (4, 5)]));
        let origin = Point::new(-2.0, 1.5);

        let first: Vec<bool> = (0..64)
            .map(|i| texture.hits((i % 8) as f64 - 2.0, (i / 8) as f64 + 1.5, origin, HitOptions::default()))
            .collect();
        let second: Vec<bool> = (0..64)
            .map(|i| texture.hits((i % 8) as f64 - 2.0, (i / 8) as f64 + 1.5, origin, HitOptions::default()))
            .collect();

        assert_eq!(first, second);
        assert_eq!(first.iter().filter(|hit| **hit).count(), 2);
    }

    #[test]
    fn test_mirrored_query_on_symmetric_image() {
        // Symmetric around the vertical axis: columns 1 and 4 of a 6 wide image.
        let texture = HitTexture::from_image(image_with(6, 2, &[(1, 0), (4, 0)]));
        let origin = Point::new(0.0, 0.0);
        let mirrored = HitOptions { mirror_horizontally: true };

        for column in 0..6 {
            let x = column as f64;
            // Mirroring maps screen x to -x, so reflect the query around the axis.
            let reflected = -(5.0 - x);
            assert_eq!(
                texture.hits(x, 0.0, origin, HitOptions::default()),
                texture.hits(reflected, 0.0, origin, mirrored),
                "column {column}"
            );
        }
    }

    #[test]
    fn test_mirrored_query_negates_local_x() {
        let texture = HitTexture::from_image(image_with(4, 1, &[(3, 0)]));
        let origin = Point::new(10.0, 0.0);
        let mirrored = HitOptions { mirror_horizontally: true };

        assert!(texture.hits(7.0, 0.0, origin, mirrored));
        assert!(!texture.hits(13.0, 0.0, origin, mirrored));
        assert!(texture.hits(13.0, 0.0, origin, HitOptions::default()));
    }

    #[test]
    fn test_resolution_scales_and_rounds() {
        let texture = HitTexture::from_image(image_with(4, 4, &[(2, 2)])).with_resolution(2.0);

        assert!(texture.hits(1.0, 1.0, Point::default(), HitOptions::default()));
        assert!(texture.hits(0.8, 1.2, Point::default(), HitOptions::default()));
        assert!(!texture.hits(0.5, 0.5, Point::default(), HitOptions::default()));
    }

    #[test]
    fn test_sprite_sheet_frame_offsets_into_atlas() {
        let sheet = Arc::new(image_with(8, 4, &[(5, 1)]));
        let frame = Frame { x: 4, y: 0, width: 4, height: 4 };
        let texture = HitTexture::from_sprite_sheet(sheet, frame).unwrap();

        assert_eq!(texture.width(), 4);
        assert!(texture.hits(1.0, 1.0, Point::default(), HitOptions::default()));
        assert!(!texture.hits(5.0, 1.0, Point::default(), HitOptions::default()));
    }

    #[test]
    fn test_sprite_sheet_rejects_frame_outside_sheet() {
        let sheet = Arc::new(image_with(8, 4, &[]));
        let frame = Frame { x: 6, y: 0, width: 4, height: 4 };

        assert!(matches!(
            HitTexture::from_sprite_sheet(sheet, frame),
            Err(TextureError::FrameOutOfBounds { .. })
        ));
    }

    #[test]
    fn test_from_bytes_decodes_png() {
        let mut png = Vec::new();
        image_with(3, 2, &[(2, 1)])
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();

        let texture = HitTexture::from_bytes(&png).unwrap();
        assert_eq!((texture.width(), texture.height()), (3, 2));
        assert!(texture.hits(2.0, 1.0, Point::default(), HitOptions::default()));

        assert!(HitTexture::from_bytes(b"not an image").is_err());
    }

    #[tokio::test]
    async fn test_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sprite.png");
        image_with(2, 2, &[(0, 0)]).save(&path).unwrap();

        let texture = HitTexture::from_path(&path).await.unwrap();
        assert!(texture.hits(0.0, 0.0, Point::default(), HitOptions::default()));
        assert!(HitTexture::from_path(dir.path().join("missing.png")).await.is_err());
    }
}
