use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};

/// Decoded RGBA8 pixels, rows in upload order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureData {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}
impl TextureData {
    /// 1x1 texture used in place of an image that failed to load.
    pub fn solid(rgba: [u8; 4]) -> Self {
        Self {
            width: 1,
            height: 1,
            pixels: rgba.to_vec(),
        }
    }

    pub fn mip_levels(&self) -> u32 {
        mip_level_count(self.width, self.height)
    }
}

/// Number of levels in a full mip chain down to 1x1.
pub fn mip_level_count(width: u32, height: u32) -> u32 {
    u32::BITS - width.max(height).max(1).leading_zeros()
}

/// Decodes a 2D texture, flipping it vertically so texture coordinates put
/// (0, 0) at the bottom-left of the image.
pub fn decode_2d(path: impl AsRef<Path>) -> Result<TextureData> {
    let path = path.as_ref();
    let image = image::open(path)
        .with_context(|| format!("Failed to decode texture {path:?}"))?
        .flipv()
        .to_rgba8();
    Ok(TextureData {
        width: image.width(),
        height: image.height(),
        pixels: image.into_raw(),
    })
}

/// Cubemap faces in Vulkan array-layer order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CubeFace {
    PositiveX,
    NegativeX,
    PositiveY,
    NegativeY,
    PositiveZ,
    NegativeZ,
}
impl CubeFace {
    pub const ALL: [CubeFace; 6] = [
        Self::PositiveX,
        Self::NegativeX,
        Self::PositiveY,
        Self::NegativeY,
        Self::PositiveZ,
        Self::NegativeZ,
    ];

    pub fn layer(self) -> u32 {
        self as u32
    }

    /// Conventional skybox file stem for this face.
    pub fn file_stem(self) -> &'static str {
        match self {
            Self::PositiveX => "right",
            Self::NegativeX => "left",
            Self::PositiveY => "top",
            Self::NegativeY => "bottom",
            Self::PositiveZ => "front",
            Self::NegativeZ => "back",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::PositiveX => "+X",
            Self::NegativeX => "-X",
            Self::PositiveY => "+Y",
            Self::NegativeY => "-Y",
            Self::PositiveZ => "+Z",
            Self::NegativeZ => "-Z",
        }
    }
}

/// The six image paths of a cubemap, indexed by [`CubeFace`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CubemapFaces {
    paths: [PathBuf; 6],
}
impl CubemapFaces {
    pub fn new(
        right: impl Into<PathBuf>,
        left: impl Into<PathBuf>,
        top: impl Into<PathBuf>,
        bottom: impl Into<PathBuf>,
        front: impl Into<PathBuf>,
        back: impl Into<PathBuf>,
    ) -> Self {
        Self {
            paths: [
                right.into(),
                left.into(),
                top.into(),
                bottom.into(),
                front.into(),
                back.into(),
            ],
        }
    }

    /// `dir/right.ext`, `dir/left.ext`, ... for the six faces.
    pub fn from_dir(dir: impl AsRef<Path>, extension: &str) -> Self {
        let dir = dir.as_ref();
        Self {
            paths: CubeFace::ALL
                .map(|face| dir.join(face.file_stem()).with_extension(extension)),
        }
    }

    pub fn path(&self, face: CubeFace) -> &Path {
        &self.paths[face.layer() as usize]
    }

    pub fn iter(&self) -> impl Iterator<Item = (CubeFace, &Path)> {
        CubeFace::ALL.into_iter().map(|face| (face, self.path(face)))
    }
}

/// Six square faces of equal size, in [`CubeFace::ALL`] order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CubemapData {
    pub size: u32,
    pub faces: Vec<TextureData>,
}
impl CubemapData {
    pub fn solid(rgba: [u8; 4]) -> Self {
        Self {
            size: 1,
            faces: vec![TextureData::solid(rgba); 6],
        }
    }

    /// All faces back to back, as one staging upload.
    pub fn layer_bytes(&self) -> Vec<u8> {
        self.faces
            .iter()
            .flat_map(|face| face.pixels.iter().copied())
            .collect()
    }
}

/// Decodes all six faces before anything touches the GPU.
///
/// Faces are not flipped: cubemap sampling expects rows top-first. The first
/// failing face aborts the load and is named in the error.
pub fn decode_cubemap(faces: &CubemapFaces) -> Result<CubemapData> {
    let mut size = None;
    let mut decoded = Vec::with_capacity(6);

    for (face, path) in faces.iter() {
        let image = image::open(path)
            .with_context(|| {
                format!("Failed to decode cubemap face {} from {path:?}", face.label())
            })?
            .to_rgba8();
        if image.width() != image.height() {
            bail!(
                "Cubemap face {} is {}x{}, faces must be square",
                face.label(),
                image.width(),
                image.height()
            );
        }
        match size {
            None => size = Some(image.width()),
            Some(expected) if expected != image.width() => bail!(
                "Cubemap face {} is {}px wide, expected {expected}px",
                face.label(),
                image.width()
            ),
            Some(_) => {}
        }
        decoded.push(TextureData {
            width: image.width(),
            height: image.height(),
            pixels: image.into_raw(),
        });
    }

    Ok(CubemapData {
        size: size.unwrap_or(1),
        faces: decoded,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage, Rgba, RgbaImage};

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "house-scene-texture-{name}-{}",
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    const RED: [u8; 4] = [255, 0, 0, 255];
    const BLUE: [u8; 4] = [0, 0, 255, 255];

    fn two_row_image(size: u32) -> RgbaImage {
        RgbaImage::from_fn(size, size, |_, y| if y == 0 { Rgba(RED) } else { Rgba(BLUE) })
    }

    fn write_faces(dir: &Path, size: u32) {
        for face in CubeFace::ALL {
            let shade = face.layer() as u8 * 40;
            RgbaImage::from_pixel(size, size, Rgba([shade, shade, shade, 255]))
                .save(dir.join(format!("{}.png", face.file_stem())))
                .unwrap();
        }
    }

    #[test]
    fn face_order_is_fixed() {
        assert_eq!(
            CubeFace::ALL.map(CubeFace::label),
            ["+X", "-X", "+Y", "-Y", "+Z", "-Z"]
        );
        assert_eq!(
            CubeFace::ALL.map(CubeFace::layer),
            [0, 1, 2, 3, 4, 5]
        );
    }

    #[test]
    fn faces_map_to_conventional_names() {
        let faces = CubemapFaces::new("r", "l", "t", "b", "f", "k");
        let order = faces
            .iter()
            .map(|(_, path)| path.to_str().unwrap())
            .collect::<Vec<_>>();
        assert_eq!(order, ["r", "l", "t", "b", "f", "k"]);

        assert_eq!(
            CubemapFaces::from_dir("sky", "png"),
            CubemapFaces::new(
                "sky/right.png",
                "sky/left.png",
                "sky/top.png",
                "sky/bottom.png",
                "sky/front.png",
                "sky/back.png",
            )
        );
    }

    #[test]
    fn swapped_faces_are_detected() {
        let expected = CubemapFaces::from_dir("sky", "png");
        let swapped = CubemapFaces::new(
            "sky/left.png",
            "sky/right.png",
            "sky/top.png",
            "sky/bottom.png",
            "sky/front.png",
            "sky/back.png",
        );
        assert_ne!(expected, swapped);
        assert_eq!(
            swapped.path(CubeFace::PositiveX),
            expected.path(CubeFace::NegativeX)
        );
    }

    #[test]
    fn mip_chain_reaches_one_pixel() {
        assert_eq!(mip_level_count(1, 1), 1);
        assert_eq!(mip_level_count(2, 2), 2);
        assert_eq!(mip_level_count(1024, 512), 11);
        assert_eq!(mip_level_count(1000, 3), 10);
        assert_eq!(mip_level_count(0, 0), 1);
    }

    #[test]
    fn decode_2d_flips_rows() {
        let dir = scratch_dir("flip");
        let path = dir.join("rows.png");
        two_row_image(2).save(&path).unwrap();

        let texture = decode_2d(&path).unwrap();
        assert_eq!((texture.width, texture.height), (2, 2));
        assert_eq!(&texture.pixels[0..4], &BLUE);
        assert_eq!(&texture.pixels[8..12], &RED);
    }

    #[test]
    fn decode_2d_expands_rgb_to_rgba() {
        let dir = scratch_dir("rgb");
        let path = dir.join("rgb.png");
        RgbImage::from_pixel(1, 1, Rgb([10, 20, 30])).save(&path).unwrap();

        let texture = decode_2d(&path).unwrap();
        assert_eq!(texture.pixels, vec![10, 20, 30, 255]);
    }

    #[test]
    fn decode_2d_reports_missing_file() {
        let err = decode_2d("/no/such/base.jpg").unwrap_err();
        assert!(format!("{err:#}").contains("base.jpg"));
    }

    #[test]
    fn cubemap_decodes_in_face_order_without_flip() {
        let dir = scratch_dir("cube");
        write_faces(&dir, 2);
        two_row_image(2).save(dir.join("top.png")).unwrap();

        let cubemap = decode_cubemap(&CubemapFaces::from_dir(&dir, "png")).unwrap();
        assert_eq!(cubemap.size, 2);
        assert_eq!(cubemap.faces.len(), 6);
        assert_eq!(cubemap.faces[1].pixels[0], 40);
        assert_eq!(cubemap.faces[5].pixels[0], 200);

        let top = &cubemap.faces[CubeFace::PositiveY.layer() as usize];
        assert_eq!(&top.pixels[0..4], &RED);
        assert_eq!(cubemap.layer_bytes().len(), 6 * 2 * 2 * 4);
    }

    #[test]
    fn cubemap_error_names_the_failing_face() {
        let dir = scratch_dir("cube-missing");
        write_faces(&dir, 2);
        std::fs::remove_file(dir.join("bottom.png")).unwrap();

        let err = decode_cubemap(&CubemapFaces::from_dir(&dir, "png")).unwrap_err();
        let message = format!("{err:#}");
        assert!(message.contains("-Y"), "{message}");
        assert!(message.contains("bottom.png"), "{message}");
    }

    #[test]
    fn cubemap_faces_must_match() {
        let dir = scratch_dir("cube-mismatch");
        write_faces(&dir, 2);
        RgbaImage::from_pixel(4, 4, Rgba(RED))
            .save(dir.join("front.png"))
            .unwrap();
        let err = decode_cubemap(&CubemapFaces::from_dir(&dir, "png")).unwrap_err();
        assert!(format!("{err}").contains("+Z"));

        write_faces(&dir, 2);
        RgbaImage::from_pixel(2, 3, Rgba(RED))
            .save(dir.join("left.png"))
            .unwrap();
        let err = decode_cubemap(&CubemapFaces::from_dir(&dir, "png")).unwrap_err();
        assert!(format!("{err}").contains("square"));
    }

    #[test]
    fn fallbacks_are_single_pixels() {
        let texture = TextureData::solid([128, 128, 128, 255]);
        assert_eq!(texture.mip_levels(), 1);
        let cubemap = CubemapData::solid([0, 0, 0, 255]);
        assert_eq!(cubemap.layer_bytes().len(), 24);
    }
}
