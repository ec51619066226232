//! Image metadata and asset emission.

use std::{
    collections::HashMap,
    fmt, fs,
    io::Cursor,
    path::{Path, PathBuf},
    sync::{LazyLock, Mutex, PoisonError},
};

use base64::Engine;
use image::{ImageFormat, imageops::FilterType};
use regex::{Captures, Regex};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::debug;

/// Width of the blurred preview in pixels.
const BLUR_WIDTH: u32 = 8;

static TEMPLATE_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[(name|hash|ext)(?::(\d+))?\]").expect("valid template regex")
});

/// Asset processing errors.
#[derive(Debug, Error)]
pub enum AssetError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The bytes are not a supported image.
    #[error("invalid image: {0}")]
    Image(#[from] image::ImageError),

    /// The image has no pixels.
    #[error("image has zero width or height")]
    Empty,

    /// Remote images cannot be fetched.
    #[error("cannot fetch {0}: no remote fetcher configured")]
    NoFetcher(String),

    /// The source path has no file name.
    #[error("invalid asset path: {0}")]
    InvalidPath(PathBuf),
}

/// Result type for asset operations.
pub type Result<T> = std::result::Result<T, AssetError>;

/// Intrinsic image properties.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageMetadata {
    /// Lowercase format name, e.g. `png`.
    pub format: String,
    pub width: u32,
    pub height: u32,
    pub aspect_ratio: f64,

    /// Blurred thumbnail as a `data:` URL.
    pub blur_preview: String,
}

/// Image introspection and asset output.
pub trait AssetProcessor: Send + Sync + fmt::Debug {
    /// Read metadata from encoded image bytes.
    fn metadata(&self, bytes: &[u8]) -> Result<ImageMetadata>;

    /// Public URL `source` will have once emitted. Writes nothing.
    fn public_url(&self, source: &Path, template: &str) -> Result<String>;

    /// Copy `source` to the asset output using a naming template and return
    /// its public URL. Identical names are written once.
    fn emit(&self, source: &Path, template: &str) -> Result<String>;

    /// Download a remote image.
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        Err(AssetError::NoFetcher(url.to_string()))
    }
}

/// Asset processor backed by the `image` crate.
#[derive(Debug)]
pub struct ImageAssets {
    assets_dir: PathBuf,
    base: String,
    emitted: Mutex<HashMap<String, PathBuf>>,
}

impl ImageAssets {
    /// Create a processor writing into `assets_dir`, served under `base`.
    pub fn new(assets_dir: impl Into<PathBuf>, base: impl Into<String>) -> Self {
        Self {
            assets_dir: assets_dir.into(),
            base: base.into(),
            emitted: Mutex::new(HashMap::new()),
        }
    }

    /// Number of distinct files emitted so far.
    pub fn emitted_count(&self) -> usize {
        self.emitted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl AssetProcessor for ImageAssets {
    fn metadata(&self, bytes: &[u8]) -> Result<ImageMetadata> {
        let format = image::guess_format(bytes)?;
        let img = image::load_from_memory_with_format(bytes, format)?;
        let (width, height) = (img.width(), img.height());
        if width == 0 || height == 0 {
            return Err(AssetError::Empty);
        }

        let aspect_ratio = f64::from(width) / f64::from(height);
        let blur_height = ((f64::from(BLUR_WIDTH) / aspect_ratio).round() as u32).max(1);
        let preview = img
            .resize_exact(BLUR_WIDTH, blur_height, FilterType::Triangle)
            .blur(1.0);

        let mut png = Cursor::new(Vec::new());
        preview.write_to(&mut png, ImageFormat::Png)?;
        let encoded = base64::engine::general_purpose::STANDARD.encode(png.into_inner());

        Ok(ImageMetadata {
            format: format_name(format),
            width,
            height,
            aspect_ratio,
            blur_preview: format!("data:image/png;base64,{encoded}"),
        })
    }

    fn public_url(&self, source: &Path, template: &str) -> Result<String> {
        let bytes = fs::read(source)?;
        Ok(format!("{}{}", self.base, render_name(template, source, &bytes)?))
    }

    fn emit(&self, source: &Path, template: &str) -> Result<String> {
        let bytes = fs::read(source)?;
        let name = render_name(template, source, &bytes)?;
        let url = format!("{}{name}", self.base);

        let mut emitted = self.emitted.lock().unwrap_or_else(PoisonError::into_inner);
        if emitted.contains_key(&name) {
            return Ok(url);
        }

        let dest = self.assets_dir.join(&name);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&dest, &bytes)?;
        debug!(source = %source.display(), dest = %dest.display(), "emitted asset");
        emitted.insert(name, source.to_path_buf());

        Ok(url)
    }
}

fn format_name(format: ImageFormat) -> String {
    match format {
        ImageFormat::Png => "png".to_string(),
        ImageFormat::Jpeg => "jpeg".to_string(),
        ImageFormat::Gif => "gif".to_string(),
        ImageFormat::WebP => "webp".to_string(),
        other => format!("{other:?}").to_lowercase(),
    }
}

/// Render an output file name from `[name]`, `[hash]` and `[ext]` tokens,
/// each optionally truncated with `:N`.
pub fn render_name(template: &str, source: &Path, bytes: &[u8]) -> Result<String> {
    let stem = source
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| AssetError::InvalidPath(source.to_path_buf()))?;
    let ext = source.extension().and_then(|e| e.to_str()).unwrap_or("");
    let hash = format!("{:x}", Sha256::digest(bytes));

    let name = TEMPLATE_TOKEN.replace_all(template, |caps: &Captures<'_>| {
        let value = match &caps[1] {
            "name" => stem,
            "hash" => hash.as_str(),
            _ => ext,
        };
        match caps.get(2).and_then(|n| n.as_str().parse::<usize>().ok()) {
            Some(len) => value.chars().take(len).collect(),
            None => value.to_string(),
        }
    });
    Ok(name.into_owned())
}
