//! Shared fixtures for the integration tests
#![allow(dead_code)]

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use image::{ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use tempfile::TempDir;

use pdf_toolbox_server::job::JobCoordinator;
use pdf_toolbox_server::rasterizer::Rasterizer;
use pdf_toolbox_server::scratch::ScratchRoot;
use pdf_toolbox_server::storage::{BlobStore, LocalBlobStore, SignedUrl, StorageError};
use pdf_toolbox_server::transform::TransformEngine;

pub const SIGNING_SECRET: &str = "test-signing-secret";
pub const PUBLIC_BASE_URL: &str = "http://localhost:8080";

// ============================================================================
// Documents
// ============================================================================

/// A PDF whose page N draws the text "`label` page N".
///
/// Resources and MediaBox sit on the page tree node, so every page inherits
/// them.
pub fn pdf_with_pages(label: &str, pages: u32) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for number in 1..=pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), Object::Integer(24)]),
                Operation::new("Td", vec![Object::Integer(72), Object::Integer(720)]),
                Operation::new(
                    "Tj",
                    vec![Object::string_literal(format!("{} page {}", label, number))],
                ),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => i64::from(pages),
            "Resources" => resources_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(595),
                Object::Integer(842),
            ],
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

/// The marker text drawn on each page, in page order
pub fn page_markers(bytes: &[u8]) -> Vec<String> {
    let doc = Document::load_mem(bytes).unwrap();
    doc.get_pages()
        .values()
        .map(|&page_id| {
            let content = doc.get_page_content(page_id).unwrap();
            let text = String::from_utf8_lossy(&content);
            let start = text.find('(').map(|i| i + 1).unwrap_or(0);
            let end = text[start..].find(')').map(|i| start + i).unwrap_or(text.len());
            text[start..end].to_string()
        })
        .collect()
}

/// Whether every page holds its own MediaBox and Resources
pub fn pages_carry_own_attributes(bytes: &[u8]) -> bool {
    let doc = Document::load_mem(bytes).unwrap();
    doc.get_pages().values().all(|&page_id| {
        let page = doc.get_dictionary(page_id).unwrap();
        page.has(b"MediaBox") && page.has(b"Resources")
    })
}

/// Width and height of every page's MediaBox, in points
pub fn page_sizes(bytes: &[u8]) -> Vec<(f32, f32)> {
    let doc = Document::load_mem(bytes).unwrap();
    doc.get_pages()
        .values()
        .map(|&page_id| {
            let page = doc.get_dictionary(page_id).unwrap();
            let media_box = page.get(b"MediaBox").unwrap().as_array().unwrap();
            let values: Vec<f32> = media_box.iter().map(|v| v.as_float().unwrap()).collect();
            (values[2] - values[0], values[3] - values[1])
        })
        .collect()
}

pub fn page_count(bytes: &[u8]) -> usize {
    Document::load_mem(bytes).unwrap().get_pages().len()
}

// ============================================================================
// Images
// ============================================================================

pub fn png_with_alpha(width: u32, height: u32) -> Vec<u8> {
    let image = RgbaImage::from_fn(width, height, |x, _| {
        if x % 2 == 0 {
            Rgba([200, 30, 30, 255])
        } else {
            Rgba([0, 0, 0, 0])
        }
    });
    let mut bytes = Cursor::new(Vec::new());
    image.write_to(&mut bytes, ImageFormat::Png).unwrap();
    bytes.into_inner()
}

pub fn jpeg(width: u32, height: u32) -> Vec<u8> {
    let image = RgbImage::from_pixel(width, height, Rgb([20, 120, 220]));
    let mut bytes = Cursor::new(Vec::new());
    image.write_to(&mut bytes, ImageFormat::Jpeg).unwrap();
    bytes.into_inner()
}

pub fn bmp(width: u32, height: u32) -> Vec<u8> {
    let image = RgbImage::from_pixel(width, height, Rgb([90, 90, 90]));
    let mut bytes = Cursor::new(Vec::new());
    image.write_to(&mut bytes, ImageFormat::Bmp).unwrap();
    bytes.into_inner()
}

// ============================================================================
// Rasterizer stand-ins
// ============================================================================

/// Copies the input to the `-sOutputFile=` path, like a no-op Ghostscript
pub const COPY_SCRIPT: &str = r#"for a; do case "$a" in -sOutputFile=*) out="${a#-sOutputFile=}";; esac; last="$a"; done; cp "$last" "$out""#;

pub const FAILING_SCRIPT: &str = "echo 'Error: /syntaxerror in /private/path' >&2; exit 1";

pub const HANGING_SCRIPT: &str = "sleep 30";

/// `sh -c <script> fake-gs <ghostscript arguments...>`
pub fn fake_rasterizer(script: &str, timeout: Duration) -> Rasterizer {
    Rasterizer::new("sh", timeout).with_prefix_args(fake_prefix_args(script))
}

pub fn fake_prefix_args(script: &str) -> Vec<String> {
    vec!["-c".to_string(), script.to_string(), "fake-gs".to_string()]
}

// ============================================================================
// Storage
// ============================================================================

/// Wraps a local store, failing uploads under one key prefix and recording
/// every delete
pub struct FlakyStore {
    inner: LocalBlobStore,
    fail_puts_under: Option<String>,
    pub deleted: Mutex<Vec<String>>,
}

impl FlakyStore {
    pub fn new(root: &Path, fail_puts_under: Option<&str>) -> Self {
        Self {
            inner: LocalBlobStore::new(root, PUBLIC_BASE_URL, SIGNING_SECRET),
            fail_puts_under: fail_puts_under.map(str::to_string),
            deleted: Mutex::new(Vec::new()),
        }
    }

    fn check(&self, key: &str) -> Result<(), StorageError> {
        match &self.fail_puts_under {
            Some(prefix) if key.starts_with(prefix.as_str()) => Err(StorageError::Write {
                key: key.to_string(),
                detail: "connection reset by peer".to_string(),
            }),
            _ => Ok(()),
        }
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl BlobStore for FlakyStore {
    fn backend(&self) -> &'static str {
        "flaky"
    }

    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<(), StorageError> {
        self.check(key)?;
        self.inner.put(key, data, content_type).await
    }

    async fn put_file(&self, key: &str, path: &Path, content_type: &str) -> Result<(), StorageError> {
        self.check(key)?;
        self.inner.put_file(key, path, content_type).await
    }

    async fn fetch_to_local(&self, key: &str, path: &Path) -> Result<(), StorageError> {
        self.inner.fetch_to_local(key, path).await
    }

    async fn signed_url(&self, key: &str, ttl: Duration) -> Result<SignedUrl, StorageError> {
        self.inner.signed_url(key, ttl).await
    }

    async fn delete(&self, key: &str) {
        self.deleted.lock().unwrap().push(key.to_string());
        self.inner.delete(key).await;
    }
}

/// Every key currently stored under `root`
pub fn stored_keys(root: &Path) -> Vec<String> {
    fn walk(root: &Path, dir: &Path, keys: &mut Vec<String>) {
        let Ok(entries) = std::fs::read_dir(dir) else {
            return;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                walk(root, &path, keys);
            } else if let Ok(relative) = path.strip_prefix(root) {
                keys.push(relative.to_string_lossy().replace('\\', "/"));
            }
        }
    }

    let mut keys = Vec::new();
    walk(root, root, &mut keys);
    keys.sort();
    keys
}

/// Number of job directories left under a scratch root
pub fn scratch_entries(root: &Path) -> usize {
    std::fs::read_dir(root).map(|entries| entries.count()).unwrap_or(0)
}

// ============================================================================
// Coordinator harness
// ============================================================================

pub struct Harness {
    pub dir: TempDir,
    pub coordinator: JobCoordinator,
}

impl Harness {
    /// Coordinator over a plain local store
    pub fn new(rasterizer: Rasterizer) -> Self {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(LocalBlobStore::new(
            dir.path().join("blobs"),
            PUBLIC_BASE_URL,
            SIGNING_SECRET,
        ));
        Self::with_store(dir, store, rasterizer)
    }

    pub fn with_store(dir: TempDir, store: Arc<dyn BlobStore>, rasterizer: Rasterizer) -> Self {
        let coordinator = JobCoordinator::new(
            store,
            ScratchRoot::new(dir.path().join("scratch")),
            TransformEngine::new(rasterizer),
            Duration::from_secs(3600),
        );
        Self { dir, coordinator }
    }

    pub fn blob_root(&self) -> PathBuf {
        self.dir.path().join("blobs")
    }

    pub fn scratch_root(&self) -> PathBuf {
        self.dir.path().join("scratch")
    }
}

// ============================================================================
// Multipart bodies
// ============================================================================

const BOUNDARY: &str = "pdf-toolbox-test-boundary";

/// Builds a `multipart/form-data` request body
#[derive(Default)]
pub struct MultipartBody {
    body: Vec<u8>,
}

impl MultipartBody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file(mut self, field: &str, file_name: &str, data: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                BOUNDARY, field, file_name
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(data);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn text(mut self, field: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, field, value
            )
            .as_bytes(),
        );
        self
    }

    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", BOUNDARY)
    }

    pub fn finish(mut self) -> Vec<u8> {
        self.body
            .extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        self.body
    }
}
