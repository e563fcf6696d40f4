//! PDF page operations: merge and split
//!
//! Both build a fresh document with [`PageAssembler`], which moves whole page
//! objects out of their source documents. Content streams are carried over
//! byte for byte.

use std::collections::HashSet;
use std::ops::RangeInclusive;
use std::path::Path;

use lopdf::{dictionary, Dictionary, Document, Object, ObjectId};

use super::error::{Result, TransformError};
use super::operation::{LocalInput, Operation, TransformOutput};
use super::commit_output;

/// Page attributes a page may inherit from its ancestors in the page tree
const INHERITABLE: &[&[u8]] = &[b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Guard against cyclic /Parent chains in damaged files
const MAX_TREE_DEPTH: usize = 64;

/// Collects pages from any number of source documents into one new document.
///
/// Pages end up in the order they are appended.
pub struct PageAssembler {
    document: Document,
    pages_id: ObjectId,
    kids: Vec<ObjectId>,
}

impl PageAssembler {
    pub fn new() -> Self {
        let mut document = Document::with_version("1.7");
        let pages_id = document.new_object_id();
        Self {
            document,
            pages_id,
            kids: Vec::new(),
        }
    }

    pub fn page_count(&self) -> u32 {
        self.kids.len() as u32
    }

    /// Append `page_numbers` (1-based, in the given order) from `source`
    pub fn append(&mut self, mut source: Document, page_numbers: &[u32]) -> Result<()> {
        source.renumber_objects_with(self.document.max_id + 1);

        let pages = source.get_pages();
        let mut selected: Vec<(ObjectId, Dictionary)> = Vec::with_capacity(page_numbers.len());
        for number in page_numbers {
            let id = *pages.get(number).ok_or_else(|| {
                TransformError::Render(format!("page {} missing from page tree", number))
            })?;
            let mut page = source
                .get_dictionary(id)
                .map_err(|e| TransformError::Render(format!("page {}: {}", number, e)))?
                .clone();
            inherit_attributes(&source, &mut page);
            page.set("Parent", Object::Reference(self.pages_id));
            selected.push((id, page));
        }

        let source_pages: HashSet<ObjectId> = pages.values().copied().collect();
        self.document.max_id = self.document.max_id.max(source.max_id);

        for (id, object) in source.objects {
            // The old page tree and catalog are rebuilt in `finish`
            if source_pages.contains(&id) || is_tree_node(&object) {
                continue;
            }
            self.document.objects.insert(id, object);
        }

        for (id, page) in selected {
            self.document.objects.insert(id, Object::Dictionary(page));
            self.kids.push(id);
        }

        Ok(())
    }

    /// Build the page tree and catalog, drop unreachable objects, serialize
    pub fn finish(mut self) -> Result<Vec<u8>> {
        let kids: Vec<Object> = self.kids.iter().copied().map(Object::Reference).collect();
        let count = kids.len() as i64;

        self.document.objects.insert(
            self.pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );

        let catalog_id = self.document.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        self.document.trailer.set("Root", catalog_id);
        self.document.prune_objects();

        let mut bytes = Vec::new();
        self.document
            .save_to(&mut bytes)
            .map_err(|e| TransformError::Render(format!("failed to serialise PDF: {}", e)))?;
        Ok(bytes)
    }
}

impl Default for PageAssembler {
    fn default() -> Self {
        Self::new()
    }
}

fn is_tree_node(object: &Object) -> bool {
    match object {
        Object::Dictionary(dict) => matches!(
            dict.get(b"Type"),
            Ok(Object::Name(name)) if name == b"Pages" || name == b"Catalog"
        ),
        _ => false,
    }
}

/// Copy attributes the page only has through its ancestors onto the page itself
fn inherit_attributes(source: &Document, page: &mut Dictionary) {
    let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();
    let mut depth = 0;

    while let Some(id) = parent {
        if depth >= MAX_TREE_DEPTH {
            tracing::warn!(?id, "Page tree too deep, stopping attribute inheritance");
            break;
        }
        let Ok(node) = source.get_dictionary(id) else {
            break;
        };

        for key in INHERITABLE {
            if !page.has(key) {
                if let Ok(value) = node.get(key) {
                    page.set(key.to_vec(), value.clone());
                }
            }
        }

        parent = node.get(b"Parent").and_then(Object::as_reference).ok();
        depth += 1;
    }
}

fn load(input: &LocalInput) -> Result<Document> {
    Document::load(&input.path).map_err(|e| TransformError::unreadable(&input.name, e))
}

/// Clamp a requested 1-based inclusive range to `[1, page_count]`
pub fn clamp_range(start: i64, end: i64, page_count: u32) -> Result<RangeInclusive<u32>> {
    let first = start.max(1);
    let last = end.min(i64::from(page_count));

    if first > last {
        return Err(TransformError::InvalidRange {
            start,
            end,
            page_count,
        });
    }

    Ok(first as u32..=last as u32)
}

/// Concatenate every page of every PDF input, in input order.
///
/// Inputs without a `.pdf` extension are skipped and reported in the output.
pub fn merge(inputs: &[LocalInput], output: &Path) -> Result<TransformOutput> {
    let mut assembler = PageAssembler::new();
    let mut skipped = Vec::new();
    let mut merged = 0usize;

    for input in inputs {
        if !Operation::Merge.accepts(&input.name) {
            tracing::debug!(file = %input.name, "Skipping non-PDF merge input");
            skipped.push(input.name.clone());
            continue;
        }

        let document = load(input)?;
        let numbers: Vec<u32> = document.get_pages().keys().copied().collect();
        tracing::debug!(file = %input.name, pages = numbers.len(), "Appending document");
        assembler.append(document, &numbers)?;
        merged += 1;
    }

    if merged == 0 {
        return Err(TransformError::NoValidInputs { operation: "merge" });
    }

    let page_count = assembler.page_count();
    let bytes = assembler.finish()?;
    commit_output(output, &bytes)?;

    tracing::info!(documents = merged, pages = page_count, skipped = skipped.len(), "Merge complete");

    Ok(TransformOutput {
        path: output.to_path_buf(),
        page_count: Some(page_count),
        skipped,
    })
}

/// Copy pages `start..=end` (clamped) of one PDF into a new document
pub fn split(input: &LocalInput, output: &Path, start: i64, end: i64) -> Result<TransformOutput> {
    let document = load(input)?;
    let total = document.get_pages().len() as u32;
    let range = clamp_range(start, end, total)?;
    let numbers: Vec<u32> = range.collect();

    let mut assembler = PageAssembler::new();
    assembler.append(document, &numbers)?;
    let page_count = assembler.page_count();
    let bytes = assembler.finish()?;
    commit_output(output, &bytes)?;

    tracing::info!(
        requested_start = start,
        requested_end = end,
        first = numbers.first().copied().unwrap_or_default(),
        last = numbers.last().copied().unwrap_or_default(),
        pages = page_count,
        "Split complete"
    );

    Ok(TransformOutput {
        path: output.to_path_buf(),
        page_count: Some(page_count),
        skipped: Vec::new(),
    })
}
