// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF reader — open submitted theses with `lopdf`, walk the page tree, and
// resolve the inherited page attributes the extractor needs.

use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use techcheck_core::error::ExtractionError;
use thiserror::Error;
use tracing::{debug, instrument, warn};

/// A structural problem confined to one page or object.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct PdfError(pub String);

impl PdfError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Page geometry in PDF user space, taken from the (inherited) MediaBox.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    /// Lower-left corner of the MediaBox.
    pub origin_x: f64,
    pub origin_y: f64,
    pub width: f64,
    pub height: f64,
}

impl PageGeometry {
    /// A4 portrait, used when a page has no usable MediaBox.
    pub const A4: PageGeometry = PageGeometry {
        origin_x: 0.0,
        origin_y: 0.0,
        width: 595.276,
        height: 841.89,
    };

    /// Convert a user-space point to top-left page coordinates.
    pub fn to_page(&self, x: f64, y: f64) -> (f64, f64) {
        (x - self.origin_x, self.height - (y - self.origin_y))
    }

    /// Convert a top-left page coordinate back to user space.
    pub fn to_user(&self, x: f64, y: f64) -> (f64, f64) {
        (x + self.origin_x, self.height - y + self.origin_y)
    }
}

/// Bytes at the end of a file searched for the trailer when lopdf cannot
/// load the document.
const TRAILER_WINDOW: usize = 4096;

/// Read access to a loaded PDF.
pub struct PdfReader {
    document: Document,
    page_ids: Vec<ObjectId>,
    /// The trailer carried an encryption dictionary.
    encryption_marker: bool,
}

impl PdfReader {
    /// Load a PDF from bytes.
    ///
    /// Fails with `Encrypted` when the file cannot be opened and its trailer
    /// declares an encryption dictionary, and with `Unreadable` for every
    /// other load failure or a document without pages.
    #[instrument(skip_all, fields(bytes_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self, ExtractionError> {
        let document = Document::load_mem(data).map_err(|err| {
            if trailer_declares_encryption(data) {
                warn!(%err, "encrypted PDF could not be opened");
                ExtractionError::Encrypted
            } else {
                ExtractionError::Unreadable(format!("failed to parse PDF: {err}"))
            }
        })?;

        let page_ids: Vec<ObjectId> = document.get_pages().values().copied().collect();
        let encryption_marker =
            document.trailer.get(b"Encrypt").is_ok() || trailer_declares_encryption(data);

        if page_ids.is_empty() {
            return Err(if encryption_marker {
                ExtractionError::Encrypted
            } else {
                ExtractionError::Unreadable("document has no pages".into())
            });
        }

        debug!(pages = page_ids.len(), encryption_marker, "PDF loaded from bytes");

        Ok(Self {
            document,
            page_ids,
            encryption_marker,
        })
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn into_document(self) -> Document {
        self.document
    }

    pub fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    /// Page object ids in document order.
    pub fn page_ids(&self) -> &[ObjectId] {
        &self.page_ids
    }

    /// Whether the document declared encryption.
    pub fn has_encryption_marker(&self) -> bool {
        self.encryption_marker
    }

    /// MediaBox geometry for a page, walking up the page tree.
    pub fn page_geometry(&self, page_id: ObjectId) -> Result<PageGeometry, PdfError> {
        page_geometry(&self.document, page_id)
    }

    /// Resources dictionary for a page, walking up the page tree.
    pub fn page_resources(&self, page_id: ObjectId) -> Result<Option<&Dictionary>, PdfError> {
        match resolve_inherited(&self.document, page_id, b"Resources")? {
            Some(obj) => Ok(resolve(&self.document, obj).as_dict().ok()),
            None => Ok(None),
        }
    }

    /// Concatenated, decompressed content stream bytes of a page.
    pub fn page_content(&self, page_id: ObjectId) -> Result<Vec<u8>, PdfError> {
        let dict = self
            .document
            .get_object(page_id)
            .and_then(Object::as_dict)
            .map_err(|err| PdfError(format!("failed to get page dictionary: {err}")))?;
        page_content_bytes(&self.document, dict)
    }
}

/// Geometry of a page in an arbitrary lopdf document.
pub fn page_geometry(doc: &Document, page_id: ObjectId) -> Result<PageGeometry, PdfError> {
    let Some(obj) = resolve_inherited(doc, page_id, b"MediaBox")? else {
        return Ok(PageGeometry::A4);
    };
    let array = resolve(doc, obj)
        .as_array()
        .map_err(|err| PdfError(format!("MediaBox is not an array: {err}")))?;
    if array.len() != 4 {
        return Err(PdfError(format!(
            "MediaBox has {} entries, expected 4",
            array.len()
        )));
    }
    let mut values = [0.0; 4];
    for (slot, item) in values.iter_mut().zip(array) {
        *slot = object_to_f64(resolve(doc, item))?;
    }
    let (x0, x1) = (values[0].min(values[2]), values[0].max(values[2]));
    let (y0, y1) = (values[1].min(values[3]), values[1].max(values[3]));
    if x1 - x0 <= 0.0 || y1 - y0 <= 0.0 {
        return Err(PdfError::new("MediaBox has zero area"));
    }
    Ok(PageGeometry {
        origin_x: x0,
        origin_y: y0,
        width: x1 - x0,
        height: y1 - y0,
    })
}

/// Convert a lopdf numeric object (Integer or Real) to f64.
pub(crate) fn object_to_f64(obj: &Object) -> Result<f64, PdfError> {
    match obj {
        Object::Integer(i) => Ok(*i as f64),
        Object::Real(f) => Ok(*f as f64),
        _ => Err(PdfError(format!("expected number, got {obj:?}"))),
    }
}

/// Follow a reference to its target; other objects are returned unchanged.
pub(crate) fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        other => other,
    }
}

/// Look up a key in the page dictionary, walking up the page tree
/// (via /Parent) when the page itself does not carry it.
pub(crate) fn resolve_inherited<'a>(
    doc: &'a Document,
    page_id: ObjectId,
    key: &[u8],
) -> Result<Option<&'a Object>, PdfError> {
    let mut current_id = page_id;
    // Page trees deeper than this are malformed (or cyclic).
    for _ in 0..64 {
        let dict = doc
            .get_object(current_id)
            .and_then(Object::as_dict)
            .map_err(|err| PdfError(format!("failed to get page tree node: {err}")))?;

        if let Ok(value) = dict.get(key) {
            return Ok(Some(value));
        }

        match dict.get(b"Parent") {
            Ok(parent) => {
                current_id = parent
                    .as_reference()
                    .map_err(|err| PdfError(format!("invalid /Parent reference: {err}")))?;
            }
            Err(_) => return Ok(None),
        }
    }
    Err(PdfError::new("page tree is too deep"))
}

/// Content stream bytes from a page dictionary. Handles a single stream and
/// arrays of streams.
fn page_content_bytes(doc: &Document, page_dict: &Dictionary) -> Result<Vec<u8>, PdfError> {
    let contents = match page_dict.get(b"Contents") {
        Ok(obj) => obj,
        Err(_) => return Ok(Vec::new()),
    };

    match resolve(doc, contents) {
        Object::Stream(stream) => decode_stream(stream),
        Object::Array(items) => {
            let mut content = Vec::new();
            for item in items {
                let stream = resolve(doc, item)
                    .as_stream()
                    .map_err(|err| PdfError(format!("/Contents item is not a stream: {err}")))?;
                let bytes = decode_stream(stream)?;
                if !content.is_empty() {
                    content.push(b'\n');
                }
                content.extend_from_slice(&bytes);
            }
            Ok(content)
        }
        other => Err(PdfError(format!(
            "/Contents is not a stream or array: {other:?}"
        ))),
    }
}

/// Stream bytes, decompressed when a filter is declared.
pub(crate) fn decode_stream(stream: &Stream) -> Result<Vec<u8>, PdfError> {
    if stream.dict.get(b"Filter").is_ok() {
        stream
            .decompressed_content()
            .map_err(|err| PdfError(format!("failed to decompress stream: {err}")))
    } else {
        Ok(stream.content.clone())
    }
}

fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .rposition(|window| window == needle)
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|window| window == needle)
}

/// Whether the last trailer dictionary (or cross-reference stream
/// dictionary) in the file names `/Encrypt`. Page content and image data
/// earlier in the file are not searched.
fn trailer_declares_encryption(data: &[u8]) -> bool {
    let tail = &data[data.len().saturating_sub(TRAILER_WINDOW)..];
    if let Some(at) = rfind(tail, b"trailer") {
        return contains(&tail[at..], b"/Encrypt");
    }
    let Some(at) = rfind(tail, b"/XRef") else {
        return false;
    };
    let start = rfind(&tail[..at], b" obj").unwrap_or(0);
    let end = tail[at..]
        .windows(6)
        .position(|window| window == b"stream")
        .map_or(tail.len(), |offset| at + offset);
    contains(&tail[start..end], b"/Encrypt")
}

/// Append every page of `source` to the end of `target`'s page tree.
///
/// Objects referenced by the copied pages are deep-cloned as new objects.
pub fn append_pages(source: &Document, target: &mut Document) -> Result<usize, PdfError> {
    let ids: Vec<ObjectId> = source.get_pages().values().copied().collect();
    for page_id in &ids {
        clone_page_into(source, target, *page_id)?;
    }
    Ok(ids.len())
}

/// Clone a single page object (and its referenced resources) from `source`
/// into `target`, appending it as the last page.
fn clone_page_into(
    source: &Document,
    target: &mut Document,
    page_id: ObjectId,
) -> Result<(), PdfError> {
    let page_object = source
        .get_object(page_id)
        .map_err(|err| PdfError(format!("cannot read page object {page_id:?}: {err}")))?;

    let cloned = deep_clone_object(source, target, page_object, 0)?;
    let cloned_id = target.add_object(cloned);

    let pages_id = target
        .catalog()
        .map_err(|err| PdfError(format!("no catalog: {err}")))
        .and_then(|catalog| {
            catalog
                .get(b"Pages")
                .and_then(Object::as_reference)
                .map_err(|err| PdfError(format!("no /Pages reference: {err}")))
        })?;

    if let Ok(Object::Dictionary(pages_dict)) = target.get_object_mut(pages_id) {
        if let Ok(Object::Array(kids)) = pages_dict.get_mut(b"Kids") {
            kids.push(Object::Reference(cloned_id));
        }
        if let Ok(Object::Integer(count)) = pages_dict.get_mut(b"Count") {
            *count += 1;
        }
    }

    if let Ok(Object::Dictionary(page_dict)) = target.get_object_mut(cloned_id) {
        page_dict.set("Parent", Object::Reference(pages_id));
    }

    Ok(())
}

/// Deep-clone a lopdf object, resolving references into new target objects.
/// /Parent and /P back-references are skipped; the caller patches /Parent.
fn deep_clone_object(
    source: &Document,
    target: &mut Document,
    object: &Object,
    depth: u32,
) -> Result<Object, PdfError> {
    if depth > 32 {
        return Err(PdfError::new("object graph too deep to copy"));
    }
    match object {
        Object::Dictionary(dict) => Ok(Object::Dictionary(clone_dict(
            source, target, dict, depth,
        )?)),
        Object::Array(items) => {
            let mut cloned = Vec::with_capacity(items.len());
            for item in items {
                cloned.push(deep_clone_object(source, target, item, depth + 1)?);
            }
            Ok(Object::Array(cloned))
        }
        Object::Reference(ref_id) => match source.get_object(*ref_id) {
            Ok(referenced) => {
                let cloned = deep_clone_object(source, target, referenced, depth + 1)?;
                Ok(Object::Reference(target.add_object(cloned)))
            }
            Err(err) => {
                warn!(?ref_id, %err, "cannot resolve reference, using Null");
                Ok(Object::Null)
            }
        },
        Object::Stream(stream) => {
            let dict = clone_dict(source, target, &stream.dict, depth)?;
            Ok(Object::Stream(Stream::new(dict, stream.content.clone())))
        }
        other => Ok(other.clone()),
    }
}

fn clone_dict(
    source: &Document,
    target: &mut Document,
    dict: &Dictionary,
    depth: u32,
) -> Result<Dictionary, PdfError> {
    let mut cloned = Dictionary::new();
    for (key, value) in dict.iter() {
        if key == b"Parent" || key == b"P" {
            continue;
        }
        cloned.set(key.clone(), deep_clone_object(source, target, value, depth + 1)?);
    }
    Ok(cloned)
}
