//! Document object model adapter
//!
//! Thin layer over `lopdf` exposing the page-level operations the transform
//! pipeline needs: load, create, copy pages between documents, page geometry,
//! rotation, standard fonts, text drawing and serialization.

use crate::error::PdfError;
use chrono::{DateTime, Utc};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};

/// Producer string written into documents created by this crate
pub const PRODUCER: &str = "RevisePDF";

/// Page attributes a page may inherit from its ancestors in the page tree
const INHERITABLE_KEYS: [&[u8]; 4] = [b"MediaBox", b"CropBox", b"Resources", b"Rotate"];

/// Guard against cyclic `Parent` chains in malformed page trees
const MAX_TREE_DEPTH: usize = 64;

/// US Letter, used when a page declares no MediaBox anywhere in its tree
const DEFAULT_PAGE_SIZE: PageSize = PageSize {
    width: 612.0,
    height: 792.0,
};

/// Width and height of a page in points
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

/// A standard font registered in a document
#[derive(Debug, Clone)]
pub struct EmbeddedFont {
    id: ObjectId,
    resource_name: String,
}

/// RGB fill color, components in 0-1
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgb(pub f32, pub f32, pub f32);

/// Rotation of drawn text about an origin point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextRotation {
    pub degrees: f32,
    pub origin_x: f32,
    pub origin_y: f32,
}

#[derive(Debug, Clone, Copy)]
pub struct DrawTextOptions<'a> {
    pub x: f32,
    pub y: f32,
    pub size: f32,
    pub font: &'a EmbeddedFont,
    pub color: Rgb,
    pub opacity: f32,
    pub rotate: Option<TextRotation>,
}

/// Load a document from raw bytes
pub fn load(bytes: &[u8]) -> Result<Document, PdfError> {
    Document::load_mem(bytes).map_err(|e| PdfError::ParseError(e.to_string()))
}

/// Create an empty document with a catalog, an empty page tree and an Info dictionary
pub fn create() -> Document {
    let mut doc = Document::with_version("1.7");

    let pages_id = doc.add_object(dictionary! {
        "Type" => "Pages",
        "Kids" => Vec::<Object>::new(),
        "Count" => 0,
    });
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let now = format_pdf_date(Utc::now());
    let info_id = doc.add_object(dictionary! {
        "Producer" => Object::string_literal(PRODUCER),
        "Creator" => Object::string_literal(PRODUCER),
        "CreationDate" => Object::string_literal(now.clone()),
        "ModDate" => Object::string_literal(now),
    });
    doc.trailer.set("Info", info_id);

    doc
}

/// Number of pages in the document
pub fn page_count(doc: &Document) -> u32 {
    doc.get_pages().len() as u32
}

/// Page object ids in page order
pub fn page_ids(doc: &Document) -> Vec<ObjectId> {
    doc.get_pages().into_values().collect()
}

/// Object id of the root `Pages` node
pub fn pages_root(doc: &Document) -> Result<ObjectId, PdfError> {
    let catalog_id = doc
        .trailer
        .get(b"Root")
        .and_then(|root| root.as_reference())
        .map_err(|_| PdfError::OperationError("No Root in trailer".into()))?;

    doc.get_dictionary(catalog_id)
        .map_err(|_| PdfError::OperationError("Catalog not found".into()))?
        .get(b"Pages")
        .and_then(|pages| pages.as_reference())
        .map_err(|_| PdfError::OperationError("No Pages in catalog".into()))
}

/// Copy pages (0-based indices) from `source` into `dest`.
///
/// Every object of the source is imported with its ids shifted past
/// `dest.max_id`, then one fresh page dictionary is created per requested
/// index with inherited attributes resolved. Repeated indices produce
/// distinct page objects. The returned pages are not yet part of the page
/// tree; append them with [`add_page`]. Objects that end up unreferenced are
/// dropped by [`save`].
pub fn copy_pages(
    dest: &mut Document,
    source: &Document,
    indices: &[u32],
) -> Result<Vec<ObjectId>, PdfError> {
    if indices.is_empty() {
        return Ok(Vec::new());
    }

    let source_pages = page_ids(source);
    let offset = dest.max_id;

    for (id, object) in &source.objects {
        dest.objects
            .insert((id.0 + offset, id.1), remap_object_refs(object.clone(), offset));
    }
    dest.max_id = dest.max_id.max(source.max_id + offset);

    let pages_id = pages_root(dest)?;
    let mut copied = Vec::with_capacity(indices.len());

    for &index in indices {
        let source_page = source_pages.get(index as usize).ok_or_else(|| {
            PdfError::OperationError(format!(
                "Page index {} out of bounds (document has {} pages)",
                index,
                source_pages.len()
            ))
        })?;

        let mut page = flatten_page(source, *source_page)?;
        page.remove(b"Parent");
        let Object::Dictionary(mut page) = remap_object_refs(Object::Dictionary(page), offset)
        else {
            return Err(PdfError::OperationError("Page is not a dictionary".into()));
        };
        page.set("Parent", pages_id);

        copied.push(dest.add_object(page));
    }

    Ok(copied)
}

/// Append a page object to the end of the document's page tree
pub fn add_page(doc: &mut Document, page_id: ObjectId) -> Result<(), PdfError> {
    let pages_id = pages_root(doc)?;

    match doc.objects.get_mut(&pages_id) {
        Some(Object::Dictionary(pages_dict)) => {
            if let Ok(Object::Array(kids)) = pages_dict.get_mut(b"Kids") {
                kids.push(Object::Reference(page_id));
            } else {
                pages_dict.set("Kids", vec![Object::Reference(page_id)]);
            }
            let count = pages_dict
                .get(b"Count")
                .and_then(|c| c.as_i64())
                .unwrap_or(0);
            pages_dict.set("Count", count + 1);
        }
        _ => {
            return Err(PdfError::OperationError(
                "Invalid pages dictionary".into(),
            ))
        }
    }

    page_dict_mut(doc, page_id)?.set("Parent", pages_id);
    Ok(())
}

/// Size of a page, taken from its (possibly inherited) MediaBox
pub fn page_size(doc: &Document, page_id: ObjectId) -> Result<PageSize, PdfError> {
    let page = doc
        .get_dictionary(page_id)
        .map_err(|e| PdfError::OperationError(e.to_string()))?;

    let Some(media_box) = inherited_attribute(doc, page, b"MediaBox") else {
        return Ok(DEFAULT_PAGE_SIZE);
    };

    let values = resolve(doc, media_box)
        .as_array()
        .map_err(|_| PdfError::OperationError("MediaBox is not an array".into()))?;
    if values.len() != 4 {
        return Err(PdfError::OperationError(
            "MediaBox must have 4 elements".into(),
        ));
    }

    let mut coords = [0.0f32; 4];
    for (slot, value) in coords.iter_mut().zip(values) {
        *slot = number(resolve(doc, value)).ok_or_else(|| {
            PdfError::OperationError("MediaBox element is not a number".into())
        })?;
    }

    Ok(PageSize {
        width: (coords[2] - coords[0]).abs(),
        height: (coords[3] - coords[1]).abs(),
    })
}

/// Effective rotation of a page in degrees, normalized to 0..360
pub fn rotation(doc: &Document, page_id: ObjectId) -> i64 {
    doc.get_dictionary(page_id)
        .ok()
        .and_then(|page| inherited_attribute(doc, page, b"Rotate"))
        .and_then(|rotate| resolve(doc, rotate).as_i64().ok())
        .map(|angle| angle.rem_euclid(360))
        .unwrap_or(0)
}

/// Set the absolute rotation of a page in degrees
pub fn set_rotation(doc: &mut Document, page_id: ObjectId, degrees: i64) -> Result<(), PdfError> {
    page_dict_mut(doc, page_id)?.set("Rotate", degrees);
    Ok(())
}

/// Register one of the standard 14 fonts with WinAnsi encoding
pub fn embed_standard_font(doc: &mut Document, base_font: &str) -> EmbeddedFont {
    let id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => Object::Name(base_font.as_bytes().to_vec()),
        "Encoding" => "WinAnsiEncoding",
    });
    EmbeddedFont {
        id,
        resource_name: format!("RvF{}", id.0),
    }
}

/// Draw a single line of text on a page.
///
/// The page's existing content is wrapped in `q`/`Q` and the text is appended
/// as a new content stream.
pub fn draw_text(
    doc: &mut Document,
    page_id: ObjectId,
    text: &str,
    options: &DrawTextOptions<'_>,
) -> Result<(), PdfError> {
    let encoded = encode_win_ansi(text)?;

    register_resource(
        doc,
        page_id,
        b"Font",
        &options.font.resource_name,
        Object::Reference(options.font.id),
    )?;

    let mut operations = vec![Operation::new("q", vec![])];

    if options.opacity < 1.0 {
        let gs_name = format!("RvGs{}", (options.opacity * 100.0).round() as i64);
        let gs_id = doc.add_object(dictionary! {
            "Type" => "ExtGState",
            "ca" => options.opacity,
            "CA" => options.opacity,
        });
        register_resource(doc, page_id, b"ExtGState", &gs_name, Object::Reference(gs_id))?;
        operations.push(Operation::new(
            "gs",
            vec![Object::Name(gs_name.into_bytes())],
        ));
    }

    let Rgb(r, g, b) = options.color;
    operations.push(Operation::new("rg", vec![r.into(), g.into(), b.into()]));
    operations.push(Operation::new("BT", vec![]));
    operations.push(Operation::new(
        "Tf",
        vec![
            Object::Name(options.font.resource_name.as_bytes().to_vec()),
            options.size.into(),
        ],
    ));
    operations.push(Operation::new(
        "Tm",
        text_matrix(options.x, options.y, options.rotate)
            .into_iter()
            .map(Object::Real)
            .collect(),
    ));
    operations.push(Operation::new(
        "Tj",
        vec![Object::String(encoded, lopdf::StringFormat::Literal)],
    ));
    operations.push(Operation::new("ET", vec![]));
    operations.push(Operation::new("Q", vec![]));

    let content = Content { operations }
        .encode()
        .map_err(|e| PdfError::OperationError(format!("Failed to encode content: {}", e)))?;

    append_content(doc, page_id, content)
}

/// Serialize a document, dropping unreferenced objects and Flate-compressing streams
pub fn save(doc: &mut Document) -> Result<Vec<u8>, PdfError> {
    doc.prune_objects();
    doc.compress();

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| PdfError::SerializationError(format!("Save failed: {}", e)))?;
    Ok(buffer)
}

/// Look up an attribute on a page, walking up the page tree if the page lacks it
pub fn inherited_attribute<'a>(
    doc: &'a Document,
    page: &'a Dictionary,
    key: &[u8],
) -> Option<&'a Object> {
    if let Ok(value) = page.get(key) {
        return Some(value);
    }

    let mut parent = page.get(b"Parent").and_then(|p| p.as_reference()).ok();
    for _ in 0..MAX_TREE_DEPTH {
        let dict = doc.get_dictionary(parent?).ok()?;
        if let Ok(value) = dict.get(key) {
            return Some(value);
        }
        parent = dict.get(b"Parent").and_then(|p| p.as_reference()).ok();
    }
    None
}

/// Format a timestamp as a PDF date string (`D:YYYYMMDDHHmmSSZ`)
pub fn format_pdf_date(at: DateTime<Utc>) -> String {
    at.format("D:%Y%m%d%H%M%SZ").to_string()
}

/// Clone of a page dictionary with inheritable attributes pulled down onto it
fn flatten_page(doc: &Document, page_id: ObjectId) -> Result<Dictionary, PdfError> {
    let page = doc
        .get_dictionary(page_id)
        .map_err(|e| PdfError::OperationError(format!("Page object not found: {}", e)))?;

    let mut flattened = page.clone();
    for key in INHERITABLE_KEYS {
        if !flattened.has(key) {
            if let Some(value) = inherited_attribute(doc, page, key) {
                flattened.set(key.to_vec(), value.clone());
            }
        }
    }
    Ok(flattened)
}

/// Recursively shift object references by `offset`
fn remap_object_refs(obj: Object, offset: u32) -> Object {
    match obj {
        Object::Reference(id) => Object::Reference((id.0 + offset, id.1)),
        Object::Array(arr) => Object::Array(
            arr.into_iter()
                .map(|o| remap_object_refs(o, offset))
                .collect(),
        ),
        Object::Dictionary(mut dict) => {
            for (_, value) in dict.iter_mut() {
                *value = remap_object_refs(value.clone(), offset);
            }
            Object::Dictionary(dict)
        }
        Object::Stream(mut stream) => {
            for (_, value) in stream.dict.iter_mut() {
                *value = remap_object_refs(value.clone(), offset);
            }
            Object::Stream(stream)
        }
        other => other,
    }
}

/// Follow a reference to its target object; non-references are returned as-is
fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        other => other,
    }
}

fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(n) => Some(*n as f32),
        Object::Real(n) => Some(*n),
        _ => None,
    }
}

fn page_dict_mut(doc: &mut Document, page_id: ObjectId) -> Result<&mut Dictionary, PdfError> {
    doc.get_object_mut(page_id)
        .and_then(|page| page.as_dict_mut())
        .map_err(|e| PdfError::OperationError(format!("Invalid page object: {}", e)))
}

/// Add `name => value` to the page's `/Resources/<category>` dictionary.
///
/// Indirect resource dictionaries are updated in place (they may be shared
/// between pages); inherited direct dictionaries are copied onto the page.
fn register_resource(
    doc: &mut Document,
    page_id: ObjectId,
    category: &[u8],
    name: &str,
    value: Object,
) -> Result<(), PdfError> {
    let page = doc
        .get_dictionary(page_id)
        .map_err(|e| PdfError::OperationError(e.to_string()))?;

    let (resources_id, mut resources) = match inherited_attribute(doc, page, b"Resources") {
        Some(Object::Reference(id)) => {
            let dict = doc
                .get_dictionary(*id)
                .map_err(|e| PdfError::OperationError(format!("Invalid Resources: {}", e)))?;
            (Some(*id), dict.clone())
        }
        Some(Object::Dictionary(dict)) => (None, dict.clone()),
        _ => (None, Dictionary::new()),
    };

    match resources.get(category).ok().cloned() {
        Some(Object::Reference(category_id)) => {
            doc.get_object_mut(category_id)
                .and_then(|obj| obj.as_dict_mut())
                .map_err(|e| PdfError::OperationError(e.to_string()))?
                .set(name, value);
        }
        Some(Object::Dictionary(mut existing)) => {
            existing.set(name, value);
            resources.set(category.to_vec(), existing);
        }
        _ => {
            let mut created = Dictionary::new();
            created.set(name, value);
            resources.set(category.to_vec(), created);
        }
    }

    match resources_id {
        Some(id) => {
            doc.objects.insert(id, Object::Dictionary(resources));
        }
        None => {
            page_dict_mut(doc, page_id)?.set("Resources", resources);
        }
    }
    Ok(())
}

/// Append a content stream, isolating the existing content in its own q/Q pair
fn append_content(doc: &mut Document, page_id: ObjectId, content: Vec<u8>) -> Result<(), PdfError> {
    let existing: Vec<Object> = {
        let page = doc
            .get_dictionary(page_id)
            .map_err(|e| PdfError::OperationError(e.to_string()))?;
        match page.get(b"Contents") {
            Ok(Object::Reference(id)) => match doc.get_object(*id) {
                Ok(Object::Array(items)) => items.clone(),
                _ => vec![Object::Reference(*id)],
            },
            Ok(Object::Array(items)) => items.clone(),
            _ => Vec::new(),
        }
    };

    let appended_id = doc.add_object(Stream::new(Dictionary::new(), content));

    let mut contents = Vec::with_capacity(existing.len() + 3);
    if !existing.is_empty() {
        let open_id = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
        let close_id = doc.add_object(Stream::new(Dictionary::new(), b"Q\n".to_vec()));
        contents.push(Object::Reference(open_id));
        contents.extend(existing);
        contents.push(Object::Reference(close_id));
    }
    contents.push(Object::Reference(appended_id));

    page_dict_mut(doc, page_id)?.set("Contents", contents);
    Ok(())
}

/// Text matrix placing the glyph origin at (x, y), optionally rotated about an origin
fn text_matrix(x: f32, y: f32, rotate: Option<TextRotation>) -> [f32; 6] {
    match rotate {
        None => [1.0, 0.0, 0.0, 1.0, x, y],
        Some(rotation) => {
            let (sin, cos) = rotation.degrees.to_radians().sin_cos();
            let dx = x - rotation.origin_x;
            let dy = y - rotation.origin_y;
            [
                cos,
                sin,
                -sin,
                cos,
                rotation.origin_x + cos * dx - sin * dy,
                rotation.origin_y + sin * dx + cos * dy,
            ]
        }
    }
}

/// Encode text for a WinAnsi standard font
fn encode_win_ansi(text: &str) -> Result<Vec<u8>, PdfError> {
    text.chars()
        .map(|c| match c {
            ' '..='~' | '\u{A0}'..='\u{FF}' => Ok(c as u8),
            _ => win_ansi_extra(c).ok_or(PdfError::Encoding(c)),
        })
        .collect()
}

/// WinAnsi code points in the 0x80-0x9F block
fn win_ansi_extra(c: char) -> Option<u8> {
    let code = match c {
        '€' => 0x80,
        '‚' => 0x82,
        'ƒ' => 0x83,
        '„' => 0x84,
        '…' => 0x85,
        '†' => 0x86,
        '‡' => 0x87,
        'ˆ' => 0x88,
        '‰' => 0x89,
        'Š' => 0x8A,
        '‹' => 0x8B,
        'Œ' => 0x8C,
        'Ž' => 0x8E,
        '\u{2018}' => 0x91,
        '\u{2019}' => 0x92,
        '\u{201C}' => 0x93,
        '\u{201D}' => 0x94,
        '•' => 0x95,
        '–' => 0x96,
        '—' => 0x97,
        '˜' => 0x98,
        '™' => 0x99,
        'š' => 0x9A,
        '›' => 0x9B,
        'œ' => 0x9C,
        'ž' => 0x9E,
        'Ÿ' => 0x9F,
        _ => return None,
    };
    Some(code)
}
