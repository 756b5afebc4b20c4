//! SVG compositor.
//!
//! Serializes a [`Vectorized`] document into a single `<svg>` root using
//! the [`svg`] crate for document construction and XML escaping. Each
//! layer becomes one `<g>` carrying the fill color; its outlines are
//! `<path>` children filled with the even-odd rule so holes traced inside
//! a band cut through it. Layers are emitted in paint order.
//!
//! Optional [`SvgMetadata`] embeds `<title>` and `<desc>` elements.
//! Bands skipped during tracing are listed in the `<desc>` as well.
//!
//! This is a pure function with no I/O: it returns a `String`.

use svg::Document;
use svg::node::Text;
use svg::node::element::{Description, Group, Path, Rectangle, Title};

use strata_pipeline::{Layer, TracedPath, Vectorized};

/// Metadata to embed in the SVG document.
///
/// Both fields are optional. When present, a `<title>` and/or `<desc>`
/// element is emitted immediately after the opening `<svg>` tag.
///
/// Text values are XML-escaped automatically by the `svg` crate.
#[derive(Debug, Clone, Default)]
pub struct SvgMetadata<'a> {
    /// Document title, emitted as `<title>`.
    ///
    /// Typically the source image filename (without extension).
    pub title: Option<&'a str>,

    /// Document description, emitted as `<desc>`.
    pub description: Option<&'a str>,
}

/// How each layer group is painted.
#[derive(Clone, Copy)]
enum Style {
    Filled,
    Outline,
}

/// `<svg>` root sized to the working raster.
fn root(doc: &Vectorized) -> Document {
    let w = doc.dimensions.width;
    let h = doc.dimensions.height;
    Document::new()
        .set("width", w)
        .set("height", h)
        .set("viewBox", (0, 0, w, h))
}

fn path_element(traced: &TracedPath) -> Path {
    let path = Path::new().set("d", traced.d.as_str());
    let (x, y) = traced.offset;
    if x == 0.0 && y == 0.0 {
        path
    } else {
        path.set("transform", format!("translate({x},{y})"))
    }
}

fn layer_group(layer: &Layer, style: Style) -> Group {
    let group = match style {
        Style::Filled => Group::new()
            .set("fill", layer.fill.to_hex())
            .set("stroke", "none")
            .set("fill-rule", "evenodd"),
        Style::Outline => Group::new()
            .set("fill", "none")
            .set("stroke", "black")
            .set("stroke-width", 1),
    };
    layer
        .paths
        .iter()
        .filter(|p| !p.d.is_empty())
        .fold(group, |g, p| g.add(path_element(p)))
}

fn render(doc: &Vectorized, metadata: &SvgMetadata<'_>, style: Style) -> String {
    let mut out = root(doc);

    if let Some(title) = metadata.title {
        out = out.add(Title::new(title));
    }

    let mut desc_lines: Vec<String> = metadata
        .description
        .iter()
        .map(|d| (*d).to_owned())
        .collect();
    desc_lines.extend(
        doc.skipped
            .iter()
            .map(|s| format!("band {} skipped: {}", s.band, s.message)),
    );
    if !desc_lines.is_empty() {
        out = out.add(Description::new().add(Text::new(desc_lines.join("\n"))));
    }

    if let (Style::Filled, Some(background)) = (style, doc.background) {
        out = out.add(
            Rectangle::new()
                .set("width", doc.dimensions.width)
                .set("height", doc.dimensions.height)
                .set("fill", background.to_hex()),
        );
    }

    for layer in &doc.layers {
        out = out.add(layer_group(layer, style));
    }

    // The svg crate omits the XML declaration, so we prepend it.
    format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{out}\n")
}

/// Serialize a document into a filled, layered SVG string.
#[must_use]
pub fn to_svg(doc: &Vectorized) -> String {
    to_svg_with_metadata(doc, &SvgMetadata::default())
}

/// Like [`to_svg`], with `<title>`/`<desc>` metadata.
#[must_use]
pub fn to_svg_with_metadata(doc: &Vectorized, metadata: &SvgMetadata<'_>) -> String {
    render(doc, metadata, Style::Filled)
}

/// Outline preview: the same geometry with every group drawn as a thin
/// black stroke and no fill or background.
#[must_use]
pub fn to_outline_svg(doc: &Vectorized) -> String {
    render(doc, &SvgMetadata::default(), Style::Outline)
}
