//! FITS access on top of `fitsio-pure`.
//!
//! Input files are read whole and parsed once with [`parse_fits`]. A header is the
//! crate's ordered [`Card`] list; the helpers here look keywords up, assign them in
//! place and carry string values longer than one card over `CONTINUE` cards.

use std::path::Path;

use fitsio::hdu::{parse_fits, FitsData, Hdu, HduInfo};
use fitsio::header::Card;
use fitsio::image::{apply_bscale_bzero, extract_bscale_bzero, read_image_data, ImageData};
use fitsio::value::Value;
use ndarray::Array2;

use crate::error::{FormatError, ReductionError, Result};
use crate::frame::Image;

/// Ordered header cards, without the closing `END`.
pub type Header = Vec<Card>;

pub const CONTINUE: &str = "CONTINUE";

/// Most characters a quoted string can hold on a single card.
const MAX_STRING_LEN: usize = 68;

/// Escaped length of each fragment of a continued string, leaving room for `&`.
const FRAGMENT_LEN: usize = 64;

/// Text bytes available after the keyword of a commentary-style card.
const CARD_TEXT_LEN: usize = 72;

/// Keywords describing the data layout, rewritten whenever a plane is re-encoded.
const STRUCTURAL_KEYWORDS: [&str; 12] = [
    "SIMPLE", "BITPIX", "NAXIS", "EXTEND", "BSCALE", "BZERO", "BLANK", "XTENSION", "PCOUNT",
    "GCOUNT", "GROUPS", "END",
];

/// A FITS file held in memory with its parsed HDU layout.
#[derive(Debug, Clone)]
pub struct FitsInput {
    bytes: Vec<u8>,
    layout: FitsData,
}

impl FitsInput {
    /// A missing file is `NotFound`; anything else that fails is `Format`.
    pub fn open(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ReductionError::NotFound {
                    path: path.to_path_buf(),
                }
            } else {
                ReductionError::Format {
                    path: path.to_path_buf(),
                    source: FormatError::Fits(e.into()),
                }
            }
        })?;
        Self::from_bytes(bytes).map_err(|source| ReductionError::Format {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_bytes(bytes: Vec<u8>) -> std::result::Result<Self, FormatError> {
        let layout = parse_fits(&bytes)?;
        Ok(Self { bytes, layout })
    }

    pub fn hdus(&self) -> &[Hdu] {
        &self.layout.hdus
    }

    pub fn primary(&self) -> &Hdu {
        self.layout.primary()
    }

    /// HDU whose `EXTNAME` is `name`.
    pub fn find_by_name(&self, name: &str) -> Option<&Hdu> {
        self.layout.find_by_name(name)
    }

    /// Primary header cards, in file order.
    pub fn primary_header(&self) -> Header {
        self.primary()
            .cards
            .iter()
            .filter(|card| !card.is_end())
            .cloned()
            .collect()
    }

    /// First HDU with a non-empty image.
    pub fn first_image_hdu(&self) -> std::result::Result<&Hdu, FormatError> {
        self.layout
            .iter()
            .find(|hdu| {
                image_axes(hdu).is_some_and(|axes| !axes.is_empty() && axes.iter().all(|&n| n > 0))
            })
            .ok_or(FormatError::NoImage)
    }

    /// Physical pixel values of a 2D image HDU, `(NAXIS2, NAXIS1)`.
    ///
    /// `BSCALE`/`BZERO` are applied and integer pixels equal to `BLANK` become NaN.
    /// Extra axes are accepted only when they have length 1.
    pub fn read_image(&self, hdu: &Hdu) -> std::result::Result<Image, FormatError> {
        let axes = image_axes(hdu).ok_or(FormatError::NoImage)?;
        let (width, height) = match axes {
            [width, height, rest @ ..] if rest.iter().all(|&n| n == 1) => (*width, *height),
            _ => return Err(FormatError::NotTwoDimensional(axes.to_vec())),
        };

        let raw = read_image_data(&self.bytes, hdu)?;
        let (bscale, bzero) = extract_bscale_bzero(&hdu.cards);
        let mut physical = apply_bscale_bzero(&raw, bscale, bzero);
        if let Some(blank) = integer_value(&hdu.cards, "BLANK") {
            for (value, undefined) in physical.iter_mut().zip(blank_pixels(&raw, blank)) {
                if undefined {
                    *value = f64::NAN;
                }
            }
        }

        let pixels = physical.into_iter().map(|v| v as f32).collect();
        Ok(Array2::from_shape_vec((height, width), pixels)?)
    }
}

/// Axis lengths of an image HDU in `NAXISn` order.
pub fn image_axes(hdu: &Hdu) -> Option<&[usize]> {
    match &hdu.info {
        HduInfo::Primary { naxes, .. } | HduInfo::Image { naxes, .. } => Some(naxes),
        _ => None,
    }
}

pub fn bitpix(hdu: &Hdu) -> Option<i64> {
    match &hdu.info {
        HduInfo::Primary { bitpix, .. } | HduInfo::Image { bitpix, .. } => Some(*bitpix),
        _ => None,
    }
}

fn blank_pixels(raw: &ImageData, blank: i64) -> Vec<bool> {
    match raw {
        ImageData::U8(v) => v.iter().map(|&p| i64::from(p) == blank).collect(),
        ImageData::I16(v) => v.iter().map(|&p| i64::from(p) == blank).collect(),
        ImageData::I32(v) => v.iter().map(|&p| i64::from(p) == blank).collect(),
        ImageData::I64(v) => v.iter().map(|&p| p == blank).collect(),
        ImageData::F32(_) | ImageData::F64(_) => Vec::new(),
    }
}

/// Whether `keyword` describes data layout rather than content.
pub fn is_structural(keyword: &str) -> bool {
    STRUCTURAL_KEYWORDS.contains(&keyword)
        || keyword
            .strip_prefix("NAXIS")
            .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
}

/// Copy of `card` that serialises without clobbering its value.
///
/// Comments are placed after column 30, which overlaps a complex value, so complex
/// cards are written bare.
pub fn writable_card(card: &Card) -> Card {
    let mut card = card.clone();
    if matches!(
        card.value,
        Some(Value::ComplexInt(..)) | Some(Value::ComplexFloat(..))
    ) {
        card.comment = None;
    }
    card
}

/// Keyword bytes, space padded to eight.
pub fn keyword(name: &str) -> [u8; 8] {
    let mut padded = [b' '; 8];
    for (slot, byte) in padded.iter_mut().zip(name.bytes()) {
        *slot = byte;
    }
    padded
}

pub fn value_card(name: &str, value: Value, comment: Option<&str>) -> Card {
    Card {
        keyword: keyword(name),
        value: Some(value),
        comment: comment.map(str::to_string),
    }
}

pub fn comment_card(text: &str) -> Card {
    Card {
        keyword: keyword("COMMENT"),
        value: None,
        comment: Some(text.to_string()),
    }
}

/// First card for `name`.
pub fn find_card<'a>(header: &'a [Card], name: &str) -> Option<&'a Card> {
    header.iter().find(|card| card.keyword_str() == name)
}

pub fn integer_value(header: &[Card], name: &str) -> Option<i64> {
    match find_card(header, name)?.value {
        Some(Value::Integer(n)) => Some(n),
        _ => None,
    }
}

/// String value of `name` with any `CONTINUE` fragments joined.
pub fn string_value(header: &[Card], name: &str) -> Option<String> {
    let start = header.iter().position(|card| card.keyword_str() == name)?;
    let Some(Value::String(first)) = &header[start].value else {
        return None;
    };

    let mut text = first.clone();
    for card in &header[start + 1..] {
        if !text.ends_with('&') || card.keyword_str() != CONTINUE {
            break;
        }
        let Some(fragment) = card.comment.as_deref().and_then(continued_fragment) else {
            break;
        };
        text.pop();
        text.push_str(&fragment);
    }
    Some(text)
}

/// Comment of the card, or of the last `CONTINUE` card, carrying `name`.
pub fn string_comment(header: &[Card], name: &str) -> Option<String> {
    let (start, len) = string_span(header, name)?;
    if len == 1 {
        return header[start].comment.clone();
    }
    let text = header[start + len - 1].comment.as_deref()?;
    let (_, comment) = text.rsplit_once(" / ")?;
    Some(comment.trim().to_string())
}

/// Set a string keyword, replacing an existing card (and its continuation) in place.
/// A new keyword is appended.
pub fn set_string(header: &mut Header, name: &str, value: &str, comment: &str) {
    let cards = string_cards(name, value, comment);
    match string_span(header, name) {
        Some((start, len)) => {
            header.splice(start..start + len, cards);
        }
        None => header.extend(cards),
    }
}

/// Cards holding `name = 'value' / comment`, continued over `CONTINUE` cards when the
/// quoted value does not fit one card.
pub fn string_cards(name: &str, value: &str, comment: &str) -> Vec<Card> {
    if escape(value).len() <= MAX_STRING_LEN {
        return vec![value_card(name, Value::String(value.to_string()), Some(comment))];
    }

    let mut fragments = split_fragments(value);
    let last = fragments.last().map(|f| escape(f)).unwrap_or_default();
    if continue_text(&last, false).len() + 3 + comment.len() > CARD_TEXT_LEN {
        fragments.push(String::new());
    }

    let count = fragments.len();
    let mut cards = Vec::with_capacity(count);
    for (i, fragment) in fragments.iter().enumerate() {
        let continued = i + 1 < count;
        if i == 0 {
            cards.push(value_card(name, Value::String(format!("{fragment}&")), None));
        } else {
            let mut text = continue_text(&escape(fragment), continued);
            if !continued {
                text.push_str(" / ");
                text.push_str(comment);
            }
            cards.push(Card {
                keyword: keyword(CONTINUE),
                value: None,
                comment: Some(text),
            });
        }
    }
    cards
}

/// Index and card count of a string keyword including its `CONTINUE` cards.
fn string_span(header: &[Card], name: &str) -> Option<(usize, usize)> {
    let start = header.iter().position(|card| card.keyword_str() == name)?;
    let mut continued =
        matches!(&header[start].value, Some(Value::String(s)) if s.ends_with('&'));
    let mut len = 1;
    for card in &header[start + 1..] {
        if !continued || card.keyword_str() != CONTINUE {
            break;
        }
        continued = card
            .comment
            .as_deref()
            .and_then(continued_fragment)
            .is_some_and(|fragment| fragment.ends_with('&'));
        len += 1;
    }
    Some((start, len))
}

/// Quoted fragment at the start of a `CONTINUE` card's text.
fn continued_fragment(text: &str) -> Option<String> {
    let quoted = text.trim_start().strip_prefix('\'')?;
    let mut fragment = String::new();
    let mut chars = quoted.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\'' {
            fragment.push(c);
        } else if chars.peek() == Some(&'\'') {
            chars.next();
            fragment.push('\'');
        } else {
            return Some(fragment.trim_end().to_string());
        }
    }
    None
}

fn continue_text(escaped: &str, continued: bool) -> String {
    let marker = if continued { "&" } else { "" };
    format!("  '{escaped}{marker}'")
}

fn escape(text: &str) -> String {
    text.replace('\'', "''")
}

/// Split `value` so every fragment escapes to at most `FRAGMENT_LEN` bytes.
fn split_fragments(value: &str) -> Vec<String> {
    let mut fragments = Vec::new();
    let mut current = String::new();
    let mut escaped_len = 0;
    for c in value.chars() {
        let width = if c == '\'' { 2 } else { c.len_utf8() };
        if escaped_len + width > FRAGMENT_LEN {
            fragments.push(std::mem::take(&mut current));
            escaped_len = 0;
        }
        current.push(c);
        escaped_len += width;
    }
    fragments.push(current);
    fragments
}

#[cfg(test)]
mod tests {
    use super::*;
    use fitsio::header::serialize_header;

    fn reparse(header: &[Card]) -> Header {
        let mut cards = fitsio::primary::build_primary_header(8, &[]).unwrap();
        cards.extend(header.iter().cloned());
        FitsInput::from_bytes(serialize_header(&cards))
            .unwrap()
            .primary_header()
    }

    #[test]
    fn test_structural_keywords() {
        for name in ["SIMPLE", "BITPIX", "NAXIS", "NAXIS1", "NAXIS12", "BZERO", "EXTEND"] {
            assert!(is_structural(name), "{name}");
        }
        for name in ["NAXISX", "EXPTIME", "OBJECT", "COMMENT", "EXTNAME"] {
            assert!(!is_structural(name), "{name}");
        }
    }

    #[test]
    fn test_short_string_is_one_card() {
        let cards = string_cards("BIASFILE", "cal/bias.fits", "Bias image");
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].keyword_str(), "BIASFILE");
        assert_eq!(cards[0].comment.as_deref(), Some("Bias image"));
    }

    #[test]
    fn test_long_string_survives_serialisation() {
        let value = format!("/data/{}/master_bias_o'neil.fits", "night_2024_03_14/".repeat(8));
        let comment = "Bias image used to subtract bias level";
        let cards = string_cards("BIASFILE", &value, comment);
        assert!(cards.len() > 2);
        assert!(cards[1..].iter().all(|c| c.keyword_str() == CONTINUE));

        let header = reparse(&cards);
        assert_eq!(string_value(&header, "BIASFILE").as_deref(), Some(value.as_str()));
        assert_eq!(string_comment(&header, "BIASFILE").as_deref(), Some(comment));
    }

    #[test]
    fn test_set_string_replaces_in_place() {
        let long = "x".repeat(150);
        let mut header = vec![
            value_card("OBJECT", Value::String("M31".to_string()), None),
            value_card("EXPTIME", Value::Float(30.0), None),
        ];
        set_string(&mut header, "OBJECT", &long, "target");
        assert_eq!(header.last().map(Card::keyword_str), Some("EXPTIME"));
        assert_eq!(string_value(&header, "OBJECT"), Some(long));

        set_string(&mut header, "OBJECT", "M33", "target");
        assert_eq!(header.len(), 2);
        assert_eq!(string_value(&header, "OBJECT").as_deref(), Some("M33"));
        assert_eq!(string_comment(&header, "OBJECT").as_deref(), Some("target"));
    }

    #[test]
    fn test_complex_values_parse() {
        let complex = value_card("CPLX", Value::ComplexFloat(1.5, -2.0), Some("phase"));
        let header = reparse(&[
            writable_card(&complex),
            value_card("EXPTIME", Value::Integer(12), None),
        ]);
        assert_eq!(
            find_card(&header, "CPLX").and_then(|c| c.value.clone()),
            Some(Value::ComplexFloat(1.5, -2.0))
        );
        assert_eq!(integer_value(&header, "EXPTIME"), Some(12));
    }

    #[test]
    fn test_overflowing_axes_are_rejected() {
        let cards = fitsio::primary::build_primary_header(-32, &[9_000_000_000, 9_000_000_000])
            .unwrap();
        let result = FitsInput::from_bytes(serialize_header(&cards));
        assert!(matches!(result, Err(FormatError::Fits(_))));
    }

    #[test]
    fn test_first_image_skips_empty_primary() {
        let mut bytes = serialize_header(&fitsio::primary::build_primary_header(8, &[]).unwrap());
        let mut extension = fitsio::extension::build_extension_header(
            fitsio::extension::ExtensionType::Image,
            -32,
            &[2, 1],
            0,
            1,
        )
        .unwrap();
        extension.push(value_card("EXTNAME", Value::String("SCI".to_string()), None));
        bytes.extend(serialize_header(&extension));
        bytes.extend(fitsio::image::serialize_image_f32(&[1.5, -2.5]));

        let file = FitsInput::from_bytes(bytes).unwrap();
        let hdu = file.first_image_hdu().unwrap();
        assert_eq!(bitpix(hdu), Some(-32));
        assert_eq!(file.read_image(hdu).unwrap(), ndarray::array![[1.5f32, -2.5]]);
        assert!(file.find_by_name("SCI").is_some());
    }

    #[test]
    fn test_blank_pixels_become_nan() {
        let mut cards = fitsio::primary::build_primary_header(16, &[3, 1]).unwrap();
        cards.push(value_card("BLANK", Value::Integer(-1), None));
        let mut bytes = serialize_header(&cards);
        bytes.extend(fitsio::image::serialize_image_i16(&[5, -1, 7]));

        let file = FitsInput::from_bytes(bytes).unwrap();
        let image = file.read_image(file.primary()).unwrap();
        assert_eq!(image[[0, 0]], 5.0);
        assert!(image[[0, 1]].is_nan());
        assert_eq!(image[[0, 2]], 7.0);
    }
}
