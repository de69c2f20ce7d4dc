//! Well-known text reader and writer for (multi)polygons.

use std::fmt::Write;

use geo::{Coord, LineString, MultiPolygon, Polygon};

use super::{validate_ring, GeometryFormat, GeometryParser};
use crate::error::GeometryParseError;

/// Parser for `MULTIPOLYGON(...)` text. A bare `POLYGON(...)` is accepted
/// and promoted to a one-member multi-polygon.
#[derive(Debug, Clone, Copy, Default)]
pub struct WktParser;

impl GeometryParser for WktParser {
    fn format(&self) -> GeometryFormat {
        GeometryFormat::Wkt
    }

    fn parse(&self, raw: &str) -> Result<MultiPolygon<f64>, GeometryParseError> {
        parse_wkt(raw)
    }
}

/// Parse WKT text into a multi-polygon.
///
/// Accepts an optional `SRID=<n>;` prefix and is case-insensitive on
/// keywords. Only 2D coordinates are supported.
pub fn parse_wkt(raw: &str) -> Result<MultiPolygon<f64>, GeometryParseError> {
    let mut cursor = Cursor::new(raw);

    cursor.skip_srid()?;

    let tag_offset = cursor.pos;
    let tag = cursor.keyword();
    let geometry = match tag.to_ascii_uppercase().as_str() {
        "MULTIPOLYGON" => {
            cursor.reject_modifiers()?;
            cursor.multipolygon()?
        }
        "POLYGON" => {
            cursor.reject_modifiers()?;
            MultiPolygon::new(vec![cursor.polygon()?])
        }
        "" => return Err(GeometryParseError::new(tag_offset, "expected geometry type")),
        other => {
            return Err(GeometryParseError::new(
                tag_offset,
                format!("unsupported geometry type '{}'", other),
            ))
        }
    };

    cursor.skip_ws();
    if !cursor.at_end() {
        return Err(cursor.error("unexpected trailing characters"));
    }

    Ok(geometry)
}

/// Serialize a multi-polygon as WKT. Ordinates use the shortest
/// representation that parses back to the same f64.
pub fn to_wkt(geometry: &MultiPolygon<f64>) -> String {
    let mut out = String::from("MULTIPOLYGON(");
    for (i, polygon) in geometry.0.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push('(');
        write_ring(&mut out, polygon.exterior());
        for hole in polygon.interiors() {
            out.push(',');
            write_ring(&mut out, hole);
        }
        out.push(')');
    }
    out.push(')');
    out
}

fn write_ring(out: &mut String, ring: &LineString<f64>) {
    out.push('(');
    for (i, c) in ring.0.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        // Writing to a String cannot fail.
        let _ = write!(out, "{} {}", c.x, c.y);
    }
    out.push(')');
}

struct Cursor<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }

    fn error(&self, message: impl Into<String>) -> GeometryParseError {
        GeometryParseError::new(self.pos, message)
    }

    fn peek(&self) -> Option<u8> {
        self.text.as_bytes().get(self.pos).copied()
    }

    fn at_end(&self) -> bool {
        self.pos >= self.text.len()
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(b) if b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn take_while(&mut self, pred: impl Fn(u8) -> bool) -> &'a str {
        let start = self.pos;
        while matches!(self.peek(), Some(b) if pred(b)) {
            self.pos += 1;
        }
        &self.text[start..self.pos]
    }

    fn keyword(&mut self) -> &'a str {
        self.skip_ws();
        self.take_while(|b| b.is_ascii_alphabetic())
    }

    fn expect(&mut self, byte: u8) -> Result<(), GeometryParseError> {
        self.skip_ws();
        match self.peek() {
            Some(b) if b == byte => {
                self.pos += 1;
                Ok(())
            }
            Some(b) => Err(self.error(format!(
                "expected '{}', found '{}'",
                byte as char, b as char
            ))),
            None => Err(self.error(format!(
                "expected '{}', found end of input",
                byte as char
            ))),
        }
    }

    /// Consume a `,` (returns true) or a closing `)` (returns false).
    fn separator(&mut self) -> Result<bool, GeometryParseError> {
        self.skip_ws();
        match self.peek() {
            Some(b',') => {
                self.pos += 1;
                Ok(true)
            }
            Some(b')') => {
                self.pos += 1;
                Ok(false)
            }
            Some(b) => Err(self.error(format!("expected ',' or ')', found '{}'", b as char))),
            None => Err(self.error("unbalanced parentheses")),
        }
    }

    fn skip_srid(&mut self) -> Result<(), GeometryParseError> {
        self.skip_ws();
        let rest = &self.text.as_bytes()[self.pos..];
        if rest.get(..5).is_some_and(|p| p.eq_ignore_ascii_case(b"SRID=")) {
            self.pos += 5;
            let digits = self.take_while(|b| b.is_ascii_digit());
            if digits.is_empty() {
                return Err(self.error("expected SRID number"));
            }
            self.expect(b';')?;
        }
        Ok(())
    }

    /// Reject `EMPTY` and dimension markers (`Z`, `M`, `ZM`) after the tag.
    fn reject_modifiers(&mut self) -> Result<(), GeometryParseError> {
        let offset = self.pos;
        let word = self.keyword();
        match word.to_ascii_uppercase().as_str() {
            "" => Ok(()),
            "EMPTY" => Err(GeometryParseError::new(
                offset,
                "empty geometry has no polygons",
            )),
            _ => Err(GeometryParseError::new(
                offset,
                format!("only 2D coordinates are supported, found '{}'", word),
            )),
        }
    }

    fn multipolygon(&mut self) -> Result<MultiPolygon<f64>, GeometryParseError> {
        self.expect(b'(')?;
        let mut polygons = Vec::new();
        loop {
            polygons.push(self.polygon()?);
            if !self.separator()? {
                break;
            }
        }
        Ok(MultiPolygon::new(polygons))
    }

    fn polygon(&mut self) -> Result<Polygon<f64>, GeometryParseError> {
        self.expect(b'(')?;
        let exterior = self.ring()?;
        let mut interiors = Vec::new();
        while self.separator()? {
            interiors.push(self.ring()?);
        }
        Ok(Polygon::new(exterior, interiors))
    }

    fn ring(&mut self) -> Result<LineString<f64>, GeometryParseError> {
        self.skip_ws();
        let start = self.pos;
        self.expect(b'(')?;
        let mut coords = Vec::new();
        loop {
            coords.push(self.point()?);
            if !self.separator()? {
                break;
            }
        }
        validate_ring(coords, start)
    }

    fn point(&mut self) -> Result<Coord<f64>, GeometryParseError> {
        let x = self.number()?;
        self.skip_ws();
        if !self.peek().is_some_and(is_number_start) {
            return Err(self.error("point needs 2 ordinates"));
        }
        let y = self.number()?;
        self.skip_ws();
        if self.peek().is_some_and(is_number_start) {
            return Err(self.error("point has more than 2 ordinates"));
        }
        Ok(Coord { x, y })
    }

    fn number(&mut self) -> Result<f64, GeometryParseError> {
        self.skip_ws();
        let start = self.pos;
        let token =
            self.take_while(|b| b.is_ascii_digit() || matches!(b, b'-' | b'+' | b'.' | b'e' | b'E'));
        if token.is_empty() {
            return Err(match self.peek() {
                Some(b) => GeometryParseError::new(start, format!("expected number, found '{}'", b as char)),
                None => GeometryParseError::new(start, "expected number, found end of input"),
            });
        }
        token
            .parse::<f64>()
            .map_err(|_| GeometryParseError::new(start, format!("invalid number '{}'", token)))
    }
}

fn is_number_start(b: u8) -> bool {
    b.is_ascii_digit() || matches!(b, b'-' | b'+' | b'.')
}
