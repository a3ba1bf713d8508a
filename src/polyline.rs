use thiserror::Error;

use crate::geo::GeoPoint;

/* Decoder for the compact path encoding used by routing providers: each
coordinate is stored as a delta against the previous one, zigzag-encoded and
packed into printable characters, 5 bits per character with bit 0x20 marking
continuation. Coordinates are scaled by 1e5 before encoding. */

const PRECISION: f64 = 1e5;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("polyline ends in the middle of a coordinate (byte {0})")]
    PrematureEnd(usize),
    #[error("invalid polyline character {0:?} at byte {1}")]
    InvalidChar(char, usize),
    #[error("coordinate delta at byte {0} is too long")]
    OverlongDelta(usize),
}

/// Decodes an encoded path into an ordered coordinate sequence. Deterministic
/// for well-formed input. An empty string decodes to an empty sequence, it is
/// up to the caller to reject that where a route is required.
pub fn decode(encoded: &str) -> Result<Vec<GeoPoint>, DecodeError> {
    let bytes = encoded.as_bytes();
    let mut points = Vec::new();
    let mut pos = 0;
    let mut lat: i64 = 0;
    let mut lng: i64 = 0;
    while pos < bytes.len() {
        lat += next_delta(bytes, &mut pos)?;
        lng += next_delta(bytes, &mut pos)?;
        points.push(GeoPoint {
            latitude: lat as f64 / PRECISION,
            longitude: lng as f64 / PRECISION,
        });
    }
    Ok(points)
}

fn next_delta(bytes: &[u8], pos: &mut usize) -> Result<i64, DecodeError> {
    let start = *pos;
    let mut value: u64 = 0;
    let mut shift: u32 = 0;
    loop {
        let byte = match bytes.get(*pos) {
            Some(byte) => *byte,
            None => return Err(DecodeError::PrematureEnd(start)),
        };
        if !(63..=126).contains(&byte) {
            return Err(DecodeError::InvalidChar(byte as char, *pos));
        }
        // a lat/lng delta fits well within 64 bits, anything longer is garbage
        if shift >= 64 {
            return Err(DecodeError::OverlongDelta(start));
        }
        *pos += 1;
        let chunk = (byte - 63) as u64;
        value |= (chunk & 0x1f) << shift;
        shift += 5;
        if chunk & 0x20 == 0 {
            break;
        }
    }
    // zigzag: lowest bit holds the sign
    if value & 1 == 1 {
        Ok(!(value >> 1) as i64)
    } else {
        Ok((value >> 1) as i64)
    }
}
