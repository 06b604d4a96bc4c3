//! Encoded path codec.
//!
//! Paths arrive from the routing backend as signed-delta, 5-bit chunked
//! varint strings with three channels per point: latitude and longitude at
//! 1e5 precision, then altitude in centimeters. Decoding is lenient: a
//! truncated or malformed tail ends the path at the last complete point.

use crate::models::{GeoPoint, PathSample};

pub const COORD_PRECISION: f64 = 1e5;
pub const ALTITUDE_PRECISION: f64 = 1e2;

const CHUNK_OFFSET: u8 = 63;
const CHUNK_MAX: u8 = 126;
const CONTINUATION: i64 = 0x20;
const MAX_SHIFT: u32 = 60;

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(encoded: &'a str) -> Self {
        Self {
            bytes: encoded.as_bytes(),
            pos: 0,
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    /// Read one zigzag varint. `None` on truncation or an out-of-alphabet byte.
    fn next_value(&mut self) -> Option<i64> {
        let mut result: i64 = 0;
        let mut shift: u32 = 0;
        loop {
            let byte = *self.bytes.get(self.pos)?;
            self.pos += 1;
            if !(CHUNK_OFFSET..=CHUNK_MAX).contains(&byte) || shift > MAX_SHIFT {
                return None;
            }
            let chunk = i64::from(byte - CHUNK_OFFSET);
            result |= (chunk & 0x1f) << shift;
            shift += 5;
            if chunk < CONTINUATION {
                break;
            }
        }
        Some(if result & 1 != 0 {
            !(result >> 1)
        } else {
            result >> 1
        })
    }
}

/// Decode an encoded path into map points, discarding altitude.
pub fn decode(encoded: &str) -> Vec<GeoPoint> {
    decode_with_altitude(encoded)
        .into_iter()
        .map(|sample| sample.point)
        .collect()
}

/// Decode an encoded path keeping the altitude channel (meters).
///
/// A point is complete once latitude and longitude are read; if the string
/// ends right there the point is kept without altitude.
pub fn decode_with_altitude(encoded: &str) -> Vec<PathSample> {
    let mut cursor = Cursor::new(encoded);
    let mut samples = Vec::new();
    let (mut lat, mut lon, mut alt) = (0i64, 0i64, 0i64);

    while !cursor.at_end() {
        let Some(dlat) = cursor.next_value() else {
            break;
        };
        let Some(dlon) = cursor.next_value() else {
            break;
        };
        lat = lat.wrapping_add(dlat);
        lon = lon.wrapping_add(dlon);

        let altitude_m = if cursor.at_end() {
            None
        } else {
            match cursor.next_value() {
                Some(dalt) => {
                    alt = alt.wrapping_add(dalt);
                    Some(alt as f64 / ALTITUDE_PRECISION)
                }
                None => break,
            }
        };

        samples.push(PathSample::new(
            GeoPoint::new(lat as f64 / COORD_PRECISION, lon as f64 / COORD_PRECISION),
            altitude_m,
        ));
    }

    samples
}

/// Encode samples with the same scheme. Missing altitudes are written as 0.
pub fn encode(samples: &[PathSample]) -> String {
    let mut out = String::new();
    let (mut prev_lat, mut prev_lon, mut prev_alt) = (0i64, 0i64, 0i64);

    for sample in samples {
        let lat = (sample.point.lat * COORD_PRECISION).round() as i64;
        let lon = (sample.point.lon * COORD_PRECISION).round() as i64;
        let alt = (sample.altitude_m.unwrap_or(0.0) * ALTITUDE_PRECISION).round() as i64;

        push_value(&mut out, lat - prev_lat);
        push_value(&mut out, lon - prev_lon);
        push_value(&mut out, alt - prev_alt);

        prev_lat = lat;
        prev_lon = lon;
        prev_alt = alt;
    }

    out
}

fn push_value(out: &mut String, value: i64) {
    let mut v = (if value < 0 { !(value << 1) } else { value << 1 }) as u64;
    while v >= CONTINUATION as u64 {
        let chunk = ((v & 0x1f) | CONTINUATION as u64) as u8 + CHUNK_OFFSET;
        out.push(char::from(chunk));
        v >>= 5;
    }
    out.push(char::from(v as u8 + CHUNK_OFFSET));
}
