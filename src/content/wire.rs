use std::io::{self, Read, Write};

use crate::error::{Result, TiledError};
use crate::geometry::{Color, Rect, Vector2};
use crate::properties::Properties;

/// Upper bound on speculative allocations driven by counts read from a stream.
const MAX_PREALLOCATION: usize = 4096;

fn malformed(err: io::Error) -> TiledError {
    match err.kind() {
        io::ErrorKind::UnexpectedEof => {
            TiledError::MalformedStream("unexpected end of stream".to_string())
        }
        _ => TiledError::Io(err),
    }
}

/// Little-endian primitive reader for compiled map assets.
pub struct ContentReader<R> {
    inner: R,
}

impl<R: Read> ContentReader<R> {
    pub fn new(inner: R) -> Self {
        ContentReader { inner }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        self.inner.read_exact(&mut buf).map_err(malformed)?;
        Ok(buf)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(i32::from_le_bytes(self.read_array()?))
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(f32::from_le_bytes(self.read_array()?))
    }

    /// Read an `int32` that must not be negative (counts, sizes, ids).
    pub fn read_u32(&mut self, what: &str) -> Result<u32> {
        let value = self.read_i32()?;
        u32::try_from(value)
            .map_err(|_| TiledError::MalformedStream(format!("negative {what}: {value}")))
    }

    /// Read a non-negative element count and a capacity hint safe to preallocate.
    pub fn read_count(&mut self, what: &str) -> Result<(usize, usize)> {
        let count = self.read_u32(what)? as usize;
        Ok((count, count.min(MAX_PREALLOCATION)))
    }

    /// Read a 7-bit variable-length encoded `u32` (at most five bytes).
    pub fn read_7bit_u32(&mut self) -> Result<u32> {
        let mut value = 0u32;
        for i in 0..5 {
            let byte = self.read_u8()?;
            value |= u32::from(byte & 0x7F) << (7 * i);
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(TiledError::MalformedStream(
            "string length prefix longer than five bytes".to_string(),
        ))
    }

    pub fn read_string(&mut self) -> Result<String> {
        let len = self.read_7bit_u32()? as usize;
        let mut bytes = Vec::with_capacity(len.min(MAX_PREALLOCATION));
        (&mut self.inner)
            .take(len as u64)
            .read_to_end(&mut bytes)
            .map_err(malformed)?;
        if bytes.len() != len {
            return Err(TiledError::MalformedStream(format!(
                "string truncated: expected {len} bytes, found {}",
                bytes.len()
            )));
        }
        String::from_utf8(bytes)
            .map_err(|e| TiledError::MalformedStream(format!("string is not UTF-8: {e}")))
    }

    pub fn read_color(&mut self) -> Result<Color> {
        let [r, g, b, a] = self.read_array::<4>()?;
        Ok(Color::rgba(r, g, b, a))
    }

    pub fn read_vector2(&mut self) -> Result<Vector2> {
        Ok(Vector2::new(self.read_f32()?, self.read_f32()?))
    }

    pub fn read_rect(&mut self) -> Result<Rect> {
        Ok(Rect::new(
            self.read_i32()?,
            self.read_i32()?,
            self.read_i32()?,
            self.read_i32()?,
        ))
    }

    /// Read a property block into `properties`; duplicate keys keep the last value.
    pub fn read_properties(&mut self, properties: &mut Properties) -> Result<()> {
        let (count, _) = self.read_count("property count")?;
        for _ in 0..count {
            let key = self.read_string()?;
            let value = self.read_string()?;
            properties.insert(key, value);
        }
        Ok(())
    }
}

/// Little-endian primitive writer, the exact dual of [`ContentReader`].
pub struct ContentWriter<W> {
    inner: W,
}

impl<W: Write> ContentWriter<W> {
    pub fn new(inner: W) -> Self {
        ContentWriter { inner }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }

    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        self.inner.write_all(&[value])?;
        Ok(())
    }

    pub fn write_bool(&mut self, value: bool) -> Result<()> {
        self.write_u8(u8::from(value))
    }

    pub fn write_i32(&mut self, value: i32) -> Result<()> {
        self.inner.write_all(&value.to_le_bytes())?;
        Ok(())
    }

    pub fn write_f32(&mut self, value: f32) -> Result<()> {
        self.inner.write_all(&value.to_le_bytes())?;
        Ok(())
    }

    /// Write an unsigned value as `int32`, failing if it does not fit.
    pub fn write_u32(&mut self, value: u32, what: &str) -> Result<()> {
        let value = i32::try_from(value).map_err(|_| {
            TiledError::InvariantViolation(format!("{what} {value} does not fit in an int32"))
        })?;
        self.write_i32(value)
    }

    pub fn write_count(&mut self, count: usize, what: &str) -> Result<()> {
        let count = u32::try_from(count).map_err(|_| {
            TiledError::InvariantViolation(format!("{what} {count} does not fit in an int32"))
        })?;
        self.write_u32(count, what)
    }

    pub fn write_7bit_u32(&mut self, mut value: u32) -> Result<()> {
        while value >= 0x80 {
            self.write_u8((value as u8 & 0x7F) | 0x80)?;
            value >>= 7;
        }
        self.write_u8(value as u8)
    }

    pub fn write_string(&mut self, value: &str) -> Result<()> {
        let len = u32::try_from(value.len()).map_err(|_| {
            TiledError::InvariantViolation("string longer than 4 GiB".to_string())
        })?;
        self.write_7bit_u32(len)?;
        self.inner.write_all(value.as_bytes())?;
        Ok(())
    }

    pub fn write_color(&mut self, color: Color) -> Result<()> {
        self.inner.write_all(&[color.r, color.g, color.b, color.a])?;
        Ok(())
    }

    pub fn write_vector2(&mut self, value: Vector2) -> Result<()> {
        self.write_f32(value.x)?;
        self.write_f32(value.y)
    }

    pub fn write_rect(&mut self, rect: Rect) -> Result<()> {
        self.write_i32(rect.x)?;
        self.write_i32(rect.y)?;
        self.write_i32(rect.width)?;
        self.write_i32(rect.height)
    }

    /// Write a property block with keys in sorted order.
    pub fn write_properties(&mut self, properties: &Properties) -> Result<()> {
        self.write_count(properties.len(), "property count")?;
        for (key, value) in properties.sorted() {
            self.write_string(key)?;
            self.write_string(value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reader(bytes: &[u8]) -> ContentReader<&[u8]> {
        ContentReader::new(bytes)
    }

    #[test]
    fn seven_bit_lengths_match_known_encodings() {
        let mut w = ContentWriter::new(Vec::new());
        w.write_7bit_u32(127).unwrap();
        w.write_7bit_u32(128).unwrap();
        w.write_7bit_u32(300).unwrap();
        assert_eq!(w.into_inner(), vec![0x7F, 0x80, 0x01, 0xAC, 0x02]);
    }

    #[test]
    fn strings_are_length_prefixed_utf8() {
        let mut w = ContentWriter::new(Vec::new());
        w.write_string("héllo").unwrap();
        let bytes = w.into_inner();
        assert_eq!(bytes[0], 6);
        assert_eq!(reader(&bytes).read_string().unwrap(), "héllo");
    }

    #[test]
    fn integers_are_little_endian() {
        let mut w = ContentWriter::new(Vec::new());
        w.write_i32(0x0102_0304).unwrap();
        assert_eq!(w.into_inner(), vec![4, 3, 2, 1]);
    }

    #[test]
    fn truncation_is_malformed() {
        assert!(matches!(
            reader(&[1, 2]).read_i32(),
            Err(TiledError::MalformedStream(_))
        ));
        assert!(matches!(
            reader(&[5, b'a', b'b']).read_string(),
            Err(TiledError::MalformedStream(_))
        ));
        assert!(matches!(
            reader(&[0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x01]).read_7bit_u32(),
            Err(TiledError::MalformedStream(_))
        ));
    }

    #[test]
    fn negative_counts_are_malformed() {
        let bytes = (-1i32).to_le_bytes();
        assert!(matches!(
            reader(&bytes).read_count("tile count"),
            Err(TiledError::MalformedStream(msg)) if msg.contains("tile count")
        ));
    }

    #[test]
    fn duplicate_property_keys_keep_last_value() {
        let mut w = ContentWriter::new(Vec::new());
        w.write_i32(2).unwrap();
        for value in ["first", "second"] {
            w.write_string("key").unwrap();
            w.write_string(value).unwrap();
        }
        let bytes = w.into_inner();

        let mut props = Properties::new();
        reader(&bytes).read_properties(&mut props).unwrap();
        assert_eq!(props.len(), 1);
        assert_eq!(props.get("key"), Some("second"));
    }
}
