use std::str;

/// A little-endian byte buffer meant for reading BSON.
///
/// Example usage:
///
/// ```
/// let mut bb = bidl_bson::ByteBuffer::new(&[3, 0, 0, 0, 97, 98, 0, 1]);
/// assert_eq!(bb.read_string(), Ok("ab"));
/// assert_eq!(bb.read_bool(), Ok(true));
/// ```
///
pub struct ByteBuffer<'a> {
    data: &'a [u8],
    index: usize,
}

impl<'a> ByteBuffer<'a> {
    /// Create a new ByteBuffer that wraps the provided byte slice. The lifetime
    /// of the returned ByteBuffer must not outlive the lifetime of the byte
    /// slice.
    pub fn new(data: &[u8]) -> ByteBuffer {
        ByteBuffer { data, index: 0 }
    }

    /// Retrieves the underlying byte slice.
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Retrieves the current index into the underlying byte slice. This starts
    /// off as 0 and ends up as `self.data().len()` when everything has been
    /// read.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Number of bytes left to read.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.index
    }

    /// Try to read a boolean value starting at the current index.
    pub fn read_bool(&mut self) -> Result<bool, ()> {
        match self.read_byte() {
            Ok(0) => Ok(false),
            Ok(1) => Ok(true),
            _ => Err(()),
        }
    }

    /// Try to read a byte starting at the current index.
    pub fn read_byte(&mut self) -> Result<u8, ()> {
        if self.index >= self.data.len() {
            Err(())
        } else {
            let value = self.data[self.index];
            self.index += 1;
            Ok(value)
        }
    }

    /// Try to read `len` raw bytes starting at the current index.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], ()> {
        if self.index + len > self.data.len() {
            Err(())
        } else {
            let value = &self.data[self.index..self.index + len];
            self.index += len;
            Ok(value)
        }
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], ()> {
        let bytes = self.read_bytes(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    /// Try to read a little-endian signed 32-bit integer.
    pub fn read_i32(&mut self) -> Result<i32, ()> {
        Ok(i32::from_le_bytes(self.read_array()?))
    }

    /// Try to read a little-endian signed 64-bit integer.
    pub fn read_i64(&mut self) -> Result<i64, ()> {
        Ok(i64::from_le_bytes(self.read_array()?))
    }

    /// Try to read a little-endian unsigned 64-bit integer.
    pub fn read_u64(&mut self) -> Result<u64, ()> {
        Ok(u64::from_le_bytes(self.read_array()?))
    }

    /// Try to read a little-endian IEEE 754 double.
    pub fn read_f64(&mut self) -> Result<f64, ()> {
        Ok(f64::from_le_bytes(self.read_array()?))
    }

    /// Try to read a fixed-size byte array, e.g. an object id.
    pub fn read_fixed<const N: usize>(&mut self) -> Result<[u8; N], ()> {
        self.read_array()
    }

    /// Try to read a NUL-terminated UTF-8 string starting at the current
    /// index. The returned slice aliases the underlying memory.
    pub fn read_cstring(&mut self) -> Result<&'a str, ()> {
        let start = self.index;

        while self.index < self.data.len() {
            if self.data[self.index] == 0 {
                self.index += 1;
                return str::from_utf8(&self.data[start..self.index - 1]).map_err(|_| ());
            }

            self.index += 1;
        }

        Err(())
    }

    /// Try to read a length-prefixed UTF-8 string. The length counts the
    /// trailing NUL byte, which must be present.
    pub fn read_string(&mut self) -> Result<&'a str, ()> {
        let len = self.read_i32()?;
        if len < 1 {
            return Err(());
        }
        let bytes = self.read_bytes(len as usize)?;
        match bytes.split_last() {
            Some((0, text)) => str::from_utf8(text).map_err(|_| ()),
            _ => Err(()),
        }
    }
}

#[test]
fn read_bool() {
    let read = |bytes| ByteBuffer::new(bytes).read_bool();
    assert_eq!(read(&[]), Err(()));
    assert_eq!(read(&[0]), Ok(false));
    assert_eq!(read(&[1]), Ok(true));
    assert_eq!(read(&[2]), Err(()));
}

#[test]
fn read_bytes() {
    let read = |bytes, len| ByteBuffer::new(bytes).read_bytes(len);
    assert_eq!(read(&[], 0), Ok(vec![].as_slice()));
    assert_eq!(read(&[], 1), Err(()));
    assert_eq!(read(&[0], 1), Ok(vec![0].as_slice()));
    assert_eq!(read(&[0], 2), Err(()));

    let mut bb = ByteBuffer::new(&[1, 2, 3, 4, 5]);
    assert_eq!(bb.read_bytes(3), Ok(vec![1, 2, 3].as_slice()));
    assert_eq!(bb.read_bytes(2), Ok(vec![4, 5].as_slice()));
    assert_eq!(bb.read_bytes(1), Err(()));
}

#[test]
fn read_integers() {
    assert_eq!(ByteBuffer::new(&[1, 0, 0, 0]).read_i32(), Ok(1));
    assert_eq!(ByteBuffer::new(&[255, 255, 255, 255]).read_i32(), Ok(-1));
    assert_eq!(ByteBuffer::new(&[1, 0, 0]).read_i32(), Err(()));
    assert_eq!(
        ByteBuffer::new(&[0, 0, 0, 0, 0, 0, 0, 128]).read_i64(),
        Ok(i64::MIN)
    );
    assert_eq!(
        ByteBuffer::new(&[2, 0, 0, 0, 1, 0, 0, 0]).read_u64(),
        Ok((1u64 << 32) | 2)
    );
}

#[test]
fn read_f64() {
    let bytes = 0.5f64.to_le_bytes();
    assert_eq!(ByteBuffer::new(&bytes).read_f64(), Ok(0.5));
    assert_eq!(ByteBuffer::new(&bytes[..7]).read_f64(), Err(()));
}

#[test]
fn read_cstring() {
    let read = |bytes| ByteBuffer::new(bytes).read_cstring();
    assert_eq!(read(&[]), Err(()));
    assert_eq!(read(&[0]), Ok(""));
    assert_eq!(read(&[97]), Err(()));
    assert_eq!(read(&[97, 98, 99, 0]), Ok("abc"));
    assert_eq!(read(&[240, 159, 141, 149, 0]), Ok("🍕"));
    assert_eq!(read(&[97, 237, 160, 188, 99, 0]), Err(()));
}

#[test]
fn read_string() {
    let read = |bytes| ByteBuffer::new(bytes).read_string();
    assert_eq!(read(&[1, 0, 0, 0, 0]), Ok(""));
    assert_eq!(read(&[4, 0, 0, 0, 97, 98, 99, 0]), Ok("abc"));
    assert_eq!(read(&[3, 0, 0, 0, 97, 98, 99]), Err(()));
    assert_eq!(read(&[0, 0, 0, 0]), Err(()));
    assert_eq!(read(&[9, 0, 0, 0, 97]), Err(()));
}

#[test]
fn read_sequence() {
    let mut bb = ByteBuffer::new(&[
        0x10, 97, 0, 42, 0, 0, 0, 3, 0, 0, 0, 104, 105, 0,
    ]);
    assert_eq!(bb.read_byte(), Ok(0x10));
    assert_eq!(bb.read_cstring(), Ok("a"));
    assert_eq!(bb.read_i32(), Ok(42));
    assert_eq!(bb.read_string(), Ok("hi"));
    assert_eq!(bb.remaining(), 0);
}

/// A little-endian byte buffer meant for writing BSON.
///
/// Example usage:
///
/// ```
/// let mut bb = bidl_bson::ByteBufferMut::new();
/// bb.write_string("ab");
/// bb.write_bool(true);
/// assert_eq!(bb.data(), [3, 0, 0, 0, 97, 98, 0, 1]);
/// ```
///
#[derive(Default)]
pub struct ByteBufferMut {
    data: Vec<u8>,
}

impl ByteBufferMut {
    /// Creates an empty ByteBufferMut ready for writing.
    pub fn new() -> ByteBufferMut {
        ByteBufferMut { data: vec![] }
    }

    /// Consumes this buffer and returns the underlying backing store. Use this
    /// to get the data out when you're done writing to the buffer.
    pub fn data(self) -> Vec<u8> {
        self.data
    }

    /// Returns the number of bytes written so far.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Write a boolean value to the end of the buffer.
    pub fn write_bool(&mut self, value: bool) {
        self.data.push(if value { 1 } else { 0 });
    }

    /// Write a byte to the end of the buffer.
    pub fn write_byte(&mut self, value: u8) {
        self.data.push(value);
    }

    /// Write a raw byte slice to the end of the buffer.
    pub fn write_bytes(&mut self, value: &[u8]) {
        self.data.extend_from_slice(value);
    }

    pub fn write_i32(&mut self, value: i32) {
        self.data.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_i64(&mut self, value: i64) {
        self.data.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_u64(&mut self, value: u64) {
        self.data.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_f64(&mut self, value: f64) {
        self.data.extend_from_slice(&value.to_le_bytes());
    }

    /// Write a NUL-terminated string. Interior NUL bytes are not checked here;
    /// element names containing them cannot round trip.
    pub fn write_cstring(&mut self, value: &str) {
        self.data.extend_from_slice(value.as_bytes());
        self.data.push(0);
    }

    /// Write a length-prefixed, NUL-terminated string.
    pub fn write_string(&mut self, value: &str) {
        self.write_i32(value.len() as i32 + 1);
        self.write_cstring(value);
    }

    /// Reserve four bytes for a length prefix and return their offset.
    pub fn reserve_length(&mut self) -> usize {
        let offset = self.data.len();
        self.write_i32(0);
        offset
    }

    /// Fill a slot from [reserve_length](#method.reserve_length) with the
    /// number of bytes written since the slot began.
    pub fn backpatch_length(&mut self, offset: usize) {
        let len = (self.data.len() - offset) as i32;
        self.data[offset..offset + 4].copy_from_slice(&len.to_le_bytes());
    }
}

#[cfg(test)]
fn write_once(cb: fn(&mut ByteBufferMut)) -> Vec<u8> {
    let mut bb = ByteBufferMut::new();
    cb(&mut bb);
    bb.data()
}

#[test]
fn write_bool() {
    assert_eq!(write_once(|bb| bb.write_bool(false)), [0]);
    assert_eq!(write_once(|bb| bb.write_bool(true)), [1]);
}

#[test]
fn write_integers() {
    assert_eq!(write_once(|bb| bb.write_i32(1)), [1, 0, 0, 0]);
    assert_eq!(write_once(|bb| bb.write_i32(-1)), [255, 255, 255, 255]);
    assert_eq!(
        write_once(|bb| bb.write_i64(i64::MIN)),
        [0, 0, 0, 0, 0, 0, 0, 128]
    );
    assert_eq!(
        write_once(|bb| bb.write_u64((1u64 << 32) | 2)),
        [2, 0, 0, 0, 1, 0, 0, 0]
    );
}

#[test]
fn write_strings() {
    assert_eq!(write_once(|bb| bb.write_cstring("")), [0]);
    assert_eq!(write_once(|bb| bb.write_cstring("abc")), [97, 98, 99, 0]);
    assert_eq!(
        write_once(|bb| bb.write_string("abc")),
        [4, 0, 0, 0, 97, 98, 99, 0]
    );
}

#[test]
fn write_backpatched_length() {
    let mut bb = ByteBufferMut::new();
    let offset = bb.reserve_length();
    bb.write_byte(0);
    bb.backpatch_length(offset);
    assert_eq!(bb.data(), [5, 0, 0, 0, 0]);
}

#[test]
fn write_sequence() {
    let mut bb = ByteBufferMut::new();
    bb.write_byte(0x10);
    bb.write_cstring("a");
    bb.write_i32(42);
    bb.write_string("hi");
    assert_eq!(
        bb.data(),
        [0x10, 97, 0, 42, 0, 0, 0, 3, 0, 0, 0, 104, 105, 0]
    );
}
