//! NumPy `.npy` codec for floating-point arrays.
//!
//! Decoding accepts format versions 1.0 through 3.0, `f2`/`f4`/`f8` in either byte order,
//! and C- or Fortran-ordered 2-D data. Values are widened or narrowed to `f32` and always
//! returned in row-major order. Encoding writes version 1.0, `<f4`, C order, with the header
//! padded to a 64-byte boundary the way NumPy does.

use half::f16;

use super::error::NpyError;

pub const NPY_MAGIC: &[u8; 6] = b"\x93NUMPY";

const HEADER_ALIGNMENT: usize = 64;

/// Magic + version + 2-byte header length.
const V1_PREAMBLE_LEN: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dtype {
    F16,
    F32,
    F64,
}

impl Dtype {
    pub fn size(self) -> usize {
        match self {
            Dtype::F16 => 2,
            Dtype::F32 => 4,
            Dtype::F64 => 8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    Little,
    Big,
}

impl ByteOrder {
    fn native() -> Self {
        if cfg!(target_endian = "little") {
            ByteOrder::Little
        } else {
            ByteOrder::Big
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NpyHeader {
    pub dtype: Dtype,
    pub byte_order: ByteOrder,
    pub fortran_order: bool,
    pub shape: Vec<usize>,
}

impl NpyHeader {
    /// Number of elements implied by the shape (1 for a scalar).
    pub fn element_count(&self) -> Option<usize> {
        self.shape
            .iter()
            .try_fold(1usize, |acc, &dim| acc.checked_mul(dim))
    }
}

/// A decoded array, row-major `f32`.
#[derive(Debug, Clone, PartialEq)]
pub struct NpyArray {
    shape: Vec<usize>,
    data: Vec<f32>,
}

impl NpyArray {
    pub fn new(shape: Vec<usize>, data: Vec<f32>) -> Result<Self, NpyError> {
        let expected = shape
            .iter()
            .try_fold(1usize, |acc, &dim| acc.checked_mul(dim));
        if expected != Some(data.len()) {
            return Err(NpyError::ShapeMismatch {
                shape,
                len: data.len(),
            });
        }
        Ok(Self { shape, data })
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn into_data(self) -> Vec<f32> {
        self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Decodes a complete `.npy` payload.
pub fn decode(bytes: &[u8]) -> Result<NpyArray, NpyError> {
    let (header, body) = split_header(bytes)?;

    let count = header
        .element_count()
        .ok_or_else(|| NpyError::MalformedHeader(format!("shape {:?} overflows", header.shape)))?;
    let expected = count
        .checked_mul(header.dtype.size())
        .ok_or_else(|| NpyError::MalformedHeader("payload size overflows".to_string()))?;

    if body.len() < expected {
        return Err(NpyError::Truncated {
            expected,
            actual: body.len(),
        });
    }

    let values = decode_values(&body[..expected], header.dtype, header.byte_order);

    let data = if header.fortran_order {
        match header.shape.as_slice() {
            [] | [_] => values,
            [rows, cols] => transpose_column_major(&values, *rows, *cols),
            _ => {
                return Err(NpyError::UnsupportedLayout {
                    ndim: header.shape.len(),
                });
            }
        }
    } else {
        values
    };

    NpyArray::new(header.shape, data)
}

/// Reads only the header of a `.npy` payload.
pub fn read_header(bytes: &[u8]) -> Result<NpyHeader, NpyError> {
    split_header(bytes).map(|(header, _)| header)
}

/// Encodes `data` with the given shape as a version 1.0 `<f4` payload.
pub fn encode(shape: &[usize], data: &[f32]) -> Result<Vec<u8>, NpyError> {
    let expected = shape
        .iter()
        .try_fold(1usize, |acc, &dim| acc.checked_mul(dim));
    if expected != Some(data.len()) {
        return Err(NpyError::ShapeMismatch {
            shape: shape.to_vec(),
            len: data.len(),
        });
    }

    let dict = format!(
        "{{'descr': '<f4', 'fortran_order': False, 'shape': {}, }}",
        shape_literal(shape)
    );
    let unpadded = V1_PREAMBLE_LEN + dict.len() + 1;
    let padding = (HEADER_ALIGNMENT - unpadded % HEADER_ALIGNMENT) % HEADER_ALIGNMENT;
    let header_len = dict.len() + padding + 1;
    let header_len = u16::try_from(header_len)
        .map_err(|_| NpyError::MalformedHeader("header exceeds 65535 bytes".to_string()))?;

    let mut out = Vec::with_capacity(V1_PREAMBLE_LEN + header_len as usize + data.len() * 4);
    out.extend_from_slice(NPY_MAGIC);
    out.extend_from_slice(&[1, 0]);
    out.extend_from_slice(&header_len.to_le_bytes());
    out.extend_from_slice(dict.as_bytes());
    out.extend(std::iter::repeat_n(b' ', padding));
    out.push(b'\n');

    if cfg!(target_endian = "little") {
        out.extend_from_slice(bytemuck::cast_slice(data));
    } else {
        for value in data {
            out.extend_from_slice(&value.to_le_bytes());
        }
    }

    Ok(out)
}

fn split_header(bytes: &[u8]) -> Result<(NpyHeader, &[u8]), NpyError> {
    if bytes.len() < 8 || &bytes[..6] != NPY_MAGIC {
        return Err(NpyError::BadMagic);
    }

    let (major, minor) = (bytes[6], bytes[7]);
    let (len_width, utf8) = match major {
        1 => (2, false),
        2 => (4, false),
        3 => (4, true),
        _ => return Err(NpyError::UnsupportedVersion { major, minor }),
    };

    let len_end = 8 + len_width;
    if bytes.len() < len_end {
        return Err(NpyError::Truncated {
            expected: len_end,
            actual: bytes.len(),
        });
    }

    let header_len = if len_width == 2 {
        u16::from_le_bytes([bytes[8], bytes[9]]) as usize
    } else {
        u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize
    };

    let header_end = len_end + header_len;
    if bytes.len() < header_end {
        return Err(NpyError::Truncated {
            expected: header_end,
            actual: bytes.len(),
        });
    }

    let raw = &bytes[len_end..header_end];
    let text = if utf8 {
        std::str::from_utf8(raw).map_err(|e| NpyError::MalformedHeader(e.to_string()))?
    } else {
        if !raw.is_ascii() {
            return Err(NpyError::MalformedHeader(
                "non-ASCII header in a version 1/2 file".to_string(),
            ));
        }
        std::str::from_utf8(raw).map_err(|e| NpyError::MalformedHeader(e.to_string()))?
    };

    let header = parse_header(text)?;
    Ok((header, &bytes[header_end..]))
}

fn parse_header(text: &str) -> Result<NpyHeader, NpyError> {
    let descr = field_value(text, "descr")
        .and_then(quoted)
        .ok_or_else(|| NpyError::MalformedHeader("missing 'descr'".to_string()))?;
    let (dtype, byte_order) = parse_descr(descr)?;

    let fortran_order = match field_value(text, "fortran_order") {
        Some(rest) if rest.starts_with("True") => true,
        Some(rest) if rest.starts_with("False") => false,
        _ => {
            return Err(NpyError::MalformedHeader(
                "missing 'fortran_order'".to_string(),
            ));
        }
    };

    let shape = field_value(text, "shape")
        .ok_or_else(|| NpyError::MalformedHeader("missing 'shape'".to_string()))
        .and_then(parse_shape)?;

    Ok(NpyHeader {
        dtype,
        byte_order,
        fortran_order,
        shape,
    })
}

/// Returns the text following `'key':`, left-trimmed.
fn field_value<'a>(text: &'a str, key: &str) -> Option<&'a str> {
    let single = format!("'{}'", key);
    let double = format!("\"{}\"", key);
    let start = text
        .find(&single)
        .map(|i| i + single.len())
        .or_else(|| text.find(&double).map(|i| i + double.len()))?;
    let rest = text[start..].trim_start();
    let rest = rest.strip_prefix(':')?;
    Some(rest.trim_start())
}

fn quoted(rest: &str) -> Option<&str> {
    let quote = rest.chars().next().filter(|c| *c == '\'' || *c == '"')?;
    let inner = &rest[1..];
    let end = inner.find(quote)?;
    Some(&inner[..end])
}

fn parse_descr(descr: &str) -> Result<(Dtype, ByteOrder), NpyError> {
    let unsupported = || NpyError::UnsupportedDtype(descr.to_string());

    let (order, kind) = match descr.chars().next() {
        Some('<') => (ByteOrder::Little, &descr[1..]),
        Some('>') => (ByteOrder::Big, &descr[1..]),
        Some('=') => (ByteOrder::native(), &descr[1..]),
        Some('|') => return Err(unsupported()),
        Some(_) => (ByteOrder::native(), descr),
        None => return Err(unsupported()),
    };

    let dtype = match kind {
        "f2" => Dtype::F16,
        "f4" => Dtype::F32,
        "f8" => Dtype::F64,
        _ => return Err(unsupported()),
    };

    Ok((dtype, order))
}

fn parse_shape(rest: &str) -> Result<Vec<usize>, NpyError> {
    let open = rest
        .strip_prefix('(')
        .ok_or_else(|| NpyError::MalformedHeader("shape is not a tuple".to_string()))?;
    let close = open
        .find(')')
        .ok_or_else(|| NpyError::MalformedHeader("unterminated shape tuple".to_string()))?;

    open[..close]
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            // Python 2 era files may carry a trailing `L` on longs.
            part.trim_end_matches('L')
                .parse::<usize>()
                .map_err(|e| NpyError::MalformedHeader(format!("bad dimension '{}': {}", part, e)))
        })
        .collect()
}

fn shape_literal(shape: &[usize]) -> String {
    match shape {
        [] => "()".to_string(),
        [only] => format!("({},)", only),
        dims => {
            let parts: Vec<String> = dims.iter().map(|d| d.to_string()).collect();
            format!("({})", parts.join(", "))
        }
    }
}

fn decode_values(body: &[u8], dtype: Dtype, order: ByteOrder) -> Vec<f32> {
    let native = order == ByteOrder::native();

    match dtype {
        Dtype::F32 => {
            if native && let Ok(values) = bytemuck::try_cast_slice::<u8, f32>(body) {
                return values.to_vec();
            }
            body.chunks_exact(4)
                .map(|c| {
                    let raw = [c[0], c[1], c[2], c[3]];
                    match order {
                        ByteOrder::Little => f32::from_le_bytes(raw),
                        ByteOrder::Big => f32::from_be_bytes(raw),
                    }
                })
                .collect()
        }
        Dtype::F16 => {
            if native && let Ok(values) = bytemuck::try_cast_slice::<u8, f16>(body) {
                return values.iter().map(|v| v.to_f32()).collect();
            }
            body.chunks_exact(2)
                .map(|c| {
                    let raw = [c[0], c[1]];
                    match order {
                        ByteOrder::Little => f16::from_le_bytes(raw),
                        ByteOrder::Big => f16::from_be_bytes(raw),
                    }
                    .to_f32()
                })
                .collect()
        }
        Dtype::F64 => body
            .chunks_exact(8)
            .map(|c| {
                let raw = [c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]];
                match order {
                    ByteOrder::Little => f64::from_le_bytes(raw),
                    ByteOrder::Big => f64::from_be_bytes(raw),
                }
            })
            .map(|v| v as f32)
            .collect(),
    }
}

fn transpose_column_major(values: &[f32], rows: usize, cols: usize) -> Vec<f32> {
    let mut out = Vec::with_capacity(values.len());
    for r in 0..rows {
        for c in 0..cols {
            out.push(values[c * rows + r]);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_npy(descr: &str, fortran: bool, shape: &str, body: &[u8]) -> Vec<u8> {
        let dict = format!(
            "{{'descr': '{}', 'fortran_order': {}, 'shape': {}, }}\n",
            descr,
            if fortran { "True" } else { "False" },
            shape
        );
        let mut out = Vec::new();
        out.extend_from_slice(NPY_MAGIC);
        out.extend_from_slice(&[1, 0]);
        out.extend_from_slice(&(dict.len() as u16).to_le_bytes());
        out.extend_from_slice(dict.as_bytes());
        out.extend_from_slice(body);
        out
    }

    #[test]
    fn test_encode_then_decode_matrix() {
        let data = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let bytes = encode(&[2, 3], &data).unwrap();

        let array = decode(&bytes).unwrap();
        assert_eq!(array.shape(), &[2, 3]);
        assert_eq!(array.data(), data.as_slice());
    }

    #[test]
    fn test_encoded_header_is_aligned() {
        let bytes = encode(&[1, 512], &vec![0.5; 512]).unwrap();
        let header_len = u16::from_le_bytes([bytes[8], bytes[9]]) as usize;
        assert_eq!((V1_PREAMBLE_LEN + header_len) % HEADER_ALIGNMENT, 0);
        assert_eq!(bytes[V1_PREAMBLE_LEN + header_len - 1], b'\n');
    }

    #[test]
    fn test_encode_shape_literals() {
        assert_eq!(shape_literal(&[]), "()");
        assert_eq!(shape_literal(&[7]), "(7,)");
        assert_eq!(shape_literal(&[3, 512]), "(3, 512)");
    }

    #[test]
    fn test_encode_rejects_shape_mismatch() {
        let err = encode(&[2, 2], &[1.0, 2.0, 3.0]).unwrap_err();
        assert!(matches!(err, NpyError::ShapeMismatch { len: 3, .. }));
    }

    #[test]
    fn test_decode_f64_little_endian() {
        let body: Vec<u8> = [0.25f64, -1.5].iter().flat_map(|v| v.to_le_bytes()).collect();
        let array = decode(&raw_npy("<f8", false, "(2,)", &body)).unwrap();
        assert_eq!(array.shape(), &[2]);
        assert_eq!(array.data(), &[0.25, -1.5]);
    }

    #[test]
    fn test_decode_f32_big_endian() {
        let body: Vec<u8> = [3.0f32, 4.0].iter().flat_map(|v| v.to_be_bytes()).collect();
        let array = decode(&raw_npy(">f4", false, "(1, 2)", &body)).unwrap();
        assert_eq!(array.data(), &[3.0, 4.0]);
    }

    #[test]
    fn test_decode_f16() {
        let body: Vec<u8> = [0.5f32, 2.0]
            .iter()
            .flat_map(|v| f16::from_f32(*v).to_le_bytes())
            .collect();
        let array = decode(&raw_npy("<f2", false, "(2,)", &body)).unwrap();
        assert_eq!(array.data(), &[0.5, 2.0]);
    }

    #[test]
    fn test_decode_fortran_order_transposes() {
        // Column-major storage of [[1, 2, 3], [4, 5, 6]].
        let body: Vec<u8> = [1.0f32, 4.0, 2.0, 5.0, 3.0, 6.0]
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect();
        let array = decode(&raw_npy("<f4", true, "(2, 3)", &body)).unwrap();
        assert_eq!(array.data(), &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_decode_zero_rows() {
        let array = decode(&raw_npy("<f4", false, "(0, 4)", &[])).unwrap();
        assert_eq!(array.shape(), &[0, 4]);
        assert!(array.is_empty());
    }

    #[test]
    fn test_decode_rejects_bad_magic() {
        assert_eq!(decode(b"NOTNUMPY123").unwrap_err(), NpyError::BadMagic);
    }

    #[test]
    fn test_decode_rejects_integer_dtype() {
        let err = decode(&raw_npy("<i4", false, "(1,)", &[0, 0, 0, 0])).unwrap_err();
        assert_eq!(err, NpyError::UnsupportedDtype("<i4".to_string()));
    }

    #[test]
    fn test_decode_rejects_truncated_body() {
        let err = decode(&raw_npy("<f4", false, "(4,)", &[0; 8])).unwrap_err();
        assert_eq!(
            err,
            NpyError::Truncated {
                expected: 16,
                actual: 8
            }
        );
    }

    #[test]
    fn test_decode_rejects_unknown_version() {
        let mut bytes = encode(&[1], &[1.0]).unwrap();
        bytes[6] = 9;
        assert!(matches!(
            decode(&bytes).unwrap_err(),
            NpyError::UnsupportedVersion { major: 9, .. }
        ));
    }

    #[test]
    fn test_decode_version_two_header() {
        let dict = "{'descr': '<f4', 'fortran_order': False, 'shape': (1,), }\n";
        let mut bytes = Vec::new();
        bytes.extend_from_slice(NPY_MAGIC);
        bytes.extend_from_slice(&[2, 0]);
        bytes.extend_from_slice(&(dict.len() as u32).to_le_bytes());
        bytes.extend_from_slice(dict.as_bytes());
        bytes.extend_from_slice(&7.0f32.to_le_bytes());

        let array = decode(&bytes).unwrap();
        assert_eq!(array.data(), &[7.0]);
    }

    #[test]
    fn test_read_header_only() {
        let bytes = encode(&[3, 8], &[0.0; 24]).unwrap();
        let header = read_header(&bytes).unwrap();
        assert_eq!(header.dtype, Dtype::F32);
        assert_eq!(header.byte_order, ByteOrder::Little);
        assert!(!header.fortran_order);
        assert_eq!(header.shape, vec![3, 8]);
        assert_eq!(header.element_count(), Some(24));
    }
}
