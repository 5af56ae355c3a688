//! `multipart/form-data` encoding for file uploads.
//!
//! The boundary is generated per request and written into the
//! `Content-Type` header by the request builder; callers never set that
//! header themselves for multipart bodies.

use bytes::{BufMut, Bytes, BytesMut};
use mime::Mime;
use rand::Rng;

/// Default form field name for uploaded files.
pub const DEFAULT_FILE_FIELD: &str = "file";

/// A single file to upload as one part of a multipart form.
#[derive(Debug, Clone)]
pub struct FilePart {
    field_name: String,
    file_name: String,
    content_type: Mime,
    data: Bytes,
}

impl FilePart {
    /// Create a file part sent under the `file` form field.
    pub fn new(file_name: impl Into<String>, content_type: Mime, data: impl Into<Bytes>) -> Self {
        Self {
            field_name: DEFAULT_FILE_FIELD.to_owned(),
            file_name: file_name.into(),
            content_type,
            data: data.into(),
        }
    }

    /// Override the form field name.
    #[must_use]
    pub fn field_name(mut self, name: impl Into<String>) -> Self {
        self.field_name = name.into();
        self
    }

    #[must_use]
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    #[must_use]
    pub fn content_type(&self) -> &Mime {
        &self.content_type
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Encoded multipart body together with its boundary.
#[derive(Debug, Clone)]
pub(crate) struct MultipartBody {
    pub(crate) boundary: String,
    pub(crate) body: Bytes,
}

impl MultipartBody {
    pub(crate) fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }
}

pub(crate) fn encode(parts: &[FilePart]) -> MultipartBody {
    encode_with_boundary(parts, generate_boundary())
}

fn encode_with_boundary(parts: &[FilePart], boundary: String) -> MultipartBody {
    let mut buf = BytesMut::new();

    for part in parts {
        buf.put_slice(b"--");
        buf.put_slice(boundary.as_bytes());
        buf.put_slice(b"\r\n");
        buf.put_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                escape_quoted(&part.field_name),
                escape_quoted(&part.file_name)
            )
            .as_bytes(),
        );
        buf.put_slice(format!("Content-Type: {}\r\n\r\n", part.content_type).as_bytes());
        buf.put_slice(&part.data);
        buf.put_slice(b"\r\n");
    }

    buf.put_slice(b"--");
    buf.put_slice(boundary.as_bytes());
    buf.put_slice(b"--\r\n");

    MultipartBody {
        boundary,
        body: buf.freeze(),
    }
}

fn generate_boundary() -> String {
    let mut rng = rand::rng();
    let hi: u64 = rng.random();
    let lo: u64 = rng.random();
    format!("----portal-boundary-{hi:016x}{lo:016x}")
}

/// Quoted-string values in Content-Disposition cannot carry raw quotes or
/// line breaks; browsers percent-encode them the same way.
fn escape_quoted(value: &str) -> String {
    value
        .replace('"', "%22")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_encode_single_file_part() {
        let part = FilePart::new("photo.jpg", mime::IMAGE_JPEG, &b"JPEGDATA"[..]);
        let encoded = encode_with_boundary(&[part], "XYZ".to_owned());

        let expected = "--XYZ\r\n\
            Content-Disposition: form-data; name=\"file\"; filename=\"photo.jpg\"\r\n\
            Content-Type: image/jpeg\r\n\r\n\
            JPEGDATA\r\n\
            --XYZ--\r\n";
        assert_eq!(encoded.body, Bytes::from(expected));
        assert_eq!(encoded.content_type(), "multipart/form-data; boundary=XYZ");
    }

    #[test]
    fn test_file_name_quotes_are_escaped() {
        let part = FilePart::new("my \"best\"\r\nshot.png", mime::IMAGE_PNG, Bytes::new());
        let encoded = encode_with_boundary(&[part], "B".to_owned());
        let text = String::from_utf8(encoded.body.to_vec()).unwrap();

        assert!(text.contains("filename=\"my %22best%22%0D%0Ashot.png\""));
    }

    #[test]
    fn test_custom_field_name() {
        let part = FilePart::new("a.txt", mime::TEXT_PLAIN, "hi").field_name("attachment");
        let encoded = encode_with_boundary(&[part], "B".to_owned());
        let text = String::from_utf8(encoded.body.to_vec()).unwrap();

        assert!(text.contains("name=\"attachment\""));
    }

    #[test]
    fn test_generated_boundaries_differ() {
        let a = encode(&[]);
        let b = encode(&[]);
        assert_ne!(a.boundary, b.boundary);
        assert!(a.boundary.starts_with("----portal-boundary-"));
    }
}
