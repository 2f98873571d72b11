//! Minimal multipart/form-data encoder for request bodies

const BOUNDARY: &str = "reelpress-test-boundary-7MA4YWxkTrZu0gW";

/// Builds a multipart body out of file parts
#[derive(Default)]
pub struct MultipartBuilder {
    parts: Vec<(String, Option<String>, Vec<u8>)>,
}

impl MultipartBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file part
    pub fn file(mut self, field: &str, filename: &str, contents: &[u8]) -> Self {
        self.parts
            .push((field.to_string(), Some(filename.to_string()), contents.to_vec()));
        self
    }

    /// Add a plain text part with no filename
    pub fn text(mut self, field: &str, value: &str) -> Self {
        self.parts
            .push((field.to_string(), None, value.as_bytes().to_vec()));
        self
    }

    /// Content-Type header value and encoded body
    pub fn build(self) -> (String, Vec<u8>) {
        let mut body = Vec::new();
        for (field, filename, contents) in self.parts {
            body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
            match filename {
                Some(name) => {
                    body.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                            field, name
                        )
                        .as_bytes(),
                    );
                    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
                }
                None => {
                    body.extend_from_slice(
                        format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", field)
                            .as_bytes(),
                    );
                }
            }
            body.extend_from_slice(&contents);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

        (format!("multipart/form-data; boundary={}", BOUNDARY), body)
    }
}
