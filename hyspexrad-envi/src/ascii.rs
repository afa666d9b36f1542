//! ENVI ASCII sidecar header parser.
//!
//! The sidecar is a text file whose first line starts with the literal
//! `ENVI`, followed by `key = value` lines. Values wrapped in `{...}`
//! are lists and may span multiple lines.

use crate::{Error, Result};
use hyspexrad_core::{CubeDims, EnviDtype, Interleave};
use std::path::Path;

/// Configuration for the ENVI header parser.
#[derive(Debug, Clone)]
pub struct EnviParserConfig {
    /// Whether keys are normalized to lowercase.
    pub lowercase_keys: bool,
}

impl Default for EnviParserConfig {
    fn default() -> Self {
        Self {
            lowercase_keys: true,
        }
    }
}

impl EnviParserConfig {
    /// Creates a new parser configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether keys are normalized to lowercase.
    #[must_use]
    pub fn with_lowercase_keys(mut self, lowercase: bool) -> Self {
        self.lowercase_keys = lowercase;
        self
    }
}

/// A parsed header value: either a scalar string or a `{...}` list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderValue {
    /// A single trimmed value.
    Scalar(String),
    /// Entries of a `{...}` list, comma-split and trimmed.
    List(Vec<String>),
}

impl HeaderValue {
    /// Returns the scalar string, if this is a scalar.
    #[must_use]
    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            HeaderValue::Scalar(s) => Some(s),
            HeaderValue::List(_) => None,
        }
    }

    /// Returns the list entries, if this is a list.
    #[must_use]
    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            HeaderValue::List(v) => Some(v),
            HeaderValue::Scalar(_) => None,
        }
    }
}

/// An immutable, ordered ENVI header map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnviHeader {
    entries: Vec<(String, HeaderValue)>,
}

impl EnviHeader {
    /// Reads and parses an ENVI header file with the default configuration.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, does not start with
    /// `ENVI`, or has a malformed key/value structure.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_file_with_config(path, &EnviParserConfig::default())
    }

    /// Reads and parses an ENVI header file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file_with_config<P: AsRef<Path>>(
        path: P,
        config: &EnviParserConfig,
    ) -> Result<Self> {
        let text = std::fs::read_to_string(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::InvalidData {
                Error::NotEnviHeader(format!(
                    "{} appears to be a binary file",
                    path.as_ref().display()
                ))
            } else {
                Error::Io(e)
            }
        })?;
        Self::parse(&text, config)
    }

    /// Parses header text.
    ///
    /// # Errors
    /// Returns an error if the first line does not start with `ENVI` or a
    /// `{...}` list is left unterminated.
    pub fn parse(text: &str, config: &EnviParserConfig) -> Result<Self> {
        let mut lines = text.lines();

        let first = lines.next().unwrap_or("");
        if !first.trim_start().starts_with("ENVI") {
            return Err(Error::NotEnviHeader(
                "missing ENVI marker on first line".to_string(),
            ));
        }

        let mut header = EnviHeader::default();

        while let Some(line) = lines.next() {
            if !line.contains('=') {
                continue;
            }
            if line.starts_with(';') {
                continue;
            }

            let (raw_key, raw_val) = line.split_once('=').unwrap_or((line, ""));
            let mut key = raw_key.trim().to_string();
            if config.lowercase_keys {
                key = key.to_lowercase();
            }
            let val = raw_val.trim();

            if let Some(inner) = val.strip_prefix('{') {
                // Multi-line list: accumulate until a line ending in `}`.
                let mut body = inner.to_string();
                let mut closed = body.trim_end().ends_with('}');
                while !closed {
                    let next = lines.next().ok_or_else(|| {
                        Error::ParseError(format!("unterminated list value for key '{key}'"))
                    })?;
                    if next.starts_with(';') {
                        continue;
                    }
                    body.push('\n');
                    body.push_str(next.trim());
                    closed = body.trim_end().ends_with('}');
                }
                let body = body
                    .trim_end()
                    .strip_suffix('}')
                    .unwrap_or(&body)
                    .to_string();

                if key == "description" {
                    header.insert(key, HeaderValue::Scalar(body.trim().to_string()));
                } else {
                    let items = body
                        .split(',')
                        .map(|s| s.trim().to_string())
                        .collect::<Vec<_>>();
                    header.insert(key, HeaderValue::List(items));
                }
            } else {
                header.insert(key, HeaderValue::Scalar(val.to_string()));
            }
        }

        header.flatten_description(config);
        Ok(header)
    }

    /// Merges `key=value` pairs embedded in a multi-line description into
    /// the outer map. Description lines without `=` are ignored.
    fn flatten_description(&mut self, config: &EnviParserConfig) {
        let Some(HeaderValue::Scalar(desc)) = self.get("description").cloned() else {
            return;
        };
        for line in desc.lines() {
            let Some((k, v)) = line.split_once('=') else {
                continue;
            };
            let mut key = k.trim().to_string();
            if config.lowercase_keys {
                key = key.to_lowercase();
            }
            self.insert(key, HeaderValue::Scalar(v.trim().to_string()));
        }
    }

    fn insert(&mut self, key: String, value: HeaderValue) {
        if let Some(entry) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            entry.1 = value;
        } else {
            self.entries.push((key, value));
        }
    }

    /// Looks up a header value by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&HeaderValue> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Returns the entries in insertion order.
    #[must_use]
    pub fn entries(&self) -> &[(String, HeaderValue)] {
        &self.entries
    }

    /// Number of entries in the header.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the header holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn scalar(&self, key: &str) -> Result<&str> {
        match self.get(key) {
            Some(HeaderValue::Scalar(s)) => Ok(s),
            Some(HeaderValue::List(_)) => Err(Error::ParseError(format!(
                "header key '{key}' is a list, expected a scalar"
            ))),
            None => Err(Error::ParseError(format!("missing header key '{key}'"))),
        }
    }

    fn scalar_usize(&self, key: &str) -> Result<usize> {
        let s = self.scalar(key)?;
        s.parse::<usize>()
            .map_err(|_| Error::ParseError(format!("header key '{key}' is not an integer: {s}")))
    }

    /// Cross-track samples per line.
    ///
    /// # Errors
    /// Returns an error if the key is missing or non-numeric.
    pub fn samples(&self) -> Result<usize> {
        self.scalar_usize("samples")
    }

    /// Along-track line count as declared by the header.
    ///
    /// The declared value is untrustworthy; readers recompute it from the
    /// file size and log any disagreement.
    ///
    /// # Errors
    /// Returns an error if the key is missing or non-numeric.
    pub fn lines(&self) -> Result<usize> {
        self.scalar_usize("lines")
    }

    /// Spectral band count.
    ///
    /// # Errors
    /// Returns an error if the key is missing or non-numeric.
    pub fn bands(&self) -> Result<usize> {
        self.scalar_usize("bands")
    }

    /// Declared cube dimensions.
    ///
    /// # Errors
    /// Returns an error if any of `lines`, `samples`, `bands` is missing.
    pub fn dims(&self) -> Result<CubeDims> {
        Ok(CubeDims {
            lines: self.lines()?,
            samples: self.samples()?,
            bands: self.bands()?,
        })
    }

    /// On-disk interleave layout.
    ///
    /// # Errors
    /// Returns an error if the key is missing or not one of bil/bip/bsq.
    pub fn interleave(&self) -> Result<Interleave> {
        Ok(Interleave::from_header_value(self.scalar("interleave")?)?)
    }

    /// Element dtype of the pixel cube.
    ///
    /// # Errors
    /// Returns an error if the key is missing or the code is unknown.
    pub fn data_type(&self) -> Result<EnviDtype> {
        let code = self.scalar("data type")?;
        let code = code.parse::<u32>().map_err(|_| {
            Error::ParseError(format!("header key 'data type' is not an integer: {code}"))
        })?;
        Ok(EnviDtype::from_code(code)?)
    }

    /// Byte length of the binary preamble before the pixel data.
    ///
    /// # Errors
    /// Returns an error if the key is missing or non-numeric.
    pub fn header_offset(&self) -> Result<usize> {
        self.scalar_usize("header offset")
    }

    /// Re-serializes the header to `key = value` text.
    ///
    /// Round-trips through [`EnviHeader::parse`] for well-formed input.
    #[must_use]
    pub fn to_header_text(&self) -> String {
        let mut out = String::from("ENVI\n");
        for (key, value) in &self.entries {
            match value {
                HeaderValue::Scalar(s) if s.contains('\n') => {
                    out.push_str(&format!("{key} = {{{s}}}\n"));
                }
                HeaderValue::Scalar(s) => {
                    out.push_str(&format!("{key} = {s}\n"));
                }
                HeaderValue::List(items) => {
                    out.push_str(&format!("{key} = {{ {} }}\n", items.join(", ")));
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "ENVI\n\
        description = {\n\
        Sensor = VNIR-1800\n\
        Flight = 2024-08-19}\n\
        samples = 1800\n\
        lines = 4500\n\
        bands = 186\n\
        header offset = 13824\n\
        ; a comment = should be skipped\n\
        data type = 12\n\
        interleave = bil\n\
        wavelength = {\n\
        400.5, 403.7,\n\
        406.9}\n";

    #[test]
    fn test_parse_required_keys() {
        let hdr = EnviHeader::parse(SAMPLE, &EnviParserConfig::default()).unwrap();
        assert_eq!(hdr.samples().unwrap(), 1800);
        assert_eq!(hdr.lines().unwrap(), 4500);
        assert_eq!(hdr.bands().unwrap(), 186);
        assert_eq!(hdr.header_offset().unwrap(), 13824);
        assert_eq!(hdr.interleave().unwrap(), Interleave::Bil);
        assert_eq!(hdr.data_type().unwrap(), EnviDtype::U16);
    }

    #[test]
    fn test_multiline_list() {
        let hdr = EnviHeader::parse(SAMPLE, &EnviParserConfig::default()).unwrap();
        let wl = hdr.get("wavelength").unwrap().as_list().unwrap();
        assert_eq!(wl, &["400.5", "403.7", "406.9"]);
    }

    #[test]
    fn test_description_flattening() {
        let hdr = EnviHeader::parse(SAMPLE, &EnviParserConfig::default()).unwrap();
        assert_eq!(
            hdr.get("sensor").unwrap().as_scalar().unwrap(),
            "VNIR-1800"
        );
        assert_eq!(
            hdr.get("flight").unwrap().as_scalar().unwrap(),
            "2024-08-19"
        );
    }

    #[test]
    fn test_comment_lines_skipped() {
        let hdr = EnviHeader::parse(SAMPLE, &EnviParserConfig::default()).unwrap();
        assert!(hdr.get("; a comment").is_none());
    }

    #[test]
    fn test_missing_envi_marker() {
        let result = EnviHeader::parse("samples = 10\n", &EnviParserConfig::default());
        assert!(matches!(result, Err(Error::NotEnviHeader(_))));
    }

    #[test]
    fn test_preserve_key_case() {
        let config = EnviParserConfig::new().with_lowercase_keys(false);
        let hdr = EnviHeader::parse("ENVI\nData Type = 12\n", &config).unwrap();
        assert!(hdr.get("Data Type").is_some());
        assert!(hdr.get("data type").is_none());
    }

    #[test]
    fn test_unterminated_list() {
        let result = EnviHeader::parse(
            "ENVI\nwavelength = {\n400.5,\n",
            &EnviParserConfig::default(),
        );
        assert!(matches!(result, Err(Error::ParseError(_))));
    }

    #[test]
    fn test_reserialize_roundtrip() {
        let config = EnviParserConfig::default();
        let hdr = EnviHeader::parse(SAMPLE, &config).unwrap();
        let text = hdr.to_header_text();
        let reparsed = EnviHeader::parse(&text, &config).unwrap();
        assert_eq!(hdr, reparsed);
    }
}
