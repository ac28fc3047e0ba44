use std::fmt;

use gv_types::{AddressHasher, ContentAddress};

use crate::error::{StoreError, StoreResult};

/// One named blob inside a snapshot bundle.
#[derive(Clone, PartialEq, Eq)]
pub struct BlobFile {
    pub name: String,
    pub data: Vec<u8>,
}

impl BlobFile {
    pub fn new(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }

    /// The blob's content as UTF-8 text.
    pub fn text(&self) -> StoreResult<&str> {
        std::str::from_utf8(&self.data).map_err(|_| StoreError::Encoding {
            name: self.name.clone(),
        })
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl fmt::Debug for BlobFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlobFile")
            .field("name", &self.name)
            .field("len", &self.data.len())
            .finish()
    }
}

/// Compute the content address a set of files would be committed under.
pub fn address_of(files: &[BlobFile]) -> ContentAddress {
    AddressHasher::address_of(files.iter().map(|f| (f.name.as_str(), f.data.as_slice())))
}

/// Result of fetching a bundle by address.
///
/// Mirrors the store's response shape: an `ok` flag plus the files. The
/// files are only handed out after verifying they still hash to `address`.
#[derive(Clone, Debug)]
pub struct Bundle {
    address: ContentAddress,
    ok: bool,
    files: Vec<BlobFile>,
}

impl Bundle {
    /// A successfully fetched bundle.
    pub fn new(address: ContentAddress, files: Vec<BlobFile>) -> Self {
        Self {
            address,
            ok: true,
            files,
        }
    }

    /// A bundle the store answered for but could not serve.
    pub fn unavailable(address: ContentAddress) -> Self {
        Self {
            address,
            ok: false,
            files: Vec::new(),
        }
    }

    pub fn address(&self) -> ContentAddress {
        self.address
    }

    pub fn is_ok(&self) -> bool {
        self.ok
    }

    /// The bundle's files, integrity-checked against the address.
    ///
    /// Returns [`StoreError::Unavailable`] for a not-ok bundle and
    /// [`StoreError::Truncated`] when the content no longer matches.
    pub fn files(&self) -> StoreResult<&[BlobFile]> {
        if !self.ok {
            return Err(StoreError::Unavailable(self.address));
        }
        let computed = address_of(&self.files);
        if computed != self.address {
            return Err(StoreError::Truncated {
                address: self.address,
                computed,
            });
        }
        Ok(&self.files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<BlobFile> {
        vec![
            BlobFile::new("a.json", br#"{"x":1}"#.to_vec()),
            BlobFile::new("b.json", br#"{"y":2}"#.to_vec()),
        ]
    }

    #[test]
    fn intact_bundle_yields_files() {
        let files = sample();
        let bundle = Bundle::new(address_of(&files), files.clone());
        assert!(bundle.is_ok());
        assert_eq!(bundle.files().unwrap(), files.as_slice());
    }

    #[test]
    fn cut_short_bundle_is_truncated() {
        let files = sample();
        let address = address_of(&files);
        let mut cut = files;
        cut[1].data.truncate(3);
        let err = Bundle::new(address, cut).files().unwrap_err();
        assert!(err.is_truncation());
    }

    #[test]
    fn missing_file_is_truncated() {
        let files = sample();
        let address = address_of(&files);
        let err = Bundle::new(address, files[..1].to_vec()).files().unwrap_err();
        assert!(err.is_truncation());
    }

    #[test]
    fn unavailable_bundle_has_no_files() {
        let address = address_of(&sample());
        let bundle = Bundle::unavailable(address);
        assert!(!bundle.is_ok());
        assert!(matches!(bundle.files(), Err(StoreError::Unavailable(a)) if a == address));
    }

    #[test]
    fn text_rejects_invalid_utf8() {
        let file = BlobFile::new("bad.json", vec![0xff, 0xfe]);
        assert!(matches!(file.text(), Err(StoreError::Encoding { .. })));
        assert_eq!(BlobFile::new("ok.json", b"{}".to_vec()).text().unwrap(), "{}");
    }
}
