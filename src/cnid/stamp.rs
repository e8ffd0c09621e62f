use std::fmt;

use tracing::error;

use crate::core::constants::{CNID_DEV_LEN, CNID_DEV_OFS, ROOTINFO_KEY};
use crate::core::{IdentifierStore, LookupError, StoreError};

/// Database stamp taken from the root info record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Stamp(pub [u8; CNID_DEV_LEN]);

impl Stamp {
    /// Raw stamp bytes.
    pub fn as_bytes(&self) -> &[u8; CNID_DEV_LEN] {
        &self.0
    }

    /// Extract the stamp from a root info record.
    pub fn from_record(record: &[u8]) -> Result<Self, StoreError> {
        let needed = CNID_DEV_OFS + CNID_DEV_LEN;
        let field = record
            .get(CNID_DEV_OFS..needed)
            .ok_or(StoreError::Truncated {
                needed,
                actual: record.len(),
            })?;

        let mut stamp = [0u8; CNID_DEV_LEN];
        stamp.copy_from_slice(field);
        Ok(Self(stamp))
    }
}

impl fmt::Display for Stamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// Read the database stamp.
///
/// Read-only; a missing root info record is [`LookupError::NotFound`].
pub fn get_stamp<S: IdentifierStore + ?Sized>(store: &S) -> Result<Stamp, LookupError> {
    let record = store
        .get(&ROOTINFO_KEY)
        .inspect_err(|e| error!(error = %e, "error getting rootinfo record"))?
        .ok_or_else(|| {
            error!("no rootinfo record found");
            LookupError::NotFound
        })?;

    Stamp::from_record(&record)
        .inspect_err(|e| error!(error = %e, "malformed rootinfo record"))
        .map_err(LookupError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cnid::MemoryStore;
    use crate::core::constants::{CNID_DBD_RES_ERR_DB, CNID_DBD_RES_NOTFOUND};

    struct FailingStore;

    impl IdentifierStore for FailingStore {
        fn get(&self, _key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
            Err(StoreError::Backend("environment closed".into()))
        }
    }

    fn root_record() -> Vec<u8> {
        hex::decode("000000000102030405060708ffffffff").unwrap()
    }

    #[test]
    fn test_stamp_found() {
        let store = MemoryStore::new();
        store.insert(ROOTINFO_KEY.to_vec(), root_record());

        let stamp = get_stamp(&store).unwrap();
        assert_eq!(stamp.as_bytes(), &[1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(stamp.to_string(), "0102030405060708");
    }

    #[test]
    fn test_stamp_not_found() {
        let store = MemoryStore::new();
        store.insert(vec![0, 0, 0, 1], root_record());

        let err = get_stamp(&store).unwrap_err();
        assert_eq!(err, LookupError::NotFound);
        assert_eq!(err.result_code(), CNID_DBD_RES_NOTFOUND);
    }

    #[test]
    fn test_store_failure() {
        let err = get_stamp(&FailingStore).unwrap_err();
        assert!(matches!(err, LookupError::Store(StoreError::Backend(_))));
        assert_eq!(err.result_code(), CNID_DBD_RES_ERR_DB);
    }

    #[test]
    fn test_truncated_record() {
        let store = MemoryStore::new();
        store.insert(ROOTINFO_KEY.to_vec(), vec![0; 10]);

        assert_eq!(
            get_stamp(&store).unwrap_err(),
            LookupError::Store(StoreError::Truncated {
                needed: 12,
                actual: 10
            })
        );
    }

    #[test]
    fn test_lookup_does_not_mutate() {
        let store = MemoryStore::new();
        store.insert(ROOTINFO_KEY.to_vec(), root_record());

        let first = get_stamp(&store).unwrap();
        let second = get_stamp(&store).unwrap();
        assert_eq!(first, second);
        assert_eq!(store.len(), 1);
    }
}
