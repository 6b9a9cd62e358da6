use crate::driver::Driver;
use crate::error::Result;
use crate::index::{DocId, DriverStats, FtsIndex, Profile, SearchResult};

/// In-process index of one profile
pub struct NativeDriver {
    index: FtsIndex,
}

impl NativeDriver {
    pub fn new(profile: Profile) -> Self {
        Self {
            index: FtsIndex::new(profile),
        }
    }

    pub fn index(&self) -> &FtsIndex {
        &self.index
    }
}

impl Driver for NativeDriver {
    fn name(&self) -> &str {
        self.index.profile().name()
    }

    fn add_document(&self, text: &str) -> Result<DocId> {
        self.index.add_document(text)
    }

    fn add_documents(&self, docs: &[String]) -> Result<Vec<DocId>> {
        self.index.add_documents(docs)
    }

    fn build(&self) -> Result<()> {
        self.index.build()
    }

    fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>> {
        self.index.search(query, limit)
    }

    fn stats(&self) -> Result<DriverStats> {
        Ok(self.index.stats()?.into())
    }

    fn close(&self) -> Result<()> {
        self.index.close();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FtsError;

    #[test]
    fn test_driver_contract() {
        let driver = NativeDriver::new(Profile::Speed);
        assert_eq!(driver.name(), "speed");
        let ids = driver
            .add_documents(&["hello world".to_string(), "hello there".to_string()])
            .unwrap();
        assert_eq!(ids, vec![0, 1]);
        assert!(matches!(driver.search("hello", 5), Err(FtsError::NotBuilt)));

        driver.build().unwrap();
        assert_eq!(driver.search("hello", 5).unwrap().len(), 2);
        assert_eq!(driver.stats().unwrap().doc_count, 2);

        driver.close().unwrap();
        assert!(matches!(driver.stats(), Err(FtsError::Closed)));
    }
}
