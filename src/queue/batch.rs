use crate::IntakeError;

/// One logical purge request: the URLs of a single re-signed response.
///
/// A batch can only be built through [`PurgeBatch::new`], so every value of
/// this type is non-empty and holds no blank URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurgeBatch {
    urls: Vec<String>,
}

impl PurgeBatch {
    pub fn new(urls: Vec<String>) -> std::result::Result<Self, IntakeError> {
        if urls.is_empty() {
            return Err(IntakeError::InvalidBatch(
                "a purge request must carry at least one URL".into(),
            ));
        }

        if let Some(pos) = urls.iter().position(|u| u.trim().is_empty()) {
            return Err(IntakeError::InvalidBatch(format!("URL at position {pos} is empty")));
        }

        Ok(Self { urls })
    }

    pub fn urls(&self) -> &[String] {
        &self.urls
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    /// Always false; present for API symmetry with [`PurgeBatch::len`]
    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    pub fn into_urls(self) -> Vec<String> {
        self.urls
    }
}
