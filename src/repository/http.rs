//! Remote HTTP(S) repository

use crate::error::{GetrunError, GetrunResult};
use crate::repository::Repository;
use std::time::Duration;
use tracing::debug;
use ureq::Agent;

/// Upper bound on a single downloaded file
const MAX_DOWNLOAD_BYTES: u64 = 512 * 1024 * 1024;

/// Repository served over HTTP(S)
pub struct HttpRepository {
    base: String,
    agent: Agent,
}

impl HttpRepository {
    pub fn new(base: &str, timeout: Duration) -> Self {
        let config = Agent::config_builder()
            .timeout_global(Some(timeout))
            .build();

        Self {
            base: base.trim_end_matches('/').to_string(),
            agent: Agent::new_with_config(config),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base, path.trim_start_matches('/'))
    }
}

impl Repository for HttpRepository {
    fn location(&self) -> &str {
        &self.base
    }

    fn fetch(&self, path: &str) -> GetrunResult<Option<Vec<u8>>> {
        let url = self.url(path);
        debug!("GET {}", url);

        match self.agent.get(&url).call() {
            Ok(mut response) => {
                let bytes = response
                    .body_mut()
                    .with_config()
                    .limit(MAX_DOWNLOAD_BYTES)
                    .read_to_vec()
                    .map_err(|e| GetrunError::Repository {
                        url: url.clone(),
                        reason: e.to_string(),
                    })?;
                Ok(Some(bytes))
            }
            Err(ureq::Error::StatusCode(404)) => Ok(None),
            Err(e) => Err(GetrunError::Repository {
                url,
                reason: e.to_string(),
            }),
        }
    }
}
