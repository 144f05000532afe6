//! Installation listing against the portal

use crate::auth::Credential;
use crate::config::ApiConfig;
use crate::error::{OsosyncError, Result};
use crate::logging::get_logger;
use async_trait::async_trait;

use super::client::ApiClient;
use super::types::{Installation, InstallationPage};

/// Seam for enumerating the account's installations
#[async_trait]
pub trait InstallationDirectory: Send + Sync {
    /// Fetch all installations visible to the account.
    ///
    /// An empty result is not an error here; the orchestrator decides
    /// whether an empty sweep is fatal.
    async fn list(&self, credential: &Credential) -> Result<Vec<Installation>>;
}

/// HTTP implementation over `InstallationOperations/GetInstallationInfo`
pub struct HttpInstallationDirectory {
    client: ApiClient,
    config: ApiConfig,
    logger: crate::logging::StructuredLogger,
}

impl HttpInstallationDirectory {
    pub fn new(client: ApiClient, config: ApiConfig) -> Self {
        Self {
            client,
            config,
            logger: get_logger("api"),
        }
    }

    fn page_url(&self, page: u32) -> String {
        format!(
            "{}/InstallationOperations/GetInstallationInfo?email={}&companyId={}&pageSize={}&page={}",
            self.config.base_url, self.config.email, self.config.company_id,
            self.config.page_size, page
        )
    }
}

#[async_trait]
impl InstallationDirectory for HttpInstallationDirectory {
    async fn list(&self, credential: &Credential) -> Result<Vec<Installation>> {
        let mut installations = Vec::new();
        let mut fetched: u32 = 0;
        let mut page: u32 = 1;

        loop {
            let response: InstallationPage =
                self.client.get_json(&self.page_url(page), credential).await?;

            match response {
                InstallationPage::Paged {
                    data,
                    total_count,
                    success,
                    message,
                } => {
                    if !success {
                        return Err(OsosyncError::generic(format!(
                            "installation listing reported failure: {}",
                            message.unwrap_or_default()
                        )));
                    }

                    let batch = data.len() as u32;
                    fetched += batch;
                    installations.extend(data.into_iter().filter_map(Installation::from_record));

                    // The page size normally covers the whole account; keep
                    // paging only while the provider reports more.
                    if batch == 0 || fetched >= total_count {
                        break;
                    }
                    page += 1;
                }
                InstallationPage::Listed {
                    message,
                    installation_list,
                    ..
                } => {
                    if installation_list.is_empty() {
                        self.logger.warn(&format!(
                            "Installation listing came back empty: {}",
                            message.unwrap_or_default()
                        ));
                    }
                    installations
                        .extend(installation_list.into_iter().filter_map(Installation::from_entry));
                    // This shape carries no pagination
                    break;
                }
            }
        }

        self.logger.info(&format!(
            "Listed {} installations for company {}",
            installations.len(),
            self.config.company_id
        ));

        Ok(installations)
    }
}
