//! Application context: owns the single query client of the process and
//! hands it to every view model.

use tracing::info;

use crate::application::devtools::Devtools;
use crate::application::error::AppError;
use crate::application::people::PeopleViewModel;
use crate::application::posts::PostsViewModel;
use crate::cache::{CacheConfig, CacheFacade, QueryClient};
use crate::config::Settings;
use crate::infra::api::{CatalogApi, PostsApi};

#[derive(Clone)]
pub struct AppContext {
    client: QueryClient,
    facade: CacheFacade,
    posts_api: PostsApi,
    catalog_api: CatalogApi,
    devtools: Devtools,
    show_people: bool,
}

impl AppContext {
    /// Build the query client and API clients described by `settings`.
    pub fn create(settings: &Settings) -> Result<Self, AppError> {
        let posts_api = PostsApi::new(settings.api.posts_base_url.as_str())?;
        let catalog_api = CatalogApi::new(settings.api.catalog_base_url.as_str())?;
        let client = QueryClient::new(CacheConfig::from(&settings.cache));
        info!(
            posts_base_url = %settings.api.posts_base_url,
            catalog_base_url = %settings.api.catalog_base_url,
            "Application context created"
        );
        Ok(Self::from_parts(
            client,
            posts_api,
            catalog_api,
            settings.devtools.initial_open,
            settings.app.show_people,
        ))
    }

    pub fn from_parts(
        client: QueryClient,
        posts_api: PostsApi,
        catalog_api: CatalogApi,
        devtools_open: bool,
        show_people: bool,
    ) -> Self {
        Self {
            facade: CacheFacade::new(client.clone()),
            devtools: Devtools::new(client.clone(), devtools_open),
            client,
            posts_api,
            catalog_api,
            show_people,
        }
    }

    pub fn client(&self) -> &QueryClient {
        &self.client
    }

    pub fn facade(&self) -> &CacheFacade {
        &self.facade
    }

    pub fn devtools(&self) -> &Devtools {
        &self.devtools
    }

    pub fn show_people(&self) -> bool {
        self.show_people
    }

    pub fn posts(&self) -> PostsViewModel {
        PostsViewModel::new(
            self.client.clone(),
            self.facade.clone(),
            self.posts_api.clone(),
        )
    }

    pub fn people(&self) -> PeopleViewModel {
        PeopleViewModel::new(self.client.clone(), self.catalog_api.clone())
    }

    /// Tear down the query client; later fetches fail with `Disposed`.
    pub fn dispose(&self) {
        self.client.dispose();
    }
}
