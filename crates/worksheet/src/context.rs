//! Application context: the one place settings, the API client and the
//! resolved user live. Built once at startup and handed to whatever needs
//! a worksheet.

use capsheet_api::{ApiClient, ApiError};
use capsheet_config::{DraftStore, Settings};

use crate::autosave::SystemClock;
use crate::backend::HttpBackend;
use crate::controller::WorksheetController;

pub struct AppContext {
    settings: Settings,
    api: ApiClient,
    user_id: Option<i64>,
}

impl AppContext {
    pub fn new(settings: Settings) -> Result<Self, ApiError> {
        let api = ApiClient::with_timeout(settings.api_base.clone(), settings.api_timeout())?;
        Ok(Self {
            user_id: settings.user_id,
            settings,
            api,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn user_id(&self) -> Option<i64> {
        self.user_id
    }

    /// Ask the server who we are unless settings already pin a user.
    /// On failure drafts fall back to the default user slot.
    pub fn resolve_user(&mut self) -> Option<i64> {
        if self.user_id.is_none() {
            match self.api.current_user() {
                Ok(user) => {
                    log::debug!("resolved current user {}", user.user_id);
                    self.user_id = Some(user.user_id);
                }
                Err(e) => {
                    log::warn!("could not resolve current user ({}); using the default draft slot", e);
                }
            }
        }
        self.user_id
    }

    pub fn draft_store(&self) -> DraftStore {
        DraftStore::in_dir(self.settings.effective_draft_dir(), self.user_id)
    }

    /// Controller wired to the HTTP backend, the file draft store and the
    /// system clock.
    pub fn worksheet(&self) -> WorksheetController {
        WorksheetController::new(
            Box::new(HttpBackend::new(self.api.clone(), self.user_id)),
            Some(self.draft_store()),
            Box::new(SystemClock),
            self.settings.autosave_debounce(),
        )
    }
}
