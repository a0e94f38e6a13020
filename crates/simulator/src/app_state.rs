use storage::Storage;

use crate::api::ApiContext;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) workspace: String,
    pub(crate) storage: Storage,
    pub(crate) api: ApiContext,
}
