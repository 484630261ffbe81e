//! Request lifecycle operations for the government and emergency roles.

pub mod emergency;
pub mod government;

use axum::Router;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    government::router().merge(emergency::router())
}
