pub mod auth;
pub mod comments;
pub mod error;
pub mod feed;
pub mod forms;
pub mod middleware;
pub mod multipart;
pub mod password;
pub mod profile;
pub mod recipes;
pub mod routes;
pub mod social;
pub mod state;
pub mod storage;
pub mod views;

pub use routes::router;
pub use state::{AppState, AppStateInner};
