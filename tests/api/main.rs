mod auth;
mod conflict;
mod documents;
mod helpers;
mod sync;
