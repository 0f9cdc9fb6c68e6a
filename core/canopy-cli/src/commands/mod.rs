pub mod hooks;
pub mod oneshot;
pub mod sessions;
