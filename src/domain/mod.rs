pub mod dialogs;
pub mod entities;
pub mod error;
pub mod fingerprint;
