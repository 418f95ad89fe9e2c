#![warn(clippy::pedantic)]
// Noisy doc/signature lints
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
// Keep format!("{}", x) style
#![allow(clippy::uninlined_format_args)]
// Money, timestamps and token counts
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_wrap)]
// Dialog handlers
#![allow(clippy::too_many_lines)]
#![allow(clippy::module_name_repetitions)]

pub mod agent;
pub mod cli;
pub mod config;
pub mod dedup;
pub mod dialog;
pub mod dispatch;
pub mod errors;
pub mod gateway;
pub mod outbound;
pub mod places;
pub mod pos;
pub mod providers;
pub mod session;
pub mod storage;
pub mod tenants;
pub(crate) mod utils;
pub mod whatsapp;
pub mod workflow;

/// Re-exports for fuzz targets. Not part of the public API.
#[doc(hidden)]
pub mod fuzz_api {
    pub use crate::config::parse_config;
    pub use crate::whatsapp::{envelope_phone_id, parse_envelope, validate_signature};

    /// Signature check followed by normalization, as the webhook runs it.
    pub fn validate_and_parse(body: &[u8], signature: Option<&str>, secret: &str) -> bool {
        crate::whatsapp::validate_and_parse(body, signature, secret, false).is_ok()
    }

    /// Action-id grammar used by interactive replies.
    pub fn parse_pos_action(action_id: &str) -> bool {
        crate::dialog::actions::PosAction::from_action_id(action_id).is_some()
    }
}

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
