use super::schema::Config;
use tracing::{debug, warn};

macro_rules! define_overrides {
    ($( $env:literal => $($path:ident).+ : $ty:ty );* $(;)?) => {
        /// Environment variables that override config fields.
        pub const OVERRIDE_ENV_VARS: &[&str] = &[$($env),*];

        /// Apply `WAHUB_*` environment overrides on top of the file config.
        ///
        /// Set, non-empty variables replace the field. Values that do not
        /// parse as the field's type are logged and ignored.
        pub fn apply_env_overrides(config: &mut Config) {
            apply_overrides_from(config, |name| std::env::var(name).ok());
        }

        /// Same as [`apply_env_overrides`] with an injectable lookup.
        pub fn apply_overrides_from(config: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
            $(
                if let Some(raw) = lookup($env).filter(|v| !v.trim().is_empty()) {
                    match raw.trim().parse::<$ty>() {
                        Ok(value) => {
                            debug!("config override from {}", $env);
                            config.$($path).+ = value;
                        }
                        Err(_) => warn!("ignoring {}: cannot parse {:?}", $env, raw),
                    }
                }
            )*
            if let Some(raw) =
                lookup("WAHUB_SESSION_TRANSCRIPT_BOUND").filter(|v| !v.trim().is_empty())
            {
                match raw.trim().parse::<usize>() {
                    Ok(bound) => {
                        config.session.max_user_turns = bound;
                        config.session.max_assistant_turns = bound;
                    }
                    Err(_) => warn!(
                        "ignoring WAHUB_SESSION_TRANSCRIPT_BOUND: cannot parse {:?}",
                        raw
                    ),
                }
            }
        }
    };
}

define_overrides! {
    "WAHUB_HOST"                  => gateway.host: String;
    "WAHUB_PORT"                  => gateway.port: u16;
    "WAHUB_VERIFY_TOKEN"          => gateway.verify_token: String;
    "WAHUB_ADMIN_TOKEN"           => gateway.test_webhook.admin_token: String;
    "WAHUB_CALLBACK_TOKEN"        => gateway.callback_token: String;
    "WAHUB_SESSION_TTL_HOURS"     => session.ttl_hours: u64;
    "WAHUB_DEDUP_WINDOW_HOURS"    => dedup.window_hours: u64;
    "WAHUB_AGENT_MAX_ITERATIONS"  => agent.max_iterations: usize;
    "WAHUB_OPENAI_BASE_URL"       => agent.openai_base_url: String;
    "WAHUB_TRANSPORT_BASE_URL"    => transport.base_url: String;
    "WAHUB_TRANSPORT_API_VERSION" => transport.api_version: String;
    "WAHUB_POS_BASE_URL"          => services.pos_base_url: String;
    "WAHUB_POS_API_KEY"           => services.pos_api_key: String;
    "WAHUB_CALLBACK_BASE_URL"     => services.callback_base_url: String;
    "WAHUB_WORKFLOW_WEBHOOK_URL"  => services.workflow_webhook_url: String;
    "WAHUB_PLACES_BASE_URL"       => services.places_base_url: String;
    "WAHUB_DEFAULT_REGION"        => services.default_region: String;
}
