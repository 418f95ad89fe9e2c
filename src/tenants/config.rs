use crate::config::schema::{MAX_RETENTION_HOURS, redact_debug};
use crate::errors::WahubError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TenantKind {
    Pos,
    Deals,
    ViralAgency,
}

impl std::fmt::Display for TenantKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pos => "pos",
            Self::Deals => "deals",
            Self::ViralAgency => "viral_agency",
        };
        f.write_str(s)
    }
}

/// WhatsApp Cloud API credentials for one business number.
#[derive(Clone, Serialize, Deserialize, Default)]
pub struct WhatsAppCredentials {
    #[serde(rename = "accessToken")]
    pub access_token: String,
    #[serde(rename = "phoneNumberId")]
    pub phone_number_id: String,
    #[serde(rename = "appSecret")]
    pub app_secret: String,
    #[serde(default, rename = "verifyToken")]
    pub verify_token: String,
}

redact_debug!(
    WhatsAppCredentials,
    redact(access_token),
    phone_number_id,
    redact(app_secret),
    redact(verify_token),
);

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

#[derive(Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    #[serde(default, rename = "apiKey")]
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Overrides the global OpenAI-compatible base URL for this tenant.
    #[serde(default, rename = "baseUrl")]
    pub base_url: Option<String>,
}

redact_debug!(LlmSettings, redact(api_key), model, temperature, base_url,);

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: default_model(),
            temperature: default_temperature(),
            base_url: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreLocation {
    pub latitude: f64,
    pub longitude: f64,
    pub name: String,
    pub address: String,
}

fn default_currency() -> String {
    "SGD".to_string()
}

fn default_discount_percent() -> u32 {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSettings {
    #[serde(default, rename = "storeId")]
    pub store_id: String,
    #[serde(default = "default_currency")]
    pub currency: String,
    /// PayNow number or UEN shown in payment instructions.
    #[serde(default, rename = "paynowTarget")]
    pub paynow_target: Option<String>,
    #[serde(default)]
    pub location: Option<StoreLocation>,
    /// Attach the "Today's Offer" button to LLM replies.
    #[serde(default, rename = "todaysOffer")]
    pub todays_offer: bool,
    #[serde(default, rename = "featuredProductId")]
    pub featured_product_id: Option<String>,
    #[serde(default = "default_discount_percent", rename = "discountPercent")]
    pub discount_percent: u32,
    /// Let the owner's own number place orders as a customer.
    #[serde(default, rename = "allowOwnerAsCustomer")]
    pub allow_owner_as_customer: bool,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            store_id: String::new(),
            currency: default_currency(),
            paynow_target: None,
            location: None,
            todays_offer: false,
            featured_product_id: None,
            discount_percent: default_discount_percent(),
            allow_owner_as_customer: false,
        }
    }
}

/// Per-tenant overrides of the global session policy.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SessionOverrides {
    #[serde(default, rename = "ttlHours")]
    pub ttl_hours: Option<u64>,
    #[serde(default, rename = "transcriptBound")]
    pub transcript_bound: Option<usize>,
}

/// Snapshot of one tenant's configuration. Read-only in the hot path.
#[derive(Clone, Serialize, Deserialize)]
pub struct TenantConfig {
    #[serde(rename = "tenantId")]
    pub tenant_id: String,
    pub kind: TenantKind,
    #[serde(default, rename = "displayName")]
    pub display_name: String,
    pub whatsapp: WhatsAppCredentials,
    #[serde(default)]
    pub llm: LlmSettings,
    #[serde(default, rename = "mapsApiKey")]
    pub maps_api_key: Option<String>,
    #[serde(default, rename = "imageGenApiKey")]
    pub image_gen_api_key: Option<String>,
    #[serde(default, rename = "workflowWebhookUrl")]
    pub workflow_webhook_url: Option<String>,
    #[serde(default, rename = "ownerContact")]
    pub owner_contact: Option<String>,
    #[serde(default, rename = "businessContext")]
    pub business_context: Option<String>,
    #[serde(default)]
    pub store: StoreSettings,
    #[serde(default)]
    pub session: SessionOverrides,
}

redact_debug!(
    TenantConfig,
    tenant_id,
    kind,
    display_name,
    whatsapp,
    llm,
    redact_option(maps_api_key),
    redact_option(image_gen_api_key),
    workflow_webhook_url,
    owner_contact,
    store,
    session,
);

impl TenantConfig {
    pub fn validate(&self) -> Result<(), WahubError> {
        if self.tenant_id.trim().is_empty() {
            return Err(WahubError::Config("tenant.tenantId must not be empty".into()));
        }
        if self.whatsapp.phone_number_id.trim().is_empty() {
            return Err(WahubError::Config(format!(
                "tenant {}: whatsapp.phoneNumberId must not be empty",
                self.tenant_id
            )));
        }
        if self.whatsapp.access_token.is_empty() || self.whatsapp.app_secret.is_empty() {
            return Err(WahubError::Config(format!(
                "tenant {}: whatsapp.accessToken and whatsapp.appSecret are required",
                self.tenant_id
            )));
        }
        let t = self.llm.temperature;
        if t.is_nan() || t.is_infinite() || !(0.0..=2.0).contains(&t) {
            return Err(WahubError::Config(format!(
                "tenant {}: llm.temperature must be a finite number between 0.0 and 2.0",
                self.tenant_id
            )));
        }
        if self.kind == TenantKind::Pos && self.store.store_id.is_empty() {
            return Err(WahubError::Config(format!(
                "tenant {}: store.storeId is required for POS tenants",
                self.tenant_id
            )));
        }
        if let Some(hours) = self.session.ttl_hours
            && (hours == 0 || hours > MAX_RETENTION_HOURS)
        {
            return Err(WahubError::Config(format!(
                "tenant {}: session.ttlHours must be between 1 and {}",
                self.tenant_id, MAX_RETENTION_HOURS
            )));
        }
        if self.store.discount_percent >= 100 {
            return Err(WahubError::Config(format!(
                "tenant {}: store.discountPercent must be < 100",
                self.tenant_id
            )));
        }
        Ok(())
    }

    pub fn is_owner(&self, contact: &str) -> bool {
        self.owner_contact
            .as_deref()
            .is_some_and(|owner| normalize_contact(owner) == normalize_contact(contact))
    }

    pub fn display_name(&self) -> &str {
        if self.display_name.is_empty() {
            &self.tenant_id
        } else {
            &self.display_name
        }
    }
}

/// Strip formatting from a phone number so `+65 9123 4567` matches `6591234567`.
pub fn normalize_contact(contact: &str) -> String {
    contact.chars().filter(char::is_ascii_digit).collect()
}

#[cfg(test)]
impl TenantConfig {
    /// Minimal valid tenant for unit tests; phone number id is `phone-<id>`.
    pub(crate) fn sample(tenant_id: &str, kind: TenantKind) -> Self {
        serde_json::from_value(serde_json::json!({
            "tenantId": tenant_id,
            "kind": kind,
            "displayName": "Ah Seng Kopi",
            "whatsapp": {
                "accessToken": "token",
                "phoneNumberId": format!("phone-{}", tenant_id),
                "appSecret": "secret",
                "verifyToken": "verify"
            },
            "llm": {"apiKey": "sk-test"},
            "ownerContact": "6590000000",
            "store": {"storeId": "store-1"}
        }))
        .expect("sample tenant")
    }
}
