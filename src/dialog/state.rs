use crate::tenants::TenantKind;
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PosState {
    Start,
    Browsing,
    ViewingProduct,
    Ordering,
    AwaitingOwnerPayment,
    OwnerReviewingPayment,
    AwaitingCustomerMessage,
    Terminal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DealsState {
    Start,
    AskLocation,
    LocationReceived,
    AskCategory,
    SearchingDeals,
    ShowingDeals,
    DealInteraction,
    AlertSetup,
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViralState {
    Welcome,
    CollectRestaurantName,
    ConfirmRestaurant,
    CollectDescription,
    CollectPricing,
    CollectValidity,
    CollectPhoto,
    CollectAudience,
    CollectContact,
    CollectSpecialNotes,
    GenerateContent,
    AwaitApproval,
    Submitted,
}

/// Current position in the tenant's conversation state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "machine", content = "state", rename_all = "snake_case")]
pub enum DialogState {
    Pos(PosState),
    Deals(DealsState),
    Viral(ViralState),
}

impl PosState {
    pub fn can_transition(self, next: Self) -> bool {
        use PosState::{AwaitingOwnerPayment, Ordering, Start, Terminal};
        if self == next {
            return true;
        }
        match (self, next) {
            (Terminal, Start) => true,
            (Terminal, _) => false,
            (Ordering | AwaitingOwnerPayment, Terminal) => true,
            (_, Terminal) => false,
            _ => true,
        }
    }
}

impl DealsState {
    pub fn can_transition(self, next: Self) -> bool {
        use DealsState::{
            AlertSetup, AskCategory, AskLocation, DealInteraction, End, LocationReceived,
            SearchingDeals, ShowingDeals, Start,
        };
        if self == next || next == Start {
            return true;
        }
        matches!(
            (self, next),
            (Start, AskLocation)
                | (AskLocation, LocationReceived)
                | (LocationReceived, AskCategory)
                | (AskCategory, SearchingDeals)
                | (SearchingDeals, ShowingDeals | AskCategory)
                | (ShowingDeals, DealInteraction | AskCategory | AskLocation)
                | (DealInteraction, ShowingDeals | AlertSetup | AskCategory | End)
                | (AlertSetup, End | ShowingDeals)
        )
    }
}

impl ViralState {
    pub fn can_transition(self, next: Self) -> bool {
        use ViralState::{
            AwaitApproval, CollectAudience, CollectContact, CollectDescription, CollectPhoto,
            CollectPricing, CollectRestaurantName, CollectSpecialNotes, CollectValidity,
            ConfirmRestaurant, GenerateContent, Submitted, Welcome,
        };
        if self == next || next == Welcome {
            return true;
        }
        matches!(
            (self, next),
            (Welcome, CollectRestaurantName)
                | (
                    CollectRestaurantName,
                    ConfirmRestaurant | CollectDescription
                )
                | (ConfirmRestaurant, CollectDescription | CollectRestaurantName)
                | (CollectDescription, CollectPricing)
                | (CollectPricing, CollectValidity)
                | (CollectValidity, CollectPhoto)
                | (CollectPhoto, CollectAudience)
                | (CollectAudience, CollectContact)
                | (CollectContact, CollectSpecialNotes)
                | (CollectSpecialNotes, GenerateContent)
                | (GenerateContent, AwaitApproval)
                | (
                    AwaitApproval,
                    Submitted | CollectDescription | GenerateContent
                )
        )
    }
}

impl DialogState {
    pub fn initial(kind: TenantKind) -> Self {
        match kind {
            TenantKind::Pos => Self::Pos(PosState::Start),
            TenantKind::Deals => Self::Deals(DealsState::Start),
            TenantKind::ViralAgency => Self::Viral(ViralState::Welcome),
        }
    }

    pub fn kind(self) -> TenantKind {
        match self {
            Self::Pos(_) => TenantKind::Pos,
            Self::Deals(_) => TenantKind::Deals,
            Self::Viral(_) => TenantKind::ViralAgency,
        }
    }

    pub fn can_transition(self, next: Self) -> bool {
        match (self, next) {
            (Self::Pos(a), Self::Pos(b)) => a.can_transition(b),
            (Self::Deals(a), Self::Deals(b)) => a.can_transition(b),
            (Self::Viral(a), Self::Viral(b)) => a.can_transition(b),
            _ => false,
        }
    }

    /// Move to `next` if the machine allows it. Illegal moves are logged and
    /// leave the state unchanged.
    pub fn transition(&mut self, next: Self) -> bool {
        if self.can_transition(next) {
            *self = next;
            true
        } else {
            warn!("refusing illegal dialog transition {:?} -> {:?}", self, next);
            false
        }
    }

    pub fn pos(self) -> Option<PosState> {
        match self {
            Self::Pos(s) => Some(s),
            _ => None,
        }
    }

    pub fn deals(self) -> Option<DealsState> {
        match self {
            Self::Deals(s) => Some(s),
            _ => None,
        }
    }

    pub fn viral(self) -> Option<ViralState> {
        match self {
            Self::Viral(s) => Some(s),
            _ => None,
        }
    }
}
