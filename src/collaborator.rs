//! Contract with the backend that persists donation boxes and runs checkout.
//!
//! The engine never talks to the network itself; every remote effect goes
//! through a [`DonationCollaborator`].  Payload field names follow the
//! backend's camelCase JSON.

use crate::allocation::BeneficiaryId;
use crate::machine::DonationBoxStatus;
use crate::money::{cents, Money};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One payout line after collectives are expanded into member causes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BeneficiaryPayload {
    /// Cause receiving a share.
    pub cause_id: BeneficiaryId,
    /// Collective the cause was selected through.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributed_collective_id: Option<BeneficiaryId>,
}

/// Body of a create-donation-box call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDonationBox {
    /// Monthly gross amount.
    #[serde(with = "cents")]
    pub monthly_amount: Money,
    /// Expanded, de-duplicated payout lines.
    pub causes: Vec<BeneficiaryPayload>,
}

/// Partial update of the donor's box.  Absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDonationBox {
    /// New monthly gross amount.
    #[serde(
        default,
        with = "cents::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub monthly_amount: Option<Money>,
    /// Full list of directly selected causes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause_ids: Option<Vec<BeneficiaryId>>,
    /// Full list of selected collectives.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collective_ids: Option<Vec<BeneficiaryId>>,
}

/// Donation box as stored by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DonationBoxRecord {
    /// Backend id.
    pub id: String,
    /// Monthly gross amount on file.
    #[serde(with = "cents")]
    pub monthly_amount: Money,
    /// Status reported by the backend, when it sends one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<DonationBoxStatus>,
    /// Next scheduled charge.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_charge_date: Option<NaiveDate>,
}

/// Result of activating a box.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activation {
    /// Payment page the donor must visit to finish activation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkout_url: Option<String>,
}

/// A cause listed inside a collective.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectiveCause {
    /// Cause id.
    pub id: BeneficiaryId,
    /// Display name.
    #[serde(default)]
    pub name: String,
}

/// Collective detail as returned by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectiveDetail {
    /// Collective id.
    pub id: BeneficiaryId,
    /// Member causes.
    #[serde(default)]
    pub causes: Vec<CollectiveCause>,
}

/// Body of a one-time donation checkout request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OneTimeDonationRequest {
    /// Gross gift amount.
    #[serde(with = "cents")]
    pub amount: Money,
    /// Directly selected causes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause_ids: Option<Vec<BeneficiaryId>>,
    /// Selected collectives.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collective_ids: Option<Vec<BeneficiaryId>>,
}

/// Checkout session for a one-time gift.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkout {
    /// Payment page to redirect the donor to.
    pub checkout_url: String,
}

/// Failure reported by (or while reaching) the collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollaboratorError {
    #[error("request failed: {0}")]
    /// The request never produced a response.
    Transport(String),
    #[error("backend returned {status}: {message}")]
    /// Non-success HTTP status.
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body or message.
        message: String,
    },
    #[error("unexpected response: {0}")]
    /// The response could not be decoded.
    Decode(String),
    #[error("{0}")]
    /// The backend refused the request with a user-facing reason.
    Rejected(String),
}

/// Remote operations the engine depends on.
#[async_trait]
pub trait DonationCollaborator: Send + Sync {
    /// Persists a new donation box.
    async fn create_donation_box(
        &self,
        request: &CreateDonationBox,
    ) -> Result<DonationBoxRecord, CollaboratorError>;

    /// Replaces amount and/or beneficiaries of the donor's box.
    async fn update_donation_box(
        &self,
        update: &UpdateDonationBox,
    ) -> Result<DonationBoxRecord, CollaboratorError>;

    /// Starts billing for the donor's box.
    async fn activate_donation_box(&self) -> Result<Activation, CollaboratorError>;

    /// Stops billing for the donor's box.
    async fn cancel_donation_box(&self) -> Result<(), CollaboratorError>;

    /// Fetches a collective and its member causes.
    async fn get_collective_by_id(&self, id: &str) -> Result<CollectiveDetail, CollaboratorError>;

    /// Opens a checkout session for a one-time gift.
    async fn create_one_time_donation(
        &self,
        request: &OneTimeDonationRequest,
    ) -> Result<Checkout, CollaboratorError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn update_payload_omits_absent_fields() {
        let update = UpdateDonationBox {
            monthly_amount: Some(dec!(30)),
            cause_ids: Some(vec!["c1".into()]),
            collective_ids: None,
        };
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "monthlyAmount": "30.00", "causeIds": ["c1"] })
        );
    }

    #[test]
    fn create_payload_uses_camel_case() {
        let request = CreateDonationBox {
            monthly_amount: dec!(25),
            causes: vec![
                BeneficiaryPayload {
                    cause_id: "c1".into(),
                    attributed_collective_id: None,
                },
                BeneficiaryPayload {
                    cause_id: "c2".into(),
                    attributed_collective_id: Some("k1".into()),
                },
            ],
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "monthlyAmount": "25.00",
                "causes": [
                    { "causeId": "c1" },
                    { "causeId": "c2", "attributedCollectiveId": "k1" }
                ]
            })
        );
    }

    #[test]
    fn record_accepts_numeric_amount_and_date() {
        let record: DonationBoxRecord = serde_json::from_str(
            r#"{"id":"box-1","monthlyAmount":25,"status":"active","nextChargeDate":"2026-11-01"}"#,
        )
        .unwrap();
        assert_eq!(record.monthly_amount, dec!(25));
        assert_eq!(record.status, Some(DonationBoxStatus::Active));
        assert_eq!(
            record.next_charge_date,
            NaiveDate::from_ymd_opt(2026, 11, 1)
        );
    }

    #[test]
    fn activation_without_checkout_url() {
        let activation: Activation = serde_json::from_str("{}").unwrap();
        assert_eq!(activation.checkout_url, None);
    }
}
