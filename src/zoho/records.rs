//! Upsert payloads for the Zoho CRM modules the sync writes to.

use serde::Serialize;

/// Body of a `/<Module>/upsert` request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpsertBatch<T> {
    pub data: Vec<T>,
    pub duplicate_check_fields: Vec<&'static str>,
}

impl<T> UpsertBatch<T> {
    pub fn new(duplicate_check_field: &'static str) -> Self {
        Self {
            data: Vec::new(),
            duplicate_check_fields: vec![duplicate_check_field],
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

pub const ACCOUNT_DUPLICATE_CHECK: &str = "Account_Number";
pub const ID1_DUPLICATE_CHECK: &str = "ID1";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZohoAccount {
    #[serde(rename = "Account_Name")]
    pub account_name: String,
    #[serde(rename = "Account_Number")]
    pub account_number: String,
    #[serde(rename = "Account_Status")]
    pub account_status: String,
    #[serde(rename = "Billing_City")]
    pub billing_city: String,
    #[serde(rename = "Billing_Code")]
    pub billing_code: String,
    #[serde(rename = "Billing_Country")]
    pub billing_country: String,
    #[serde(rename = "Billing_State")]
    pub billing_state: String,
    #[serde(rename = "Billing_Street")]
    pub billing_street: String,
    #[serde(rename = "Phone")]
    pub phone: String,
    #[serde(rename = "Email")]
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZohoService {
    #[serde(rename = "Related_Account")]
    pub related_account: String,
    #[serde(rename = "Billing_Cycle")]
    pub billing_cycle: String,
    #[serde(rename = "Domain")]
    pub domain: String,
    #[serde(rename = "ID1")]
    pub id: String,
    #[serde(rename = "Recurring_Amount")]
    pub recurring_amount: String,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Status")]
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZohoInvoice {
    #[serde(rename = "Account_Name")]
    pub account_name: String,
    #[serde(rename = "Due_Date")]
    pub due_date: String,
    #[serde(rename = "Invoice_Date")]
    pub invoice_date: String,
    #[serde(rename = "Paid")]
    pub paid: String,
    #[serde(rename = "Payment_Method")]
    pub payment_method: String,
    #[serde(rename = "Sub_Amount")]
    pub sub_amount: String,
    #[serde(rename = "Subject")]
    pub subject: String,
    #[serde(rename = "Total")]
    pub total: String,
    #[serde(rename = "Status")]
    pub status: String,
    #[serde(rename = "ID1")]
    pub id: String,
}
