//! HostBill → Zoho field mappings. Pure functions; no I/O.

use chrono::NaiveDateTime;

use super::identity::IdentityMap;
use crate::error::{SyncError, SyncResult};
use crate::hostbill::responses::Client;
use crate::hostbill::{ClientDetails, InvoicesPage, ServicesPage};
use crate::types::RecordKind;
use crate::zoho::records::{
    UpsertBatch, ZohoAccount, ZohoInvoice, ZohoService, ACCOUNT_DUPLICATE_CHECK,
    ID1_DUPLICATE_CHECK,
};

/// HostBill's placeholder for "never paid".
const UNPAID_DATE: &str = "0000-00-00 00:00:00";
const HOSTBILL_DATETIME: &str = "%Y-%m-%d %H:%M:%S";
const ZOHO_DATE: &str = "%Y-%m-%d";

/// Company name, or "first last" for individuals.
pub fn display_name(client: &Client) -> String {
    if client.companyname.is_empty() {
        format!("{} {}", client.firstname, client.lastname)
    } else {
        client.companyname.clone()
    }
}

pub fn translate_accounts(details: &[ClientDetails]) -> UpsertBatch<ZohoAccount> {
    let mut batch = UpsertBatch::new(ACCOUNT_DUPLICATE_CHECK);
    batch.data = details
        .iter()
        .map(|d| {
            let c = &d.client;
            ZohoAccount {
                account_name: display_name(c),
                account_number: c.id.clone(),
                account_status: c.status.clone(),
                billing_city: c.city.clone(),
                billing_code: c.postcode.clone(),
                billing_country: c.country.clone(),
                billing_state: c.state.clone(),
                billing_street: c.address1.clone(),
                phone: c.phonenumber.clone(),
                email: c.email.clone(),
            }
        })
        .collect();
    batch
}

/// Services are always emitted; an unmapped client leaves `Related_Account` empty.
pub fn translate_services(page: &ServicesPage, map: &IdentityMap) -> UpsertBatch<ZohoService> {
    let mut batch = UpsertBatch::new(ID1_DUPLICATE_CHECK);
    batch.data = page
        .accounts
        .iter()
        .map(|s| ZohoService {
            related_account: map.get(&s.client_id).unwrap_or_default().to_string(),
            billing_cycle: s.billingcycle.clone(),
            domain: s.domain.clone(),
            id: s.id.clone(),
            recurring_amount: s.total.clone(),
            name: s.name.clone(),
            status: s.status.clone(),
        })
        .collect();
    batch
}

/// Invoices for clients missing from `map` are dropped. A paid date that
/// cannot be parsed fails the whole page.
pub fn translate_invoices(
    page: &InvoicesPage,
    map: &IdentityMap,
) -> SyncResult<UpsertBatch<ZohoInvoice>> {
    let mut batch = UpsertBatch::new(ID1_DUPLICATE_CHECK);
    for invoice in &page.invoices {
        let Some(account) = map.get(&invoice.client_id) else {
            continue;
        };
        let paid = normalize_paid_date(&invoice.datepaid).map_err(|e| SyncError::Translation {
            kind: RecordKind::Invoices,
            message: format!(
                "invoice {} has unparseable paid date '{}': {}",
                invoice.id, invoice.datepaid, e
            ),
        })?;
        batch.data.push(ZohoInvoice {
            account_name: account.to_string(),
            due_date: invoice.duedate.clone(),
            invoice_date: invoice.date.clone(),
            paid,
            payment_method: invoice.module.clone(),
            sub_amount: invoice.subtotal2.clone(),
            subject: format!("Invoice #{}", invoice.id),
            total: invoice.total.clone(),
            status: invoice.status.clone(),
            id: invoice.id.clone(),
        });
    }
    Ok(batch)
}

/// `"0000-00-00 00:00:00"` becomes `""`; anything else is reduced from
/// `YYYY-MM-DD HH:MM:SS` to `YYYY-MM-DD`.
pub fn normalize_paid_date(raw: &str) -> Result<String, chrono::ParseError> {
    if raw == UNPAID_DATE {
        return Ok(String::new());
    }
    let parsed = NaiveDateTime::parse_from_str(raw, HOSTBILL_DATETIME)?;
    Ok(parsed.format(ZOHO_DATE).to_string())
}
