//! Participant derivation: which accounts took part in a transaction's operations.
//!
//! Output order follows operation order; within one operation the source comes first, then the
//! type-specific participants. Nothing is deduplicated here.

use crate::error::IndexerError;
use crate::ledger::{
    AccountId, LedgerKey, LedgerTransaction, MuxedAccount, Operation, OperationBody,
    RevokeSponsorshipTarget,
};

/// Source account of `operation`: its own when set, otherwise the transaction's.
pub fn effective_source<'a>(
    operation: &'a Operation,
    transaction: &'a LedgerTransaction,
) -> &'a MuxedAccount {
    operation
        .source_account
        .as_ref()
        .unwrap_or_else(|| transaction.envelope.source_account())
}

/// Operations whose source counts as a payments participant.
fn is_payment(body: &OperationBody) -> bool {
    matches!(
        body,
        OperationBody::CreateAccount { .. }
            | OperationBody::Payment { .. }
            | OperationBody::PathPaymentStrictReceive { .. }
            | OperationBody::PathPaymentStrictSend { .. }
            | OperationBody::AccountMerge { .. }
    )
}

/// Participants of every operation in `transaction`.
///
/// With `payments_only`, sources of non-payment operations are left out. Type-specific
/// participants (destinations, trustors, claimants, ...) are recorded either way.
///
/// Fails with [`IndexerError::UnknownOperation`] on an operation kind without a rule; no
/// partial list is returned in that case.
pub fn participants_for_operations(
    transaction: &LedgerTransaction,
    payments_only: bool,
) -> Result<Vec<AccountId>, IndexerError> {
    let operations = transaction.envelope.operations();
    let mut participants = Vec::new();

    for (op_index, operation) in operations.iter().enumerate() {
        let source = effective_source(operation, transaction).account_id();
        if !payments_only || is_payment(&operation.body) {
            participants.push(source.clone());
        }

        match &operation.body {
            OperationBody::CreateAccount { destination } => {
                participants.push(destination.clone());
            }
            OperationBody::Payment { destination }
            | OperationBody::PathPaymentStrictReceive { destination }
            | OperationBody::PathPaymentStrictSend { destination }
            | OperationBody::AccountMerge { destination } => {
                participants.push(destination.account_id().clone());
            }
            OperationBody::AllowTrust { trustor } | OperationBody::SetTrustLineFlags { trustor } => {
                participants.push(trustor.clone());
            }
            OperationBody::CreateClaimableBalance { claimants } => {
                participants.extend(claimants.iter().map(|c| c.destination.clone()));
            }
            OperationBody::BeginSponsoringFutureReserves { sponsored_id } => {
                participants.push(sponsored_id.clone());
            }
            OperationBody::EndSponsoringFutureReserves => {
                // A failed transaction's sandwich may be malformed (bad nesting, wrong sponsoree),
                // so only trust it once the transaction applied.
                if transaction.successful() {
                    participants.extend(sandwich_participants(&operations[..op_index], source));
                }
            }
            OperationBody::RevokeSponsorship { target } => match target {
                RevokeSponsorshipTarget::LedgerEntry(key) => {
                    participants.extend(ledger_key_participants(key));
                }
                // The signer key itself can be any account; recording it would let anyone
                // spam another account's history.
                RevokeSponsorshipTarget::Signer { account_id, .. } => {
                    participants.push(account_id.clone());
                }
            },
            OperationBody::Clawback { from } => {
                participants.push(from.account_id().clone());
            }
            OperationBody::ManageSellOffer
            | OperationBody::ManageBuyOffer
            | OperationBody::CreatePassiveSellOffer
            | OperationBody::SetOptions
            | OperationBody::ChangeTrust
            | OperationBody::Inflation
            | OperationBody::ManageData
            | OperationBody::BumpSequence
            | OperationBody::ClaimClaimableBalance
            | OperationBody::ClawbackClaimableBalance
            | OperationBody::LiquidityPoolDeposit
            | OperationBody::LiquidityPoolWithdraw => {}
            OperationBody::Unsupported { type_name } => {
                return Err(IndexerError::UnknownOperation {
                    type_name: type_name.clone(),
                });
            }
        }
    }

    Ok(participants)
}

/// Sponsored accounts of the begin-sponsoring operations in `preceding` (scanned last to first)
/// that opened a sandwich for `sponsoree`. Sponsors are deliberately not included.
fn sandwich_participants<'a>(
    preceding: &'a [Operation],
    sponsoree: &'a AccountId,
) -> impl Iterator<Item = AccountId> + 'a {
    preceding.iter().rev().filter_map(move |op| match &op.body {
        OperationBody::BeginSponsoringFutureReserves { sponsored_id } if sponsored_id == sponsoree => {
            Some(sponsored_id.clone())
        }
        _ => None,
    })
}

/// Accounts named by a ledger key. Claimable balances and liquidity pools name none.
pub fn ledger_key_participants(key: &LedgerKey) -> Vec<AccountId> {
    match key {
        LedgerKey::Account { account_id }
        | LedgerKey::Data { account_id, .. }
        | LedgerKey::Trustline { account_id, .. } => vec![account_id.clone()],
        LedgerKey::Offer { seller_id, .. } => vec![seller_id.clone()],
        LedgerKey::ClaimableBalance { .. } | LedgerKey::LiquidityPool { .. } => Vec::new(),
    }
}
