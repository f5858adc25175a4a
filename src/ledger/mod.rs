//! Ledger data model as produced by the archive and the transaction decoder.
//!
//! Operations are a closed sum type: every kind the participant extractor understands has its
//! own variant, and kinds it does not understand arrive as [`OperationBody::Unsupported`].

pub mod archive;
pub mod decoder;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use archive::{FsArchive, LedgerArchive, checkpoint_file_path};
pub use decoder::{
    CloseMetaDecoder, TransactionDecoder, TransactionReader, network_id, transaction_hash,
};

/// Account address (public key string).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn address(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AccountId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Account optionally multiplexed with a sub-account id.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MuxedAccount {
    pub account: AccountId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
}

impl MuxedAccount {
    pub fn new(account: impl Into<AccountId>) -> Self {
        Self {
            account: account.into(),
            id: None,
        }
    }

    pub fn muxed(account: impl Into<AccountId>, id: u64) -> Self {
        Self {
            account: account.into(),
            id: Some(id),
        }
    }

    /// The underlying account, dropping any sub-account id.
    pub fn account_id(&self) -> &AccountId {
        &self.account
    }
}

impl From<AccountId> for MuxedAccount {
    fn from(account: AccountId) -> Self {
        Self { account, id: None }
    }
}

impl From<&str> for MuxedAccount {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claimant {
    pub destination: AccountId,
}

/// Reference to one entry of ledger state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerKey {
    Account { account_id: AccountId },
    Trustline { account_id: AccountId, asset: String },
    Offer { seller_id: AccountId, offer_id: i64 },
    Data { account_id: AccountId, data_name: String },
    ClaimableBalance { balance_id: String },
    LiquidityPool { pool_id: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevokeSponsorshipTarget {
    LedgerEntry(LedgerKey),
    Signer {
        account_id: AccountId,
        signer_key: String,
    },
}

/// Type-specific operation payload. Only fields that name accounts are modelled.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OperationBody {
    CreateAccount { destination: AccountId },
    Payment { destination: MuxedAccount },
    PathPaymentStrictReceive { destination: MuxedAccount },
    PathPaymentStrictSend { destination: MuxedAccount },
    ManageSellOffer,
    ManageBuyOffer,
    CreatePassiveSellOffer,
    SetOptions,
    ChangeTrust,
    AllowTrust { trustor: AccountId },
    AccountMerge { destination: MuxedAccount },
    Inflation,
    ManageData,
    BumpSequence,
    CreateClaimableBalance { claimants: Vec<Claimant> },
    ClaimClaimableBalance,
    BeginSponsoringFutureReserves { sponsored_id: AccountId },
    EndSponsoringFutureReserves,
    RevokeSponsorship { target: RevokeSponsorshipTarget },
    Clawback { from: MuxedAccount },
    ClawbackClaimableBalance,
    SetTrustLineFlags { trustor: AccountId },
    LiquidityPoolDeposit,
    LiquidityPoolWithdraw,
    /// A kind the decoder recognised on the wire but participant derivation has no rule for.
    Unsupported { type_name: String },
}

impl OperationBody {
    pub fn type_name(&self) -> &str {
        match self {
            Self::CreateAccount { .. } => "create_account",
            Self::Payment { .. } => "payment",
            Self::PathPaymentStrictReceive { .. } => "path_payment_strict_receive",
            Self::PathPaymentStrictSend { .. } => "path_payment_strict_send",
            Self::ManageSellOffer => "manage_sell_offer",
            Self::ManageBuyOffer => "manage_buy_offer",
            Self::CreatePassiveSellOffer => "create_passive_sell_offer",
            Self::SetOptions => "set_options",
            Self::ChangeTrust => "change_trust",
            Self::AllowTrust { .. } => "allow_trust",
            Self::AccountMerge { .. } => "account_merge",
            Self::Inflation => "inflation",
            Self::ManageData => "manage_data",
            Self::BumpSequence => "bump_sequence",
            Self::CreateClaimableBalance { .. } => "create_claimable_balance",
            Self::ClaimClaimableBalance => "claim_claimable_balance",
            Self::BeginSponsoringFutureReserves { .. } => "begin_sponsoring_future_reserves",
            Self::EndSponsoringFutureReserves => "end_sponsoring_future_reserves",
            Self::RevokeSponsorship { .. } => "revoke_sponsorship",
            Self::Clawback { .. } => "clawback",
            Self::ClawbackClaimableBalance => "clawback_claimable_balance",
            Self::SetTrustLineFlags { .. } => "set_trust_line_flags",
            Self::LiquidityPoolDeposit => "liquidity_pool_deposit",
            Self::LiquidityPoolWithdraw => "liquidity_pool_withdraw",
            Self::Unsupported { type_name } => type_name,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_account: Option<MuxedAccount>,
    pub body: OperationBody,
}

impl Operation {
    /// Operation that inherits the transaction's source account.
    pub fn new(body: OperationBody) -> Self {
        Self {
            source_account: None,
            body,
        }
    }

    pub fn with_source(source: impl Into<MuxedAccount>, body: OperationBody) -> Self {
        Self {
            source_account: Some(source.into()),
            body,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxBody {
    pub source_account: MuxedAccount,
    pub operations: Vec<Operation>,
    #[serde(default)]
    pub signatures: Vec<String>,
}

/// Transaction envelope. A fee-bump wraps an inner transaction paid for by `fee_source`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionEnvelope {
    Tx(TxBody),
    FeeBump {
        fee_source: MuxedAccount,
        inner: TxBody,
    },
}

impl TransactionEnvelope {
    pub fn new(source: impl Into<MuxedAccount>, operations: Vec<Operation>) -> Self {
        Self::Tx(TxBody {
            source_account: source.into(),
            operations,
            signatures: Vec::new(),
        })
    }

    fn body(&self) -> &TxBody {
        match self {
            Self::Tx(body) => body,
            Self::FeeBump { inner, .. } => inner,
        }
    }

    /// Source of the (inner) transaction.
    pub fn source_account(&self) -> &MuxedAccount {
        &self.body().source_account
    }

    pub fn operations(&self) -> &[Operation] {
        &self.body().operations
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionResultCode {
    TxFeeBumpInnerSuccess,
    TxSuccess,
    TxFailed,
    TxTooEarly,
    TxTooLate,
    TxMissingOperation,
    TxBadSeq,
    TxBadAuth,
    TxInsufficientBalance,
    TxNoAccount,
    TxInsufficientFee,
    TxBadAuthExtra,
    TxInternalError,
    TxNotSupported,
    TxFeeBumpInnerFailed,
    TxBadSponsorship,
    TxBadMinSeqAgeOrGap,
    TxMalformed,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionResult {
    pub fee_charged: i64,
    pub code: TransactionResultCode,
}

impl TransactionResult {
    pub fn successful(&self) -> bool {
        matches!(
            self.code,
            TransactionResultCode::TxSuccess | TransactionResultCode::TxFeeBumpInnerSuccess
        )
    }
}

/// A result keyed by the hash of the envelope it belongs to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionResultPair {
    pub transaction_hash: String,
    pub result: TransactionResult,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerHeader {
    pub ledger_seq: u32,
    #[serde(default)]
    pub close_time: u64,
}

/// One ledger as stored in the archive: header, unordered transaction set, ordered results.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ledger {
    pub header: LedgerHeader,
    #[serde(default)]
    pub transaction_set: Vec<TransactionEnvelope>,
    #[serde(default)]
    pub results: Vec<TransactionResultPair>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionResultMeta {
    pub result: TransactionResultPair,
}

/// Close metadata reassembled from an archived ledger for the decoder.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LedgerCloseMeta {
    pub header: LedgerHeader,
    pub tx_set: Vec<TransactionEnvelope>,
    pub tx_processing: Vec<TransactionResultMeta>,
}

impl From<&Ledger> for LedgerCloseMeta {
    fn from(ledger: &Ledger) -> Self {
        LedgerCloseMeta {
            header: ledger.header.clone(),
            tx_set: ledger.transaction_set.clone(),
            tx_processing: ledger
                .results
                .iter()
                .cloned()
                .map(|result| TransactionResultMeta { result })
                .collect(),
        }
    }
}

impl LedgerCloseMeta {
    pub fn ledger_seq(&self) -> u32 {
        self.header.ledger_seq
    }
}

/// A decoded transaction together with its result.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LedgerTransaction {
    /// 1-based position within the ledger's result set.
    pub index: u32,
    pub ledger_seq: u32,
    pub envelope: TransactionEnvelope,
    pub result: TransactionResultPair,
}

impl LedgerTransaction {
    pub fn successful(&self) -> bool {
        self.result.result.successful()
    }
}
