//! Transaction construction, signing and broadcast

mod builder;
pub mod fees;

pub use builder::{
    ensure_chain, estimate_transfer, prepare_transfer, submit_transfer, transfer, Asset,
    SignedTransfer, TransactionResult, TransferCall, TransferRequest, TransferStage,
};
pub use fees::{FeeModel, FeeOverrides, FeeQuote, QuotedPricing};
