//! Promotion lifecycle engine: weighted offer selection, daily
//! eligibility, coupon issuance, and the redemption state machine with
//! its staff terminal protocol.

pub mod eligibility;
pub mod engine;
pub mod issuer;
pub mod redemption;
pub mod selector;
pub mod terminal;

pub use engine::{DrawError, ScratchCard, ScratchEngine};
pub use redemption::{evaluate, CouponEvaluation, RedeemOutcome};
pub use terminal::{
    RedeemReceipt, RedeemRejection, RedeemRequest, RedemptionTerminal, TerminalRedeemOutcome,
    ValidationResult,
};
