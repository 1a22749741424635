//! The exchange protocol: session state machines and the two role
//! coordinators that drive them.
//!
//! The seller side turns an attested share submission into an encrypted,
//! committed, paid-for key reveal. The buyer side turns an on-ledger offer
//! into verified plaintext shares. Both sides only ever move money or keys
//! after the ledger says the other side held up its end.

pub mod buyer;
pub mod seller;
pub mod session;
pub mod types;

pub use buyer::{BuyerCoordinator, BuyerSettings, Purchase};
pub use seller::{SellerCoordinator, SellerSettings};
pub use session::{BuyerSession, SellerSession, SessionRegistry};
pub use types::{BuyerState, ExchangeError, SellerOffer, SellerState};
