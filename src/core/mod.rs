//! Core business logic abstractions

pub mod analytics;
pub mod config;
pub mod export;
pub mod filter;
pub mod log;
pub mod market;
pub mod model;
pub mod pagination;
pub mod routing;
pub mod session;

// Re-export main types for cleaner imports
pub use filter::{FilterState, RegionSelection};
pub use market::{MarketDataProvider, PriceQuery};
pub use model::{PriceFeed, PriceRecord, Product, Region};
pub use session::{Role, Session, User};
