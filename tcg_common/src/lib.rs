//! Shared types for trading-card inventory tooling.

pub mod card;
pub mod card_id;
pub mod price;
pub mod variant;

pub use card::{Ability, Attack, CardImages, CardInfo, SetInfo, TypeModifier};
pub use card_id::{split_card_id, CardIdParts};
pub use price::{Price, PriceError};
pub use variant::VariantKey;
