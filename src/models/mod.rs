pub mod booth;
pub mod catalog;

pub use booth::{Booth, BoothCategory, BoothDesign, BoothId, BoothStatus, SizeKey, BOOTH_CATEGORIES};
pub use catalog::{ApiProduct, ApiProductBanner, PaymentMethod};
