mod kobo;
mod secret;

pub use kobo::{Kobo, KoboConversionError, NAIRA_CURRENCY_CODE, NAIRA_CURRENCY_CODE_LOWER};
pub use secret::Secret;
